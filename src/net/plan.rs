//! 拓扑导出
//!
//! 把拓扑和已安装路由整理成可序列化的 `LabPlan`，交给外部的 namespace
//! 仿真引擎去创建真实的接口、进程和内核路由。

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::Serialize;

use super::node::NodeRole;
use super::topology::Topology;
use crate::route::RouteEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabPlan {
    pub nodes: Vec<NodePlan>,
    pub links: Vec<LinkPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePlan {
    pub name: String,
    pub role: NodeRole,
    pub forwarding: bool,
    pub interfaces: Vec<InterfacePlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<Ipv4Addr>,
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfacePlan {
    pub name: String,
    /// None 表示 unnumbered
    pub addr: Option<Ipv4Net>,
    pub peer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkPlan {
    pub a: String,
    pub b: String,
    pub latency_us: u64,
    pub up: bool,
}

impl Topology {
    /// 生成当前拓扑（含已安装路由）的导出视图
    pub fn plan(&self) -> LabPlan {
        let nodes = self
            .nodes
            .iter()
            .map(|n| NodePlan {
                name: n.name().to_string(),
                role: n.role(),
                forwarding: n.forwarding_capable(),
                interfaces: n
                    .ifaces()
                    .iter()
                    .map(|&i| {
                        let iface = self.iface(i);
                        InterfacePlan {
                            name: iface.label().to_string(),
                            addr: iface.addr(),
                            peer: iface.peer().map(|p| self.iface(p).label().to_string()),
                        }
                    })
                    .collect(),
                default_gateway: n.default_gateway(),
                routes: n.routes().entries().collect(),
            })
            .collect();
        let links = self
            .links
            .iter()
            .map(|l| {
                let (a, b) = l.ends();
                LinkPlan {
                    a: self.iface(a).label().to_string(),
                    b: self.iface(b).label().to_string(),
                    latency_us: l.latency.as_micros(),
                    up: l.is_up(),
                }
            })
            .collect();
        LabPlan { nodes, links }
    }
}
