//! 网络接口
//!
//! 接口可以带地址（numbered），也可以不带地址（unnumbered）。
//! unnumbered 接口在计算下一跳时借用所属节点在对端子网上的地址。

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use super::id::{IfaceId, LinkId, NodeId};

/// 网络接口
#[derive(Debug, Clone)]
pub struct Interface {
    pub(crate) id: IfaceId,
    pub(crate) node: NodeId,
    pub(crate) label: String,
    pub(crate) addr: Option<Ipv4Net>,
    pub(crate) peer: Option<IfaceId>,
    pub(crate) link: Option<LinkId>,
}

impl Interface {
    pub fn id(&self) -> IfaceId {
        self.id
    }

    /// 所属节点
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// 接口名，例如 `rA-eth1`
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 接口地址（含前缀长度）
    pub fn addr(&self) -> Option<Ipv4Net> {
        self.addr
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.addr.map(|a| a.addr())
    }

    /// 接口所在子网（地址截断到网络号）
    pub fn subnet(&self) -> Option<Ipv4Net> {
        self.addr.map(|a| a.trunc())
    }

    /// 链路另一端的接口
    pub fn peer(&self) -> Option<IfaceId> {
        self.peer
    }

    pub fn link(&self) -> Option<LinkId> {
        self.link
    }
}
