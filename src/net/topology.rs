//! 网络拓扑
//!
//! `Topology` 是 `TopologyBuilder` 的产物：节点、接口、链路、子网以及
//! 名称到节点的注册表。构建完成后地址不再变化，只有链路状态、路由表和
//! 节点的转发开关可以修改。

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::{debug, info, warn};

use super::id::{IfaceId, LinkId, NodeId};
use super::interface::Interface;
use super::link::Link;
use super::node::Node;
use super::subnet::Subnet;
use crate::route::RouteTable;

/// 一个邻接关系：从本节点的 `egress` 接口经 `link` 到达对端的 `peer` 接口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjacency {
    pub egress: IfaceId,
    pub peer: IfaceId,
    pub link: LinkId,
}

#[derive(Debug, Clone)]
pub struct Topology {
    pub(crate) nodes: Vec<Node>,
    pub(crate) ifaces: Vec<Interface>,
    pub(crate) links: Vec<Link>,
    pub(crate) subnets: Vec<Subnet>,
    pub(crate) by_name: HashMap<String, NodeId>,
}

impl Topology {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// 按名称查找节点
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn iface(&self, id: IfaceId) -> &Interface {
        &self.ifaces[id.0]
    }

    pub fn ifaces(&self) -> &[Interface] {
        &self.ifaces
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    /// 拓扑中全部子网，按网络号排序
    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn subnet(&self, net: &Ipv4Net) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.net == *net)
    }

    /// 节点直连（on-link）的子网集合
    pub fn on_link(&self, node: NodeId) -> BTreeSet<Ipv4Net> {
        self.node(node)
            .ifaces
            .iter()
            .filter_map(|&i| self.iface(i).subnet())
            .collect()
    }

    /// 节点是否拥有该地址（任意接口上）
    pub fn owns(&self, node: NodeId, addr: Ipv4Addr) -> bool {
        self.node(node)
            .ifaces
            .iter()
            .any(|&i| self.iface(i).ip() == Some(addr))
    }

    /// 持有该地址的接口
    pub fn owner_of(&self, addr: Ipv4Addr) -> Option<IfaceId> {
        self.ifaces
            .iter()
            .find(|i| i.ip() == Some(addr))
            .map(|i| i.id)
    }

    /// 节点在指定子网内的地址
    pub fn addr_in(&self, node: NodeId, net: &Ipv4Net) -> Option<Ipv4Addr> {
        self.node(node)
            .ifaces
            .iter()
            .filter_map(|&i| self.iface(i).ip())
            .find(|ip| net.contains(ip))
    }

    /// 节点的首个地址（unnumbered 接口发包时用作源地址）
    pub fn primary_addr(&self, node: NodeId) -> Option<Ipv4Addr> {
        self.node(node)
            .ifaces
            .iter()
            .find_map(|&i| self.iface(i).ip())
    }

    /// 经由 up 链路可达的邻居，按接口创建顺序
    pub fn adjacencies(&self, node: NodeId) -> impl Iterator<Item = Adjacency> + '_ {
        self.node(node).ifaces.iter().filter_map(move |&egress| {
            let iface = self.iface(egress);
            let link = iface.link?;
            if !self.link(link).up {
                return None;
            }
            Some(Adjacency {
                egress,
                peer: iface.peer?,
                link,
            })
        })
    }

    /// 修改链路管理状态。修改后需要重新运行路由安装。
    pub fn set_link_up(&mut self, link: LinkId, up: bool) {
        let l = &mut self.links[link.0];
        if l.up != up {
            warn!(link = ?link, up, "链路状态变化，路由表需要重新安装");
        }
        l.up = up;
    }

    /// 查找连接两个节点的第一条链路
    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.node(a).ifaces.iter().find_map(|&i| {
            let iface = self.iface(i);
            let peer = iface.peer?;
            (self.iface(peer).node == b).then_some(iface.link).flatten()
        })
    }

    pub fn routes(&self, node: NodeId) -> &RouteTable {
        &self.node(node).routes
    }

    /// 依次执行所有节点的启动钩子，返回 (节点名, 命令)
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self) -> Vec<(String, &'static str)> {
        info!(nodes = self.nodes.len(), "▶️  启动全部节点");
        let mut cmds = Vec::new();
        for node in &mut self.nodes {
            for &cmd in node.start() {
                cmds.push((node.name().to_string(), cmd));
            }
        }
        debug!(hooks = cmds.len(), "启动钩子执行完成");
        cmds
    }

    /// 依次执行所有节点的停止钩子
    #[tracing::instrument(skip(self))]
    pub fn stop(&mut self) -> Vec<(String, &'static str)> {
        info!("⏹️  停止全部节点");
        let mut cmds = Vec::new();
        for node in &mut self.nodes {
            for &cmd in node.stop() {
                cmds.push((node.name().to_string(), cmd));
            }
        }
        cmds
    }
}
