//! 拓扑构建器
//!
//! 先声明节点和链路，最后由 `build` 一次性校验并生成 `Topology`。
//! 所有地址冲突都在这里以 `Error::Configuration` 报出，路由安装之前不会
//! 有任何半成品拓扑流出。

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::{debug, info, trace};

use super::id::{IfaceId, LinkId, NodeId};
use super::interface::Interface;
use super::link::Link;
use super::node::{Node, NodeRole};
use super::subnet::{Subnet, SubnetKind};
use super::topology::Topology;
use crate::error::{Error, Result};
use crate::sim::SimTime;

/// 默认链路时延
pub const DEFAULT_LINK_LATENCY: SimTime = SimTime(50_000);

/// 节点声明选项
#[derive(Debug, Clone)]
pub struct NodeOpts {
    pub role: NodeRole,
    pub forwarding: bool,
    /// 节点第一个接口在链路未显式指定地址时使用的地址
    pub addr: Option<Ipv4Net>,
    pub default_gateway: Option<Ipv4Addr>,
}

impl NodeOpts {
    pub fn router() -> Self {
        Self {
            role: NodeRole::Router,
            forwarding: true,
            addr: None,
            default_gateway: None,
        }
    }

    pub fn host(addr: Ipv4Net, default_gateway: Ipv4Addr) -> Self {
        Self {
            role: NodeRole::Host,
            forwarding: false,
            addr: Some(addr),
            default_gateway: Some(default_gateway),
        }
    }
}

/// 链路两端的接口选项
#[derive(Debug, Clone, Default)]
pub struct LinkOpts {
    pub a_label: Option<String>,
    pub a_addr: Option<Ipv4Net>,
    pub b_label: Option<String>,
    pub b_addr: Option<Ipv4Net>,
    pub latency: Option<SimTime>,
}

impl LinkOpts {
    pub fn labels(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a_label: Some(a.into()),
            b_label: Some(b.into()),
            ..Self::default()
        }
    }

    pub fn a_addr(mut self, addr: Ipv4Net) -> Self {
        self.a_addr = Some(addr);
        self
    }

    pub fn b_addr(mut self, addr: Ipv4Net) -> Self {
        self.b_addr = Some(addr);
        self
    }

    pub fn latency(mut self, latency: SimTime) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[derive(Debug)]
struct NodeDecl {
    name: String,
    opts: NodeOpts,
    ifaces: Vec<IfaceId>,
}

#[derive(Debug)]
struct IfaceDecl {
    node: NodeId,
    label: String,
    addr: Option<Ipv4Net>,
    link: Option<LinkId>,
}

#[derive(Debug)]
struct LinkDecl {
    a: IfaceId,
    b: IfaceId,
    latency: SimTime,
}

#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: Vec<NodeDecl>,
    ifaces: Vec<IfaceDecl>,
    links: Vec<LinkDecl>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明任意节点
    pub fn add_node(&mut self, name: impl Into<String>, opts: NodeOpts) -> NodeId {
        let id = NodeId(self.nodes.len());
        let name = name.into();
        trace!(node_name = %name, role = ?opts.role, "声明节点");
        self.nodes.push(NodeDecl {
            name,
            opts,
            ifaces: Vec::new(),
        });
        id
    }

    /// 声明路由器（具备转发能力）
    pub fn add_router(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, NodeOpts::router())
    }

    /// 声明主机，`addr` 用于它的唯一接口
    pub fn add_host(&mut self, name: impl Into<String>, addr: Ipv4Net, gateway: Ipv4Addr) -> NodeId {
        self.add_node(name, NodeOpts::host(addr, gateway))
    }

    /// 按名称查找已声明的节点
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    /// 在节点上添加一个接口（未接入任何链路）
    pub fn add_interface(
        &mut self,
        node: NodeId,
        label: Option<String>,
        addr: Option<Ipv4Net>,
    ) -> IfaceId {
        let id = IfaceId(self.ifaces.len());
        let decl = &mut self.nodes[node.0];
        let addr = addr.or_else(|| {
            if decl.ifaces.is_empty() {
                decl.opts.addr
            } else {
                None
            }
        });
        let label = label.unwrap_or_else(|| format!("{}-eth{}", decl.name, decl.ifaces.len()));
        decl.ifaces.push(id);
        self.ifaces.push(IfaceDecl {
            node,
            label,
            addr,
            link: None,
        });
        id
    }

    /// 连接两个节点：为两端各创建一个新接口
    pub fn add_link(&mut self, a: NodeId, b: NodeId, opts: LinkOpts) -> LinkId {
        let id = LinkId(self.links.len());
        let ia = self.add_interface(a, opts.a_label, opts.a_addr);
        let ib = self.add_interface(b, opts.b_label, opts.b_addr);
        self.ifaces[ia.0].link = Some(id);
        self.ifaces[ib.0].link = Some(id);
        self.links.push(LinkDecl {
            a: ia,
            b: ib,
            latency: opts.latency.unwrap_or(DEFAULT_LINK_LATENCY),
        });
        id
    }

    /// 校验并生成拓扑
    #[tracing::instrument(skip(self), fields(nodes = self.nodes.len(), links = self.links.len()))]
    pub fn build(self) -> Result<Topology> {
        self.validate()?;

        let mut by_name = HashMap::with_capacity(self.nodes.len());
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (idx, decl) in self.nodes.into_iter().enumerate() {
            let id = NodeId(idx);
            by_name.insert(decl.name.clone(), id);
            let mut node = Node::new(
                id,
                decl.name,
                decl.opts.role,
                decl.opts.forwarding,
                decl.opts.default_gateway,
            );
            node.ifaces = decl.ifaces;
            nodes.push(node);
        }

        let mut ifaces: Vec<Interface> = self
            .ifaces
            .into_iter()
            .enumerate()
            .map(|(idx, d)| Interface {
                id: IfaceId(idx),
                node: d.node,
                label: d.label,
                addr: d.addr,
                peer: None,
                link: d.link,
            })
            .collect();

        let links: Vec<Link> = self
            .links
            .into_iter()
            .enumerate()
            .map(|(idx, d)| {
                ifaces[d.a.0].peer = Some(d.b);
                ifaces[d.b.0].peer = Some(d.a);
                Link {
                    id: LinkId(idx),
                    a: d.a,
                    b: d.b,
                    latency: d.latency,
                    up: true,
                }
            })
            .collect();

        let subnets = collect_subnets(&nodes, &ifaces);
        info!(
            nodes = nodes.len(),
            ifaces = ifaces.len(),
            links = links.len(),
            subnets = subnets.len(),
            "🧱 拓扑构建完成"
        );

        Ok(Topology {
            nodes,
            ifaces,
            links,
            subnets,
            by_name,
        })
    }

    fn validate(&self) -> Result<()> {
        let mut names: HashMap<&str, NodeId> = HashMap::new();
        for (idx, n) in self.nodes.iter().enumerate() {
            if n.name.is_empty() {
                return Err(Error::config(format!("node #{idx} has an empty name")));
            }
            if names.insert(&n.name, NodeId(idx)).is_some() {
                return Err(Error::config(format!("duplicate node name {}", n.name)));
            }
        }

        let mut seen: HashMap<Ipv4Addr, &str> = HashMap::new();
        for iface in &self.ifaces {
            let Some(addr) = iface.addr else { continue };
            if let Some(first) = seen.insert(addr.addr(), &iface.label) {
                return Err(Error::duplicate_address(addr.addr(), first, &iface.label));
            }
            if addr.prefix_len() < 31
                && (addr.addr() == addr.network() || addr.addr() == addr.broadcast())
            {
                return Err(Error::config(format!(
                    "{} uses reserved address {addr}",
                    iface.label
                )));
            }
        }

        for link in &self.links {
            let a = &self.ifaces[link.a.0];
            let b = &self.ifaces[link.b.0];
            if a.node == b.node {
                return Err(Error::config(format!(
                    "link {} <-> {} connects {} to itself",
                    a.label, b.label, self.nodes[a.node.0].name
                )));
            }
            if let (Some(aa), Some(ba)) = (a.addr, b.addr) {
                if aa.trunc() != ba.trunc() {
                    return Err(Error::config(format!(
                        "link {} ({aa}) <-> {} ({ba}) spans two subnets",
                        a.label, b.label
                    )));
                }
            }
        }

        for decl in &self.nodes {
            if decl.opts.role != NodeRole::Host {
                continue;
            }
            let [only] = decl.ifaces.as_slice() else {
                return Err(Error::config(format!(
                    "host {} must have exactly one interface, found {}",
                    decl.name,
                    decl.ifaces.len()
                )));
            };
            let Some(addr) = self.ifaces[only.0].addr else {
                return Err(Error::config(format!("host {} has no address", decl.name)));
            };
            if let Some(gw) = decl.opts.default_gateway {
                if !addr.contains(&gw) || gw == addr.addr() {
                    return Err(Error::config(format!(
                        "host {} default gateway {gw} is not a neighbour on {}",
                        decl.name,
                        addr.trunc()
                    )));
                }
                if !seen.contains_key(&gw) {
                    return Err(Error::config(format!(
                        "host {} default gateway {gw} is not assigned to any interface",
                        decl.name
                    )));
                }
                // 网关必须属于主机链路对端，且对端具备转发能力
                let peer = self.link_peer(*only);
                let owned = peer.is_some_and(|p| {
                    let router = &self.nodes[p.0];
                    router.opts.forwarding
                        && router
                            .ifaces
                            .iter()
                            .any(|i| self.ifaces[i.0].addr.is_some_and(|a| a.addr() == gw))
                });
                if !owned {
                    return Err(Error::config(format!(
                        "host {} default gateway {gw} is not owned by a forwarding link peer",
                        decl.name
                    )));
                }
            }
        }

        debug!(addresses = seen.len(), "拓扑校验通过");
        Ok(())
    }

    /// 接口所在链路另一端的节点
    fn link_peer(&self, iface: IfaceId) -> Option<NodeId> {
        let link = &self.links[self.ifaces[iface.0].link?.0];
        let other = if link.a == iface { link.b } else { link.a };
        Some(self.ifaces[other.0].node)
    }
}

fn collect_subnets(nodes: &[Node], ifaces: &[Interface]) -> Vec<Subnet> {
    let mut groups: BTreeMap<Ipv4Net, Vec<NodeId>> = BTreeMap::new();
    for iface in ifaces {
        if let Some(net) = iface.subnet() {
            groups.entry(net).or_default().push(iface.node);
        }
    }
    groups
        .into_iter()
        .map(|(net, mut attached)| {
            attached.sort();
            attached.dedup();
            let kind = if attached.iter().any(|n| nodes[n.0].is_host()) {
                SubnetKind::Lan
            } else {
                SubnetKind::Backbone
            };
            Subnet {
                net,
                kind,
                attached,
            }
        })
        .collect()
}
