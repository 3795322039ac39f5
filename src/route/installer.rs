//! 静态路由安装
//!
//! 拓扑在运行期不会变化，所以这里不跑路由协议，而是对每个节点做一次
//! “按最短跳数”的 BFS，直接算出每个非直连子网的下一跳。
//!
//! 安装以节点为单位原子提交：某个节点的任一子网算不出来，该节点原有
//! 的路由表保持不变，错误直接返回给调用者。

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::table::{RouteEntry, RouteTable};
use crate::error::{Error, Result};
use crate::net::{Adjacency, NodeId, SubnetKind, Topology, overlaps};

/// 需要安装哪些目的子网
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteScope {
    /// 所有非直连子网，各 LAN 之间全互通
    #[default]
    Full,
    /// 只安装骨干子网，LAN 之间不可达
    BackboneOnly,
}

impl FromStr for RouteScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full" => Ok(RouteScope::Full),
            "backbone-only" | "backbone_only" => Ok(RouteScope::BackboneOnly),
            other => Err(format!(
                "unknown route scope {other:?} (expected full or backbone-only)"
            )),
        }
    }
}

impl fmt::Display for RouteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteScope::Full => f.write_str("full"),
            RouteScope::BackboneOnly => f.write_str("backbone-only"),
        }
    }
}

/// BFS 结果：到每个节点的跳数以及路径上的第一跳
struct HopTree {
    dist: Vec<Option<usize>>,
    first: Vec<Option<Adjacency>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRouteInstaller {
    scope: RouteScope,
}

impl StaticRouteInstaller {
    pub fn new(scope: RouteScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> RouteScope {
        self.scope
    }

    /// 为所有节点安装路由，遇到第一个失败的节点即返回错误。
    #[tracing::instrument(skip(self, topo), fields(scope = %self.scope))]
    pub fn install(&self, topo: &mut Topology) -> Result<()> {
        info!(nodes = topo.nodes().len(), "📋 开始安装静态路由");
        let mut total = 0;
        for idx in 0..topo.nodes().len() {
            total += self.install_node(topo, NodeId(idx))?;
        }
        info!(routes = total, "✅ 静态路由安装完成");
        Ok(())
    }

    /// 为单个节点计算并提交路由表，返回安装的条目数。
    ///
    /// 原表整体被替换，重复安装不会追加条目。
    pub fn install_node(&self, topo: &mut Topology, node: NodeId) -> Result<usize> {
        let table = self.compute(topo, node)?;
        let n = table.len();
        debug!(node_name = %topo.node(node).name(), routes = n, "提交路由表");
        topo.node_mut(node).routes = table;
        Ok(n)
    }

    /// 只计算，不修改拓扑
    #[tracing::instrument(skip(self, topo), fields(node_name = %topo.node(node).name()))]
    pub fn compute(&self, topo: &Topology, node: NodeId) -> Result<RouteTable> {
        let me = topo.node(node);
        let on_link = topo.on_link(node);
        let has_default = me.default_gateway().is_some();
        let tree = hop_tree(topo, node);
        let mut table = RouteTable::default();

        for subnet in topo.subnets() {
            let dest = subnet.net;
            if on_link.contains(&dest) {
                trace!(%dest, "直连子网，跳过");
                continue;
            }
            match (subnet.kind, self.scope) {
                (SubnetKind::Backbone, _) if has_default => {
                    trace!(%dest, "骨干子网由默认路由覆盖");
                    continue;
                }
                (SubnetKind::Lan, RouteScope::BackboneOnly) => {
                    trace!(%dest, "backbone-only 模式下不安装 LAN 路由");
                    continue;
                }
                _ => {}
            }
            check_on_link_overlap(me.name(), &on_link, dest)?;

            let target = subnet
                .attached
                .iter()
                .filter_map(|&n| tree.dist[n.0].map(|d| (d, n)))
                .min();
            let Some((hops, target)) = target else {
                return Err(Error::UnreachableSubnet {
                    node: me.name().to_string(),
                    subnet: dest,
                });
            };
            let adj = tree.first[target.0].ok_or_else(|| Error::UnreachableSubnet {
                node: me.name().to_string(),
                subnet: dest,
            })?;
            let via = gateway_addr(topo, adj).ok_or_else(|| Error::UnreachableSubnet {
                node: me.name().to_string(),
                subnet: dest,
            })?;

            debug!(%dest, %via, hops, "计算出下一跳");
            table
                .insert(RouteEntry { dest, via })
                .map_err(|existing| Error::RouteConflict {
                    node: me.name().to_string(),
                    dest,
                    existing,
                })?;
        }

        Ok(table)
    }
}

fn check_on_link_overlap(node: &str, on_link: &BTreeSet<Ipv4Net>, dest: Ipv4Net) -> Result<()> {
    match on_link.iter().find(|l| overlaps(l, &dest)) {
        Some(&existing) => Err(Error::RouteConflict {
            node: node.to_string(),
            dest,
            existing,
        }),
        None => Ok(()),
    }
}

/// 从 `src` 出发做 BFS。只有源节点和具备转发能力的节点会继续向外扩展，
/// 主机不会被当作中转。
fn hop_tree(topo: &Topology, src: NodeId) -> HopTree {
    let n = topo.nodes().len();
    let mut dist: Vec<Option<usize>> = vec![None; n];
    let mut first: Vec<Option<Adjacency>> = vec![None; n];
    let mut q: VecDeque<NodeId> = VecDeque::new();

    dist[src.0] = Some(0);
    q.push_back(src);

    while let Some(v) = q.pop_front() {
        if v != src && !topo.node(v).forwarding_capable() {
            continue;
        }
        let dv = dist[v.0].unwrap_or(0);
        for adj in topo.adjacencies(v) {
            let w = topo.iface(adj.peer).node();
            if dist[w.0].is_some() {
                continue;
            }
            dist[w.0] = Some(dv + 1);
            first[w.0] = if v == src { Some(adj) } else { first[v.0] };
            q.push_back(w);
        }
    }

    HopTree { dist, first }
}

/// 第一跳邻居接口的地址；对端 unnumbered 时借用邻居在出接口子网上的地址。
fn gateway_addr(topo: &Topology, adj: Adjacency) -> Option<Ipv4Addr> {
    let peer = topo.iface(adj.peer);
    if let Some(ip) = peer.ip() {
        return Some(ip);
    }
    let net = topo.iface(adj.egress).subnet()?;
    topo.addr_in(peer.node(), &net)
}
