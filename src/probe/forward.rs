//! 转发决策
//!
//! 每个节点的转发查表：直连子网、静态路由、默认路由三者做最长前缀匹配，
//! 再把目标地址解析成一个链路邻居（弱主机模型：邻居任意接口上的地址都算）。

use std::net::Ipv4Addr;

use tracing::trace;

use crate::net::{Adjacency, NodeId, Topology};

/// 命中的路由来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RouteSource {
    Default,
    Static,
    OnLink,
}

/// 查表结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    /// 链路层要找的地址：直连时是目的地址本身，否则是网关
    pub target: Ipv4Addr,
    pub source: RouteSource,
    pub prefix_len: u8,
}

/// 报文被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 没有匹配的路由
    NoRoute,
    /// 找不到持有该地址的链路邻居
    Unresolved(Ipv4Addr),
    /// 节点未开启转发
    NotForwarding,
    /// TTL 耗尽
    TtlExpired,
}

/// 最长前缀匹配；前缀长度相同时直连优先于静态路由，静态路由优先于默认路由。
pub fn lookup(topo: &Topology, node: NodeId, dst: Ipv4Addr) -> Option<Lookup> {
    let me = topo.node(node);

    let on_link = me
        .ifaces()
        .iter()
        .filter_map(|&i| topo.iface(i).subnet())
        .filter(|net| net.contains(&dst))
        .map(|net| Lookup {
            target: dst,
            source: RouteSource::OnLink,
            prefix_len: net.prefix_len(),
        });
    let fixed = me.routes().lookup(dst).map(|e| Lookup {
        target: e.via,
        source: RouteSource::Static,
        prefix_len: e.dest.prefix_len(),
    });
    let default = me.default_gateway().map(|gw| Lookup {
        target: gw,
        source: RouteSource::Default,
        prefix_len: 0,
    });

    on_link
        .chain(fixed)
        .chain(default)
        .max_by_key(|l| (l.prefix_len, l.source))
}

/// 把 `target` 解析为一个邻接关系。
///
/// 先找直接持有该地址的邻居（出接口子网包含 target 的优先）；找不到时，
/// 允许正在转发的邻居做 proxy ARP：它必须能经由另一条链路把 target 交给
/// 真正的持有者。
pub fn resolve(topo: &Topology, node: NodeId, target: Ipv4Addr) -> Option<Adjacency> {
    let adjs: Vec<Adjacency> = topo.adjacencies(node).collect();
    let in_subnet = |adj: &Adjacency| {
        topo.iface(adj.egress)
            .subnet()
            .is_some_and(|net| net.contains(&target))
    };
    let owned_by_peer = |adj: &Adjacency| topo.owns(topo.iface(adj.peer).node(), target);

    let direct = adjs
        .iter()
        .copied()
        .filter(|a| in_subnet(a))
        .chain(adjs.iter().copied().filter(|a| !in_subnet(a)))
        .find(|a| owned_by_peer(a));
    if direct.is_some() {
        return direct;
    }

    let proxy = adjs.iter().copied().find(|adj| {
        let peer_node = topo.iface(adj.peer).node();
        topo.node(peer_node).forwarding()
            && topo
                .adjacencies(peer_node)
                .any(|behind| behind.link != adj.link && owned_by_peer(&behind))
    });
    if let Some(adj) = proxy {
        trace!(%target, via = %topo.iface(adj.peer).label(), "proxy ARP 应答");
    }
    proxy
}

/// 计算从 `node` 发往 `dst` 的出口邻接
pub fn next_hop(topo: &Topology, node: NodeId, dst: Ipv4Addr) -> Result<Adjacency, DropReason> {
    let route = lookup(topo, node, dst).ok_or(DropReason::NoRoute)?;
    resolve(topo, node, route.target).ok_or(DropReason::Unresolved(route.target))
}

/// 节点经由 `adj` 发包时使用的源地址
pub fn source_addr(topo: &Topology, node: NodeId, adj: &Adjacency) -> Option<Ipv4Addr> {
    topo.iface(adj.egress)
        .ip()
        .or_else(|| topo.primary_addr(node))
}
