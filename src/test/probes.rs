use super::{id, installed_lab};
use crate::net::NodeId;
use crate::probe::{
    DEFAULT_MAX_HOPS, DropReason, EmulatedLab, PacketKind, PingOutcome, Prober, RouteSource,
    lookup,
};
use crate::route::RouteScope;
use crate::sim::SimTime;
use std::net::Ipv4Addr;

fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("valid address")
}

fn started(scope: RouteScope) -> EmulatedLab {
    EmulatedLab::start(installed_lab(scope).topo)
}

fn node(lab: &EmulatedLab, name: &str) -> NodeId {
    id(lab.topology(), name)
}

#[test]
fn intra_lan_ping_goes_through_the_router() {
    let mut lab = started(RouteScope::Full);
    let ha1 = node(&lab, "hA1");
    // 点对点主机链路：请求和应答各经过 rA 一次，四段链路
    assert_eq!(
        lab.ping(ha1, ip("20.10.172.131")),
        PingOutcome::Reply {
            rtt: SimTime::from_micros(200)
        }
    );
    assert_eq!(lab.stats.forwarded_pkts, 2);
}

#[test]
fn inter_lan_ping_crosses_the_backbone() {
    let mut lab = started(RouteScope::Full);
    let ha1 = node(&lab, "hA1");
    assert_eq!(
        lab.ping(ha1, ip("20.10.172.2")),
        PingOutcome::Reply {
            rtt: SimTime::from_micros(300)
        }
    );
    let hc2 = node(&lab, "hC2");
    assert_eq!(
        lab.ping(hc2, ip("20.10.172.3")),
        PingOutcome::Reply {
            rtt: SimTime::from_micros(300)
        }
    );
}

#[test]
fn hosts_can_ping_router_addresses() {
    let mut lab = started(RouteScope::Full);
    let hb1 = node(&lab, "hB1");
    assert!(lab.ping(hb1, ip("20.10.172.1")).is_reply());
    // 远端骨干地址经默认路由可达
    assert!(lab.ping(hb1, ip("20.10.100.3")).is_reply());
    assert!(lab.ping(hb1, ip("20.10.172.193")).is_reply());
}

#[test]
fn echo_reply_comes_from_the_pinged_address() {
    let mut lab = started(RouteScope::Full);
    let ha1 = node(&lab, "hA1");
    // rB 面向 hA1 的出接口是 .2，但被 ping 的是 rB-eth4 的 .4
    assert_eq!(
        lab.ping(ha1, ip("20.10.100.4")),
        PingOutcome::Reply {
            rtt: SimTime::from_micros(200)
        }
    );
    let replies = lab.probe(ha1, ip("20.10.172.193"), 64);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].from, ip("20.10.172.193"));
    assert_eq!(replies[0].kind, PacketKind::EchoReply);
}

#[test]
fn ping_own_address_answers_immediately() {
    let mut lab = started(RouteScope::Full);
    let ha1 = node(&lab, "hA1");
    assert_eq!(
        lab.ping(ha1, ip("20.10.172.130")),
        PingOutcome::Reply { rtt: SimTime::ZERO }
    );
}

#[test]
fn ping_unassigned_address_times_out() {
    let mut lab = started(RouteScope::Full);
    let ha1 = node(&lab, "hA1");
    assert_eq!(lab.ping(ha1, ip("20.10.172.150")), PingOutcome::Timeout);
    assert_eq!(
        lab.drops()[0].reason,
        DropReason::Unresolved(ip("20.10.172.150"))
    );
}

#[test]
fn ping_all_succeeds_with_full_routes() {
    let mut lab = started(RouteScope::Full);
    let report = lab.ping_all();
    assert_eq!(report.sent(), 30);
    assert_eq!(report.received(), 30);
    assert_eq!(report.dropped_pct(), 0);
    assert!(report.all_received());

    let text = report.to_string();
    assert!(text.starts_with("hA1 -> hA2 hB1 hB2 hC1 hC2\n"), "{text}");
    assert!(text.ends_with("*** Results: 0% dropped (30/30 received)"), "{text}");
}

#[test]
fn backbone_only_scope_isolates_the_lans() {
    let mut lab = started(RouteScope::BackboneOnly);
    let report = lab.ping_all();
    assert_eq!(report.sent(), 30);
    assert_eq!(report.received(), 6);
    assert_eq!(report.dropped_pct(), 80);
    assert!(!report.all_received());
    assert!(report.to_string().contains("hA1 -> hA2 X X X X\n"));

    // 请求在 rA 因为没有路由被丢弃
    let ha1 = node(&lab, "hA1");
    let ra = node(&lab, "rA");
    assert_eq!(lab.ping(ha1, ip("20.10.172.2")), PingOutcome::Timeout);
    let drop = lab.drops()[0];
    assert_eq!(drop.node, ra);
    assert_eq!(drop.reason, DropReason::NoRoute);
}

#[test]
fn ping_mesh_covers_ordered_pairs() {
    let mut lab = started(RouteScope::Full);
    let lan_c: Vec<NodeId> = ["rC", "hC1", "hC2"]
        .iter()
        .map(|n| node(&lab, n))
        .collect();
    let report = lab.ping_mesh(&lan_c);
    assert_eq!(report.sent(), 6);
    assert!(report.all_received());
    assert_eq!(report.results[0].src, "rC");
    assert_eq!(report.results[0].dst, "hC1");
    assert_eq!(report.results[0].dst_addr, ip("20.10.172.194"));
}

#[test]
fn traceroute_lists_each_router_hop() {
    let mut lab = started(RouteScope::Full);
    let ha1 = node(&lab, "hA1");
    let trace = lab.traceroute(ha1, ip("20.10.172.194"), DEFAULT_MAX_HOPS);

    assert!(trace.reached);
    let addrs: Vec<Option<Ipv4Addr>> = trace.hops.iter().map(|h| h.addr).collect();
    assert_eq!(
        addrs,
        vec![
            Some(ip("20.10.172.129")),
            Some(ip("20.10.100.2")),
            Some(ip("20.10.100.3")),
            Some(ip("20.10.172.194")),
        ]
    );
    let rtts: Vec<Option<SimTime>> = trace.hops.iter().map(|h| h.rtt).collect();
    assert_eq!(
        rtts,
        [100, 200, 300, 400]
            .map(|us| Some(SimTime::from_micros(us)))
            .to_vec()
    );

    let text = trace.to_string();
    assert!(text.starts_with("traceroute to 20.10.172.194 (20.10.172.194), 30 hops max\n"));
    assert!(text.contains(" 1  20.10.172.129 (20.10.172.129)  0.100 ms\n"), "{text}");
    assert!(text.contains(" 4  20.10.172.194 (20.10.172.194)  0.400 ms\n"), "{text}");
}

#[test]
fn traceroute_stops_at_max_hops() {
    let mut lab = started(RouteScope::Full);
    let ha1 = node(&lab, "hA1");
    let trace = lab.traceroute(ha1, ip("20.10.172.194"), 2);
    assert!(!trace.reached);
    assert_eq!(trace.hops.len(), 2);
    assert_eq!(trace.hops[1].addr, Some(ip("20.10.100.2")));
}

#[test]
fn traceroute_without_route_prints_stars() {
    let mut lab = started(RouteScope::BackboneOnly);
    let ha1 = node(&lab, "hA1");
    let trace = lab.traceroute(ha1, ip("20.10.172.194"), 3);
    assert!(!trace.reached);
    // 第一跳 rA 仍然会回 TimeExceeded，之后没有任何应答
    assert_eq!(trace.hops[0].addr, Some(ip("20.10.172.129")));
    assert_eq!(trace.hops[1].addr, None);
    assert!(trace.to_string().contains(" 2  *\n"));
}

#[test]
fn lookup_prefers_longest_prefix() {
    let lab = started(RouteScope::Full);
    let topo = lab.topology();
    let ha1 = node(&lab, "hA1");

    let hit = lookup(topo, ha1, ip("20.10.172.194")).unwrap();
    assert_eq!(hit.source, RouteSource::Static);
    assert_eq!(hit.prefix_len, 27);
    assert_eq!(hit.target, ip("20.10.172.129"));

    let hit = lookup(topo, ha1, ip("20.10.100.2")).unwrap();
    assert_eq!(hit.source, RouteSource::Default);

    let hit = lookup(topo, ha1, ip("20.10.172.131")).unwrap();
    assert_eq!(hit.source, RouteSource::OnLink);
    assert_eq!(hit.target, ip("20.10.172.131"));

    let ra = node(&lab, "rA");
    assert!(lookup(topo, ra, ip("8.8.8.8")).is_none());
}

#[test]
fn start_and_shutdown_toggle_forwarding() {
    let chain = installed_lab(RouteScope::Full);
    let ra = id(&chain.topo, "rA");
    let ha1 = id(&chain.topo, "hA1");
    assert!(!chain.topo.node(ra).forwarding());

    let lab = EmulatedLab::start(chain.topo);
    assert!(lab.topology().node(ra).forwarding());
    assert!(!lab.topology().node(ha1).forwarding());

    let topo = lab.shutdown();
    assert!(!topo.node(ra).forwarding());
    // 路由表随拓扑一起交还
    assert_eq!(topo.routes(ra).len(), 2);
}

#[test]
fn start_hooks_enable_forwarding_and_proxy_arp_on_routers_only() {
    let mut topo = installed_lab(RouteScope::Full).topo;
    let hooks = topo.start();
    assert_eq!(hooks.len(), 6);
    assert!(hooks.iter().all(|(name, _)| name.starts_with('r')));
    assert_eq!(
        hooks[0],
        ("rA".to_string(), "sysctl net.ipv4.ip_forward=1")
    );
    assert_eq!(
        hooks[1],
        ("rA".to_string(), "sysctl net.ipv4.conf.all.proxy_arp=1")
    );

    let stops = topo.stop();
    assert_eq!(stops.len(), 3);
    assert_eq!(stops[2], ("rC".to_string(), "sysctl net.ipv4.ip_forward=0"));
}

