use super::{id, installed_lab};
use crate::error::Error;
use crate::net::{LinkOpts, NodeOpts, SubnetKind, Topology, TopologyBuilder, overlaps};
use crate::route::{RouteEntry, RouteScope, StaticRouteInstaller};
use crate::topo::{LabSpec, LanSpec, build_lan_chain};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

fn net(s: &str) -> Ipv4Net {
    s.parse().expect("valid prefix")
}

fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("valid address")
}

fn routes_of(topo: &Topology, name: &str) -> Vec<(Ipv4Net, Ipv4Addr)> {
    topo.routes(id(topo, name))
        .entries()
        .map(|e| (e.dest, e.via))
        .collect()
}

#[test]
fn router_a_reaches_lans_b_and_c_through_router_b() {
    let lab = installed_lab(RouteScope::Full);
    assert_eq!(
        routes_of(&lab.topo, "rA"),
        vec![
            (net("20.10.172.0/25"), ip("20.10.100.2")),
            (net("20.10.172.192/27"), ip("20.10.100.2")),
        ]
    );
}

#[test]
fn router_b_splits_between_its_two_backbone_neighbours() {
    let lab = installed_lab(RouteScope::Full);
    assert_eq!(
        routes_of(&lab.topo, "rB"),
        vec![
            (net("20.10.172.128/26"), ip("20.10.100.1")),
            (net("20.10.172.192/27"), ip("20.10.100.3")),
        ]
    );
}

#[test]
fn router_c_uses_router_b_interface_on_its_link() {
    let lab = installed_lab(RouteScope::Full);
    assert_eq!(
        routes_of(&lab.topo, "rC"),
        vec![
            (net("20.10.172.0/25"), ip("20.10.100.4")),
            (net("20.10.172.128/26"), ip("20.10.100.4")),
        ]
    );
}

#[test]
fn hosts_route_other_lans_via_their_gateway() {
    let lab = installed_lab(RouteScope::Full);
    let expected = [
        ("hA1", "20.10.172.129", ["20.10.172.0/25", "20.10.172.192/27"]),
        ("hA2", "20.10.172.129", ["20.10.172.0/25", "20.10.172.192/27"]),
        ("hB1", "20.10.172.1", ["20.10.172.128/26", "20.10.172.192/27"]),
        ("hB2", "20.10.172.1", ["20.10.172.128/26", "20.10.172.192/27"]),
        ("hC1", "20.10.172.193", ["20.10.172.0/25", "20.10.172.128/26"]),
        ("hC2", "20.10.172.193", ["20.10.172.0/25", "20.10.172.128/26"]),
    ];
    for (host, gw, dests) in expected {
        let want: Vec<(Ipv4Net, Ipv4Addr)> = dests.iter().map(|d| (net(d), ip(gw))).collect();
        assert_eq!(routes_of(&lab.topo, host), want, "routes of {host}");
        assert_eq!(
            lab.topo.node(id(&lab.topo, host)).default_gateway(),
            Some(ip(gw))
        );
    }
}

#[test]
fn installed_destinations_never_overlap_on_link_subnets_or_each_other() {
    let lab = installed_lab(RouteScope::Full);
    let topo = &lab.topo;
    for node in topo.nodes() {
        let on_link = topo.on_link(node.id());
        let dests: Vec<Ipv4Net> = node.routes().entries().map(|e| e.dest).collect();
        for (i, d) in dests.iter().enumerate() {
            assert!(
                on_link.iter().all(|l| !overlaps(l, d)),
                "{} routes its own subnet {d}",
                node.name()
            );
            for other in &dests[i + 1..] {
                assert!(!overlaps(d, other), "{} has overlapping {d} / {other}", node.name());
            }
        }
    }
}

#[test]
fn every_subnet_is_covered_on_every_node() {
    let lab = installed_lab(RouteScope::Full);
    let topo = &lab.topo;
    for node in topo.nodes() {
        let on_link = topo.on_link(node.id());
        for subnet in topo.subnets() {
            let covered = on_link.contains(&subnet.net)
                || node.routes().get(&subnet.net).is_some()
                || (subnet.kind == SubnetKind::Backbone && node.default_gateway().is_some());
            assert!(covered, "{} cannot reach {}", node.name(), subnet.net);
        }
    }
}

#[test]
fn next_hop_is_always_on_link() {
    let lab = installed_lab(RouteScope::Full);
    let topo = &lab.topo;
    for node in topo.nodes() {
        let on_link = topo.on_link(node.id());
        for RouteEntry { dest, via } in node.routes().entries() {
            assert!(
                on_link.iter().any(|l| l.contains(&via)),
                "{}: {dest} via {via} is not a neighbour",
                node.name()
            );
        }
    }
}

#[test]
fn reinstall_is_idempotent() {
    let mut lab = installed_lab(RouteScope::Full);
    let before = serde_json::to_vec(&lab.topo.plan()).unwrap();

    let installer = StaticRouteInstaller::new(RouteScope::Full);
    installer.install(&mut lab.topo).unwrap();
    installer.install(&mut lab.topo).unwrap();

    let after = serde_json::to_vec(&lab.topo.plan()).unwrap();
    assert_eq!(before, after);
    assert_eq!(lab.topo.routes(id(&lab.topo, "rA")).len(), 2);
}

#[test]
fn backbone_only_scope_installs_nothing_in_default_lab() {
    let lab = installed_lab(RouteScope::BackboneOnly);
    for node in lab.topo.nodes() {
        assert!(node.routes().is_empty(), "{} has routes", node.name());
    }
}

#[test]
fn backbone_only_still_routes_remote_backbone_segments() {
    // 两个骨干网段：rA 需要一条到 10.0.1.0/30 的路由
    let mut b = TopologyBuilder::new();
    let ra = b.add_router("rA");
    let rb = b.add_router("rB");
    let rc = b.add_router("rC");
    b.add_link(
        ra,
        rb,
        LinkOpts::default()
            .a_addr(net("10.0.0.1/30"))
            .b_addr(net("10.0.0.2/30")),
    );
    b.add_link(
        rb,
        rc,
        LinkOpts::default()
            .a_addr(net("10.0.1.1/30"))
            .b_addr(net("10.0.1.2/30")),
    );
    let mut topo = b.build().unwrap();
    StaticRouteInstaller::new(RouteScope::BackboneOnly)
        .install(&mut topo)
        .unwrap();

    assert_eq!(
        routes_of(&topo, "rA"),
        vec![(net("10.0.1.0/30"), ip("10.0.0.2"))]
    );
    assert_eq!(
        routes_of(&topo, "rC"),
        vec![(net("10.0.0.0/30"), ip("10.0.1.1"))]
    );
    assert!(topo.routes(rb).is_empty());
}

#[test]
fn downed_link_makes_lan_c_unreachable_and_keeps_old_table() {
    let mut lab = installed_lab(RouteScope::Full);
    let topo = &mut lab.topo;
    let (ra, rb, rc) = (id(topo, "rA"), id(topo, "rB"), id(topo, "rC"));
    let before = topo.routes(ra).clone();

    let link = topo.link_between(rb, rc).expect("rB-rC link");
    topo.set_link_up(link, false);

    let err = StaticRouteInstaller::new(RouteScope::Full)
        .install(topo)
        .unwrap_err();
    match err {
        Error::UnreachableSubnet { node, subnet } => {
            assert_eq!(node, "rA");
            assert_eq!(subnet, net("20.10.172.192/27"));
        }
        other => panic!("expected unreachable subnet, got {other:?}"),
    }
    assert_eq!(topo.routes(ra), &before);

    topo.set_link_up(link, true);
    StaticRouteInstaller::new(RouteScope::Full)
        .install(topo)
        .unwrap();
    assert_eq!(topo.routes(ra), &before);
    assert_eq!(topo.routes(rc).len(), 2);
}

#[test]
fn compute_does_not_touch_the_topology() {
    let mut lab = installed_lab(RouteScope::BackboneOnly);
    let ra = id(&lab.topo, "rA");
    let table = StaticRouteInstaller::new(RouteScope::Full)
        .compute(&lab.topo, ra)
        .unwrap();
    assert_eq!(table.len(), 2);
    assert!(lab.topo.routes(ra).is_empty());

    let n = StaticRouteInstaller::new(RouteScope::Full)
        .install_node(&mut lab.topo, ra)
        .unwrap();
    assert_eq!(n, 2);
    assert_eq!(lab.topo.routes(ra), &table);
}

#[test]
fn overlapping_lan_is_reported_as_route_conflict() {
    let mut spec = LabSpec::default();
    spec.lans[1] = LanSpec {
        name: "B".to_string(),
        subnet: net("20.10.172.0/24"),
        hosts: 2,
    };
    let mut chain = build_lan_chain(&spec).expect("addresses are still unique");

    let err = StaticRouteInstaller::new(RouteScope::Full)
        .install(&mut chain.topo)
        .unwrap_err();
    match err {
        Error::RouteConflict {
            node,
            dest,
            existing,
        } => {
            assert_eq!(node, "rA");
            assert_eq!(dest, net("20.10.172.0/24"));
            assert_eq!(existing, net("20.10.172.128/26"));
        }
        other => panic!("expected route conflict, got {other:?}"),
    }
    assert!(chain.topo.routes(chain.routers[0]).is_empty());
}

#[test]
fn non_forwarding_router_is_not_used_as_transit() {
    // h0 -- r0 -- mid -- r1 -- h1，mid 不具备转发能力
    let mut b = TopologyBuilder::new();
    let r0 = b.add_router("r0");
    let mid = b.add_node(
        "mid",
        NodeOpts {
            forwarding: false,
            ..NodeOpts::router()
        },
    );
    let r1 = b.add_router("r1");
    let h0 = b.add_host("h0", net("10.0.0.2/24"), ip("10.0.0.1"));
    let h1 = b.add_host("h1", net("10.0.1.2/24"), ip("10.0.1.1"));
    b.add_link(h0, r0, LinkOpts::default().b_addr(net("10.0.0.1/24")));
    b.add_link(h1, r1, LinkOpts::default().b_addr(net("10.0.1.1/24")));
    b.add_link(
        r0,
        mid,
        LinkOpts::default()
            .a_addr(net("10.1.0.1/30"))
            .b_addr(net("10.1.0.2/30")),
    );
    b.add_link(
        mid,
        r1,
        LinkOpts::default()
            .a_addr(net("10.1.1.1/30"))
            .b_addr(net("10.1.1.2/30")),
    );
    let topo = b.build().unwrap();

    let installer = StaticRouteInstaller::new(RouteScope::Full);
    // mid 自己可以算出全部路由
    let mid_table = installer.compute(&topo, mid).unwrap();
    assert_eq!(mid_table.get(&net("10.0.0.0/24")), Some(ip("10.1.0.1")));
    assert_eq!(mid_table.get(&net("10.0.1.0/24")), Some(ip("10.1.1.2")));

    // r0 无法经过 mid 到达 10.0.1.0/24
    match installer.compute(&topo, r0).unwrap_err() {
        Error::UnreachableSubnet { node, subnet } => {
            assert_eq!(node, "r0");
            assert_eq!(subnet, net("10.0.1.0/24"));
        }
        other => panic!("expected unreachable subnet, got {other:?}"),
    }
}

#[test]
fn route_scope_parses_from_cli_spelling() {
    assert_eq!("full".parse::<RouteScope>(), Ok(RouteScope::Full));
    assert_eq!(
        "backbone-only".parse::<RouteScope>(),
        Ok(RouteScope::BackboneOnly)
    );
    assert!("everything".parse::<RouteScope>().is_err());
    assert_eq!(RouteScope::BackboneOnly.to_string(), "backbone-only");
}
