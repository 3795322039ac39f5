mod installer;
mod probes;

use crate::net::{NodeId, Topology};
use crate::route::{RouteScope, StaticRouteInstaller};
use crate::topo::{LabSpec, LanChain, build_lan_chain};

/// 默认三 LAN 实验，已安装指定范围的路由
fn installed_lab(scope: RouteScope) -> LanChain {
    let mut chain = build_lan_chain(&LabSpec::default()).expect("default lab builds");
    StaticRouteInstaller::new(scope)
        .install(&mut chain.topo)
        .expect("default lab installs");
    chain
}

fn id(topo: &Topology, name: &str) -> NodeId {
    topo.node_by_name(name)
        .unwrap_or_else(|| panic!("no node named {name}"))
}
