//! LAN 链式拓扑构建
//!
//! 每个 LAN 挂在一台路由器后面，路由器之间按声明顺序串成一条链，
//! 共享同一个骨干子网。默认配置就是三路由器、三 LAN 的实验：
//!
//! ```text
//! hA1,hA2 -- rA --(20.10.100.0/24)-- rB --(20.10.100.0/24)-- rC -- hC1,hC2
//!                                     |
//!                                  hB1,hB2
//! ```

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::net::{LinkOpts, NodeId, Topology, TopologyBuilder};
use crate::route::RouteScope;
use crate::sim::SimTime;

fn default_hosts() -> usize {
    2
}

fn default_link_latency_us() -> u64 {
    50
}

/// 子网内可分配的主机地址数（/31、/32 不扣网络号和广播地址）
pub(crate) fn usable_hosts(net: &Ipv4Net) -> u64 {
    let size = 1u64 << (32 - u32::from(net.prefix_len()));
    if net.prefix_len() >= 31 { size } else { size - 2 }
}

/// 实验配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabSpec {
    pub backbone: Ipv4Net,
    pub lans: Vec<LanSpec>,
    #[serde(default = "default_link_latency_us")]
    pub link_latency_us: u64,
    #[serde(default)]
    pub scope: RouteScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanSpec {
    /// LAN 名称，用于派生节点名：`r<name>`、`h<name><k>`
    pub name: String,
    pub subnet: Ipv4Net,
    #[serde(default = "default_hosts")]
    pub hosts: usize,
}

impl LanSpec {
    fn new(name: &str, subnet: Ipv4Net) -> Self {
        Self {
            name: name.to_string(),
            subnet,
            hosts: default_hosts(),
        }
    }
}

impl Default for LabSpec {
    fn default() -> Self {
        let net = |a, b, c, d, len| {
            Ipv4Net::new(Ipv4Addr::new(a, b, c, d), len).expect("static prefix length")
        };
        Self {
            backbone: net(20, 10, 100, 0, 24),
            lans: vec![
                LanSpec::new("A", net(20, 10, 172, 128, 26)),
                LanSpec::new("B", net(20, 10, 172, 0, 25)),
                LanSpec::new("C", net(20, 10, 172, 192, 27)),
            ],
            link_latency_us: default_link_latency_us(),
            scope: RouteScope::Full,
        }
    }
}

impl LabSpec {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn link_latency(&self) -> SimTime {
        SimTime::from_micros(self.link_latency_us)
    }

    fn validate(&self) -> Result<()> {
        if self.lans.is_empty() {
            return Err(Error::config("lab spec declares no LAN"));
        }
        let routers = self.lans.len();
        // 中间路由器各需要两个骨干地址
        let backbone_needed = routers + routers.saturating_sub(2);
        if routers > 1 && usable_hosts(&self.backbone) < backbone_needed as u64 {
            return Err(Error::config(format!(
                "backbone {} cannot address {backbone_needed} router interfaces",
                self.backbone
            )));
        }
        for lan in &self.lans {
            if lan.name.is_empty() {
                return Err(Error::config("LAN with an empty name"));
            }
            if lan.hosts == 0 {
                return Err(Error::config(format!("LAN {} has no hosts", lan.name)));
            }
            if usable_hosts(&lan.subnet) < lan.hosts as u64 + 1 {
                return Err(Error::config(format!(
                    "LAN {} ({}) is too small for a gateway and {} hosts",
                    lan.name, lan.subnet, lan.hosts
                )));
            }
        }
        Ok(())
    }
}

/// 某个 LAN 在拓扑中的节点
#[derive(Debug, Clone)]
pub struct LanNodes {
    pub name: String,
    pub subnet: Ipv4Net,
    pub gateway: Ipv4Addr,
    pub router: NodeId,
    pub hosts: Vec<NodeId>,
}

/// 构建结果：拓扑以及各 LAN 的节点索引
#[derive(Debug, Clone)]
pub struct LanChain {
    pub topo: Topology,
    pub routers: Vec<NodeId>,
    pub lans: Vec<LanNodes>,
}

impl LanChain {
    pub fn lan(&self, name: &str) -> Option<&LanNodes> {
        self.lans.iter().find(|l| l.name == name)
    }
}

/// 声明阶段的产物，调用者可以在 `build` 之前继续往里加东西
#[derive(Debug)]
pub struct LanChainDecl {
    pub builder: TopologyBuilder,
    pub routers: Vec<NodeId>,
    pub lans: Vec<LanNodes>,
}

impl LanChainDecl {
    pub fn build(self) -> Result<LanChain> {
        Ok(LanChain {
            topo: self.builder.build()?,
            routers: self.routers,
            lans: self.lans,
        })
    }
}

/// 只声明节点和链路，不做拓扑校验
#[tracing::instrument(skip(spec), fields(lans = spec.lans.len(), backbone = %spec.backbone))]
pub fn declare_lan_chain(spec: &LabSpec) -> Result<LanChainDecl> {
    spec.validate()?;

    let latency = spec.link_latency();
    let backbone_len = spec.backbone.prefix_len();
    let backbone_at = |nth: usize| -> Result<Ipv4Net> {
        let ip = spec
            .backbone
            .hosts()
            .nth(nth)
            .ok_or_else(|| Error::config(format!("backbone {} exhausted", spec.backbone)))?;
        Ipv4Net::new(ip, backbone_len).map_err(|e| Error::config(e.to_string()))
    };

    let mut b = TopologyBuilder::new();

    let routers: Vec<NodeId> = spec
        .lans
        .iter()
        .map(|lan| b.add_router(format!("r{}", lan.name)))
        .collect();

    // 路由器端口编号：LAN 端口从 eth1 开始，骨干端口紧随其后
    let mut next_port: Vec<usize> = vec![1; routers.len()];
    let mut lans = Vec::with_capacity(spec.lans.len());

    for (i, lan) in spec.lans.iter().enumerate() {
        let router = routers[i];
        let rname = format!("r{}", lan.name);
        let mut addrs = lan.subnet.hosts();
        let gateway = addrs
            .next()
            .ok_or_else(|| Error::config(format!("LAN {} has no usable address", lan.name)))?;
        let prefix = lan.subnet.prefix_len();

        let mut hosts = Vec::with_capacity(lan.hosts);
        for k in 0..lan.hosts {
            let ip = addrs.next().ok_or_else(|| {
                Error::config(format!("LAN {} ran out of addresses", lan.name))
            })?;
            let host_addr = Ipv4Net::new(ip, prefix).map_err(|e| Error::config(e.to_string()))?;
            let hname = format!("h{}{}", lan.name, k + 1);
            let host = b.add_host(&hname, host_addr, gateway);

            let port = next_port[i];
            next_port[i] += 1;
            let mut opts = LinkOpts::labels(format!("{hname}-eth0"), format!("{rname}-eth{port}"))
                .latency(latency);
            // 第一个 LAN 端口持有网关地址，其余端口 unnumbered
            if k == 0 {
                let gw = Ipv4Net::new(gateway, prefix).map_err(|e| Error::config(e.to_string()))?;
                opts = opts.b_addr(gw);
            }
            b.add_link(host, router, opts);
            hosts.push(host);
        }

        debug!(lan = %lan.name, subnet = %lan.subnet, %gateway, hosts = hosts.len(), "声明 LAN");
        lans.push(LanNodes {
            name: lan.name.clone(),
            subnet: lan.subnet,
            gateway,
            router,
            hosts,
        });
    }

    // 骨干：路由器 i 的第一个骨干接口取第 i+1 个地址，多出来的接口从 n+1 开始顺延
    let n = routers.len();
    let mut first_backbone = vec![true; n];
    let mut extra = n;
    let mut backbone_addr = |i: usize| -> Result<Ipv4Net> {
        if first_backbone[i] {
            first_backbone[i] = false;
            backbone_at(i)
        } else {
            let nth = extra;
            extra += 1;
            backbone_at(nth)
        }
    };

    for i in 1..n {
        let (left, right) = (i - 1, i);
        let left_addr = backbone_addr(left)?;
        let right_addr = backbone_addr(right)?;
        let lport = next_port[left];
        next_port[left] += 1;
        let rport = next_port[right];
        next_port[right] += 1;

        let opts = LinkOpts::labels(
            format!("r{}-eth{lport}", spec.lans[left].name),
            format!("r{}-eth{rport}", spec.lans[right].name),
        )
        .a_addr(left_addr)
        .b_addr(right_addr)
        .latency(latency);
        b.add_link(routers[left], routers[right], opts);
    }

    info!(routers = n, "🗺️  LAN 链式拓扑声明完成");
    Ok(LanChainDecl {
        builder: b,
        routers,
        lans,
    })
}

/// 声明并构建
pub fn build_lan_chain(spec: &LabSpec) -> Result<LanChain> {
    declare_lan_chain(spec)?.build()
}
