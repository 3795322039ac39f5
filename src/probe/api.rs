//! Connectivity-probe API.
//!
//! Routing code only depends on the `Prober` trait; the results are opaque
//! pass/fail/hop-list data used to validate installed routes after the fact.

use std::fmt;
use std::net::Ipv4Addr;

use tracing::info;

use super::lab::EmulatedLab;
use super::packet::{DEFAULT_TTL, PacketKind};
use crate::net::{NodeId, Topology};
use crate::sim::SimTime;

/// Default hop limit for traceroute.
pub const DEFAULT_MAX_HOPS: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    Reply { rtt: SimTime },
    Timeout,
}

impl PingOutcome {
    pub fn is_reply(&self) -> bool {
        matches!(self, PingOutcome::Reply { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHop {
    pub ttl: u8,
    /// `None` means no answer for this TTL (printed as `*`).
    pub addr: Option<Ipv4Addr>,
    pub rtt: Option<SimTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traceroute {
    pub dst: Ipv4Addr,
    pub max_hops: u8,
    pub hops: Vec<TraceHop>,
    pub reached: bool,
}

impl fmt::Display for Traceroute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "traceroute to {} ({}), {} hops max",
            self.dst, self.dst, self.max_hops
        )?;
        for hop in &self.hops {
            match (hop.addr, hop.rtt) {
                (Some(addr), Some(rtt)) => writeln!(f, "{:>2}  {addr} ({addr})  {rtt}", hop.ttl)?,
                _ => writeln!(f, "{:>2}  *", hop.ttl)?,
            }
        }
        Ok(())
    }
}

/// One ping between two named nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResult {
    pub src: String,
    pub dst: String,
    pub dst_addr: Ipv4Addr,
    pub outcome: PingOutcome,
}

/// Result of a batch of pings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingReport {
    pub results: Vec<PingResult>,
}

impl PingReport {
    pub fn sent(&self) -> usize {
        self.results.len()
    }

    pub fn received(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_reply()).count()
    }

    /// Dropped percentage, rounded down like the emulator CLI.
    pub fn dropped_pct(&self) -> u32 {
        if self.results.is_empty() {
            return 0;
        }
        let lost = self.sent() - self.received();
        (lost * 100 / self.sent()) as u32
    }

    pub fn all_received(&self) -> bool {
        self.received() == self.sent()
    }
}

impl fmt::Display for PingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut srcs: Vec<&str> = Vec::new();
        for r in &self.results {
            if !srcs.contains(&r.src.as_str()) {
                srcs.push(&r.src);
            }
        }
        for src in srcs {
            write!(f, "{src} ->")?;
            for r in self.results.iter().filter(|r| r.src == src) {
                if r.outcome.is_reply() {
                    write!(f, " {}", r.dst)?;
                } else {
                    f.write_str(" X")?;
                }
            }
            writeln!(f)?;
        }
        write!(
            f,
            "*** Results: {}% dropped ({}/{} received)",
            self.dropped_pct(),
            self.received(),
            self.sent()
        )
    }
}

/// Connectivity probes provided by the emulation platform.
pub trait Prober {
    fn topology(&self) -> &Topology;

    fn ping(&mut self, src: NodeId, dst: Ipv4Addr) -> PingOutcome;

    fn traceroute(&mut self, src: NodeId, dst: Ipv4Addr, max_hops: u8) -> Traceroute;

    /// Ping every ordered pair of `nodes`, using each destination's first address.
    fn ping_mesh(&mut self, nodes: &[NodeId]) -> PingReport {
        let targets: Vec<(NodeId, String, Option<Ipv4Addr>)> = nodes
            .iter()
            .map(|&n| {
                let topo = self.topology();
                (n, topo.node(n).name().to_string(), topo.primary_addr(n))
            })
            .collect();

        let mut report = PingReport::default();
        for (src, src_name, _) in &targets {
            for (dst, dst_name, dst_addr) in &targets {
                if src == dst {
                    continue;
                }
                let Some(dst_addr) = *dst_addr else { continue };
                let outcome = self.ping(*src, dst_addr);
                report.results.push(PingResult {
                    src: src_name.clone(),
                    dst: dst_name.clone(),
                    dst_addr,
                    outcome,
                });
            }
        }
        info!(
            sent = report.sent(),
            received = report.received(),
            "📶 ping mesh finished"
        );
        report
    }

    /// Ping between all hosts.
    fn ping_all(&mut self) -> PingReport {
        let hosts: Vec<NodeId> = self
            .topology()
            .nodes()
            .iter()
            .filter(|n| n.is_host())
            .map(|n| n.id())
            .collect();
        self.ping_mesh(&hosts)
    }
}

impl Prober for EmulatedLab {
    fn topology(&self) -> &Topology {
        EmulatedLab::topology(self)
    }

    fn ping(&mut self, src: NodeId, dst: Ipv4Addr) -> PingOutcome {
        self.probe(src, dst, DEFAULT_TTL)
            .into_iter()
            .find(|r| r.kind == PacketKind::EchoReply && r.from == dst)
            .map(|r| PingOutcome::Reply { rtt: r.at })
            .unwrap_or(PingOutcome::Timeout)
    }

    fn traceroute(&mut self, src: NodeId, dst: Ipv4Addr, max_hops: u8) -> Traceroute {
        let mut hops = Vec::new();
        let mut reached = false;
        for ttl in 1..=max_hops {
            let reply = self.probe(src, dst, ttl).into_iter().next();
            hops.push(TraceHop {
                ttl,
                addr: reply.map(|r| r.from),
                rtt: reply.map(|r| r.at),
            });
            if reply.is_some_and(|r| r.kind == PacketKind::EchoReply) {
                reached = true;
                break;
            }
        }
        Traceroute {
            dst,
            max_hops,
            hops,
            reached,
        }
    }
}
