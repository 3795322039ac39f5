//! 运行中的实验网络
//!
//! `EmulatedLab` 持有已安装路由的拓扑，创建时执行所有节点的启动钩子，
//! `shutdown` 时执行停止钩子并交还拓扑。每次探测都新建一个仿真器，
//! 报文按链路时延逐跳推进，直到事件队列清空。

use std::net::Ipv4Addr;

use tracing::{debug, info, trace, warn};

use super::forward::{self, DropReason};
use super::packet::{DEFAULT_TTL, Packet, PacketKind};
use crate::net::{NodeId, Topology};
use crate::sim::{Event, SimTime, Simulator};

/// 探测源端收到的一个应答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub probe: u64,
    pub from: Ipv4Addr,
    pub kind: PacketKind,
    pub at: SimTime,
}

/// 被丢弃的报文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dropped {
    pub probe: u64,
    pub node: NodeId,
    pub reason: DropReason,
}

/// 累计计数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LabStats {
    pub sent_pkts: u64,
    pub forwarded_pkts: u64,
    pub delivered_pkts: u64,
    pub dropped_pkts: u64,
}

pub struct EmulatedLab {
    topo: Topology,
    next_pkt_id: u64,
    next_probe: u64,
    replies: Vec<Reply>,
    drops: Vec<Dropped>,
    pub stats: LabStats,
}

/// 事件：报文经链路到达某个节点
struct Arrive {
    node: NodeId,
    pkt: Packet,
}

impl Event<EmulatedLab> for Arrive {
    fn fire(self: Box<Self>, sim: &mut Simulator<EmulatedLab>, lab: &mut EmulatedLab) {
        let Arrive { node, pkt } = *self;
        lab.on_arrive(node, pkt, sim);
    }
}

impl EmulatedLab {
    /// 启动实验网络：执行全部节点的启动钩子
    pub fn start(mut topo: Topology) -> Self {
        let hooks = topo.start();
        info!(hooks = hooks.len(), "🚦 实验网络已启动");
        Self {
            topo,
            next_pkt_id: 0,
            next_probe: 0,
            replies: Vec::new(),
            drops: Vec::new(),
            stats: LabStats::default(),
        }
    }

    /// 停止实验网络并交还拓扑
    pub fn shutdown(mut self) -> Topology {
        self.topo.stop();
        info!(stats = ?self.stats, "🛑 实验网络已停止");
        self.topo
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    /// 最近一次探测中被丢弃的报文
    pub fn drops(&self) -> &[Dropped] {
        &self.drops
    }

    /// 从 `src` 发出一个 echo request，运行到网络静默，返回源端收到的应答。
    #[tracing::instrument(skip(self), fields(src_name = %self.topo.node(src).name()))]
    pub(crate) fn probe(&mut self, src: NodeId, dst: Ipv4Addr, ttl: u8) -> Vec<Reply> {
        let probe = self.next_probe;
        self.next_probe += 1;
        self.replies.clear();
        self.drops.clear();

        let mut sim = Simulator::default();

        if self.topo.owns(src, dst) {
            trace!("目的地址是本机");
            self.replies.push(Reply {
                probe,
                from: dst,
                kind: PacketKind::EchoReply,
                at: SimTime::ZERO,
            });
            return std::mem::take(&mut self.replies);
        }

        let src_addr = match forward::next_hop(&self.topo, src, dst) {
            Ok(adj) => forward::source_addr(&self.topo, src, &adj),
            Err(reason) => {
                self.drop_pkt(probe, src, reason);
                return Vec::new();
            }
        };
        let Some(src_addr) = src_addr else {
            warn!("源节点没有可用地址");
            return Vec::new();
        };

        let pkt = self.make_packet(probe, src_addr, dst, ttl, PacketKind::EchoRequest);
        self.send(src, pkt, &mut sim);
        sim.run(self);

        debug!(
            replies = self.replies.len(),
            drops = self.drops.len(),
            events = sim.executed(),
            "探测结束"
        );
        std::mem::take(&mut self.replies)
    }

    fn make_packet(
        &mut self,
        probe: u64,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        ttl: u8,
        kind: PacketKind,
    ) -> Packet {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        Packet {
            id,
            probe,
            src,
            dst,
            ttl,
            kind,
        }
    }

    /// 从 `node` 把报文发到下一跳
    fn send(&mut self, node: NodeId, pkt: Packet, sim: &mut Simulator<EmulatedLab>) {
        match forward::next_hop(&self.topo, node, pkt.dst) {
            Ok(adj) => {
                let next = self.topo.iface(adj.peer).node();
                let latency = self.topo.link(adj.link).latency;
                trace!(
                    pkt_id = pkt.id,
                    from = %self.topo.node(node).name(),
                    to = %self.topo.node(next).name(),
                    via = %self.topo.iface(adj.egress).label(),
                    "发送报文"
                );
                self.stats.sent_pkts += 1;
                sim.schedule_in(latency, Arrive { node: next, pkt });
            }
            Err(reason) => self.drop_pkt(pkt.probe, node, reason),
        }
    }

    /// 由 `node` 生成一个发往 `dst` 的新报文并发送。
    ///
    /// `from` 为 None 时源地址取出接口地址（TimeExceeded），echo reply
    /// 则固定用被 ping 的地址作源地址。
    fn originate(
        &mut self,
        node: NodeId,
        probe: u64,
        from: Option<Ipv4Addr>,
        dst: Ipv4Addr,
        kind: PacketKind,
        sim: &mut Simulator<EmulatedLab>,
    ) {
        let egress_src = match forward::next_hop(&self.topo, node, dst) {
            Ok(adj) => forward::source_addr(&self.topo, node, &adj),
            Err(reason) => {
                self.drop_pkt(probe, node, reason);
                return;
            }
        };
        let Some(src) = from.or(egress_src) else { return };
        let pkt = self.make_packet(probe, src, dst, DEFAULT_TTL, kind);
        self.send(node, pkt, sim);
    }

    fn on_arrive(&mut self, node: NodeId, mut pkt: Packet, sim: &mut Simulator<EmulatedLab>) {
        if self.topo.owns(node, pkt.dst) {
            self.stats.delivered_pkts += 1;
            match pkt.kind {
                PacketKind::EchoRequest => {
                    trace!(pkt_id = pkt.id, "收到 echo request，回应答");
                    self.originate(
                        node,
                        pkt.probe,
                        Some(pkt.dst),
                        pkt.src,
                        PacketKind::EchoReply,
                        sim,
                    );
                }
                kind => {
                    self.replies.push(Reply {
                        probe: pkt.probe,
                        from: pkt.src,
                        kind,
                        at: sim.now(),
                    });
                }
            }
            return;
        }

        if !self.topo.node(node).forwarding() {
            self.drop_pkt(pkt.probe, node, DropReason::NotForwarding);
            return;
        }

        pkt.ttl = pkt.ttl.saturating_sub(1);
        if pkt.ttl == 0 {
            self.drop_pkt(pkt.probe, node, DropReason::TtlExpired);
            if !pkt.is_response() {
                self.originate(node, pkt.probe, None, pkt.src, PacketKind::TimeExceeded, sim);
            }
            return;
        }

        self.stats.forwarded_pkts += 1;
        self.send(node, pkt, sim);
    }

    fn drop_pkt(&mut self, probe: u64, node: NodeId, reason: DropReason) {
        debug!(node_name = %self.topo.node(node).name(), ?reason, "❌ 丢弃报文");
        self.stats.dropped_pkts += 1;
        self.drops.push(Dropped {
            probe,
            node,
            reason,
        });
    }
}
