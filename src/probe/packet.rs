//! 探测报文
//!
//! 只建模 ICMP 风格的三类报文，足够支撑 ping 和 traceroute。

use std::net::Ipv4Addr;

/// 新发报文的初始 TTL
pub const DEFAULT_TTL: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    EchoRequest,
    EchoReply,
    /// 中间路由器 TTL 耗尽时回给源端
    TimeExceeded,
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    /// 属于哪一次探测
    pub probe: u64,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub ttl: u8,
    pub kind: PacketKind,
}

impl Packet {
    /// 是否为差错/应答报文（这类报文 TTL 耗尽时不再回 TimeExceeded）
    pub fn is_response(&self) -> bool {
        !matches!(self.kind, PacketKind::EchoRequest)
    }
}
