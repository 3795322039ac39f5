//! 连通性探测
//!
//! ping / traceroute 的接口定义，以及基于事件仿真的内置实现。

mod api;
mod forward;
mod lab;
mod packet;

pub use api::{
    DEFAULT_MAX_HOPS, PingOutcome, PingReport, PingResult, Prober, TraceHop, Traceroute,
};
pub use forward::{DropReason, Lookup, RouteSource, lookup, next_hop, resolve, source_addr};
pub use lab::{Dropped, EmulatedLab, LabStats, Reply};
pub use packet::{DEFAULT_TTL, Packet, PacketKind};
