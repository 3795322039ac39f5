//! 网络拓扑模块
//!
//! 此模块包含拓扑的核心组件：节点、接口、链路、子网，以及构建器和导出视图。

// 子模块声明
mod id;
mod node;
mod interface;
mod link;
mod subnet;
mod topology;
mod builder;
mod plan;

// 重新导出公共接口
pub use id::{IfaceId, LinkId, NodeId};
pub use node::{IP_FORWARD_OFF, IP_FORWARD_ON, Node, NodeRole, PROXY_ARP_ON};
pub use interface::Interface;
pub use link::Link;
pub use subnet::{Subnet, SubnetKind, overlaps};
pub use topology::{Adjacency, Topology};
pub use builder::{DEFAULT_LINK_LATENCY, LinkOpts, NodeOpts, TopologyBuilder};
pub use plan::{InterfacePlan, LabPlan, LinkPlan, NodePlan};
