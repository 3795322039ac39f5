//! 子网
//!
//! 子网由带地址的接口推导而来：所有截断后网络号相同的接口属于同一子网。

use ipnet::Ipv4Net;
use serde::Serialize;

use super::id::NodeId;

/// 子网类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    /// 至少挂了一台主机的子网
    Lan,
    /// 只连接路由器的骨干子网
    Backbone,
}

#[derive(Debug, Clone)]
pub struct Subnet {
    pub net: Ipv4Net,
    pub kind: SubnetKind,
    /// 直连该子网的节点（升序、去重）
    pub attached: Vec<NodeId>,
}

impl Subnet {
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.attached.binary_search(&node).is_ok()
    }
}

/// 两个前缀是否有地址重叠（包含或相等）
pub fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
