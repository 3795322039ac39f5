//! 链路类型
//!
//! 一条链路恰好连接两个接口，每个物理连接只创建一次。

use super::id::{IfaceId, LinkId};
use crate::sim::SimTime;

/// 网络链路（无向）
#[derive(Debug, Clone)]
pub struct Link {
    pub(crate) id: LinkId,
    pub(crate) a: IfaceId,
    pub(crate) b: IfaceId,
    /// 单向传播时延
    pub latency: SimTime,
    /// 管理状态；down 的链路不参与路由计算和转发
    pub(crate) up: bool,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// 链路两端的接口
    pub fn ends(&self) -> (IfaceId, IfaceId) {
        (self.a, self.b)
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    /// 给定一端，返回另一端
    pub fn other(&self, iface: IfaceId) -> Option<IfaceId> {
        if iface == self.a {
            Some(self.b)
        } else if iface == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}
