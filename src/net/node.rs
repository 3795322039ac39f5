//! 节点类型
//!
//! 路由器与主机共用同一个 `Node` 结构：是否转发由能力标志
//! `forwarding_capable` 决定，运行期的转发开关由 `start`/`stop` 钩子切换。

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::id::{IfaceId, NodeId};
use crate::route::RouteTable;

/// 开启内核转发的命令（节点启动时执行）
pub const IP_FORWARD_ON: &str = "sysctl net.ipv4.ip_forward=1";
/// 关闭内核转发的命令（节点停止时执行）
pub const IP_FORWARD_OFF: &str = "sysctl net.ipv4.ip_forward=0";
/// 让路由器替同一子网、挂在其它端口上的邻居应答 ARP
pub const PROXY_ARP_ON: &str = "sysctl net.ipv4.conf.all.proxy_arp=1";

const START_HOOKS: &[&str] = &[IP_FORWARD_ON, PROXY_ARP_ON];
const STOP_HOOKS: &[&str] = &[IP_FORWARD_OFF];

/// 节点角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Router,
    Host,
}

/// 网络节点
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    role: NodeRole,
    pub(crate) ifaces: Vec<IfaceId>,
    forwarding_capable: bool,
    /// 运行期开关，仅在 `start` 之后且具备转发能力时为 true
    forwarding: bool,
    default_gateway: Option<Ipv4Addr>,
    pub(crate) routes: RouteTable,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        name: impl Into<String>,
        role: NodeRole,
        forwarding_capable: bool,
        default_gateway: Option<Ipv4Addr>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            ifaces: Vec::new(),
            forwarding_capable,
            forwarding: false,
            default_gateway,
            routes: RouteTable::default(),
        }
    }

    /// 获取节点标识符
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// 获取节点名称
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn is_router(&self) -> bool {
        self.role == NodeRole::Router
    }

    pub fn is_host(&self) -> bool {
        self.role == NodeRole::Host
    }

    /// 节点的全部接口（按创建顺序）
    pub fn ifaces(&self) -> &[IfaceId] {
        &self.ifaces
    }

    pub fn forwarding_capable(&self) -> bool {
        self.forwarding_capable
    }

    /// 当前是否在转发数据包
    pub fn forwarding(&self) -> bool {
        self.forwarding
    }

    pub fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.default_gateway
    }

    /// 已安装的静态路由表
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// 启动钩子：具备转发能力的节点打开 ip_forward 和 proxy_arp。
    ///
    /// 返回实际执行的命令；不具备转发能力的节点返回空切片。
    #[tracing::instrument(skip(self), fields(node_name = %self.name))]
    pub fn start(&mut self) -> &'static [&'static str] {
        if !self.forwarding_capable {
            debug!("节点不具备转发能力，跳过");
            return &[];
        }
        self.forwarding = true;
        info!(cmds = ?START_HOOKS, "🟢 开启转发");
        START_HOOKS
    }

    /// 停止钩子：关闭 ip_forward。
    #[tracing::instrument(skip(self), fields(node_name = %self.name))]
    pub fn stop(&mut self) -> &'static [&'static str] {
        if !self.forwarding_capable {
            return &[];
        }
        self.forwarding = false;
        info!(cmds = ?STOP_HOOKS, "🔴 关闭转发");
        STOP_HOOKS
    }
}
