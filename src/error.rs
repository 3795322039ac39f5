//! 错误类型
//!
//! 拓扑构建与静态路由安装阶段可能出现的全部错误。所有错误都在探测（ping /
//! traceroute）之前被发现，并直接向调用者传播。

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use thiserror::Error;

/// 本 crate 的统一结果类型
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// 拓扑输入不合法（地址冲突、链路两端不在同一子网等）
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 同一节点上出现重复或重叠的目的子网
    #[error("route conflict on {node}: {dest} overlaps {existing}")]
    RouteConflict {
        node: String,
        dest: Ipv4Net,
        existing: Ipv4Net,
    },

    /// 图中找不到通往目的子网的路径
    #[error("subnet {subnet} is unreachable from {node}")]
    UnreachableSubnet { node: String, subnet: Ipv4Net },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid lab spec: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn duplicate_address(addr: Ipv4Addr, first: &str, second: &str) -> Self {
        Error::config(format!(
            "address {addr} is assigned to both {first} and {second}"
        ))
    }
}
