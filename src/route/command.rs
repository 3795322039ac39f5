//! 内核命令渲染
//!
//! 把路由表翻译成 namespace 内要执行的命令。

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use super::table::RouteEntry;
use crate::net::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandStyle {
    /// `route add -net ... netmask ... gw ...`
    #[default]
    NetTools,
    /// `ip route replace ... via ...`，重复执行结果不变
    Iproute2,
}

impl FromStr for CommandStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "net-tools" | "route" => Ok(CommandStyle::NetTools),
            "iproute2" | "ip" => Ok(CommandStyle::Iproute2),
            other => Err(format!(
                "unknown command style {other:?} (expected net-tools or iproute2)"
            )),
        }
    }
}

impl fmt::Display for CommandStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStyle::NetTools => f.write_str("net-tools"),
            CommandStyle::Iproute2 => f.write_str("iproute2"),
        }
    }
}

impl RouteEntry {
    pub fn command(&self, style: CommandStyle) -> String {
        match style {
            CommandStyle::NetTools => format!(
                "route add -net {} netmask {} gw {}",
                self.dest.network(),
                self.dest.netmask(),
                self.via
            ),
            CommandStyle::Iproute2 => format!("ip route replace {} via {}", self.dest, self.via),
        }
    }
}

pub fn default_route_command(gateway: Ipv4Addr, style: CommandStyle) -> String {
    match style {
        CommandStyle::NetTools => format!("route add default gw {gateway}"),
        CommandStyle::Iproute2 => format!("ip route replace default via {gateway}"),
    }
}

/// 节点的完整路由配置：默认路由在前，随后是静态路由
pub fn node_commands(node: &Node, style: CommandStyle) -> Vec<String> {
    node.default_gateway()
        .map(|gw| default_route_command(gw, style))
        .into_iter()
        .chain(node.routes().entries().map(|e| e.command(style)))
        .collect()
}
