//! 静态路由模块
//!
//! 路由表、安装器以及把路由翻译成内核命令的渲染。

mod command;
mod installer;
mod table;

pub use command::{CommandStyle, default_route_command, node_commands};
pub use installer::{RouteScope, StaticRouteInstaller};
pub use table::{RouteEntry, RouteTable};
