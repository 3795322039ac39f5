//! 拓扑构建
//!
//! 目前只有 LAN 链式拓扑（三路由器三 LAN 实验是它的默认配置）。

pub mod lan_chain;

pub use lan_chain::{LabSpec, LanChain, LanChainDecl, LanNodes, LanSpec, build_lan_chain, declare_lan_chain};
