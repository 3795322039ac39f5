//! 事件 trait
//!
//! 定义仿真事件接口。

use super::simulator::Simulator;

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
///
/// `W` 是事件作用的世界（例如正在运行的实验网络）。
pub trait Event<W>: 'static {
    fn fire(self: Box<Self>, sim: &mut Simulator<W>, world: &mut W);
}
