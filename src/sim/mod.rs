//! 仿真核心模块
//!
//! 探测报文在拓扑上的逐跳转发由这里的事件驱动仿真器推进。

// 子模块声明
mod event;
mod scheduled_event;
mod simulator;
mod time;

// 重新导出公共接口
pub use event::Event;
pub use scheduled_event::ScheduledEvent;
pub use simulator::Simulator;
pub use time::SimTime;
