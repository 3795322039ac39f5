//! 仿真器
//!
//! 单线程的事件驱动仿真器，维护当前时间与事件队列。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use std::collections::BinaryHeap;
use tracing::{debug, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
pub struct Simulator<W> {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    q: BinaryHeap<ScheduledEvent<W>>,
}

impl<W: 'static> Default for Simulator<W> {
    fn default() -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            executed: 0,
            q: BinaryHeap::new(),
        }
    }
}

impl<W: 'static> Simulator<W> {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件数
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn is_idle(&self) -> bool {
        self.q.is_empty()
    }

    /// 调度事件在指定时间执行
    pub fn schedule<E: Event<W>>(&mut self, at: SimTime, ev: E) {
        let seq = self.next_seq;
        trace!(now = ?self.now, at = ?at, seq, "调度事件");
        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });
    }

    /// 在当前时间之后 `delay` 执行
    pub fn schedule_in<E: Event<W>>(&mut self, delay: SimTime, ev: E) {
        let at = self.now.saturating_add(delay);
        self.schedule(at, ev);
    }

    /// 运行所有事件直到队列为空。
    pub fn run(&mut self, world: &mut W) {
        while let Some(item) = self.q.pop() {
            self.now = item.at;
            self.executed += 1;
            item.ev.fire(self, world);
        }
        debug!(events = self.executed, final_time = ?self.now, "事件队列已清空");
    }
}
