//! Per-CPU software timers
//!
//! Each CPU keeps a list of timers sorted by expiry, counted in scheduler
//! ticks of that CPU. [`Scheduler::tick`](crate::Scheduler::tick) advances
//! the list and fires whatever expired before picking the next task.

use alloc::vec::Vec;

use crate::TaskHandle;

/// Function run when a timer expires, with the argument it was armed with.
/// Runs in interrupt context on the CPU that armed it.
pub type TimerCallback = fn(u64);

/// What an expired timer does.
#[derive(Debug, Clone, Copy)]
pub enum TimerAction {
    /// Wake a task that went to sleep.
    Wake(TaskHandle),
    Call(TimerCallback, u64),
}

/// An armed timer, for [`Scheduler::cancel_timer`](crate::Scheduler::cancel_timer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    pub(crate) cpu: usize,
    pub(crate) seq: u64,
}

impl TimerId {
    pub fn cpu(&self) -> usize {
        self.cpu
    }
}

struct Timer {
    expires: u64,
    seq: u64,
    action: TimerAction,
}

/// The timers of one CPU. Timers with the same expiry fire in the order
/// they were armed.
pub struct TimerList {
    now: u64,
    next_seq: u64,
    timers: Vec<Timer>,
}

impl TimerList {
    pub const fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            timers: Vec::new(),
        }
    }

    /// Ticks counted so far.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Arm a timer `delay` ticks from now. A zero delay fires on the next
    /// tick. Returns the sequence number identifying the timer.
    pub(crate) fn arm(&mut self, delay: u64, action: TimerAction) -> u64 {
        let expires = self.now.saturating_add(delay.max(1));
        let seq = self.next_seq;
        self.next_seq += 1;
        let pos = self.timers.partition_point(|t| t.expires <= expires);
        self.timers.insert(pos, Timer { expires, seq, action });
        seq
    }

    pub(crate) fn cancel(&mut self, seq: u64) -> bool {
        match self.timers.iter().position(|t| t.seq == seq) {
            Some(index) => {
                self.timers.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn advance(&mut self) {
        self.now += 1;
    }

    /// Remove the earliest timer if it is due.
    pub(crate) fn pop_expired(&mut self) -> Option<TimerAction> {
        if self.timers.first()?.expires > self.now {
            return None;
        }
        Some(self.timers.remove(0).action)
    }
}

impl Default for TimerList {
    fn default() -> Self {
        Self::new()
    }
}
