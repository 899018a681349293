//! Preemptive multi-core scheduler
//!
//! Every CPU owns a priority-ordered runqueue of ready tasks plus an idle
//! task that runs when the queue is empty. Lower priority values run first;
//! tasks of equal priority rotate round-robin on every reschedule.
//!
//! The crate knows nothing about exception entry. The architecture layer
//! traps into [`Scheduler::tick`] (timer interrupt) or
//! [`Scheduler::reschedule`] (yield), handing over the trapped register
//! file; the scheduler saves it into the outgoing task and overwrites it with
//! the incoming task's registers so the exception return resumes the new
//! task.
//!
//! Every CPU also keeps a list of software timers counted in its own ticks;
//! they back [`Scheduler::sleep`] and [`Scheduler::add_timer`].

#![no_std]

extern crate alloc;

mod arch;
mod cpuset;
mod percpu;
mod registers;
mod runqueue;
mod scheduler;
mod stack;
mod task;
mod timer;

pub use arch::Arch;
pub use cpuset::CpuSet;
pub use percpu::PerCpu;
pub use registers::RegisterFile;
pub use runqueue::{RunQueue, TaskHandle};
pub use scheduler::{SchedStats, Scheduler, SpawnError, TaskEntry};
pub use stack::{DEFAULT_STACK_SIZE, Stack, StackAllocationError};
pub use task::{Pid, Priority, TASK_NAME_LEN, Task, TaskName, TaskState};
pub use timer::{TimerCallback, TimerId};

/// Upper bound on CPUs the scheduler manages.
pub const MAX_CPUS: usize = 8;
