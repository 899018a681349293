use kernel_sched::CpuSet;

use super::{BACKGROUND, SCHEDULER};
use crate::arch::aarch64::Aarch64;
use crate::arch::traits::Architecture;

/// Releases the TCBs and stacks of exited tasks.
///
/// Runs on the boot core at background priority and sleeps until the next
/// interrupt after every sweep.
pub struct TaskCleanup;

impl TaskCleanup {
    pub fn init() {
        super::spawn(Self::run, 0, BACKGROUND, CpuSet::CPU0, "reaper")
            .expect("should be able to create task cleanup");
    }

    extern "C" fn run(_arg: u64) {
        loop {
            let reaped: usize = (0..SCHEDULER.nr_online())
                .map(|cpu| SCHEDULER.reap(cpu))
                .sum();
            if reaped > 0 {
                log::trace!("TaskCleanup: released {} tasks", reaped);
            }
            Aarch64::wait_for_interrupt();
        }
    }
}
