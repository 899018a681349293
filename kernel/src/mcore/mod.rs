//! Multi-core bring-up and the global scheduler
//!
//! The boot core installs an idle task for every core before releasing the
//! secondaries, so a tick on any online core finds its runqueue ready. Each
//! core becomes its own idle task by falling into [`turn_idle`].

use kernel_platform::get_board_model;
use kernel_sched::{CpuSet, Priority, Scheduler, SpawnError, Stack, TaskEntry, TaskHandle};
use log::info;

use crate::arch::aarch64::{cpu, interrupts, Aarch64};
use crate::arch::traits::Architecture;

pub mod cleanup;

/// Priority of housekeeping tasks that never block. They share the CPU
/// round-robin and only run when no real work is ready.
pub const BACKGROUND: Priority = Priority(250);

/// The per-CPU runqueues of every core.
pub static SCHEDULER: Scheduler<Aarch64> = Scheduler::new();

/// Set up the runqueues, start the reaper and release the secondary cores.
///
/// Runs on the boot core with interrupts still masked.
pub fn init() {
    SCHEDULER.init();
    cleanup::TaskCleanup::init();
    cpu::start_secondaries(get_board_model());
}

/// Entry of cores 1.. once boot.S gave them a stack.
#[unsafe(no_mangle)]
pub extern "C" fn secondary_main(cpu_id: u64) -> ! {
    Aarch64::early_init();
    interrupts::init_secondary();
    let started = cpu::mark_started();
    info!("cpu {} online, {} of {} cores up", cpu_id, started, cpu::NR_CPUS);

    turn_idle()
}

/// Makes the calling code the idle task of this core.
///
/// The idle task never blocks; a tick switches away from it whenever a task
/// is ready and comes back once the queue drains.
pub fn turn_idle() -> ! {
    Aarch64::enable_interrupts();
    loop {
        Aarch64::wait_for_interrupt();
    }
}

/// Spawn a kernel task with a fresh default-sized stack.
///
/// # Errors
/// Returns the scheduler's error if the affinity is unusable.
///
/// # Panics
/// Panics if the heap cannot hold the stack.
pub fn spawn(
    entry: TaskEntry,
    arg: u64,
    priority: Priority,
    affinity: CpuSet,
    name: &str,
) -> Result<TaskHandle, SpawnError> {
    let stack = Stack::allocate(kernel_sched::DEFAULT_STACK_SIZE)
        .unwrap_or_else(|e| panic!("cannot allocate stack for {name}: {e}"));
    SCHEDULER.spawn(entry, arg, stack, priority, affinity, name)
}

/// Return address of every task entry. Running off the end of a task
/// exits it.
pub extern "C" fn task_exit() -> ! {
    SCHEDULER.exit_current()
}
