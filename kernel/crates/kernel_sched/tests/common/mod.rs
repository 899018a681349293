#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use kernel_sched::{
    Arch, CpuSet, Pid, Priority, RegisterFile, Scheduler, Stack, TaskHandle,
};

pub const EXIT_TRAMPOLINE: u64 = 0xFFFF_0000_DEAD_0000;

thread_local! {
    static CPU: Cell<usize> = const { Cell::new(0) };
    static NR_CPUS: Cell<usize> = const { Cell::new(4) };
    static MASKED: Cell<bool> = const { Cell::new(false) };
    static YIELDS: Cell<usize> = const { Cell::new(0) };
    static IPIS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Host stand-in for the CPU. State is per test thread.
///
/// Yields are counted instead of trapping; tests drive
/// [`Scheduler::reschedule`] themselves.
pub struct TestArch;

impl TestArch {
    pub fn set_cpu(cpu: usize) {
        CPU.with(|c| c.set(cpu));
    }

    pub fn set_nr_cpus(n: usize) {
        NR_CPUS.with(|c| c.set(n));
    }

    pub fn irqs_masked() -> bool {
        MASKED.with(Cell::get)
    }

    pub fn yields() -> usize {
        YIELDS.with(Cell::get)
    }

    /// Target CPUs of the reschedule IPIs sent so far, oldest first.
    pub fn take_ipis() -> Vec<usize> {
        IPIS.with(|ipis| ipis.take())
    }
}

impl Arch for TestArch {
    fn cpu_id() -> usize {
        CPU.with(Cell::get)
    }

    fn nr_cpus() -> usize {
        NR_CPUS.with(Cell::get)
    }

    fn irq_save() -> u64 {
        MASKED.with(|m| u64::from(m.replace(true)))
    }

    fn irq_restore(saved: u64) {
        MASKED.with(|m| m.set(saved != 0));
    }

    fn yield_trap() {
        YIELDS.with(|y| y.set(y.get() + 1));
    }

    fn exit_trampoline() -> u64 {
        EXIT_TRAMPOLINE
    }

    fn send_reschedule(cpu: usize) {
        IPIS.with(|ipis| ipis.borrow_mut().push(cpu));
    }
}

pub extern "C" fn task_entry(_arg: u64) {}

pub fn scheduler() -> Scheduler<TestArch> {
    TestArch::set_cpu(0);
    let sched = Scheduler::new();
    sched.init();
    sched
}

pub fn spawn(sched: &Scheduler<TestArch>, priority: u8, name: &str) -> TaskHandle {
    spawn_on(sched, priority, CpuSet::CPU0, name)
}

pub fn spawn_on(
    sched: &Scheduler<TestArch>,
    priority: u8,
    affinity: CpuSet,
    name: &str,
) -> TaskHandle {
    let stack = Stack::allocate(4096).unwrap();
    sched
        .spawn(task_entry, 0, stack, Priority(priority), affinity, name)
        .unwrap()
}

pub fn current_pid(sched: &Scheduler<TestArch>, cpu: usize) -> Pid {
    sched.stats(cpu).unwrap().current
}

pub fn tick(sched: &Scheduler<TestArch>) -> Pid {
    let mut frame = RegisterFile::zeroed();
    sched.tick(&mut frame);
    current_pid(sched, TestArch::cpu_id())
}

pub fn check(sched: &Scheduler<TestArch>, cpu: usize) {
    sched.with_runqueue(cpu, |rq| rq.check_invariants());
}
