mod common;

use std::cell::Cell;

use common::{
    EXIT_TRAMPOLINE, TestArch, check, current_pid, scheduler, spawn, spawn_on, task_entry, tick,
};
use kernel_sched::{
    CpuSet, MAX_CPUS, Pid, Priority, RegisterFile, Scheduler, SpawnError, Stack, TaskState,
};

#[test]
fn init_installs_idle_on_every_cpu() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();

    assert_eq!(sched.nr_online(), 4);
    for cpu in 0..4 {
        let stats = sched.stats(cpu).unwrap();
        assert_eq!(stats.current, Pid::IDLE);
        assert_eq!(stats.queued, 0);
        sched.with_runqueue(cpu, |rq| {
            let idle = rq.idle();
            assert_eq!(idle.priority(), Priority::IDLE);
            assert_eq!(idle.state(), TaskState::Running);
            assert_eq!(*idle.registers(), RegisterFile::zeroed());
            assert!(!idle.is_queued());
        });
    }
    assert!(sched.current(4).is_none());
    assert!(sched.stats(MAX_CPUS - 1).is_none());
}

#[test]
fn cpu_count_is_clamped() {
    TestArch::set_nr_cpus(64);
    let sched = scheduler();
    assert_eq!(sched.nr_online(), MAX_CPUS);
    TestArch::set_nr_cpus(4);
}

#[test]
#[should_panic(expected = "initialised twice")]
fn init_cpu_twice_panics() {
    TestArch::set_nr_cpus(1);
    let sched = scheduler();
    sched.init_cpu(0);
}

#[test]
fn round_robin_within_priority() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let b = spawn(&sched, 100, "B");
    let c = spawn(&sched, 100, "C");
    let pids = [a, b, c].map(|h| sched.pid(h).unwrap());

    let picked: Vec<Pid> = (0..6)
        .map(|_| {
            let handle = sched.pick_next(0).unwrap();
            check(&sched, 0);
            sched.pid(handle).unwrap()
        })
        .collect();

    assert_eq!(picked, [pids[0], pids[1], pids[2], pids[0], pids[1], pids[2]]);
}

#[test]
fn higher_priority_preempts_on_tick() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let a_pid = sched.pid(a).unwrap();
    assert_eq!(tick(&sched), a_pid);
    assert_eq!(sched.stats(0).unwrap().queued, 0);

    let b = spawn(&sched, 50, "B");
    let b_pid = sched.pid(b).unwrap();

    assert_eq!(tick(&sched), b_pid);
    assert_eq!(sched.state(a), Some(TaskState::Ready));

    assert_eq!(tick(&sched), b_pid);
    sched.with_runqueue(0, |rq| {
        let queued: Vec<Pid> = rq.queued().map(|slot| rq.task(slot).pid()).collect();
        assert_eq!(queued, [a_pid]);
    });
    check(&sched, 0);
}

#[test]
fn equal_priority_tasks_share_ticks_fairly() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    const N: usize = 5;
    let pids: Vec<Pid> = (0..N)
        .map(|i| sched.pid(spawn(&sched, 64, &format!("worker{i}"))).unwrap())
        .collect();

    let mut runs = [0usize; N];
    for _ in 0..10 * N {
        let pid = tick(&sched);
        let index = pids.iter().position(|&p| p == pid).unwrap();
        runs[index] += 1;
    }

    for count in runs {
        assert!((9..=11).contains(&count), "unfair distribution {runs:?}");
    }
    assert_eq!(sched.stats(0).unwrap().tick_count, 10 * N as u64);
}

#[test]
fn spawn_initialises_registers() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let stack = Stack::allocate(8192).unwrap();
    let top = stack.top();
    let handle = sched
        .spawn(task_entry, 0xAA55, stack, Priority(10), CpuSet::CPU0, "regs")
        .unwrap();

    let mut frame = RegisterFile::zeroed();
    frame.x[7] = 7;
    frame.elr = 0x8_0000;
    sched.tick(&mut frame);

    assert_eq!(frame.x[0], 0xAA55);
    assert_eq!(frame.x[30], EXIT_TRAMPOLINE);
    assert_eq!(frame.x[7], 0);
    assert_eq!(frame.sp, top & !0xF);
    assert_eq!(frame.sp % 16, 0);
    assert_eq!(frame.elr, task_entry as usize as u64);
    assert_eq!(frame.spsr, RegisterFile::SPSR_EL1H_IRQ_ON);
    assert_eq!(frame.spsr & 0x80, 0, "IRQs must be unmasked");
    assert_eq!(frame.spsr & 0xF, 0b0101, "EL1h");

    // the interrupted idle context was saved
    sched.with_runqueue(0, |rq| {
        assert_eq!(rq.idle().registers().x[7], 7);
        assert_eq!(rq.idle().registers().elr, 0x8_0000);
    });
    assert_eq!(sched.pid(handle), Some(Pid::new(1)));
}

#[test]
fn context_switch_saves_and_restores_symmetrically() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let mut frame = RegisterFile::zeroed();
    sched.tick(&mut frame);

    // A runs and dirties its registers
    frame.x[5] = 0x5555;
    frame.x[29] = 0x2929;
    frame.sp -= 64;
    let a_state = frame;

    let b = spawn(&sched, 100, "B");
    sched.tick(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(b).unwrap());
    assert_ne!(frame, a_state);

    sched.tick(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(a).unwrap());
    assert_eq!(frame, a_state);
}

#[test]
fn single_task_keeps_its_frame() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    spawn(&sched, 100, "solo");
    let mut frame = RegisterFile::zeroed();
    sched.tick(&mut frame);
    frame.x[3] = 33;

    sched.tick(&mut frame);

    assert_eq!(frame.x[3], 33);
    assert_eq!(sched.stats(0).unwrap().schedule_count, 2);
}

#[test]
#[should_panic(expected = "context switch into zombie")]
fn switching_into_a_zombie_panics() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    assert!(sched.kill(a));

    let mut frame = RegisterFile::zeroed();
    sched.with_runqueue(0, |rq| {
        let zombie = rq.resolve(a).unwrap();
        rq.context_switch(rq.idle_slot(), zombie, &mut frame);
    });
}

#[test]
fn yield_traps_and_reschedules() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let b = spawn(&sched, 100, "B");
    let mut frame = RegisterFile::zeroed();
    sched.reschedule(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(a).unwrap());

    let before = TestArch::yields();
    sched.yield_now();
    assert_eq!(TestArch::yields(), before + 1);

    sched.reschedule(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(b).unwrap());
    assert_eq!(sched.stats(0).unwrap().tick_count, 0);
}

#[test]
fn block_and_wake() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let b = spawn(&sched, 100, "B");
    let mut frame = RegisterFile::zeroed();
    sched.reschedule(&mut frame);

    sched.block_current();
    assert_eq!(sched.state(a), Some(TaskState::Blocked));
    sched.reschedule(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(b).unwrap());
    check(&sched, 0);

    // blocked tasks are skipped
    sched.tick(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(b).unwrap());

    assert!(sched.wake(a));
    assert_eq!(sched.state(a), Some(TaskState::Ready));
    assert!(!sched.wake(a));
    check(&sched, 0);

    sched.tick(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(a).unwrap());
}

#[test]
fn wake_before_trap_keeps_task_running() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let mut frame = RegisterFile::zeroed();
    sched.reschedule(&mut frame);

    sched.block_current();
    assert!(sched.wake(a));
    assert_eq!(sched.state(a), Some(TaskState::Running));
    check(&sched, 0);

    sched.reschedule(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(a).unwrap());
}

#[test]
#[should_panic(expected = "idle task cannot block")]
fn idle_cannot_block() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    sched.block_current();
}

#[test]
fn killed_tasks_are_reaped() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let b = spawn(&sched, 100, "B");
    let c = spawn(&sched, 100, "C");
    let mut frame = RegisterFile::zeroed();
    sched.reschedule(&mut frame);

    // a queued task is unlinked right away
    assert!(sched.kill(c));
    assert_eq!(sched.stats(0).unwrap().queued, 1);
    check(&sched, 0);

    // the running task keeps the cpu until the next reschedule
    assert!(sched.kill(a));
    assert_eq!(sched.reap(0), 1);
    sched.reschedule(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(b).unwrap());
    assert_eq!(sched.stats(0).unwrap().queued, 0);

    // A's stack is released only after the cpu switched once more
    assert_eq!(sched.reap(0), 0);
    sched.reschedule(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(b).unwrap());
    assert_eq!(sched.reap(0), 1);
    assert_eq!(sched.pid(a), None);
    assert_eq!(sched.pid(c), None);
    assert!(!sched.kill(a));
    assert!(!sched.wake(a));
    check(&sched, 0);
}

#[test]
fn idle_cannot_be_killed() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let idle = sched.current(0).unwrap();
    assert!(!sched.kill(idle));
}

#[test]
#[should_panic(expected = "scheduled again")]
fn exit_never_returns() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    spawn(&sched, 100, "A");
    let mut frame = RegisterFile::zeroed();
    sched.reschedule(&mut frame);
    sched.exit_current();
}

#[test]
fn spawn_validates_affinity() {
    TestArch::set_nr_cpus(2);
    TestArch::set_cpu(0);
    let uninit: Scheduler<common::TestArch> = Scheduler::new();
    let stack = || Stack::allocate(512).unwrap();

    assert_eq!(
        uninit
            .spawn(task_entry, 0, stack(), Priority::DEFAULT, CpuSet::CPU0, "x")
            .unwrap_err(),
        SpawnError::NotInitialized
    );

    let sched = scheduler();
    assert_eq!(
        sched
            .spawn(task_entry, 0, stack(), Priority::DEFAULT, CpuSet::empty(), "x")
            .unwrap_err(),
        SpawnError::EmptyAffinity
    );
    assert_eq!(
        sched
            .spawn(task_entry, 0, stack(), Priority::DEFAULT, CpuSet::CPU0 | CpuSet::CPU3, "x")
            .unwrap_err(),
        SpawnError::CpuOffline(3)
    );
    TestArch::set_nr_cpus(4);
}

#[test]
fn tasks_stay_on_their_home_cpu() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let remote = spawn_on(&sched, 10, CpuSet::CPU1 | CpuSet::CPU2, "remote");
    assert_eq!(remote.cpu(), 1);
    assert_eq!(sched.stats(0).unwrap().queued, 0);
    assert_eq!(sched.stats(1).unwrap().queued, 1);

    // a tick on cpu 0 cannot see it
    assert_eq!(tick(&sched), Pid::IDLE);

    TestArch::set_cpu(1);
    assert_eq!(tick(&sched), sched.pid(remote).unwrap());
    TestArch::set_cpu(0);
}

#[test]
fn runqueue_locking_masks_interrupts() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    assert!(!TestArch::irqs_masked());
    sched.with_runqueue(0, |_| assert!(TestArch::irqs_masked()));
    assert!(!TestArch::irqs_masked());
}

#[test]
fn pids_increase_monotonically() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let pids: Vec<i32> = (0..4)
        .map(|_| sched.pid(spawn(&sched, 1, "p")).unwrap().as_i32())
        .collect();
    assert_eq!(pids, [1, 2, 3, 4]);
}

#[test]
fn enqueue_refuses_zombies() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    assert!(sched.kill(a));

    assert!(!sched.enqueue(a));
    assert_eq!(sched.state(a), Some(TaskState::Zombie));
    assert_eq!(tick(&sched), Pid::IDLE);
    check(&sched, 0);
}

#[test]
fn enqueue_refuses_running_and_queued_tasks() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    assert_eq!(tick(&sched), sched.pid(a).unwrap());

    assert!(!sched.enqueue(a));
    assert_eq!(sched.state(a), Some(TaskState::Running));
    assert_eq!(sched.stats(0).unwrap().queued, 0);
    check(&sched, 0);

    let b = spawn(&sched, 100, "B");
    assert!(!sched.enqueue(b));
    assert_eq!(sched.stats(0).unwrap().queued, 1);
    assert!(!sched.enqueue(sched.current(1).unwrap()));
    check(&sched, 0);
}

#[test]
fn enqueue_readies_a_blocked_task() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let mut frame = RegisterFile::zeroed();
    sched.tick(&mut frame);
    sched.block_current();
    sched.reschedule(&mut frame);
    assert_eq!(sched.state(a), Some(TaskState::Blocked));

    assert!(sched.enqueue(a));
    assert_eq!(sched.state(a), Some(TaskState::Ready));
    check(&sched, 0);
    assert_eq!(tick(&sched), sched.pid(a).unwrap());
}

#[test]
fn pick_next_leaves_the_running_task_alone() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let b = spawn(&sched, 100, "B");
    let mut frame = RegisterFile::zeroed();
    sched.tick(&mut frame);
    frame.x[5] = 0xAAAA;

    assert_eq!(sched.pick_next(0), Some(b));
    assert_eq!(current_pid(&sched, 0), sched.pid(a).unwrap());
    assert_eq!(sched.state(a), Some(TaskState::Running));
    assert_eq!(sched.state(b), Some(TaskState::Ready));
    check(&sched, 0);

    // B starts from its own registers, A keeps its live ones
    sched.tick(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(b).unwrap());
    assert_eq!(frame.x[5], 0);
    assert_eq!(frame.elr, task_entry as usize as u64);

    sched.tick(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(a).unwrap());
    assert_eq!(frame.x[5], 0xAAAA);
}

#[test]
fn out_of_range_cpus_read_as_offline() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    assert!(sched.current(MAX_CPUS).is_none());
    assert!(sched.stats(MAX_CPUS + 3).is_none());
    assert!(sched.pick_next(MAX_CPUS).is_none());
    assert!(sched.pick_next(5).is_none());
    assert_eq!(sched.reap(MAX_CPUS), 0);
    assert_eq!(sched.pending_timers(MAX_CPUS), 0);
}

#[test]
fn sleeping_task_wakes_after_its_ticks() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let a = spawn(&sched, 100, "A");
    let mut frame = RegisterFile::zeroed();
    sched.tick(&mut frame);

    sched.sleep(3);
    assert_eq!(sched.state(a), Some(TaskState::Blocked));
    assert_eq!(sched.pending_timers(0), 1);
    assert!(!TestArch::irqs_masked());
    sched.reschedule(&mut frame);
    assert_eq!(current_pid(&sched, 0), Pid::IDLE);

    for _ in 0..2 {
        sched.tick(&mut frame);
        assert_eq!(current_pid(&sched, 0), Pid::IDLE);
        assert_eq!(sched.state(a), Some(TaskState::Blocked));
    }

    sched.tick(&mut frame);
    assert_eq!(current_pid(&sched, 0), sched.pid(a).unwrap());
    assert_eq!(sched.pending_timers(0), 0);
    check(&sched, 0);
}

thread_local! {
    static FIRED: Cell<u64> = const { Cell::new(0) };
}

fn record(arg: u64) {
    FIRED.with(|fired| fired.set(fired.get() + arg));
}

#[test]
fn timer_callbacks_run_from_the_tick() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    let once = sched.add_timer(1, record, 1);
    let cancelled = sched.add_timer(2, record, 10);
    assert_eq!(once.cpu(), 0);
    assert!(sched.cancel_timer(cancelled));
    assert!(!sched.cancel_timer(cancelled));

    tick(&sched);
    assert_eq!(FIRED.with(Cell::get), 1);
    tick(&sched);
    tick(&sched);
    assert_eq!(FIRED.with(Cell::get), 1);
    assert!(!sched.cancel_timer(once));
    assert_eq!(sched.pending_timers(0), 0);
}

#[test]
fn waking_a_remote_task_interrupts_its_cpu() {
    TestArch::set_nr_cpus(4);
    let sched = scheduler();
    TestArch::take_ipis();
    let mut frame = RegisterFile::zeroed();

    let remote = spawn_on(&sched, 10, CpuSet::CPU2, "remote");
    TestArch::set_cpu(2);
    sched.tick(&mut frame);
    sched.block_current();
    sched.reschedule(&mut frame);
    TestArch::set_cpu(0);

    assert!(sched.wake(remote));
    assert_eq!(TestArch::take_ipis(), [2]);

    let local = spawn(&sched, 10, "local");
    sched.tick(&mut frame);
    sched.block_current();
    sched.reschedule(&mut frame);
    assert!(sched.wake(local));
    assert!(TestArch::take_ipis().is_empty());

    // the IPI handler reschedules on the woken task's cpu
    TestArch::set_cpu(2);
    sched.reschedule(&mut frame);
    assert_eq!(current_pid(&sched, 2), sched.pid(remote).unwrap());
    TestArch::set_cpu(0);
}
