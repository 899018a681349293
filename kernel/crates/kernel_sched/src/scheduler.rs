use core::marker::PhantomData;
use core::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use log::{debug, info};
use spin::Mutex;
use thiserror::Error;

use crate::timer::{TimerAction, TimerCallback, TimerId, TimerList};
use crate::{
    Arch, CpuSet, MAX_CPUS, PerCpu, Pid, Priority, RegisterFile, RunQueue, Stack, Task,
    TaskHandle, TaskName, TaskState,
};

/// Entry point of a task. Receives the spawn argument in `x0`.
pub type TaskEntry = extern "C" fn(u64);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum SpawnError {
    #[error("affinity mask is empty")]
    EmptyAffinity,
    #[error("cpu {0} is not online")]
    CpuOffline(usize),
    #[error("scheduler is not initialised")]
    NotInitialized,
}

/// Counters for one CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedStats {
    pub schedule_count: u64,
    pub tick_count: u64,
    pub queued: usize,
    pub current: Pid,
}

/// The per-CPU runqueues and timer lists.
///
/// Each runqueue and each timer list is guarded by its own spinlock, always
/// taken with local interrupts masked so a tick cannot re-enter it on the
/// same CPU.
pub struct Scheduler<A: Arch> {
    cpus: [PerCpu<Mutex<RunQueue>>; MAX_CPUS],
    timers: [PerCpu<Mutex<TimerList>>; MAX_CPUS],
    online: AtomicUsize,
    next_pid: AtomicI32,
    _arch: PhantomData<fn() -> A>,
}

impl<A: Arch> Scheduler<A> {
    pub const fn new() -> Self {
        Self {
            cpus: [const { PerCpu::new(Mutex::new(RunQueue::new())) }; MAX_CPUS],
            timers: [const { PerCpu::new(Mutex::new(TimerList::new())) }; MAX_CPUS],
            online: AtomicUsize::new(0),
            next_pid: AtomicI32::new(1),
            _arch: PhantomData,
        }
    }

    /// Bring up a runqueue for every CPU the architecture reports.
    pub fn init(&self) {
        let nr_cpus = A::nr_cpus().clamp(1, MAX_CPUS);
        for cpu in 0..nr_cpus {
            self.init_cpu(cpu);
        }
        info!("scheduler initialised for {} cpus", nr_cpus);
    }

    /// Install the idle task on `cpu`; the code calling this becomes it.
    pub fn init_cpu(&self, cpu: usize) {
        assert!(cpu < MAX_CPUS, "cpu {cpu} exceeds MAX_CPUS");
        self.with_runqueue(cpu, |rq| rq.init(cpu));
        self.online.fetch_max(cpu + 1, Ordering::AcqRel);
        debug!("cpu {}: runqueue online", cpu);
    }

    pub fn nr_online(&self) -> usize {
        self.online.load(Ordering::Acquire)
    }

    /// Run `f` on the runqueue of `cpu` with interrupts masked and the lock
    /// held.
    ///
    /// # Panics
    ///
    /// Panics if `cpu` is not below [`MAX_CPUS`].
    pub fn with_runqueue<R>(&self, cpu: usize, f: impl FnOnce(&mut RunQueue) -> R) -> R {
        self.try_with_runqueue(cpu, f)
            .unwrap_or_else(|| panic!("cpu {cpu} exceeds MAX_CPUS"))
    }

    fn try_with_runqueue<R>(&self, cpu: usize, f: impl FnOnce(&mut RunQueue) -> R) -> Option<R> {
        let runqueue = self.cpus.get(cpu)?;
        let saved = A::irq_save();
        let result = f(&mut runqueue.lock());
        A::irq_restore(saved);
        Some(result)
    }

    fn with_timers<R>(&self, cpu: usize, f: impl FnOnce(&mut TimerList) -> R) -> R {
        let saved = A::irq_save();
        let result = f(&mut self.timers[cpu].lock());
        A::irq_restore(saved);
        result
    }

    /// Create a task and queue it on its home CPU, the lowest CPU in
    /// `affinity`.
    ///
    /// # Errors
    /// Fails if the scheduler has no online CPU, `affinity` is empty or names
    /// a CPU that is not online.
    pub fn spawn(
        &self,
        entry: TaskEntry,
        arg: u64,
        stack: Stack,
        priority: Priority,
        affinity: CpuSet,
        name: &str,
    ) -> Result<TaskHandle, SpawnError> {
        let online = self.nr_online();
        if online == 0 {
            return Err(SpawnError::NotInitialized);
        }
        let home = affinity.first().ok_or(SpawnError::EmptyAffinity)?;
        if let Some(cpu) = affinity.cpus().find(|&cpu| cpu >= online) {
            return Err(SpawnError::CpuOffline(cpu));
        }

        let mut regs = RegisterFile::zeroed();
        regs.x[0] = arg;
        regs.x[30] = A::exit_trampoline();
        regs.sp = stack.top() & !0xF;
        regs.elr = entry as usize as u64;
        regs.spsr = RegisterFile::SPSR_EL1H_IRQ_ON;

        let pid = Pid::new(self.next_pid.fetch_add(1, Ordering::Relaxed));
        let name = TaskName::new(name);
        let task = Task::new(pid, name, priority, affinity, home, regs, stack);

        let handle = self.with_runqueue(home, |rq| {
            if !rq.is_online() {
                return Err(SpawnError::CpuOffline(home));
            }
            let slot = rq.insert(task);
            rq.enqueue(slot);
            Ok(rq.handle(slot))
        })?;
        debug!("spawned task {} ({}) on cpu {}", pid, name, home);
        Ok(handle)
    }

    /// Queue a task that is neither on the CPU nor linked. Returns `false`
    /// and leaves the task alone if the handle is stale, or the task is the
    /// idle task, the running one, a zombie or already queued.
    pub fn enqueue(&self, handle: TaskHandle) -> bool {
        self.with_runqueue(handle.cpu, |rq| {
            let Some(slot) = rq.resolve(handle) else {
                return false;
            };
            let task = rq.task(slot);
            if slot == rq.current_slot()
                || task.is_idle()
                || task.is_queued()
                || task.state() == TaskState::Zombie
            {
                return false;
            }
            rq.enqueue(slot);
            true
        })
    }

    /// The task `cpu` would run next. The head of its queue rotates behind
    /// its equal-priority peers; the task on the CPU is not touched. `None`
    /// while the CPU is offline.
    pub fn pick_next(&self, cpu: usize) -> Option<TaskHandle> {
        self.try_with_runqueue(cpu, |rq| {
            rq.is_online().then(|| {
                let slot = rq.pick_next();
                rq.handle(slot)
            })
        })
        .flatten()
    }

    /// Timer interrupt entry. Fires the expired timers of this CPU, then
    /// reschedules.
    pub fn tick(&self, frame: &mut RegisterFile) {
        let cpu = A::cpu_id();
        self.run_timers(cpu);
        self.switch_locked(cpu, frame, true);
    }

    /// Synchronous scheduler entry (the yield trap and the reschedule IPI).
    pub fn reschedule(&self, frame: &mut RegisterFile) {
        self.switch_locked(A::cpu_id(), frame, false);
    }

    fn switch_locked(&self, cpu: usize, frame: &mut RegisterFile, tick: bool) {
        self.with_runqueue(cpu, |rq| {
            if !rq.is_online() {
                return;
            }
            if tick {
                rq.count_tick();
            }
            let prev = rq.current_slot();
            let next = rq.take_next();
            rq.context_switch(prev, next, frame);
        });
    }

    fn run_timers(&self, cpu: usize) {
        self.with_timers(cpu, TimerList::advance);
        // the lock is not held while an action runs
        while let Some(action) = self.with_timers(cpu, TimerList::pop_expired) {
            match action {
                TimerAction::Wake(handle) => {
                    self.wake(handle);
                }
                TimerAction::Call(callback, arg) => callback(arg),
            }
        }
    }

    /// Arm a timer on the calling CPU that runs `callback(arg)` from the
    /// tick `ticks` ticks from now.
    pub fn add_timer(&self, ticks: u64, callback: TimerCallback, arg: u64) -> TimerId {
        self.arm_timer(A::cpu_id(), ticks, TimerAction::Call(callback, arg))
    }

    fn arm_timer(&self, cpu: usize, ticks: u64, action: TimerAction) -> TimerId {
        let seq = self.with_timers(cpu, |timers| timers.arm(ticks, action));
        TimerId { cpu, seq }
    }

    /// Disarm a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.with_timers(id.cpu, |timers| timers.cancel(id.seq))
    }

    /// Timers armed on `cpu` that have not fired yet.
    pub fn pending_timers(&self, cpu: usize) -> usize {
        if cpu >= MAX_CPUS {
            return 0;
        }
        self.with_timers(cpu, |timers| timers.len())
    }

    /// Give up the CPU to the next ready task.
    pub fn yield_now(&self) {
        A::yield_trap();
    }

    /// Put the running task to sleep until [`Scheduler::wake`].
    ///
    /// # Panics
    ///
    /// Panics if called from the idle task.
    pub fn block_current(&self) {
        self.mark_blocked(A::cpu_id());
        A::yield_trap();
    }

    /// Block the running task until `ticks` ticks of its CPU have passed.
    ///
    /// # Panics
    ///
    /// Panics if called from the idle task.
    pub fn sleep(&self, ticks: u64) {
        let cpu = A::cpu_id();
        // a tick must not see the timer before the task is blocked
        let saved = A::irq_save();
        let handle = self.mark_blocked(cpu);
        self.arm_timer(cpu, ticks, TimerAction::Wake(handle));
        A::irq_restore(saved);
        A::yield_trap();
    }

    fn mark_blocked(&self, cpu: usize) -> TaskHandle {
        self.with_runqueue(cpu, |rq| {
            let slot = rq.current_slot();
            assert!(slot != rq.idle_slot(), "idle task cannot block");
            let task = rq.task_mut(slot);
            // a task killed while running stays a zombie
            if task.state() == TaskState::Running {
                task.set_state(TaskState::Blocked);
            }
            rq.handle(slot)
        })
    }

    /// Make a blocked task ready again. Returns `false` if the task is gone
    /// or was not blocked. A task homed on another CPU gets that CPU a
    /// reschedule IPI.
    pub fn wake(&self, handle: TaskHandle) -> bool {
        let woken = self.with_runqueue(handle.cpu, |rq| {
            let Some(slot) = rq.resolve(handle) else {
                return false;
            };
            if rq.task(slot).state() != TaskState::Blocked {
                return false;
            }
            if slot == rq.current_slot() {
                // blocked but has not trapped out yet
                rq.task_mut(slot).set_state(TaskState::Running);
            } else {
                rq.enqueue(slot);
            }
            true
        });
        if woken && handle.cpu != A::cpu_id() {
            A::send_reschedule(handle.cpu);
        }
        woken
    }

    /// Turn a task into a zombie. A queued task is unlinked at once; the
    /// running task keeps the CPU until its next reschedule. Returns `false`
    /// for the idle task or a task that is already gone.
    pub fn kill(&self, handle: TaskHandle) -> bool {
        self.with_runqueue(handle.cpu, |rq| {
            let Some(slot) = rq.resolve(handle) else {
                return false;
            };
            let task = rq.task(slot);
            if task.is_idle() || task.state() == TaskState::Zombie {
                return false;
            }
            if task.is_queued() {
                rq.unlink(slot);
            }
            rq.task_mut(slot).set_state(TaskState::Zombie);
            true
        })
    }

    /// Terminate the running task.
    pub fn exit_current(&self) -> ! {
        let cpu = A::cpu_id();
        let current = self.with_runqueue(cpu, |rq| rq.handle(rq.current_slot()));
        assert!(self.kill(current), "idle task cannot exit");
        A::yield_trap();
        unreachable!("exited task was scheduled again");
    }

    /// Free the zombies of `cpu`. Returns how many were released.
    pub fn reap(&self, cpu: usize) -> usize {
        let reaped = self.try_with_runqueue(cpu, RunQueue::reap).unwrap_or(0);
        if reaped > 0 {
            debug!("cpu {}: reaped {} tasks", cpu, reaped);
        }
        reaped
    }

    /// The task on `cpu`, `None` while the CPU is offline.
    pub fn current(&self, cpu: usize) -> Option<TaskHandle> {
        self.try_with_runqueue(cpu, |rq| rq.is_online().then(|| rq.handle(rq.current_slot())))
            .flatten()
    }

    pub fn stats(&self, cpu: usize) -> Option<SchedStats> {
        self.try_with_runqueue(cpu, |rq| {
            rq.is_online().then(|| SchedStats {
                schedule_count: rq.schedule_count(),
                tick_count: rq.tick_count(),
                queued: rq.len(),
                current: rq.current().pid(),
            })
        })
        .flatten()
    }

    pub fn pid(&self, handle: TaskHandle) -> Option<Pid> {
        self.with_runqueue(handle.cpu, |rq| {
            rq.resolve(handle).map(|slot| rq.task(slot).pid())
        })
    }

    pub fn state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.with_runqueue(handle.cpu, |rq| {
            rq.resolve(handle).map(|slot| rq.task(slot).state())
        })
    }
}

impl<A: Arch> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}
