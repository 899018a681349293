//! Per-CPU runqueue
//!
//! Tasks are boxed in a slab owned by the runqueue; the ready list is a
//! doubly linked list threaded through the slab by slot index. Slot 0 is the
//! idle task, which is never linked.
//!
//! Invariants, checked by [`RunQueue::check_invariants`]:
//! - the idle task is never linked
//! - exactly one task is `Running`, and it is `current`
//! - linked tasks are sorted by non-decreasing priority
//! - every linked task is `Ready`

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::trace;

use crate::{Priority, RegisterFile, Task, TaskState};

const IDLE_SLOT: usize = 0;

/// Stable reference to a task.
///
/// The generation guards against a slot being reused after its task was
/// reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub(crate) cpu: usize,
    pub(crate) slot: usize,
    pub(crate) generation: u32,
}

impl TaskHandle {
    pub fn cpu(&self) -> usize {
        self.cpu
    }
}

struct Slot {
    generation: u32,
    task: Option<Box<Task>>,
}

pub struct RunQueue {
    cpu: usize,
    online: bool,
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    current: usize,
    /// Task switched out last. Its stack may still hold the exception frame
    /// being restored.
    previous: usize,
    schedule_count: u64,
    tick_count: u64,
}

impl RunQueue {
    /// An offline runqueue; see [`RunQueue::init`].
    pub const fn new() -> Self {
        Self {
            cpu: 0,
            online: false,
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            current: IDLE_SLOT,
            previous: IDLE_SLOT,
            schedule_count: 0,
            tick_count: 0,
        }
    }

    /// Bring the runqueue online with a fresh idle task as `current`.
    ///
    /// # Panics
    ///
    /// Panics if the runqueue is already online.
    pub fn init(&mut self, cpu: usize) {
        assert!(!self.online, "runqueue for cpu {cpu} initialised twice");
        self.cpu = cpu;
        self.slots.push(Slot {
            generation: 0,
            task: Some(Box::new(Task::idle(cpu))),
        });
        self.current = IDLE_SLOT;
        self.previous = IDLE_SLOT;
        self.online = true;
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn cpu(&self) -> usize {
        self.cpu
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn schedule_count(&self) -> u64 {
        self.schedule_count
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub(crate) fn count_tick(&mut self) {
        self.tick_count += 1;
    }

    /// Slot of the task currently on the CPU.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn idle_slot(&self) -> usize {
        IDLE_SLOT
    }

    pub fn current(&self) -> &Task {
        self.task(self.current)
    }

    pub fn idle(&self) -> &Task {
        self.task(IDLE_SLOT)
    }

    /// # Panics
    ///
    /// Panics if `slot` holds no task.
    pub fn task(&self, slot: usize) -> &Task {
        match self.slots.get(slot).and_then(|s| s.task.as_deref()) {
            Some(task) => task,
            None => panic!("cpu {}: no task in slot {slot}", self.cpu),
        }
    }

    pub(crate) fn task_mut(&mut self, slot: usize) -> &mut Task {
        let cpu = self.cpu;
        match self.slots.get_mut(slot).and_then(|s| s.task.as_deref_mut()) {
            Some(task) => task,
            None => panic!("cpu {cpu}: no task in slot {slot}"),
        }
    }

    pub fn handle(&self, slot: usize) -> TaskHandle {
        TaskHandle {
            cpu: self.cpu,
            slot,
            generation: self.slots[slot].generation,
        }
    }

    /// Resolve a handle to its slot, if the task still exists.
    pub fn resolve(&self, handle: TaskHandle) -> Option<usize> {
        let slot = self.slots.get(handle.slot)?;
        (handle.cpu == self.cpu && slot.generation == handle.generation && slot.task.is_some())
            .then_some(handle.slot)
    }

    /// Move a new task into the slab. It is not queued.
    pub(crate) fn insert(&mut self, task: Task) -> usize {
        let task = Some(Box::new(task));
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot].task = task;
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    task,
                });
                self.slots.len() - 1
            }
        }
    }

    /// Link a waiting task into the ready list and mark it `Ready`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is the idle task, the task on the CPU, a zombie or
    /// already queued.
    pub fn enqueue(&mut self, slot: usize) {
        assert!(slot != IDLE_SLOT, "cpu {}: attempt to enqueue the idle task", self.cpu);
        assert!(
            slot != self.current,
            "cpu {}: attempt to enqueue the running task",
            self.cpu
        );
        let task = self.task_mut(slot);
        assert!(!task.queued, "task {} enqueued twice", task.pid());
        assert!(
            task.state() != TaskState::Zombie,
            "attempt to enqueue zombie task {}",
            task.pid()
        );
        task.set_state(TaskState::Ready);
        self.link(slot);
    }

    /// Insert `slot` behind every task of equal or higher priority.
    fn link(&mut self, slot: usize) {
        let priority = self.task(slot).priority();

        // first node that must run after the new task
        let mut after = self.head;
        while let Some(pos) = after {
            if self.task(pos).priority() > priority {
                break;
            }
            after = self.task(pos).next;
        }

        let before = match after {
            Some(pos) => self.task(pos).prev,
            None => self.tail,
        };

        {
            let task = self.task_mut(slot);
            task.prev = before;
            task.next = after;
            task.queued = true;
        }
        match before {
            Some(prev) => self.task_mut(prev).next = Some(slot),
            None => self.head = Some(slot),
        }
        match after {
            Some(next) => self.task_mut(next).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.len += 1;
    }

    /// Remove `slot` from the ready list. Its state is left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the neighbouring links do not point back at `slot`.
    pub fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let task = self.task(slot);
            assert!(task.queued, "task {} is not queued", task.pid());
            (task.prev, task.next)
        };

        match prev {
            Some(p) if self.task(p).next == Some(slot) => self.task_mut(p).next = next,
            None if self.head == Some(slot) => self.head = next,
            _ => self.corrupted(slot),
        }
        match next {
            Some(n) if self.task(n).prev == Some(slot) => self.task_mut(n).prev = prev,
            None if self.tail == Some(slot) => self.tail = prev,
            _ => self.corrupted(slot),
        }

        let task = self.task_mut(slot);
        task.prev = None;
        task.next = None;
        task.queued = false;
        self.len -= 1;
    }

    fn pop_front(&mut self) -> Option<usize> {
        let head = self.head?;
        self.unlink(head);
        Some(head)
    }

    fn corrupted(&self, slot: usize) -> ! {
        panic!("cpu {}: runqueue corrupted at slot {slot}", self.cpu)
    }

    /// Select the task that should run next: the head of the queue, which
    /// is rotated behind its equal-priority peers, or the idle task when
    /// nothing is ready.
    ///
    /// Only the queue order changes. The task on the CPU and every task
    /// state stay as they are until [`RunQueue::context_switch`].
    pub fn pick_next(&mut self) -> usize {
        match self.head {
            Some(head) => {
                self.unlink(head);
                self.link(head);
                head
            }
            None => IDLE_SLOT,
        }
    }

    /// Take the task for the next switch off the queue.
    ///
    /// A still-running outgoing task is queued first, so it competes with
    /// its peers and the head rotates among equal priorities.
    pub(crate) fn take_next(&mut self) -> usize {
        let prev = self.current;
        if self.task(prev).state() == TaskState::Running {
            self.task_mut(prev).set_state(TaskState::Ready);
            if prev != IDLE_SLOT {
                self.link(prev);
            }
        }
        self.pop_front().unwrap_or(IDLE_SLOT)
    }

    /// Hand the CPU from `prev` to `next` and make `next` current.
    ///
    /// `frame` holds the registers trapped on exception entry. They are saved
    /// into `prev` and replaced with `next`'s registers, so the exception
    /// return resumes `next`. A `prev` that is still running goes back to the
    /// queue.
    ///
    /// # Panics
    ///
    /// Panics if `prev` is not on the CPU, or `next` is a zombie or still
    /// queued.
    pub fn context_switch(&mut self, prev: usize, next: usize, frame: &mut RegisterFile) {
        assert_eq!(prev, self.current, "cpu {}: switch away from a task not on the cpu", self.cpu);
        let incoming = self.task(next);
        if incoming.state() == TaskState::Zombie {
            panic!("cpu {}: context switch into zombie task {}", self.cpu, incoming.pid());
        }
        assert!(!incoming.queued, "task {} switched in while queued", incoming.pid());

        if prev != next && self.task(prev).state() == TaskState::Running {
            self.task_mut(prev).set_state(TaskState::Ready);
            if prev != IDLE_SLOT {
                self.link(prev);
            }
        }
        self.task_mut(next).set_state(TaskState::Running);
        self.previous = prev;
        self.current = next;
        self.schedule_count += 1;
        if prev == next {
            return;
        }

        trace!(
            "cpu {}: switch {} -> {} ({})",
            self.cpu,
            self.task(prev).pid(),
            self.task(next).pid(),
            self.task(next).name()
        );
        self.task_mut(prev).regs = *frame;
        *frame = self.task(next).regs;
    }

    /// Release every zombie that is neither on the CPU nor the task it just
    /// left. Returns how many were freed.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        for slot in 1..self.slots.len() {
            if slot == self.current || slot == self.previous {
                continue;
            }
            let entry = &mut self.slots[slot];
            if entry
                .task
                .as_ref()
                .is_some_and(|task| task.state() == TaskState::Zombie)
            {
                entry.task = None;
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(slot);
                reaped += 1;
            }
        }
        reaped
    }

    /// Slots of the queued tasks, head first.
    pub fn queued(&self) -> impl Iterator<Item = usize> + '_ {
        core::iter::successors(self.head, |&slot| self.task(slot).next)
    }

    /// Tasks alive in the slab, including the idle task.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.slots.iter().filter_map(|s| s.task.as_deref())
    }

    /// Verify the structural invariants.
    ///
    /// # Panics
    ///
    /// Panics describing the first violated invariant.
    pub fn check_invariants(&self) {
        let idle = self.idle();
        assert!(idle.is_idle() && !idle.queued, "idle task is linked");

        let mut prev: Option<usize> = None;
        let mut last = Priority::HIGHEST;
        let mut count = 0;
        for slot in self.queued() {
            let task = self.task(slot);
            assert!(slot != IDLE_SLOT, "idle task reachable from runqueue");
            assert_eq!(task.prev, prev, "broken back link at slot {slot}");
            assert_eq!(task.state(), TaskState::Ready, "queued task {} not ready", task.pid());
            assert!(task.priority() >= last, "runqueue out of priority order");
            last = task.priority();
            prev = Some(slot);
            count += 1;
        }
        assert_eq!(self.tail, prev, "tail does not end the list");
        assert_eq!(count, self.len, "length does not match list");

        // a blocked or exiting current task leaves nothing running until the
        // next pick
        for (slot, entry) in self.slots.iter().enumerate() {
            if let Some(task) = entry.task.as_deref() {
                if task.state() == TaskState::Running {
                    assert_eq!(slot, self.current, "task {} running but not current", task.pid());
                }
            }
        }
        assert!(!self.current().queued, "current task is queued");
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}
