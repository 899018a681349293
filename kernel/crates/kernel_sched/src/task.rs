use core::fmt::{Debug, Display, Formatter};

use crate::{CpuSet, RegisterFile, Stack};

/// Maximum length of a task name in bytes.
pub const TASK_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(i32);

impl Pid {
    pub const IDLE: Self = Self(-1);

    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn as_i32(self) -> i32 {
        self.0
    }

    pub const fn is_idle(self) -> bool {
        self.0 == Self::IDLE.0
    }
}

impl Display for Pid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling priority. Lower values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Priority {
    pub const HIGHEST: Self = Self(0);
    pub const DEFAULT: Self = Self(128);
    /// Reserved for the idle task.
    pub const IDLE: Self = Self(u8::MAX);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Ready,
    Blocked,
    Zombie,
}

/// Fixed-capacity task name, truncated on a character boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskName {
    bytes: [u8; TASK_NAME_LEN],
    len: usize,
}

impl TaskName {
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(TASK_NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0; TASK_NAME_LEN];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self { bytes, len }
    }

    pub fn as_str(&self) -> &str {
        // always a prefix of a str, cut at a char boundary
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }
}

impl Debug for TaskName {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(self.as_str(), f)
    }
}

impl Display for TaskName {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task control block.
///
/// Lives in the slab of its home CPU's runqueue. `next`/`prev` are slot
/// indices into that slab and are only meaningful while the task is queued.
pub struct Task {
    pid: Pid,
    name: TaskName,
    state: TaskState,
    priority: Priority,
    affinity: CpuSet,
    home_cpu: usize,
    pub(crate) regs: RegisterFile,
    stack: Option<Stack>,
    pub(crate) next: Option<usize>,
    pub(crate) prev: Option<usize>,
    pub(crate) queued: bool,
}

impl Debug for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("home_cpu", &self.home_cpu)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// The idle task for `cpu`: it represents whatever the CPU was running
    /// when the scheduler took over, so its register file starts zeroed.
    pub(crate) fn idle(cpu: usize) -> Self {
        Self {
            pid: Pid::IDLE,
            name: TaskName::new("idle"),
            state: TaskState::Running,
            priority: Priority::IDLE,
            affinity: CpuSet::single(cpu),
            home_cpu: cpu,
            regs: RegisterFile::zeroed(),
            stack: None,
            next: None,
            prev: None,
            queued: false,
        }
    }

    pub(crate) fn new(
        pid: Pid,
        name: TaskName,
        priority: Priority,
        affinity: CpuSet,
        home_cpu: usize,
        regs: RegisterFile,
        stack: Stack,
    ) -> Self {
        Self {
            pid,
            name,
            state: TaskState::Ready,
            priority,
            affinity,
            home_cpu,
            regs,
            stack: Some(stack),
            next: None,
            prev: None,
            queued: false,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn affinity(&self) -> CpuSet {
        self.affinity
    }

    pub fn home_cpu(&self) -> usize {
        self.home_cpu
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.pid.is_idle()
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }
}
