use core::ops::{Deref, DerefMut};

/// Cache-line padded per-CPU slot.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct PerCpu<T>(T);

impl<T> PerCpu<T> {
    pub const fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for PerCpu<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for PerCpu<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}
