use alloc::alloc::{alloc, dealloc};
use core::alloc::Layout;
use core::fmt::{Debug, Formatter};
use core::ptr::NonNull;

use thiserror::Error;

/// Stack size used by the kernel's own tasks.
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

const STACK_ALIGN: usize = 16;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum StackAllocationError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid stack size {0}")]
    InvalidSize(usize),
}

/// Heap-allocated task stack. Freed when dropped.
pub struct Stack {
    base: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the stack memory is exclusively owned by this value
unsafe impl Send for Stack {}

impl Debug for Stack {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &format_args!("{:#x}", self.bottom()))
            .field("size", &self.size())
            .finish()
    }
}

impl Stack {
    /// Allocates a stack of `size` bytes, rounded up to 16.
    ///
    /// # Errors
    /// Returns an error if `size` is zero or the allocator is exhausted.
    pub fn allocate(size: usize) -> Result<Self, StackAllocationError> {
        if size == 0 {
            return Err(StackAllocationError::InvalidSize(size));
        }
        let layout = Layout::from_size_align(size, STACK_ALIGN)
            .map_err(|_| StackAllocationError::InvalidSize(size))?
            .pad_to_align();

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc(layout) };
        let base = NonNull::new(ptr).ok_or(StackAllocationError::OutOfMemory)?;
        Ok(Self { base, layout })
    }

    /// Lowest address of the stack.
    pub fn bottom(&self) -> u64 {
        self.base.as_ptr() as u64
    }

    /// One past the highest address; the initial stack pointer.
    pub fn top(&self) -> u64 {
        self.bottom() + self.layout.size() as u64
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // SAFETY: allocated in `allocate` with the same layout
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}
