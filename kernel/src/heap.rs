use core::alloc::{GlobalAlloc, Layout};
use core::ptr::addr_of;
use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering::Relaxed;

use kernel_sched::Arch;
use linked_list_allocator::LockedHeap;
use log::info;

use crate::arch::aarch64::Aarch64;

#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap(LockedHeap::empty());

static HEAP_INITIALIZED: AtomicBool = AtomicBool::new(false);

unsafe extern "C" {
    static __heap_start: u8;
    static __heap_end: u8;
}

/// The heap lock is a spinlock, so it is only taken with IRQs masked; a
/// tick preempting the holder would otherwise deadlock the next allocation
/// on that core.
struct KernelHeap(LockedHeap);

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let saved = Aarch64::irq_save();
        // SAFETY: forwarded unchanged from the caller.
        let ptr = unsafe { self.0.alloc(layout) };
        Aarch64::irq_restore(saved);
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let saved = Aarch64::irq_save();
        // SAFETY: forwarded unchanged from the caller.
        unsafe { self.0.dealloc(ptr, layout) };
        Aarch64::irq_restore(saved);
    }
}

/// Hand the heap region reserved by the linker script to the allocator.
///
/// # Panics
/// Panics if called twice.
pub fn init() {
    assert!(
        !HEAP_INITIALIZED.swap(true, Relaxed),
        "heap initialized twice"
    );

    // SAFETY: only the addresses of the linker symbols are taken.
    let (start, end) = unsafe { (addr_of!(__heap_start), addr_of!(__heap_end)) };
    let size = end as usize - start as usize;

    // SAFETY: the region is reserved for the heap by the linker script,
    // unused by anything else, and handed over exactly once.
    unsafe {
        ALLOCATOR.0.lock().init(start.cast_mut(), size);
    }
    info!("heap at {:p}, {} KiB", start, size / 1024);
}
