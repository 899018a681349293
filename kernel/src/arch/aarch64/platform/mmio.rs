//! Volatile MMIO backing for [`RegisterBus`]
//!
//! The MMU is off, so bus addresses are physical addresses. Every register
//! access goes through [`VolatilePtr`] so the compiler never merges, reorders
//! or drops it; ordering against other observers is the job of
//! [`RegisterBus::barrier`].

use core::ptr::NonNull;

use aarch64_cpu::asm::barrier;
use kernel_platform::RegisterBus;
use volatile::VolatilePtr;

/// The physical address space, accessed one 32-bit word at a time.
pub struct VolatileBus;

/// The bus all kernel drivers share.
pub static MMIO: VolatileBus = VolatileBus;

impl VolatileBus {
    fn register(addr: u64) -> Option<VolatilePtr<'static, u32>> {
        let ptr = NonNull::new(addr as usize as *mut u32)?;
        // SAFETY: with the MMU off every address is a physical one; callers
        // only hand in peripheral registers or the probe candidates.
        Some(unsafe { VolatilePtr::new(ptr) })
    }
}

impl RegisterBus for VolatileBus {
    #[inline]
    fn read32(&self, addr: u64) -> u32 {
        Self::register(addr).map_or(0, |reg| reg.read())
    }

    #[inline]
    fn write32(&self, addr: u64, value: u32) {
        if let Some(reg) = Self::register(addr) {
            reg.write(value);
        }
    }

    #[inline]
    fn barrier(&self) {
        barrier::dsb(barrier::SY);
        barrier::isb(barrier::SY);
    }
}
