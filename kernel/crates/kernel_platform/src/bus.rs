//! Memory-Mapped I/O access seam
//!
//! Hardware is reached exclusively through a [`RegisterBus`]. The kernel
//! implements it with volatile accesses and real `dsb`/`isb` barriers; tests
//! implement it with an in-memory register file.
//!
//! [`RegisterWindow`] owns a peripheral base address and brackets every
//! access with a full barrier, so the ordering rules for a peripheral block
//! are encoded once instead of at every call site.

/// Raw 32-bit access to the physical address space.
pub trait RegisterBus {
    /// Read the 32-bit register at `addr`.
    fn read32(&self, addr: u64) -> u32;

    /// Write `value` to the 32-bit register at `addr`.
    fn write32(&self, addr: u64, value: u32);

    /// Full system barrier (data synchronisation + instruction synchronisation).
    fn barrier(&self);
}

/// One-shot reads used while the aperture is still unknown.
pub trait PhysProbe {
    /// Read a 32-bit word at a physical address that may or may not be backed
    /// by a live peripheral.
    fn probe32(&self, addr: u64) -> u32;
}

impl<B: RegisterBus + ?Sized> PhysProbe for B {
    fn probe32(&self, addr: u64) -> u32 {
        self.barrier();
        let value = self.read32(addr);
        self.barrier();
        value
    }
}

/// A block of registers at a fixed base address.
pub struct RegisterWindow<'a, B: RegisterBus + ?Sized> {
    bus: &'a B,
    base: u64,
}

impl<B: RegisterBus + ?Sized> Clone for RegisterWindow<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: RegisterBus + ?Sized> Copy for RegisterWindow<'_, B> {}

impl<'a, B: RegisterBus + ?Sized> RegisterWindow<'a, B> {
    pub const fn new(bus: &'a B, base: u64) -> Self {
        Self { bus, base }
    }

    pub const fn base(&self) -> u64 {
        self.base
    }

    pub fn bus(&self) -> &'a B {
        self.bus
    }

    /// Read the register at `offset`, with a barrier on both sides.
    #[inline]
    pub fn read(&self, offset: u64) -> u32 {
        self.bus.barrier();
        let value = self.bus.read32(self.base + offset);
        self.bus.barrier();
        value
    }

    /// Write the register at `offset`, with a barrier on both sides.
    #[inline]
    pub fn write(&self, offset: u64, value: u32) {
        self.bus.barrier();
        self.bus.write32(self.base + offset, value);
        self.bus.barrier();
    }

    /// Check if any bit in `mask` is set in the register at `offset`
    #[inline]
    pub fn is_set(&self, offset: u64, mask: u32) -> bool {
        (self.read(offset) & mask) != 0
    }

    /// Read-modify-write. Not atomic with respect to other bus masters.
    #[inline]
    pub fn modify<F>(&self, offset: u64, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(offset);
        self.write(offset, f(value));
    }
}
