use bitflags::bitflags;

use crate::MAX_CPUS;

bitflags! {
    /// CPUs a task may run on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuSet: u8 {
        const CPU0 = 1 << 0;
        const CPU1 = 1 << 1;
        const CPU2 = 1 << 2;
        const CPU3 = 1 << 3;
        const CPU4 = 1 << 4;
        const CPU5 = 1 << 5;
        const CPU6 = 1 << 6;
        const CPU7 = 1 << 7;
    }
}

impl CpuSet {
    /// The set containing only `cpu`.
    ///
    /// # Panics
    ///
    /// Panics if `cpu >= MAX_CPUS`.
    pub const fn single(cpu: usize) -> Self {
        assert!(cpu < MAX_CPUS, "cpu index out of range");
        Self::from_bits_retain(1 << cpu)
    }

    /// CPUs `0..n`.
    pub const fn first_n(n: usize) -> Self {
        if n >= MAX_CPUS {
            Self::all()
        } else {
            Self::from_bits_retain(((1u16 << n) - 1) as u8)
        }
    }

    pub const fn contains_cpu(self, cpu: usize) -> bool {
        cpu < MAX_CPUS && self.bits() & (1 << cpu) != 0
    }

    /// Lowest CPU in the set; a task's home CPU.
    pub const fn first(self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.bits().trailing_zeros() as usize)
        }
    }

    pub fn cpus(self) -> impl Iterator<Item = usize> {
        (0..MAX_CPUS).filter(move |&cpu| self.contains_cpu(cpu))
    }
}
