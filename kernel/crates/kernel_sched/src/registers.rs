//! Saved AArch64 register file
//!
//! The exception entry code stores the interrupted context in this exact
//! layout and restores it on return. Field offsets are part of that contract
//! and are pinned by the assertions below.

use core::fmt::{Debug, Formatter};
use core::mem::{offset_of, size_of};

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile {
    /// x0 - x30
    pub x: [u64; 31],
    /// Stack pointer of the interrupted context
    pub sp: u64,
    /// Exception link register (resume address)
    pub elr: u64,
    /// Saved program status
    pub spsr: u64,
}

impl RegisterFile {
    pub const SIZE: usize = size_of::<Self>();
    pub const SP_OFFSET: usize = offset_of!(RegisterFile, sp);
    pub const ELR_OFFSET: usize = offset_of!(RegisterFile, elr);
    pub const SPSR_OFFSET: usize = offset_of!(RegisterFile, spsr);

    /// EL1h, IRQs unmasked; debug, SError and FIQ masked.
    pub const SPSR_EL1H_IRQ_ON: u64 = (1 << 9) | (1 << 8) | (1 << 6) | 0b0101;

    pub const fn zeroed() -> Self {
        Self {
            x: [0; 31],
            sp: 0,
            elr: 0,
            spsr: 0,
        }
    }

    /// Link register (x30)
    pub const fn lr(&self) -> u64 {
        self.x[30]
    }
}

const _: () = assert!(RegisterFile::SIZE == 34 * 8);
const _: () = assert!(RegisterFile::SP_OFFSET == 248);
const _: () = assert!(RegisterFile::ELR_OFFSET == 256);
const _: () = assert!(RegisterFile::SPSR_OFFSET == 264);
const _: () = assert!(RegisterFile::SIZE % 16 == 0);

impl Default for RegisterFile {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Debug for RegisterFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisterFile")
            .field("x0", &format_args!("{:#x}", self.x[0]))
            .field("lr", &format_args!("{:#x}", self.lr()))
            .field("sp", &format_args!("{:#x}", self.sp))
            .field("elr", &format_args!("{:#x}", self.elr))
            .field("spsr", &format_args!("{:#x}", self.spsr))
            .finish_non_exhaustive()
    }
}
