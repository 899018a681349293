//! Bare-metal bring-up for the Raspberry Pi 4 (BCM2711) and Pi 5 (BCM2712)
//!
//! Boot order on the boot core:
//!
//! 1. probe the peripheral aperture and open the console
//! 2. install the logger and the heap
//! 3. exception vectors, GIC and the scheduler tick
//! 4. firmware mailbox and the board-revision cross-check
//! 5. runqueues for every core, then release the secondaries

#![no_std]
extern crate alloc;

use ::log::info;

use crate::arch::aarch64::Aarch64;
use crate::arch::traits::Architecture;

pub mod arch;
pub mod firmware;
mod heap;
mod log;
pub mod mcore;
mod serial;

/// Bring the boot core up to the point where it can turn idle.
///
/// Interrupts stay masked; [`mcore::turn_idle`] unmasks them.
pub fn init(dtb: u64) {
    arch::platform::init(dtb);
    log::init();
    info!("dtb at {:#x}", dtb);

    heap::init();

    Aarch64::early_init();
    Aarch64::init();

    firmware::init();

    mcore::init();
    info!("boot core done, secondary cores released");
}
