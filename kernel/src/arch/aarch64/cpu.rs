//! CPU identification and secondary core bring-up.
//!
//! The Pi 4 firmware parks cores 1-3 in a spin table at the bottom of RAM,
//! each polling its own release address. The Pi 5 boots through trusted
//! firmware, which powers cores on through PSCI instead.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use aarch64_cpu::asm::{self, barrier};
use aarch64_cpu::registers::*;
use kernel_platform::BoardModel;
use log::{debug, warn};
use volatile::VolatilePtr;

/// Cores on both the BCM2711 and the BCM2712.
pub const NR_CPUS: usize = 4;

/// Release addresses of the firmware spin table (Pi 4).
const SPIN_TABLE: [usize; NR_CPUS] = [0xD8, 0xE0, 0xE8, 0xF0];

/// PSCI 0.2 `CPU_ON`, SMC64 calling convention.
const PSCI_CPU_ON: u64 = 0xC400_0003;

/// Cores that reached Rust code, the boot core included.
static CPUS_STARTED: AtomicUsize = AtomicUsize::new(1);

unsafe extern "C" {
    /// Secondary entry point in boot.S
    fn secondary_entry();
}

/// Get the current CPU ID
pub fn cpu_id() -> usize {
    let mpidr = MPIDR_EL1.get();
    // Cortex-A76 sets MT and moves the core number to Aff1
    let affinity = if mpidr & (1 << 24) != 0 {
        mpidr >> 8
    } else {
        mpidr
    };
    (affinity & 0xFF) as usize
}

/// Number of cores the scheduler should bring up.
pub fn detect_nr_cpus() -> usize {
    NR_CPUS
}

/// Count the calling core as started. Returns how many cores are up.
pub(crate) fn mark_started() -> usize {
    CPUS_STARTED.fetch_add(1, Ordering::AcqRel) + 1
}

/// Release cores 1.. into `secondary_entry`.
pub fn start_secondaries(model: BoardModel) {
    let entry = secondary_entry as usize as u64;

    for cpu in 1..NR_CPUS {
        match model {
            BoardModel::Model4 => release_from_spin_table(cpu, entry),
            BoardModel::Model5 => {
                if let Err(code) = psci_cpu_on(cpu, entry) {
                    warn!("cpu {}: PSCI CPU_ON failed with {}", cpu, code);
                }
            }
        }
    }

    barrier::dsb(barrier::SY);
    asm::sev();
    debug!("released secondary cores into {:#x}", entry);
}

fn release_from_spin_table(cpu: usize, entry: u64) {
    let Some(slot) = NonNull::new(SPIN_TABLE[cpu] as *mut u64) else {
        return;
    };
    // SAFETY: the spin table is firmware-owned RAM that is only polled by
    // the parked core, and the MMU is off.
    let slot = unsafe { VolatilePtr::new(slot) };
    slot.write(entry);
}

fn psci_cpu_on(cpu: usize, entry: u64) -> Result<(), i64> {
    let target = (cpu as u64) << 8;
    let ret: i64;
    // SAFETY: CPU_ON only starts the target core at `entry`; the call does
    // not touch memory owned by this core.
    unsafe {
        core::arch::asm!(
            "smc #0",
            inout("x0") PSCI_CPU_ON => ret,
            inout("x1") target => _,
            inout("x2") entry => _,
            inout("x3") 0u64 => _,
            options(nostack)
        );
    }
    if ret == 0 { Ok(()) } else { Err(ret) }
}
