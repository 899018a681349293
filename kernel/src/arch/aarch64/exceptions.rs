use aarch64_cpu::asm::barrier;
use aarch64_cpu::registers::*;
use kernel_sched::RegisterFile;

use crate::mcore::SCHEDULER;

/// Exception classes (ESR_EL1.EC) the kernel tells apart.
mod ec {
    pub const SVC64: u64 = 0x15;
    pub const INSTR_ABORT_LOWER: u64 = 0x20;
    pub const INSTR_ABORT_SAME: u64 = 0x21;
    pub const PC_ALIGN: u64 = 0x22;
    pub const DATA_ABORT_LOWER: u64 = 0x24;
    pub const DATA_ABORT_SAME: u64 = 0x25;
    pub const SP_ALIGN: u64 = 0x26;
    pub const BRK64: u64 = 0x3C;
}

const VECTOR_NAMES: [&str; 12] = [
    "sync (SP0)",
    "irq (SP0)",
    "fiq (SP0)",
    "serror (SP0)",
    "sync (lower EL, AArch64)",
    "irq (lower EL, AArch64)",
    "fiq (lower EL, AArch64)",
    "serror (lower EL, AArch64)",
    "sync (lower EL, AArch32)",
    "irq (lower EL, AArch32)",
    "fiq (lower EL, AArch32)",
    "serror (lower EL, AArch32)",
];

/// Exception vector base (defined in assembly)
unsafe extern "C" {
    fn exception_vector_base();
}

/// Initialize exception vector table
pub fn init_exception_vector() {
    VBAR_EL1.set(exception_vector_base as usize as u64);
    barrier::isb(barrier::SY);
}

/// Synchronous exception handler
///
/// `svc` from kernel code is the scheduler's yield trap; everything else is
/// fatal.
#[unsafe(no_mangle)]
pub extern "C" fn handle_sync_exception(frame: &mut RegisterFile) {
    let esr = ESR_EL1.get();
    let far = FAR_EL1.get();

    let ec = (esr >> 26) & 0x3F; // Exception class
    let iss = esr & 0x1FF_FFFF; // Instruction specific syndrome

    match ec {
        ec::SVC64 => SCHEDULER.reschedule(frame),
        ec::INSTR_ABORT_LOWER | ec::INSTR_ABORT_SAME => {
            panic!("Instruction abort at {:#x}, far: {:#x}", frame.elr, far);
        }
        ec::DATA_ABORT_LOWER | ec::DATA_ABORT_SAME => {
            let is_write = (iss & (1 << 6)) != 0; // WnR bit
            panic!(
                "Data abort at {:#x}, address={:#x}, write={}, dfsc={:#x}",
                frame.elr,
                far,
                is_write,
                iss & 0x3F
            );
        }
        ec::PC_ALIGN | ec::SP_ALIGN => {
            panic!("Alignment fault at {:#x}, sp={:#x}", frame.elr, frame.sp);
        }
        ec::BRK64 => {
            panic!("Breakpoint #{} at {:#x}", iss & 0xFFFF, frame.elr);
        }
        _ => {
            panic!(
                "Unhandled synchronous exception: EC={:#x}, ISS={:#x}, ELR={:#x}\n{:?}",
                ec, iss, frame.elr, frame
            );
        }
    }
}

/// FIQ handler
#[unsafe(no_mangle)]
pub extern "C" fn handle_fiq(_frame: &mut RegisterFile) {
    log::warn!("FIQ received");
}

/// SError handler
#[unsafe(no_mangle)]
pub extern "C" fn handle_serror(frame: &mut RegisterFile) {
    panic!("SError received at {:#x}, ESR={:#x}", frame.elr, ESR_EL1.get());
}

/// Exceptions taken on SP_EL0 or from a lower EL. The kernel never runs
/// there.
#[unsafe(no_mangle)]
pub extern "C" fn handle_unexpected_exception(frame: &mut RegisterFile, kind: u64) {
    let name = VECTOR_NAMES.get(kind as usize).copied().unwrap_or("unknown");
    panic!(
        "unexpected {} exception at {:#x}, ESR={:#x}",
        name,
        frame.elr,
        ESR_EL1.get()
    );
}
