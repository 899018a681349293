pub mod cpu;
pub mod exceptions;
pub mod gic;
pub mod interrupts;
pub mod platform;

use aarch64_cpu::registers::*;
use kernel_sched::Arch;

use crate::arch::traits::Architecture;

pub struct Aarch64;

impl Architecture for Aarch64 {
    fn early_init() {
        // Setup exception vector table
        exceptions::init_exception_vector();
    }

    fn init() {
        // Initialize interrupt controller (GIC) and the scheduler tick
        interrupts::init();
    }

    fn enable_interrupts() {
        // SAFETY: writing #2 to daifclr only unmasks IRQ delivery at EL1.
        unsafe {
            core::arch::asm!("msr daifclr, #2");
        }
    }

    fn disable_interrupts() {
        // SAFETY: writing #2 to daifset only masks IRQ delivery at EL1.
        unsafe {
            core::arch::asm!("msr daifset, #2");
        }
    }

    fn are_interrupts_enabled() -> bool {
        !DAIF.is_set(DAIF::I)
    }

    fn wait_for_interrupt() {
        aarch64_cpu::asm::wfi();
    }
}

impl Arch for Aarch64 {
    fn cpu_id() -> usize {
        cpu::cpu_id()
    }

    fn nr_cpus() -> usize {
        cpu::detect_nr_cpus()
    }

    fn irq_save() -> u64 {
        let daif = DAIF.get();
        Self::disable_interrupts();
        daif
    }

    fn irq_restore(saved: u64) {
        DAIF.set(saved);
    }

    fn yield_trap() {
        // SAFETY: the synchronous exception vector saves the full register
        // file and returns to the instruction after the svc.
        unsafe {
            core::arch::asm!("svc #0");
        }
    }

    fn exit_trampoline() -> u64 {
        crate::mcore::task_exit as usize as u64
    }

    fn send_reschedule(cpu: usize) {
        interrupts::send_reschedule(cpu);
    }
}
