//! ARM64 Interrupt Handling
//!
//! IRQs arrive through the GIC-400. Every online core enables two banked
//! sources: the non-secure physical generic timer (PPI 30), armed at
//! [`TICK_HZ`] to drive preemption, and the reschedule SGI that another core
//! raises after waking one of its tasks.

use aarch64_cpu::registers::*;
use kernel_platform::get_board_model;
use kernel_sched::RegisterFile;

use super::gic;
use crate::mcore::SCHEDULER;

/// Scheduler tick frequency
pub const TICK_HZ: u64 = 100;

/// Physical timer IRQ number (PPI 14 = IRQ 30)
const TIMER_IRQ: u32 = gic::irq::TIMER_PHYS;

const RESCHEDULE_SGI: u32 = gic::irq::RESCHEDULE;

/// Initialize the interrupt controller and the tick on the boot core.
pub fn init() {
    let gic = gic::init(get_board_model());
    enable_local(gic);
    log::info!(
        "ARM interrupts initialized (timer={}, {} Hz, resched sgi={})",
        TIMER_IRQ,
        TICK_HZ,
        RESCHEDULE_SGI
    );
}

/// Per-core part of [`init`] for secondary cores.
pub fn init_secondary() {
    enable_local(gic::init_secondary());
}

fn enable_local(gic: &gic::Gic) {
    // SGIs and PPIs are banked: enable them on the calling core
    gic.enable_irq(RESCHEDULE_SGI);
    gic.set_priority(RESCHEDULE_SGI, 0x80);
    gic.enable_irq(TIMER_IRQ);
    gic.set_priority(TIMER_IRQ, 0x80);
    set_next_timer();
}

/// Make `cpu` reschedule as soon as it takes the interrupt.
pub fn send_reschedule(cpu: usize) {
    gic::get().send_sgi(cpu, RESCHEDULE_SGI);
}

/// Handle IRQ interrupt (called from exception vector)
#[unsafe(no_mangle)]
pub extern "C" fn handle_irq(frame: &mut RegisterFile) {
    let gic = gic::get();

    // Acknowledge the interrupt and get its ID
    let iar = gic.acknowledge();
    let irq = iar & 0x3FF;

    // Check for spurious interrupt
    if irq == gic::irq::SPURIOUS {
        return;
    }

    match irq {
        TIMER_IRQ => {
            set_next_timer();
            gic.end_of_interrupt(iar);
            // May rewrite the frame to resume another task
            SCHEDULER.tick(frame);
        }
        RESCHEDULE_SGI => {
            gic.end_of_interrupt(iar);
            SCHEDULER.reschedule(frame);
        }
        _ => {
            log::warn!("Unhandled IRQ: {}", irq);
            gic.end_of_interrupt(iar);
        }
    }
}

/// Arm the timer to fire one tick from now. Writing TVAL also clears the
/// pending condition.
fn set_next_timer() {
    let interval = CNTFRQ_EL0.get() / TICK_HZ;
    CNTP_TVAL_EL0.set(interval);
    CNTP_CTL_EL0.write(CNTP_CTL_EL0::ENABLE::SET + CNTP_CTL_EL0::IMASK::CLEAR);
}
