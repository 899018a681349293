#![no_std]
#![no_main]

use core::panic::PanicInfo;

use kernel::arch::traits::Architecture;
use kernel::arch::Aarch64;
use kernel::mcore::{self, SCHEDULER};
use kernel_sched::CpuSet;
use log::{error, info, warn};

/// Ticks between two heartbeat lines.
const HEARTBEAT_TICKS: u64 = 500;

#[unsafe(export_name = "kernel_main")]
unsafe extern "C" fn main(dtb: u64) -> ! {
    kernel::init(dtb);

    for cpu in 0..SCHEDULER.nr_online() {
        if let Err(e) = mcore::spawn(
            heartbeat,
            cpu as u64,
            mcore::BACKGROUND,
            CpuSet::single(cpu),
            "heartbeat",
        ) {
            warn!("no heartbeat on cpu {}: {}", cpu, e);
        }
    }

    info!("entering idle loop");
    mcore::turn_idle()
}

/// Report the scheduler counters of one core every few seconds.
extern "C" fn heartbeat(cpu: u64) {
    let cpu = cpu as usize;
    while let Some(stats) = SCHEDULER.stats(cpu) {
        info!(
            "cpu {}: {} ticks, {} switches, {} queued, {} timers",
            cpu,
            stats.tick_count,
            stats.schedule_count,
            stats.queued,
            SCHEDULER.pending_timers(cpu)
        );
        SCHEDULER.sleep(HEARTBEAT_TICKS);
    }
}

#[panic_handler]
#[cfg(not(test))]
fn rust_panic(info: &PanicInfo) -> ! {
    Aarch64::disable_interrupts();
    handle_panic(info);
    kernel::firmware::blink_halt()
}

#[cfg(not(test))]
fn handle_panic(info: &PanicInfo) {
    if let Some(location) = info.location() {
        error!(
            "kernel panicked at {}:{}:{}:",
            location.file(),
            location.line(),
            location.column(),
        );
    } else {
        error!("kernel panicked:");
    }
    error!("{}", info.message());
}
