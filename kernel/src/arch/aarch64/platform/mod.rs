//! Board peripherals shared by the Pi 4 and the Pi 5
//!
//! Everything here is located through the published platform descriptor, so
//! one kernel image drives both boards.

pub mod mmio;
pub mod uart;

use conquer_once::spin::Lazy;
use kernel_platform::{get_uart_base, PLATFORM};
use spin::Mutex;

use self::mmio::MMIO;
use self::uart::Pl011;

/// Global UART instance for console output. Forcing it before platform
/// detection panics.
pub static UART: Lazy<Mutex<Pl011>> = Lazy::new(|| {
    let mut uart = Pl011::new(&MMIO, get_uart_base());
    uart.init();
    Mutex::new(uart)
});

/// Locate the peripheral aperture and bring up the console.
///
/// `dtb` is recorded for diagnostics only and never dereferenced.
pub fn init(dtb: u64) {
    let info = PLATFORM.detect(dtb, &MMIO);

    // Force lazy initialization of UART
    let _ = &*UART;

    use core::fmt::Write;
    let _ = writeln!(UART.lock(), "\n=== {} ===", info.board_model());
}
