#[doc(hidden)]
pub fn internal_print(args: core::fmt::Arguments) {
    use core::fmt::Write;

    use kernel_platform::PLATFORM;

    use crate::arch::aarch64::platform::UART;
    use crate::arch::aarch64::Aarch64;
    use crate::arch::traits::Architecture;

    // the console address is unknown until the aperture has been probed
    if !PLATFORM.is_detected() {
        return;
    }

    // Disable interrupts while printing to avoid deadlock
    let were_enabled = Aarch64::are_interrupts_enabled();
    if were_enabled {
        Aarch64::disable_interrupts();
    }

    let _ = UART.lock().write_fmt(args);

    if were_enabled {
        Aarch64::enable_interrupts();
    }
}

/// Prints to the host through the serial interface.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => ($crate::serial::internal_print(format_args!($($arg)*)));
}

/// Prints to the host through the serial interface, appending a newline.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(
        concat!($fmt, "\n"), $($arg)*));
}
