//! BCM2711 / BCM2712 peripheral aperture layout
//!
//! All peripheral blocks are addressed as fixed offsets from the aperture
//! base reported by the board probe.

/// Pi 4 peripheral base in low (legacy) peripheral mode
pub const PI4_LOW_PERIPHERAL_BASE: u64 = 0xFE00_0000;

/// Pi 4 peripheral base in high peripheral mode (compute modules)
pub const PI4_HIGH_PERIPHERAL_BASE: u64 = 0x4_7E00_0000;

/// Pi 5 peripheral base
pub const PI5_PERIPHERAL_BASE: u64 = 0x10_7C00_0000;

/// System timer block
pub const SYSTEM_TIMER_OFFSET: u64 = 0x0000_3000;

/// System timer free-running counter, low word (CLO)
pub const SYSTEM_TIMER_CLO_OFFSET: u64 = SYSTEM_TIMER_OFFSET + 0x4;

/// VideoCore mailbox block
pub const MAILBOX_OFFSET: u64 = 0x0000_B880;

/// GPIO block
pub const GPIO_OFFSET: u64 = 0x0020_0000;

/// PL011 UART0
pub const UART_OFFSET: u64 = 0x0020_1000;

/// Address of the system-timer counter for a given aperture base
#[inline]
pub const fn system_timer_counter(peripheral_base: u64) -> u64 {
    peripheral_base + SYSTEM_TIMER_CLO_OFFSET
}
