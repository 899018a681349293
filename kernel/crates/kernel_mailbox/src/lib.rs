//! VideoCore Mailbox Transport
//!
//! The mailbox is the only path from the ARM cores to the GPU firmware. This
//! crate implements the property channel (channel 8) round trip and a typed
//! property-tag API on top of it.
//!
//! # Protocol
//!
//! 1. Build a 16-byte aligned property buffer
//! 2. Wait for the transmit FIFO to drain, write `bus_address | 8`
//! 3. Wait for a channel-8 reply, discarding replies for other channels
//! 4. Read the firmware's response code from word 1 of the buffer
//!
//! # Buffer format
//!
//! ```text
//! Offset  Size  Description
//! ──────────────────────────────────
//! 0       4     Buffer size (bytes)
//! 4       4     Request/Response code
//! 8       N     Tags (id, value size, indicator, value words)
//! 8+N     4     End tag (0x0)
//! ```

#![no_std]

mod buffer;
mod error;
mod property;
mod transport;

pub use buffer::{BUFFER_WORDS, PropertyBuffer, Tag, Tags};
pub use error::MailboxError;
pub use property::{MAX_VALUE_WORDS, PowerState, PropertyRequest, TagSlot, TagValue};
pub use transport::{
    DmaTranslate, IdentityMapped, Mailbox, PROPERTY_CHANNEL, SPIN_LIMIT, bus_alias,
};

/// Request code written into word 1 before submission
pub const REQUEST_CODE: u32 = 0x0000_0000;

/// Response code for a fully processed request
pub const RESPONSE_SUCCESS: u32 = 0x8000_0000;

/// Response code for a request the firmware could not parse
pub const RESPONSE_ERROR: u32 = 0x8000_0001;

/// Property tag IDs
pub mod tag {
    // VideoCore
    pub const GET_FIRMWARE_REV: u32 = 0x0000_0001;

    // Hardware
    pub const GET_BOARD_MODEL: u32 = 0x0001_0001;
    pub const GET_BOARD_REV: u32 = 0x0001_0002;
    pub const GET_BOARD_MAC: u32 = 0x0001_0003;
    pub const GET_BOARD_SERIAL: u32 = 0x0001_0004;
    pub const GET_ARM_MEMORY: u32 = 0x0001_0005;
    pub const GET_VC_MEMORY: u32 = 0x0001_0006;

    // Power
    pub const GET_POWER_STATE: u32 = 0x0002_0001;
    pub const SET_POWER_STATE: u32 = 0x0002_8001;

    // Clocks
    pub const GET_CLOCK_RATE: u32 = 0x0003_0002;
    pub const GET_MAX_CLOCK_RATE: u32 = 0x0003_0004;
    pub const GET_MIN_CLOCK_RATE: u32 = 0x0003_0007;
    pub const SET_CLOCK_RATE: u32 = 0x0003_8002;

    // LEDs
    pub const SET_LED_STATE: u32 = 0x0003_8041;

    // USB
    pub const NOTIFY_XHCI_RESET: u32 = 0x0003_0058;

    /// End tag (terminates tag list)
    pub const END: u32 = 0x0000_0000;
}

/// Clock IDs for clock rate tags
pub mod clock {
    pub const EMMC: u32 = 0x1;
    pub const UART: u32 = 0x2;
    pub const ARM: u32 = 0x3;
    pub const CORE: u32 = 0x4;
    pub const V3D: u32 = 0x5;
    pub const H264: u32 = 0x6;
    pub const ISP: u32 = 0x7;
    pub const SDRAM: u32 = 0x8;
    pub const PIXEL: u32 = 0x9;
    pub const PWM: u32 = 0xA;
    pub const HEVC: u32 = 0xB;
    pub const EMMC2: u32 = 0xC;
    pub const M2MC: u32 = 0xD;
    pub const PIXEL_BVB: u32 = 0xE;
}

/// Device IDs for power state tags
pub mod power {
    pub const SD_CARD: u32 = 0x0;
    pub const UART0: u32 = 0x1;
    pub const UART1: u32 = 0x2;
    pub const USB_HCD: u32 = 0x3;
    pub const I2C0: u32 = 0x4;
    pub const I2C1: u32 = 0x5;
    pub const I2C2: u32 = 0x6;
    pub const SPI: u32 = 0x7;
    pub const CCP2TX: u32 = 0x8;
}

/// Firmware LED numbers for [`tag::SET_LED_STATE`]
pub mod led {
    /// Green activity LED
    pub const ACT: u32 = 42;
    /// Red power LED
    pub const POWER: u32 = 130;
}
