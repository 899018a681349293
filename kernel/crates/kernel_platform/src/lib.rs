//! Board Discovery for BCM2711 / BCM2712
//!
//! Determines at runtime which SoC the kernel is running on and where its
//! memory-mapped I/O aperture lives. The answer is published exactly once
//! during early boot and is read-only afterwards.
//!
//! # Probe order
//!
//! | # | Counter address | Peripheral base | Board |
//! |---|-----------------|-----------------|-------|
//! | 1 | `0xFE00_3004`   | `0xFE00_0000`   | Pi 4 (low aperture) |
//! | 2 | `0x4_7E00_3004` | `0x4_7E00_0000` | Pi 4 (high aperture, CM4) |
//! | 3 | `0x10_7C00_3004`| `0x10_7C00_0000`| Pi 5 |
//!
//! The first candidate whose system-timer counter reads as neither
//! `0x0000_0000` nor `0xFFFF_FFFF` wins. With no live candidate the
//! descriptor falls back to the Pi 4 low aperture.
//!
//! # Modules
//!
//! - [`bus`] - MMIO access seam and barrier-emitting register windows
//! - [`memory_map`] - Aperture bases and peripheral offsets
//! - [`revision`] - Firmware board-revision code decoding

#![no_std]

pub mod bus;
mod detect;
pub mod memory_map;
pub mod revision;

pub use bus::{PhysProbe, RegisterBus, RegisterWindow};
pub use detect::{
    BoardModel, PLATFORM, Platform, PlatformInfo, detect, get_board_model, get_gpio_base,
    get_mailbox_base, get_uart_base,
};
pub use revision::BoardRevision;
