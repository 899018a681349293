//! PL011 console UART
//!
//! The firmware (`enable_uart=1`) has already programmed the baud rate, so
//! bring-up only resets line settings and enables the transmitter and
//! receiver. The block sits at `peripheral_base + 0x201000` on both boards.

use core::fmt::{self, Write};

use kernel_platform::RegisterWindow;

use super::mmio::VolatileBus;

/// PL011 UART Register offsets
mod reg {
    /// Data Register - read/write data
    pub const DR: u64 = 0x00;
    /// Flag Register - status flags
    pub const FR: u64 = 0x18;
    /// Line Control Register
    pub const LCRH: u64 = 0x2C;
    /// Control Register
    pub const CR: u64 = 0x30;
    /// Interrupt Mask Set/Clear Register
    pub const IMSC: u64 = 0x38;
    /// Interrupt Clear Register
    pub const ICR: u64 = 0x44;
}

/// Flag Register bits
mod fr {
    /// Transmit FIFO full
    pub const TXFF: u32 = 1 << 5;
    /// UART busy transmitting
    pub const BUSY: u32 = 1 << 3;
}

/// Line Control Register bits
mod lcrh {
    /// Enable FIFOs
    pub const FEN: u32 = 1 << 4;
    /// Word length: 8 bits
    pub const WLEN_8: u32 = 0b11 << 5;
}

/// Control Register bits
mod cr {
    pub const UARTEN: u32 = 1 << 0;
    pub const TXE: u32 = 1 << 8;
    pub const RXE: u32 = 1 << 9;
}

/// Polls of the BUSY flag before giving up on a drain.
const DRAIN_LIMIT: usize = 100_000;

pub struct Pl011 {
    regs: RegisterWindow<'static, VolatileBus>,
}

impl Pl011 {
    pub const fn new(bus: &'static VolatileBus, base: u64) -> Self {
        Self {
            regs: RegisterWindow::new(bus, base),
        }
    }

    pub fn base(&self) -> u64 {
        self.regs.base()
    }

    pub fn init(&mut self) {
        // Disable UART while configuring
        self.regs.write(reg::CR, 0);

        // Let a pending transmission finish
        for _ in 0..DRAIN_LIMIT {
            if !self.regs.is_set(reg::FR, fr::BUSY) {
                break;
            }
            core::hint::spin_loop();
        }

        // Flush FIFOs by disabling them
        self.regs.modify(reg::LCRH, |v| v & !lcrh::FEN);

        // Polled driver: mask and clear every interrupt
        self.regs.write(reg::IMSC, 0);
        self.regs.write(reg::ICR, 0x7FF);

        // 8N1, FIFOs enabled
        self.regs.write(reg::LCRH, lcrh::WLEN_8 | lcrh::FEN);

        self.regs.write(reg::CR, cr::UARTEN | cr::TXE | cr::RXE);
    }

    /// Send a single byte (blocking)
    pub fn putc(&self, c: u8) {
        while self.regs.is_set(reg::FR, fr::TXFF) {
            core::hint::spin_loop();
        }
        self.regs.write(reg::DR, u32::from(c));
    }
}

impl Write for Pl011 {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            // Convert \n to \r\n for proper terminal display
            if byte == b'\n' {
                self.putc(b'\r');
            }
            self.putc(byte);
        }
        Ok(())
    }
}
