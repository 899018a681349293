//! Firmware board-revision codes
//!
//! New-style codes (bit 23 set) are laid out as:
//!
//! ```text
//!  31  24 23 22 20 19  16 15  12 11      4 3    0
//! +------+--+-----+------+------+---------+------+
//! |  --  |N| MEM | MANU | PROC |  TYPE   | REV  |
//! +------+--+-----+------+------+---------+------+
//! ```
//!
//! Old-style codes predate the BCM2711 and never describe a supported board.

use core::fmt;

use crate::BoardModel;

const NEW_STYLE: u32 = 1 << 23;

/// Board type field values for the boards this kernel runs on
pub mod board_type {
    pub const PI_4B: u8 = 0x11;
    pub const PI_400: u8 = 0x13;
    pub const CM4: u8 = 0x14;
    pub const PI_5: u8 = 0x17;
    pub const CM5: u8 = 0x18;
}

/// Raw revision code as reported by the firmware board-revision tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardRevision(pub u32);

impl BoardRevision {
    pub const fn is_new_style(self) -> bool {
        self.0 & NEW_STYLE != 0
    }

    /// Board type, bits [11:4]. `None` for old-style codes.
    pub const fn board_type(self) -> Option<u8> {
        if self.is_new_style() {
            Some(((self.0 >> 4) & 0xFF) as u8)
        } else {
            None
        }
    }

    /// Board generation implied by the type field.
    pub const fn model(self) -> Option<BoardModel> {
        match self.board_type() {
            Some(board_type::PI_4B | board_type::PI_400 | board_type::CM4) => {
                Some(BoardModel::Model4)
            }
            Some(board_type::PI_5 | board_type::CM5) => Some(BoardModel::Model5),
            _ => None,
        }
    }

    /// Installed SDRAM in MiB, bits [22:20].
    pub const fn memory_mib(self) -> Option<u32> {
        if !self.is_new_style() {
            return None;
        }
        let field = (self.0 >> 20) & 0x7;
        Some(256 << field)
    }

    /// PCB revision, bits [3:0].
    pub const fn pcb_revision(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    pub const fn name(self) -> &'static str {
        match self.board_type() {
            Some(board_type::PI_4B) => "Pi 4B",
            Some(board_type::PI_400) => "Pi 400",
            Some(board_type::CM4) => "CM4",
            Some(board_type::PI_5) => "Pi 5",
            Some(board_type::CM5) => "CM5",
            _ => "unknown",
        }
    }
}

impl fmt::Display for BoardRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rev 1.{} ({:#010x})", self.name(), self.pcb_revision(), self.0)
    }
}
