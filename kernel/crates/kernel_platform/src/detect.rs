use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use conquer_once::spin::OnceCell;
use log::{debug, info, warn};

use crate::bus::PhysProbe;
use crate::memory_map::{
    GPIO_OFFSET, MAILBOX_OFFSET, PI4_HIGH_PERIPHERAL_BASE, PI4_LOW_PERIPHERAL_BASE,
    PI5_PERIPHERAL_BASE, SYSTEM_TIMER_OFFSET, UART_OFFSET, system_timer_counter,
};

/// Raspberry Pi generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardModel {
    /// BCM2711 (Pi 4B, Pi 400, CM4)
    Model4,
    /// BCM2712 (Pi 5, CM5)
    Model5,
}

impl BoardModel {
    /// Numeric generation, `4` or `5`.
    pub const fn number(self) -> u32 {
        match self {
            BoardModel::Model4 => 4,
            BoardModel::Model5 => 5,
        }
    }

    pub const fn soc(self) -> &'static str {
        match self {
            BoardModel::Model4 => "BCM2711",
            BoardModel::Model5 => "BCM2712",
        }
    }
}

impl fmt::Display for BoardModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Raspberry Pi {} ({})", self.number(), self.soc())
    }
}

/// Where the peripherals live and which board owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    pub peripheral_base: u64,
    pub board_model: BoardModel,
}

impl PlatformInfo {
    /// Descriptor used when no probe candidate answers.
    pub const FALLBACK: Self = Self {
        peripheral_base: PI4_LOW_PERIPHERAL_BASE,
        board_model: BoardModel::Model4,
    };

    pub const fn gpio_base(&self) -> u64 {
        self.peripheral_base + GPIO_OFFSET
    }

    pub const fn uart_base(&self) -> u64 {
        self.peripheral_base + UART_OFFSET
    }

    pub const fn mailbox_base(&self) -> u64 {
        self.peripheral_base + MAILBOX_OFFSET
    }

    pub const fn system_timer_base(&self) -> u64 {
        self.peripheral_base + SYSTEM_TIMER_OFFSET
    }

    pub const fn board_model(&self) -> BoardModel {
        self.board_model
    }
}

const CANDIDATES: [PlatformInfo; 3] = [
    PlatformInfo {
        peripheral_base: PI4_LOW_PERIPHERAL_BASE,
        board_model: BoardModel::Model4,
    },
    PlatformInfo {
        peripheral_base: PI4_HIGH_PERIPHERAL_BASE,
        board_model: BoardModel::Model4,
    },
    PlatformInfo {
        peripheral_base: PI5_PERIPHERAL_BASE,
        board_model: BoardModel::Model5,
    },
];

/// A free-running counter never reads as all zeroes or all ones; an
/// unbacked address does.
#[inline]
const fn is_live(value: u32) -> bool {
    value != 0 && value != u32::MAX
}

/// Probe the candidate apertures in order and return the first live one.
///
/// Does not publish anything; see [`Platform::detect`] for the one-shot
/// variant used at boot.
pub fn detect<P: PhysProbe + ?Sized>(probe: &P) -> PlatformInfo {
    for candidate in CANDIDATES {
        let counter = system_timer_counter(candidate.peripheral_base);
        let value = probe.probe32(counter);
        debug!("platform: probe {:#x} -> {:#010x}", counter, value);

        if is_live(value) {
            return candidate;
        }
    }

    warn!(
        "platform: no system timer answered, assuming {:#x}",
        PlatformInfo::FALLBACK.peripheral_base
    );
    PlatformInfo::FALLBACK
}

/// The published platform descriptor.
pub struct Platform {
    info: OnceCell<PlatformInfo>,
    dtb: AtomicU64,
}

impl Platform {
    pub const fn new() -> Self {
        Self {
            info: OnceCell::uninit(),
            dtb: AtomicU64::new(0),
        }
    }

    /// Detect and publish the platform descriptor.
    ///
    /// Only the first call probes hardware. Every later call returns the
    /// descriptor published by the first one. The device-tree pointer is
    /// recorded but never dereferenced.
    pub fn detect<P: PhysProbe + ?Sized>(&self, dtb: u64, probe: &P) -> PlatformInfo {
        *self.info.get_or_init(|| {
            self.dtb.store(dtb, Ordering::Relaxed);
            let info = detect(probe);
            info!(
                "platform: {} peripherals at {:#x} (dtb {:#x})",
                info.board_model, info.peripheral_base, dtb
            );
            info
        })
    }

    /// The descriptor, if [`Platform::detect`] has completed.
    pub fn get(&self) -> Option<PlatformInfo> {
        self.info.get().copied()
    }

    /// The descriptor.
    ///
    /// # Panics
    ///
    /// Panics if called before [`Platform::detect`].
    pub fn info(&self) -> PlatformInfo {
        match self.get() {
            Some(info) => info,
            None => panic!("platform descriptor read before detection"),
        }
    }

    pub fn is_detected(&self) -> bool {
        self.info.is_initialized()
    }

    /// Device-tree pointer handed over by the firmware, `0` if none.
    pub fn dtb_pointer(&self) -> u64 {
        self.dtb.load(Ordering::Relaxed)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptor for the running board, written once during early boot.
pub static PLATFORM: Platform = Platform::new();

pub fn get_gpio_base() -> u64 {
    PLATFORM.info().gpio_base()
}

pub fn get_uart_base() -> u64 {
    PLATFORM.info().uart_base()
}

pub fn get_mailbox_base() -> u64 {
    PLATFORM.info().mailbox_base()
}

pub fn get_board_model() -> BoardModel {
    PLATFORM.info().board_model()
}
