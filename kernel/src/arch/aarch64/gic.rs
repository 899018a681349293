//! ARM Generic Interrupt Controller (GIC-400, GICv2) Driver
//!
//! The GIC consists of two main components:
//! - Distributor (GICD): Manages interrupt sources and routing
//! - CPU Interface (GICC): Per-CPU interrupt handling
//!
//! Both the BCM2711 and the BCM2712 carry a GIC-400; only the base addresses
//! differ, so they are picked from the detected board model.

use conquer_once::spin::OnceCell;
use kernel_platform::{BoardModel, RegisterWindow};

use super::platform::mmio::{VolatileBus, MMIO};

/// GIC Distributor register offsets
mod gicd {
    /// Distributor Control Register
    pub const CTLR: u64 = 0x000;
    /// Interrupt Controller Type Register
    pub const TYPER: u64 = 0x004;
    /// Interrupt Set-Enable Registers (32 bits each, 1 bit per IRQ)
    pub const ISENABLER: u64 = 0x100;
    /// Interrupt Clear-Enable Registers
    pub const ICENABLER: u64 = 0x180;
    /// Interrupt Clear-Pending Registers
    pub const ICPENDR: u64 = 0x280;
    /// Interrupt Priority Registers (8 bits per IRQ)
    pub const IPRIORITYR: u64 = 0x400;
    /// Interrupt Processor Targets Registers (8 bits per IRQ)
    pub const ITARGETSR: u64 = 0x800;
    /// Interrupt Configuration Registers (2 bits per IRQ)
    pub const ICFGR: u64 = 0xC00;
    /// Software Generated Interrupt Register
    pub const SGIR: u64 = 0xF00;
}

/// GIC CPU Interface register offsets
mod gicc {
    /// CPU Interface Control Register
    pub const CTLR: u64 = 0x000;
    /// Interrupt Priority Mask Register
    pub const PMR: u64 = 0x004;
    /// Interrupt Acknowledge Register
    pub const IAR: u64 = 0x00C;
    /// End of Interrupt Register
    pub const EOIR: u64 = 0x010;
}

/// Special IRQ numbers
pub mod irq {
    /// SGI asking the target core to reschedule
    pub const RESCHEDULE: u32 = 2;
    /// Non-secure physical timer IRQ (PPI, ID 30)
    pub const TIMER_PHYS: u32 = 30;
    /// Spurious interrupt (no pending interrupt)
    pub const SPURIOUS: u32 = 1023;
}

/// GIC-400 register blocks of one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GicBases {
    pub distributor: u64,
    pub cpu_interface: u64,
}

impl GicBases {
    pub const fn for_board(model: BoardModel) -> Self {
        match model {
            BoardModel::Model4 => Self {
                distributor: 0xFF84_1000,
                cpu_interface: 0xFF84_2000,
            },
            BoardModel::Model5 => Self {
                distributor: 0x10_7FFF_9000,
                cpu_interface: 0x10_7FFF_A000,
            },
        }
    }
}

pub struct Gic {
    gicd: RegisterWindow<'static, VolatileBus>,
    gicc: RegisterWindow<'static, VolatileBus>,
}

static GIC: OnceCell<Gic> = OnceCell::uninit();

impl Gic {
    pub fn new(bases: GicBases) -> Self {
        Self {
            gicd: RegisterWindow::new(&MMIO, bases.distributor),
            gicc: RegisterWindow::new(&MMIO, bases.cpu_interface),
        }
    }

    fn num_irqs(&self) -> u32 {
        let typer = self.gicd.read(gicd::TYPER);
        ((typer & 0x1F) + 1) * 32
    }

    /// Configure the distributor. Runs once, on the boot core.
    fn init_distributor(&self) {
        // Disable distributor while configuring
        self.gicd.write(gicd::CTLR, 0);

        let num_irqs = self.num_irqs();
        log::debug!("GIC supports {} IRQs", num_irqs);

        // Disable and clear all interrupts
        for i in 0..num_irqs.div_ceil(32) {
            self.gicd.write(gicd::ICENABLER + u64::from(i) * 4, 0xFFFF_FFFF);
            self.gicd.write(gicd::ICPENDR + u64::from(i) * 4, 0xFFFF_FFFF);
        }

        // Set all interrupts to lowest priority (0xFF)
        for i in 0..num_irqs.div_ceil(4) {
            self.gicd.write(gicd::IPRIORITYR + u64::from(i) * 4, 0xFFFF_FFFF);
        }

        // Route all SPIs to CPU 0; SGIs/PPIs (first 8 registers) are banked
        for i in 8..num_irqs.div_ceil(4) {
            self.gicd.write(gicd::ITARGETSR + u64::from(i) * 4, 0x0101_0101);
        }

        // Configure all SPIs as level-triggered
        for i in 2..num_irqs.div_ceil(16) {
            self.gicd.write(gicd::ICFGR + u64::from(i) * 4, 0);
        }

        self.gicd.write(gicd::CTLR, 1);
    }

    /// Enable the banked CPU interface of the calling core.
    fn init_cpu_interface(&self) {
        // Set priority mask to accept all priorities
        self.gicc.write(gicc::PMR, 0xFF);
        self.gicc.write(gicc::CTLR, 1);
    }

    /// Enable a specific interrupt. SGIs and PPIs are banked, so this acts
    /// on the calling core for IDs below 32.
    pub fn enable_irq(&self, irq: u32) {
        let reg_index = u64::from(irq / 32);
        let bit = 1u32 << (irq % 32);
        self.gicd.write(gicd::ISENABLER + reg_index * 4, bit);
    }

    /// Set interrupt priority (0 = highest, 255 = lowest)
    pub fn set_priority(&self, irq: u32, priority: u8) {
        let reg_index = u64::from(irq / 4);
        let shift = (irq % 4) * 8;
        self.gicd.modify(gicd::IPRIORITYR + reg_index * 4, |val| {
            (val & !(0xFF << shift)) | (u32::from(priority) << shift)
        });
    }

    /// Acknowledge an interrupt (read IAR)
    ///
    /// Returns the raw IAR value. Bits [9:0] hold the interrupt ID (1023 is
    /// spurious); for SGIs bits [12:10] name the sending core, and EOIR
    /// expects the whole value back.
    pub fn acknowledge(&self) -> u32 {
        self.gicc.read(gicc::IAR)
    }

    /// Signal end of interrupt handling for a value returned by
    /// [`Gic::acknowledge`].
    pub fn end_of_interrupt(&self, iar: u32) {
        self.gicc.write(gicc::EOIR, iar);
    }

    /// Raise SGI `sgi` on `cpu`. GIC CPU interface numbers equal the core
    /// numbers on the BCM2711 and BCM2712.
    pub fn send_sgi(&self, cpu: usize, sgi: u32) {
        let target = 1u32 << (cpu & 7);
        self.gicd.write(gicd::SGIR, (target << 16) | (sgi & 0xF));
    }
}

/// Initialize the GIC on the boot core.
pub fn init(model: BoardModel) -> &'static Gic {
    let bases = GicBases::for_board(model);
    GIC.init_once(|| Gic::new(bases));
    let gic = get();
    gic.init_distributor();
    gic.init_cpu_interface();
    log::info!(
        "GIC-400 initialized (gicd={:#x}, gicc={:#x})",
        bases.distributor,
        bases.cpu_interface
    );
    gic
}

/// Bring up the CPU interface of a secondary core.
pub fn init_secondary() -> &'static Gic {
    let gic = get();
    gic.init_cpu_interface();
    gic
}

/// # Panics
/// Panics if the boot core has not run [`init`].
pub fn get() -> &'static Gic {
    GIC.get().expect("GIC not initialized")
}
