use core::hint::spin_loop;

use kernel_platform::{BoardModel, PlatformInfo, RegisterBus, RegisterWindow};
use log::{debug, trace};

use crate::{MailboxError, PropertyBuffer, RESPONSE_SUCCESS};

/// Property tags, ARM to VideoCore
pub const PROPERTY_CHANNEL: u32 = 8;

/// Iterations to wait on each FIFO before giving up
pub const SPIN_LIMIT: u32 = 1_000_000;

/// Mailbox 0 read register
const MBOX_READ: u64 = 0x00;

/// Mailbox 0 status register
const MBOX_STATUS: u64 = 0x18;

/// Mailbox 1 write register
const MBOX_WRITE: u64 = 0x20;

/// Status register bits
mod status {
    /// Mailbox is full (cannot write)
    pub const FULL: u32 = 0x8000_0000;
    /// Mailbox is empty (cannot read)
    pub const EMPTY: u32 = 0x4000_0000;
}

const CHANNEL_MASK: u32 = 0xF;

/// Cache-coherent alias the GPU uses to address ARM memory.
pub const fn bus_alias(model: BoardModel) -> u32 {
    match model {
        BoardModel::Model4 => 0x4000_0000,
        BoardModel::Model5 => 0xC000_0000,
    }
}

/// Translation from a CPU pointer to the physical address the GPU is given.
pub trait DmaTranslate {
    fn phys_addr(&self, ptr: *const u32) -> u64;
}

/// Virtual equals physical (MMU off or identity mapped).
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityMapped;

impl DmaTranslate for IdentityMapped {
    fn phys_addr(&self, ptr: *const u32) -> u64 {
        ptr as u64
    }
}

/// Property channel of the VideoCore mailbox.
///
/// Callers must serialise access; a second call entering while one is in
/// flight is not supported.
pub struct Mailbox<'a, B: RegisterBus + ?Sized, D: DmaTranslate = IdentityMapped> {
    regs: RegisterWindow<'a, B>,
    alias: u32,
    dma: D,
}

impl<'a, B: RegisterBus + ?Sized> Mailbox<'a, B> {
    pub fn new(bus: &'a B, platform: &PlatformInfo) -> Self {
        Self::with_translation(bus, platform, IdentityMapped)
    }
}

impl<'a, B: RegisterBus + ?Sized, D: DmaTranslate> Mailbox<'a, B, D> {
    pub fn with_translation(bus: &'a B, platform: &PlatformInfo, dma: D) -> Self {
        Self {
            regs: RegisterWindow::new(bus, platform.mailbox_base()),
            alias: bus_alias(platform.board_model),
            dma,
        }
    }

    pub fn base(&self) -> u64 {
        self.regs.base()
    }

    /// The word written to the WRITE register for a buffer at `phys`.
    pub fn encode(&self, phys: u64) -> u32 {
        ((phys as u32 & 0x0FFF_FFFF) | self.alias) | PROPERTY_CHANNEL
    }

    /// Submit `buffer` on the property channel and wait for the reply.
    ///
    /// Succeeds iff the firmware wrote [`RESPONSE_SUCCESS`] into word 1.
    pub fn call(&self, buffer: &PropertyBuffer) -> Result<(), MailboxError> {
        buffer.validate()?;

        let phys = self.dma.phys_addr(buffer.as_ptr());
        if phys & 0xF != 0 {
            return Err(MailboxError::Unaligned(phys));
        }
        let message = self.encode(phys);

        // Publish the buffer before ringing the doorbell
        self.regs.bus().barrier();

        self.wait_writable()?;
        self.regs.write(MBOX_WRITE, message);
        trace!("mailbox: sent {:#010x}", message);

        self.wait_reply()?;

        match buffer.code() {
            RESPONSE_SUCCESS => Ok(()),
            code => {
                debug!("mailbox: firmware returned {:#010x}", code);
                Err(MailboxError::ResponseError(code))
            }
        }
    }

    fn wait_writable(&self) -> Result<(), MailboxError> {
        for _ in 0..SPIN_LIMIT {
            if !self.regs.is_set(MBOX_STATUS, status::FULL) {
                return Ok(());
            }
            spin_loop();
        }
        debug!("mailbox: transmit FIFO full after {} polls", SPIN_LIMIT);
        Err(MailboxError::TxTimeout)
    }

    /// Wait for a channel 8 reply. Replies for other channels are dropped
    /// and count against the same deadline.
    fn wait_reply(&self) -> Result<(), MailboxError> {
        for _ in 0..SPIN_LIMIT {
            if self.regs.is_set(MBOX_STATUS, status::EMPTY) {
                spin_loop();
                continue;
            }

            let reply = self.regs.read(MBOX_READ);
            if reply & CHANNEL_MASK == PROPERTY_CHANNEL {
                return Ok(());
            }
            debug!("mailbox: discarding reply {:#010x} for another channel", reply);
        }
        debug!("mailbox: no reply after {} polls", SPIN_LIMIT);
        Err(MailboxError::RxTimeout)
    }
}
