//! VideoCore firmware services
//!
//! Owns the kernel's single property-channel [`Mailbox`]. The hardware
//! mailbox has one in-flight message, so every caller goes through
//! [`with_mailbox`].

use conquer_once::spin::OnceCell;
use kernel_mailbox::{led, Mailbox, MailboxError};
use kernel_platform::memory_map::SYSTEM_TIMER_CLO_OFFSET;
use kernel_platform::{RegisterWindow, PLATFORM};
use kernel_sched::Arch;
use log::{info, warn};
use spin::Mutex;

use crate::arch::aarch64::Aarch64;
use crate::arch::traits::Architecture;
use crate::arch::platform::mmio::{VolatileBus, MMIO};

pub type Firmware = Mailbox<'static, VolatileBus>;

static MAILBOX: OnceCell<Mutex<Firmware>> = OnceCell::uninit();

/// Create the mailbox and log what the firmware reports about the board.
///
/// A board revision that disagrees with the probed model is logged; the
/// published platform descriptor is left as detected.
pub fn init() {
    let platform = PLATFORM.info();
    MAILBOX.init_once(|| Mutex::new(Mailbox::new(&MMIO, &platform)));

    if let Err(e) = report_board() {
        warn!("firmware query failed: {}", e);
    }
}

fn report_board() -> Result<(), MailboxError> {
    let platform = PLATFORM.info();
    let (firmware, revision, (arm_base, arm_size)) =
        with_mailbox(|mailbox| -> Result<_, MailboxError> {
            Ok((
                mailbox.firmware_revision()?,
                mailbox.board_revision()?,
                mailbox.arm_memory()?,
            ))
        })?;
    info!(
        "firmware {:#x}, board {} (revision {:#x}), ARM memory {:#x}+{:#x}",
        firmware, revision, revision.0, arm_base, arm_size
    );

    match revision.model() {
        Some(model) if model != platform.board_model => warn!(
            "board revision {:#x} says {}, probe found {}; keeping probe result",
            revision.0, model, platform.board_model
        ),
        Some(_) => {}
        None => warn!("board revision {:#x} is not a Pi 4 or Pi 5", revision.0),
    }
    Ok(())
}

/// Run `f` with exclusive use of the mailbox and IRQs masked, so a tick
/// cannot preempt the holder in the middle of a round trip.
///
/// # Panics
/// Panics if [`init`] has not run.
pub fn with_mailbox<R>(f: impl FnOnce(&Firmware) -> R) -> R {
    let mailbox = MAILBOX.get().expect("firmware mailbox not initialized");
    let saved = Aarch64::irq_save();
    let result = f(&mailbox.lock());
    Aarch64::irq_restore(saved);
    result
}

/// Busy-wait on the 1 MHz system timer.
pub fn delay_us(us: u32) {
    let Some(platform) = PLATFORM.get() else {
        return;
    };
    let aperture = RegisterWindow::new(&MMIO, platform.peripheral_base);
    let start = aperture.read(SYSTEM_TIMER_CLO_OFFSET);
    while aperture.read(SYSTEM_TIMER_CLO_OFFSET).wrapping_sub(start) < us {
        core::hint::spin_loop();
    }
}

/// Blink the activity LED forever. Used once the kernel cannot go on.
///
/// Gives up and parks quietly if the mailbox is not available, for example
/// because the panic happened while it was locked.
pub fn blink_halt() -> ! {
    let Some(mailbox) = MAILBOX.get().and_then(|m| m.try_lock()) else {
        Aarch64::halt()
    };
    let mut on = true;
    loop {
        let _ = mailbox.set_led_state(led::ACT, on);
        on = !on;
        delay_us(250_000);
    }
}
