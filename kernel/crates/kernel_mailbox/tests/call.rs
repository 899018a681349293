mod common;

use common::{BUFFER_PHYS, FakeGpu, MAILBOX_BASE_PI4, MAILBOX_BASE_PI5};
use kernel_mailbox::{Mailbox, MailboxError, PropertyBuffer, SPIN_LIMIT, tag};
use kernel_platform::memory_map::{PI4_LOW_PERIPHERAL_BASE, PI5_PERIPHERAL_BASE};
use kernel_platform::{BoardModel, PlatformInfo};

const PI4: PlatformInfo = PlatformInfo {
    peripheral_base: PI4_LOW_PERIPHERAL_BASE,
    board_model: BoardModel::Model4,
};

const PI5: PlatformInfo = PlatformInfo {
    peripheral_base: PI5_PERIPHERAL_BASE,
    board_model: BoardModel::Model5,
};

fn firmware_revision_request() -> PropertyBuffer {
    PropertyBuffer::from_words(&[28, 0, tag::GET_FIRMWARE_REV, 4, 0, 0, 0, 0]).unwrap()
}

#[test]
fn firmware_revision_round_trip() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    gpu.respond_with(|words| {
        words[1] = 0x8000_0000;
        words[4] = 0x8000_0004;
        words[5] = 0x6543_2100;
    });
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);
    let buffer = firmware_revision_request();

    assert_eq!(mbox.call(&buffer), Ok(()));

    let expected = ((BUFFER_PHYS as u32 & 0x0FFF_FFFF) | 0x4000_0000) | 8;
    assert_eq!(*gpu.written.borrow(), vec![expected]);
    assert_eq!(buffer.word(5), 0x6543_2100);
}

#[test]
fn firmware_error_code_is_surfaced() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    gpu.respond_with(|words| words[1] = 0x8000_0001);
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);
    let buffer = firmware_revision_request();

    assert_eq!(mbox.call(&buffer), Err(MailboxError::ResponseError(0x8000_0001)));
}

#[test]
fn untouched_buffer_is_a_response_error() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);
    let buffer = firmware_revision_request();

    assert_eq!(mbox.call(&buffer), Err(MailboxError::ResponseError(0)));
}

#[test]
fn pi5_uses_vc6_alias() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI5);
    gpu.respond_with(|words| words[1] = 0x8000_0000);
    let mbox = Mailbox::with_translation(&gpu, &PI5, &gpu);

    mbox.call(&firmware_revision_request()).unwrap();

    let word = gpu.written.borrow()[0];
    assert_eq!(word & 0xF000_0000, 0xC000_0000);
    assert_eq!(word & 0xF, 8);
    assert_eq!(word & 0x0FFF_FFF0, BUFFER_PHYS as u32);
}

#[test]
fn replies_for_other_channels_are_discarded() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    gpu.respond_with(|words| words[1] = 0x8000_0000);
    gpu.inject_foreign(0x4000_0001);
    gpu.inject_foreign(0x4000_0009);
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);

    assert_eq!(mbox.call(&firmware_revision_request()), Ok(()));
}

#[test]
fn stuck_transmit_fifo_times_out() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    gpu.tx_stuck.set(true);
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);

    assert_eq!(mbox.call(&firmware_revision_request()), Err(MailboxError::TxTimeout));
    assert!(gpu.written.borrow().is_empty());
    assert_eq!(gpu.status_polls.get(), SPIN_LIMIT as usize);
}

#[test]
fn silent_gpu_times_out() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    gpu.rx_silent.set(true);
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);

    assert_eq!(mbox.call(&firmware_revision_request()), Err(MailboxError::RxTimeout));
    assert_eq!(gpu.written.borrow().len(), 1);
}

#[test]
fn unaligned_physical_address() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    gpu.phys.set(0x0010_0008);
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);

    assert_eq!(
        mbox.call(&firmware_revision_request()),
        Err(MailboxError::Unaligned(0x0010_0008))
    );
    assert!(gpu.written.borrow().is_empty());
}

#[test]
fn malformed_length_is_rejected() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);
    let buffer = PropertyBuffer::from_words(&[3, 0, 0]).unwrap();

    assert_eq!(mbox.call(&buffer), Err(MailboxError::BufferTooSmall(3)));
    assert!(gpu.written.borrow().is_empty());
}

#[test]
fn every_register_access_is_fenced() {
    let gpu = FakeGpu::new(MAILBOX_BASE_PI4);
    gpu.respond_with(|words| words[1] = 0x8000_0000);
    let mbox = Mailbox::with_translation(&gpu, &PI4, &gpu);

    mbox.call(&firmware_revision_request()).unwrap();

    // leading barrier, then two per access:
    // STATUS (tx), WRITE, STATUS (rx), READ
    assert_eq!(gpu.barriers.get(), 1 + 2 * 4);
}
