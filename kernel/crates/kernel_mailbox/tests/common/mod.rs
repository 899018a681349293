#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use kernel_mailbox::DmaTranslate;
use kernel_platform::RegisterBus;

pub const MAILBOX_BASE_PI4: u64 = 0xFE00_B880;
pub const MAILBOX_BASE_PI5: u64 = 0x10_7C00_B880;

const READ: u64 = 0x00;
const STATUS: u64 = 0x18;
const WRITE: u64 = 0x20;

const FULL: u32 = 1 << 31;
const EMPTY: u32 = 1 << 30;

/// Physical address the fake firmware sees for the buffer under test.
pub const BUFFER_PHYS: u64 = 0x0010_0000;

type Responder = Box<dyn Fn(&mut [u32])>;

/// VideoCore stand-in.
///
/// Doubles as the DMA translation so it learns where the buffer of the call
/// in flight lives. A write to the WRITE register runs the responder over
/// that buffer and queues any injected foreign replies followed by the
/// echoed message.
pub struct FakeGpu {
    base: u64,
    buffer: Cell<*mut u32>,
    pub phys: Cell<u64>,
    responder: RefCell<Option<Responder>>,
    foreign: RefCell<Vec<u32>>,
    replies: RefCell<VecDeque<u32>>,
    pub written: RefCell<Vec<u32>>,
    pub tx_stuck: Cell<bool>,
    pub rx_silent: Cell<bool>,
    pub status_polls: Cell<usize>,
    pub barriers: Cell<usize>,
}

impl FakeGpu {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            buffer: Cell::new(std::ptr::null_mut()),
            phys: Cell::new(BUFFER_PHYS),
            responder: RefCell::new(None),
            foreign: RefCell::new(Vec::new()),
            replies: RefCell::new(VecDeque::new()),
            written: RefCell::new(Vec::new()),
            tx_stuck: Cell::new(false),
            rx_silent: Cell::new(false),
            status_polls: Cell::new(0),
            barriers: Cell::new(0),
        }
    }

    pub fn respond_with(&self, f: impl Fn(&mut [u32]) + 'static) {
        *self.responder.borrow_mut() = Some(Box::new(f));
    }

    /// Queue a reply for another channel ahead of the property reply.
    pub fn inject_foreign(&self, word: u32) {
        self.foreign.borrow_mut().push(word);
    }

    fn on_write(&self, word: u32) {
        self.written.borrow_mut().push(word);

        if let Some(respond) = self.responder.borrow().as_ref() {
            let ptr = self.buffer.get();
            assert!(!ptr.is_null(), "message sent without a translated buffer");
            // SAFETY: the buffer outlives the call that wrote its address
            let words = unsafe {
                std::slice::from_raw_parts_mut(ptr, kernel_mailbox::BUFFER_WORDS)
            };
            respond(words);
        }

        if self.rx_silent.get() {
            return;
        }
        let mut replies = self.replies.borrow_mut();
        replies.extend(self.foreign.borrow_mut().drain(..));
        replies.push_back(word);
    }
}

impl RegisterBus for FakeGpu {
    fn read32(&self, addr: u64) -> u32 {
        match addr - self.base {
            STATUS => {
                self.status_polls.set(self.status_polls.get() + 1);
                let mut status = 0;
                if self.tx_stuck.get() {
                    status |= FULL;
                }
                if self.replies.borrow().is_empty() {
                    status |= EMPTY;
                }
                status
            }
            READ => self.replies.borrow_mut().pop_front().unwrap_or(0),
            other => panic!("unexpected mailbox read at +{other:#x}"),
        }
    }

    fn write32(&self, addr: u64, value: u32) {
        match addr - self.base {
            WRITE => self.on_write(value),
            other => panic!("unexpected mailbox write at +{other:#x}"),
        }
    }

    fn barrier(&self) {
        self.barriers.set(self.barriers.get() + 1);
    }
}

impl DmaTranslate for &FakeGpu {
    fn phys_addr(&self, ptr: *const u32) -> u64 {
        self.buffer.set(ptr.cast_mut());
        self.phys.get()
    }
}

/// Firmware that acknowledges every tag and fills values from `value_for`.
pub fn answer_tags(words: &mut [u32], value_for: impl Fn(u32, &[u32]) -> Vec<u32>) {
    let len = words[0] as usize / 4;
    let mut offset = 2;
    while offset + 3 <= len && words[offset] != 0 {
        let id = words[offset];
        let size = words[offset + 1] as usize / 4;
        let request_len = words[offset + 2] as usize / 4;
        let request: Vec<u32> = words[offset + 3..offset + 3 + request_len].to_vec();
        let reply = value_for(id, &request);
        for (i, w) in reply.iter().take(size).enumerate() {
            words[offset + 3 + i] = *w;
        }
        words[offset + 2] = 0x8000_0000 | (reply.len().min(size) * 4) as u32;
        offset += 3 + size;
    }
    words[1] = 0x8000_0000;
}
