use core::cell::UnsafeCell;
use core::fmt;
use core::ptr;

use crate::MailboxError;

/// Capacity of a [`PropertyBuffer`] in 32-bit words.
pub const BUFFER_WORDS: usize = 64;

/// Smallest meaningful message: length, code, end tag.
const MIN_MESSAGE_BYTES: u32 = 12;

/// Property message shared with the GPU.
///
/// The firmware rewrites the buffer in place while a call is in flight, so
/// every access goes through volatile reads and writes on an [`UnsafeCell`].
/// The alignment guarantees the low four bits of its address are free for
/// the channel number.
#[repr(C, align(16))]
pub struct PropertyBuffer {
    words: UnsafeCell<[u32; BUFFER_WORDS]>,
}

// SAFETY: the buffer is plain memory; concurrent callers are serialised by
// whoever owns the mailbox.
unsafe impl Send for PropertyBuffer {}

impl PropertyBuffer {
    pub const fn new() -> Self {
        Self {
            words: UnsafeCell::new([0; BUFFER_WORDS]),
        }
    }

    /// Build a buffer from a pre-encoded message.
    pub fn from_words(words: &[u32]) -> Result<Self, MailboxError> {
        if words.len() > BUFFER_WORDS {
            return Err(MailboxError::BufferTooSmall((words.len() * 4) as u32));
        }
        let buffer = Self::new();
        for (i, &word) in words.iter().enumerate() {
            buffer.set_word(i, word);
        }
        Ok(buffer)
    }

    /// Pointer to word 0, as handed to the GPU.
    pub fn as_ptr(&self) -> *const u32 {
        self.words.get().cast::<u32>()
    }

    /// Mutable pointer to word 0, for whoever plays the GPU's side.
    pub fn as_mut_ptr(&self) -> *mut u32 {
        self.words.get().cast::<u32>()
    }

    /// # Panics
    ///
    /// Panics if `index` is outside the buffer.
    pub fn word(&self, index: usize) -> u32 {
        assert!(index < BUFFER_WORDS, "property buffer index {index} out of range");
        // SAFETY: index is in bounds and the cell owns the storage
        unsafe { ptr::read_volatile(self.as_ptr().add(index)) }
    }

    /// # Panics
    ///
    /// Panics if `index` is outside the buffer.
    pub fn set_word(&self, index: usize, value: u32) {
        assert!(index < BUFFER_WORDS, "property buffer index {index} out of range");
        // SAFETY: index is in bounds and the cell owns the storage
        unsafe { ptr::write_volatile(self.as_mut_ptr().add(index), value) }
    }

    /// Byte length declared in word 0.
    pub fn declared_len(&self) -> u32 {
        self.word(0)
    }

    /// Response code in word 1.
    pub fn code(&self) -> u32 {
        self.word(1)
    }

    /// Check that word 0 describes a message this buffer can hold.
    pub fn validate(&self) -> Result<(), MailboxError> {
        let len = self.declared_len();
        if len < MIN_MESSAGE_BYTES || len % 4 != 0 || len as usize > BUFFER_WORDS * 4 {
            return Err(MailboxError::BufferTooSmall(len));
        }
        Ok(())
    }

    /// Walk the tags up to the end tag or the declared length.
    pub fn tags(&self) -> Tags<'_> {
        let limit = (self.declared_len() as usize / 4).min(BUFFER_WORDS);
        Tags {
            buffer: self,
            offset: 2,
            limit,
        }
    }
}

impl Default for PropertyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBuffer")
            .field("len", &self.declared_len())
            .field("code", &format_args!("{:#010x}", self.code()))
            .finish_non_exhaustive()
    }
}

/// One tag header inside a [`PropertyBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// Word offset of the tag id.
    pub offset: usize,
    pub id: u32,
    /// Size of the value buffer in bytes.
    pub value_size: u32,
    /// Request/response indicator word.
    pub indicator: u32,
}

impl Tag {
    /// Bit 31 of the indicator is set by the firmware once it handled the tag.
    pub const fn is_response(&self) -> bool {
        self.indicator & 0x8000_0000 != 0
    }

    /// Number of value bytes the firmware wrote back.
    pub const fn response_len(&self) -> u32 {
        self.indicator & 0x7FFF_FFFF
    }

    /// Word offset of the first value word.
    pub const fn value_offset(&self) -> usize {
        self.offset + 3
    }
}

pub struct Tags<'a> {
    buffer: &'a PropertyBuffer,
    offset: usize,
    limit: usize,
}

impl Iterator for Tags<'_> {
    type Item = Tag;

    fn next(&mut self) -> Option<Tag> {
        if self.offset + 3 > self.limit {
            return None;
        }
        let id = self.buffer.word(self.offset);
        if id == crate::tag::END {
            return None;
        }
        let tag = Tag {
            offset: self.offset,
            id,
            value_size: self.buffer.word(self.offset + 1),
            indicator: self.buffer.word(self.offset + 2),
        };
        self.offset = tag.value_offset() + tag.value_size.div_ceil(4) as usize;
        Some(tag)
    }
}
