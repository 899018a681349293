//! Firmware property tags
//!
//! [`PropertyRequest`] lays out one or more tags in a [`PropertyBuffer`];
//! the typed helpers on [`Mailbox`] cover the tags the kernel uses during
//! bring-up.

use kernel_platform::{BoardRevision, RegisterBus};

use crate::{
    BUFFER_WORDS, DmaTranslate, Mailbox, MailboxError, PropertyBuffer, REQUEST_CODE, tag,
};

/// Largest value buffer a single tag may use, in words.
pub const MAX_VALUE_WORDS: usize = 8;

/// Handle to a tag placed by [`PropertyRequest::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSlot {
    id: u32,
    offset: usize,
    value_words: usize,
}

/// Value words the firmware wrote back for one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagValue {
    words: [u32; MAX_VALUE_WORDS],
    len: usize,
}

impl TagValue {
    pub fn words(&self) -> &[u32] {
        &self.words[..self.len]
    }

    /// Value word `index`, zero if the tag has fewer words.
    pub fn word(&self, index: usize) -> u32 {
        self.words().get(index).copied().unwrap_or(0)
    }
}

/// Builder for a property-channel message.
pub struct PropertyRequest {
    buffer: PropertyBuffer,
    cursor: usize,
}

impl PropertyRequest {
    pub const fn new() -> Self {
        Self {
            buffer: PropertyBuffer::new(),
            cursor: 2,
        }
    }

    /// Append a tag carrying `request` with room for `response_words` of
    /// reply. The value buffer is as large as the bigger of the two.
    pub fn push(
        &mut self,
        id: u32,
        request: &[u32],
        response_words: usize,
    ) -> Result<TagSlot, MailboxError> {
        let value_words = request.len().max(response_words);
        let end = self.cursor + 3 + value_words;
        // one word stays reserved for the end tag
        if value_words > MAX_VALUE_WORDS || end + 1 > BUFFER_WORDS {
            return Err(MailboxError::BufferTooSmall(((end + 1) * 4) as u32));
        }

        let slot = TagSlot {
            id,
            offset: self.cursor,
            value_words,
        };
        self.buffer.set_word(self.cursor, id);
        self.buffer.set_word(self.cursor + 1, (value_words * 4) as u32);
        self.buffer.set_word(self.cursor + 2, (request.len() * 4) as u32);
        for i in 0..value_words {
            let word = request.get(i).copied().unwrap_or(0);
            self.buffer.set_word(self.cursor + 3 + i, word);
        }
        self.cursor = end;
        Ok(slot)
    }

    /// Terminate the tag list, fill in the header and hand out the buffer.
    pub fn finish(&mut self) -> &PropertyBuffer {
        self.buffer.set_word(self.cursor, tag::END);
        self.buffer.set_word(0, ((self.cursor + 1) * 4) as u32);
        self.buffer.set_word(1, REQUEST_CODE);
        &self.buffer
    }

    pub fn buffer(&self) -> &PropertyBuffer {
        &self.buffer
    }

    /// Read back the reply to `slot` after a successful call.
    pub fn response(&self, slot: TagSlot) -> Result<TagValue, MailboxError> {
        let indicator = self.buffer.word(slot.offset + 2);
        if self.buffer.word(slot.offset) != slot.id || indicator & 0x8000_0000 == 0 {
            return Err(MailboxError::TagNotAcknowledged(slot.id));
        }

        let mut value = TagValue {
            words: [0; MAX_VALUE_WORDS],
            len: slot.value_words,
        };
        for (i, word) in value.words[..slot.value_words].iter_mut().enumerate() {
            *word = self.buffer.word(slot.offset + 3 + i);
        }
        Ok(value)
    }
}

impl Default for PropertyRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Power state of a firmware-managed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerState {
    pub on: bool,
    pub exists: bool,
}

impl PowerState {
    const ON: u32 = 1 << 0;
    const MISSING: u32 = 1 << 1;
    const WAIT: u32 = 1 << 1;

    fn from_raw(raw: u32) -> Self {
        Self {
            on: raw & Self::ON != 0,
            exists: raw & Self::MISSING == 0,
        }
    }
}

impl<B: RegisterBus + ?Sized, D: DmaTranslate> Mailbox<'_, B, D> {
    /// Run a single-tag request and return its value words.
    pub fn property(
        &self,
        id: u32,
        request: &[u32],
        response_words: usize,
    ) -> Result<TagValue, MailboxError> {
        let mut message = PropertyRequest::new();
        let slot = message.push(id, request, response_words)?;
        self.call(message.finish())?;
        message.response(slot)
    }

    pub fn firmware_revision(&self) -> Result<u32, MailboxError> {
        Ok(self.property(tag::GET_FIRMWARE_REV, &[], 1)?.word(0))
    }

    pub fn board_model(&self) -> Result<u32, MailboxError> {
        Ok(self.property(tag::GET_BOARD_MODEL, &[], 1)?.word(0))
    }

    pub fn board_revision(&self) -> Result<BoardRevision, MailboxError> {
        let value = self.property(tag::GET_BOARD_REV, &[], 1)?;
        Ok(BoardRevision(value.word(0)))
    }

    pub fn board_serial(&self) -> Result<u64, MailboxError> {
        let value = self.property(tag::GET_BOARD_SERIAL, &[], 2)?;
        Ok((u64::from(value.word(1)) << 32) | u64::from(value.word(0)))
    }

    /// MAC address in network byte order.
    pub fn mac_address(&self) -> Result<[u8; 6], MailboxError> {
        let value = self.property(tag::GET_BOARD_MAC, &[], 2)?;
        let lo = value.word(0).to_le_bytes();
        let hi = value.word(1).to_le_bytes();
        Ok([lo[0], lo[1], lo[2], lo[3], hi[0], hi[1]])
    }

    /// ARM memory split as `(base, size)` in bytes.
    pub fn arm_memory(&self) -> Result<(u32, u32), MailboxError> {
        let value = self.property(tag::GET_ARM_MEMORY, &[], 2)?;
        Ok((value.word(0), value.word(1)))
    }

    /// VideoCore memory split as `(base, size)` in bytes.
    pub fn vc_memory(&self) -> Result<(u32, u32), MailboxError> {
        let value = self.property(tag::GET_VC_MEMORY, &[], 2)?;
        Ok((value.word(0), value.word(1)))
    }

    pub fn power_state(&self, device: u32) -> Result<PowerState, MailboxError> {
        let value = self.property(tag::GET_POWER_STATE, &[device, 0], 2)?;
        Ok(PowerState::from_raw(value.word(1)))
    }

    /// Switch a device on or off. With `wait` the firmware returns only once
    /// the device has settled.
    pub fn set_power_state(
        &self,
        device: u32,
        on: bool,
        wait: bool,
    ) -> Result<PowerState, MailboxError> {
        let mut state = if on { PowerState::ON } else { 0 };
        if wait {
            state |= PowerState::WAIT;
        }
        let value = self.property(tag::SET_POWER_STATE, &[device, state], 2)?;
        Ok(PowerState::from_raw(value.word(1)))
    }

    /// Current rate of `clock` in Hz.
    pub fn clock_rate(&self, clock: u32) -> Result<u32, MailboxError> {
        Ok(self.property(tag::GET_CLOCK_RATE, &[clock], 2)?.word(1))
    }

    pub fn max_clock_rate(&self, clock: u32) -> Result<u32, MailboxError> {
        Ok(self.property(tag::GET_MAX_CLOCK_RATE, &[clock], 2)?.word(1))
    }

    pub fn min_clock_rate(&self, clock: u32) -> Result<u32, MailboxError> {
        Ok(self.property(tag::GET_MIN_CLOCK_RATE, &[clock], 2)?.word(1))
    }

    /// Request a new rate for `clock`; returns the rate actually applied.
    pub fn set_clock_rate(
        &self,
        clock: u32,
        rate_hz: u32,
        skip_turbo: bool,
    ) -> Result<u32, MailboxError> {
        let request = [clock, rate_hz, u32::from(skip_turbo)];
        Ok(self.property(tag::SET_CLOCK_RATE, &request, 2)?.word(1))
    }

    pub fn set_led_state(&self, led: u32, on: bool) -> Result<(), MailboxError> {
        self.property(tag::SET_LED_STATE, &[led, u32::from(on)], 2)?;
        Ok(())
    }

    /// Ask the firmware to reload the VL805 USB controller firmware after a
    /// PCIe reset. `device` is the PCI address of the controller, `0` for the
    /// on-board VL805.
    pub fn notify_xhci_reset(&self, device: u32) -> Result<(), MailboxError> {
        self.property(tag::NOTIFY_XHCI_RESET, &[device], 1)?;
        Ok(())
    }
}
