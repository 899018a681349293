use thiserror::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum MailboxError {
    #[error("mailbox transmit FIFO stayed full")]
    TxTimeout,
    #[error("no property channel reply from the GPU")]
    RxTimeout,
    #[error("firmware rejected the request with code {0:#010x}")]
    ResponseError(u32),
    #[error("property buffer at {0:#x} is not 16-byte aligned")]
    Unaligned(u64),
    #[error("declared length of {0} bytes does not fit the property buffer")]
    BufferTooSmall(u32),
    #[error("firmware did not answer tag {0:#010x}")]
    TagNotAcknowledged(u32),
}
