/// Errors that can occur while encoding or transferring messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload has more elements than the 16-bit count field can carry.
    #[error("payload too long ({len} elements, max {max})")]
    PayloadTooLong { len: usize, max: usize },

    /// An I/O error occurred while reading or writing a message.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was transferred.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, WireError>;
