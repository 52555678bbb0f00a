/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] wirelink_transport::TransportError),

    /// Wire-level error.
    #[error("wire error: {0}")]
    Wire(#[from] wirelink_frame::WireError),

    /// The connection is not in the connected state; nothing was queued.
    #[error("not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, PeerError>;
