use std::net::SocketAddr;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to resolve the peer address.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    /// Address resolution produced no usable addresses.
    #[error("no addresses found for {host}")]
    NoAddresses { host: String },

    /// Failed to connect to the resolved address(es).
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to bind the listening socket.
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
