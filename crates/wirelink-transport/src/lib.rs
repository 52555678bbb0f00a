//! TCP transport layer for wirelink.
//!
//! Provides the connection primitives everything else builds on:
//! - [`resolve`] / [`connect_any`] for the client side
//! - [`TcpAcceptor`] for the server side
//!
//! This is the lowest layer of wirelink. Framing and message semantics
//! live in `wirelink-frame` and `wirelink-peer`.

pub mod error;
pub mod tcp;

pub use error::{Result, TransportError};
pub use tcp::{connect_any, resolve, TcpAcceptor, DEFAULT_PORT};
