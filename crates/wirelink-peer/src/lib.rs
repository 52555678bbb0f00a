//! Connection lifecycle management for wirelink.
//!
//! - [`Client`]: outbound connection with an ordered send queue and a
//!   single worker thread driving resolve → connect → write.
//! - [`Server`]: accepts one active inbound session at a time; a new
//!   connection displaces the previous session.
//! - [`IntakeBuffer`]: bounded FIFO between the receiving session and a
//!   separate drain thread, with drop-on-full overflow accounting.

pub mod client;
pub mod error;
pub mod intake;
pub mod server;

pub use client::{Client, LinkState};
pub use error::{PeerError, Result};
pub use intake::{IntakeBuffer, IntakeStats, DEFAULT_INTAKE_CAPACITY};
pub use server::Server;
