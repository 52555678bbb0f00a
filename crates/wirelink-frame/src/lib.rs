//! Wire codec for wirelink messages.
//!
//! Every message is framed as a fixed 30-byte header followed by a
//! length-prefixed payload of 16-bit elements:
//! - header fields travel in network byte order, no padding
//! - the 128-bit payload digest travels as opaque bytes
//! - payload elements are each individually byte-order converted
//!
//! The digest is always computed over payload values in host byte order:
//! before network-order conversion on the sender, after conversion back on
//! the receiver. No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    compute_digest, decode_header, decode_payload, encode_header, encode_payload, verify, Header,
    DIGEST_SIZE, HEADER_SIZE,
};
pub use error::{Result, WireError};
pub use message::Message;
pub use reader::MessageReader;
pub use writer::MessageWriter;
