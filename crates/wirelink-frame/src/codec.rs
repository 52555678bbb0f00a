use bytes::{BufMut, BytesMut};
use md5::{Digest, Md5};

use crate::error::{Result, WireError};
use crate::message::Message;

/// Fixed header: sequence (4) + timestamp (8) + element count (2) + digest (16) = 30 bytes.
pub const HEADER_SIZE: usize = 30;

/// Payload digest width (MD5).
pub const DIGEST_SIZE: usize = 16;

/// Decoded fixed header, fields in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sequence: u32,
    pub timestamp: u64,
    pub element_count: u16,
    pub checksum: [u8; DIGEST_SIZE],
}

/// Encode a message header into the wire format.
///
/// Wire format (network byte order, no padding):
/// ```text
/// offset 0  : sequence      u32 BE
/// offset 4  : timestamp     u64 BE
/// offset 12 : element_count u16 BE
/// offset 14 : checksum      16 bytes, opaque
/// ```
///
/// Each fixed-width field is converted explicitly; the digest travels as
/// opaque bytes and is never swapped.
pub fn encode_header(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    if msg.payload.len() > u16::MAX as usize {
        return Err(WireError::PayloadTooLong {
            len: msg.payload.len(),
            max: u16::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE);
    dst.put_u32(msg.sequence);
    dst.put_u64(msg.timestamp);
    dst.put_u16(msg.payload.len() as u16);
    dst.put_slice(&msg.checksum);
    Ok(())
}

/// Decode a fixed header from exactly [`HEADER_SIZE`] bytes.
pub fn decode_header(src: &[u8; HEADER_SIZE]) -> Header {
    let mut checksum = [0u8; DIGEST_SIZE];
    checksum.copy_from_slice(&src[14..30]);
    Header {
        sequence: u32::from_be_bytes(src[0..4].try_into().unwrap()),
        timestamp: u64::from_be_bytes(src[4..12].try_into().unwrap()),
        element_count: u16::from_be_bytes(src[12..14].try_into().unwrap()),
        checksum,
    }
}

/// Encode payload elements, each individually converted to network order.
pub fn encode_payload(payload: &[u16], dst: &mut BytesMut) {
    dst.reserve(payload.len() * 2);
    for &elem in payload {
        dst.put_u16(elem);
    }
}

/// Decode payload elements back to host order.
///
/// `src` must hold a whole number of elements; the reader sizes its buffer
/// from the header's element count so this always holds on the wire path.
pub fn decode_payload(src: &[u8]) -> Vec<u16> {
    debug_assert!(src.len() % 2 == 0);
    src.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Compute the 128-bit digest over payload values in host byte order.
///
/// Both ends hash the same logical values: the sender before network-order
/// conversion, the receiver after converting back.
pub fn compute_digest(payload: &[u16]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Md5::new();
    for &elem in payload {
        hasher.update(elem.to_ne_bytes());
    }
    hasher.finalize().into()
}

/// Recompute the digest and compare against the transmitted one.
pub fn verify(expected: &[u8; DIGEST_SIZE], payload: &[u16]) -> bool {
    compute_digest(payload) == *expected
}
