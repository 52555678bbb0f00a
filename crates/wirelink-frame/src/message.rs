use crate::codec::{compute_digest, DIGEST_SIZE};

/// The unit of transport.
///
/// Created by the producer, handed to the outbound queue, and released
/// once its write completes. On the consumer it is allocated when the
/// header arrives, populated on the body read, and passed to the delivery
/// callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Producer-assigned monotonically increasing index.
    pub sequence: u32,
    /// Seconds since epoch, set by the producer at send time.
    pub timestamp: u64,
    /// 128-bit digest over the payload in host byte order.
    pub checksum: [u8; DIGEST_SIZE],
    /// Set by the receive path after digest re-verification.
    /// Meaningless on the producer side.
    pub valid: bool,
    /// Payload elements, in host byte order.
    pub payload: Vec<u16>,
}

impl Message {
    /// Create a message with an unset checksum.
    pub fn new(sequence: u32, timestamp: u64, payload: Vec<u16>) -> Self {
        Self {
            sequence,
            timestamp,
            checksum: [0u8; DIGEST_SIZE],
            valid: false,
            payload,
        }
    }

    /// Number of payload elements.
    ///
    /// Panics in debug builds if the payload exceeds the wire limit; the
    /// encode path reports that case as an error instead.
    pub fn element_count(&self) -> u16 {
        debug_assert!(self.payload.len() <= u16::MAX as usize);
        self.payload.len() as u16
    }

    /// Compute and store the payload digest.
    pub fn seal(&mut self) {
        self.checksum = compute_digest(&self.payload);
    }
}
