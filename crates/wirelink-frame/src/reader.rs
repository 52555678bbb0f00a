use std::io::{ErrorKind, Read};

use crate::codec::{decode_header, decode_payload, verify, Header, HEADER_SIZE};
use crate::error::{Result, WireError};
use crate::message::Message;

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always see whole headers and
/// whole bodies. The session state machine drives [`read_header`] and
/// [`read_body`] separately so the two phases stay observable.
///
/// [`read_header`]: MessageReader::read_header
/// [`read_body`]: MessageReader::read_body
pub struct MessageReader<T> {
    inner: T,
}

impl<T: Read> MessageReader<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Read and decode the next fixed header (blocking).
    ///
    /// Returns `Err(WireError::ConnectionClosed)` when EOF is reached.
    pub fn read_header(&mut self) -> Result<Header> {
        let mut buf = [0u8; HEADER_SIZE];
        self.read_full(&mut buf)?;
        Ok(decode_header(&buf))
    }

    /// Read the payload announced by `header`, convert it back to host
    /// order, and verify the digest.
    ///
    /// A digest mismatch is not an error: the message is returned with
    /// `valid = false`.
    pub fn read_body(&mut self, header: Header) -> Result<Message> {
        let mut buf = vec![0u8; header.element_count as usize * 2];
        self.read_full(&mut buf)?;

        let payload = decode_payload(&buf);
        let valid = verify(&header.checksum, &payload);

        Ok(Message {
            sequence: header.sequence,
            timestamp: header.timestamp,
            checksum: header.checksum,
            valid,
            payload,
        })
    }

    /// Read the next complete message (header then body).
    pub fn read_message(&mut self) -> Result<Message> {
        let header = self.read_header()?;
        self.read_body(header)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
        Ok(())
    }
}
