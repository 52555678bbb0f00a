use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_header, encode_payload};
use crate::error::{Result, WireError};
use crate::message::Message;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Writes complete messages to any `Write` stream.
///
/// Framing is two-phase and sequential: the header write fully completes
/// before the payload write begins, and the next message's header only
/// follows the previous payload.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> MessageWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Write one fully framed message (blocking): header, then payload,
    /// then flush.
    pub fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.buf.clear();
        encode_header(msg, &mut self.buf)?;
        self.write_buf()?;

        self.buf.clear();
        encode_payload(&msg.payload, &mut self.buf);
        self.write_buf()?;

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
        Ok(())
    }
}
