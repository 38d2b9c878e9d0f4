use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{decode_packet, SlpPacket, MAX_BODY};
use crate::error::{Result, SlpError};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete, checksum-verified packets from any `Read` stream.
///
/// Corrupt packets are skipped and counted; callers only ever see valid
/// packets.
pub struct SlpReader<T> {
    inner: T,
    buf: BytesMut,
    max_body: usize,
    discarded: u64,
}

impl<T: Read> SlpReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_body(inner, MAX_BODY)
    }

    /// Reader that treats any declared body above `max_body` as corruption.
    pub fn with_max_body(inner: T, max_body: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_body: max_body.min(MAX_BODY),
            discarded: 0,
        }
    }

    /// Read the next valid packet (blocking).
    ///
    /// Returns `Err(SlpError::ConnectionClosed)` at EOF. `WouldBlock` and
    /// `TimedOut` are returned as [`SlpError::Io`] with buffered bytes kept,
    /// so the call can simply be repeated.
    pub fn read_packet(&mut self) -> Result<SlpPacket> {
        loop {
            match decode_packet(&mut self.buf, self.max_body) {
                Ok(Some(packet)) => return Ok(packet),
                Ok(None) => {}
                Err(reason) => {
                    self.discarded += 1;
                    debug!(%reason, discarded = self.discarded, "discarding corrupt packet");
                    continue;
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(SlpError::Io(err)),
            };

            if read == 0 {
                return Err(SlpError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Packets dropped so far for checksum or size errors.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
