use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_packet, SlpPacket};
use crate::error::{Result, SlpError};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Writes complete packets to any `Write` stream.
///
/// Each packet is encoded into one buffer and written out before `write_packet`
/// returns, so a writer behind a lock never interleaves two packets.
pub struct SlpWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> SlpWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode, write and flush one packet (blocking).
    pub fn write_packet(&mut self, packet: &SlpPacket) -> Result<()> {
        self.buf.clear();
        encode_packet(packet, &mut self.buf)?;

        let mut rest = &self.buf[..];
        while !rest.is_empty() {
            let written = retrying(|| self.inner.write(rest))?;
            if written == 0 {
                return Err(SlpError::ConnectionClosed);
            }
            rest = &rest[written..];
        }
        retrying(|| self.inner.flush())
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Run one stream call, repeating it while it is interrupted or would block.
fn retrying<R>(mut call: impl FnMut() -> std::io::Result<R>) -> Result<R> {
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
            Err(err) => return Err(SlpError::Io(err)),
        }
    }
}
