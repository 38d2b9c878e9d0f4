use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// A raw duplex byte stream the link layer can own.
///
/// The link layer keeps one handle for its read loop and one for writes, so
/// implementations must support cloning a handle to the same underlying
/// stream. `shutdown` must unblock a read pending on any handle; that is how
/// the read loop is cancelled.
pub trait ByteStream: Read + Write + Send + 'static {
    /// Create an independent handle to the same stream.
    fn try_clone(&self) -> Result<Self>
    where
        Self: Sized;

    /// Unblock every pending read and write on all handles of this stream.
    ///
    /// Calling this more than once is not an error.
    fn shutdown(&self) -> Result<()>;
}

/// A medium that already guarantees reliable, addressed delivery.
///
/// Used by links (e.g. some USB control-transfer cradles) where the device
/// takes a whole request and returns a whole response, so SLP and PADP are
/// bypassed entirely.
pub trait DirectTransport: Send {
    /// Deliver one request and return the matching response.
    fn execute_transaction(&mut self, request: &[u8]) -> Result<Bytes>;
}

/// A connected socket usable as a sync link.
///
/// On Unix this may be a Unix domain socket; everywhere it may be a TCP
/// stream (emulators expose the device serial port this way).
pub struct SyncStream {
    inner: SyncStreamInner,
}

enum SyncStreamInner {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Read for SyncStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SyncStreamInner::Unix(stream) => stream.read(buf),
            SyncStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for SyncStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SyncStreamInner::Unix(stream) => stream.write(buf),
            SyncStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SyncStreamInner::Unix(stream) => stream.flush(),
            SyncStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl SyncStream {
    /// Wrap a connected Unix domain socket.
    #[cfg(unix)]
    pub fn from_unix(stream: UnixStream) -> Self {
        Self {
            inner: SyncStreamInner::Unix(stream),
        }
    }

    /// Wrap a connected TCP stream. Nagle is disabled; link packets are small
    /// and latency-bound.
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: SyncStreamInner::Tcp(stream),
        })
    }

    /// Create a connected pair of in-process streams.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SyncStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            SyncStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SyncStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            SyncStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            SyncStreamInner::Unix(_) => "unix-domain-socket",
            SyncStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl ByteStream for SyncStream {
    fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            SyncStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            SyncStreamInner::Tcp(stream) => Ok(Self {
                inner: SyncStreamInner::Tcp(stream.try_clone()?),
            }),
        }
    }

    fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            #[cfg(unix)]
            SyncStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
            SyncStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
        };
        ignore_not_connected(result)
    }
}

#[cfg(unix)]
impl ByteStream for UnixStream {
    fn try_clone(&self) -> Result<Self> {
        UnixStream::try_clone(self).map_err(Into::into)
    }

    fn shutdown(&self) -> Result<()> {
        ignore_not_connected(UnixStream::shutdown(self, Shutdown::Both))
    }
}

impl ByteStream for TcpStream {
    fn try_clone(&self) -> Result<Self> {
        TcpStream::try_clone(self).map_err(Into::into)
    }

    fn shutdown(&self) -> Result<()> {
        ignore_not_connected(TcpStream::shutdown(self, Shutdown::Both))
    }
}

// A stream the peer already closed reports NotConnected on shutdown.
fn ignore_not_connected(result: std::io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
        Err(err) => Err(err.into()),
    }
}

impl std::fmt::Debug for SyncStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStream")
            .field("type", &self.transport_name())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn pair_roundtrip() {
        let (mut left, mut right) = SyncStream::pair().unwrap();
        left.write_all(b"hello").unwrap();

        let mut buf = [0u8; 5];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(left.transport_name(), "unix-domain-socket");
    }

    #[test]
    fn shutdown_unblocks_pending_read() {
        let (left, _right) = SyncStream::pair().unwrap();
        let mut reader = ByteStream::try_clone(&left).unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            reader.read(&mut buf)
        });

        std::thread::sleep(Duration::from_millis(20));
        left.shutdown().unwrap();

        let read = handle.join().unwrap().unwrap();
        assert_eq!(read, 0, "shutdown should surface as EOF to the blocked reader");
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (left, right) = SyncStream::pair().unwrap();
        drop(right);
        left.shutdown().unwrap();
        left.shutdown().unwrap();
    }

    #[test]
    fn tcp_stream_roundtrip() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"tcp").unwrap();
        });

        let mut stream = SyncStream::from_tcp(TcpStream::connect(addr).unwrap()).unwrap();
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"tcp");
        assert_eq!(stream.transport_name(), "tcp");

        handle.join().unwrap();
    }
}
