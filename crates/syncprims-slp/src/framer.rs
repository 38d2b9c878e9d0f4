use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use syncprims_transport::ByteStream;
use tracing::{debug, trace, warn};

use crate::codec::{SlpPacket, MAX_BODY};
use crate::error::{Result, SlpError};
use crate::reader::SlpReader;
use crate::socket::{socket_name, PacketType};
use crate::writer::SlpWriter;

const READER_THREAD_NAME: &str = "syncprims-slp-reader";

/// Link-layer configuration.
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Largest accepted body; longer declared sizes are treated as corruption.
    pub max_body: usize,
    /// Echo loopback packets back to their sender.
    pub echo_loopback: bool,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_body: MAX_BODY,
            echo_loopback: false,
        }
    }
}

/// Counters reported by [`SlpFramer::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Packets handed to a subscriber (or echoed).
    pub delivered: u64,
    /// Packets thrown away for checksum or size errors.
    pub discarded: u64,
    /// Valid packets nobody was subscribed to.
    pub dropped: u64,
}

/// How the read loop ended.
#[derive(Debug, Clone)]
enum LoopExit {
    Cancelled,
    Eof,
    Failed { kind: ErrorKind, message: String },
}

impl LoopExit {
    fn to_error(&self) -> SlpError {
        match self {
            LoopExit::Cancelled => SlpError::Cancelled,
            LoopExit::Eof => SlpError::ConnectionClosed,
            LoopExit::Failed { kind, message } => {
                SlpError::Io(io::Error::new(*kind, message.clone()))
            }
        }
    }
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<u8, Sender<SlpPacket>>,
    exit: Option<LoopExit>,
}

struct Shared {
    registry: Mutex<Registry>,
    writer: Mutex<SlpWriter<Box<dyn Write + Send>>>,
    cancelled: AtomicBool,
    echo_loopback: bool,
    delivered: AtomicU64,
    discarded: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    fn exit_error(&self) -> SlpError {
        if self.cancelled.load(Ordering::SeqCst) {
            return SlpError::Cancelled;
        }
        lock(&self.registry)
            .exit
            .as_ref()
            .map_or(SlpError::Cancelled, LoopExit::to_error)
    }
}

/// Owns one byte stream: a dedicated read loop plus a serialized writer.
///
/// Valid packets are routed to the [`SlpSocket`] subscribed to their
/// destination socket. Shared as `Arc<SlpFramer>`; dropping the last handle
/// closes the link.
pub struct SlpFramer {
    shared: Arc<Shared>,
    control: Mutex<Box<dyn ByteStream>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SlpFramer {
    /// Take ownership of `stream` and start the read loop.
    pub fn spawn<S: ByteStream>(stream: S, config: FramerConfig) -> Result<Arc<Self>> {
        let read_half: Box<dyn Read + Send> = Box::new(stream.try_clone()?);
        let control: Box<dyn ByteStream> = Box::new(stream.try_clone()?);
        let write_half: Box<dyn Write + Send> = Box::new(stream);

        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::default()),
            writer: Mutex::new(SlpWriter::new(write_half)),
            cancelled: AtomicBool::new(false),
            echo_loopback: config.echo_loopback,
            delivered: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });

        let reader = SlpReader::with_max_body(read_half, config.max_body);
        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || read_loop(reader, loop_shared))?;
        debug!(max_body = config.max_body, "slp read loop started");

        Ok(Arc::new(Self {
            shared,
            control: Mutex::new(control),
            reader: Mutex::new(Some(handle)),
        }))
    }

    /// Register for packets addressed to `socket`.
    pub fn subscribe(self: &Arc<Self>, socket: u8) -> Result<SlpSocket> {
        let (tx, rx) = mpsc::channel();
        {
            let mut registry = lock(&self.shared.registry);
            if let Some(exit) = &registry.exit {
                return Err(exit.to_error());
            }
            if registry.subscribers.contains_key(&socket) {
                return Err(SlpError::SocketInUse(socket));
            }
            registry.subscribers.insert(socket, tx);
        }
        debug!(socket, name = socket_name(socket), "subscribed");
        Ok(SlpSocket {
            framer: Arc::clone(self),
            local: socket,
            rx,
        })
    }

    /// Write one packet. Concurrent callers never interleave on the wire.
    pub fn send(&self, packet: &SlpPacket) -> Result<()> {
        if self.is_closed() {
            return Err(SlpError::Cancelled);
        }
        trace!(
            dest = packet.dest,
            src = packet.src,
            packet_type = packet.packet_type,
            xid = packet.xid,
            len = packet.body.len(),
            "slp send"
        );
        lock(&self.shared.writer).write_packet(packet)
    }

    /// Stop the read loop and release the stream.
    ///
    /// Idempotent. Pending receives fail with [`SlpError::Cancelled`].
    pub fn close(&self) {
        if !self.shared.cancelled.swap(true, Ordering::SeqCst) {
            debug!("closing slp link");
        }
        if let Err(err) = lock(&self.control).shutdown() {
            warn!(%err, "stream shutdown failed");
        }
        let handle = lock(&self.reader).take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("slp read loop panicked");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> FramerStats {
        FramerStats {
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for SlpFramer {
    fn drop(&mut self) {
        self.close();
    }
}

/// A subscription to one local SLP socket.
///
/// Receives every valid packet addressed to the socket, in arrival order.
/// Dropping it unregisters the socket.
pub struct SlpSocket {
    framer: Arc<SlpFramer>,
    local: u8,
    rx: Receiver<SlpPacket>,
}

impl SlpSocket {
    /// The socket id this subscription listens on.
    pub fn local(&self) -> u8 {
        self.local
    }

    pub fn framer(&self) -> &Arc<SlpFramer> {
        &self.framer
    }

    /// Wait for the next packet.
    ///
    /// `None` waits forever. Returns `Ok(None)` when the timeout elapses.
    pub fn recv(&self, timeout: Option<Duration>) -> Result<Option<SlpPacket>> {
        if self.framer.is_closed() {
            return Err(SlpError::Cancelled);
        }
        let received = match timeout {
            None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(timeout) => self.rx.recv_timeout(timeout),
        };
        match received {
            Ok(packet) => Ok(Some(packet)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.framer.shared.exit_error()),
        }
    }

    /// Send a packet from this socket to `dest`.
    pub fn send(&self, dest: u8, packet_type: PacketType, xid: u8, body: Bytes) -> Result<()> {
        self.framer.send(&SlpPacket {
            dest,
            src: self.local,
            packet_type: packet_type.as_u8(),
            xid,
            body,
        })
    }
}

impl Drop for SlpSocket {
    fn drop(&mut self) {
        lock(&self.framer.shared.registry)
            .subscribers
            .remove(&self.local);
        trace!(socket = self.local, "unsubscribed");
    }
}

fn read_loop(mut reader: SlpReader<Box<dyn Read + Send>>, shared: Arc<Shared>) {
    let exit = loop {
        if shared.cancelled.load(Ordering::SeqCst) {
            break LoopExit::Cancelled;
        }
        let result = reader.read_packet();
        shared
            .discarded
            .store(reader.discarded(), Ordering::Relaxed);
        match result {
            Ok(packet) => dispatch(&shared, packet),
            Err(SlpError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(_) if shared.cancelled.load(Ordering::SeqCst) => break LoopExit::Cancelled,
            Err(SlpError::ConnectionClosed) => break LoopExit::Eof,
            Err(SlpError::Io(err)) => {
                break LoopExit::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
            Err(err) => {
                break LoopExit::Failed {
                    kind: ErrorKind::Other,
                    message: err.to_string(),
                }
            }
        }
    };

    debug!(?exit, "slp read loop stopped");
    let mut registry = lock(&shared.registry);
    registry.exit = Some(exit);
    registry.subscribers.clear();
}

fn dispatch(shared: &Shared, packet: SlpPacket) {
    if shared.echo_loopback && packet.packet_type == PacketType::Loopback.as_u8() {
        match lock(&shared.writer).write_packet(&packet.echo()) {
            Ok(()) => {
                shared.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => warn!(%err, "loopback echo failed"),
        }
        return;
    }

    let registry = lock(&shared.registry);
    let Some(tx) = registry.subscribers.get(&packet.dest) else {
        debug!(
            dest = packet.dest,
            src = packet.src,
            xid = packet.xid,
            "no subscriber for packet, dropping"
        );
        shared.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    };
    let dest = packet.dest;
    if tx.send(packet).is_ok() {
        shared.delivered.fetch_add(1, Ordering::Relaxed);
    } else {
        debug!(dest, "subscriber gone, dropping");
        shared.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
