use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use syncprims_slp::{PacketType, SlpPacket, SlpSocket};
use tracing::{debug, trace, warn};

use crate::error::{PadpError, Result};
use crate::fragment::{
    split, Fragment, FragmentHeader, FragmentType, FLAG_FIRST, FLAG_LAST, FLAG_MEMORY_ERROR,
    MAX_FRAGMENT,
};

/// Reliable-delivery configuration.
#[derive(Debug, Clone)]
pub struct PadpConfig {
    /// Largest data chunk per fragment.
    pub max_fragment: usize,
    /// How long to wait for each acknowledgement.
    pub ack_timeout: Duration,
    /// Retransmissions of one fragment before the send fails.
    pub max_retries: u32,
    /// How long `recv` waits for a message. `None` waits forever.
    pub receive_timeout: Option<Duration>,
    /// Acknowledge every received data fragment.
    pub acknowledge: bool,
}

impl Default for PadpConfig {
    fn default() -> Self {
        Self {
            max_fragment: 1024,
            ack_timeout: Duration::from_secs(2),
            max_retries: 10,
            receive_timeout: Some(Duration::from_secs(30)),
            acknowledge: true,
        }
    }
}

/// Message in the middle of reassembly.
struct Reassembly {
    xid: u8,
    total: usize,
    buf: BytesMut,
}

/// One PADP endpoint: a local SLP socket talking to one remote socket.
///
/// Half-duplex at the message level: a `send` completes (every fragment
/// acknowledged) before the caller moves on to `recv`.
pub struct PadpChannel {
    socket: SlpSocket,
    remote: u8,
    config: PadpConfig,
    next_xid: u8,
    last_received_xid: Option<u8>,
    /// Xid of the last delivered inbound message. A copy arriving later is
    /// re-acked and dropped, even across our own sends.
    completed: Option<u8>,
    /// Data fragments that arrived while a send was waiting for its ack.
    backlog: VecDeque<SlpPacket>,
}

impl PadpChannel {
    /// `config.max_fragment` is clamped to `1..=MAX_FRAGMENT`.
    pub fn new(socket: SlpSocket, remote: u8, mut config: PadpConfig) -> Self {
        let max_fragment = config.max_fragment.clamp(1, MAX_FRAGMENT);
        if max_fragment != config.max_fragment {
            warn!(
                requested = config.max_fragment,
                max_fragment, "fragment size out of range, clamped"
            );
            config.max_fragment = max_fragment;
        }
        debug!(
            local = socket.local(),
            remote,
            max_fragment = config.max_fragment,
            "padp channel opened"
        );
        Self {
            socket,
            remote,
            config,
            next_xid: 0,
            last_received_xid: None,
            completed: None,
            backlog: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &PadpConfig {
        &self.config
    }

    pub fn socket(&self) -> &SlpSocket {
        &self.socket
    }

    /// Transaction id of the last message received, if any.
    pub fn last_received_xid(&self) -> Option<u8> {
        self.last_received_xid
    }

    /// Send a new message under a fresh transaction id.
    pub fn send(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        let xid = self.fresh_xid();
        self.send_with_xid(payload.into(), xid)
    }

    /// Answer the last received message, reusing its transaction id.
    ///
    /// The peer must not answer a reply under the same id: that message would
    /// look like a retransmission of the one being answered and be dropped.
    pub fn reply(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        let xid = self
            .last_received_xid
            .ok_or_else(|| PadpError::protocol("reply without a received message"))?;
        self.send_with_xid(payload.into(), xid)
    }

    /// Wait for the next complete message using the configured timeout.
    pub fn recv(&mut self) -> Result<Bytes> {
        self.recv_timeout(self.config.receive_timeout)
    }

    /// Wait for the next complete message. `None` waits forever.
    pub fn recv_timeout(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut pending: Option<Reassembly> = None;

        loop {
            let Some(packet) = self.next_packet(deadline)? else {
                return Err(PadpError::Timeout {
                    waiting_for: "data",
                    attempts: 1,
                });
            };
            let Some(fragment) = self.parse_padp(&packet)? else {
                continue;
            };

            match fragment.header.kind {
                FragmentType::Tickle => trace!(xid = packet.xid, "tickle"),
                FragmentType::Ack => {
                    debug!(xid = packet.xid, "stale ack while receiving, ignoring");
                }
                FragmentType::Abort => return Err(PadpError::Aborted),
                FragmentType::Data => {
                    if let Some(message) = self.accept_data(&mut pending, packet.xid, fragment)? {
                        return Ok(message);
                    }
                }
            }
        }
    }

    fn accept_data(
        &mut self,
        pending: &mut Option<Reassembly>,
        xid: u8,
        fragment: Fragment,
    ) -> Result<Option<Bytes>> {
        let header = fragment.header;

        if pending.is_none() && self.completed == Some(xid) {
            debug!(xid, "retransmitted copy of delivered message, re-acking");
            return self.acknowledge(xid, &header).map(|()| None);
        }

        if header.is_first() {
            match pending {
                Some(current) if current.xid == xid => {
                    debug!(xid, "duplicate first fragment, re-acking");
                    return self.acknowledge(xid, &header).map(|()| None);
                }
                Some(current) => {
                    return Err(PadpError::protocol(format!(
                        "message {xid:#04x} started before message {:#04x} ended",
                        current.xid
                    )));
                }
                None => {
                    let total = header.size as usize;
                    *pending = Some(Reassembly {
                        xid,
                        total,
                        buf: BytesMut::with_capacity(total.min(64 * 1024)),
                    });
                }
            }
        } else {
            let Some(current) = pending.as_ref() else {
                return Err(PadpError::protocol(format!(
                    "continuation fragment {xid:#04x} without a first fragment"
                )));
            };
            if current.xid != xid {
                return Err(PadpError::protocol(format!(
                    "fragment id {xid:#04x} does not match message {:#04x}",
                    current.xid
                )));
            }
            let offset = header.size as usize;
            if offset < current.buf.len() {
                debug!(xid, offset, "duplicate fragment, re-acking");
                return self.acknowledge(xid, &header).map(|()| None);
            }
            if offset != current.buf.len() {
                return Err(PadpError::protocol(format!(
                    "fragment offset {offset} but {} bytes received",
                    current.buf.len()
                )));
            }
        }

        let Some(current) = pending.as_mut() else {
            return Err(PadpError::protocol("no message in progress"));
        };
        if current.buf.len() + fragment.data.len() > current.total {
            return Err(PadpError::protocol(format!(
                "message {xid:#04x} overruns its declared length {}",
                current.total
            )));
        }
        current.buf.extend_from_slice(&fragment.data);
        self.acknowledge(xid, &header)?;

        if !header.is_last() {
            return Ok(None);
        }
        if current.buf.len() != current.total {
            return Err(PadpError::protocol(format!(
                "last fragment after {} of {} bytes",
                current.buf.len(),
                current.total
            )));
        }

        let message = std::mem::take(&mut current.buf).freeze();
        *pending = None;
        self.completed = Some(xid);
        self.last_received_xid = Some(xid);
        debug!(xid, len = message.len(), "padp message received");
        Ok(Some(message))
    }

    fn send_with_xid(&mut self, payload: Bytes, xid: u8) -> Result<()> {
        let fragments = split(&payload, self.config.max_fragment)?;
        debug!(
            xid,
            len = payload.len(),
            fragments = fragments.len(),
            "padp send"
        );
        for fragment in &fragments {
            self.send_fragment(xid, fragment)?;
        }
        Ok(())
    }

    /// Transmit one fragment and wait for its ack, retransmitting on timeout.
    fn send_fragment(&mut self, xid: u8, fragment: &Fragment) -> Result<()> {
        let body = fragment.encode()?;
        let attempts = self.config.max_retries + 1;
        for attempt in 1..=attempts {
            if attempt > 1 {
                debug!(xid, attempt, offset = fragment.header.size, "retransmitting fragment");
            }
            self.socket
                .send(self.remote, PacketType::Padp, xid, body.clone())?;
            if self.wait_for_ack(xid, &fragment.header)? {
                return Ok(());
            }
        }
        warn!(xid, attempts, "no acknowledgement, giving up");
        Err(PadpError::Timeout {
            waiting_for: "ack",
            attempts,
        })
    }

    /// `Ok(false)` when the ack timeout elapses.
    fn wait_for_ack(&mut self, xid: u8, sent: &FragmentHeader) -> Result<bool> {
        let deadline = Instant::now() + self.config.ack_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let Some(packet) = self.socket.recv(Some(remaining))? else {
                return Ok(false);
            };
            let fragment = match self.parse_padp(&packet) {
                Ok(Some(fragment)) => fragment,
                Ok(None) => continue,
                Err(err) => {
                    debug!(%err, "ignoring malformed fragment while awaiting ack");
                    continue;
                }
            };

            match fragment.header.kind {
                FragmentType::Ack if packet.xid == xid => {
                    if fragment.header.flags & FLAG_MEMORY_ERROR != 0 {
                        return Err(PadpError::protocol("peer reported out of memory"));
                    }
                    if !acknowledges(&fragment.header, sent) {
                        debug!(
                            xid,
                            expected = sent.size,
                            got = fragment.header.size,
                            "ack for another fragment, ignoring"
                        );
                        continue;
                    }
                    trace!(xid, "ack received");
                    return Ok(true);
                }
                FragmentType::Ack => debug!(xid = packet.xid, expected = xid, "stale ack"),
                FragmentType::Tickle => trace!(xid = packet.xid, "tickle"),
                FragmentType::Abort => return Err(PadpError::Aborted),
                FragmentType::Data if self.completed == Some(packet.xid) => {
                    debug!(xid = packet.xid, "retransmitted copy of delivered message, re-acking");
                    self.acknowledge(packet.xid, &fragment.header)?;
                }
                FragmentType::Data => {
                    trace!(xid = packet.xid, "data while awaiting ack, queued");
                    self.backlog.push_back(packet);
                }
            }
        }
    }

    fn acknowledge(&self, xid: u8, header: &FragmentHeader) -> Result<()> {
        if !self.config.acknowledge {
            return Ok(());
        }
        let ack = Fragment {
            header: header.ack(),
            data: Bytes::new(),
        };
        self.socket
            .send(self.remote, PacketType::Padp, xid, ack.encode()?)?;
        Ok(())
    }

    fn next_packet(&mut self, deadline: Option<Instant>) -> Result<Option<SlpPacket>> {
        if let Some(packet) = self.backlog.pop_front() {
            return Ok(Some(packet));
        }
        let timeout = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
        if timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Ok(None);
        }
        Ok(self.socket.recv(timeout)?)
    }

    /// `Ok(None)` for packets that are not PADP.
    fn parse_padp(&self, packet: &SlpPacket) -> Result<Option<Fragment>> {
        if packet.packet_type != PacketType::Padp.as_u8() {
            trace!(
                packet_type = packet.packet_type,
                src = packet.src,
                "ignoring non-PADP packet"
            );
            return Ok(None);
        }
        Fragment::parse(&packet.body).map(Some)
    }

    /// Next transaction id; never 0x00, 0xFF or the id of the last received
    /// message, which the peer still treats as a possible retransmission.
    fn fresh_xid(&mut self) -> u8 {
        loop {
            self.next_xid = self.next_xid.wrapping_add(1);
            let xid = self.next_xid;
            if xid != 0x00 && xid != 0xFF && Some(xid) != self.last_received_xid {
                return xid;
            }
        }
    }
}

/// An ack confirms a fragment only when it echoes the fragment's size and
/// its first/last flags.
fn acknowledges(ack: &FragmentHeader, sent: &FragmentHeader) -> bool {
    const POSITION: u8 = FLAG_FIRST | FLAG_LAST;
    ack.size == sent.size && ack.flags & POSITION == sent.flags & POSITION
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::thread;

    use syncprims_slp::{FramerConfig, SlpFramer, SlpReader, SlpWriter, SOCKET_DLP};

    use super::*;

    /// The far end of the link, speaking raw SLP.
    struct Device {
        reader: SlpReader<UnixStream>,
        writer: SlpWriter<UnixStream>,
    }

    impl Device {
        fn new(stream: UnixStream) -> Self {
            let writer = SlpWriter::new(stream.try_clone().unwrap());
            Self {
                reader: SlpReader::new(stream),
                writer,
            }
        }

        fn read_fragment(&mut self) -> (u8, Fragment) {
            let packet = self.reader.read_packet().unwrap();
            assert_eq!(packet.packet_type, PacketType::Padp.as_u8());
            (packet.xid, Fragment::parse(&packet.body).unwrap())
        }

        fn write(&mut self, xid: u8, kind: FragmentType, flags: u8, size: u32, data: &[u8]) {
            let fragment = Fragment {
                header: FragmentHeader { kind, flags, size },
                data: Bytes::copy_from_slice(data),
            };
            let packet = SlpPacket::new(
                SOCKET_DLP,
                SOCKET_DLP,
                PacketType::Padp.as_u8(),
                xid,
                fragment.encode().unwrap(),
            );
            self.writer.write_packet(&packet).unwrap();
        }

        fn ack(&mut self, xid: u8, header: &FragmentHeader) {
            self.write(xid, FragmentType::Ack, header.flags, header.size, &[]);
        }
    }

    fn channel_pair(config: PadpConfig) -> (Arc<SlpFramer>, PadpChannel, Device) {
        let (host, device) = UnixStream::pair().unwrap();
        let framer = SlpFramer::spawn(host, FramerConfig::default()).unwrap();
        let socket = framer.subscribe(SOCKET_DLP).unwrap();
        (
            framer,
            PadpChannel::new(socket, SOCKET_DLP, config),
            Device::new(device),
        )
    }

    fn fast() -> PadpConfig {
        PadpConfig {
            ack_timeout: Duration::from_millis(100),
            max_retries: 2,
            receive_timeout: Some(Duration::from_secs(5)),
            ..PadpConfig::default()
        }
    }

    #[test]
    fn single_fragment_send_is_acknowledged() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        let peer = thread::spawn(move || {
            let (xid, fragment) = device.read_fragment();
            assert_eq!(fragment.header.flags, FLAG_FIRST | FLAG_LAST);
            assert_eq!(fragment.header.size, 5);
            assert_eq!(fragment.data.as_ref(), b"hello");
            device.ack(xid, &fragment.header);
            xid
        });
        channel.send(Bytes::from_static(b"hello")).unwrap();
        assert_eq!(peer.join().unwrap(), 1);
    }

    #[test]
    fn large_message_is_fragmented_under_one_xid() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        let payload: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();
        let expected = payload.clone();

        let peer = thread::spawn(move || {
            let mut received = Vec::new();
            let mut xids = Vec::new();
            let mut headers = Vec::new();
            loop {
                let (xid, fragment) = device.read_fragment();
                device.ack(xid, &fragment.header);
                received.extend_from_slice(&fragment.data);
                xids.push(xid);
                headers.push((fragment.header.flags, fragment.header.size));
                if fragment.header.is_last() {
                    break;
                }
            }
            (received, xids, headers)
        });

        channel.send(payload).unwrap();
        let (received, xids, headers) = peer.join().unwrap();
        assert_eq!(received, expected);
        assert!(xids.iter().all(|&xid| xid == xids[0]));
        assert_eq!(
            headers,
            vec![(FLAG_FIRST, 2500), (0, 1024), (FLAG_LAST, 2048)]
        );
    }

    #[test]
    fn unacknowledged_fragment_is_retransmitted_max_retries_times() {
        let config = PadpConfig {
            ack_timeout: Duration::from_millis(30),
            max_retries: 3,
            ..fast()
        };
        let (_framer, mut channel, device) = channel_pair(config);
        let stream = device.reader.into_inner();
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();

        let peer = thread::spawn(move || {
            let mut reader = SlpReader::new(stream);
            let mut copies = 0;
            while reader.read_packet().is_ok() {
                copies += 1;
            }
            copies
        });

        let err = channel.send(Bytes::from_static(b"lost")).unwrap_err();
        assert!(matches!(
            err,
            PadpError::Timeout {
                waiting_for: "ack",
                attempts: 4
            }
        ));
        assert_eq!(peer.join().unwrap(), 4);
    }

    #[test]
    fn repeated_ack_does_not_confirm_next_fragment() {
        let config = PadpConfig {
            max_fragment: 4,
            ack_timeout: Duration::from_millis(50),
            max_retries: 2,
            ..fast()
        };
        let (_framer, mut channel, mut device) = channel_pair(config);
        let peer = thread::spawn(move || {
            let (xid, first) = device.read_fragment();
            assert_eq!((first.header.flags, first.header.size), (FLAG_FIRST, 8));
            device.ack(xid, &first.header);
            device.ack(xid, &first.header);

            let stream = device.reader.into_inner();
            stream
                .set_read_timeout(Some(Duration::from_millis(500)))
                .unwrap();
            let mut reader = SlpReader::new(stream);
            let mut copies = Vec::new();
            while let Ok(packet) = reader.read_packet() {
                copies.push(Fragment::parse(&packet.body).unwrap().header);
            }
            copies
        });

        let err = channel.send(Bytes::from_static(b"abcdefgh")).unwrap_err();
        assert!(matches!(
            err,
            PadpError::Timeout {
                waiting_for: "ack",
                attempts: 3
            }
        ));
        let copies = peer.join().unwrap();
        assert_eq!(copies.len(), 3);
        assert!(copies
            .iter()
            .all(|header| (header.flags, header.size) == (FLAG_LAST, 4)));
    }

    #[test]
    fn ack_must_echo_fragment_position() {
        let sent = FragmentHeader {
            kind: FragmentType::Data,
            flags: FLAG_LAST,
            size: 4,
        };
        assert!(acknowledges(&sent.ack(), &sent));
        let other_position = FragmentHeader {
            flags: FLAG_FIRST,
            ..sent.ack()
        };
        assert!(!acknowledges(&other_position, &sent));
        let other_size = FragmentHeader {
            size: 8,
            ..sent.ack()
        };
        assert!(!acknowledges(&other_size, &sent));
    }

    #[test]
    fn lost_ack_triggers_retransmission_then_succeeds() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        let peer = thread::spawn(move || {
            let (_, first) = device.read_fragment();
            let (xid, second) = device.read_fragment();
            assert_eq!(first, second);
            device.ack(xid, &second.header);
        });
        channel.send(Bytes::from_static(b"again")).unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn receives_and_acks_fragmented_message() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        let peer = thread::spawn(move || {
            device.write(9, FragmentType::Data, FLAG_FIRST, 6, b"abc");
            let (xid, ack) = device.read_fragment();
            assert_eq!((xid, ack.header.kind), (9, FragmentType::Ack));
            assert_eq!((ack.header.flags, ack.header.size), (FLAG_FIRST, 6));

            device.write(9, FragmentType::Data, FLAG_LAST, 3, b"def");
            let (_, ack) = device.read_fragment();
            assert_eq!((ack.header.flags, ack.header.size), (FLAG_LAST, 3));
        });

        assert_eq!(channel.recv().unwrap().as_ref(), b"abcdef");
        assert_eq!(channel.last_received_xid(), Some(9));
        peer.join().unwrap();
    }

    #[test]
    fn premature_last_fragment_is_protocol_error() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        device.write(4, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 10, b"short");
        assert!(matches!(channel.recv(), Err(PadpError::Protocol(_))));
    }

    #[test]
    fn continuation_without_first_is_protocol_error() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        device.write(4, FragmentType::Data, FLAG_LAST, 100, b"orphan");
        assert!(matches!(channel.recv(), Err(PadpError::Protocol(_))));
    }

    #[test]
    fn mismatched_fragment_id_is_protocol_error() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        device.write(4, FragmentType::Data, FLAG_FIRST, 6, b"abc");
        device.write(5, FragmentType::Data, FLAG_LAST, 3, b"def");
        assert!(matches!(channel.recv(), Err(PadpError::Protocol(_))));
    }

    #[test]
    fn tickles_are_ignored_and_abort_fails() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        device.write(1, FragmentType::Tickle, 0, 0, &[]);
        device.write(2, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 2, b"ok");
        assert_eq!(channel.recv().unwrap().as_ref(), b"ok");

        device.write(3, FragmentType::Abort, 0, 0, &[]);
        assert!(matches!(channel.recv(), Err(PadpError::Aborted)));
    }

    #[test]
    fn retransmitted_message_is_not_redelivered() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        device.write(7, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 3, b"one");
        assert_eq!(channel.recv().unwrap().as_ref(), b"one");

        device.write(7, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 3, b"one");
        device.write(8, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 3, b"two");
        assert_eq!(channel.recv().unwrap().as_ref(), b"two");

        let acks: Vec<u8> = (0..3).map(|_| device.read_fragment().0).collect();
        assert_eq!(acks, vec![7, 7, 8]);
    }

    #[test]
    fn retransmitted_message_during_send_is_not_redelivered() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        device.write(7, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 3, b"one");
        assert_eq!(channel.recv().unwrap().as_ref(), b"one");

        let peer = thread::spawn(move || {
            let (ack_xid, _) = device.read_fragment();
            assert_eq!(ack_xid, 7);
            let (xid, request) = device.read_fragment();
            // Our ack for "one" was lost, so the device sends it again.
            device.write(7, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 3, b"one");
            device.ack(xid, &request.header);
            device.write(xid, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 4, b"resp");
            (device, xid)
        });

        channel.send(Bytes::from_static(b"req")).unwrap();
        let (mut device, xid) = peer.join().unwrap();
        assert_eq!(channel.recv().unwrap().as_ref(), b"resp");

        let acks: Vec<(u8, FragmentType)> = (0..2)
            .map(|_| {
                let (xid, fragment) = device.read_fragment();
                (xid, fragment.header.kind)
            })
            .collect();
        assert_eq!(acks, vec![(7, FragmentType::Ack), (xid, FragmentType::Ack)]);
    }

    #[test]
    fn reply_reuses_received_xid() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        assert!(matches!(
            channel.reply(Bytes::from_static(b"x")),
            Err(PadpError::Protocol(_))
        ));

        device.write(0xFF, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 4, b"wake");
        channel.recv().unwrap();
        let peer = thread::spawn(move || {
            let (ack_xid, _) = device.read_fragment();
            let (xid, fragment) = device.read_fragment();
            device.ack(xid, &fragment.header);
            (ack_xid, xid)
        });
        channel.reply(Bytes::from_static(b"init")).unwrap();
        assert_eq!(peer.join().unwrap(), (0xFF, 0xFF));
    }

    #[test]
    fn data_during_ack_wait_is_queued() {
        let (_framer, mut channel, mut device) = channel_pair(fast());
        let peer = thread::spawn(move || {
            let (xid, fragment) = device.read_fragment();
            device.write(0x40, FragmentType::Data, FLAG_FIRST | FLAG_LAST, 5, b"early");
            device.ack(xid, &fragment.header);
            device
        });
        channel.send(Bytes::from_static(b"request")).unwrap();
        let _device = peer.join().unwrap();
        assert_eq!(channel.recv().unwrap().as_ref(), b"early");
    }

    #[test]
    fn receive_timeout_reports_data() {
        let (_framer, mut channel, _device) = channel_pair(fast());
        assert!(matches!(
            channel.recv_timeout(Some(Duration::from_millis(20))),
            Err(PadpError::Timeout {
                waiting_for: "data",
                ..
            })
        ));
    }

    #[test]
    fn close_while_receiving_is_cancelled() {
        let (framer, mut channel, _device) = channel_pair(fast());
        let waiter = thread::spawn(move || channel.recv_timeout(None));
        thread::sleep(Duration::from_millis(50));
        framer.close();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(PadpError::Slp(syncprims_slp::SlpError::Cancelled))
        ));
    }

    #[test]
    fn oversized_fragment_setting_is_clamped() {
        let (_framer, channel, _device) = channel_pair(PadpConfig {
            max_fragment: usize::MAX,
            ..fast()
        });
        assert_eq!(channel.config().max_fragment, MAX_FRAGMENT);
    }

    #[test]
    fn fresh_xids_skip_reserved_values() {
        let (_framer, mut channel, _device) = channel_pair(fast());
        let xids: Vec<u8> = (0..600).map(|_| channel.fresh_xid()).collect();
        assert!(xids.iter().all(|&xid| xid != 0x00 && xid != 0xFF));
        assert_eq!(xids[0], 1);
        assert_eq!(xids[253], 0xFE);
        assert_eq!(xids[254], 1);
    }

    #[test]
    fn fresh_xid_skips_last_received() {
        let (_framer, mut channel, _device) = channel_pair(fast());
        channel.last_received_xid = Some(1);
        assert_eq!(channel.fresh_xid(), 2);
        channel.last_received_xid = Some(3);
        assert_eq!(channel.fresh_xid(), 4);
    }
}
