use bytes::{Buf, BufMut, Bytes, BytesMut};
use syncprims_codec::{FieldDescriptor, Length, Record, Schema, WireRecord};
use tracing::trace;

use crate::crc::{crc16, crc16_update};
use crate::error::{Result, SlpError};

/// Header: signature (3) + dest (1) + src (1) + type (1) + size (2) + xid (1)
/// + header checksum (1) = 10 bytes.
pub const HEADER_SIZE: usize = 10;

/// Trailing CRC16.
pub const TRAILER_SIZE: usize = 2;

/// Packet signature.
pub const SIGNATURE: [u8; 3] = [0xBE, 0xEF, 0xED];

/// Largest body the 16-bit size field can describe.
pub const MAX_BODY: usize = u16::MAX as usize;

/// Header bytes covered by the header checksum.
const SUMMED_HEADER: usize = HEADER_SIZE - 1;

static HEADER_SCHEMA: Schema = Schema::new(
    "SlpHeader",
    &[
        FieldDescriptor::bytes("signature", Length::Fixed(3)),
        FieldDescriptor::u8("dest"),
        FieldDescriptor::u8("src"),
        FieldDescriptor::u8("type"),
        FieldDescriptor::u16("size"),
        FieldDescriptor::u8("xid"),
    ],
);

/// The checksummed part of the header, without its trailing sum byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    dest: u8,
    src: u8,
    packet_type: u8,
    size: u16,
    xid: u8,
}

impl WireRecord for Header {
    const SCHEMA: &'static Schema = &HEADER_SCHEMA;

    fn to_record(&self) -> syncprims_codec::Result<Record> {
        Ok(Record::new()
            .with("signature", Bytes::from_static(&SIGNATURE))
            .with("dest", self.dest)
            .with("src", self.src)
            .with("type", self.packet_type)
            .with("size", self.size)
            .with("xid", self.xid))
    }

    fn from_record(record: &Record) -> syncprims_codec::Result<Self> {
        Ok(Self {
            dest: record.u8("dest")?,
            src: record.u8("src")?,
            packet_type: record.u8("type")?,
            size: record.u16("size")?,
            xid: record.u8("xid")?,
        })
    }
}

/// One link-layer packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlpPacket {
    /// Destination socket.
    pub dest: u8,
    /// Source socket.
    pub src: u8,
    /// Raw packet type; see [`PacketType`](crate::PacketType).
    pub packet_type: u8,
    /// Transaction id.
    pub xid: u8,
    pub body: Bytes,
}

impl SlpPacket {
    pub fn new(dest: u8, src: u8, packet_type: u8, xid: u8, body: impl Into<Bytes>) -> Self {
        Self {
            dest,
            src,
            packet_type,
            xid,
            body: body.into(),
        }
    }

    /// Total bytes on the wire (header + body + CRC).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.len() + TRAILER_SIZE
    }

    /// The header checksum this packet carries on the wire.
    pub fn header_checksum(&self) -> Result<u8> {
        Ok(self.header_bytes()?[SUMMED_HEADER])
    }

    /// The CRC16 this packet carries on the wire.
    pub fn checksum(&self) -> Result<u16> {
        let header = self.header_bytes()?;
        Ok(crc16_update(crc16(&header), &self.body))
    }

    /// Header exactly as [`encode_packet`] writes it, sum byte included.
    fn header_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let size = u16::try_from(self.body.len()).map_err(|_| SlpError::BodyTooLarge {
            size: self.body.len(),
            max: MAX_BODY,
        })?;
        let mut header = [0u8; HEADER_SIZE];
        header[..3].copy_from_slice(&SIGNATURE);
        header[3] = self.dest;
        header[4] = self.src;
        header[5] = self.packet_type;
        header[6..8].copy_from_slice(&size.to_be_bytes());
        header[8] = self.xid;
        header[SUMMED_HEADER] = header_sum(&header[..SUMMED_HEADER]);
        Ok(header)
    }

    /// A packet with source and destination swapped, same type, xid and body.
    pub fn echo(&self) -> Self {
        Self {
            dest: self.src,
            src: self.dest,
            packet_type: self.packet_type,
            xid: self.xid,
            body: self.body.clone(),
        }
    }
}

/// Why a candidate packet was thrown away.
///
/// The decoder has already skipped one byte when this is returned, so
/// calling [`decode_packet`] again resumes the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumError {
    #[error("header checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    Header { expected: u8, actual: u8 },

    #[error("body CRC mismatch (expected {expected:#06x}, got {actual:#06x})")]
    Body { expected: u16, actual: u16 },

    #[error("declared body size {size} exceeds limit {max}")]
    Oversize { size: usize, max: usize },
}

/// Encode a packet into the wire format.
///
/// ```text
/// ┌──────────┬──────┬─────┬──────┬──────────┬─────┬─────┬────────┬──────────┐
/// │ BE EF ED │ dest │ src │ type │ size (BE)│ xid │ sum │ body   │ CRC (BE) │
/// │ 3B       │ 1B   │ 1B  │ 1B   │ 2B       │ 1B  │ 1B  │ size B │ 2B       │
/// └──────────┴──────┴─────┴──────┴──────────┴─────┴─────┴────────┴──────────┘
/// ```
pub fn encode_packet(packet: &SlpPacket, dst: &mut BytesMut) -> Result<()> {
    if packet.body.len() > MAX_BODY {
        return Err(SlpError::BodyTooLarge {
            size: packet.body.len(),
            max: MAX_BODY,
        });
    }
    let header = Header {
        dest: packet.dest,
        src: packet.src,
        packet_type: packet.packet_type,
        size: packet.body.len() as u16,
        xid: packet.xid,
    };

    dst.reserve(packet.wire_size());
    let start = dst.len();
    header.encode_into(dst)?;
    let sum = header_sum(&dst[start..]);
    dst.put_u8(sum);
    dst.put_slice(&packet.body);
    let crc = crc16(&dst[start..]);
    dst.put_u16(crc);
    Ok(())
}

/// Decode a packet from the front of `src`.
///
/// Bytes preceding a signature are skipped. Returns `Ok(None)` if no complete
/// packet is buffered yet; on success the packet bytes are consumed.
pub fn decode_packet(
    src: &mut BytesMut,
    max_body: usize,
) -> std::result::Result<Option<SlpPacket>, ChecksumError> {
    if !seek_signature(src) || src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let expected = src[SUMMED_HEADER];
    let actual = header_sum(&src[..SUMMED_HEADER]);
    if expected != actual {
        src.advance(1);
        return Err(ChecksumError::Header { expected, actual });
    }

    let header = match Header::decode(&src[..SUMMED_HEADER]) {
        Ok(header) => header,
        Err(err) => {
            trace!(%err, "undecodable header");
            src.advance(1);
            return Err(ChecksumError::Header { expected, actual });
        }
    };

    let size = usize::from(header.size);
    if size > max_body {
        src.advance(1);
        return Err(ChecksumError::Oversize {
            size,
            max: max_body,
        });
    }

    let total = HEADER_SIZE + size + TRAILER_SIZE;
    if src.len() < total {
        return Ok(None);
    }

    let crc_at = HEADER_SIZE + size;
    let expected = u16::from_be_bytes([src[crc_at], src[crc_at + 1]]);
    let actual = crc16_update(crc16(&src[..HEADER_SIZE]), &src[HEADER_SIZE..crc_at]);
    if expected != actual {
        src.advance(1);
        return Err(ChecksumError::Body { expected, actual });
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(size).freeze();
    src.advance(TRAILER_SIZE);

    Ok(Some(SlpPacket {
        dest: header.dest,
        src: header.src,
        packet_type: header.packet_type,
        xid: header.xid,
        body,
    }))
}

/// Drop everything before the first signature.
///
/// Returns `false` when no full signature is buffered; a trailing partial
/// signature is kept for the next read.
fn seek_signature(src: &mut BytesMut) -> bool {
    if let Some(pos) = src.windows(SIGNATURE.len()).position(|w| w == SIGNATURE) {
        if pos > 0 {
            trace!(skipped = pos, "skipping bytes before signature");
            src.advance(pos);
        }
        return true;
    }

    let keep = (1..SIGNATURE.len())
        .rev()
        .find(|&n| src.len() >= n && src[src.len() - n..] == SIGNATURE[..n])
        .unwrap_or(0);
    let skipped = src.len() - keep;
    if skipped > 0 {
        trace!(skipped, "no signature in buffer");
        src.advance(skipped);
    }
    false
}

fn header_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}
