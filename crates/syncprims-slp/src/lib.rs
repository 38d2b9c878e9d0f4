//! Serial Link Protocol (SLP) framing.
//!
//! Every packet on the wire is:
//! - a 10-byte header: signature `BE EF ED`, destination socket, source
//!   socket, packet type, body size (u16 BE), transaction id, header checksum
//! - the body
//! - a CRC16 (poly 0x1021, zero seed) over header and body
//!
//! Corrupt packets are dropped and the decoder rescans from the next byte, so
//! one bad packet never desynchronizes the stream.

pub mod codec;
pub mod crc;
pub mod error;
pub mod framer;
pub mod reader;
pub mod socket;
pub mod writer;

pub use codec::{
    decode_packet, encode_packet, ChecksumError, SlpPacket, HEADER_SIZE, MAX_BODY, SIGNATURE,
    TRAILER_SIZE,
};
pub use crc::crc16;
pub use error::{Result, SlpError};
pub use framer::{FramerConfig, FramerStats, SlpFramer, SlpSocket};
pub use reader::SlpReader;
pub use socket::{
    socket_name, PacketType, FIRST_DYNAMIC_SOCKET, SOCKET_CONSOLE, SOCKET_DEBUGGER, SOCKET_DLP,
    SOCKET_REMOTE_UI,
};
pub use writer::SlpWriter;
