/// Errors surfaced by the link layer.
///
/// Checksum failures are not here: corrupt packets are discarded inside the
/// decoder and only show up in [`FramerStats`](crate::FramerStats).
#[derive(Debug, thiserror::Error)]
pub enum SlpError {
    /// An I/O error occurred while reading or writing packets.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached EOF.
    #[error("connection closed")]
    ConnectionClosed,

    /// The link was closed locally while the operation was pending.
    #[error("link cancelled")]
    Cancelled,

    /// The body exceeds what one packet can carry.
    #[error("packet body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// Another subscriber already owns the socket.
    #[error("socket {0} already has a subscriber")]
    SocketInUse(u8),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] syncprims_transport::TransportError),

    /// Header encoding failed.
    #[error("header codec error: {0}")]
    Codec(#[from] syncprims_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, SlpError>;
