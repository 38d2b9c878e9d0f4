use std::time::Duration;

use syncprims_codec::CodecError;
use syncprims_dlp::DlpError;
use syncprims_padp::PadpError;
use syncprims_slp::SlpError;
use syncprims_transport::TransportError;

/// Errors raised while negotiating a connection.
#[derive(Debug, thiserror::Error)]
pub enum CmpError {
    /// The device sent something other than the expected CMP packet.
    #[error("CMP protocol error: {0}")]
    Protocol(String),

    /// The device speaks a newer major protocol version than the host.
    #[error("device protocol {device_major}.{device_minor} is newer than host {host_major}.{host_minor}")]
    VersionMismatch {
        device_major: u8,
        device_minor: u8,
        host_major: u8,
        host_minor: u8,
    },

    /// No wake-up arrived in time.
    #[error("no wake-up from device after {0:?}")]
    Timeout(Duration),

    /// `run` was called on a handshake that already completed.
    #[error("handshake already negotiated")]
    AlreadyNegotiated,

    /// A CMP packet could not be encoded or decoded.
    #[error("CMP packet error: {0}")]
    Codec(#[from] CodecError),

    /// The reliable channel failed underneath the handshake.
    #[error("channel error: {0}")]
    Padp(#[from] PadpError),
}

impl CmpError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

/// Errors surfaced by [`Session`](crate::Session).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Could not reach or configure the byte stream.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The framer could not start or the DLP socket is taken.
    #[error("link error: {0}")]
    Slp(#[from] SlpError),

    /// Handshake failed; the connection has been torn down.
    #[error("handshake failed: {0}")]
    Cmp(#[from] CmpError),

    /// A command failed.
    #[error("command failed: {0}")]
    Dlp(#[from] DlpError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
