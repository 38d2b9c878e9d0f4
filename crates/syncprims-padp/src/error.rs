use syncprims_slp::SlpError;

/// Errors surfaced by the reliable-delivery layer.
#[derive(Debug, thiserror::Error)]
pub enum PadpError {
    /// The peer sent a malformed fragment or fragment sequence.
    #[error("PADP protocol error: {0}")]
    Protocol(String),

    /// No acknowledgement (or no data) arrived in time.
    #[error("timed out waiting for {waiting_for} after {attempts} attempt(s)")]
    Timeout {
        waiting_for: &'static str,
        attempts: u32,
    },

    /// The peer aborted the exchange.
    #[error("peer aborted the transfer")]
    Aborted,

    /// The message cannot be described by a fragment header.
    #[error("message too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Link-layer failure (closure, cancellation, I/O).
    #[error("link error: {0}")]
    Slp(#[from] SlpError),
}

impl PadpError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PadpError>;
