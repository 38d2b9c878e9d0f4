//! Connection setup for a handheld sync link.
//!
//! A [`Session`] owns one physical connection: it starts the SLP framer on
//! the byte stream, opens a PADP channel on the DLP socket, runs the CMP
//! handshake and then hands out a [`DlpConnection`](syncprims_dlp::DlpConnection)
//! for command traffic.

pub mod cmp;
pub mod config;
pub mod error;
pub mod session;

pub use cmp::{
    CmpConfig, CmpHandshake, CmpOutcome, CmpPacket, CmpState, CmpType, TimeoutHint,
    DEFAULT_BAUD_RATE, FLAG_CHANGE_BAUD, FLAG_LONG_FORM, FLAG_ONE_MINUTE_TIMEOUT,
    FLAG_TWO_MINUTE_TIMEOUT, FLAG_VERSION_MISMATCH,
};
pub use config::SessionConfig;
pub use error::{CmpError, Result, SessionError};
pub use session::Session;
