//! Packet Assembly/Disassembly Protocol (PADP).
//!
//! Reliable, ordered delivery of one message at a time over an SLP socket
//! pair. Messages are split into fragments that share one transaction id;
//! each data fragment is acknowledged by the peer before the next one goes
//! out, and retransmitted on timeout.

pub mod channel;
pub mod error;
pub mod fragment;

pub use channel::{PadpChannel, PadpConfig};
pub use error::{PadpError, Result};
pub use fragment::{
    Fragment, FragmentHeader, FragmentType, FLAG_FIRST, FLAG_LAST, FLAG_LONG_FORM,
    FLAG_MEMORY_ERROR, MAX_FRAGMENT,
};
