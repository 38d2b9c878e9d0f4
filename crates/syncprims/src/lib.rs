//! Host-side protocol stack for syncing with Palm OS handhelds.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream and direct-transport contracts, socket adapter
//! - [`codec`]: declarative big-endian structure layouts
//! - [`slp`]: packet framing with checksums and socket routing
//! - [`padp`]: reliable, fragmented message delivery
//! - [`dlp`]: command transactions and the standard command catalogue
//! - [`session`]: CMP handshake and connection wiring (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use syncprims_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use syncprims_codec::*;
}

/// Re-export SLP types.
pub mod slp {
    pub use syncprims_slp::*;
}

/// Re-export PADP types.
pub mod padp {
    pub use syncprims_padp::*;
}

/// Re-export DLP types.
pub mod dlp {
    pub use syncprims_dlp::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use syncprims_session::*;
}
