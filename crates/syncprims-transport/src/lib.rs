//! Transport contracts for handheld sync links.
//!
//! The protocol engine never opens a serial port or a USB endpoint itself. It
//! consumes one of two collaborator contracts defined here:
//! - [`ByteStream`]: a raw duplex byte stream (serial line, socket bridge)
//! - [`DirectTransport`]: an already-reliable request/response medium
//!
//! [`SyncStream`] adapts std sockets to [`ByteStream`] so the stack can be
//! driven against an emulator's serial-over-TCP bridge and in tests.

pub mod endpoint;
pub mod error;
pub mod traits;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use traits::{ByteStream, DirectTransport, SyncStream};
