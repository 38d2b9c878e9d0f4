//! Well-known SLP sockets and packet types.

/// Debugger socket.
pub const SOCKET_DEBUGGER: u8 = 0;
/// Console socket.
pub const SOCKET_CONSOLE: u8 = 1;
/// Remote UI socket.
pub const SOCKET_REMOTE_UI: u8 = 2;
/// Desktop Link (sync) socket.
pub const SOCKET_DLP: u8 = 3;
/// First socket id that carries no fixed meaning.
pub const FIRST_DYNAMIC_SOCKET: u8 = 4;

/// Human-readable name of a socket id.
pub fn socket_name(socket: u8) -> &'static str {
    match socket {
        SOCKET_DEBUGGER => "debugger",
        SOCKET_CONSOLE => "console",
        SOCKET_REMOTE_UI => "remote-ui",
        SOCKET_DLP => "dlp",
        _ => "dynamic",
    }
}

/// What an SLP body carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Debugger and console traffic.
    System = 0,
    /// Reserved by the device; never produced.
    Unused = 1,
    /// A PADP fragment.
    Padp = 2,
    /// Loopback test packet; echoed when the framer is configured to.
    Loopback = 3,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::System),
            1 => Some(Self::Unused),
            2 => Some(Self::Padp),
            3 => Some(Self::Loopback),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        value.as_u8()
    }
}
