use std::fmt;
use std::io;

use syncprims_dlp::{DlpError, DlpErrorKind};
use syncprims_padp::PadpError;
use syncprims_session::{CmpError, SessionError};
use syncprims_slp::SlpError;
use syncprims_transport::TransportError;

// 124 and 130 follow the shell conventions for timeout and SIGINT.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DEVICE_ERROR: i32 = 20;
pub const PROTOCOL_ERROR: i32 = 40;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERRUPTED: i32 = 130;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn slp_error(context: &str, err: SlpError) -> CliError {
    match err {
        SlpError::Io(source) => io_error(context, source),
        SlpError::Transport(err) => transport_error(context, err),
        SlpError::Cancelled => CliError::new(INTERRUPTED, format!("{context}: {err}")),
        SlpError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        SlpError::BodyTooLarge { .. } | SlpError::Codec(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn padp_error(context: &str, err: PadpError) -> CliError {
    match err {
        PadpError::Slp(err) => slp_error(context, err),
        PadpError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PadpError::Protocol(_) | PadpError::Aborted => {
            CliError::new(PROTOCOL_ERROR, format!("{context}: {err}"))
        }
        PadpError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn cmp_error(context: &str, err: CmpError) -> CliError {
    match err {
        CmpError::Padp(err) => padp_error(context, err),
        CmpError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        CmpError::Codec(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(PROTOCOL_ERROR, format!("{context}: {other}")),
    }
}

pub fn dlp_error(context: &str, err: DlpError) -> CliError {
    match err {
        DlpError::Padp(err) => padp_error(context, err),
        DlpError::Transport(err) => transport_error(context, err),
        DlpError::Command {
            kind: DlpErrorKind::SyncCancelled,
            ..
        } => CliError::new(INTERRUPTED, format!("{context}: {err}")),
        DlpError::Command { .. } => CliError::new(DEVICE_ERROR, format!("{context}: {err}")),
        DlpError::Codec(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        DlpError::Protocol(_) => CliError::new(PROTOCOL_ERROR, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Slp(err) => slp_error(context, err),
        SessionError::Cmp(err) => cmp_error(context, err),
        SessionError::Dlp(err) => dlp_error(context, err),
    }
}
