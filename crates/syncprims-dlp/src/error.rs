use std::fmt;

/// Status codes the device reports in byte 1 of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DlpErrorKind {
    None,
    System,
    IllegalRequest,
    Memory,
    Parameter,
    NotFound,
    NoneOpen,
    DatabaseOpen,
    TooManyOpen,
    AlreadyExists,
    CantOpen,
    RecordDeleted,
    RecordBusy,
    NotSupported,
    Unused,
    ReadOnly,
    NotEnoughSpace,
    LimitExceeded,
    SyncCancelled,
    BadWrapper,
    ArgumentMissing,
    ArgumentSize,
    /// A code this library does not know.
    Unknown(u8),
}

impl DlpErrorKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::System,
            2 => Self::IllegalRequest,
            3 => Self::Memory,
            4 => Self::Parameter,
            5 => Self::NotFound,
            6 => Self::NoneOpen,
            7 => Self::DatabaseOpen,
            8 => Self::TooManyOpen,
            9 => Self::AlreadyExists,
            10 => Self::CantOpen,
            11 => Self::RecordDeleted,
            12 => Self::RecordBusy,
            13 => Self::NotSupported,
            14 => Self::Unused,
            15 => Self::ReadOnly,
            16 => Self::NotEnoughSpace,
            17 => Self::LimitExceeded,
            18 => Self::SyncCancelled,
            19 => Self::BadWrapper,
            20 => Self::ArgumentMissing,
            21 => Self::ArgumentSize,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::System => 1,
            Self::IllegalRequest => 2,
            Self::Memory => 3,
            Self::Parameter => 4,
            Self::NotFound => 5,
            Self::NoneOpen => 6,
            Self::DatabaseOpen => 7,
            Self::TooManyOpen => 8,
            Self::AlreadyExists => 9,
            Self::CantOpen => 10,
            Self::RecordDeleted => 11,
            Self::RecordBusy => 12,
            Self::NotSupported => 13,
            Self::Unused => 14,
            Self::ReadOnly => 15,
            Self::NotEnoughSpace => 16,
            Self::LimitExceeded => 17,
            Self::SyncCancelled => 18,
            Self::BadWrapper => 19,
            Self::ArgumentMissing => 20,
            Self::ArgumentSize => 21,
            Self::Unknown(code) => code,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::None => "no error",
            Self::System => "general system error",
            Self::IllegalRequest => "unknown request",
            Self::Memory => "out of memory",
            Self::Parameter => "invalid parameter",
            Self::NotFound => "not found",
            Self::NoneOpen => "no databases open",
            Self::DatabaseOpen => "database already open",
            Self::TooManyOpen => "too many open databases",
            Self::AlreadyExists => "already exists",
            Self::CantOpen => "cannot open database",
            Self::RecordDeleted => "record deleted",
            Self::RecordBusy => "record busy",
            Self::NotSupported => "operation not supported",
            Self::Unused => "unused error code",
            Self::ReadOnly => "read-only database",
            Self::NotEnoughSpace => "not enough space",
            Self::LimitExceeded => "size limit exceeded",
            Self::SyncCancelled => "sync cancelled",
            Self::BadWrapper => "bad argument wrapper",
            Self::ArgumentMissing => "required argument missing",
            Self::ArgumentSize => "invalid argument size",
            Self::Unknown(_) => "unknown error",
        }
    }
}

impl fmt::Display for DlpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.describe(), self.code())
    }
}

/// Errors surfaced by the transaction engine.
#[derive(Debug, thiserror::Error)]
pub enum DlpError {
    /// The response does not match the request.
    #[error("DLP protocol error: {0}")]
    Protocol(String),

    /// The device rejected the command.
    #[error("{command} failed: {kind}")]
    Command {
        command: &'static str,
        kind: DlpErrorKind,
    },

    /// A declared request argument has no value in the map.
    #[error("{command}: missing argument '{arg}'")]
    MissingArgument {
        command: &'static str,
        arg: &'static str,
    },

    /// A response argument was read that the map does not hold.
    #[error("argument '{0}' not present")]
    NoSuchArgument(&'static str),

    /// Argument encoding or decoding failed.
    #[error("argument codec error: {0}")]
    Codec(#[from] syncprims_codec::CodecError),

    /// PADP delivery failed.
    #[cfg(feature = "padp")]
    #[error("PADP error: {0}")]
    Padp(#[from] syncprims_padp::PadpError),

    /// Direct transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] syncprims_transport::TransportError),
}

impl DlpError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DlpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for code in 0..=25u8 {
            assert_eq!(DlpErrorKind::from_code(code).code(), code);
        }
        assert_eq!(DlpErrorKind::from_code(5), DlpErrorKind::NotFound);
        assert_eq!(DlpErrorKind::from_code(22), DlpErrorKind::Unknown(22));
    }

    #[test]
    fn command_error_message_names_kind() {
        let err = DlpError::Command {
            command: "ReadUserInfo",
            kind: DlpErrorKind::NotFound,
        };
        assert_eq!(err.to_string(), "ReadUserInfo failed: not found (5)");
    }
}
