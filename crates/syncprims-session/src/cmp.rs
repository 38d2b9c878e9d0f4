//! Connection Management Protocol: the one-shot wake-up / init exchange
//! that opens every sync connection.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use syncprims_codec::{FieldDescriptor as F, Record, Schema, WireRecord};
use syncprims_padp::{PadpChannel, PadpError};
use tracing::{debug, info, warn};

use crate::error::CmpError;

/// Baud rate every serial link starts at.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Init: host asks to switch to the rate in the packet.
pub const FLAG_CHANGE_BAUD: u8 = 0x80;
/// Init: device should wait one minute before timing out.
pub const FLAG_ONE_MINUTE_TIMEOUT: u8 = 0x40;
/// Init: device should wait two minutes before timing out.
pub const FLAG_TWO_MINUTE_TIMEOUT: u8 = 0x20;
/// Wake-up/Init: peer understands long-form PADP headers.
pub const FLAG_LONG_FORM: u8 = 0x10;
/// Abort: the host cannot speak the device's protocol version.
pub const FLAG_VERSION_MISMATCH: u8 = 0x80;

static CMP_PACKET: Schema = Schema::new(
    "CmpPacket",
    &[
        F::u8("type"),
        F::u8("flags"),
        F::u8("major"),
        F::u8("minor"),
        F::u16("reserved"),
        F::u32("baudRate"),
    ],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CmpType {
    WakeUp = 1,
    Init = 2,
    Abort = 3,
}

impl CmpType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::WakeUp),
            2 => Some(Self::Init),
            3 => Some(Self::Abort),
            _ => None,
        }
    }
}

/// The 10-byte CMP packet. Wake-up, Init and Abort share this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmpPacket {
    pub kind: u8,
    pub flags: u8,
    pub major: u8,
    pub minor: u8,
    /// Requested rate in an Init, maximum rate in a wake-up, 0 for "unchanged".
    pub baud_rate: u32,
}

impl CmpPacket {
    pub fn packet_type(&self) -> Option<CmpType> {
        CmpType::from_u8(self.kind)
    }
}

impl WireRecord for CmpPacket {
    const SCHEMA: &'static Schema = &CMP_PACKET;

    fn to_record(&self) -> syncprims_codec::Result<Record> {
        Ok(Record::new()
            .with("type", self.kind)
            .with("flags", self.flags)
            .with("major", self.major)
            .with("minor", self.minor)
            .with("reserved", 0u16)
            .with("baudRate", self.baud_rate))
    }

    fn from_record(record: &Record) -> syncprims_codec::Result<Self> {
        Ok(Self {
            kind: record.u8("type")?,
            flags: record.u8("flags")?,
            major: record.u8("major")?,
            minor: record.u8("minor")?,
            baud_rate: record.u32("baudRate")?,
        })
    }
}

/// How long the device should wait on the host before giving up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutHint {
    #[default]
    None,
    OneMinute,
    TwoMinutes,
}

impl TimeoutHint {
    fn flags(self) -> u8 {
        match self {
            Self::None => 0,
            Self::OneMinute => FLAG_ONE_MINUTE_TIMEOUT,
            Self::TwoMinutes => FLAG_TWO_MINUTE_TIMEOUT,
        }
    }
}

/// Host side of the negotiation.
#[derive(Debug, Clone)]
pub struct CmpConfig {
    /// Host protocol version as (major, minor).
    pub version: (u8, u8),
    /// Rate to switch to after the handshake. `None` keeps the link rate.
    pub baud_rate: Option<u32>,
    pub timeout_hint: TimeoutHint,
    /// Offer long-form PADP headers when the device supports them.
    pub long_form: bool,
    /// How long to wait for the device's wake-up.
    pub wakeup_timeout: Duration,
}

impl Default for CmpConfig {
    fn default() -> Self {
        Self {
            version: (1, 1),
            baud_rate: None,
            timeout_hint: TimeoutHint::None,
            long_form: false,
            wakeup_timeout: Duration::from_secs(60),
        }
    }
}

/// What the two sides agreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmpOutcome {
    pub device_version: (u8, u8),
    pub device_max_baud: u32,
    /// Rate the host asked for, if it asked for a change.
    pub negotiated_baud: Option<u32>,
    pub long_form: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpState {
    Idle,
    AwaitingWakeUp,
    Negotiated(CmpOutcome),
    Failed,
}

impl fmt::Display for CmpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingWakeUp => "awaiting-wakeup",
            Self::Negotiated(_) => "negotiated",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One connection's handshake. Runs at most once.
#[derive(Debug)]
pub struct CmpHandshake {
    config: CmpConfig,
    state: CmpState,
}

impl CmpHandshake {
    pub fn new(config: CmpConfig) -> Self {
        Self {
            config,
            state: CmpState::Idle,
        }
    }

    pub fn state(&self) -> CmpState {
        self.state
    }

    /// Wait for the device's wake-up and answer it with an Init.
    ///
    /// A failure leaves the handshake in [`CmpState::Failed`]; the caller is
    /// expected to drop the connection.
    pub fn run(&mut self, channel: &mut PadpChannel) -> Result<CmpOutcome, CmpError> {
        match self.state {
            CmpState::Idle => {}
            CmpState::Negotiated(_) => return Err(CmpError::AlreadyNegotiated),
            CmpState::AwaitingWakeUp | CmpState::Failed => {
                return Err(CmpError::protocol(format!(
                    "handshake cannot restart from state {}",
                    self.state
                )));
            }
        }

        self.state = CmpState::AwaitingWakeUp;
        debug!(timeout = ?self.config.wakeup_timeout, "waiting for CMP wake-up");
        match self.negotiate(channel) {
            Ok(outcome) => {
                self.state = CmpState::Negotiated(outcome);
                Ok(outcome)
            }
            Err(err) => {
                self.state = CmpState::Failed;
                Err(err)
            }
        }
    }

    fn negotiate(&self, channel: &mut PadpChannel) -> Result<CmpOutcome, CmpError> {
        let payload = channel
            .recv_timeout(Some(self.config.wakeup_timeout))
            .map_err(|err| match err {
                PadpError::Timeout { .. } => CmpError::Timeout(self.config.wakeup_timeout),
                other => CmpError::Padp(other),
            })?;
        let wakeup = CmpPacket::decode(&payload)?;
        if wakeup.packet_type() != Some(CmpType::WakeUp) {
            return Err(CmpError::protocol(format!(
                "expected wake-up, got packet type {}",
                wakeup.kind
            )));
        }
        debug!(
            major = wakeup.major,
            minor = wakeup.minor,
            max_baud = wakeup.baud_rate,
            flags = wakeup.flags,
            "CMP wake-up"
        );

        let (host_major, host_minor) = self.config.version;
        if wakeup.major > host_major {
            warn!(
                device_major = wakeup.major,
                host_major, "device protocol too new, aborting"
            );
            let abort = CmpPacket {
                kind: CmpType::Abort as u8,
                flags: FLAG_VERSION_MISMATCH,
                major: host_major,
                minor: host_minor,
                baud_rate: 0,
            };
            if let Err(err) = channel.reply(abort.encode()?) {
                debug!(%err, "abort was not acknowledged");
            }
            return Err(CmpError::VersionMismatch {
                device_major: wakeup.major,
                device_minor: wakeup.minor,
                host_major,
                host_minor,
            });
        }

        let negotiated_baud = self
            .config
            .baud_rate
            .map(|requested| requested.min(wakeup.baud_rate))
            .filter(|&rate| rate != 0 && rate != DEFAULT_BAUD_RATE);
        let long_form = self.config.long_form && wakeup.flags & FLAG_LONG_FORM != 0;

        let mut flags = self.config.timeout_hint.flags();
        if negotiated_baud.is_some() {
            flags |= FLAG_CHANGE_BAUD;
        }
        if long_form {
            flags |= FLAG_LONG_FORM;
        }
        let init = CmpPacket {
            kind: CmpType::Init as u8,
            flags,
            major: host_major,
            minor: host_minor,
            baud_rate: negotiated_baud.unwrap_or(0),
        };
        channel.reply(init.encode()?)?;

        let outcome = CmpOutcome {
            device_version: (wakeup.major, wakeup.minor),
            device_max_baud: wakeup.baud_rate,
            negotiated_baud,
            long_form,
        };
        info!(
            device_version = %format_args!("{}.{}", wakeup.major, wakeup.minor),
            baud = ?negotiated_baud,
            "connection negotiated"
        );
        Ok(outcome)
    }
}
