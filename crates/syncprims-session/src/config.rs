use std::time::Duration;

use serde::{Deserialize, Serialize};
use syncprims_padp::{PadpConfig, MAX_FRAGMENT};
use syncprims_slp::{FramerConfig, MAX_BODY};

use crate::cmp::{CmpConfig, TimeoutHint};

/// Settings for every layer of one session.
///
/// Deserializable so a front end can load it from a file; every field is
/// optional and falls back to the per-layer default. Durations are given
/// in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Largest SLP body accepted from the device.
    pub max_body: usize,
    /// Answer loopback packets from the device.
    pub echo_loopback: bool,

    pub max_fragment: usize,
    pub ack_timeout_ms: u64,
    pub max_retries: u32,
    /// `None` waits forever for command responses.
    pub receive_timeout_ms: Option<u64>,

    pub host_major: u8,
    pub host_minor: u8,
    pub baud_rate: Option<u32>,
    pub timeout_hint: TimeoutHint,
    pub long_form: bool,
    pub wakeup_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let framer = FramerConfig::default();
        let padp = PadpConfig::default();
        let cmp = CmpConfig::default();
        Self {
            max_body: framer.max_body,
            echo_loopback: framer.echo_loopback,
            max_fragment: padp.max_fragment,
            ack_timeout_ms: millis(padp.ack_timeout),
            max_retries: padp.max_retries,
            receive_timeout_ms: padp.receive_timeout.map(millis),
            host_major: cmp.version.0,
            host_minor: cmp.version.1,
            baud_rate: cmp.baud_rate,
            timeout_hint: cmp.timeout_hint,
            long_form: cmp.long_form,
            wakeup_timeout_ms: millis(cmp.wakeup_timeout),
        }
    }
}

impl SessionConfig {
    pub fn framer(&self) -> FramerConfig {
        FramerConfig {
            max_body: self.max_body.min(MAX_BODY),
            echo_loopback: self.echo_loopback,
        }
    }

    pub fn padp(&self) -> PadpConfig {
        PadpConfig {
            max_fragment: self.max_fragment.clamp(1, MAX_FRAGMENT),
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            max_retries: self.max_retries,
            receive_timeout: self.receive_timeout_ms.map(Duration::from_millis),
            ..PadpConfig::default()
        }
    }

    pub fn cmp(&self) -> CmpConfig {
        CmpConfig {
            version: (self.host_major, self.host_minor),
            baud_rate: self.baud_rate,
            timeout_hint: self.timeout_hint,
            long_form: self.long_form,
            wakeup_timeout: Duration::from_millis(self.wakeup_timeout_ms),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
