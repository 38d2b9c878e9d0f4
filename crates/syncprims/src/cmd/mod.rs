use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod crc;
pub mod decode;
pub mod info;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for a device, negotiate, and read its system and user info.
    Info(InfoArgs),
    /// List the SLP packets in a captured byte stream.
    Decode(DecodeArgs),
    /// Compute the SLP CRC-16 of some bytes.
    Crc(CrcArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Crc(args) => crc::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Device link: tcp://host:port or unix:/path.
    pub endpoint: String,
    /// JSON session configuration file.
    #[arg(long, value_name = "FILE", env = "SYNCPRIMS_CONFIG")]
    pub config: Option<PathBuf>,
    /// Ask the device to switch to this baud rate.
    #[arg(long)]
    pub baud: Option<u32>,
    /// How long to wait for the device to wake up (e.g. 60s, 500ms).
    #[arg(long)]
    pub wakeup_timeout: Option<String>,
    /// Also read the user info block.
    #[arg(long)]
    pub user: bool,
    /// Also read memory card information.
    #[arg(long)]
    pub storage: bool,
    /// Write this line to the device's sync log before hanging up.
    #[arg(long, value_name = "TEXT")]
    pub log: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Input is a hex dump rather than raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Largest body to accept; bigger declared sizes count as corruption.
    #[arg(long, default_value_t = syncprims_slp::MAX_BODY)]
    pub max_body: usize,
}

#[derive(Args, Debug)]
pub struct CrcArgs {
    /// Text to checksum.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex bytes to checksum (whitespace ignored).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Checksum a file's contents.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `250ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Decode a hex string, ignoring whitespace and an optional `0x` prefix per token.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split_whitespace()
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, "hex input contains non-hex characters"));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = &digits[i..i + 2];
            u8::from_str_radix(pair, 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte '{pair}'")))
        })
        .collect()
}
