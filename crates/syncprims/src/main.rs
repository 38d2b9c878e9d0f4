mod cmd;
mod exit;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;

use crate::cmd::Command;
use crate::exit::FAILURE;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "syncprims",
    version,
    propagate_version = true,
    about = "Diagnostics for the handheld sync protocol stack"
)]
struct Cli {
    /// How results are printed; defaults to a table on a terminal, JSON otherwise.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log record format on stderr.
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Most verbose level logged to stderr.
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        global = true,
        env = "SYNCPRIMS_LOG"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let code = cmd::run(cli.command, format).unwrap_or_else(|err| {
        eprintln!("syncprims: {err}");
        err.code
    });
    ExitCode::from(u8::try_from(code).unwrap_or(FAILURE as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_info_subcommand() {
        let cli = Cli::try_parse_from([
            "syncprims",
            "info",
            "tcp://127.0.0.1:14238",
            "--baud",
            "57600",
            "--user",
        ])
        .expect("info args should parse");
        assert!(matches!(
            cli.command,
            Command::Info(ref args) if args.user && args.baud == Some(57600)
        ));
    }

    #[test]
    fn rejects_conflicting_crc_inputs() {
        let err = Cli::try_parse_from(["syncprims", "crc", "--data", "x", "--hex", "78"])
            .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["syncprims", "decode", "capture.bin", "--format", "json"])
            .expect("decode args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Decode(_)));
    }
}
