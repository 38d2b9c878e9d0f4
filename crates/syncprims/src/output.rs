use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Table with the house style and the given header.
pub fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Space-separated hex of at most `limit` bytes, with an ellipsis if cut.
pub fn hex_preview(data: &[u8], limit: usize) -> String {
    let mut text = data
        .iter()
        .take(limit)
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    if data.len() > limit {
        text.push_str(" ...");
    }
    text
}

/// Printable Latin-1 text, or a hex preview if the bytes are not text.
pub fn text_preview(data: &[u8]) -> String {
    let trimmed = data.strip_suffix(&[0]).unwrap_or(data);
    if trimmed.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        trimmed.iter().map(|&b| char::from(b)).collect()
    } else {
        format!("<{}>", hex_preview(trimmed, 16))
    }
}
