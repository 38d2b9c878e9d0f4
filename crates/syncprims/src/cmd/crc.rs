use serde::Serialize;
use syncprims_slp::crc16;

use crate::cmd::{parse_hex, CrcArgs};
use crate::exit::{io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{hex_preview, print_json, table, OutputFormat};

#[derive(Serialize)]
struct CrcOutput {
    length: usize,
    crc16: String,
    preview: String,
}

pub fn run(args: CrcArgs, format: OutputFormat) -> CliResult<i32> {
    let data = input_bytes(&args)?;
    let crc = crc16(&data);
    let out = CrcOutput {
        length: data.len(),
        crc16: format!("{crc:#06x}"),
        preview: hex_preview(&data, 16),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut result = table(vec!["LENGTH", "CRC16", "DATA"]);
            result.add_row(vec![out.length.to_string(), out.crc16, out.preview]);
            println!("{result}");
        }
        OutputFormat::Pretty => println!("crc16={} length={}", out.crc16, out.length),
        OutputFormat::Raw => println!("{crc:04X}"),
    }
    Ok(SUCCESS)
}

fn input_bytes(args: &CrcArgs) -> CliResult<Vec<u8>> {
    if let Some(text) = &args.data {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map_err(|err| io_error(&format!("cannot read {}", path.display()), err));
    }
    Err(CliError::new(USAGE, "one of --data, --hex or --file is required"))
}
