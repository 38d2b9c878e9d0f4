use std::io::Read;

use bytes::BytesMut;
use serde::Serialize;
use syncprims_dlp::commands;
use syncprims_padp::{Fragment, FragmentType};
use syncprims_slp::{decode_packet, socket_name, PacketType, SlpPacket};
use tracing::debug;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{hex_preview, print_json, print_raw, table, OutputFormat};

#[derive(Serialize)]
struct PacketOutput {
    offset: usize,
    dest: u8,
    dest_name: &'static str,
    src: u8,
    src_name: &'static str,
    packet_type: String,
    xid: u8,
    size: usize,
    detail: String,
}

#[derive(Serialize)]
struct DecodeOutput {
    packets: Vec<PacketOutput>,
    discarded: u64,
    trailing_bytes: usize,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = read_input(&args)?;
    let out = scan(&raw, args.max_body);
    debug!(
        packets = out.packets.len(),
        discarded = out.discarded,
        "capture decoded"
    );
    print_decode(&out, format);
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    let mut raw = Vec::new();
    match args.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            raw = std::fs::read(path)
                .map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
        }
        _ => {
            std::io::stdin()
                .read_to_end(&mut raw)
                .map_err(|err| io_error("cannot read stdin", err))?;
        }
    }
    if !args.hex {
        return Ok(raw);
    }
    let text = String::from_utf8(raw)
        .map_err(|_| CliError::new(USAGE, "hex input is not valid UTF-8"))?;
    parse_hex(&text)
}

/// Run the capture through the same decoder the framer uses.
fn scan(raw: &[u8], max_body: usize) -> DecodeOutput {
    let mut buf = BytesMut::from(raw);
    let mut packets = Vec::new();
    let mut discarded = 0u64;

    loop {
        let offset = raw.len() - buf.len();
        match decode_packet(&mut buf, max_body) {
            Ok(Some(packet)) => {
                // decode_packet may have skipped noise before the signature.
                let consumed = packet.wire_size();
                let start = raw.len() - buf.len() - consumed;
                debug_assert!(start >= offset);
                packets.push(describe(start, &packet));
            }
            Ok(None) => break,
            Err(err) => {
                debug!(offset, %err, "discarding corrupt packet");
                discarded += 1;
            }
        }
    }

    DecodeOutput {
        packets,
        discarded,
        trailing_bytes: buf.len(),
    }
}

fn describe(offset: usize, packet: &SlpPacket) -> PacketOutput {
    let packet_type = PacketType::from_u8(packet.packet_type);
    let detail = match packet_type {
        Some(PacketType::Padp) => padp_detail(packet),
        _ => hex_preview(&packet.body, 12),
    };
    PacketOutput {
        offset,
        dest: packet.dest,
        dest_name: socket_name(packet.dest),
        src: packet.src,
        src_name: socket_name(packet.src),
        packet_type: packet_type.map_or_else(
            || format!("unknown({})", packet.packet_type),
            |ty| format!("{ty:?}").to_lowercase(),
        ),
        xid: packet.xid,
        size: packet.body.len(),
        detail,
    }
}

fn padp_detail(packet: &SlpPacket) -> String {
    let fragment = match Fragment::parse(&packet.body) {
        Ok(fragment) => fragment,
        Err(err) => return format!("bad fragment: {err}"),
    };
    let header = fragment.header;
    let mut detail = format!(
        "{:?} flags={:#04x} size={}",
        header.kind, header.flags, header.size
    );
    // A first data fragment starts with the DLP opcode.
    if header.kind == FragmentType::Data && header.is_first() {
        if let Some(&opcode) = fragment.data.first() {
            let name = commands::lookup(opcode & 0x7F).map(|command| command.name);
            match (name, opcode & 0x80 != 0) {
                (Some(name), false) => detail.push_str(&format!(" request {name}")),
                (Some(name), true) => detail.push_str(&format!(" response {name}")),
                (None, _) => {}
            }
        }
    }
    detail
}

fn print_decode(out: &DecodeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut listing = table(vec![
                "OFFSET", "DEST", "SRC", "TYPE", "XID", "SIZE", "DETAIL",
            ]);
            for p in &out.packets {
                listing.add_row(vec![
                    p.offset.to_string(),
                    format!("{} ({})", p.dest, p.dest_name),
                    format!("{} ({})", p.src, p.src_name),
                    p.packet_type.clone(),
                    format!("{:#04x}", p.xid),
                    p.size.to_string(),
                    p.detail.clone(),
                ]);
            }
            println!("{listing}");
            println!(
                "{} packet(s), {} discarded, {} trailing byte(s)",
                out.packets.len(),
                out.discarded,
                out.trailing_bytes
            );
        }
        OutputFormat::Pretty => {
            for p in &out.packets {
                println!(
                    "@{} {}->{} {} xid={:#04x} size={} {}",
                    p.offset, p.src_name, p.dest_name, p.packet_type, p.xid, p.size, p.detail
                );
            }
        }
        OutputFormat::Raw => {
            let summary = format!(
                "{} {} {}\n",
                out.packets.len(),
                out.discarded,
                out.trailing_bytes
            );
            print_raw(summary.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use syncprims_slp::{encode_packet, MAX_BODY, SOCKET_DLP};

    use super::*;

    fn wire(packet: &SlpPacket) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_packet(packet, &mut buf).unwrap();
        buf.to_vec()
    }

    fn padp_request() -> SlpPacket {
        // Data, first|last, size 1, body = ReadSysInfo opcode.
        SlpPacket::new(
            SOCKET_DLP,
            SOCKET_DLP,
            PacketType::Padp.as_u8(),
            7,
            Bytes::from_static(&[0x01, 0xC0, 0x00, 0x01, 0x12]),
        )
    }

    #[test]
    fn lists_packets_and_skips_noise() {
        let mut raw = vec![0x00, 0x55];
        raw.extend(wire(&padp_request()));
        let out = scan(&raw, MAX_BODY);
        assert_eq!(out.packets.len(), 1);
        assert_eq!(out.packets[0].offset, 2);
        assert_eq!(out.packets[0].packet_type, "padp");
        assert!(out.packets[0].detail.contains("request ReadSysInfo"));
        assert_eq!(out.discarded, 0);
    }

    #[test]
    fn corrupt_packet_is_counted_and_scan_continues() {
        let mut first = wire(&padp_request());
        let last = first.len() - 3;
        first[last] ^= 0x01;
        let mut raw = first;
        raw.extend(wire(&padp_request()));
        let out = scan(&raw, MAX_BODY);
        assert_eq!(out.packets.len(), 1);
        assert!(out.discarded >= 1);
    }

    #[test]
    fn partial_packet_is_trailing() {
        let raw = wire(&padp_request());
        let out = scan(&raw[..raw.len() - 1], MAX_BODY);
        assert!(out.packets.is_empty());
        assert_eq!(out.trailing_bytes, raw.len() - 1);
    }
}
