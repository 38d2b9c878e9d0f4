#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use syncprims::codec::WireRecord;
use syncprims::dlp::{CardInfo, CardQuery, DlpDateTime, StorageInfo, SysInfo, UserInfo};
use syncprims::padp::{PadpChannel, PadpConfig};
use syncprims::session::{CmpPacket, CmpType};
use syncprims::slp::{FramerConfig, SlpFramer, SOCKET_DLP};
use syncprims::transport::ByteStream;

/// Device side of a link, built from the same stack the host uses.
pub struct SimulatedDevice {
    pub framer: Arc<SlpFramer>,
    pub channel: PadpChannel,
}

impl SimulatedDevice {
    pub fn attach<S: ByteStream>(stream: S) -> Self {
        let framer = SlpFramer::spawn(stream, FramerConfig::default()).expect("device framer");
        let socket = framer.subscribe(SOCKET_DLP).expect("device socket");
        let config = PadpConfig {
            ack_timeout: Duration::from_millis(300),
            receive_timeout: Some(Duration::from_secs(10)),
            ..PadpConfig::default()
        };
        Self {
            framer,
            channel: PadpChannel::new(socket, SOCKET_DLP, config),
        }
    }

    /// Send a wake-up and return the host's answer.
    pub fn wake(&mut self, major: u8, minor: u8, max_baud: u32) -> CmpPacket {
        let wakeup = CmpPacket {
            kind: CmpType::WakeUp as u8,
            flags: 0,
            major,
            minor,
            baud_rate: max_baud,
        };
        self.channel
            .send(wakeup.encode().expect("wake-up encodes"))
            .expect("wake-up acknowledged");
        let answer = self.channel.recv().expect("host answers wake-up");
        CmpPacket::decode(&answer).expect("answer is a CMP packet")
    }

    /// Answer DLP requests until EndOfSync. Returns the request opcodes seen.
    pub fn serve(&mut self) -> Vec<u8> {
        let mut seen = Vec::new();
        loop {
            let request = self.channel.recv().expect("request arrives");
            let opcode = request[0];
            seen.push(opcode);
            self.channel
                .reply(respond(&request))
                .expect("response acknowledged");
            if opcode == 0x2F {
                return seen;
            }
        }
    }
}

pub fn sys_info() -> SysInfo {
    SysInfo {
        rom_version: 0x0410_3000,
        locale: 0x0001_0000,
        product_id: Bytes::from_static(b"m505"),
    }
}

pub fn user_info() -> UserInfo {
    UserInfo {
        user_id: 4242,
        viewer_id: 0,
        last_sync_pc: 0x0A00_0001,
        last_successful_sync: device_time(),
        last_sync: device_time(),
        name: "Dana Reyes".to_string(),
        password: Bytes::new(),
    }
}

pub fn device_time() -> DlpDateTime {
    DlpDateTime {
        year: 2004,
        month: 6,
        day: 1,
        hour: 9,
        minute: 15,
        second: 0,
    }
}

fn card(card_no: u8, name: &str) -> CardInfo {
    CardInfo {
        card_no,
        card_version: 1,
        created: device_time(),
        rom_size: 4 * 1024 * 1024,
        ram_size: 8 * 1024 * 1024,
        free_ram: 3 * 1024 * 1024,
        name: name.to_string(),
        manufacturer: "Palm".to_string(),
    }
}

/// Canned answers for the standard catalogue. Two cards, one per query.
pub fn respond(request: &[u8]) -> Vec<u8> {
    let opcode = request[0];
    let mut response = vec![opcode | 0x80, 0x00];
    let body = match opcode {
        0x10 => user_info().encode(),
        0x12 => sys_info().encode(),
        0x13 => device_time().encode(),
        0x15 => {
            let query = CardQuery::decode(&request[1..]).expect("card query");
            let storage = match query.card_no {
                0 => StorageInfo {
                    last_card: 0,
                    more: true,
                    cards: vec![card(0, "PalmCard")],
                },
                _ => StorageInfo {
                    last_card: 1,
                    more: false,
                    cards: vec![card(1, "SD")],
                },
            };
            storage.encode()
        }
        0x11 | 0x14 | 0x2A | 0x2E | 0x2F => return response,
        _ => {
            response[1] = 13;
            return response;
        }
    };
    response.extend_from_slice(&body.expect("canned record encodes"));
    response
}
