#![cfg(all(unix, feature = "cli"))]

mod common;

use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::process::Command;
use std::thread;

use bytes::{Bytes, BytesMut};
use syncprims::slp::{encode_packet, PacketType, SlpPacket, SOCKET_DLP};

use common::SimulatedDevice;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/syncprims-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn syncprims() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_syncprims"));
    command.arg("--log-level").arg("error");
    command
}

#[test]
fn crc_of_check_string() {
    let output = syncprims()
        .args(["--format", "raw", "crc", "--data", "123456789"])
        .output()
        .expect("crc should run");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "31C3");
}

#[test]
fn decode_lists_captured_packets() {
    let dir = unique_temp_dir("decode");
    let capture = dir.join("capture.bin");

    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[0x00, 0x00]);
    encode_packet(
        &SlpPacket::new(
            SOCKET_DLP,
            SOCKET_DLP,
            PacketType::Padp.as_u8(),
            1,
            Bytes::from_static(&[0x01, 0xC0, 0x00, 0x01, 0x12]),
        ),
        &mut buf,
    )
    .expect("packet encodes");
    std::fs::write(&capture, &buf).expect("capture written");

    let output = syncprims()
        .args(["--format", "json", "decode"])
        .arg(&capture)
        .output()
        .expect("decode should run");
    assert!(output.status.success());

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decode should emit json");
    let packets = payload["packets"].as_array().expect("packets array");
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0]["offset"], 2);
    assert!(packets[0]["detail"]
        .as_str()
        .is_some_and(|detail| detail.contains("ReadSysInfo")));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn info_unreachable_endpoint_is_transport_error() {
    let dir = unique_temp_dir("missing");
    let output = syncprims()
        .arg("info")
        .arg(format!("unix:{}", dir.join("nobody.sock").display()))
        .output()
        .expect("info should run");
    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn info_against_simulated_device() {
    let dir = unique_temp_dir("info");
    let sock_path = dir.join("device.sock");
    let listener = UnixListener::bind(&sock_path).expect("device socket binds");

    let device = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("host connects");
        let mut device = SimulatedDevice::attach(stream);
        device.wake(1, 1, 57_600);
        device.serve()
    });

    let output = syncprims()
        .args(["--format", "json", "info"])
        .arg(format!("unix:{}", sock_path.display()))
        .args(["--user", "--storage"])
        .output()
        .expect("info should run");
    assert!(
        output.status.success(),
        "info failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("info should emit json");
    assert_eq!(payload["product_id"], "m505");
    assert_eq!(payload["rom_version"], "4.1.0");
    assert_eq!(payload["user"]["name"], "Dana Reyes");
    assert_eq!(payload["cards"].as_array().map(Vec::len), Some(2));

    let seen = device.join().expect("device thread");
    assert_eq!(seen, vec![0x12, 0x13, 0x10, 0x15, 0x15, 0x2F]);
    let _ = std::fs::remove_dir_all(&dir);
}
