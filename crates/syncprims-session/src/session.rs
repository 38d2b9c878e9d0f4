use std::sync::Arc;

use syncprims_dlp::DlpConnection;
use syncprims_padp::PadpChannel;
use syncprims_slp::{FramerStats, SlpFramer, SOCKET_DLP};
use syncprims_transport::{ByteStream, Endpoint};
use tracing::{debug, info};

use crate::cmp::{CmpHandshake, CmpOutcome};
use crate::config::SessionConfig;
use crate::error::Result;

/// One negotiated connection to a device.
///
/// Commands go through [`Session::dlp`]. The link is torn down by
/// [`Session::close`] or when the session is dropped.
pub struct Session {
    framer: Arc<SlpFramer>,
    dlp: DlpConnection<PadpChannel>,
    outcome: CmpOutcome,
}

impl Session {
    /// Connect to `endpoint` with default settings.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_with_config(endpoint, &SessionConfig::default())
    }

    /// Connect to `endpoint` and negotiate.
    pub fn connect_with_config(endpoint: &Endpoint, config: &SessionConfig) -> Result<Self> {
        let stream = endpoint.connect()?;
        debug!(%endpoint, transport = stream.transport_name(), "link open");
        Self::establish(stream, config)
    }

    /// Negotiate over an already open byte stream.
    ///
    /// Blocks until the device wakes up or the wake-up timeout passes. The
    /// stream is shut down if the handshake fails.
    pub fn establish<S: ByteStream>(stream: S, config: &SessionConfig) -> Result<Self> {
        let framer = SlpFramer::spawn(stream, config.framer())?;
        let socket = match framer.subscribe(SOCKET_DLP) {
            Ok(socket) => socket,
            Err(err) => {
                framer.close();
                return Err(err.into());
            }
        };
        let mut channel = PadpChannel::new(socket, SOCKET_DLP, config.padp());

        let mut handshake = CmpHandshake::new(config.cmp());
        let outcome = match handshake.run(&mut channel) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(%err, "handshake failed, closing link");
                framer.close();
                return Err(err.into());
            }
        };

        info!(
            device_version = %format_args!("{}.{}", outcome.device_version.0, outcome.device_version.1),
            "session established"
        );
        Ok(Self {
            framer,
            dlp: DlpConnection::new(channel),
            outcome,
        })
    }

    /// Command interface. Safe to share between threads.
    pub fn dlp(&self) -> &DlpConnection<PadpChannel> {
        &self.dlp
    }

    pub fn outcome(&self) -> &CmpOutcome {
        &self.outcome
    }

    /// The link underneath, e.g. to close it from a signal handler.
    pub fn framer(&self) -> &Arc<SlpFramer> {
        &self.framer
    }

    pub fn stats(&self) -> FramerStats {
        self.framer.stats()
    }

    pub fn is_closed(&self) -> bool {
        self.framer.is_closed()
    }

    /// Tear down the link. Idempotent; a command in flight fails promptly
    /// with a cancellation error.
    pub fn close(&self) {
        self.framer.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::{Duration, Instant};

    use bytes::Bytes;
    use syncprims_codec::WireRecord;
    use syncprims_dlp::{DlpError, SysInfo};
    use syncprims_padp::{PadpConfig, PadpError};
    use syncprims_slp::{FramerConfig, SlpError};

    use super::*;
    use crate::cmp::{CmpPacket, CmpType};
    use crate::error::{CmpError, SessionError};

    fn fast_config() -> SessionConfig {
        SessionConfig {
            ack_timeout_ms: 200,
            max_retries: 3,
            receive_timeout_ms: Some(5_000),
            wakeup_timeout_ms: 5_000,
            ..SessionConfig::default()
        }
    }

    /// Device end: framer plus a PADP channel on the DLP socket.
    fn device(stream: UnixStream) -> (Arc<SlpFramer>, PadpChannel) {
        let framer = SlpFramer::spawn(stream, FramerConfig::default()).unwrap();
        let socket = framer.subscribe(SOCKET_DLP).unwrap();
        let config = PadpConfig {
            ack_timeout: Duration::from_millis(200),
            receive_timeout: Some(Duration::from_secs(5)),
            ..PadpConfig::default()
        };
        (framer, PadpChannel::new(socket, SOCKET_DLP, config))
    }

    fn wakeup(major: u8) -> Bytes {
        CmpPacket {
            kind: CmpType::WakeUp as u8,
            flags: 0,
            major,
            minor: 0,
            baud_rate: 9600,
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn establish_then_read_sys_info() {
        let (host, dev) = UnixStream::pair().unwrap();
        let peer = thread::spawn(move || {
            let (_framer, mut channel) = device(dev);
            channel.send(wakeup(1)).unwrap();
            let init = channel.recv().unwrap();
            assert_eq!(init[0], CmpType::Init as u8);

            let request = channel.recv().unwrap();
            assert_eq!(request.as_ref(), &[0x12]);
            let mut response = vec![0x92, 0x00];
            response.extend_from_slice(
                &SysInfo {
                    rom_version: 0x0350_0000,
                    locale: 1,
                    product_id: Bytes::from_static(b"palm"),
                }
                .encode()
                .unwrap(),
            );
            channel.send(response).unwrap();
        });

        let session = Session::establish(host, &fast_config()).unwrap();
        assert_eq!(session.outcome().device_version, (1, 0));
        let info = session.dlp().read_sys_info().unwrap();
        assert_eq!(info.rom_version, 0x0350_0000);
        assert_eq!(info.product_id.as_ref(), b"palm");
        peer.join().unwrap();

        session.close();
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn failed_handshake_closes_link() {
        let (host, dev) = UnixStream::pair().unwrap();
        let peer = thread::spawn(move || {
            let (_framer, mut channel) = device(dev);
            channel.send(wakeup(9)).unwrap();
            // Abort, then the host hangs up.
            let abort = channel.recv().unwrap();
            assert_eq!(abort[0], CmpType::Abort as u8);
            matches!(
                channel.recv(),
                Err(PadpError::Slp(SlpError::ConnectionClosed))
            )
        });

        let err = Session::establish(host, &fast_config()).err().unwrap();
        assert!(matches!(
            err,
            SessionError::Cmp(CmpError::VersionMismatch { .. })
        ));
        assert!(peer.join().unwrap(), "device should see the link close");
    }

    #[test]
    fn close_cancels_command_in_flight() {
        let (host, dev) = UnixStream::pair().unwrap();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let peer = thread::spawn(move || {
            let (_framer, mut channel) = device(dev);
            channel.send(wakeup(1)).unwrap();
            channel.recv().unwrap();
            // Take the request but never answer it.
            channel.recv().unwrap();
            let _ = done_rx.recv_timeout(Duration::from_secs(10));
        });

        let session = Session::establish(host, &fast_config()).unwrap();
        thread::scope(|scope| {
            let pending = scope.spawn(|| session.dlp().read_user_info());
            thread::sleep(Duration::from_millis(200));
            let started = Instant::now();
            session.close();
            let result = pending.join().unwrap();
            assert!(matches!(
                result,
                Err(DlpError::Padp(PadpError::Slp(SlpError::Cancelled)))
            ));
            assert!(started.elapsed() < Duration::from_secs(2));
        });
        done_tx.send(()).unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn connect_reports_unreachable_endpoint() {
        let endpoint: Endpoint = "unix:/nonexistent/syncprims-test.sock".parse().unwrap();
        assert!(matches!(
            Session::connect(&endpoint),
            Err(SessionError::Transport(_))
        ));
    }
}
