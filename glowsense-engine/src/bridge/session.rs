//! Bridge session
//!
//! One connection to the telemetry bridge: handshake, filter registration,
//! periodic keep-alive and frame reads. Generic over the transport so tests
//! can drive it from memory.

use super::protocol::{
    filter_request, FrameAssembler, FrameHeader, HandshakeReply, DISCONNECT_TOKEN, HANDSHAKE_TOKEN, HEADER_LEN,
};
use crate::config::BridgeConfig;
use crate::types::{CanFrame, EngineError, Result};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 1024;

pub struct BridgeSession<S: Read + Write> {
    stream: S,
    assembler: FrameAssembler,
    keepalive_interval: Duration,
    last_keepalive: Instant,
    accepted: bool,
    bytes_received: u64,
}

impl BridgeSession<TcpStream> {
    /// Open a TCP connection to the configured bridge address
    pub fn connect_tcp(config: &BridgeConfig) -> Result<Self> {
        let mut last_error = None;
        for addr in config.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, config.connect_timeout()) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(config.read_timeout()))?;
                    stream.set_nodelay(true)?;
                    log::info!("Connected to bridge at {}", addr);
                    return Ok(Self::new(stream, config.keepalive_interval()));
                }
                Err(e) => {
                    log::debug!("Connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address resolved for {}", config.address),
                )
            })
            .into())
    }
}

impl<S: Read + Write> BridgeSession<S> {
    pub fn new(stream: S, keepalive_interval: Duration) -> Self {
        Self {
            stream,
            assembler: FrameAssembler::new(),
            keepalive_interval,
            last_keepalive: Instant::now(),
            accepted: false,
            bytes_received: 0,
        }
    }

    /// Send the handshake token and read exactly one reply header
    pub fn handshake(&mut self) -> Result<()> {
        self.send(HANDSHAKE_TOKEN)?;

        let mut reply = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut reply).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => EngineError::Disconnected,
            _ => EngineError::IoError(e),
        })?;

        let header = FrameHeader::decode(&reply);
        match HandshakeReply::classify(&header) {
            HandshakeReply::Accepted => {
                log::info!("Bridge accepted the session");
                self.accepted = true;
                self.last_keepalive = Instant::now();
                Ok(())
            }
            HandshakeReply::Refused => Err(EngineError::HandshakeRefused),
            HandshakeReply::Invalid { bus_id, frame_id } => Err(EngineError::HandshakeInvalid { bus_id, frame_id }),
        }
    }

    /// Ask the bridge to forward each `(bus, frame id)` pair
    pub fn register_filters(&mut self, filters: &[(u8, u16)]) -> Result<()> {
        for &(bus_id, frame_id) in filters {
            self.send(&filter_request(bus_id, frame_id))?;
            log::debug!("Registered filter for frame {} on bus {}", frame_id, bus_id);
        }
        log::info!("Registered {} message filters", filters.len());
        Ok(())
    }

    /// Re-send the keep-alive token if the interval has elapsed
    ///
    /// Returns true if a token was sent.
    pub fn keepalive(&mut self) -> Result<bool> {
        if self.last_keepalive.elapsed() < self.keepalive_interval {
            return Ok(false);
        }
        self.send(HANDSHAKE_TOKEN)?;
        self.last_keepalive = Instant::now();
        log::trace!("Keep-alive sent");
        Ok(true)
    }

    /// Read whatever arrived and return the completed frames
    ///
    /// A read timeout yields an empty batch; end of stream is `Disconnected`.
    pub fn read_frames(&mut self) -> Result<Vec<CanFrame>> {
        let mut buf = [0u8; READ_CHUNK];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(EngineError::Disconnected),
            Ok(n) => {
                self.bytes_received += n as u64;
                Ok(self.assembler.push(&buf[..n]))
            }
            Err(e) if is_timeout(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Send the disconnect token
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.accepted {
            return Ok(());
        }
        self.accepted = false;
        self.send(DISCONNECT_TOKEN)?;
        log::info!("Disconnected from bridge");
        Ok(())
    }

    /// Bytes read by [`read_frames`](Self::read_frames), complete units or not
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }
}

impl<S: Read + Write> Drop for BridgeSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            log::debug!("Disconnect on drop failed: {}", e);
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::encode_unit;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Scripted input; output is shared so it survives the session
    struct ScriptedStream {
        input: Cursor<Vec<u8>>,
        output: Arc<Mutex<Vec<u8>>>,
        hold_open: bool,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.input.read(buf)?;
            if n == 0 && self.hold_open {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            Ok(n)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn reply(bus_id: u8, frame_id: u16) -> Vec<u8> {
        FrameHeader {
            bus_id,
            frame_id,
            length: 0,
        }
        .encode()
        .to_vec()
    }

    fn scripted(input: Vec<u8>, hold_open: bool) -> (BridgeSession<ScriptedStream>, Arc<Mutex<Vec<u8>>>) {
        let output = Arc::new(Mutex::new(Vec::new()));
        let stream = ScriptedStream {
            input: Cursor::new(input),
            output: Arc::clone(&output),
            hold_open,
        };
        (BridgeSession::new(stream, Duration::from_secs(5)), output)
    }

    #[test]
    fn test_accepted_handshake_then_filters() {
        let (mut session, output) = scripted(reply(15, 6), true);
        session.handshake().unwrap();
        assert!(session.is_accepted());
        session.register_filters(&[(0, 1013), (1, 826)]).unwrap();

        let mut expected = b"ehllo".to_vec();
        expected.extend_from_slice(&[0x0F, 0, 0x03, 0xF5, 0x0F, 1, 0x03, 0x3A]);
        assert_eq!(*output.lock().unwrap(), expected);

        drop(session);
        assert!(output.lock().unwrap().ends_with(b"bye"));
    }

    #[test]
    fn test_refused_handshake() {
        let (mut session, output) = scripted(reply(15, 7), false);
        assert!(matches!(session.handshake(), Err(EngineError::HandshakeRefused)));
        drop(session);
        assert_eq!(*output.lock().unwrap(), b"ehllo".to_vec());
    }

    #[test]
    fn test_invalid_and_truncated_replies() {
        let (mut session, _) = scripted(reply(3, 6), false);
        assert!(matches!(
            session.handshake(),
            Err(EngineError::HandshakeInvalid { bus_id: 3, frame_id: 6 })
        ));

        let (mut session, _) = scripted(vec![0x01, 0x02], false);
        assert!(matches!(session.handshake(), Err(EngineError::Disconnected)));
    }

    #[test]
    fn test_read_frames_and_timeouts() {
        let frame = CanFrame::new(0, 1013, [2, 0, 0, 0, 0, 0, 0, 0]);
        let mut input = reply(15, 6);
        input.extend_from_slice(&encode_unit(&frame));
        let (mut session, _) = scripted(input, true);

        session.handshake().unwrap();
        assert_eq!(session.read_frames().unwrap(), vec![frame]);
        assert!(session.read_frames().unwrap().is_empty());
    }

    #[test]
    fn test_partial_unit_counts_as_traffic() {
        let frame = CanFrame::new(0, 1013, [0; 8]);
        let unit = encode_unit(&frame);
        let mut input = reply(15, 6);
        input.extend_from_slice(&unit[..10]);
        let (mut session, _) = scripted(input, true);

        session.handshake().unwrap();
        assert_eq!(session.bytes_received(), 0);
        assert!(session.read_frames().unwrap().is_empty());
        assert_eq!(session.bytes_received(), 10);

        // Nothing new on a timeout
        assert!(session.read_frames().unwrap().is_empty());
        assert_eq!(session.bytes_received(), 10);
    }

    #[test]
    fn test_end_of_stream_is_disconnect() {
        let (mut session, _) = scripted(reply(15, 6), false);
        session.handshake().unwrap();
        assert!(matches!(session.read_frames(), Err(EngineError::Disconnected)));
    }

    #[test]
    fn test_keepalive_respects_interval() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let stream = ScriptedStream {
            input: Cursor::new(reply(15, 6)),
            output: Arc::clone(&output),
            hold_open: true,
        };
        let mut session = BridgeSession::new(stream, Duration::ZERO);
        session.handshake().unwrap();
        assert!(session.keepalive().unwrap());
        assert_eq!(output.lock().unwrap().as_slice(), b"ehlloehllo");

        let (mut session, _) = scripted(Vec::new(), true);
        assert!(!session.keepalive().unwrap());
    }
}
