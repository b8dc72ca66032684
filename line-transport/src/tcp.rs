//! TCP transport for a remote line-protocol peer.

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, TransportError};
use crate::line::LineReader;
use crate::{ReadOutcome, Transport, LINE_TERMINATOR};

/// Where and how to reach a TCP line-protocol peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    /// Per-address connect timeout
    /// Default: 5 seconds
    pub connect_timeout: Duration,
    /// How long a single read waits before reporting [`ReadOutcome::Idle`]
    /// Default: 150 milliseconds
    pub read_timeout: Duration,
}

impl TcpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(150),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// `host:port` as dialed.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Transport over a connected TCP stream.
pub struct TcpTransport {
    peer: SocketAddr,
    reader: Mutex<LineReader<TcpStream>>,
    writer: Mutex<TcpStream>,
    closed: AtomicBool,
    eof: AtomicBool,
}

impl TcpTransport {
    /// Resolve and connect, trying each resolved address in turn.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectFailed`] carrying the last address error.
    pub fn connect(config: &TcpConfig) -> Result<Self> {
        let address = config.address();
        let connect_failed = |source: io::Error| TransportError::ConnectFailed {
            address: address.clone(),
            source,
        };

        let candidates = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(connect_failed)?;

        let mut last_error = None;
        let mut connected = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, config.connect_timeout) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => {
                    tracing::debug!(%candidate, "connect attempt failed: {}", e);
                    last_error = Some(e);
                }
            }
        }
        let stream = match connected {
            Some(stream) => stream,
            None => {
                let source = last_error.unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
                });
                return Err(connect_failed(source));
            }
        };

        let read_timeout = if config.read_timeout.is_zero() {
            None
        } else {
            Some(config.read_timeout)
        };
        stream.set_read_timeout(read_timeout)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let read_half = stream.try_clone()?;

        tracing::debug!(%peer, "connected to line-protocol peer");

        Ok(Self {
            peer,
            reader: Mutex::new(LineReader::new(read_half)),
            writer: Mutex::new(stream),
            closed: AtomicBool::new(false),
            eof: AtomicBool::new(false),
        })
    }
}

impl Transport for TcpTransport {
    fn read_line(&self) -> Result<ReadOutcome> {
        if self.eof.load(Ordering::SeqCst) {
            return Ok(ReadOutcome::EndOfStream);
        }
        let mut reader = self.reader.lock();
        match reader.read_line() {
            Ok(Some(line)) => Ok(ReadOutcome::Line(line)),
            Ok(None) => {
                self.eof.store(true, Ordering::SeqCst);
                Ok(ReadOutcome::EndOfStream)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(ReadOutcome::Idle)
            }
            Err(_) if self.closed.load(Ordering::SeqCst) => Ok(ReadOutcome::EndOfStream),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn write_line(&self, text: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock();
        writer.write_all(text.as_bytes())?;
        writer.write_all(LINE_TERMINATOR.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.eof.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Shutdown goes through the writer handle so a reader blocked on the
        // cloned socket wakes up without us taking its lock.
        if let Err(e) = self.writer.lock().shutdown(Shutdown::Both) {
            tracing::trace!(peer = %self.peer, "shutdown on closed socket: {}", e);
        }
        tracing::debug!(peer = %self.peer, "closed line-protocol connection");
    }

    fn describe(&self) -> String {
        self.peer.to_string()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    fn next_line(transport: &TcpTransport) -> ReadOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match transport.read_line().unwrap() {
                ReadOutcome::Idle if Instant::now() < deadline => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = TcpConfig::new("cec-host", 9526);
        assert_eq!(config.address(), "cec-host:9526");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_millis(150));
    }

    #[test]
    fn test_round_trip_with_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"TV (0): power status changed\r\n").unwrap();
            let mut inbound = BufReader::new(socket.try_clone().unwrap());
            let mut command = String::new();
            inbound.read_line(&mut command).unwrap();
            command
        });

        let transport = TcpTransport::connect(&TcpConfig::new("127.0.0.1", port)).unwrap();
        assert_eq!(
            next_line(&transport),
            ReadOutcome::Line("TV (0): power status changed".to_string())
        );

        transport.write_line("on 0").unwrap();
        assert_eq!(peer.join().unwrap(), "on 0\n");

        assert_eq!(next_line(&transport), ReadOutcome::EndOfStream);
        assert!(!transport.is_alive());
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config =
            TcpConfig::new("127.0.0.1", port).with_connect_timeout(Duration::from_millis(500));
        match TcpTransport::connect(&config) {
            Err(e @ TransportError::ConnectFailed { .. }) => assert!(e.is_open_failure()),
            other => panic!("expected ConnectFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_close_is_idempotent_and_rejects_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let transport = TcpTransport::connect(&TcpConfig::new("127.0.0.1", port)).unwrap();
        let _accepted = listener.accept().unwrap();

        transport.close();
        transport.close();

        assert!(!transport.is_alive());
        assert!(matches!(transport.write_line("q"), Err(TransportError::Closed)));
        assert_eq!(next_line(&transport), ReadOutcome::EndOfStream);
    }
}
