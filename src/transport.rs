//! Byte-stream transport for the control protocol.
//!
//! The client only needs four things from a connection: open it, write one
//! line, read one line within a deadline, close it. [`Connector`] opens,
//! [`Transport`] does the rest. TCP and Unix-socket implementations live here;
//! tests inject scripted ones.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{split, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default control port.
pub const DEFAULT_PORT: u16 = 6600;
/// Default host.
pub const DEFAULT_HOST: &str = "localhost";

/// Outcome of a single line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A line with the trailing line terminator removed.
    Line(String),
    /// Peer closed the stream.
    Eof,
    /// The deadline elapsed first.
    TimedOut,
}

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Hosts starting with `/` name a Unix socket path.
    pub fn is_unix_socket(&self) -> bool {
        self.host.starts_with('/')
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unix_socket() {
            write!(f, "{}", self.host)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// An open duplex line stream.
#[async_trait]
pub trait Transport: Send {
    /// Write `line` followed by CRLF and flush.
    async fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Read the next line, waiting at most `deadline` (`None` blocks).
    async fn read_line(&mut self, deadline: Option<Duration>) -> io::Result<LineRead>;

    /// Whether the peer is on this host (loopback or Unix socket).
    fn is_local(&self) -> bool;

    /// Shut the stream down. Errors are not interesting at this point.
    async fn close(&mut self);
}

/// Opens transports to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>>;
}

/// [`Transport`] over any async byte stream.
pub struct StreamTransport<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    local: bool,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    pub fn new(stream: S, local: bool) -> Self {
        let (read_half, writer) = split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer,
            local,
        }
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 2);
        buf.push_str(line);
        buf.push_str("\r\n");
        self.writer.write_all(buf.as_bytes()).await?;
        self.writer.flush().await
    }

    async fn read_line(&mut self, deadline: Option<Duration>) -> io::Result<LineRead> {
        let mut line = String::new();
        let read = match deadline {
            Some(limit) => match timeout(limit, self.reader.read_line(&mut line)).await {
                Ok(result) => result?,
                Err(_) => return Ok(LineRead::TimedOut),
            },
            None => self.reader.read_line(&mut line).await?,
        };

        if read == 0 {
            return Ok(LineRead::Eof);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        Ok(LineRead::Line(trimmed.to_string()))
    }

    fn is_local(&self) -> bool {
        self.local
    }

    async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// Opens TCP connections, or Unix sockets for path-like hosts.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    #[cfg(unix)]
    async fn open_unix(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>> {
        let stream = timeout(
            self.connect_timeout,
            tokio::net::UnixStream::connect(&endpoint.host),
        )
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection timeout"))??;
        tracing::debug!("Unix socket connection to {}", endpoint.host);
        Ok(Box::new(StreamTransport::new(stream, true)))
    }

    #[cfg(not(unix))]
    async fn open_unix(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("Unix sockets are not available here: {}", endpoint.host),
        ))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>> {
        if endpoint.is_unix_socket() {
            return self.open_unix(endpoint).await;
        }

        let addr = format!("{}:{}", endpoint.host, endpoint.port);
        let stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection timeout"))??;
        stream.set_nodelay(true)?;

        let local = stream
            .peer_addr()
            .map(|peer| peer.ip().is_loopback())
            .unwrap_or(false);
        tracing::debug!("TCP connection to {} (local: {})", addr, local);

        Ok(Box::new(StreamTransport::new(stream, local)))
    }
}
