//! MPD control client
//!
//! One connection, one command in flight at a time. Callers are serialized
//! behind an async mutex; the connection is opened lazily on first use and
//! reopened on the next call after it was dropped.
//!
//! A connection is dropped, never resynchronized, whenever its stream state
//! becomes unknown: a read deadline expired, the peer hung up, a write failed,
//! or a caller abandoned a command halfway (its future was dropped).

mod idle;
mod verbs;
mod watch;

pub use idle::{IdleDrain, IdleOutcome};
pub use verbs::{CommandArg, CommandList, Verb};
pub use watch::{IdleWatcher, RetryConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, SharedBus};
use crate::protocol::{
    encode_command, parse, parse_greeting, read_batch, read_frame, Frame, MpdError, ParsedValue,
    ResponseShapes, Result,
};
use crate::transport::{Connector, Endpoint, LineRead, TcpConnector, Transport};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Everything the client needs to know up front.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub endpoint: Endpoint,
    /// Sent as `password "<pw>"` right after the greeting
    pub password: Option<String>,
    /// Per-read deadline applied when a call does not bring its own (`None` blocks)
    pub response_timeout: Option<Duration>,
    /// Bounds both the socket open and the greeting read
    pub connect_timeout: Duration,
    /// Deadline for the first `idle` of a session (`None` blocks until a change)
    pub idle_timeout: Option<Duration>,
    /// Deadline for each follow-up `idle` in the drain loop
    pub drain_timeout: Duration,
    pub idle_drain: IdleDrain,
    pub shapes: ResponseShapes,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            password: None,
            response_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            idle_drain: IdleDrain::default(),
            shapes: ResponseShapes::default(),
        }
    }
}

/// Connection status for display
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub endpoint: String,
    pub connected: bool,
    pub version: Option<String>,
    pub local: Option<bool>,
}

/// Live connection state
struct Connection {
    transport: Box<dyn Transport>,
    version: String,
    /// Set while a command is between write and terminator
    in_flight: bool,
}

/// What goes over the wire for one exchange.
enum Request {
    Single(String),
    Batch(Vec<String>),
}

impl Request {
    fn describe(&self) -> String {
        match self {
            Request::Single(line) if line.starts_with("password ") => "password ***".to_string(),
            Request::Single(line) => line.clone(),
            Request::Batch(lines) => format!("command list of {}", lines.len()),
        }
    }
}

/// How a dropped connection is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropNotice {
    /// `warn!` and a `Disconnected` event
    Announce,
    /// Expected drop (end of an idle drain): `debug!` only, and the
    /// reconnect that follows is not announced either
    Quiet,
}

/// MPD client
pub struct MpdClient<C: Connector = TcpConnector> {
    settings: ClientSettings,
    connector: C,
    connection: Mutex<Option<Connection>>,
    bus: Option<SharedBus>,
    /// Last drop was quiet; the next connect stays quiet too
    quiet_reconnect: AtomicBool,
}

impl MpdClient<TcpConnector> {
    /// Client speaking TCP (or a Unix socket for path-like hosts)
    pub fn new(settings: ClientSettings) -> Self {
        let connector = TcpConnector::new(settings.connect_timeout);
        Self::with_connector(settings, connector)
    }
}

impl<C: Connector> MpdClient<C> {
    pub fn with_connector(settings: ClientSettings, connector: C) -> Self {
        Self {
            settings,
            connector,
            connection: Mutex::new(None),
            bus: None,
            quiet_reconnect: AtomicBool::new(false),
        }
    }

    /// Publish connection transitions on `bus`
    pub fn with_bus(mut self, bus: SharedBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Connect now instead of on first command. No-op if already connected.
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        self.ensure_connected(&mut slot).await.map(|_| ())
    }

    /// Say goodbye and drop the connection
    pub async fn disconnect(&self) {
        let mut slot = self.connection.lock().await;
        if let Some(mut conn) = slot.take() {
            if !conn.in_flight {
                let _ = conn.transport.write_line("close").await;
            }
            conn.transport.close().await;

            info!("Disconnected from {}", self.settings.endpoint);
            self.publish(BusEvent::Disconnected {
                endpoint: self.settings.endpoint.to_string(),
                reason: "client disconnect".to_string(),
            });
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Protocol version from the greeting of the current connection
    pub async fn version(&self) -> Option<String> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.version.clone())
    }

    /// Whether the current connection is to this host
    pub async fn is_local(&self) -> Option<bool> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.transport.is_local())
    }

    /// Get connection status
    pub async fn status_snapshot(&self) -> ConnectionStatus {
        let slot = self.connection.lock().await;
        ConnectionStatus {
            endpoint: self.settings.endpoint.to_string(),
            connected: slot.is_some(),
            version: slot.as_ref().map(|conn| conn.version.clone()),
            local: slot.as_ref().map(|conn| conn.transport.is_local()),
        }
    }

    /// Send one command and parse its response.
    ///
    /// `deadline` bounds each read for this call only; `None` falls back to
    /// the configured response timeout.
    pub async fn run<S: AsRef<str>>(
        &self,
        verb: &str,
        args: &[S],
        deadline: Option<Duration>,
    ) -> Result<ParsedValue> {
        self.run_with_deadline(verb, args, deadline.or(self.settings.response_timeout))
            .await
    }

    /// Like [`MpdClient::run`] but `deadline` is used as-is, `None` meaning no deadline.
    pub(crate) async fn run_with_deadline<S: AsRef<str>>(
        &self,
        verb: &str,
        args: &[S],
        deadline: Option<Duration>,
    ) -> Result<ParsedValue> {
        self.run_single(verb, args, deadline, DropNotice::Announce)
            .await
    }

    /// Follow-up `idle` of a drain loop. Its timeout is the normal way out,
    /// so the connection it costs is dropped quietly.
    pub(crate) async fn run_drain<S: AsRef<str>>(
        &self,
        verb: &str,
        args: &[S],
        deadline: Duration,
    ) -> Result<ParsedValue> {
        self.run_single(verb, args, Some(deadline), DropNotice::Quiet)
            .await
    }

    async fn run_single<S: AsRef<str>>(
        &self,
        verb: &str,
        args: &[S],
        deadline: Option<Duration>,
        notice: DropNotice,
    ) -> Result<ParsedValue> {
        let request = Request::Single(encode_command(verb, args));
        let frame = self
            .exchange(request, deadline, notice)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        Ok(parse(frame, verb, &self.settings.shapes.shape_for(verb)))
    }

    /// Send several commands as one `command_list_ok_begin` block.
    ///
    /// Returns one parsed value per command. An `ACK` aborts the whole list;
    /// its `command_index` names the failing entry.
    pub async fn command_list(&self, list: &CommandList) -> Result<Vec<ParsedValue>> {
        if list.is_empty() {
            return Ok(Vec::new());
        }

        let mut lines = Vec::with_capacity(list.len() + 2);
        lines.push("command_list_ok_begin".to_string());
        lines.extend(list.iter().map(|(verb, args)| encode_command(verb.name(), args)));
        lines.push("command_list_end".to_string());

        let frames = self
            .exchange(
                Request::Batch(lines),
                self.settings.response_timeout,
                DropNotice::Announce,
            )
            .await?;

        if frames.len() != list.len() {
            return Err(MpdError::Malformed(format!(
                "expected {} responses in command list, got {}",
                list.len(),
                frames.len()
            )));
        }

        Ok(frames
            .into_iter()
            .zip(list.iter())
            .map(|(frame, (verb, _))| {
                parse(frame, verb.name(), &self.settings.shapes.shape_for(verb.name()))
            })
            .collect())
    }

    /// Write a request and read its frame(s), holding the connection lock
    /// for the whole round trip.
    async fn exchange(
        &self,
        request: Request,
        deadline: Option<Duration>,
        notice: DropNotice,
    ) -> Result<Vec<Frame>> {
        let mut slot = self.connection.lock().await;

        let outcome = {
            let conn = self.ensure_connected(&mut slot).await?;
            debug!("> {}", request.describe());

            conn.in_flight = true;
            let outcome = round_trip(conn.transport.as_mut(), &request, deadline).await;
            match &outcome {
                Err(e) if e.poisons_connection() => {}
                _ => conn.in_flight = false,
            }
            outcome
        };

        match &outcome {
            Ok(frames) => {
                debug!(
                    "< {} frame(s), {} line(s)",
                    frames.len(),
                    frames.iter().map(Frame::len).sum::<usize>()
                );
            }
            Err(e) if e.poisons_connection() => {
                let notice = match e {
                    MpdError::Timeout(_) => notice,
                    _ => DropNotice::Announce,
                };
                self.discard(&mut slot, &e.to_string(), notice).await;
            }
            Err(e) => debug!("< {}", e),
        }

        outcome
    }

    async fn ensure_connected<'a>(
        &self,
        slot: &'a mut Option<Connection>,
    ) -> Result<&'a mut Connection> {
        if slot.as_ref().is_some_and(|conn| conn.in_flight) {
            warn!("Connection to {} was abandoned mid-command", self.settings.endpoint);
            self.discard(slot, "abandoned mid-command", DropNotice::Announce)
                .await;
        }

        if slot.is_none() {
            match self.open_connection().await {
                Ok(conn) => *slot = Some(conn),
                Err(e) => {
                    // A real outage; the eventual reconnect is announced
                    self.quiet_reconnect.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }

        slot.as_mut().ok_or(MpdError::ConnectionClosed)
    }

    async fn open_connection(&self) -> Result<Connection> {
        let endpoint = &self.settings.endpoint;
        let connection_error = |reason: String| MpdError::Connection {
            endpoint: endpoint.to_string(),
            reason,
        };

        let mut transport = self
            .connector
            .open(endpoint)
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        let version = match read_greeting(transport.as_mut(), self.settings.connect_timeout).await {
            Ok(version) => version,
            Err(reason) => {
                transport.close().await;
                return Err(connection_error(reason));
            }
        };

        let mut conn = Connection {
            transport,
            version,
            in_flight: false,
        };

        if let Some(password) = &self.settings.password {
            let request = Request::Single(encode_command("password", &[password]));
            if let Err(e) = round_trip(
                conn.transport.as_mut(),
                &request,
                self.settings.response_timeout,
            )
            .await
            {
                warn!("Authentication with {} failed: {}", endpoint, e);
                conn.transport.close().await;
                return Err(e);
            }
        }

        if self.quiet_reconnect.swap(false, Ordering::SeqCst) {
            debug!("Reconnected to {} after idle drain", endpoint);
        } else {
            info!("Connected to MPD {} at {}", conn.version, endpoint);
            self.publish(BusEvent::Connected {
                endpoint: endpoint.to_string(),
                version: conn.version.clone(),
            });
        }

        Ok(conn)
    }

    /// Drop the connection (if any) and announce it
    async fn discard(&self, slot: &mut Option<Connection>, reason: &str, notice: DropNotice) {
        if let Some(mut conn) = slot.take() {
            conn.transport.close().await;
            match notice {
                DropNotice::Quiet => {
                    debug!("Connection to {} dropped: {}", self.settings.endpoint, reason);
                    self.quiet_reconnect.store(true, Ordering::SeqCst);
                }
                DropNotice::Announce => {
                    warn!("Connection to {} dropped: {}", self.settings.endpoint, reason);
                    self.quiet_reconnect.store(false, Ordering::SeqCst);
                    self.publish(BusEvent::Disconnected {
                        endpoint: self.settings.endpoint.to_string(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
    }

    fn publish(&self, event: BusEvent) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }
}

async fn round_trip(
    transport: &mut dyn Transport,
    request: &Request,
    deadline: Option<Duration>,
) -> Result<Vec<Frame>> {
    match request {
        Request::Single(line) => {
            transport.write_line(line).await.map_err(MpdError::Write)?;
            Ok(vec![read_frame(transport, deadline).await?])
        }
        Request::Batch(lines) => {
            for line in lines {
                transport.write_line(line).await.map_err(MpdError::Write)?;
            }
            read_batch(transport, deadline).await
        }
    }
}

async fn read_greeting(
    transport: &mut dyn Transport,
    limit: Duration,
) -> std::result::Result<String, String> {
    match transport.read_line(Some(limit)).await {
        Ok(LineRead::Line(line)) => {
            parse_greeting(&line).ok_or_else(|| format!("unexpected greeting {:?}", line))
        }
        Ok(LineRead::Eof) => Err("closed before greeting".to_string()),
        Ok(LineRead::TimedOut) => Err(format!("no greeting within {:?}", limit)),
        Err(e) => Err(e.to_string()),
    }
}
