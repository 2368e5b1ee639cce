//! Response framing.
//!
//! A response is a run of `key: value` lines closed by `OK` or by an
//! `ACK [code@index] {command} message` line. Command lists add `list_OK`
//! between the per-command sections.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::error::{AckError, MpdError, Result};
use crate::transport::{LineRead, Transport};

const SUCCESS: &str = "OK";
const LIST_SUCCESS: &str = "list_OK";
const ERROR_PREFIX: &str = "ACK";

static ACK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ACK \[(\d+)@(\d+)\] \{([^}]*)\}\s?(.*)$").expect("ACK pattern is valid")
});

/// One `key: value` pair of protocol output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub key: String,
    pub value: String,
}

impl Line {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Split at the first `": "`. Lines without one are noise.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.split_once(": ").map(|(key, value)| Self::new(key, value))
    }
}

/// The data lines of one command's response, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    lines: Vec<Line>,
}

impl Frame {
    pub fn new(lines: Vec<Line>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<Line> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push_raw(&mut self, raw: &str) {
        match Line::parse(raw) {
            Some(line) => self.lines.push(line),
            None => tracing::trace!("Discarding unparseable line: {:?}", raw),
        }
    }
}

/// Classification of one raw response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Success,
    ListSuccess,
    Error(AckError),
    Data(String),
}

/// Classify a raw line. An `ACK` line off-grammar is a [`MpdError::Malformed`].
pub fn classify(raw: &str) -> Result<LineKind> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(LineKind::Blank);
    }
    if line == SUCCESS {
        return Ok(LineKind::Success);
    }
    if line == LIST_SUCCESS {
        return Ok(LineKind::ListSuccess);
    }
    if is_error_line(line) {
        return parse_ack(line)
            .map(LineKind::Error)
            .ok_or_else(|| MpdError::Malformed(line.to_string()));
    }
    Ok(LineKind::Data(line.to_string()))
}

fn is_error_line(line: &str) -> bool {
    line.strip_prefix(ERROR_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
}

/// Version token of an `OK <implementation> <version>` greeting.
pub fn parse_greeting(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    if parts.next()? != SUCCESS {
        return None;
    }
    let _implementation = parts.next()?;
    parts.next().map(str::to_string)
}

/// Parse the error terminator grammar.
pub fn parse_ack(line: &str) -> Option<AckError> {
    let caps = ACK_LINE.captures(line.trim())?;
    Some(AckError {
        code: caps.get(1)?.as_str().parse().ok()?,
        command_index: caps.get(2)?.as_str().parse().ok()?,
        current_command: caps.get(3)?.as_str().to_string(),
        message: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
    })
}

/// Read one response frame.
///
/// On timeout or end of stream the transport is closed before the error is
/// returned; the caller must not reuse it.
pub async fn read_frame(transport: &mut dyn Transport, deadline: Option<Duration>) -> Result<Frame> {
    let mut frame = Frame::default();

    loop {
        match next_line(transport, deadline).await? {
            LineKind::Blank => continue,
            LineKind::Success => return Ok(frame),
            LineKind::Error(ack) => return Err(MpdError::Protocol(ack)),
            LineKind::ListSuccess => {
                tracing::trace!("Ignoring stray list_OK outside a command list");
            }
            LineKind::Data(raw) => frame.push_raw(&raw),
        }
    }
}

/// Read the reply to a `command_list_ok_begin` block: one frame per command.
pub async fn read_batch(
    transport: &mut dyn Transport,
    deadline: Option<Duration>,
) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut current = Frame::default();

    loop {
        match next_line(transport, deadline).await? {
            LineKind::Blank => continue,
            LineKind::ListSuccess => frames.push(std::mem::take(&mut current)),
            LineKind::Success => {
                if !current.is_empty() {
                    frames.push(current);
                }
                return Ok(frames);
            }
            LineKind::Error(ack) => return Err(MpdError::Protocol(ack)),
            LineKind::Data(raw) => current.push_raw(&raw),
        }
    }
}

async fn next_line(transport: &mut dyn Transport, deadline: Option<Duration>) -> Result<LineKind> {
    match transport.read_line(deadline).await {
        Ok(LineRead::Line(raw)) => classify(&raw),
        Ok(LineRead::Eof) => {
            transport.close().await;
            Err(MpdError::ConnectionClosed)
        }
        Ok(LineRead::TimedOut) => {
            transport.close().await;
            Err(MpdError::Timeout(deadline.unwrap_or_default()))
        }
        Err(e) => {
            transport.close().await;
            Err(MpdError::Read(e))
        }
    }
}
