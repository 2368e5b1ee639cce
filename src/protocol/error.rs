//! Error types for MPD operations.

use std::fmt;
use std::io;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum MpdError {
    /// Socket open failed, or the greeting was missing or malformed.
    #[error("connection to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },

    /// The transport rejected a command write.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// The transport failed while reading a response.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The daemon answered with an `ACK` line.
    #[error(transparent)]
    Protocol(#[from] AckError),

    /// No terminator line arrived before the read deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// End of stream before a terminator line.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// A line claimed to be a terminator but did not follow its grammar.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Verb is not part of the command catalogue; nothing was sent.
    #[error("unsupported command: {0}")]
    Unsupported(String),
}

impl MpdError {
    /// Whether this failure leaves the stream in an unknown state.
    ///
    /// The connection is dropped rather than resynchronized when this holds.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            MpdError::Write(_)
                | MpdError::Read(_)
                | MpdError::Timeout(_)
                | MpdError::ConnectionClosed
                | MpdError::Malformed(_)
        )
    }

    /// The daemon's error payload, if this is a protocol failure.
    pub fn ack(&self) -> Option<&AckError> {
        match self {
            MpdError::Protocol(ack) => Some(ack),
            _ => None,
        }
    }
}

/// Result type alias using MpdError.
pub type Result<T> = std::result::Result<T, MpdError>;

/// Parsed `ACK [<code>@<index>] {<command>} <message>` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("[{code}@{command_index}] {{{current_command}}} {message}")]
pub struct AckError {
    pub code: u32,
    /// 0-based position of the failing command within a command list
    pub command_index: u32,
    pub current_command: String,
    pub message: String,
}

impl AckError {
    /// Typed view of the numeric code.
    pub fn kind(&self) -> AckCode {
        AckCode::from(self.code)
    }
}

/// Error codes the daemon is known to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AckCode {
    NotList,
    Arg,
    Password,
    Permission,
    Unknown,
    NoExist,
    PlaylistMax,
    System,
    PlaylistLoad,
    UpdateAlready,
    PlayerSync,
    Exist,
    Other(u32),
}

impl From<u32> for AckCode {
    fn from(code: u32) -> Self {
        match code {
            1 => AckCode::NotList,
            2 => AckCode::Arg,
            3 => AckCode::Password,
            4 => AckCode::Permission,
            5 => AckCode::Unknown,
            50 => AckCode::NoExist,
            51 => AckCode::PlaylistMax,
            52 => AckCode::System,
            53 => AckCode::PlaylistLoad,
            54 => AckCode::UpdateAlready,
            55 => AckCode::PlayerSync,
            56 => AckCode::Exist,
            other => AckCode::Other(other),
        }
    }
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckCode::Other(code) => write!(f, "{}", code),
            known => write!(f, "{:?}", known),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_code_maps_known_values() {
        assert_eq!(AckCode::from(5), AckCode::Unknown);
        assert_eq!(AckCode::from(50), AckCode::NoExist);
        assert_eq!(AckCode::from(99), AckCode::Other(99));
    }

    #[test]
    fn ack_error_display_mirrors_wire_grammar() {
        let ack = AckError {
            code: 5,
            command_index: 0,
            current_command: "play".to_string(),
            message: "no such song".to_string(),
        };
        assert_eq!(ack.to_string(), "[5@0] {play} no such song");
        assert_eq!(ack.kind(), AckCode::Unknown);
    }

    #[test]
    fn only_stream_failures_poison_the_connection() {
        assert!(MpdError::Timeout(Duration::from_millis(100)).poisons_connection());
        assert!(MpdError::ConnectionClosed.poisons_connection());
        assert!(!MpdError::Unsupported("frobnicate".to_string()).poisons_connection());

        let ack = AckError {
            code: 2,
            command_index: 0,
            current_command: "setvol".to_string(),
            message: "Integer expected".to_string(),
        };
        let err = MpdError::from(ack);
        assert!(!err.poisons_connection());
        assert_eq!(err.ack().map(|a| a.code), Some(2));
    }
}
