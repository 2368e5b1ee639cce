//! Idle session: long-poll for subsystem changes.
//!
//! The daemon folds changes that land in the same tick into one `idle` reply,
//! and each new `idle` starts a fresh observation point. Anything that
//! happens between one reply and the next request is reported late or, if
//! it coalesces with a later change, not separately at all. To narrow that
//! window the session follows the first, long `idle` with short-deadline
//! `idle` calls for as long as they keep returning, and stops at the first
//! timeout. This only pays off on a low-latency link, so by default it is
//! done for loopback and Unix-socket connections only.
//!
//! This is best effort. It shrinks the race; it does not close it.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::MpdClient;
use crate::protocol::{MpdError, ParsedValue, Result};
use crate::transport::Connector;

const IDLE: &str = "idle";

/// When to drain queued notifications after the first `idle` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleDrain {
    /// Only when the connection is local
    #[default]
    Auto,
    Always,
    Never,
}

/// Result of one idle session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IdleOutcome {
    /// Only the initial long-poll produced a result
    Single(ParsedValue),
    /// Initial result followed by drained ones, in arrival order
    Batch(Vec<ParsedValue>),
}

impl IdleOutcome {
    fn from_results(results: Vec<ParsedValue>) -> Self {
        match <[ParsedValue; 1]>::try_from(results) {
            Ok([only]) => IdleOutcome::Single(only),
            Err(results) => IdleOutcome::Batch(results),
        }
    }

    pub fn values(&self) -> &[ParsedValue] {
        match self {
            IdleOutcome::Single(value) => std::slice::from_ref(value),
            IdleOutcome::Batch(values) => values,
        }
    }

    pub fn into_values(self) -> Vec<ParsedValue> {
        match self {
            IdleOutcome::Single(value) => vec![value],
            IdleOutcome::Batch(values) => values,
        }
    }

    /// Every `changed: <subsystem>` across all results, in order.
    pub fn changed_subsystems(&self) -> Vec<String> {
        self.values()
            .iter()
            .flat_map(|value| value.scalars())
            .map(str::to_string)
            .collect()
    }
}

impl<C: Connector> MpdClient<C> {
    /// Wait for the next change in `subsystems` (all subsystems when empty).
    pub async fn idle<S: AsRef<str> + Sync>(&self, subsystems: &[S]) -> Result<IdleOutcome> {
        let first = self
            .run_with_deadline(IDLE, subsystems, self.settings.idle_timeout)
            .await?;

        if !self.should_drain().await {
            return Ok(IdleOutcome::Single(first));
        }

        let mut results = vec![first];
        loop {
            match self
                .run_drain(IDLE, subsystems, self.settings.drain_timeout)
                .await
            {
                Ok(value) => {
                    debug!("Drained queued idle result #{}", results.len());
                    results.push(value);
                }
                Err(MpdError::Timeout(_)) => break,
                Err(e) => {
                    // Collected results are returned regardless.
                    warn!("Idle drain stopped early: {}", e);
                    break;
                }
            }
        }

        Ok(IdleOutcome::from_results(results))
    }

    async fn should_drain(&self) -> bool {
        match self.settings.idle_drain {
            IdleDrain::Always => true,
            IdleDrain::Never => false,
            IdleDrain::Auto => self.is_local().await.unwrap_or(false),
        }
    }
}
