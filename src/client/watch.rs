//! Long-running idle loop that turns change notifications into bus events.
//!
//! Failures never end the loop: the client reconnects on its next call, and
//! the watcher waits with exponential backoff in between. Only the shutdown
//! token stops it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::MpdClient;
use crate::bus::{BusEvent, SharedBus};
use crate::protocol::MpdError;
use crate::transport::Connector;

/// Backoff between failed idle sessions
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Backoff caps at this value
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }
}

/// Publishes one [`BusEvent::SubsystemChanged`] per reported subsystem.
pub struct IdleWatcher<C: Connector> {
    client: Arc<MpdClient<C>>,
    bus: SharedBus,
    subsystems: Vec<String>,
    retry: RetryConfig,
}

impl<C: Connector> IdleWatcher<C> {
    /// Watch every subsystem
    pub fn new(client: Arc<MpdClient<C>>, bus: SharedBus) -> Self {
        Self {
            client,
            bus,
            subsystems: Vec::new(),
            retry: RetryConfig::default(),
        }
    }

    /// Only wake for these subsystems
    pub fn subsystems(mut self, subsystems: Vec<String>) -> Self {
        self.subsystems = subsystems;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Loop until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let endpoint = self.client.settings().endpoint.to_string();
        let mut delay = self.retry.initial_delay;
        info!("Watching {} for changes", endpoint);

        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.client.idle(&self.subsystems) => outcome,
            };

            match outcome {
                Ok(outcome) => {
                    delay = self.retry.initial_delay;
                    for subsystem in outcome.changed_subsystems() {
                        debug!("Subsystem changed: {}", subsystem);
                        self.bus.publish(BusEvent::SubsystemChanged { subsystem });
                    }
                }
                // Configured idle timeout elapsed with nothing to report
                Err(MpdError::Timeout(limit)) => {
                    debug!("No change within {:?}, re-arming", limit);
                }
                Err(e) => {
                    warn!("Idle on {} failed ({}), retrying in {:?}", endpoint, e, delay);
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {
                            delay = (delay * 2).min(self.retry.max_delay);
                        }
                    }
                }
            }
        }

        // An idle abandoned by the select above is still in flight; the
        // client drops that connection without sending `close`.
        self.client.disconnect().await;
        info!("Stopped watching {}", endpoint);
    }
}
