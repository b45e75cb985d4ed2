//! Periodic `/agents/logs` poller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::DerivedTelemetry;
use super::parser::LogSignalParser;
use crate::api::MayaApi;
use crate::error::ApiError;

/// Result of one poll cycle.
#[derive(Debug)]
pub enum PollOutcome {
    Updated {
        lines: usize,
        decision_pending: bool,
    },
    Failed(ApiError),
}

/// Polls agent logs on a fixed interval and publishes [`DerivedTelemetry`].
///
/// Cycles never overlap: the delay starts after a cycle completes. A failed
/// cycle leaves the published value as it was.
pub struct LogPoller {
    api: Arc<dyn MayaApi>,
    parser: Arc<dyn LogSignalParser>,
    interval: Duration,
    state: watch::Sender<DerivedTelemetry>,
}

impl LogPoller {
    pub fn new(
        api: Arc<dyn MayaApi>,
        parser: Arc<dyn LogSignalParser>,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(DerivedTelemetry::default());
        Self {
            api,
            parser,
            interval,
            state,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<DerivedTelemetry> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> DerivedTelemetry {
        self.state.borrow().clone()
    }

    /// Run one fetch-and-derive cycle.
    pub async fn poll_once(&self) -> PollOutcome {
        match self.api.agent_logs().await {
            Ok(lines) => self.apply(lines),
            Err(e) => {
                tracing::warn!("Log poll failed: {}", e);
                PollOutcome::Failed(e)
            }
        }
    }

    fn apply(&self, logs: Vec<String>) -> PollOutcome {
        let signals = self.parser.signals(&logs);
        let lines = logs.len();
        let mut decision_pending = false;

        self.state.send_modify(|current| {
            // Once raised, the flag stays up until clear_decision().
            decision_pending = current.decision_pending || signals.decision_required;
            *current = DerivedTelemetry {
                logs,
                cumulative_profit: signals.cumulative_profit,
                decision_pending,
            };
        });

        tracing::debug!(
            "Log poll: {} lines, profit {} ETH, decision pending: {}",
            lines,
            signals.cumulative_profit,
            decision_pending
        );
        PollOutcome::Updated {
            lines,
            decision_pending,
        }
    }

    /// Lower the decision flag after the user has answered.
    pub fn clear_decision(&self) {
        self.state.send_if_modified(|current| {
            if !current.decision_pending {
                return false;
            }
            current.decision_pending = false;
            true
        });
    }

    /// Poll until `cancel` fires. A cycle still in flight at cancellation
    /// is dropped without publishing.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            "Log poller started (protocol {:?}, every {:?})",
            self.parser.protocol(),
            self.interval
        );
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.poll_once() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!("Log poller stopped");
    }

    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(cancel))
    }
}
