//! Continue/terminate prompt driven by the telemetry decision flag.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{AgentDecision, MayaApi};
use crate::telemetry::{DerivedTelemetry, LogPoller};

/// Whether the user is currently being asked for a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Hidden,
    Prompting,
}

/// What happened to a user decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionReceipt {
    pub decision: AgentDecision,
    /// Whether the core acknowledged it.
    pub delivered: bool,
}

/// Raises a prompt when the poller flags a decision and relays the answer.
pub struct DecisionGate {
    api: Arc<dyn MayaApi>,
    poller: Arc<LogPoller>,
    agent_id: String,
    state: watch::Sender<GateState>,
}

impl DecisionGate {
    pub fn new(api: Arc<dyn MayaApi>, poller: Arc<LogPoller>, agent_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(GateState::Hidden);
        Self {
            api,
            poller,
            agent_id: agent_id.into(),
            state,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Feed a telemetry snapshot. Returns true if this raised the prompt.
    pub fn observe(&self, telemetry: &DerivedTelemetry) -> bool {
        if !telemetry.decision_pending {
            return false;
        }
        let raised = self.state.send_if_modified(|state| {
            if *state == GateState::Prompting {
                return false;
            }
            *state = GateState::Prompting;
            true
        });
        if raised {
            tracing::info!("Agent {} is waiting for a continue/terminate decision", self.agent_id);
        }
        raised
    }

    /// Relay the user's answer.
    ///
    /// The poller flag is cleared and the prompt hidden before the request
    /// goes out, so the gate is back to `Hidden` whatever the network does.
    pub async fn on_decision(&self, keep_running: bool) -> DecisionReceipt {
        let decision = AgentDecision::from(keep_running);

        self.poller.clear_decision();
        self.state.send_replace(GateState::Hidden);

        let delivered = match self.api.submit_decision(&self.agent_id, decision).await {
            Ok(()) => {
                tracing::info!("Sent '{}' decision for agent {}", decision, self.agent_id);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to send '{}' decision for agent {}: {}",
                    decision,
                    self.agent_id,
                    e
                );
                false
            }
        };

        DecisionReceipt {
            decision,
            delivered,
        }
    }

    /// Watch the poller's telemetry until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut telemetry = self.poller.subscribe();
        loop {
            let snapshot = telemetry.borrow_and_update().clone();
            self.observe(&snapshot);

            tokio::select! {
                changed = telemetry.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!("Decision gate stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::telemetry::MarkerParser;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const PENDING: &[&str] = &["a", "b", "c", "d", "e", "HEARTBEAT"];

    fn setup(lines: &[&str]) -> (Arc<FakeApi>, Arc<LogPoller>, Arc<DecisionGate>) {
        let api = Arc::new(FakeApi::with_logs(lines));
        let poller = Arc::new(LogPoller::new(
            api.clone(),
            Arc::new(MarkerParser::default()),
            Duration::from_millis(10),
        ));
        let gate = Arc::new(DecisionGate::new(api.clone(), poller.clone(), "A-01"));
        (api, poller, gate)
    }

    #[tokio::test]
    async fn pending_flag_raises_prompt_once() {
        let (_api, poller, gate) = setup(PENDING);
        poller.poll_once().await;

        assert!(gate.observe(&poller.snapshot()));
        assert_eq!(gate.state(), GateState::Prompting);
        // Further signals are ignored while prompting.
        assert!(!gate.observe(&poller.snapshot()));
    }

    #[tokio::test]
    async fn no_flag_stays_hidden() {
        let (_api, poller, gate) = setup(&["a", "HEARTBEAT"]);
        poller.poll_once().await;
        assert!(!gate.observe(&poller.snapshot()));
        assert_eq!(gate.state(), GateState::Hidden);
    }

    #[tokio::test]
    async fn decision_is_sent_and_flag_cleared() {
        let (api, poller, gate) = setup(PENDING);
        poller.poll_once().await;
        gate.observe(&poller.snapshot());

        let receipt = gate.on_decision(false).await;

        assert_eq!(
            receipt,
            DecisionReceipt {
                decision: AgentDecision::Terminate,
                delivered: true
            }
        );
        assert_eq!(gate.state(), GateState::Hidden);
        assert!(!poller.snapshot().decision_pending);
        assert_eq!(
            *api.decisions.lock().unwrap(),
            vec![("A-01".to_string(), AgentDecision::Terminate)]
        );
    }

    #[tokio::test]
    async fn gate_hides_even_when_decision_fails() {
        let (api, poller, gate) = setup(PENDING);
        poller.poll_once().await;
        gate.observe(&poller.snapshot());
        api.reject_decisions.store(true, Ordering::SeqCst);

        let receipt = gate.on_decision(true).await;

        assert!(!receipt.delivered);
        assert_eq!(receipt.decision, AgentDecision::Continue);
        assert_eq!(gate.state(), GateState::Hidden);
        assert!(!poller.snapshot().decision_pending);
    }

    #[tokio::test]
    async fn run_follows_poller() {
        let (_api, poller, gate) = setup(PENDING);
        let cancel = CancellationToken::new();
        let mut gate_rx = gate.subscribe();
        let handle = tokio::spawn(Arc::clone(&gate).run(cancel.clone()));

        poller.poll_once().await;
        tokio::time::timeout(
            Duration::from_secs(5),
            gate_rx.wait_for(|s| *s == GateState::Prompting),
        )
        .await
        .unwrap()
        .unwrap();

        cancel.cancel();
        handle.await.unwrap();
    }
}
