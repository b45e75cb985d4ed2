//! Proposal, treasury and balance synchronization with the MAYA core.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::MayaApi;
use crate::error::ApiError;
use crate::model::{Proposal, Treasury};
use crate::session::SessionManager;

/// Keeps the last-known-good proposal list and treasury snapshot.
///
/// Every successful fetch replaces the published value wholesale; a failed
/// fetch is logged and leaves it alone.
pub struct ProposalSynchronizer {
    api: Arc<dyn MayaApi>,
    session: Arc<SessionManager>,
    proposals: watch::Sender<Vec<Proposal>>,
    treasury: watch::Sender<Option<Treasury>>,
}

impl ProposalSynchronizer {
    pub fn new(api: Arc<dyn MayaApi>, session: Arc<SessionManager>) -> Self {
        let (proposals, _) = watch::channel(Vec::new());
        let (treasury, _) = watch::channel(None);
        Self {
            api,
            session,
            proposals,
            treasury,
        }
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.proposals.borrow().clone()
    }

    pub fn subscribe_proposals(&self) -> watch::Receiver<Vec<Proposal>> {
        self.proposals.subscribe()
    }

    pub fn treasury(&self) -> Option<Treasury> {
        self.treasury.borrow().clone()
    }

    pub fn subscribe_treasury(&self) -> watch::Receiver<Option<Treasury>> {
        self.treasury.subscribe()
    }

    pub async fn fetch_pending_proposals(&self) -> Result<(), ApiError> {
        match self.api.pending_proposals().await {
            Ok(proposals) => {
                tracing::debug!("Fetched {} pending proposals", proposals.len());
                self.proposals.send_replace(proposals);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to fetch proposals: {}", e);
                Err(e)
            }
        }
    }

    /// Approve a proposal. Returns whether the server accepted it.
    pub async fn approve(&self, proposal_id: &str) -> bool {
        let result = self.api.approve_proposal(proposal_id).await;
        self.after_decision("approve", proposal_id, result).await
    }

    /// Reject a proposal. Returns whether the server accepted it.
    pub async fn reject(&self, proposal_id: &str) -> bool {
        let result = self.api.reject_proposal(proposal_id).await;
        self.after_decision("reject", proposal_id, result).await
    }

    async fn after_decision(
        &self,
        action: &str,
        proposal_id: &str,
        result: Result<Proposal, ApiError>,
    ) -> bool {
        match result {
            Ok(proposal) => {
                tracing::info!(
                    "Proposal {} {}d, now {}",
                    proposal_id,
                    action,
                    proposal.status
                );
                // Failure is already logged and the stale list kept.
                let _ = self.fetch_pending_proposals().await;
                true
            }
            Err(e) => {
                tracing::warn!("Failed to {} proposal {}: {}", action, proposal_id, e);
                false
            }
        }
    }

    pub async fn fetch_treasury(&self) -> Result<(), ApiError> {
        match self.api.treasury().await {
            Ok(treasury) => {
                tracing::debug!("Treasury balance {} ETH", treasury.balance_eth);
                self.treasury.send_replace(Some(treasury));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to fetch treasury: {}", e);
                Err(e)
            }
        }
    }

    /// Ask the core to start an agent. Fire-and-forget; the outcome is logged.
    pub fn start_agent(&self, agent_id: &str) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let agent_id = agent_id.to_string();
        tokio::spawn(async move {
            match api.start_agent().await {
                Ok(()) => tracing::info!("Agent {} start requested", agent_id),
                Err(e) => tracing::warn!("Failed to start agent {}: {}", agent_id, e),
            }
        })
    }

    /// Fetch the balance for `address` and hand it to the session manager.
    pub async fn refresh_balance(&self, address: &str) -> Result<bool, ApiError> {
        let balance = self.api.wallet_balance(address).await.inspect_err(|e| {
            tracing::warn!("Failed to fetch balance for {}: {}", address, e);
        })?;
        let applied = self.session.apply_balance(address, balance.balance_eth);
        if !applied {
            tracing::debug!("Balance for {} not applied, session moved on", address);
        }
        Ok(applied)
    }

    /// Refresh the balance whenever the session connects to a new address.
    pub async fn run_session_reactor(self: Arc<Self>, cancel: CancellationToken) {
        let mut session_rx = self.session.subscribe();
        let mut last_address: Option<String> = None;

        loop {
            let address = {
                let session = session_rx.borrow_and_update();
                session
                    .is_connected()
                    .then(|| session.address().map(String::from))
                    .flatten()
            };

            if let Some(ref address) = address
                && last_address.as_deref() != Some(address.as_str())
            {
                tokio::select! {
                    _ = self.refresh_balance(address) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            last_address = address;

            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!("Session reactor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{FakeApi, proposal};
    use crate::model::ProposalStatus;
    use crate::session::{MemorySessionStore, PersistedSessionRecord};
    use crate::wallet::{DEMO_ADDRESS, MockSigner};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn setup(record: PersistedSessionRecord) -> (Arc<FakeApi>, Arc<ProposalSynchronizer>) {
        let api = Arc::new(FakeApi::new());
        let session = SessionManager::initialize(
            Arc::new(MemorySessionStore::with_record(record)),
            Arc::new(MockSigner::new(Duration::from_millis(1))),
            api.clone(),
        );
        (api.clone(), Arc::new(ProposalSynchronizer::new(api, session)))
    }

    fn connected_record() -> PersistedSessionRecord {
        PersistedSessionRecord {
            connected: Some(true),
            address: Some(DEMO_ADDRESS.to_string()),
            chain_id: Some("1".to_string()),
            session_id: Some("session_9".to_string()),
        }
    }

    #[tokio::test]
    async fn fetch_replaces_and_failure_keeps() {
        let (api, sync) = setup(PersistedSessionRecord::default());
        *api.proposals.lock().unwrap() = vec![
            proposal("prop_001", ProposalStatus::Pending),
            proposal("prop_002", ProposalStatus::Funded),
        ];

        sync.fetch_pending_proposals().await.unwrap();
        let ids: Vec<_> = sync.proposals().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["prop_001".to_string()]);

        api.set_offline(true);
        assert!(sync.fetch_pending_proposals().await.is_err());
        assert_eq!(sync.proposals().len(), 1);
    }

    #[tokio::test]
    async fn approve_refetches_exactly_once() {
        let (api, sync) = setup(PersistedSessionRecord::default());
        *api.proposals.lock().unwrap() = vec![
            proposal("prop_001", ProposalStatus::Pending),
            proposal("prop_002", ProposalStatus::Pending),
        ];
        sync.fetch_pending_proposals().await.unwrap();

        assert!(sync.approve("prop_001").await);
        assert_eq!(api.calls("GET /proposals/pending"), 2);
        let ids: Vec<_> = sync.proposals().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["prop_002".to_string()]);

        assert!(sync.reject("prop_002").await);
        assert_eq!(api.calls("GET /proposals/pending"), 3);
        assert!(sync.proposals().is_empty());
    }

    #[tokio::test]
    async fn failed_decision_does_not_refetch() {
        let (api, sync) = setup(PersistedSessionRecord::default());

        assert!(!sync.approve("missing").await);
        assert!(!sync.reject("missing").await);
        assert_eq!(api.calls("GET /proposals/pending"), 0);
    }

    #[tokio::test]
    async fn treasury_is_kept_on_failure() {
        let (api, sync) = setup(PersistedSessionRecord::default());
        assert!(sync.fetch_treasury().await.is_err());
        assert_eq!(sync.treasury(), None);

        let treasury = Treasury {
            address: "0x16B3d93d02FB58f7aCe79157E74Eb275D2c3F734".to_string(),
            balance_eth: dec!(0.0012),
            contributor_agent_ids: BTreeSet::from(["A-01".to_string()]),
            last_updated: None,
            wallet_connected: false,
        };
        *api.treasury.lock().unwrap() = Some(treasury.clone());
        sync.fetch_treasury().await.unwrap();
        assert_eq!(sync.treasury(), Some(treasury.clone()));

        api.set_offline(true);
        assert!(sync.fetch_treasury().await.is_err());
        assert_eq!(sync.treasury(), Some(treasury));
    }

    #[tokio::test]
    async fn start_agent_is_fire_and_forget() {
        let (api, sync) = setup(PersistedSessionRecord::default());
        api.set_offline(true);
        sync.start_agent("A-01").await.unwrap();
        assert_eq!(api.calls("POST /agents/run"), 1);
    }

    #[tokio::test]
    async fn reactor_fetches_balance_for_connected_address() {
        let (api, sync) = setup(connected_record());
        *api.balance.lock().unwrap() = dec!(4.2);
        let cancel = CancellationToken::new();
        let mut session_rx = sync.session.subscribe();

        let handle = tokio::spawn(Arc::clone(&sync).run_session_reactor(cancel.clone()));
        tokio::time::timeout(
            Duration::from_secs(5),
            session_rx.wait_for(|s| s.balance_eth().is_some()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(sync.session.current().balance_eth(), Some(dec!(4.2)));
        assert_eq!(api.calls("GET /wallet/balance"), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn balance_for_stale_address_is_dropped() {
        let (api, sync) = setup(connected_record());
        *api.balance.lock().unwrap() = dec!(1);

        let applied = sync
            .refresh_balance("0x0000000000000000000000000000000000000001")
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(sync.session.current().balance_eth(), None);
    }
}
