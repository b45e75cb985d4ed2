//! Wiring of the companion components and their background loops.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::{HttpMayaApi, MayaApi};
use crate::config::Config;
use crate::error::Error;
use crate::gate::DecisionGate;
use crate::proposals::ProposalSynchronizer;
use crate::session::{FileSessionStore, SessionManager, SessionStore};
use crate::telemetry::{LogPoller, MarkerParser};
use crate::wallet::{MockSigner, WalletSigner};

/// Owns one instance of every component.
///
/// `start()` launches the poller, the decision gate and the session
/// reactor under a shared [`CancellationToken`]; `shutdown()` cancels and
/// joins them.
pub struct MayaRuntime {
    config: Config,
    session: Arc<SessionManager>,
    poller: Arc<LogPoller>,
    proposals: Arc<ProposalSynchronizer>,
    gate: Arc<DecisionGate>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl MayaRuntime {
    /// Build the production stack: HTTP client, file-backed session store
    /// and the demo signer.
    pub fn build(config: Config) -> Result<Self, Error> {
        let api: Arc<dyn MayaApi> = Arc::new(HttpMayaApi::from_config(&config.api)?);
        let store: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::new(config.wallet.session_path.clone()));
        let signer: Arc<dyn WalletSigner> =
            Arc::new(MockSigner::new(config.wallet.approval_delay));
        Ok(Self::with_components(config, api, store, signer))
    }

    pub fn with_components(
        config: Config,
        api: Arc<dyn MayaApi>,
        store: Arc<dyn SessionStore>,
        signer: Arc<dyn WalletSigner>,
    ) -> Self {
        let session = SessionManager::initialize(store, signer, Arc::clone(&api));
        let poller = Arc::new(LogPoller::new(
            Arc::clone(&api),
            Arc::new(MarkerParser::default()),
            config.polling.interval,
        ));
        let proposals = Arc::new(ProposalSynchronizer::new(
            Arc::clone(&api),
            Arc::clone(&session),
        ));
        let gate = Arc::new(DecisionGate::new(
            api,
            Arc::clone(&poller),
            config.gate.agent_id.clone(),
        ));

        Self {
            config,
            session,
            poller,
            proposals,
            gate,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn poller(&self) -> &Arc<LogPoller> {
        &self.poller
    }

    pub fn proposals(&self) -> &Arc<ProposalSynchronizer> {
        &self.proposals
    }

    pub fn gate(&self) -> &Arc<DecisionGate> {
        &self.gate
    }

    /// Spawn the background loops and kick off the first proposal and
    /// treasury fetch. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }

        self.tasks
            .spawn(Arc::clone(&self.poller).run(self.cancel.clone()));
        self.tasks
            .spawn(Arc::clone(&self.gate).run(self.cancel.clone()));
        self.tasks.spawn(
            Arc::clone(&self.proposals).run_session_reactor(self.cancel.clone()),
        );

        let proposals = Arc::clone(&self.proposals);
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = async {
                    let _ = proposals.fetch_pending_proposals().await;
                    let _ = proposals.fetch_treasury().await;
                } => {}
                _ = cancel.cancelled() => {}
            }
        });

        tracing::info!(
            "MAYA runtime started against {}",
            self.config.api.base_url
        );
    }

    /// Cancel every loop and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Runtime task ended abnormally: {}", e);
            }
        }
        tracing::info!("MAYA runtime stopped");
    }
}
