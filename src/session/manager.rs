//! Owner of the single live [`WalletSession`].
//!
//! The manager is the only writer of both the published session and the
//! persisted record. Every change goes through [`SessionManager::transition`],
//! which persists first and then publishes the whole new value.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};

use super::store::{PersistedSessionRecord, SessionStore};
use crate::api::{MayaApi, RemoteSessionInfo};
use crate::error::WalletError;
use crate::model::WalletSession;
use crate::wallet::{
    PairingUri, PendingSignature, TransactionRequest, WalletApproval, WalletSigner,
};

const EVENT_CAPACITY: usize = 16;

/// Outcome of the asynchronous half of [`SessionManager::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectEvent {
    Established(WalletSession),
    Failed { reason: String },
}

/// Manages the wallet session: restore, connect, disconnect and signing.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    signer: Arc<dyn WalletSigner>,
    api: Arc<dyn MayaApi>,
    state: watch::Sender<WalletSession>,
    events: broadcast::Sender<ConnectEvent>,
    connecting: AtomicBool,
    /// Bumped by `disconnect()`; a completion from an older generation is dropped.
    generation: AtomicU64,
    /// Serializes persist-then-publish so the record and the watch agree.
    transition: Mutex<()>,
}

impl SessionManager {
    /// Create the manager and restore any persisted session.
    ///
    /// Restore reads the local record only; it makes no network call.
    pub fn initialize(
        store: Arc<dyn SessionStore>,
        signer: Arc<dyn WalletSigner>,
        api: Arc<dyn MayaApi>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(WalletSession::disconnected());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let manager = Arc::new(Self {
            store,
            signer,
            api,
            state,
            events,
            connecting: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            transition: Mutex::new(()),
        });
        manager.restore();
        manager
    }

    /// Re-read the persisted record and publish what it describes.
    ///
    /// Idempotent: with an unchanged record the published value does not
    /// change and subscribers are not woken.
    pub fn restore(&self) -> WalletSession {
        // Held across the load so a concurrent disconnect cannot be undone
        // by a stale record.
        let _guard = self.lock_transition();
        let restored = match self.store.load() {
            Ok(record) => match record.restore() {
                Some(session) => {
                    tracing::info!(
                        "Restored wallet session {} for {}",
                        session.session_id().unwrap_or_default(),
                        session.address().unwrap_or_default()
                    );
                    session
                }
                None => {
                    if !record.is_empty() {
                        tracing::debug!("Ignoring incomplete session record: {:?}", record);
                    }
                    WalletSession::disconnected()
                }
            },
            Err(e) => {
                tracing::warn!("Could not read session record, starting disconnected: {}", e);
                WalletSession::disconnected()
            }
        };

        self.state.send_if_modified(|current| {
            if same_identity(current, &restored) {
                return false;
            }
            *current = restored.clone();
            true
        });
        self.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn current(&self) -> WalletSession {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletSession> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectEvent> {
        self.events.subscribe()
    }

    /// Start pairing a wallet.
    ///
    /// Returns the pairing URI as soon as the signer produces it. Approval,
    /// server registration and persistence complete in the background and
    /// are reported on [`SessionManager::events`].
    pub async fn connect(self: &Arc<Self>) -> Result<PairingUri, WalletError> {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WalletError::ConnectInProgress);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let pairing = match self.signer.pair().await {
            Ok(pairing) => pairing,
            Err(e) => {
                self.connecting.store(false, Ordering::SeqCst);
                tracing::warn!("Wallet pairing failed: {}", e);
                return Err(match e {
                    WalletError::PairingFailed(reason) => WalletError::PairingFailed(reason),
                    other => WalletError::PairingFailed(other.to_string()),
                });
            }
        };

        tracing::info!("Wallet pairing started");
        let manager = Arc::clone(self);
        let approval = pairing.approval;
        tokio::spawn(async move {
            let outcome = match approval.await {
                Ok(approval) => manager.complete_connect(generation, approval).await,
                Err(e) => Err(e),
            };
            manager.connecting.store(false, Ordering::SeqCst);

            let event = match outcome {
                Ok(Some(session)) => ConnectEvent::Established(session),
                Ok(None) => ConnectEvent::Failed {
                    reason: "connection cancelled by disconnect".to_string(),
                },
                Err(e) => {
                    tracing::warn!("Wallet connection failed: {}", e);
                    ConnectEvent::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            // No receivers is fine.
            let _ = manager.events.send(event);
        });

        Ok(pairing.uri)
    }

    async fn complete_connect(
        &self,
        generation: u64,
        approval: WalletApproval,
    ) -> Result<Option<WalletSession>, WalletError> {
        let registration = self
            .api
            .connect_session(&approval.address, &approval.chain_id)
            .await?;

        let session = WalletSession::connected(
            approval.address,
            approval.chain_id,
            registration.session_id,
        );

        let current = {
            let _guard = self.lock_transition();
            let current = self.generation.load(Ordering::SeqCst) == generation;
            if current {
                self.store
                    .save(&PersistedSessionRecord::from_session(&session))?;
                self.state.send_replace(session.clone());
            }
            current
        };

        if !current {
            tracing::info!("Discarding wallet approval that raced a disconnect");
            let session_id = session.session_id().unwrap_or_default();
            if let Err(e) = self.api.disconnect_session(session_id).await {
                tracing::warn!("Releasing discarded session {} failed: {}", session_id, e);
            }
            return Ok(None);
        }
        tracing::info!(
            "Wallet connected: {} on chain {}",
            session.address().unwrap_or_default(),
            session.chain_id().unwrap_or_default()
        );
        Ok(Some(session))
    }

    /// Drop the session and clear the persisted record.
    ///
    /// The published value becomes disconnected even if clearing the store
    /// fails; the store error is still returned. The server is told about
    /// the disconnect afterwards, best-effort.
    pub async fn disconnect(&self) -> Result<(), WalletError> {
        let (previous, cleared) = {
            let _guard = self.lock_transition();
            self.generation.fetch_add(1, Ordering::SeqCst);
            let previous = self.state.send_replace(WalletSession::disconnected());
            (previous, self.store.clear())
        };

        if previous.is_connected() {
            tracing::info!("Wallet disconnected");
        }

        if let Some(session_id) = previous.session_id()
            && let Err(e) = self.api.disconnect_session(session_id).await
        {
            tracing::warn!("Remote disconnect for {} failed: {}", session_id, e);
        }

        cleared.map_err(WalletError::from)
    }

    /// Submit a transaction. Fails with `NotConnected` before anything is sent.
    pub fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<PendingSignature, WalletError> {
        let session = self.connected_session()?;
        let signer = Arc::clone(&self.signer);
        Ok(Box::pin(async move {
            signer.send_transaction(&session, &request).await
        }))
    }

    pub fn sign_transaction(
        &self,
        transaction: serde_json::Value,
    ) -> Result<PendingSignature, WalletError> {
        let session = self.connected_session()?;
        let signer = Arc::clone(&self.signer);
        Ok(Box::pin(async move {
            signer.sign_transaction(&session, &transaction).await
        }))
    }

    pub fn sign_typed_data(&self, typed_data: String) -> Result<PendingSignature, WalletError> {
        let session = self.connected_session()?;
        let signer = Arc::clone(&self.signer);
        Ok(Box::pin(async move {
            signer.sign_typed_data(&session, &typed_data).await
        }))
    }

    /// Record a fetched balance. Applied only while still connected to
    /// `address`; returns whether the session changed.
    pub fn apply_balance(&self, address: &str, balance_eth: Decimal) -> bool {
        self.state.send_if_modified(|session| {
            if !session.is_connected()
                || !session
                    .address()
                    .is_some_and(|a| a.eq_ignore_ascii_case(address))
                || session.balance_eth() == Some(balance_eth)
            {
                return false;
            }
            *session = session.clone().with_balance(balance_eth);
            true
        })
    }

    /// Look the current session up on the server. Never changes local state.
    pub async fn verify_remote(&self) -> Result<RemoteSessionInfo, WalletError> {
        let session = self.connected_session()?;
        let session_id = session.session_id().unwrap_or_default();
        let info = self.api.session_info(session_id).await?;
        if !info.address.eq_ignore_ascii_case(session.address().unwrap_or_default()) {
            tracing::warn!(
                "Server reports address {} for session {}, local record has {}",
                info.address,
                session_id,
                session.address().unwrap_or_default()
            );
        }
        Ok(info)
    }

    fn connected_session(&self) -> Result<WalletSession, WalletError> {
        let session = self.state.borrow();
        if session.is_connected() {
            Ok(session.clone())
        } else {
            Err(WalletError::NotConnected)
        }
    }

    fn lock_transition(&self) -> std::sync::MutexGuard<'_, ()> {
        self.transition
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Sessions match ignoring the fetched balance.
fn same_identity(a: &WalletSession, b: &WalletSession) -> bool {
    a.is_connected() == b.is_connected()
        && a.address() == b.address()
        && a.chain_id() == b.chain_id()
        && a.session_id() == b.session_id()
}
