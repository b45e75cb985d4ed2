//! Demo signer that approves every pairing after a delay.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;

use super::{Pairing, PairingUri, TransactionRequest, WalletApproval, WalletSigner};
use crate::error::WalletError;
use crate::model::WalletSession;

/// Account the demo wallet approves with.
pub const DEMO_ADDRESS: &str = "0x1234567890123456789012345678901234567890";
/// Ethereum mainnet.
pub const DEMO_CHAIN_ID: &str = "1";

/// Simulated wallet.
///
/// Pairing returns a WalletConnect-style URI immediately and approves with
/// [`DEMO_ADDRESS`] once `approval_delay` has elapsed. Signing returns
/// random hashes and signatures of the right length.
#[derive(Debug)]
pub struct MockSigner {
    approval_delay: Duration,
    address: String,
    chain_id: String,
    rejection: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockSigner {
    pub fn new(approval_delay: Duration) -> Self {
        Self {
            approval_delay,
            address: DEMO_ADDRESS.to_string(),
            chain_id: DEMO_CHAIN_ID.to_string(),
            rejection: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// A signer whose user declines every pairing and signature.
    pub fn rejecting(approval_delay: Duration, reason: impl Into<String>) -> Self {
        let signer = Self::new(approval_delay);
        signer.set_rejection(Some(reason.into()));
        signer
    }

    pub fn set_rejection(&self, reason: Option<String>) {
        *self
            .rejection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = reason;
    }

    /// Number of signer operations attempted so far.
    pub fn signer_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn rejection(&self) -> Option<String> {
        self.rejection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn check(&self, session: &WalletSession) -> Result<(), WalletError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !session.is_connected() {
            return Err(WalletError::NotConnected);
        }
        match self.rejection() {
            Some(reason) => Err(WalletError::Rejected(reason)),
            None => Ok(()),
        }
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

#[async_trait]
impl WalletSigner for MockSigner {
    async fn pair(&self) -> Result<Pairing, WalletError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let uri = PairingUri(format!(
            "wc:{}@2?relay-protocol=irn&symKey={}",
            uuid::Uuid::new_v4().simple(),
            random_hex(32)
        ));

        let delay = self.approval_delay;
        let rejection = self.rejection();
        let approval = WalletApproval {
            address: self.address.clone(),
            chain_id: self.chain_id.clone(),
        };

        tracing::debug!("Mock wallet pairing started: {}", uri);
        Ok(Pairing {
            uri,
            approval: Box::pin(async move {
                tokio::time::sleep(delay).await;
                match rejection {
                    Some(reason) => Err(WalletError::Rejected(reason)),
                    None => Ok(approval),
                }
            }),
        })
    }

    async fn send_transaction(
        &self,
        session: &WalletSession,
        request: &TransactionRequest,
    ) -> Result<String, WalletError> {
        self.check(session)?;
        tracing::debug!("Mock wallet sending {} ETH to {}", request.value, request.to);
        Ok(format!("0x{}", random_hex(32)))
    }

    async fn sign_transaction(
        &self,
        session: &WalletSession,
        transaction: &serde_json::Value,
    ) -> Result<String, WalletError> {
        if !transaction.is_object() {
            return Err(WalletError::InvalidRequest(
                "transaction must be a JSON object".to_string(),
            ));
        }
        self.check(session)?;
        Ok(format!("0x{}", random_hex(65)))
    }

    async fn sign_typed_data(
        &self,
        session: &WalletSession,
        typed_data: &str,
    ) -> Result<String, WalletError> {
        serde_json::from_str::<serde_json::Value>(typed_data)
            .map_err(|e| WalletError::InvalidRequest(format!("typed data is not JSON: {e}")))?;
        self.check(session)?;
        Ok(format!("0x{}", random_hex(65)))
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
