//! Wallet signer seam.
//!
//! The signing protocol itself is opaque to MAYA: a signer hands out a
//! pairing URI, later reports which account approved the pairing, and
//! turns requests into a transaction hash or signature string.

mod mock;
mod transaction;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::WalletError;
use crate::model::WalletSession;

pub use self::mock::{DEMO_ADDRESS, DEMO_CHAIN_ID, MockSigner};
pub use self::transaction::{TransactionRequest, checksum_address, is_valid_address};

/// URI a wallet scans (usually rendered as a QR code) to pair with us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingUri(pub String);

impl PairingUri {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PairingUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account that approved a pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletApproval {
    pub address: String,
    pub chain_id: String,
}

/// A started pairing: the URI is available now, the approval later.
pub struct Pairing {
    pub uri: PairingUri,
    pub approval: BoxFuture<'static, Result<WalletApproval, WalletError>>,
}

impl std::fmt::Debug for Pairing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pairing")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

/// Signature or transaction hash that resolves once the wallet answers.
pub type PendingSignature = BoxFuture<'static, Result<String, WalletError>>;

/// External wallet that pairs with MAYA and signs on the user's behalf.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Start a pairing handshake.
    async fn pair(&self) -> Result<Pairing, WalletError>;

    /// Submit a transaction and return its hash.
    async fn send_transaction(
        &self,
        session: &WalletSession,
        request: &TransactionRequest,
    ) -> Result<String, WalletError>;

    /// Sign a transaction without broadcasting it.
    async fn sign_transaction(
        &self,
        session: &WalletSession,
        transaction: &serde_json::Value,
    ) -> Result<String, WalletError>;

    /// Sign EIP-712 typed data.
    async fn sign_typed_data(
        &self,
        session: &WalletSession,
        typed_data: &str,
    ) -> Result<String, WalletError>;
}
