//! Client side of the MAYA core HTTP API.
//!
//! Every component talks to the core through the [`MayaApi`] trait so the
//! session, telemetry and proposal logic can run against an in-process
//! fake in tests. [`HttpMayaApi`] is the production implementation.

mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{Proposal, Treasury};

pub use self::http::HttpMayaApi;
pub use self::types::{AgentDecision, RemoteSessionInfo, SessionRegistration, WalletBalance};

/// Operations the companion needs from the MAYA core.
#[async_trait]
pub trait MayaApi: Send + Sync {
    /// `GET /proposals/pending`
    async fn pending_proposals(&self) -> Result<Vec<Proposal>, ApiError>;

    /// `POST /proposals/approve`
    async fn approve_proposal(&self, proposal_id: &str) -> Result<Proposal, ApiError>;

    /// `POST /proposals/reject`
    async fn reject_proposal(&self, proposal_id: &str) -> Result<Proposal, ApiError>;

    /// `POST /agents/run`
    async fn start_agent(&self) -> Result<(), ApiError>;

    /// `GET /agents/logs`. A `null` log list is returned as empty.
    async fn agent_logs(&self) -> Result<Vec<String>, ApiError>;

    /// `GET /treasury`
    async fn treasury(&self) -> Result<Treasury, ApiError>;

    /// `GET /wallet/balance?address=`
    async fn wallet_balance(&self, address: &str) -> Result<WalletBalance, ApiError>;

    /// `POST /wallet/session/connect`
    async fn connect_session(
        &self,
        address: &str,
        chain_id: &str,
    ) -> Result<SessionRegistration, ApiError>;

    /// `POST /wallet/session/disconnect?session_id=`
    async fn disconnect_session(&self, session_id: &str) -> Result<(), ApiError>;

    /// `GET /wallet/session/{session_id}`
    async fn session_info(&self, session_id: &str) -> Result<RemoteSessionInfo, ApiError>;

    /// `POST /agents/decide?agent_id=&decision=`
    async fn submit_decision(&self, agent_id: &str, decision: AgentDecision)
    -> Result<(), ApiError>;
}
