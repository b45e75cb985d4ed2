//! Request and response DTOs for the MAYA core API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::deserialize_lenient_timestamp;

// --- Proposals ---

#[derive(Debug, Serialize)]
pub struct ProposalDecisionRequest<'a> {
    pub proposal_id: &'a str,
}

// --- Agents ---

#[derive(Debug, Deserialize)]
pub struct LogResponse {
    #[serde(default)]
    pub logs: Option<Vec<String>>,
}

/// User answer to a "decision required" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentDecision {
    Continue,
    Terminate,
}

impl AgentDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Terminate => "terminate",
        }
    }
}

impl From<bool> for AgentDecision {
    fn from(keep_running: bool) -> Self {
        if keep_running {
            Self::Continue
        } else {
            Self::Terminate
        }
    }
}

impl std::fmt::Display for AgentDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Wallet ---

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WalletBalance {
    pub address: String,
    pub balance_eth: Decimal,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct WalletConnectRequest<'a> {
    pub address: &'a str,
    pub chain_id: &'a str,
}

/// Server acknowledgement of a wallet session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionRegistration {
    pub status: String,
    pub session_id: String,
    pub address: String,
}

/// Server view of a stored wallet session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteSessionInfo {
    pub address: String,
    pub chain_id: String,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub connected_at: Option<DateTime<Utc>>,
}
