//! In-process [`MayaApi`] used by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::MayaApi;
use super::types::{AgentDecision, RemoteSessionInfo, SessionRegistration, WalletBalance};
use crate::error::ApiError;
use crate::model::{Proposal, ProposalStatus, Treasury};

/// Programmable fake of the MAYA core.
///
/// Holds server-side state the way the real core does: approving or
/// rejecting a proposal changes its status, and the pending list only
/// returns `pending` proposals.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub proposals: Mutex<Vec<Proposal>>,
    pub logs: Mutex<Vec<String>>,
    pub treasury: Mutex<Option<Treasury>>,
    pub balance: Mutex<Decimal>,
    pub decisions: Mutex<Vec<(String, AgentDecision)>>,
    /// Every endpoint fails with a transport error while set.
    pub offline: AtomicBool,
    /// Only `/agents/decide` fails while set.
    pub reject_decisions: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
    sessions: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logs(lines: &[&str]) -> Self {
        let api = Self::new();
        api.set_logs(lines);
        api
    }

    pub fn set_logs(&self, lines: &[&str]) {
        *self.logs.lock().unwrap() = lines.iter().map(|l| l.to_string()).collect();
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == endpoint)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, endpoint: &'static str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(endpoint);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Network {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn decide(
        &self,
        endpoint: &'static str,
        proposal_id: &str,
        status: ProposalStatus,
    ) -> Result<Proposal, ApiError> {
        self.record(endpoint)?;
        let mut proposals = self.proposals.lock().unwrap();
        let proposal = proposals
            .iter_mut()
            .find(|p| p.id == proposal_id)
            .ok_or_else(|| ApiError::Server {
                endpoint: endpoint.to_string(),
                status: 404,
                body: r#"{"detail":"Proposal not found"}"#.to_string(),
            })?;
        proposal.status = status;
        Ok(proposal.clone())
    }
}

pub(crate) fn proposal(id: &str, status: ProposalStatus) -> Proposal {
    Proposal {
        id: id.to_string(),
        agent_id: Some("A-01".to_string()),
        purpose: Some(format!("purpose of {id}")),
        cost_eth: Decimal::ZERO,
        expected_monthly_revenue_eth: None,
        roi_hrs: None,
        status,
    }
}

#[async_trait]
impl MayaApi for FakeApi {
    async fn pending_proposals(&self) -> Result<Vec<Proposal>, ApiError> {
        self.record("GET /proposals/pending")?;
        Ok(self
            .proposals
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.status == ProposalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn approve_proposal(&self, proposal_id: &str) -> Result<Proposal, ApiError> {
        self.decide(
            "POST /proposals/approve",
            proposal_id,
            ProposalStatus::AwaitingApproval,
        )
    }

    async fn reject_proposal(&self, proposal_id: &str) -> Result<Proposal, ApiError> {
        self.decide(
            "POST /proposals/reject",
            proposal_id,
            ProposalStatus::Rejected,
        )
    }

    async fn start_agent(&self) -> Result<(), ApiError> {
        self.record("POST /agents/run")
    }

    async fn agent_logs(&self) -> Result<Vec<String>, ApiError> {
        self.record("GET /agents/logs")?;
        Ok(self.logs.lock().unwrap().clone())
    }

    async fn treasury(&self) -> Result<Treasury, ApiError> {
        self.record("GET /treasury")?;
        self.treasury
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Server {
                endpoint: "GET /treasury".to_string(),
                status: 500,
                body: "no treasury".to_string(),
            })
    }

    async fn wallet_balance(&self, address: &str) -> Result<WalletBalance, ApiError> {
        self.record("GET /wallet/balance")?;
        Ok(WalletBalance {
            address: address.to_string(),
            balance_eth: *self.balance.lock().unwrap(),
            last_updated: None,
        })
    }

    async fn connect_session(
        &self,
        address: &str,
        _chain_id: &str,
    ) -> Result<SessionRegistration, ApiError> {
        self.record("POST /wallet/session/connect")?;
        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionRegistration {
            status: "connected".to_string(),
            session_id: format!("session_{n}"),
            address: address.to_string(),
        })
    }

    async fn disconnect_session(&self, _session_id: &str) -> Result<(), ApiError> {
        self.record("POST /wallet/session/disconnect")
    }

    async fn session_info(&self, _session_id: &str) -> Result<RemoteSessionInfo, ApiError> {
        self.record("GET /wallet/session/{session_id}")?;
        Ok(RemoteSessionInfo {
            address: "0x0000000000000000000000000000000000000000".to_string(),
            chain_id: "1".to_string(),
            connected_at: None,
        })
    }

    async fn submit_decision(
        &self,
        agent_id: &str,
        decision: AgentDecision,
    ) -> Result<(), ApiError> {
        self.record("POST /agents/decide")?;
        if self.reject_decisions.load(Ordering::SeqCst) {
            return Err(ApiError::Server {
                endpoint: "POST /agents/decide".to_string(),
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        self.decisions
            .lock()
            .unwrap()
            .push((agent_id.to_string(), decision));
        Ok(())
    }
}
