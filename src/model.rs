//! Domain types shared by the session, telemetry and proposal components.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Current wallet-connection session.
///
/// Fields are private so a disconnected session can never carry
/// identifiers: the only constructors are [`WalletSession::disconnected`]
/// and [`WalletSession::connected`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalletSession {
    connected: bool,
    address: Option<String>,
    chain_id: Option<String>,
    session_id: Option<String>,
    balance_eth: Option<Decimal>,
}

impl WalletSession {
    /// The canonical disconnected value.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// A connected session. The balance is unknown until fetched.
    pub fn connected(
        address: impl Into<String>,
        chain_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            connected: true,
            address: Some(address.into()),
            chain_id: Some(chain_id.into()),
            session_id: Some(session_id.into()),
            balance_eth: None,
        }
    }

    /// Same session with a known balance. No-op on a disconnected session.
    pub fn with_balance(mut self, balance_eth: Decimal) -> Self {
        if self.connected {
            self.balance_eth = Some(balance_eth);
        }
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn balance_eth(&self) -> Option<Decimal> {
        self.balance_eth
    }
}

/// Lifecycle status of an agent proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    AwaitingApproval,
    Funded,
    Rejected,
    /// Any status this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl ProposalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Funded => "funded",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A funding proposal raised by an agent.
///
/// Agents publish either a revenue profile (`purpose` + expected monthly
/// revenue) or an ROI profile (`roi_hrs`), so the metadata is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub cost_eth: Decimal,
    #[serde(default)]
    pub expected_monthly_revenue_eth: Option<Decimal>,
    #[serde(default)]
    pub roi_hrs: Option<Decimal>,
    pub status: ProposalStatus,
}

/// Read-only treasury snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treasury {
    pub address: String,
    pub balance_eth: Decimal,
    #[serde(default, rename = "agents_contributed")]
    pub contributor_agent_ids: BTreeSet<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub wallet_connected: bool,
}

/// Parse a server timestamp.
///
/// The core emits both RFC 3339 and `YYYY-MM-DD HH:MM:SS` (UTC). Anything
/// else is treated as unknown.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn deserialize_lenient_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn disconnected_session_has_no_identifiers() {
        let session = WalletSession::disconnected();
        assert!(!session.is_connected());
        assert_eq!(session.address(), None);
        assert_eq!(session.chain_id(), None);
        assert_eq!(session.session_id(), None);
        assert_eq!(session, WalletSession::default());
    }

    #[test]
    fn balance_is_ignored_on_disconnected_session() {
        let session = WalletSession::disconnected().with_balance(dec!(1.5));
        assert_eq!(session.balance_eth(), None);

        let session = WalletSession::connected("0xabc", "1", "session_1").with_balance(dec!(1.5));
        assert_eq!(session.balance_eth(), Some(dec!(1.5)));
    }

    #[test]
    fn proposal_decodes_revenue_profile() {
        let proposal: Proposal = serde_json::from_value(serde_json::json!({
            "id": "prop_001",
            "agent_id": "A-01",
            "purpose": "Claim testnet ETH to bootstrap initial operations.",
            "cost_eth": 0.0,
            "expected_monthly_revenue_eth": 0.1,
            "status": "pending"
        }))
        .unwrap();

        assert_eq!(proposal.agent_id.as_deref(), Some("A-01"));
        assert_eq!(proposal.expected_monthly_revenue_eth, Some(dec!(0.1)));
        assert_eq!(proposal.status, ProposalStatus::Pending);
        assert_eq!(proposal.roi_hrs, None);
    }

    #[test]
    fn proposal_decodes_roi_profile_and_unknown_status() {
        let proposal: Proposal = serde_json::from_value(serde_json::json!({
            "id": "A-01",
            "cost_eth": 0,
            "roi_hrs": 0.42,
            "status": "archived"
        }))
        .unwrap();

        assert_eq!(proposal.roi_hrs, Some(dec!(0.42)));
        assert_eq!(proposal.status, ProposalStatus::Unknown);
    }

    #[test]
    fn treasury_accepts_minimal_payload() {
        let treasury: Treasury = serde_json::from_value(serde_json::json!({
            "address": "0x16B3d93d02FB58f7aCe79157E74Eb275D2c3F734",
            "balance_eth": 0.0012
        }))
        .unwrap();

        assert_eq!(treasury.balance_eth, dec!(0.0012));
        assert!(treasury.contributor_agent_ids.is_empty());
        assert_eq!(treasury.last_updated, None);
        assert!(!treasury.wallet_connected);
    }

    #[test]
    fn treasury_parses_both_timestamp_formats() {
        let treasury: Treasury = serde_json::from_value(serde_json::json!({
            "address": "0x1",
            "balance_eth": 1.5,
            "agents_contributed": ["A-01", "A-02", "A-01"],
            "last_updated": "2023-01-01T00:00:00Z",
            "wallet_connected": true
        }))
        .unwrap();
        assert_eq!(treasury.contributor_agent_ids.len(), 2);
        assert_eq!(
            treasury.last_updated,
            parse_timestamp("2023-01-01 00:00:00")
        );
        assert!(treasury.last_updated.is_some());
    }

    #[test]
    fn unparsable_timestamp_becomes_none() {
        assert_eq!(parse_timestamp("yesterday-ish"), None);
    }
}
