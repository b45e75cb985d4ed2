//! reqwest-backed [`MayaApi`] implementation.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::MayaApi;
use super::types::{
    AgentDecision, LogResponse, ProposalDecisionRequest, RemoteSessionInfo, SessionRegistration,
    WalletBalance, WalletConnectRequest,
};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::model::{Proposal, Treasury};

/// Error bodies are clipped to this many characters before they reach logs.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP client for the MAYA core.
#[derive(Debug, Clone)]
pub struct HttpMayaApi {
    client: Client,
    base_url: Url,
}

impl HttpMayaApi {
    /// Build a client for `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url, config.timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            })
    }

    async fn send(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Network {
                endpoint: endpoint.to_string(),
                reason: describe_transport_error(&e),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Server {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: clip(&body),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(endpoint, request).await?;
        let bytes = response.bytes().await.map_err(|e| ApiError::Network {
            endpoint: endpoint.to_string(),
            reason: describe_transport_error(&e),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MayaApi for HttpMayaApi {
    async fn pending_proposals(&self) -> Result<Vec<Proposal>, ApiError> {
        let url = self.url("proposals/pending")?;
        self.send_json("GET /proposals/pending", self.client.get(url))
            .await
    }

    async fn approve_proposal(&self, proposal_id: &str) -> Result<Proposal, ApiError> {
        let url = self.url("proposals/approve")?;
        let request = self
            .client
            .post(url)
            .json(&ProposalDecisionRequest { proposal_id });
        self.send_json("POST /proposals/approve", request).await
    }

    async fn reject_proposal(&self, proposal_id: &str) -> Result<Proposal, ApiError> {
        let url = self.url("proposals/reject")?;
        let request = self
            .client
            .post(url)
            .json(&ProposalDecisionRequest { proposal_id });
        self.send_json("POST /proposals/reject", request).await
    }

    async fn start_agent(&self) -> Result<(), ApiError> {
        let url = self.url("agents/run")?;
        self.send("POST /agents/run", self.client.post(url))
            .await
            .map(|_| ())
    }

    async fn agent_logs(&self) -> Result<Vec<String>, ApiError> {
        let url = self.url("agents/logs")?;
        let response: LogResponse = self
            .send_json("GET /agents/logs", self.client.get(url))
            .await?;
        Ok(response.logs.unwrap_or_default())
    }

    async fn treasury(&self) -> Result<Treasury, ApiError> {
        let url = self.url("treasury")?;
        self.send_json("GET /treasury", self.client.get(url)).await
    }

    async fn wallet_balance(&self, address: &str) -> Result<WalletBalance, ApiError> {
        let url = self.url("wallet/balance")?;
        let request = self.client.get(url).query(&[("address", address)]);
        self.send_json("GET /wallet/balance", request).await
    }

    async fn connect_session(
        &self,
        address: &str,
        chain_id: &str,
    ) -> Result<SessionRegistration, ApiError> {
        let url = self.url("wallet/session/connect")?;
        let request = self
            .client
            .post(url)
            .json(&WalletConnectRequest { address, chain_id });
        self.send_json("POST /wallet/session/connect", request)
            .await
    }

    async fn disconnect_session(&self, session_id: &str) -> Result<(), ApiError> {
        let url = self.url("wallet/session/disconnect")?;
        let request = self.client.post(url).query(&[("session_id", session_id)]);
        self.send("POST /wallet/session/disconnect", request)
            .await
            .map(|_| ())
    }

    async fn session_info(&self, session_id: &str) -> Result<RemoteSessionInfo, ApiError> {
        let url = self.url(&format!(
            "wallet/session/{}",
            urlencoding::encode(session_id)
        ))?;
        self.send_json("GET /wallet/session/{session_id}", self.client.get(url))
            .await
    }

    async fn submit_decision(
        &self,
        agent_id: &str,
        decision: AgentDecision,
    ) -> Result<(), ApiError> {
        let url = self.url("agents/decide")?;
        let request = self
            .client
            .post(url)
            .query(&[("agent_id", agent_id), ("decision", decision.as_str())]);
        self.send("POST /agents/decide", request).await.map(|_| ())
    }
}

/// Parse the base URL and make sure relative joins keep its path.
fn normalize_base_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|e| ApiError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return format!("timed out: {error}");
    }

    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<std::io::Error>() {
            return format!("{error} ({:?})", io_error.kind());
        }
        source = err.source();
    }
    error.to_string()
}

fn clip(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut clipped: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    clipped.push_str("...");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let api = HttpMayaApi::new("http://192.168.0.101:8000", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url().as_str(), "http://192.168.0.101:8000/");
        assert_eq!(
            api.url("agents/logs").unwrap().as_str(),
            "http://192.168.0.101:8000/agents/logs"
        );
    }

    #[test]
    fn base_url_path_prefix_is_preserved() {
        let api = HttpMayaApi::new("https://maya.example/core", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.url("proposals/pending").unwrap().as_str(),
            "https://maya.example/core/proposals/pending"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = HttpMayaApi::new("ftp://maya.example", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn long_error_bodies_are_clipped() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let clipped = clip(&body);
        assert!(clipped.ends_with("..."));
        assert_eq!(clipped.chars().count(), MAX_ERROR_BODY_CHARS + 3);
    }
}
