//! Error types for MAYA.

/// Top-level error type for the companion core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the remote MAYA core API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    Network { endpoint: String, reason: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Server {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ApiError {
    /// Endpoint label the error was raised for (empty for URL errors).
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Network { endpoint, .. }
            | Self::Server { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
            Self::InvalidUrl { .. } => "",
        }
    }

    /// Whether the failure happened before the server produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Wallet session and signing errors.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("A wallet connection is already in progress")]
    ConnectInProgress,

    #[error("Failed to create pairing: {0}")]
    PairingFailed(String),

    #[error("Wallet rejected the request: {0}")]
    Rejected(String),

    #[error("Signer failure: {0}")]
    Signer(String),

    #[error("Invalid transaction request: {0}")]
    InvalidRequest(String),

    #[error("Session registration failed: {0}")]
    Registration(#[from] ApiError),

    #[error("Session persistence failed: {0}")]
    Store(#[from] StoreError),
}

/// Persistent session store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session store IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session store serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for the companion core.
pub type Result<T> = std::result::Result<T, Error>;
