//! Error types for the route orchestrator

use thiserror::Error;

/// Broad classification of failures, used by hosts to decide how to present them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Static data or configuration gap, never retried
    Configuration,
    /// The routing services found no path for the requested pair
    NoRoute,
    /// Pre-flight fee check failed before anything was broadcast
    InsufficientFunds,
    /// Wallet capability missing or signature refused
    Wallet,
    /// On-chain execution or packet relay failed
    Execution,
    /// Network or transport problem
    Network,
    /// Everything else
    Internal,
}

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain {chain_id} not found in registry")]
    ChainNotFound { chain_id: String },

    #[error("No fee token configured for chain {chain_id}")]
    MissingFeeToken { chain_id: String },

    #[error("No swap venue configured for chain {chain_id}")]
    MissingSwapVenue { chain_id: String },

    #[error("No EVM token address for {denom} on chain {chain_id}")]
    MissingEvmToken { chain_id: String, denom: String },

    #[error("No route found from {source_denom} on {source_chain} to {dest_denom} on {dest_chain}")]
    NoRoute {
        source_denom: String,
        source_chain: String,
        dest_denom: String,
        dest_chain: String,
    },

    #[error("No route found: no EVM swap path from {token_in} to {token_out} on chain {chain_id}")]
    NoSwapPath {
        chain_id: String,
        token_in: String,
        token_out: String,
    },

    #[error(
        "Insufficient fee token to initiate transfer on {chain_id}. Need {required} {denom}, but only have {available} {denom}."
    )]
    InsufficientFunds {
        chain_id: String,
        required: u128,
        available: u128,
        denom: String,
    },

    #[error("Unsupported wallet: {0}")]
    UnsupportedWallet(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Signing error on chain {chain_id}: {message}")]
    Signing { chain_id: String, message: String },

    #[error("Broadcast failed on chain {chain_id} (code {code}): {log}")]
    Broadcast {
        chain_id: String,
        code: u32,
        log: String,
    },

    #[error("Tracking error for tx {tx_hash}: {message}")]
    Tracking { tx_hash: String, message: String },

    #[error("{message}")]
    PacketError { code: i64, message: String },

    #[error("{message}")]
    StatusError { code: i64, message: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed with status {status}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("RPC error for chain {chain_id}: {message}")]
    Rpc { chain_id: String, message: String },

    #[error("All endpoints failed for chain {chain_id}")]
    AllEndpointsFailed { chain_id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwapError {
    /// Check if error is retryable
    ///
    /// Server-side (5xx) and rate-limit (429) responses are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            SwapError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            SwapError::Http(_)
            | SwapError::Rpc { .. }
            | SwapError::AllEndpointsFailed { .. }
            | SwapError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            SwapError::Config(_)
            | SwapError::ChainNotFound { .. }
            | SwapError::MissingFeeToken { .. }
            | SwapError::MissingSwapVenue { .. }
            | SwapError::MissingEvmToken { .. } => ErrorCategory::Configuration,
            SwapError::NoRoute { .. } | SwapError::NoSwapPath { .. } => ErrorCategory::NoRoute,
            SwapError::InsufficientFunds { .. } => ErrorCategory::InsufficientFunds,
            SwapError::UnsupportedWallet(_)
            | SwapError::Wallet(_)
            | SwapError::Signing { .. } => ErrorCategory::Wallet,
            SwapError::Broadcast { .. }
            | SwapError::Tracking { .. }
            | SwapError::PacketError { .. }
            | SwapError::StatusError { .. } => ErrorCategory::Execution,
            SwapError::Timeout { .. }
            | SwapError::Http(_)
            | SwapError::HttpStatus { .. }
            | SwapError::Rpc { .. }
            | SwapError::AllEndpointsFailed { .. } => ErrorCategory::Network,
            SwapError::Serialization(_) | SwapError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Human-readable text suitable for a transient UI notification
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => {
                format!("This route is not supported by the current configuration. {}", self)
            }
            ErrorCategory::Network => {
                format!("A network request failed, please try again. {}", self)
            }
            _ => self.to_string(),
        }
    }
}

/// Errors surfaced by wallet implementations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("wallet does not support {0}")]
    Unsupported(&'static str),

    #[error("no account for chain {0}")]
    NoAccount(String),

    #[error("signature rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

impl From<WalletError> for SwapError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Unsupported(what) => SwapError::UnsupportedWallet(what.to_string()),
            other => SwapError::Wallet(other.to_string()),
        }
    }
}

/// Result type for orchestrator operations
pub type SwapResult<T> = Result<T, SwapError>;

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
