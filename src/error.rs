//! Error types for TallyChain

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The ledger has no blocks. Construction always seals genesis, so this
    /// indicates a bug rather than bad input.
    EmptyChain,
    InvalidTransactionPayload(String),
    /// A proof search was abandoned through its cancel flag. No chain mutation happened.
    CancelledMining,
    InvalidPeerChain(String),
    InvalidBlock(String),
    NetworkError(String),
    ConfigError(String),
    IoError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::EmptyChain => write!(f, "Chain is empty"),
            ChainError::InvalidTransactionPayload(msg) => {
                write!(f, "Invalid transaction payload: {}", msg)
            }
            ChainError::CancelledMining => write!(f, "Mining was cancelled"),
            ChainError::InvalidPeerChain(msg) => write!(f, "Invalid peer chain: {}", msg),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::InvalidTransactionPayload(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
