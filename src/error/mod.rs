//! Error handling for the blockchain
//!
//! This module provides the error types shared by all engine operations.

use std::fmt;

/// Result type alias for blockchain operations
pub type Result<T> = std::result::Result<T, ChainError>;

/// Error types for blockchain operations
///
/// Validation outcomes (bad signature, hash mismatch, double spend, lower
/// accumulated difficulty) are not errors: validators return `false`/`None`
/// and log. These variants cover construction-time and infrastructure
/// failures that callers must handle.
#[derive(Debug, Clone)]
pub enum ChainError {
    /// Cryptographic operation errors
    Crypto(String),
    /// Peer messaging errors
    Network(String),
    /// Transaction construction errors
    Transaction(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Insufficient funds for transaction
    InsufficientFunds { required: u64, available: u64 },
    /// Block construction errors
    InvalidBlock(String),
    /// Mining errors
    Mining(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            ChainError::Network(msg) => write!(f, "Network error: {msg}"),
            ChainError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            ChainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            ChainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            ChainError::Io(msg) => write!(f, "I/O error: {msg}"),
            ChainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            ChainError::Mining(msg) => write!(f, "Mining error: {msg}"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for ChainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for ChainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        ChainError::Serialization(err.to_string())
    }
}
