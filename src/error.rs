// Crate-wide error types

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors surfaced by ledger, storage, wallet and network operations.
///
/// Validation and consensus rejections are recovered locally (the offending
/// message is dropped); `CorruptStore` is fatal and must stop the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Transaction failed well-formedness or signature checks
    InvalidTransaction(String),
    /// Block rejected by consensus verification
    InvalidBlock(String),
    /// Peer announced an incompatible protocol version
    VersionMismatch { ours: u32, theirs: u32 },
    /// Persisted ledger failed its integrity digest on load
    CorruptStore(String),
    /// Address checksum did not match the recomputed value
    ChecksumMismatch,
    /// Address decoded to fewer bytes than a public key requires
    MalformedAddress(String),
    /// Socket-level failure; tears down the affected peer only
    Network(String),
    /// sled database errors
    Database(String),
    /// Encoding/decoding failures (JSON, wire frames)
    Serialization(String),
    /// File I/O errors
    Io(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidTransaction(msg) => write!(f, "invalid transaction: {msg}"),
            ChainError::InvalidBlock(msg) => write!(f, "invalid block: {msg}"),
            ChainError::VersionMismatch { ours, theirs } => {
                write!(f, "protocol version mismatch: ours {ours}, theirs {theirs}")
            }
            ChainError::CorruptStore(msg) => write!(f, "corrupt chain store: {msg}"),
            ChainError::ChecksumMismatch => write!(f, "address checksum mismatch"),
            ChainError::MalformedAddress(msg) => write!(f, "malformed address: {msg}"),
            ChainError::Network(msg) => write!(f, "network error: {msg}"),
            ChainError::Database(msg) => write!(f, "database error: {msg}"),
            ChainError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            ChainError::Io(msg) => write!(f, "i/o error: {msg}"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<sled::Error> for ChainError {
    fn from(err: sled::Error) -> Self {
        ChainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}
