//! Error types for resgpu

use thiserror::Error;

/// Main error type for resgpu
#[derive(Error, Debug)]
pub enum ResgpuError {
    /// A required node name was missing or empty
    #[error("Node name is empty")]
    EmptyNodeName,

    /// Node has no resource record
    #[error("Node not exists: {0}")]
    NodeNotExists(String),

    /// Node already has a resource record
    #[error("Node already exists: {0}")]
    NodeExists(String),

    /// A ledger entry has a non-positive count where a positive one is required
    #[error("Invalid product count: {0}")]
    InvalidProductCount(String),

    /// A ledger entry has a blank product name
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// Allocation could not satisfy a request
    #[error("Insufficient resource: {0}")]
    InsufficientResource(String),

    /// Store returned an unexpected number of records for a key
    #[error("Invalid record count: {0}")]
    InvalidRecordCount(String),

    /// Store backend error
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for resgpu operations
pub type ResgpuResult<T> = Result<T, ResgpuError>;

impl From<serde_json::Error> for ResgpuError {
    fn from(err: serde_json::Error) -> Self {
        ResgpuError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ResgpuError {
    fn from(err: toml::de::Error) -> Self {
        ResgpuError::Config(err.to_string())
    }
}
