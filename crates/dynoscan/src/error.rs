//! Error types for all dynoscan operations.

use thiserror::Error;

use crate::types::KeyType;

/// Top-level error type returned by the client, resolver and scan engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failure describing table '{table}' ('{physical}'): {source}")]
    Resolve {
        table: String,
        physical: String,
        #[source]
        source: StoreError,
    },

    #[error("failure getting primary key from table '{table}' ('{physical}'): {source}")]
    Schema {
        table: String,
        physical: String,
        #[source]
        source: SchemaError,
    },

    #[error("item '{table}:{key}' not found")]
    ItemNotFound { table: String, key: String },

    #[error("failed to marshal item '{table}:{key}': {reason}")]
    Marshal {
        table: String,
        key: String,
        reason: String,
    },

    #[error("failed to unmarshal item '{table}:{key}': {source}")]
    Unmarshal {
        table: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("put item failed for '{table}:{key}': {source}")]
    Put {
        table: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("get item failed for '{table}:{key}': {source}")]
    Get {
        table: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("scan of table '{table}' ('{physical}') failed in segment {segment}: {source}")]
    Segment {
        table: String,
        physical: String,
        segment: usize,
        #[source]
        source: StoreError,
    },

    #[error("scan worker for table '{table}' ('{physical}') aborted: {reason}")]
    SegmentAborted {
        table: String,
        physical: String,
        reason: String,
    },

    #[error("failed to decode item scanned from table '{table}': {source}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// True when a point read found no item under the requested key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ItemNotFound { .. })
    }
}

/// Invalid configuration or request options. Never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no region/endpoint specified")]
    MissingRegion,

    #[error("{0} is not a valid region")]
    UnknownRegion(String),

    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(String),

    #[error("max throughput must be a percentage between 0 and 100 (got {0})")]
    InvalidThroughput(u8),

    #[error("scan buffer size must be at least 1")]
    InvalidBufferSize,

    #[error("scan label cannot be empty")]
    EmptyLabel,

    #[error("segment count must be between 1 and {max} (got {actual})")]
    InvalidSegments { max: usize, actual: usize },

    #[error("malformed settings: {0}")]
    Settings(String),
}

/// A table description without a usable primary key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("no hash key in key schema")]
    MissingHashKey,

    #[error("key schema has more than one hash key")]
    DuplicateHashKey,

    #[error("key schema has more than one range key")]
    DuplicateRangeKey,

    #[error("no attribute definition for key attribute '{0}'")]
    MissingAttributeDefinition(String),
}

/// Failures reported by a [`Store`](crate::store::Store) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("item not found")]
    ItemNotFound,

    #[error("missing key attribute: {0}")]
    MissingKeyAttribute(String),

    #[error("key type mismatch for attribute '{name}': expected {expected:?}")]
    KeyTypeMismatch { name: String, expected: KeyType },

    #[error("invalid exclusive start key: {0}")]
    InvalidCursor(String),

    #[error("provisioned throughput exceeded")]
    Throttled,

    #[error("store error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;
