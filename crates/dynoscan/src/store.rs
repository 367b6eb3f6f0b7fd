//! The backing-store collaborator.
//!
//! Everything dynoscan does goes through the [`Store`] trait. Implementations
//! must support concurrent independent requests against the same table, since
//! scan workers share one store handle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::types::{AttributeMap, Cursor, Key, TableDescription, TableSchema};

/// One page request of a segmented scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialScan {
    /// Zero-based segment index, `< total_segments`.
    pub segment: usize,
    pub total_segments: usize,
    /// Resume after this key; `None` for the first page of the segment.
    pub exclusive_start_key: Option<Cursor>,
    /// Applied to evaluated items before they are returned.
    pub filters: Vec<Filter>,
    /// Throughput hint as a percentage of provisioned capacity, 0 = unset.
    pub max_throughput_percent: u8,
}

/// Result of one partial scan call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<AttributeMap>,
    /// Present when the segment has more items.
    pub last_evaluated_key: Option<Cursor>,
}

/// A simple attribute predicate evaluated by the store during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Equals { attribute: String, value: Value },
    Exists { attribute: String },
    NotExists { attribute: String },
    BeginsWith { attribute: String, prefix: String },
}

impl Filter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn exists(attribute: impl Into<String>) -> Self {
        Filter::Exists {
            attribute: attribute.into(),
        }
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Filter::NotExists {
            attribute: attribute.into(),
        }
    }

    pub fn begins_with(attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        Filter::BeginsWith {
            attribute: attribute.into(),
            prefix: prefix.into(),
        }
    }

    pub fn matches(&self, item: &AttributeMap) -> bool {
        match self {
            Filter::Equals { attribute, value } => item.get(attribute) == Some(value),
            Filter::Exists { attribute } => item.contains_key(attribute),
            Filter::NotExists { attribute } => !item.contains_key(attribute),
            Filter::BeginsWith { attribute, prefix } => item
                .get(attribute)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
        }
    }
}

/// Operations dynoscan needs from the underlying table store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Describe a physical table. Fails with `TableNotFound` or `AccessDenied`.
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError>;

    /// Fetch one page of one scan segment.
    async fn partial_scan(
        &self,
        table: &TableSchema,
        request: PartialScan,
    ) -> Result<ScanPage, StoreError>;

    /// Write an item. Key attributes are derived from `key` and override any
    /// attribute of the same name in `attributes`.
    async fn put_item(
        &self,
        table: &TableSchema,
        key: &Key,
        attributes: AttributeMap,
    ) -> Result<(), StoreError>;

    /// Read an item. Fails with `ItemNotFound` when nothing is stored under `key`.
    async fn get_item(
        &self,
        table: &TableSchema,
        key: &Key,
        consistent: bool,
    ) -> Result<AttributeMap, StoreError>;
}
