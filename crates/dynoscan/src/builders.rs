use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::client::TableClient;
use crate::error::{Error, Result, StoreError};
use crate::scan::{self, Scan, ScanOptions};
use crate::store::Filter;
use crate::types::AttributeMap;

// ---------------------------------------------------------------------------
// GetItemBuilder
// ---------------------------------------------------------------------------

/// Builder for reading a single item.
pub struct GetItemBuilder<'a> {
    client: &'a TableClient,
    table: String,
    key: String,
    consistent_read: bool,
}

impl<'a> GetItemBuilder<'a> {
    pub(crate) fn new(client: &'a TableClient, table: String, key: String) -> Self {
        let consistent_read = client.config().consistent_reads;
        Self {
            client,
            table,
            key,
            consistent_read,
        }
    }

    /// Override the client's default read consistency for this request.
    pub fn consistent_read(mut self, consistent: bool) -> Self {
        self.consistent_read = consistent;
        self
    }

    /// Execute the read and return the raw attributes.
    pub async fn execute_raw(self) -> Result<AttributeMap> {
        let key = self.client.config().address(&self.key);
        let (handle, _) = self.client.resolve(&self.table).await?;

        handle
            .store
            .get_item(&handle.schema, &key, self.consistent_read)
            .await
            .map_err(|source| match source {
                StoreError::ItemNotFound => Error::ItemNotFound {
                    table: self.table.clone(),
                    key: self.key.clone(),
                },
                source => Error::Get {
                    table: self.table.clone(),
                    key: self.key.clone(),
                    source,
                },
            })
    }

    /// Execute the read and decode the item into `T`.
    pub async fn execute<T: DeserializeOwned>(self) -> Result<T> {
        let table = self.table.clone();
        let key = self.key.clone();
        let attrs = self.execute_raw().await?;
        serde_json::from_value(serde_json::Value::Object(attrs))
            .map_err(|source| Error::Unmarshal { table, key, source })
    }
}

// ---------------------------------------------------------------------------
// ScanBuilder
// ---------------------------------------------------------------------------

/// Builder for a segmented parallel scan of a whole table.
pub struct ScanBuilder<'a> {
    client: &'a TableClient,
    table: String,
    options: ScanOptions,
}

impl<'a> ScanBuilder<'a> {
    pub(crate) fn new(client: &'a TableClient, table: String) -> Self {
        Self {
            client,
            table,
            options: ScanOptions::default(),
        }
    }

    /// Replace all options at once.
    pub fn options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Throughput hint as a percent of provisioned capacity.
    pub fn max_throughput(mut self, percent: u8) -> Self {
        self.options.max_throughput_percent = percent;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.options.buffer_size = size;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.options.label = label.into();
        self
    }

    /// Fix the number of segments instead of deriving it from the table size.
    pub fn segments(mut self, n: usize) -> Self {
        self.options.segments = Some(n);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.options.filters.push(filter);
        self
    }

    /// Validate the options, resolve the table and start the workers.
    pub async fn execute(self, cancel: CancellationToken) -> Result<Scan> {
        scan::start(self.client.resolver(), cancel, &self.table, self.options).await
    }
}
