//! The [`TableClient`]: point reads, point writes and scans over one store.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::builders::{GetItemBuilder, ScanBuilder};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::table::{Schema, TableHandle, TableResolver};

/// Entry point for all table operations.
///
/// Every call resolves its table afresh through the configured name
/// transform; nothing is cached between calls.
pub struct TableClient {
    config: Config,
    resolver: TableResolver,
}

impl TableClient {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let resolver = TableResolver::new(store, config.table_name.clone());
        Self { config, resolver }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Endpoint URL of the configured region.
    pub fn endpoint(&self) -> String {
        self.config.region.endpoint()
    }

    pub fn resolver(&self) -> &TableResolver {
        &self.resolver
    }

    /// Resolve a logical table to a handle plus its item-count estimate.
    pub async fn resolve(&self, table: &str) -> Result<(TableHandle, u64)> {
        self.resolver.resolve(table).await
    }

    /// Key layout of a logical table.
    pub async fn table_schema(&self, table: &str) -> Result<Schema> {
        self.resolver.schema(table).await
    }

    /// Store `value` under `key`, replacing any previous item.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        table: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let marshal_error = |reason: String| Error::Marshal {
            table: table.to_string(),
            key: key.to_string(),
            reason,
        };
        let encoded = serde_json::to_value(value).map_err(|e| marshal_error(e.to_string()))?;
        let attrs = match encoded {
            Value::Object(attrs) => attrs,
            other => {
                return Err(marshal_error(format!(
                    "value must encode to a map of attributes, got {}",
                    json_kind(&other)
                )));
            }
        };

        let (handle, _) = self.resolve(table).await?;
        let item_key = self.config.address(key);
        handle
            .store
            .put_item(&handle.schema, &item_key, attrs)
            .await
            .map_err(|source| Error::Put {
                table: table.to_string(),
                key: key.to_string(),
                source,
            })
    }

    /// Read the item stored under `key`.
    pub fn get_item(&self, table: &str, key: &str) -> GetItemBuilder<'_> {
        GetItemBuilder::new(self, table.to_string(), key.to_string())
    }

    /// Scan every item of `table` with parallel segment workers.
    pub fn scan(&self, table: &str) -> ScanBuilder<'_> {
        ScanBuilder::new(self, table.to_string())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
