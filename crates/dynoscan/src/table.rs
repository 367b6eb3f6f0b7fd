//! Table handle resolution: logical name → physical name → bound handle.

use std::sync::Arc;

use tracing::debug;

use crate::config::TableNameTransform;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::TableSchema;

/// A resolved table bound to the store it lives in.
///
/// Handles are created per call and never cached, so a schema change is
/// picked up by the next operation.
#[derive(Clone)]
pub struct TableHandle {
    pub logical_name: String,
    pub schema: TableSchema,
    pub store: Arc<dyn Store>,
}

impl TableHandle {
    /// Physical table name.
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

impl std::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("logical_name", &self.logical_name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Key layout of a table, by attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub table_name: String,
    pub key: String,
    pub range_key: Option<String>,
}

/// Resolves logical table names against a store.
#[derive(Clone)]
pub struct TableResolver {
    store: Arc<dyn Store>,
    table_name: TableNameTransform,
}

impl TableResolver {
    pub fn new(store: Arc<dyn Store>, table_name: TableNameTransform) -> Self {
        Self { store, table_name }
    }

    /// Resolve a logical table, returning the handle and the store's
    /// (possibly stale) item count.
    pub async fn resolve(&self, logical: &str) -> Result<(TableHandle, u64)> {
        let physical = self.table_name.apply(logical);
        let description = self
            .store
            .describe_table(&physical)
            .await
            .map_err(|source| Error::Resolve {
                table: logical.to_string(),
                physical: physical.clone(),
                source,
            })?;
        let schema = description
            .primary_key()
            .map_err(|source| Error::Schema {
                table: logical.to_string(),
                physical: physical.clone(),
                source,
            })?;
        debug!(
            table = %logical,
            physical = %physical,
            item_count = description.item_count,
            "resolved table"
        );

        Ok((
            TableHandle {
                logical_name: logical.to_string(),
                schema,
                store: Arc::clone(&self.store),
            },
            description.item_count,
        ))
    }

    /// Describe the key layout of a logical table.
    pub async fn schema(&self, logical: &str) -> Result<Schema> {
        let (handle, _) = self.resolve(logical).await?;
        Ok(Schema {
            table_name: handle.schema.name,
            key: handle.schema.partition_key.name,
            range_key: handle.schema.sort_key.map(|sk| sk.name),
        })
    }
}
