//! In-process [`Store`] implementation.
//!
//! Items of each table live in a `BTreeMap` ordered by key. Segments are
//! assigned by hashing the partition key, so every item of one partition is
//! scanned by the same segment, and a partial scan evaluates at most
//! `page_size` items of its segment before handing back a continuation key.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use parking_lot::RwLock;
use xxhash_rust::xxh64::xxh64;

use crate::error::StoreError;
use crate::store::{PartialScan, ScanPage, Store};
use crate::types::{
    AttributeMap, Key, KeyDefinition, KeyRole, KeySchemaElement, KeyType, TableDescription,
    TableSchema,
};

/// Default number of items evaluated per partial scan call.
pub const DEFAULT_PAGE_SIZE: usize = 100;

struct MemoryTable {
    schema: TableSchema,
    items: BTreeMap<Key, AttributeMap>,
}

/// A thread-safe in-memory table store.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store whose partial scans evaluate at most `page_size` items.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Start building a new table.
    pub fn create_table(&self, name: &str) -> TableBuilder<'_> {
        TableBuilder {
            store: self,
            name: name.to_string(),
            partition_key: None,
            sort_key: None,
        }
    }

    pub fn drop_table(&self, name: &str) -> Result<(), StoreError> {
        self.tables
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of items currently stored in `table`.
    pub fn item_count(&self, table: &str) -> Result<usize, StoreError> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.items.len())
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    /// Segment that owns items with this partition key.
    ///
    /// # Panics
    ///
    /// Panics if `total_segments` is zero.
    pub fn segment_of(partition_key: &str, total_segments: usize) -> usize {
        debug_assert!(total_segments > 0, "total_segments must be at least 1");
        (xxh64(partition_key.as_bytes(), 0) % total_segments as u64) as usize
    }

    fn insert_table(&self, schema: TableSchema) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.contains_key(&schema.name) {
            return Err(StoreError::Backend(format!(
                "table already exists: {}",
                schema.name
            )));
        }
        tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema,
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

/// Builder for creating a table in a [`MemoryStore`].
pub struct TableBuilder<'a> {
    store: &'a MemoryStore,
    name: String,
    partition_key: Option<KeyDefinition>,
    sort_key: Option<KeyDefinition>,
}

impl TableBuilder<'_> {
    pub fn partition_key(mut self, name: &str, key_type: KeyType) -> Self {
        self.partition_key = Some(KeyDefinition::new(name, key_type));
        self
    }

    pub fn sort_key(mut self, name: &str, key_type: KeyType) -> Self {
        self.sort_key = Some(KeyDefinition::new(name, key_type));
        self
    }

    pub fn execute(self) -> Result<(), StoreError> {
        let partition_key = self
            .partition_key
            .ok_or_else(|| StoreError::Backend("partition key is required".to_string()))?;
        self.store.insert_table(TableSchema {
            name: self.name,
            partition_key,
            sort_key: self.sort_key,
        })
    }
}

fn describe(table: &MemoryTable) -> TableDescription {
    let schema = &table.schema;
    let mut key_schema = vec![KeySchemaElement {
        name: schema.partition_key.name.clone(),
        key_role: KeyRole::Hash,
    }];
    let mut attribute_definitions = vec![schema.partition_key.clone()];
    if let Some(sk) = &schema.sort_key {
        key_schema.push(KeySchemaElement {
            name: sk.name.clone(),
            key_role: KeyRole::Range,
        });
        attribute_definitions.push(sk.clone());
    }
    TableDescription {
        name: schema.name.clone(),
        item_count: table.items.len() as u64,
        key_schema,
        attribute_definitions,
    }
}

/// Canonical form of `key` for the table: typed, then read back as text.
fn normalize(schema: &TableSchema, key: &Key) -> Result<(Key, AttributeMap), StoreError> {
    let attrs = schema.key_attributes(key)?;
    Ok((schema.key_of(&attrs)?, attrs))
}

#[async_trait]
impl Store for MemoryStore {
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        self.tables
            .read()
            .get(table)
            .map(describe)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    async fn partial_scan(
        &self,
        table: &TableSchema,
        request: PartialScan,
    ) -> Result<ScanPage, StoreError> {
        if request.total_segments == 0 || request.segment >= request.total_segments {
            return Err(StoreError::Backend(format!(
                "invalid segment {} of {}",
                request.segment, request.total_segments
            )));
        }

        let tables = self.tables.read();
        let stored = tables
            .get(&table.name)
            .ok_or_else(|| StoreError::TableNotFound(table.name.clone()))?;

        let start = match &request.exclusive_start_key {
            Some(cursor) => Bound::Excluded(
                stored
                    .schema
                    .key_of(cursor)
                    .map_err(|e| StoreError::InvalidCursor(e.to_string()))?,
            ),
            None => Bound::Unbounded,
        };

        let mut segment_items = stored
            .items
            .range((start, Bound::Unbounded))
            .filter(|(key, _)| Self::segment_of(&key.hash, request.total_segments) == request.segment);

        let mut items = Vec::new();
        let mut last_evaluated: Option<&Key> = None;
        for (key, item) in segment_items.by_ref().take(self.page_size) {
            last_evaluated = Some(key);
            if request.filters.iter().all(|f| f.matches(item)) {
                items.push(item.clone());
            }
        }

        let last_evaluated_key = match (last_evaluated, segment_items.next()) {
            (Some(key), Some(_)) => Some(stored.schema.key_attributes(key)?),
            _ => None,
        };

        Ok(ScanPage {
            items,
            last_evaluated_key,
        })
    }

    async fn put_item(
        &self,
        table: &TableSchema,
        key: &Key,
        attributes: AttributeMap,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let stored = tables
            .get_mut(&table.name)
            .ok_or_else(|| StoreError::TableNotFound(table.name.clone()))?;

        let (key, key_attrs) = normalize(&stored.schema, key)?;
        let mut item = attributes;
        item.extend(key_attrs);
        stored.items.insert(key, item);
        Ok(())
    }

    async fn get_item(
        &self,
        table: &TableSchema,
        key: &Key,
        _consistent: bool,
    ) -> Result<AttributeMap, StoreError> {
        let tables = self.tables.read();
        let stored = tables
            .get(&table.name)
            .ok_or_else(|| StoreError::TableNotFound(table.name.clone()))?;

        let (key, _) = normalize(&stored.schema, key)?;
        stored
            .items
            .get(&key)
            .cloned()
            .ok_or(StoreError::ItemNotFound)
    }
}
