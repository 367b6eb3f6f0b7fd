//! Core types: raw attributes, key definitions, table schemas and descriptions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{SchemaError, StoreError};

/// The store's native item representation: attribute name to JSON value.
pub type AttributeMap = Map<String, Value>;

/// Continuation key returned by a partial scan: the key attributes of the
/// last evaluated item. `None` on a page means the segment is exhausted.
pub type Cursor = AttributeMap;

/// The type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    String,
    Number,
}

/// A key attribute definition (name + type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyDefinition {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }

    /// Convert a textual key value to the attribute value stored for this key.
    pub fn to_value(&self, text: &str) -> Result<Value, StoreError> {
        match self.key_type {
            KeyType::String => Ok(Value::String(text.to_string())),
            KeyType::Number => {
                let number = match text.parse::<i64>() {
                    Ok(n) => Some(Number::from(n)),
                    Err(_) => text.parse::<f64>().ok().and_then(Number::from_f64),
                };
                number.map(Value::Number).ok_or_else(|| self.mismatch())
            }
        }
    }

    /// Canonical text of a stored key attribute value.
    pub fn to_text(&self, value: &Value) -> Result<String, StoreError> {
        match (self.key_type, value) {
            (KeyType::String, Value::String(s)) => Ok(s.clone()),
            (KeyType::Number, Value::Number(n)) => Ok(n.to_string()),
            _ => Err(self.mismatch()),
        }
    }

    fn mismatch(&self) -> StoreError {
        StoreError::KeyTypeMismatch {
            name: self.name.clone(),
            expected: self.key_type,
        }
    }
}

/// Role of an attribute in a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRole {
    Hash,
    Range,
}

/// One entry of a table description's key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchemaElement {
    pub name: String,
    pub key_role: KeyRole,
}

/// Table metadata as reported by `describe_table`.
///
/// `item_count` is refreshed by the store periodically and may be stale; it is
/// only ever used as a sizing hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    pub item_count: u64,
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<KeyDefinition>,
}

impl TableDescription {
    /// Build the table's primary key from its key schema.
    pub fn primary_key(&self) -> Result<TableSchema, SchemaError> {
        let mut hash: Option<&str> = None;
        let mut range: Option<&str> = None;
        for element in &self.key_schema {
            let slot = match element.key_role {
                KeyRole::Hash => &mut hash,
                KeyRole::Range => &mut range,
            };
            if slot.is_some() {
                return Err(match element.key_role {
                    KeyRole::Hash => SchemaError::DuplicateHashKey,
                    KeyRole::Range => SchemaError::DuplicateRangeKey,
                });
            }
            *slot = Some(element.name.as_str());
        }

        let hash = hash.ok_or(SchemaError::MissingHashKey)?;
        let partition_key = self.definition(hash)?;
        let sort_key = range.map(|name| self.definition(name)).transpose()?;
        Ok(TableSchema {
            name: self.name.clone(),
            partition_key,
            sort_key,
        })
    }

    fn definition(&self, name: &str) -> Result<KeyDefinition, SchemaError> {
        self.attribute_definitions
            .iter()
            .find(|def| def.name == name)
            .cloned()
            .ok_or_else(|| SchemaError::MissingAttributeDefinition(name.to_string()))
    }
}

/// Primary-key schema of a resolved (physical) table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub partition_key: KeyDefinition,
    pub sort_key: Option<KeyDefinition>,
}

impl TableSchema {
    /// Key attributes for `key`, typed according to the schema.
    pub fn key_attributes(&self, key: &Key) -> Result<AttributeMap, StoreError> {
        let mut attrs = AttributeMap::new();
        attrs.insert(
            self.partition_key.name.clone(),
            self.partition_key.to_value(&key.hash)?,
        );
        match (&self.sort_key, &key.range) {
            (Some(def), Some(range)) => {
                attrs.insert(def.name.clone(), def.to_value(range)?);
            }
            (Some(def), None) => return Err(StoreError::MissingKeyAttribute(def.name.clone())),
            // A range value on a hash-only table is ignored, like an empty scope.
            (None, _) => {}
        }
        Ok(attrs)
    }

    /// Recover the key of a stored item (or of a continuation key).
    pub fn key_of(&self, attrs: &AttributeMap) -> Result<Key, StoreError> {
        let hash = attrs
            .get(&self.partition_key.name)
            .ok_or_else(|| StoreError::MissingKeyAttribute(self.partition_key.name.clone()))
            .and_then(|v| self.partition_key.to_text(v))?;
        let range = match &self.sort_key {
            Some(def) => {
                let value = attrs
                    .get(&def.name)
                    .ok_or_else(|| StoreError::MissingKeyAttribute(def.name.clone()))?;
                Some(def.to_text(value)?)
            }
            None => None,
        };
        Ok(Key { hash, range })
    }
}

/// A structured item key: hash part plus optional range part.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub hash: String,
    pub range: Option<String>,
}

impl Key {
    pub fn hash(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            range: None,
        }
    }

    pub fn with_range(hash: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            range: Some(range.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn description(key_schema: Vec<KeySchemaElement>) -> TableDescription {
        TableDescription {
            name: "events".to_string(),
            item_count: 0,
            key_schema,
            attribute_definitions: vec![
                KeyDefinition::new("user", KeyType::String),
                KeyDefinition::new("ts", KeyType::Number),
            ],
        }
    }

    fn element(name: &str, key_role: KeyRole) -> KeySchemaElement {
        KeySchemaElement {
            name: name.to_string(),
            key_role,
        }
    }

    #[test]
    fn test_primary_key_hash_and_range() {
        let desc = description(vec![
            element("user", KeyRole::Hash),
            element("ts", KeyRole::Range),
        ]);
        let schema = desc.primary_key().unwrap();
        assert_eq!(schema.name, "events");
        assert_eq!(schema.partition_key.name, "user");
        assert_eq!(schema.sort_key.unwrap().key_type, KeyType::Number);
    }

    #[test]
    fn test_primary_key_requires_hash() {
        let desc = description(vec![element("ts", KeyRole::Range)]);
        assert_eq!(desc.primary_key(), Err(SchemaError::MissingHashKey));

        let desc = description(vec![]);
        assert_eq!(desc.primary_key(), Err(SchemaError::MissingHashKey));
    }

    #[test]
    fn test_primary_key_rejects_duplicates_and_undefined() {
        let desc = description(vec![
            element("user", KeyRole::Hash),
            element("ts", KeyRole::Hash),
        ]);
        assert_eq!(desc.primary_key(), Err(SchemaError::DuplicateHashKey));

        let desc = description(vec![element("missing", KeyRole::Hash)]);
        assert_eq!(
            desc.primary_key(),
            Err(SchemaError::MissingAttributeDefinition("missing".to_string()))
        );
    }

    #[test]
    fn test_key_attributes_typed() {
        let schema = description(vec![
            element("user", KeyRole::Hash),
            element("ts", KeyRole::Range),
        ])
        .primary_key()
        .unwrap();

        let attrs = schema.key_attributes(&Key::with_range("alice", "42")).unwrap();
        assert_eq!(attrs["user"], json!("alice"));
        assert_eq!(attrs["ts"], json!(42));
        assert_eq!(
            schema.key_of(&attrs).unwrap(),
            Key::with_range("alice", "42")
        );

        assert!(matches!(
            schema.key_attributes(&Key::with_range("alice", "soon")),
            Err(StoreError::KeyTypeMismatch { .. })
        ));
        assert_eq!(
            schema.key_attributes(&Key::hash("alice")),
            Err(StoreError::MissingKeyAttribute("ts".to_string()))
        );
    }
}
