//! Key addressing: mapping an application key string to a structured key.

use crate::types::Key;

/// Separator between the scope (range) and id (hash) parts of a compound key.
pub const COMPOUND_SEPARATOR: char = '/';

/// The two halves of a compound key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyParts {
    /// Range-key value; empty when the key has no separator.
    pub scope: String,
    /// Hash-key value.
    pub id: String,
}

impl KeyParts {
    /// Convert to a store key. An empty scope means "no range key".
    pub fn into_key(self) -> Key {
        Key {
            hash: self.id,
            range: if self.scope.is_empty() {
                None
            } else {
                Some(self.scope)
            },
        }
    }
}

/// Split a compound key of the form `scope/id`.
///
/// - `"abc"` → scope `""`, id `"abc"`
/// - `"users/abc"` → scope `"users"`, id `"abc"`
/// - `"a/b/c"` → scope `"a"`, id `"b"`: only the text between the first and
///   second separator is the id, anything after a second separator is dropped.
pub fn parse_data_key(key: &str) -> KeyParts {
    let mut parts = key.split(COMPOUND_SEPARATOR);
    match (parts.next(), parts.next()) {
        (Some(scope), Some(id)) => KeyParts {
            scope: scope.to_string(),
            id: id.to_string(),
        },
        _ => KeyParts {
            scope: String::new(),
            id: key.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_without_separator() {
        for k in ["abc", "", "user-42", "a#b"] {
            let parts = parse_data_key(k);
            assert_eq!(parts.scope, "");
            assert_eq!(parts.id, k);
        }
    }

    #[test]
    fn test_key_with_scope() {
        let parts = parse_data_key("a/b");
        assert_eq!(parts.scope, "a");
        assert_eq!(parts.id, "b");
    }

    #[test]
    fn test_key_with_multiple_separators() {
        let parts = parse_data_key("a/b/c");
        assert_eq!(parts.scope, "a");
        assert_eq!(parts.id, "b");
        assert_ne!(parts.id, "b/c");
    }

    #[test]
    fn test_key_with_empty_halves() {
        assert_eq!(
            parse_data_key("/b"),
            KeyParts {
                scope: String::new(),
                id: "b".to_string()
            }
        );
        assert_eq!(
            parse_data_key("a/"),
            KeyParts {
                scope: "a".to_string(),
                id: String::new()
            }
        );
    }

    #[test]
    fn test_into_key() {
        assert_eq!(parse_data_key("abc").into_key(), Key::hash("abc"));
        assert_eq!(
            parse_data_key("2024/abc").into_key(),
            Key::with_range("abc", "2024")
        );
        assert_eq!(parse_data_key("/abc").into_key(), Key::hash("abc"));
    }
}
