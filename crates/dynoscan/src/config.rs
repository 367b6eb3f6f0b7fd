//! Client configuration: region/endpoint, table-name transform, key mode and
//! read consistency.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::key::parse_data_key;
use crate::types::Key;

/// US-West-2 endpoint in Oregon.
pub const US_WEST_2: &str = "https://dynamodb.us-west-2.amazonaws.com";

/// Regions accepted by name.
pub const KNOWN_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "us-gov-west-1",
    "ca-central-1",
    "sa-east-1",
    "eu-west-1",
    "eu-west-2",
    "eu-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-south-1",
    "cn-north-1",
];

/// Where the backing store lives: a named region or a raw endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    Named(String),
    Endpoint(String),
}

impl Region {
    /// Parse a region name or endpoint URL.
    ///
    /// Anything containing `http` is treated as an endpoint URL and must be
    /// `http://` or `https://` followed by a host.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingRegion);
        }

        if raw.contains("http") {
            let rest = raw
                .strip_prefix("https://")
                .or_else(|| raw.strip_prefix("http://"))
                .ok_or_else(|| ConfigError::InvalidEndpoint(raw.to_string()))?;
            let host = rest.split('/').next().unwrap_or("");
            if host.is_empty() || host.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidEndpoint(raw.to_string()));
            }
            return Ok(Region::Endpoint(raw.trim_end_matches('/').to_string()));
        }

        if KNOWN_REGIONS.contains(&raw) {
            Ok(Region::Named(raw.to_string()))
        } else {
            Err(ConfigError::UnknownRegion(raw.to_string()))
        }
    }

    /// The endpoint URL requests are sent to.
    pub fn endpoint(&self) -> String {
        match self {
            Region::Endpoint(url) => url.clone(),
            Region::Named(name) if name.starts_with("cn-") => {
                format!("https://dynamodb.{name}.amazonaws.com.cn")
            }
            Region::Named(name) => format!("https://dynamodb.{name}.amazonaws.com"),
        }
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::parse(s)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Named(name) => f.write_str(name),
            Region::Endpoint(url) => f.write_str(url),
        }
    }
}

/// Maps a logical table name to the physical table name.
///
/// The store has a single namespace per account, so this is typically used
/// to add an environment prefix (`prod_users`, `test_users`).
#[derive(Clone)]
pub struct TableNameTransform(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl TableNameTransform {
    pub fn new(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Use the logical name unchanged.
    pub fn identity() -> Self {
        Self::new(|name| name.to_string())
    }

    /// Prepend `prefix` to every table name.
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(move |name| format!("{prefix}{name}"))
    }

    pub fn apply(&self, logical: &str) -> String {
        (self.0)(logical)
    }
}

impl Default for TableNameTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for TableNameTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TableNameTransform(..)")
    }
}

/// Validated client configuration. Build with [`Config::builder`].
#[derive(Debug, Clone)]
pub struct Config {
    pub region: Region,
    /// Split keys of the form `scope/id` into range and hash parts.
    pub compound_keys: bool,
    /// Default read consistency for point reads; overridable per request.
    pub consistent_reads: bool,
    pub table_name: TableNameTransform,
}

impl Config {
    pub fn builder(region: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(region.into())
    }

    /// Build a configuration from deserialized [`Settings`].
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let mut builder = Config::builder(settings.region)
            .compound_keys(settings.compound_keys)
            .consistent_reads(settings.consistent_reads);
        if let Some(prefix) = settings.table_prefix {
            builder = builder.table_prefix(prefix);
        }
        builder.build()
    }

    /// Address an application key according to the compound-key mode.
    pub fn address(&self, key: &str) -> Key {
        if self.compound_keys {
            parse_data_key(key).into_key()
        } else {
            Key::hash(key)
        }
    }

    pub fn physical_table_name(&self, logical: &str) -> String {
        self.table_name.apply(logical)
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    region: String,
    compound_keys: bool,
    consistent_reads: bool,
    table_name: TableNameTransform,
}

impl ConfigBuilder {
    fn new(region: String) -> Self {
        Self {
            region,
            compound_keys: false,
            consistent_reads: true,
            table_name: TableNameTransform::identity(),
        }
    }

    /// Enable `scope/id` compound keys. Default: off.
    pub fn compound_keys(mut self, enabled: bool) -> Self {
        self.compound_keys = enabled;
        self
    }

    /// Default consistent-read behaviour. Default: on.
    pub fn consistent_reads(mut self, enabled: bool) -> Self {
        self.consistent_reads = enabled;
        self
    }

    pub fn table_name(mut self, transform: TableNameTransform) -> Self {
        self.table_name = transform;
        self
    }

    pub fn table_prefix(self, prefix: impl Into<String>) -> Self {
        self.table_name(TableNameTransform::prefixed(prefix))
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        Ok(Config {
            region: Region::parse(&self.region)?,
            compound_keys: self.compound_keys,
            consistent_reads: self.consistent_reads,
            table_name: self.table_name,
        })
    }
}

/// Serializable configuration, e.g. loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub region: String,
    #[serde(default)]
    pub compound_keys: bool,
    #[serde(default = "default_consistent_reads")]
    pub consistent_reads: bool,
    #[serde(default)]
    pub table_prefix: Option<String>,
}

fn default_consistent_reads() -> bool {
    true
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Settings(e.to_string()))
    }
}
