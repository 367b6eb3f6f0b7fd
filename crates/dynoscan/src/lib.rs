//! # dynoscan
//!
//! A client-side access layer over a partitioned key-value table store
//! (hash key plus optional range key), with a segmented parallel scanner.
//!
//! Records are anything `serde` can encode as a map. They are addressed by a
//! single string key, or by a compound `scope/id` key when compound-key mode
//! is on. Whole tables are enumerated by running one worker per segment of
//! the key space and merging their pages into one bounded stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dynoscan::{Config, MemoryStore, ScanEvent, TableClient};
//! use dynoscan::types::KeyType;
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> dynoscan::Result<()> {
//! let store = MemoryStore::new();
//! store
//!     .create_table("users")
//!     .partition_key("id", KeyType::String)
//!     .execute()
//!     .unwrap();
//!
//! let config = Config::builder("us-west-2").build()?;
//! let client = TableClient::new(config, Arc::new(store));
//!
//! client.save("users", "alice", &json!({"name": "Alice"})).await?;
//! let user: serde_json::Value = client.get_item("users", "alice").execute().await?;
//! assert_eq!(user["name"], "Alice");
//!
//! let mut scan = client
//!     .scan("users")
//!     .buffer_size(100)
//!     .execute(CancellationToken::new())
//!     .await?;
//! while let Some(event) = scan.next().await {
//!     match event {
//!         ScanEvent::Item(item) => println!("{:?}", item.attributes()),
//!         ScanEvent::Error(e) => eprintln!("scan incomplete: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod builders;
pub mod client;
pub mod config;
pub mod error;
pub mod key;
pub mod memory;
pub mod scan;
pub mod store;
pub mod table;
pub mod types;

pub use client::TableClient;
pub use config::{Config, Region, Settings, TableNameTransform};
pub use error::{ConfigError, Error, Result, SchemaError, StoreError};
pub use memory::MemoryStore;
pub use scan::{Scan, ScanEvent, ScanItem, ScanOptions, ScanOutcome, ScanRequest};
pub use store::{Filter, PartialScan, ScanPage, Store};
pub use table::{Schema, TableHandle, TableResolver};
