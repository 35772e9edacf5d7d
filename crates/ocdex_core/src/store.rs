//! Persistence collaborator
//!
//! The wizards only need a handful of document operations keyed by simple
//! equality filters. This module provides:
//! - the [`DocumentStore`] trait
//! - an in-process [`MemoryStore`]
//! - a SurrealDB backed [`SurrealStore`] (in-memory or on-disk SurrealKV)

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

/// Published characters
pub const CHARACTERS: &str = "characters";
/// In-progress submissions
pub const DRAFTS: &str = "drafts";
/// NPC narration presets
pub const NPCS: &str = "npcs";
/// Author to character list thread
pub const ROLEPLAYERS: &str = "roleplayers";

#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error("Connection failed")]
    #[diagnostic(help("Check your database configuration and that the path is writable"))]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Query on {collection} failed")]
    #[diagnostic(help("Check the query syntax and table contents"))]
    QueryFailed {
        collection: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid filter for {collection}: {reason}")]
    #[diagnostic(help("Filters must be flat JSON objects keyed by plain field names"))]
    InvalidFilter { collection: String, reason: String },
}

impl StoreError {
    pub fn query_failed(
        collection: &str,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::QueryFailed {
            collection: collection.to_string(),
            cause: cause.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Document operations over named collections.
///
/// Filters are flat JSON objects; a document matches when every filter key
/// equals the document's value for that key.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>>;

    async fn find_many(&self, collection: &str, filter: &Value) -> Result<Vec<Value>>;

    /// Replace the first match. With `upsert`, insert when nothing matches.
    /// Returns whether a document was written.
    async fn replace_one(
        &self,
        collection: &str,
        filter: &Value,
        doc: Value,
        upsert: bool,
    ) -> Result<bool>;

    async fn delete_one(&self, collection: &str, filter: &Value) -> Result<bool>;

    async fn insert_one(&self, collection: &str, doc: Value) -> Result<()>;

    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<usize> {
        let mut removed = 0;
        while self.delete_one(collection, filter).await? {
            removed += 1;
        }
        Ok(removed)
    }
}

/// Configuration for storage backends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatabaseConfig {
    /// Process memory, nothing survives a restart
    #[default]
    Memory,
    /// SurrealDB in-memory engine
    SurrealMemory,
    /// SurrealDB on disk via SurrealKV
    Embedded {
        #[serde(default = "default_db_path")]
        path: String,
    },
}

fn default_db_path() -> String {
    "./ocdex.db".to_string()
}

pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>> {
    match config {
        DatabaseConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        DatabaseConfig::SurrealMemory => Ok(Arc::new(SurrealStore::connect("mem://").await?)),
        DatabaseConfig::Embedded { path } => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StoreError::ConnectionFailed(Box::new(e)))?;
                }
            }
            Ok(Arc::new(
                SurrealStore::connect(&format!("surrealkv://{path}")).await?,
            ))
        }
    }
}

/// Checks a filter is a flat object and returns its entries.
pub(crate) fn filter_entries<'a>(
    collection: &str,
    filter: &'a Value,
) -> Result<Vec<(&'a String, &'a Value)>> {
    let object = filter.as_object().ok_or_else(|| StoreError::InvalidFilter {
        collection: collection.to_string(),
        reason: "filter is not an object".to_string(),
    })?;
    object
        .iter()
        .map(|(key, value)| {
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(StoreError::InvalidFilter {
                    collection: collection.to_string(),
                    reason: format!("field name '{key}' is not allowed"),
                });
            }
            Ok((key, value))
        })
        .collect()
}

pub(crate) fn matches(filter: &[(&String, &Value)], doc: &Value) -> bool {
    filter
        .iter()
        .all(|(key, value)| doc.get(key.as_str()) == Some(*value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_rejects_odd_keys() {
        assert!(filter_entries("x", &json!({"author": 1})).is_ok());
        assert!(filter_entries("x", &json!({"doc.author": 1})).is_err());
        assert!(filter_entries("x", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_database_config_toml() {
        let config: DatabaseConfig = toml::from_str("type = \"embedded\"").unwrap();
        assert_eq!(
            config,
            DatabaseConfig::Embedded {
                path: "./ocdex.db".to_string()
            }
        );
    }
}
