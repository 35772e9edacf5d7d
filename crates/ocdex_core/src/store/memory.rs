//! In-process document store

use super::*;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>> {
        let filter = filter_entries(collection, filter)?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| matches(&filter, doc)).cloned()))
    }

    async fn find_many(&self, collection: &str, filter: &Value) -> Result<Vec<Value>> {
        let filter = filter_entries(collection, filter)?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches(&filter, doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Value,
        doc: Value,
        upsert: bool,
    ) -> Result<bool> {
        let filter = filter_entries(collection, filter)?;
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|existing| matches(&filter, existing)) {
            Some(existing) => {
                *existing = doc;
                Ok(true)
            }
            None if upsert => {
                docs.push(doc);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, collection: &str, filter: &Value) -> Result<bool> {
        let filter = filter_entries(collection, filter)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|doc| matches(&filter, doc)) {
            Some(idx) => {
                docs.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_one(&self, collection: &str, doc: Value) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }
}
