//! SurrealDB document store
//!
//! Each collection maps to a table. Documents live under a `doc` field so
//! their own `id` never collides with the record id.

use super::*;
use surrealdb::engine::any::{self, Any};
use surrealdb::{RecordId, Surreal};

#[derive(Debug, Clone)]
pub struct SurrealStore {
    client: Surreal<Any>,
}

impl SurrealStore {
    /// Connect to an endpoint such as `mem://` or `surrealkv://path`
    pub async fn connect(endpoint: &str) -> Result<Self> {
        tracing::info!("Connecting to document store at: {}", endpoint);
        let connect_start = std::time::Instant::now();
        let client = any::connect(endpoint)
            .await
            .map_err(|e| StoreError::ConnectionFailed(Box::new(e)))?;

        client
            .use_ns("ocdex")
            .use_db("main")
            .await
            .map_err(|e| StoreError::ConnectionFailed(Box::new(e)))?;
        tracing::info!(
            "Document store connection established in {:?}",
            connect_start.elapsed()
        );

        Ok(Self { client })
    }

    /// Builds the `WHERE` clause and its bindings for a filter
    fn condition(
        collection: &str,
        filter: &Value,
    ) -> Result<(String, Vec<(String, Value)>)> {
        let entries = filter_entries(collection, filter)?;
        if entries.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut clauses = Vec::with_capacity(entries.len());
        let mut params = Vec::with_capacity(entries.len());
        for (idx, (key, value)) in entries.into_iter().enumerate() {
            clauses.push(format!("doc.{} = $p{}", key, idx));
            params.push((format!("p{}", idx), value.clone()));
        }
        Ok((format!(" WHERE {}", clauses.join(" AND ")), params))
    }

    async fn select(&self, collection: &str, filter: &Value, limit: Option<usize>) -> Result<Vec<Value>> {
        let (condition, params) = Self::condition(collection, filter)?;
        let mut query = format!("SELECT VALUE doc FROM type::table($tb){}", condition);
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut surrealdb_query = self.client.query(query).bind(("tb", collection.to_string()));
        for (name, value) in params {
            surrealdb_query = surrealdb_query.bind((name, value));
        }

        let mut response = surrealdb_query
            .await
            .map_err(|e| StoreError::query_failed(collection, e))?;
        let docs: Vec<Value> = response
            .take(0)
            .map_err(|e| StoreError::query_failed(collection, e))?;
        Ok(docs)
    }

    async fn first_record(&self, collection: &str, filter: &Value) -> Result<Option<RecordId>> {
        let (condition, params) = Self::condition(collection, filter)?;
        let query = format!(
            "SELECT VALUE id FROM type::table($tb){} LIMIT 1",
            condition
        );

        let mut surrealdb_query = self.client.query(query).bind(("tb", collection.to_string()));
        for (name, value) in params {
            surrealdb_query = surrealdb_query.bind((name, value));
        }

        let mut response = surrealdb_query
            .await
            .map_err(|e| StoreError::query_failed(collection, e))?;
        let ids: Vec<RecordId> = response
            .take(0)
            .map_err(|e| StoreError::query_failed(collection, e))?;
        Ok(ids.into_iter().next())
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>> {
        Ok(self
            .select(collection, filter, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn find_many(&self, collection: &str, filter: &Value) -> Result<Vec<Value>> {
        self.select(collection, filter, None).await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Value,
        doc: Value,
        upsert: bool,
    ) -> Result<bool> {
        match self.first_record(collection, filter).await? {
            Some(record) => {
                self.client
                    .query("UPDATE $record SET doc = $doc")
                    .bind(("record", record))
                    .bind(("doc", doc))
                    .await
                    .map_err(|e| StoreError::query_failed(collection, e))?
                    .check()
                    .map_err(|e| StoreError::query_failed(collection, e))?;
                Ok(true)
            }
            None if upsert => {
                self.insert_one(collection, doc).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, collection: &str, filter: &Value) -> Result<bool> {
        let Some(record) = self.first_record(collection, filter).await? else {
            return Ok(false);
        };
        self.client
            .query("DELETE $record")
            .bind(("record", record))
            .await
            .map_err(|e| StoreError::query_failed(collection, e))?
            .check()
            .map_err(|e| StoreError::query_failed(collection, e))?;
        Ok(true)
    }

    async fn insert_one(&self, collection: &str, doc: Value) -> Result<()> {
        self.client
            .query("CREATE type::table($tb) SET doc = $doc")
            .bind(("tb", collection.to_string()))
            .bind(("doc", doc))
            .await
            .map_err(|e| StoreError::query_failed(collection, e))?
            .check()
            .map_err(|e| StoreError::query_failed(collection, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_engine_round_trip() {
        let store = SurrealStore::connect("mem://").await.unwrap();
        let filter = json!({"id": 42});

        store
            .replace_one(CHARACTERS, &filter, json!({"id": 42, "name": "Ash"}), true)
            .await
            .unwrap();
        store
            .replace_one(CHARACTERS, &filter, json!({"id": 42, "name": "Red"}), true)
            .await
            .unwrap();

        let docs = store.find_many(CHARACTERS, &json!({})).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], "Red");

        assert!(store.delete_one(CHARACTERS, &filter).await.unwrap());
        assert!(store.find_one(CHARACTERS, &filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_embedded_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db").to_string_lossy().to_string();

        let store = connect(&DatabaseConfig::Embedded { path }).await.unwrap();
        store
            .insert_one(ROLEPLAYERS, json!({"author": 1, "thread": 2}))
            .await
            .unwrap();
        let doc = store
            .find_one(ROLEPLAYERS, &json!({"author": 1}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["thread"], 2);
    }
}
