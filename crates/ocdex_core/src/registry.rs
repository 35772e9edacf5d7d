//! Shared bot state: loaded characters, list threads, delegates and edit
//! leases.
//!
//! One [`Registry`] is built at startup and handed to every wizard and event
//! handler. Indices are concurrent maps, so readers never wait on a wizard.

use crate::catalog::Catalog;
use crate::character::Character;
use crate::store::{CHARACTERS, DocumentStore, ROLEPLAYERS};
use crate::{CoreError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// A row of the author to list thread table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roleplayer {
    pub author: u64,
    pub server: u64,
    pub thread: u64,
}

#[derive(Debug)]
pub struct Registry {
    catalog: Arc<Catalog>,
    store: Arc<dyn DocumentStore>,
    characters: DashMap<u64, Character>,
    threads: DashMap<u64, Roleplayer>,
    /// actor -> author they may edit for
    supporting: DashMap<u64, u64>,
    leases: Arc<Mutex<HashSet<u64>>>,
}

/// Exclusive right to edit one published character. Released on drop.
#[derive(Debug)]
pub struct EditLease {
    id: u64,
    leases: Arc<Mutex<HashSet<u64>>>,
}

impl EditLease {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for EditLease {
    fn drop(&mut self) {
        self.leases.lock().remove(&self.id);
        tracing::debug!(id = self.id, "edit lease released");
    }
}

impl Registry {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            catalog,
            store,
            characters: DashMap::new(),
            threads: DashMap::new(),
            supporting: DashMap::new(),
            leases: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Load every stored character and list thread. Documents that no longer
    /// decode against the catalog are skipped.
    pub async fn init(&self) -> Result<usize> {
        let start = std::time::Instant::now();
        let docs = self.store.find_many(CHARACTERS, &json!({})).await?;
        for doc in docs {
            match Character::from_document(doc, &self.catalog) {
                Ok(character) => match character.id {
                    Some(id) => {
                        self.characters.insert(id, character);
                    }
                    None => tracing::warn!("skipping stored character without id"),
                },
                Err(e) => tracing::warn!("skipping stored character: {}", e),
            }
        }

        for doc in self.store.find_many(ROLEPLAYERS, &json!({})).await? {
            match serde_json::from_value::<Roleplayer>(doc) {
                Ok(row) => {
                    self.threads.insert(row.author, row);
                }
                Err(e) => tracing::warn!("skipping roleplayer row: {}", e),
            }
        }

        tracing::info!(
            "Loaded {} characters and {} threads in {:?}",
            self.characters.len(),
            self.threads.len(),
            start.elapsed()
        );
        Ok(self.characters.len())
    }

    pub fn get(&self, id: u64) -> Option<Character> {
        self.characters.get(&id).map(|c| c.clone())
    }

    pub fn characters_of(&self, author: u64) -> Vec<Character> {
        let mut found: Vec<Character> = self
            .characters
            .iter()
            .filter(|c| c.author == author)
            .map(|c| c.clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn thread_of(&self, author: u64) -> Option<u64> {
        self.threads.get(&author).map(|row| row.thread)
    }

    /// Record an author's list thread
    pub async fn set_thread(&self, author: u64, server: u64, thread: u64) -> Result<()> {
        if self.thread_of(author) == Some(thread) {
            return Ok(());
        }
        let row = Roleplayer {
            author,
            server,
            thread,
        };
        let doc = serde_json::to_value(&row).map_err(|e| CoreError::MalformedDocument {
            collection: ROLEPLAYERS,
            cause: e,
        })?;
        self.store
            .replace_one(ROLEPLAYERS, &json!({ "author": author }), doc, true)
            .await?;
        self.threads.insert(author, row);
        Ok(())
    }

    /// Persist a committed character and index it. `previous` is the id it
    /// was stored under before being republished, if that changed.
    pub async fn save(&self, character: &Character, previous: Option<u64>) -> Result<u64> {
        let id = character.id.ok_or_else(|| {
            CoreError::invalid_transition("unpublished", "save character")
        })?;
        let filter_id = previous.unwrap_or(id);
        self.store
            .replace_one(
                CHARACTERS,
                &json!({ "id": filter_id }),
                character.to_document()?,
                true,
            )
            .await?;
        if filter_id != id {
            self.characters.remove(&filter_id);
        }
        self.characters.insert(id, character.clone());
        if let Some(thread) = character.thread {
            self.set_thread(character.author, character.server, thread)
                .await?;
        }
        tracing::debug!(id, name = %character.name, "character saved");
        Ok(id)
    }

    pub async fn remove(&self, id: u64) -> Result<Option<Character>> {
        self.store
            .delete_one(CHARACTERS, &json!({ "id": id }))
            .await?;
        Ok(self.characters.remove(&id).map(|(_, c)| c))
    }

    /// A published message went away. Either it was a character, or it
    /// started an author's list thread, in which case all of that author's
    /// characters go with it.
    pub async fn on_message_deleted(&self, message_id: u64) -> Result<Vec<u64>> {
        if self.characters.contains_key(&message_id) {
            self.remove(message_id).await?;
            tracing::info!(id = message_id, "character removed with its message");
            return Ok(vec![message_id]);
        }

        let author = self
            .threads
            .iter()
            .find(|row| row.thread == message_id)
            .map(|row| row.author);
        match author {
            Some(author) => self.forget_author(author).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn on_thread_deleted(&self, thread_id: u64) -> Result<Vec<u64>> {
        let mut removed: Vec<u64> = self
            .characters
            .iter()
            .filter(|c| c.thread == Some(thread_id))
            .map(|c| *c.key())
            .collect();
        for id in &removed {
            self.remove(*id).await?;
        }

        let author = self
            .threads
            .iter()
            .find(|row| row.thread == thread_id)
            .map(|row| row.author);
        if let Some(author) = author {
            removed.extend(self.forget_author(author).await?);
        }
        if !removed.is_empty() {
            tracing::info!(thread = thread_id, "removed {} characters", removed.len());
        }
        Ok(removed)
    }

    async fn forget_author(&self, author: u64) -> Result<Vec<u64>> {
        let ids: Vec<u64> = self
            .characters
            .iter()
            .filter(|c| c.author == author)
            .map(|c| *c.key())
            .collect();
        for id in &ids {
            self.remove(*id).await?;
        }
        self.store
            .delete_one(ROLEPLAYERS, &json!({ "author": author }))
            .await?;
        self.threads.remove(&author);
        tracing::info!(author, "list thread gone, removed {} characters", ids.len());
        Ok(ids)
    }

    pub fn add_supporting(&self, actor: u64, author: u64) {
        self.supporting.insert(actor, author);
    }

    pub fn remove_supporting(&self, actor: u64) -> Option<u64> {
        self.supporting.remove(&actor).map(|(_, author)| author)
    }

    /// The author `actor` is acting for
    pub fn acting_for(&self, actor: u64) -> u64 {
        self.supporting.get(&actor).map_or(actor, |a| *a)
    }

    pub fn ensure_owner(&self, actor: u64, character: &Character) -> Result<()> {
        if actor == character.author || self.acting_for(actor) == character.author {
            Ok(())
        } else {
            Err(CoreError::NotOwner {
                actor,
                author: character.author,
            })
        }
    }

    /// Take the edit lease on a published character
    pub fn lease(&self, character: &Character) -> Result<Option<EditLease>> {
        let Some(id) = character.id else {
            return Ok(None);
        };
        if !self.leases.lock().insert(id) {
            return Err(CoreError::RecordLocked {
                id,
                name: character.name.clone(),
            });
        }
        tracing::debug!(id, "edit lease taken");
        Ok(Some(EditLease {
            id,
            leases: Arc::clone(&self.leases),
        }))
    }

    pub fn is_leased(&self, id: u64) -> bool {
        self.leases.lock().contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::Species;
    use crate::store::MemoryStore;

    fn registry() -> Registry {
        Registry::new(
            Arc::new(Catalog::bundled().unwrap()),
            Arc::new(MemoryStore::new()),
        )
    }

    fn published(registry: &Registry, id: u64, author: u64, thread: u64) -> Character {
        let mut oc = Character::new(author, 1);
        oc.name = format!("oc-{id}");
        oc.assign_species(Species::Pokemon(
            registry.catalog().species("pikachu").unwrap(),
        ));
        oc.thread = Some(thread);
        oc.update(id);
        oc
    }

    #[tokio::test]
    async fn test_init_reloads_saved_state() {
        let first = registry();
        first.save(&published(&first, 10, 7, 70), None).await.unwrap();
        first.save(&published(&first, 11, 7, 70), None).await.unwrap();

        let second = Registry::new(Arc::clone(first.catalog()), Arc::clone(first.store()));
        assert_eq!(second.init().await.unwrap(), 2);
        assert_eq!(second.thread_of(7), Some(70));
        assert_eq!(second.characters_of(7).len(), 2);
    }

    #[tokio::test]
    async fn test_republish_moves_the_record() {
        let registry = registry();
        let mut oc = published(&registry, 10, 7, 70);
        registry.save(&oc, None).await.unwrap();

        oc.update(12);
        registry.save(&oc, Some(10)).await.unwrap();
        assert!(registry.get(10).is_none());
        assert_eq!(registry.get(12).unwrap().id, Some(12));
        let docs = registry
            .store()
            .find_many(CHARACTERS, &json!({}))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_list_thread_removes_author() {
        let registry = registry();
        registry.save(&published(&registry, 10, 7, 70), None).await.unwrap();
        registry.save(&published(&registry, 11, 7, 70), None).await.unwrap();
        registry.save(&published(&registry, 20, 8, 80), None).await.unwrap();

        let mut removed = registry.on_message_deleted(70).await.unwrap();
        removed.sort();
        assert_eq!(removed, vec![10, 11]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.thread_of(7), None);

        assert_eq!(registry.on_message_deleted(20).await.unwrap(), vec![20]);
        assert!(registry.on_message_deleted(999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_thread_deletion() {
        let registry = registry();
        registry.save(&published(&registry, 10, 7, 70), None).await.unwrap();
        let removed = registry.on_thread_deleted(70).await.unwrap();
        assert_eq!(removed, vec![10]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lease_is_exclusive_until_dropped() {
        let registry = registry();
        let oc = published(&registry, 10, 7, 70);

        let lease = registry.lease(&oc).unwrap().unwrap();
        assert_eq!(lease.id(), 10);
        let err = registry.lease(&oc).unwrap_err();
        assert!(matches!(err, CoreError::RecordLocked { id: 10, .. }));

        drop(lease);
        assert!(!registry.is_leased(10));
        assert!(registry.lease(&oc).unwrap().is_some());
        assert!(registry.lease(&Character::new(1, 1)).unwrap().is_none());
    }

    #[test]
    fn test_supporting_delegates() {
        let registry = registry();
        let oc = published(&registry, 10, 7, 70);
        assert!(registry.ensure_owner(7, &oc).is_ok());
        assert!(matches!(
            registry.ensure_owner(9, &oc),
            Err(CoreError::NotOwner { actor: 9, author: 7 })
        ));
        registry.add_supporting(9, 7);
        assert!(registry.ensure_owner(9, &oc).is_ok());
        assert_eq!(registry.remove_supporting(9), Some(7));
    }
}
