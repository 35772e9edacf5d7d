//! NPC presets: named personas a user narrates as by wrapping a message in
//! one of the preset's prefixes.

use crate::id::NpcId;
use crate::store::{DocumentStore, NPCS};
use crate::{CoreError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Placeholder separating the two halves of a prefix pattern, as in `[text]`
pub const PREFIX_PLACEHOLDER: &str = "text";

/// Webhook display names are capped by the platform
pub const NAME_LIMIT: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    pub id: NpcId,
    pub author: u64,
    pub server: u64,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    /// (start, end) pairs a message must be wrapped in
    #[serde(default)]
    pub prefixes: BTreeSet<(String, String)>,
    pub created_at: DateTime<Utc>,
}

/// What toggling a prefix did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixChange {
    Added,
    Removed,
}

impl Npc {
    pub fn new(author: u64, server: u64, name: impl Into<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() || name.chars().count() > NAME_LIMIT {
            return Err(CoreError::input_failed(
                "NPC name",
                format!("names must be 1 to {NAME_LIMIT} characters"),
            ));
        }
        Ok(Self {
            id: NpcId::generate(),
            author,
            server,
            name,
            image: None,
            prefixes: BTreeSet::new(),
            created_at: Utc::now(),
        })
    }

    /// Split a pattern such as `npc:text` or `[text]` around the
    /// placeholder. A pattern without it is a plain start marker.
    pub fn parse_prefix(pattern: &str) -> Option<(String, String)> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == PREFIX_PLACEHOLDER {
            return None;
        }
        match pattern.split_once(PREFIX_PLACEHOLDER) {
            Some((start, end)) => Some((start.to_string(), end.to_string())),
            None => Some((pattern.to_string(), String::new())),
        }
    }

    /// Add the prefix, or remove it when the NPC already has it
    pub fn toggle_prefix(&mut self, prefix: (String, String)) -> PrefixChange {
        if self.prefixes.remove(&prefix) {
            PrefixChange::Removed
        } else {
            self.prefixes.insert(prefix);
            PrefixChange::Added
        }
    }

    /// Prefixes rendered back into their `start text end` form
    pub fn prefix_patterns(&self) -> Vec<String> {
        self.prefixes
            .iter()
            .map(|(start, end)| format!("{start}{PREFIX_PLACEHOLDER}{end}"))
            .collect()
    }

    /// The narration inside `content` when it is wrapped in one of the
    /// prefixes. The longest matching prefix wins.
    pub fn strip(&self, content: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(start, end)| {
                content.len() >= start.len() + end.len()
                    && content.starts_with(start.as_str())
                    && content.ends_with(end.as_str())
            })
            .max_by_key(|(start, end)| start.len() + end.len())
            .map(|(start, end)| content[start.len()..content.len() - end.len()].trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}

/// Stored NPC presets, cached per author
#[derive(Debug)]
pub struct NpcBook {
    store: Arc<dyn DocumentStore>,
    by_author: DashMap<u64, Vec<Npc>>,
}

impl NpcBook {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            by_author: DashMap::new(),
        }
    }

    pub async fn init(&self) -> Result<usize> {
        let mut loaded = 0;
        for doc in self.store.find_many(NPCS, &json!({})).await? {
            match serde_json::from_value::<Npc>(doc) {
                Ok(npc) => {
                    self.by_author.entry(npc.author).or_default().push(npc);
                    loaded += 1;
                }
                Err(e) => tracing::warn!("skipping stored npc: {}", e),
            }
        }
        tracing::debug!(loaded, "npc presets loaded");
        Ok(loaded)
    }

    pub fn list(&self, author: u64) -> Vec<Npc> {
        let mut npcs = self
            .by_author
            .get(&author)
            .map(|npcs| npcs.clone())
            .unwrap_or_default();
        npcs.sort_by(|a, b| a.name.cmp(&b.name));
        npcs
    }

    /// An author's preset by name, ignoring case
    pub fn find(&self, author: u64, name: &str) -> Option<Npc> {
        self.by_author.get(&author).and_then(|npcs| {
            npcs.iter()
                .find(|npc| npc.name.eq_ignore_ascii_case(name.trim()))
                .cloned()
        })
    }

    /// The preset whose prefixes wrap `content`, with the narration text
    pub fn proxy_target(&self, author: u64, content: &str) -> Option<(Npc, String)> {
        let npcs = self.by_author.get(&author)?;
        npcs.iter()
            .find_map(|npc| npc.strip(content).map(|text| (npc.clone(), text)))
    }

    pub async fn save(&self, npc: &Npc) -> Result<()> {
        let doc = serde_json::to_value(npc).map_err(|e| CoreError::MalformedDocument {
            collection: NPCS,
            cause: e,
        })?;
        self.store
            .replace_one(NPCS, &json!({ "id": npc.id }), doc, true)
            .await?;

        let mut npcs = self.by_author.entry(npc.author).or_default();
        match npcs.iter_mut().find(|existing| existing.id == npc.id) {
            Some(existing) => *existing = npc.clone(),
            None => npcs.push(npc.clone()),
        }
        Ok(())
    }

    pub async fn delete(&self, npc: &Npc) -> Result<bool> {
        let removed = self
            .store
            .delete_one(NPCS, &json!({ "id": npc.id }))
            .await?;
        if let Some(mut npcs) = self.by_author.get_mut(&npc.author) {
            npcs.retain(|existing| existing.id != npc.id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn narrator() -> Npc {
        let mut npc = Npc::new(7, 1, "Officer Jenny").unwrap();
        npc.toggle_prefix(Npc::parse_prefix("jenny:text").unwrap());
        npc.toggle_prefix(Npc::parse_prefix("[text]").unwrap());
        npc
    }

    #[test]
    fn test_parse_prefix() {
        assert_eq!(
            Npc::parse_prefix("[text]"),
            Some(("[".to_string(), "]".to_string()))
        );
        assert_eq!(
            Npc::parse_prefix("j>"),
            Some(("j>".to_string(), String::new()))
        );
        assert_eq!(Npc::parse_prefix("text"), None);
        assert_eq!(Npc::parse_prefix("  "), None);
    }

    #[test]
    fn test_strip_wrapped_message() {
        let npc = narrator();
        assert_eq!(npc.strip("jenny: Halt!"), Some("Halt!".to_string()));
        assert_eq!(npc.strip("[Halt!]"), Some("Halt!".to_string()));
        assert_eq!(npc.strip("Halt!"), None);
        assert_eq!(npc.strip("[]"), None);
        assert_eq!(npc.strip("["), None);
    }

    #[test]
    fn test_toggle_prefix_removes_existing() {
        let mut npc = narrator();
        let change = npc.toggle_prefix(("[".to_string(), "]".to_string()));
        assert_eq!(change, PrefixChange::Removed);
        assert_eq!(npc.prefix_patterns(), vec!["jenny:text".to_string()]);
    }

    #[test]
    fn test_name_limits() {
        assert!(Npc::new(1, 1, "   ").is_err());
        assert!(Npc::new(1, 1, "x".repeat(NAME_LIMIT + 1)).is_err());
    }

    #[tokio::test]
    async fn test_book_persists_and_proxies() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let book = NpcBook::new(Arc::clone(&store));
        let mut npc = narrator();
        book.save(&npc).await.unwrap();
        npc.image = Some("https://example.com/jenny.png".to_string());
        book.save(&npc).await.unwrap();

        let reloaded = NpcBook::new(store);
        assert_eq!(reloaded.init().await.unwrap(), 1);
        assert_eq!(reloaded.list(7), vec![npc.clone()]);
        assert_eq!(reloaded.find(7, "officer jenny"), Some(npc.clone()));

        let (target, text) = reloaded.proxy_target(7, "[Stop right there]").unwrap();
        assert_eq!(target.id, npc.id);
        assert_eq!(text, "Stop right there");
        assert!(reloaded.proxy_target(8, "[Stop right there]").is_none());

        assert!(reloaded.delete(&npc).await.unwrap());
        assert!(reloaded.list(7).is_empty());
    }
}
