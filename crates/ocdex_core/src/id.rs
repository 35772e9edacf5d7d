//! Prefixed identifiers for records the bot owns itself.
//!
//! Characters are keyed by the platform message id they were published as.
//! Drafts and NPC presets have no platform identity, so they get a
//! `prefix_uuid` id instead.

use compact_str::CompactString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T> {
    uuid: Uuid,
    _phantom: PhantomData<T>,
}

/// Marker for an id family
pub trait IdType: Send + Sync + 'static {
    const PREFIX: &'static str;
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum IdError {
    #[error("Invalid ID format: expected prefix '{expected}', got '{actual}'")]
    #[diagnostic(help("Ensure the ID starts with the correct prefix followed by an underscore"))]
    InvalidPrefix { expected: String, actual: String },

    #[error("Invalid UUID: {0}")]
    #[diagnostic(help("The UUID portion of the ID must be a valid UUID"))]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid ID format: {0}")]
    #[diagnostic(help("IDs must be in the format 'prefix_uuid'"))]
    InvalidFormat(String),
}

impl<T: IdType> Id<T> {
    pub fn generate() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _phantom: PhantomData,
        }
    }

    pub fn parse(s: &str) -> Result<Self, IdError> {
        let Some((prefix, uuid)) = s.split_once('_') else {
            return Err(IdError::InvalidFormat(
                "ID must be in format 'prefix_uuid'".to_string(),
            ));
        };
        if prefix != T::PREFIX {
            return Err(IdError::InvalidPrefix {
                expected: T::PREFIX.to_string(),
                actual: prefix.to_string(),
            });
        }
        Ok(Self::from_uuid(Uuid::parse_str(uuid)?))
    }
}

impl<T: IdType> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", T::PREFIX, self.uuid)
    }
}

impl<T: IdType> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", T::PREFIX, self.uuid)
    }
}

impl<T: IdType> FromStr for Id<T> {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<T: IdType> Serialize for Id<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdType> Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = CompactString::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[macro_export]
macro_rules! define_id_type {
    ($type_name:ident, $prefix:expr) => {
        #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
        pub struct $type_name;

        impl $crate::id::IdType for $type_name {
            const PREFIX: &'static str = $prefix;
        }
    };
}

define_id_type!(DraftIdType, "draft");
pub type DraftId = Id<DraftIdType>;

define_id_type!(NpcIdType, "npc");
pub type NpcId = Id<NpcIdType>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parsing() {
        let id = DraftId::generate();
        let parsed = DraftId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);

        assert!(NpcId::parse(&id.to_string()).is_err());
        assert!(DraftId::parse("invalid").is_err());
        assert!(DraftId::parse("draft_").is_err());
        assert!(DraftId::parse("draft_not-a-uuid").is_err());
    }

    #[test]
    fn test_id_serialization() {
        let id = NpcId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with("\"npc_"));
        let back: NpcId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);

        assert!(serde_json::from_str::<DraftId>(&json).is_err());
    }

    #[test]
    fn test_debug_matches_display() {
        let id = DraftId::generate();
        assert_eq!(format!("{:?}", id), id.to_string());
    }
}
