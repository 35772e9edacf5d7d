use super::moves::Movepool;
use super::typing::Typing;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub name: CompactString,
    pub description: String,
}

/// Canonical classification of a species entry in the catalog
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesClass {
    #[default]
    Common,
    Legendary,
    Mythical,
    UltraBeast,
    Paradox,
    Mega,
}

impl SpeciesClass {
    pub fn label(self) -> &'static str {
        match self {
            SpeciesClass::Common => "Pokemon",
            SpeciesClass::Legendary => "Legendary",
            SpeciesClass::Mythical => "Mythical",
            SpeciesClass::UltraBeast => "Ultra Beast",
            SpeciesClass::Paradox => "Paradox",
            SpeciesClass::Mega => "Mega",
        }
    }
}

/// A species as shipped in the bundled catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesData {
    pub id: CompactString,
    pub name: CompactString,
    #[serde(default)]
    pub class: SpeciesClass,
    pub types: BTreeSet<Typing>,
    pub abilities: BTreeSet<CompactString>,
    #[serde(default)]
    pub movepool: Movepool,
    #[serde(default)]
    pub evolves_from: Option<CompactString>,
    #[serde(default)]
    pub evolves_to: BTreeSet<CompactString>,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub base_image: Option<String>,
    #[serde(default)]
    pub female_image: Option<String>,
}

impl SpeciesData {
    pub fn is_common(&self) -> bool {
        self.class == SpeciesClass::Common
    }
}
