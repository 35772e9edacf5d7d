//! The character aggregate and its storage form.

use crate::catalog::{Catalog, Movepool, Pronoun, Typing, join_types};
use crate::species::{Species, StoredSpecies};
use crate::{CoreError, Result};
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MIN_AGE: u8 = 13;
pub const MAX_AGE: u8 = 99;
/// A movepool this small is copied straight into the moveset
pub const AUTOFILL_MOVES: usize = 6;
/// Moves a character may carry
pub const MAX_MOVES: usize = 6;

const DESCRIPTION_LIMIT: usize = 2000;
const TRAIT_FIELD_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    Physical,
    Mental,
    Elemental,
    Supernatural,
    Technological,
    #[default]
    Other,
}

impl TraitKind {
    pub const ALL: [TraitKind; 6] = [
        TraitKind::Physical,
        TraitKind::Mental,
        TraitKind::Elemental,
        TraitKind::Supernatural,
        TraitKind::Technological,
        TraitKind::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TraitKind::Physical => "Physical",
            TraitKind::Mental => "Mental",
            TraitKind::Elemental => "Elemental",
            TraitKind::Supernatural => "Supernatural",
            TraitKind::Technological => "Technological",
            TraitKind::Other => "Other",
        }
    }
}

/// A free-form narrative trait, the "special ability"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpAbility {
    pub name: String,
    pub description: String,
    pub origin: String,
    pub pros: String,
    pub cons: String,
    #[serde(default)]
    pub kind: TraitKind,
}

impl SpAbility {
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.description, &self.origin, &self.pros, &self.cons]
            .iter()
            .all(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageRef {
    /// Use the species artwork
    #[default]
    Default,
    Url { url: String },
    /// Raw upload, replaced by a url once published
    Upload { filename: String, bytes: Vec<u8> },
}

impl ImageRef {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Url { url } => Some(url.as_str()),
            _ => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ImageRef::Default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    /// Published message id, set on first submit
    pub id: Option<u64>,
    pub author: u64,
    pub server: u64,
    pub thread: Option<u64>,
    pub name: String,
    pub age: Option<u8>,
    pub pronoun: Pronoun,
    pub backstory: Option<String>,
    pub extra: Option<String>,
    pub image: ImageRef,
    pub species: Option<Species>,
    pub abilities: BTreeSet<CompactString>,
    pub moveset: BTreeSet<CompactString>,
    pub sp_ability: Option<SpAbility>,
    pub hidden_power: Option<Typing>,
    pub url: Option<String>,
    pub location: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Character {
    pub fn new(author: u64, server: u64) -> Self {
        Self {
            id: None,
            author,
            server,
            thread: None,
            name: String::new(),
            age: None,
            pronoun: Pronoun::default(),
            backstory: None,
            extra: None,
            image: ImageRef::Default,
            species: None,
            abilities: BTreeSet::new(),
            moveset: BTreeSet::new(),
            sp_ability: None,
            hidden_power: None,
            url: None,
            location: None,
            created_at: Utc::now(),
        }
    }

    /// Clamp a raw age: below the minimum rounds up, anything past the
    /// maximum is treated as unknown.
    pub fn set_age(&mut self, age: Option<i64>) {
        self.age = match age {
            Some(age) if age > MAX_AGE as i64 => None,
            Some(age) if age < MIN_AGE as i64 => Some(MIN_AGE),
            Some(age) => Some(age as u8),
            None => None,
        };
    }

    pub fn types(&self) -> BTreeSet<Typing> {
        self.species
            .as_ref()
            .map(Species::types)
            .unwrap_or_default()
    }

    pub fn total_movepool(&self) -> Movepool {
        self.species
            .as_ref()
            .map(Species::movepool)
            .unwrap_or_default()
    }

    pub fn max_amount_abilities(&self) -> usize {
        if self.sp_ability.is_some() {
            return 1;
        }
        self.species
            .as_ref()
            .map_or(1, Species::max_amount_abilities)
    }

    pub fn can_have_special_abilities(&self) -> bool {
        self.abilities.len() < 2
            && self
                .species
                .as_ref()
                .is_some_and(Species::can_have_special_abilities)
    }

    pub fn requires_image(&self) -> bool {
        self.species.as_ref().is_some_and(Species::requires_image)
    }

    pub fn default_image(&self) -> Option<String> {
        self.species
            .as_ref()
            .and_then(|s| s.default_image(self.pronoun))
    }

    /// Image url shown in embeds
    pub fn image_url(&self) -> Option<String> {
        match &self.image {
            ImageRef::Url { url } => Some(url.clone()),
            ImageRef::Default => self.default_image(),
            ImageRef::Upload { filename, .. } => Some(format!("attachment://{filename}")),
        }
    }

    /// Moves in the moveset the current species cannot learn
    pub fn illegal_moves(&self) -> BTreeSet<CompactString> {
        let pool = self.total_movepool();
        self.moveset
            .iter()
            .filter(|m| !pool.contains(m))
            .cloned()
            .collect()
    }

    /// Replace the species and bring abilities, moveset and special ability
    /// back in line with it.
    pub fn assign_species(&mut self, species: Species) {
        let pool = species.abilities();
        if !species.has_custom_abilities() {
            self.abilities.retain(|a| pool.contains(a));
        }
        let slots = if self.sp_ability.is_some() && species.can_have_special_abilities() {
            1
        } else {
            species.max_amount_abilities()
        };
        if self.abilities.is_empty() && !pool.is_empty() && pool.len() <= slots {
            self.abilities = pool;
        }

        let movepool = species.movepool();
        self.moveset.retain(|m| movepool.contains(m));
        if self.moveset.is_empty() && movepool.len() <= AUTOFILL_MOVES {
            self.moveset = movepool.all();
        }

        if !species.can_have_special_abilities() {
            self.sp_ability = None;
        }
        self.species = Some(species);
    }

    pub fn update(&mut self, idx: u64) {
        self.id = Some(idx);
    }

    pub fn jump_url(&self) -> Option<String> {
        match (self.id, self.thread) {
            (Some(id), Some(thread)) => Some(format!(
                "https://discord.com/channels/{}/{}/{}",
                self.server, thread, id
            )),
            _ => None,
        }
    }

    /// Renders the embed. Pure: never touches the record.
    pub fn embed(&self) -> CharacterEmbed {
        let mut fields = Vec::new();
        fields.push(EmbedField::new("Pronoun", self.pronoun.label(), true));
        fields.push(EmbedField::new(
            "Age",
            self.age.map_or_else(|| "Unknown".to_string(), |a| a.to_string()),
            true,
        ));
        if let Some(species) = &self.species {
            fields.push(EmbedField::new("Species", species.name(), true));
        }
        for (i, ability) in self.abilities.iter().enumerate() {
            fields.push(EmbedField::new(
                format!("Ability {} - {}", i + 1, ability),
                String::new(),
                false,
            ));
        }
        if let Some(sp) = &self.sp_ability {
            fields.push(EmbedField::new(
                format!("Sp.Ability - {}", sp.name),
                truncate(&sp.description, TRAIT_FIELD_LIMIT),
                false,
            ));
            fields.push(EmbedField::new(
                "Sp.Ability - Origin",
                truncate(&sp.origin, TRAIT_FIELD_LIMIT),
                false,
            ));
            fields.push(EmbedField::new(
                "Sp.Ability - Pros",
                truncate(&sp.pros, TRAIT_FIELD_LIMIT),
                false,
            ));
            fields.push(EmbedField::new(
                "Sp.Ability - Cons",
                truncate(&sp.cons, TRAIT_FIELD_LIMIT),
                false,
            ));
        }
        if let Some(hp) = self.hidden_power {
            fields.push(EmbedField::new("Hidden Power", hp.name(), true));
        }
        if !self.moveset.is_empty() {
            fields.push(EmbedField::new(
                "Moveset",
                self.moveset
                    .iter()
                    .map(|m| format!("* {m}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                false,
            ));
        }
        if let Some(extra) = self.extra.as_deref().filter(|e| !e.is_empty()) {
            fields.push(EmbedField::new(
                "Extra Information",
                truncate(extra, 1024),
                false,
            ));
        }

        let types = self.types();
        CharacterEmbed {
            title: self.name.clone(),
            description: self
                .backstory
                .as_deref()
                .map(|b| truncate(b, DESCRIPTION_LIMIT)),
            url: self.url.clone(),
            color: types.iter().next().map(|t| t.color()),
            image: self.image_url(),
            fields,
            footer: (!types.is_empty()).then(|| join_types(&types)),
        }
    }

    pub fn to_storage(&self) -> StoredCharacter {
        StoredCharacter {
            id: self.id,
            author: self.author,
            server: self.server,
            thread: self.thread,
            name: self.name.clone(),
            age: self.age,
            pronoun: self.pronoun,
            backstory: self.backstory.clone(),
            extra: self.extra.clone(),
            image: self.image.clone(),
            species: self.species.as_ref().map(Species::to_stored),
            abilities: self.abilities.clone(),
            moveset: self.moveset.clone(),
            sp_ability: self.sp_ability.clone(),
            hidden_power: self.hidden_power,
            url: self.url.clone(),
            location: self.location,
            created_at: self.created_at,
        }
    }

    pub fn from_storage(stored: StoredCharacter, catalog: &Catalog) -> Result<Self> {
        Ok(Self {
            species: stored
                .species
                .map(|s| Species::from_stored(s, catalog))
                .transpose()?,
            id: stored.id,
            author: stored.author,
            server: stored.server,
            thread: stored.thread,
            name: stored.name,
            age: stored.age,
            pronoun: stored.pronoun,
            backstory: stored.backstory,
            extra: stored.extra,
            image: stored.image,
            abilities: stored.abilities,
            moveset: stored.moveset,
            sp_ability: stored.sp_ability,
            hidden_power: stored.hidden_power,
            url: stored.url,
            location: stored.location,
            created_at: stored.created_at,
        })
    }

    pub fn to_document(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self.to_storage()).map_err(|e| CoreError::MalformedDocument {
            collection: crate::store::CHARACTERS,
            cause: e,
        })
    }

    pub fn from_document(doc: serde_json::Value, catalog: &Catalog) -> Result<Self> {
        let stored: StoredCharacter =
            serde_json::from_value(doc).map_err(|e| CoreError::MalformedDocument {
                collection: crate::store::CHARACTERS,
                cause: e,
            })?;
        Self::from_storage(stored, catalog)
    }
}

/// Storage document for a character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCharacter {
    #[serde(default)]
    pub id: Option<u64>,
    pub author: u64,
    pub server: u64,
    #[serde(default)]
    pub thread: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub pronoun: Pronoun,
    #[serde(default)]
    pub backstory: Option<String>,
    #[serde(default)]
    pub extra: Option<String>,
    #[serde(default)]
    pub image: ImageRef,
    #[serde(default)]
    pub species: Option<StoredSpecies>,
    #[serde(default)]
    pub abilities: BTreeSet<CompactString>,
    #[serde(default)]
    pub moveset: BTreeSet<CompactString>,
    #[serde(default)]
    pub sp_ability: Option<SpAbility>,
    #[serde(default)]
    pub hidden_power: Option<Typing>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub location: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Platform neutral embed, rendered by the glue layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterEmbed {
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub color: Option<u32>,
    pub image: Option<String>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::{Fakemon, FakemonOrigin};
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        Catalog::bundled().unwrap()
    }

    fn pikachu(catalog: &Catalog) -> Character {
        let mut oc = Character::new(10, 20);
        oc.name = "Ash".into();
        oc.assign_species(Species::Pokemon(catalog.species("pikachu").unwrap()));
        oc
    }

    #[test]
    fn test_age_clamping() {
        let mut oc = Character::new(1, 2);
        oc.set_age(Some(5));
        assert_eq!(oc.age, Some(MIN_AGE));
        oc.set_age(Some(150));
        assert_eq!(oc.age, None);
        oc.set_age(Some(42));
        assert_eq!(oc.age, Some(42));
    }

    #[test]
    fn test_single_ability_autofills() {
        let catalog = catalog();
        let oc = pikachu(&catalog);
        assert_eq!(oc.abilities, BTreeSet::from([CompactString::from("Static")]));
        // Pikachu learns far more than six moves
        assert!(oc.moveset.is_empty());
    }

    #[test]
    fn test_small_movepool_autofills() {
        let catalog = catalog();
        let mut oc = Character::new(1, 2);
        oc.assign_species(Species::Pokemon(catalog.species("caterpie").unwrap()));
        assert_eq!(oc.moveset.len(), 3);
        assert!(oc.illegal_moves().is_empty());
    }

    #[test]
    fn test_assign_species_drops_illegal_moves() {
        let catalog = catalog();
        let mut oc = pikachu(&catalog);
        oc.moveset = BTreeSet::from(["Volt Tackle".into(), "Thunderbolt".into()]);
        oc.assign_species(Species::Pokemon(catalog.species("raichu").unwrap()));
        assert_eq!(oc.moveset, BTreeSet::from([CompactString::from("Thunderbolt")]));
    }

    #[test]
    fn test_assign_ineligible_species_clears_trait() {
        let catalog = catalog();
        let mut oc = pikachu(&catalog);
        oc.sp_ability = Some(SpAbility {
            name: "Storm Call".into(),
            ..Default::default()
        });
        oc.assign_species(Species::Pokemon(catalog.species("mewtwo").unwrap()));
        assert!(oc.sp_ability.is_none());
    }

    #[test]
    fn test_embed_is_pure_and_complete() {
        let catalog = catalog();
        let mut oc = pikachu(&catalog);
        oc.backstory = Some("b".repeat(2500));
        oc.moveset = BTreeSet::from(["Thunderbolt".into()]);
        let before = oc.clone();

        let embed = oc.embed();
        assert_eq!(oc, before);
        assert_eq!(embed.title, "Ash");
        assert_eq!(embed.description.unwrap().len(), 2000);
        assert_eq!(embed.footer.as_deref(), Some("Electric"));
        let names: Vec<_> = embed.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Pronoun", "Age", "Species", "Ability 1 - Static", "Moveset"]
        );
        assert_eq!(embed.fields[1].value, "Unknown");
    }

    #[test]
    fn test_clone_is_independent() {
        let catalog = catalog();
        let oc = pikachu(&catalog);
        let mut copy = oc.clone();
        copy.moveset.insert("Thunder".into());
        copy.abilities.clear();
        assert!(oc.moveset.is_empty());
        assert_eq!(oc.abilities.len(), 1);
    }

    #[test]
    fn test_storage_round_trip() {
        let catalog = catalog();
        let mut oc = pikachu(&catalog);
        oc.id = Some(555);
        oc.thread = Some(777);
        oc.set_age(Some(21));
        oc.pronoun = Pronoun::She;
        oc.backstory = Some("Grew up near the power plant".into());
        oc.extra = Some("Loves ketchup".into());
        oc.image = ImageRef::Url {
            url: "https://img.example/ash.png".into(),
        };
        oc.moveset = BTreeSet::from(["Thunderbolt".into(), "Quick Attack".into()]);
        oc.sp_ability = Some(SpAbility {
            name: "Storm Call".into(),
            description: "Calls lightning".into(),
            origin: "Struck as a child".into(),
            pros: "Powerful".into(),
            cons: "Exhausting".into(),
            kind: TraitKind::Elemental,
        });
        oc.hidden_power = Some(Typing::Ice);

        let doc = oc.to_document().unwrap();
        let restored = Character::from_document(doc, &catalog).unwrap();
        assert_eq!(restored, oc);
    }

    #[test]
    fn test_fakemon_round_trip_with_upload() {
        let catalog = catalog();
        let mut oc = Character::new(1, 2);
        let mut fakemon = Fakemon::new("Voltori", FakemonOrigin::Regular);
        fakemon.types = BTreeSet::from([Typing::Electric]);
        fakemon.movepool = Movepool::from_moves(["Spark", "Thunderbolt", "Protect"]);
        oc.assign_species(Species::Fakemon(fakemon));
        oc.image = ImageRef::Upload {
            filename: "voltori.png".into(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        };

        let restored = Character::from_storage(oc.to_storage(), &catalog).unwrap();
        assert_eq!(restored, oc);
        assert_eq!(restored.moveset.len(), 3);
    }

    #[test]
    fn test_jump_url_needs_identity() {
        let mut oc = Character::new(1, 2);
        assert!(oc.jump_url().is_none());
        oc.thread = Some(3);
        oc.update(4);
        assert_eq!(
            oc.jump_url().as_deref(),
            Some("https://discord.com/channels/2/3/4")
        );
    }
}
