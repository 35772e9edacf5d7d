//! The species a character belongs to.
//!
//! A character's species is one of five shapes. Canon entries point straight
//! at catalog data, the rest carry their own typing, ability pool and
//! movepool that the owner defines during submission.

use crate::catalog::{
    CATALOG_CUTOFF, Catalog, FuzzyMatcher, Movepool, NormalizedMatcher, Pronoun, SpeciesClass,
    SpeciesData, Typing, join_types,
};
use crate::{CoreError, Result};
use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub const BEAST_BOOST: &str = "Beast Boost";

/// The species kind picked at the start of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    Pokemon,
    Legendary,
    Mythical,
    UltraBeast,
    Paradox,
    Mega,
    Fusion,
    Variant,
    Fakemon,
    CustomMega,
    CustomParadox,
    CustomUltraBeast,
}

impl Template {
    pub const ALL: [Template; 12] = [
        Template::Pokemon,
        Template::Legendary,
        Template::Mythical,
        Template::UltraBeast,
        Template::Paradox,
        Template::Mega,
        Template::Fusion,
        Template::Variant,
        Template::Fakemon,
        Template::CustomMega,
        Template::CustomParadox,
        Template::CustomUltraBeast,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Template::Pokemon => "Pokemon",
            Template::Legendary => "Legendary",
            Template::Mythical => "Mythical",
            Template::UltraBeast => "Ultra Beast",
            Template::Paradox => "Paradox",
            Template::Mega => "Mega",
            Template::Fusion => "Fusion",
            Template::Variant => "Variant",
            Template::Fakemon => "Fakemon",
            Template::CustomMega => "Custom Mega",
            Template::CustomParadox => "Custom Paradox",
            Template::CustomUltraBeast => "Custom Ultra Beast",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Template::Pokemon => "Common Pokemon species",
            Template::Legendary => "Legendary Pokemon, no special abilities",
            Template::Mythical => "Mythical Pokemon, no special abilities",
            Template::UltraBeast => "Ultra Beasts, limited to Beast Boost",
            Template::Paradox => "Paradox Pokemon, no special abilities",
            Template::Mega => "Mega evolved Pokemon, no special abilities",
            Template::Fusion => "Two common species fused together",
            Template::Variant => "A named variant of an existing species",
            Template::Fakemon => "A fan-made species with its own movepool",
            Template::CustomMega => "A custom mega evolution of an existing species",
            Template::CustomParadox => "A fan-made paradox species",
            Template::CustomUltraBeast => "A fan-made ultra beast",
        }
    }

    /// Catalog class a canon template draws its species from
    pub fn class(self) -> Option<SpeciesClass> {
        match self {
            Template::Pokemon => Some(SpeciesClass::Common),
            Template::Legendary => Some(SpeciesClass::Legendary),
            Template::Mythical => Some(SpeciesClass::Mythical),
            Template::UltraBeast => Some(SpeciesClass::UltraBeast),
            Template::Paradox => Some(SpeciesClass::Paradox),
            Template::Mega => Some(SpeciesClass::Mega),
            _ => None,
        }
    }

    pub fn fakemon_origin(self) -> Option<FakemonOrigin> {
        match self {
            Template::Fakemon => Some(FakemonOrigin::Regular),
            Template::CustomParadox => Some(FakemonOrigin::Paradox),
            Template::CustomUltraBeast => Some(FakemonOrigin::UltraBeast),
            _ => None,
        }
    }

    pub fn can_have_special_abilities(self) -> bool {
        matches!(
            self,
            Template::Pokemon | Template::Variant | Template::Fakemon | Template::CustomParadox
        )
    }

    /// Templates whose species defines its own ability pool
    pub fn custom_abilities(self) -> bool {
        matches!(
            self,
            Template::Fakemon
                | Template::CustomParadox
                | Template::Variant
                | Template::CustomMega
        )
    }

    pub fn deduce(text: &str) -> Option<Self> {
        let names: Vec<&str> = Self::ALL.iter().map(|t| t.label()).collect();
        NormalizedMatcher
            .best(text, &names, CATALOG_CUTOFF)
            .map(|idx| Self::ALL[idx])
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FakemonOrigin {
    #[default]
    Regular,
    Paradox,
    UltraBeast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fusion {
    parts: [Arc<SpeciesData>; 2],
    pub types: BTreeSet<Typing>,
}

impl Fusion {
    pub fn new(first: Arc<SpeciesData>, second: Arc<SpeciesData>) -> Result<Self> {
        if first.id == second.id {
            return Err(CoreError::invalid_fusion(format!(
                "{} cannot be fused with itself",
                first.name
            )));
        }
        if let Some(banned) = [&first, &second].into_iter().find(|s| s.banned) {
            return Err(CoreError::invalid_fusion(format!(
                "{} is banned",
                banned.name
            )));
        }

        let mut fusion = Self {
            parts: [first, second],
            types: BTreeSet::new(),
        };
        if let Some(types) = fusion.possible_types().into_iter().next() {
            fusion.types = types;
        }
        Ok(fusion)
    }

    pub fn parts(&self) -> &[Arc<SpeciesData>; 2] {
        &self.parts
    }

    /// Type combinations the fusion may take.
    ///
    /// With at most two distinct types there is a single option. Otherwise
    /// shared types pair with the rest, and without shared types every
    /// cross pairing is allowed.
    pub fn possible_types(&self) -> Vec<BTreeSet<Typing>> {
        let [a, b] = &self.parts;
        let union: BTreeSet<Typing> = a.types.union(&b.types).copied().collect();
        if union.len() <= 2 {
            return vec![union];
        }

        let common: BTreeSet<Typing> = a.types.intersection(&b.types).copied().collect();
        let pairs: Vec<(Typing, Typing)> = if common.is_empty() {
            a.types
                .iter()
                .flat_map(|x| b.types.iter().map(move |y| (*x, *y)))
                .collect()
        } else {
            common
                .iter()
                .flat_map(|c| union.difference(&common).map(move |u| (*c, *u)))
                .collect()
        };

        let mut options: Vec<BTreeSet<Typing>> = Vec::new();
        for (x, y) in pairs {
            let option = BTreeSet::from([x, y]);
            if !options.contains(&option) {
                options.push(option);
            }
        }
        options
    }
}

/// A fan-made species. Owns its typing, ability pool and movepool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fakemon {
    pub name: CompactString,
    pub types: BTreeSet<Typing>,
    pub abilities: BTreeSet<CompactString>,
    pub movepool: Movepool,
    pub evolves_from: Option<Arc<SpeciesData>>,
    pub origin: FakemonOrigin,
    /// An ability that defines the species, grants a third ability slot
    pub signature: Option<CompactString>,
}

impl Fakemon {
    pub fn new(name: impl Into<CompactString>, origin: FakemonOrigin) -> Self {
        let abilities = match origin {
            FakemonOrigin::UltraBeast => BTreeSet::from([CompactString::from(BEAST_BOOST)]),
            _ => BTreeSet::new(),
        };
        Self {
            name: name.into(),
            types: BTreeSet::new(),
            abilities,
            movepool: Movepool::default(),
            evolves_from: None,
            origin,
            signature: None,
        }
    }

    fn has_beast_boost(&self) -> bool {
        self.origin == FakemonOrigin::UltraBeast
            || self.abilities.iter().any(|a| a == BEAST_BOOST)
    }
}

/// A named regional or otherwise altered form of a canon species.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub base: Arc<SpeciesData>,
    pub name: CompactString,
    pub types: BTreeSet<Typing>,
    pub abilities: BTreeSet<CompactString>,
    pub movepool: Movepool,
}

impl Variant {
    pub fn new(base: Arc<SpeciesData>, name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            types: base.types.clone(),
            abilities: base.abilities.clone(),
            movepool: base.movepool.clone(),
            base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomMega {
    pub base: Arc<SpeciesData>,
    pub types: BTreeSet<Typing>,
    pub abilities: BTreeSet<CompactString>,
}

impl CustomMega {
    pub fn new(base: Arc<SpeciesData>) -> Self {
        Self {
            types: base.types.clone(),
            abilities: base.abilities.clone(),
            base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Species {
    Pokemon(Arc<SpeciesData>),
    Fusion(Fusion),
    Fakemon(Fakemon),
    Variant(Variant),
    CustomMega(CustomMega),
}

impl Species {
    pub fn template(&self) -> Template {
        match self {
            Species::Pokemon(data) => match data.class {
                SpeciesClass::Common => Template::Pokemon,
                SpeciesClass::Legendary => Template::Legendary,
                SpeciesClass::Mythical => Template::Mythical,
                SpeciesClass::UltraBeast => Template::UltraBeast,
                SpeciesClass::Paradox => Template::Paradox,
                SpeciesClass::Mega => Template::Mega,
            },
            Species::Fusion(_) => Template::Fusion,
            Species::Fakemon(f) => match f.origin {
                FakemonOrigin::Regular => Template::Fakemon,
                FakemonOrigin::Paradox => Template::CustomParadox,
                FakemonOrigin::UltraBeast => Template::CustomUltraBeast,
            },
            Species::Variant(_) => Template::Variant,
            Species::CustomMega(_) => Template::CustomMega,
        }
    }

    pub fn id(&self) -> CompactString {
        match self {
            Species::Pokemon(data) => data.id.clone(),
            Species::Fusion(f) => format_compact!("{}_{}", f.parts[0].id, f.parts[1].id),
            Species::Fakemon(f) => format_compact!("fakemon:{}", f.name),
            Species::Variant(v) => format_compact!("variant:{}:{}", v.base.id, v.name),
            Species::CustomMega(m) => format_compact!("mega:{}", m.base.id),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Species::Pokemon(data) => data.name.to_string(),
            Species::Fusion(f) => format!("{}/{}", f.parts[0].name, f.parts[1].name),
            Species::Fakemon(f) => f.name.to_string(),
            Species::Variant(v) => format!("{} {}", v.name, v.base.name),
            Species::CustomMega(m) => format!("Mega {}", m.base.name),
        }
    }

    pub fn types(&self) -> BTreeSet<Typing> {
        match self {
            Species::Pokemon(data) => data.types.clone(),
            Species::Fusion(f) => f.types.clone(),
            Species::Fakemon(f) => f.types.clone(),
            Species::Variant(v) => v.types.clone(),
            Species::CustomMega(m) => m.types.clone(),
        }
    }

    /// Whether the owner picks the typing instead of canon data
    pub fn has_custom_types(&self) -> bool {
        match self {
            Species::Pokemon(_) => false,
            Species::Fusion(f) => f.possible_types().len() > 1,
            _ => true,
        }
    }

    /// Replace the typing. Returns false when the species' typing is fixed or
    /// the combination is not allowed.
    pub fn set_types(&mut self, types: BTreeSet<Typing>) -> bool {
        if types.is_empty() || types.len() > 2 {
            return false;
        }
        match self {
            Species::Pokemon(_) => false,
            Species::Fusion(f) => {
                if f.possible_types().contains(&types) {
                    f.types = types;
                    true
                } else {
                    false
                }
            }
            Species::Fakemon(f) => {
                f.types = types;
                true
            }
            Species::Variant(v) => {
                v.types = types;
                true
            }
            Species::CustomMega(m) => {
                m.types = types;
                true
            }
        }
    }

    /// Legal ability pool
    pub fn abilities(&self) -> BTreeSet<CompactString> {
        match self {
            Species::Pokemon(data) => data.abilities.clone(),
            Species::Fusion(f) => f.parts[0]
                .abilities
                .union(&f.parts[1].abilities)
                .cloned()
                .collect(),
            Species::Fakemon(f) => f.abilities.clone(),
            Species::Variant(v) => v.abilities.clone(),
            Species::CustomMega(m) => m.abilities.clone(),
        }
    }

    /// Species that define their own pool accept any catalog ability
    pub fn has_custom_abilities(&self) -> bool {
        match self {
            Species::Fakemon(f) => f.origin != FakemonOrigin::UltraBeast,
            Species::Variant(_) | Species::CustomMega(_) => true,
            _ => false,
        }
    }

    pub fn set_abilities(&mut self, abilities: BTreeSet<CompactString>) {
        match self {
            Species::Fakemon(f) => {
                if f.signature.as_ref().is_some_and(|s| !abilities.contains(s)) {
                    f.signature = None;
                }
                f.abilities = abilities;
            }
            Species::Variant(v) => v.abilities = abilities,
            Species::CustomMega(m) => m.abilities = abilities,
            _ => {}
        }
    }

    /// Union of every move acquisition source. Recomputed on each call.
    pub fn movepool(&self) -> Movepool {
        match self {
            Species::Pokemon(data) => data.movepool.clone(),
            Species::Fusion(f) => f.parts[0].movepool.union(&f.parts[1].movepool),
            Species::Fakemon(f) => f.movepool.clone(),
            Species::Variant(v) => v.movepool.clone(),
            Species::CustomMega(m) => m.base.movepool.clone(),
        }
    }

    pub fn has_custom_movepool(&self) -> bool {
        matches!(self, Species::Fakemon(_) | Species::Variant(_))
    }

    pub fn set_movepool(&mut self, movepool: Movepool) -> bool {
        match self {
            Species::Fakemon(f) => {
                f.movepool = movepool;
                true
            }
            Species::Variant(v) => {
                v.movepool = movepool;
                true
            }
            _ => false,
        }
    }

    pub fn can_have_special_abilities(&self) -> bool {
        match self {
            Species::Pokemon(data) => data.class == SpeciesClass::Common,
            Species::Fusion(_) | Species::CustomMega(_) => false,
            Species::Fakemon(f) => !f.has_beast_boost(),
            Species::Variant(v) => v.base.is_common(),
        }
    }

    /// Ability slots the species grants, always within 1..=3
    pub fn max_amount_abilities(&self) -> usize {
        match self {
            Species::Pokemon(data) => match data.class {
                SpeciesClass::UltraBeast => 1,
                _ => data.abilities.len().clamp(1, 2),
            },
            Species::Fusion(_) | Species::CustomMega(_) => 1,
            Species::Fakemon(f) if f.has_beast_boost() => 1,
            Species::Fakemon(f) if f.signature.is_some() => 3,
            Species::Fakemon(_) | Species::Variant(_) => 2,
        }
    }

    pub fn requires_image(&self) -> bool {
        !matches!(self, Species::Pokemon(_))
    }

    pub fn banned(&self) -> bool {
        match self {
            Species::Pokemon(data) => data.banned,
            Species::Fusion(f) => f.parts.iter().any(|p| p.banned),
            Species::Variant(v) => v.base.banned,
            Species::CustomMega(m) => m.base.banned,
            Species::Fakemon(_) => false,
        }
    }

    /// Canon species this one evolves into. A variant follows its base.
    pub fn evolves_to(&self, catalog: &Catalog) -> Vec<Arc<SpeciesData>> {
        match self {
            Species::Pokemon(data) => catalog.evolutions(data),
            Species::Variant(v) => catalog.evolutions(&v.base),
            _ => Vec::new(),
        }
    }

    /// Canon species this one evolves from. For a fusion, the pre-evolution
    /// of each part that has one.
    pub fn evolves_from(&self, catalog: &Catalog) -> Vec<Arc<SpeciesData>> {
        match self {
            Species::Pokemon(data) => catalog.pre_evolution(data).into_iter().collect(),
            Species::Fusion(f) => f
                .parts
                .iter()
                .filter_map(|p| catalog.pre_evolution(p))
                .collect(),
            Species::Fakemon(f) => f.evolves_from.iter().cloned().collect(),
            Species::Variant(v) => catalog.pre_evolution(&v.base).into_iter().collect(),
            Species::CustomMega(_) => Vec::new(),
        }
    }

    /// Image used when the owner has not provided one
    pub fn default_image(&self, pronoun: Pronoun) -> Option<String> {
        match self {
            Species::Pokemon(data) => match pronoun {
                Pronoun::She => data.female_image.clone().or_else(|| data.base_image.clone()),
                _ => data.base_image.clone(),
            },
            _ => None,
        }
    }

    pub fn to_stored(&self) -> StoredSpecies {
        match self {
            Species::Pokemon(data) => StoredSpecies::Pokemon {
                id: data.id.clone(),
            },
            Species::Fusion(f) => StoredSpecies::Fusion {
                ids: [f.parts[0].id.clone(), f.parts[1].id.clone()],
                types: f.types.clone(),
            },
            Species::Fakemon(f) => StoredSpecies::Fakemon {
                name: f.name.clone(),
                types: f.types.clone(),
                abilities: f.abilities.clone(),
                movepool: f.movepool.clone(),
                evolves_from: f.evolves_from.as_ref().map(|s| s.id.clone()),
                origin: f.origin,
                signature: f.signature.clone(),
            },
            Species::Variant(v) => StoredSpecies::Variant {
                base: v.base.id.clone(),
                name: v.name.clone(),
                types: v.types.clone(),
                abilities: v.abilities.clone(),
                movepool: v.movepool.clone(),
            },
            Species::CustomMega(m) => StoredSpecies::CustomMega {
                base: m.base.id.clone(),
                types: m.types.clone(),
                abilities: m.abilities.clone(),
            },
        }
    }

    pub fn from_stored(stored: StoredSpecies, catalog: &Catalog) -> Result<Self> {
        let lookup = |id: &str| {
            catalog
                .species(id)
                .ok_or_else(|| CoreError::unknown("species", id))
        };

        Ok(match stored {
            StoredSpecies::Pokemon { id } => Species::Pokemon(lookup(&id)?),
            StoredSpecies::Fusion { ids, types } => {
                let mut fusion = Fusion::new(lookup(&ids[0])?, lookup(&ids[1])?)?;
                fusion.types = types;
                Species::Fusion(fusion)
            }
            StoredSpecies::Fakemon {
                name,
                types,
                abilities,
                movepool,
                evolves_from,
                origin,
                signature,
            } => Species::Fakemon(Fakemon {
                name,
                types,
                abilities,
                movepool,
                evolves_from: evolves_from.as_deref().map(lookup).transpose()?,
                origin,
                signature,
            }),
            StoredSpecies::Variant {
                base,
                name,
                types,
                abilities,
                movepool,
            } => Species::Variant(Variant {
                base: lookup(&base)?,
                name,
                types,
                abilities,
                movepool,
            }),
            StoredSpecies::CustomMega {
                base,
                types,
                abilities,
            } => Species::CustomMega(CustomMega {
                base: lookup(&base)?,
                types,
                abilities,
            }),
        })
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), join_types(&self.types()))
    }
}

/// Storage form of [`Species`]. Canon species are kept by id and resolved
/// against the catalog on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredSpecies {
    Pokemon {
        id: CompactString,
    },
    Fusion {
        ids: [CompactString; 2],
        types: BTreeSet<Typing>,
    },
    Fakemon {
        name: CompactString,
        types: BTreeSet<Typing>,
        abilities: BTreeSet<CompactString>,
        #[serde(default)]
        movepool: Movepool,
        #[serde(default)]
        evolves_from: Option<CompactString>,
        #[serde(default)]
        origin: FakemonOrigin,
        #[serde(default)]
        signature: Option<CompactString>,
    },
    Variant {
        base: CompactString,
        name: CompactString,
        types: BTreeSet<Typing>,
        abilities: BTreeSet<CompactString>,
        #[serde(default)]
        movepool: Movepool,
    },
    CustomMega {
        base: CompactString,
        types: BTreeSet<Typing>,
        abilities: BTreeSet<CompactString>,
    },
}
