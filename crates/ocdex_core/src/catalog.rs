//! Static reference data: species, abilities, moves, types and pronouns.
//!
//! The catalog is loaded once from the bundled JSON and shared behind an
//! [`Arc`]. Nothing mutates it after [`Catalog::bundled`] returns, so wizards
//! read it concurrently without locking.

pub mod fuzzy;
pub mod moves;
pub mod pronoun;
pub mod species;
pub mod typing;

pub use fuzzy::{CATALOG_CUTOFF, FuzzyMatcher, Match, NormalizedMatcher, SUBSET_CUTOFF};
pub use moves::{Move, MoveCategory, Movepool};
pub use pronoun::Pronoun;
pub use species::{Ability, SpeciesClass, SpeciesData};
pub use typing::{Typing, join_types};

use crate::{CoreError, Result};
use compact_str::CompactString;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const SPECIES_JSON: &str = include_str!("../data/species.json");
const ABILITIES_JSON: &str = include_str!("../data/abilities.json");
const MOVES_JSON: &str = include_str!("../data/moves.json");

/// Hash of the bundled data files, stamped into drafts.
pub const CATALOG_REVISION: &str = env!("OCDEX_CATALOG_REVISION");

#[derive(Debug, Clone)]
pub struct Catalog {
    species: BTreeMap<CompactString, Arc<SpeciesData>>,
    abilities: BTreeMap<CompactString, Arc<Ability>>,
    moves: BTreeMap<CompactString, Arc<Move>>,
    matcher: Arc<dyn FuzzyMatcher>,
}

impl Catalog {
    /// Load the catalog bundled with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_json(SPECIES_JSON, ABILITIES_JSON, MOVES_JSON)
    }

    pub fn from_json(species: &str, abilities: &str, moves: &str) -> Result<Self> {
        let species: Vec<SpeciesData> =
            serde_json::from_str(species).map_err(|e| CoreError::CatalogMalformed {
                resource: "species",
                cause: e,
            })?;
        let abilities: Vec<Ability> =
            serde_json::from_str(abilities).map_err(|e| CoreError::CatalogMalformed {
                resource: "abilities",
                cause: e,
            })?;
        let moves: Vec<Move> =
            serde_json::from_str(moves).map_err(|e| CoreError::CatalogMalformed {
                resource: "moves",
                cause: e,
            })?;

        let moves: BTreeMap<_, _> = moves
            .into_iter()
            .map(|m| (m.name.clone(), Arc::new(m)))
            .collect();

        let species = species
            .into_iter()
            .map(|mut data| {
                // Banned or unknown moves never enter a species pool
                data.movepool
                    .retain(|name| moves.get(name).is_some_and(|m| !m.banned));
                (data.id.clone(), Arc::new(data))
            })
            .collect();

        let abilities = abilities
            .into_iter()
            .map(|a| (a.name.clone(), Arc::new(a)))
            .collect();

        let catalog = Self {
            species,
            abilities,
            moves,
            matcher: fuzzy::default_matcher(),
        };
        tracing::debug!(
            species = catalog.species.len(),
            abilities = catalog.abilities.len(),
            moves = catalog.moves.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Swap the fuzzy matching collaborator
    pub fn with_matcher(mut self, matcher: Arc<dyn FuzzyMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn matcher(&self) -> &dyn FuzzyMatcher {
        self.matcher.as_ref()
    }

    // Species

    pub fn species(&self, id: &str) -> Option<Arc<SpeciesData>> {
        self.species.get(id).cloned()
    }

    pub fn all_species(&self) -> impl Iterator<Item = &Arc<SpeciesData>> {
        self.species.values()
    }

    pub fn deduce_species(&self, text: &str) -> Option<Arc<SpeciesData>> {
        self.deduce_species_where(text, |_| true)
    }

    /// Fuzzy species lookup restricted to entries accepted by `filter`
    pub fn deduce_species_where(
        &self,
        text: &str,
        filter: impl Fn(&SpeciesData) -> bool,
    ) -> Option<Arc<SpeciesData>> {
        let candidates: Vec<&Arc<SpeciesData>> =
            self.species.values().filter(|s| filter(s)).collect();
        if let Some(exact) = candidates.iter().find(|s| s.id == text) {
            return Some(Arc::clone(exact));
        }
        let names: Vec<&str> = candidates.iter().map(|s| s.name.as_str()).collect();
        self.matcher
            .best(text, &names, CATALOG_CUTOFF)
            .map(|idx| Arc::clone(candidates[idx]))
    }

    pub fn evolutions(&self, data: &SpeciesData) -> Vec<Arc<SpeciesData>> {
        data.evolves_to
            .iter()
            .filter_map(|id| self.species(id))
            .filter(|s| !s.banned)
            .collect()
    }

    pub fn pre_evolution(&self, data: &SpeciesData) -> Option<Arc<SpeciesData>> {
        data.evolves_from.as_deref().and_then(|id| self.species(id))
    }

    // Abilities

    pub fn ability(&self, name: &str) -> Option<Arc<Ability>> {
        self.abilities.get(name).cloned()
    }

    pub fn all_abilities(&self) -> impl Iterator<Item = &Arc<Ability>> {
        self.abilities.values()
    }

    pub fn deduce_ability(&self, text: &str) -> Option<Arc<Ability>> {
        let names: Vec<&str> = self.abilities.keys().map(|k| k.as_str()).collect();
        self.matcher
            .best(text, &names, CATALOG_CUTOFF)
            .and_then(|idx| self.ability(names[idx]))
    }

    /// Lookup within a curated pool, e.g. the abilities of one species
    pub fn deduce_ability_in(
        &self,
        text: &str,
        pool: &BTreeSet<CompactString>,
    ) -> Option<Arc<Ability>> {
        let names: Vec<&str> = pool.iter().map(|k| k.as_str()).collect();
        self.matcher
            .best(text, &names, SUBSET_CUTOFF)
            .and_then(|idx| self.ability(names[idx]))
    }

    // Moves

    pub fn get_move(&self, name: &str) -> Option<Arc<Move>> {
        self.moves.get(name).cloned()
    }

    pub fn all_moves(&self) -> impl Iterator<Item = &Arc<Move>> {
        self.moves.values()
    }

    pub fn deduce_move(&self, text: &str) -> Option<Arc<Move>> {
        let names: Vec<&str> = self.moves.keys().map(|k| k.as_str()).collect();
        self.matcher
            .best(text, &names, CATALOG_CUTOFF)
            .and_then(|idx| self.get_move(names[idx]))
    }

    pub fn deduce_move_in(&self, text: &str, pool: &BTreeSet<CompactString>) -> Option<Arc<Move>> {
        let names: Vec<&str> = pool.iter().map(|k| k.as_str()).collect();
        self.matcher
            .best(text, &names, SUBSET_CUTOFF)
            .and_then(|idx| self.get_move(names[idx]))
    }

    /// Moves in `names` the catalog marks as banned
    pub fn banned_moves<'a>(
        &self,
        names: impl IntoIterator<Item = &'a CompactString>,
    ) -> BTreeSet<CompactString> {
        names
            .into_iter()
            .filter(|n| self.get_move(n).is_some_and(|m| m.banned))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_loads() {
        let catalog = Catalog::bundled().unwrap();
        assert!(catalog.species("pikachu").is_some());
        assert!(catalog.ability("Static").is_some());
        assert!(catalog.get_move("Thunderbolt").is_some());
    }

    #[test]
    fn test_banned_moves_are_dropped_from_pools() {
        let catalog = Catalog::bundled().unwrap();
        let arceus = catalog.species("arceus").unwrap();
        assert!(!arceus.movepool.contains("Judgment"));
        assert!(arceus.movepool.contains("Recover"));
    }

    #[test]
    fn test_deduce_species_is_accent_and_case_insensitive() {
        let catalog = Catalog::bundled().unwrap();
        assert_eq!(catalog.deduce_species("PIKACHÚ").unwrap().id, "pikachu");
        assert_eq!(catalog.deduce_species("great tusk").unwrap().id, "great-tusk");
        assert!(catalog.deduce_species("Missingno").is_none());
    }

    #[test]
    fn test_deduce_species_where_filters() {
        let catalog = Catalog::bundled().unwrap();
        let legendary = |s: &SpeciesData| s.class == SpeciesClass::Legendary;
        assert!(catalog.deduce_species_where("Mewtwo", legendary).is_some());
        assert!(catalog.deduce_species_where("Pikachu", legendary).is_none());
    }

    #[test]
    fn test_deduce_ability_in_pool_uses_lenient_cutoff() {
        let catalog = Catalog::bundled().unwrap();
        let pool = BTreeSet::from([CompactString::from("Blaze"), "Solar Power".into()]);
        assert_eq!(
            catalog.deduce_ability_in("solar", &pool).unwrap().name,
            "Solar Power"
        );
        assert!(catalog.deduce_ability("solar").is_none());
    }

    #[test]
    fn test_evolutions_resolve() {
        let catalog = Catalog::bundled().unwrap();
        let eevee = catalog.species("eevee").unwrap();
        assert_eq!(catalog.evolutions(&eevee).len(), 3);
        let raichu = catalog.species("raichu").unwrap();
        assert_eq!(catalog.pre_evolution(&raichu).unwrap().id, "pikachu");
    }
}
