use super::fuzzy::{CATALOG_CUTOFF, FuzzyMatcher, NormalizedMatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Elemental type of a species or move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Typing {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl Typing {
    pub const ALL: [Typing; 18] = [
        Typing::Normal,
        Typing::Fire,
        Typing::Water,
        Typing::Electric,
        Typing::Grass,
        Typing::Ice,
        Typing::Fighting,
        Typing::Poison,
        Typing::Ground,
        Typing::Flying,
        Typing::Psychic,
        Typing::Bug,
        Typing::Rock,
        Typing::Ghost,
        Typing::Dragon,
        Typing::Dark,
        Typing::Steel,
        Typing::Fairy,
    ];

    pub fn all() -> &'static [Typing] {
        &Self::ALL
    }

    pub fn name(self) -> &'static str {
        match self {
            Typing::Normal => "Normal",
            Typing::Fire => "Fire",
            Typing::Water => "Water",
            Typing::Electric => "Electric",
            Typing::Grass => "Grass",
            Typing::Ice => "Ice",
            Typing::Fighting => "Fighting",
            Typing::Poison => "Poison",
            Typing::Ground => "Ground",
            Typing::Flying => "Flying",
            Typing::Psychic => "Psychic",
            Typing::Bug => "Bug",
            Typing::Rock => "Rock",
            Typing::Ghost => "Ghost",
            Typing::Dragon => "Dragon",
            Typing::Dark => "Dark",
            Typing::Steel => "Steel",
            Typing::Fairy => "Fairy",
        }
    }

    /// Embed colour associated with the type
    pub fn color(self) -> u32 {
        match self {
            Typing::Normal => 0xA8A77A,
            Typing::Fire => 0xEE8130,
            Typing::Water => 0x6390F0,
            Typing::Electric => 0xF7D02C,
            Typing::Grass => 0x7AC74C,
            Typing::Ice => 0x96D9D6,
            Typing::Fighting => 0xC22E28,
            Typing::Poison => 0xA33EA1,
            Typing::Ground => 0xE2BF65,
            Typing::Flying => 0xA98FF3,
            Typing::Psychic => 0xF95587,
            Typing::Bug => 0xA6B91A,
            Typing::Rock => 0xB6A136,
            Typing::Ghost => 0x735797,
            Typing::Dragon => 0x6F35FC,
            Typing::Dark => 0x705746,
            Typing::Steel => 0xB7B7CE,
            Typing::Fairy => 0xD685AD,
        }
    }

    pub fn deduce(text: &str) -> Option<Self> {
        let names: Vec<&str> = Self::ALL.iter().map(|t| t.name()).collect();
        NormalizedMatcher
            .best(text, &names, CATALOG_CUTOFF)
            .map(|idx| Self::ALL[idx])
    }

    /// Deduce every type named in `text`, split on `/`, `,` or whitespace.
    pub fn deduce_many(text: &str) -> BTreeSet<Self> {
        text.split(|c: char| c == '/' || c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .filter_map(Self::deduce)
            .collect()
    }
}

impl fmt::Display for Typing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joins a set of types the way embeds show them, e.g. `Fire/Flying`.
pub fn join_types(types: &BTreeSet<Typing>) -> String {
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join("/")
}
