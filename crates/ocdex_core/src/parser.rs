//! Plain-text character sheets.
//!
//! A sheet is a list of `Key: value` lines. Keys are matched loosely
//! (case and punctuation are ignored, several spellings are accepted) and
//! catalog references are fuzzy resolved. Lines that match no key extend the
//! previous long-form value or are dropped.

use crate::catalog::{Catalog, Movepool, Pronoun, Typing};
use crate::character::{Character, ImageRef, SpAbility};
use crate::species::{CustomMega, Fakemon, FakemonOrigin, Fusion, Species, Template, Variant};
use compact_str::CompactString;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Name,
    Age,
    Pronoun,
    Species,
    Fakemon,
    Fusion,
    Kind,
    Types,
    Abilities,
    Moveset,
    Movepool,
    Backstory,
    Extra,
    Image,
    SpName,
    SpDescription,
    SpOrigin,
    SpPros,
    SpCons,
}

impl Key {
    fn lookup(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let found = match key.as_str() {
            "name" => Key::Name,
            "age" => Key::Age,
            "pronoun" | "pronouns" | "gender" => Key::Pronoun,
            "species" => Key::Species,
            "f species" | "fakemon" | "fakemon species" => Key::Fakemon,
            "fusion" | "fusion species" => Key::Fusion,
            "kind" | "template" | "species kind" => Key::Kind,
            "types" | "type" | "typing" => Key::Types,
            "abilities" | "ability" => Key::Abilities,
            "moveset" | "moves" => Key::Moveset,
            "movepool" => Key::Movepool,
            "backstory" | "bio" => Key::Backstory,
            "additional information" | "extra" | "extra information" => Key::Extra,
            "image" | "art" => Key::Image,
            "special ability" | "what is it called" | "how is it called" => Key::SpName,
            "what does the special ability do" | "special ability description" => {
                Key::SpDescription
            }
            "how did they obtain it" | "special ability origin" => Key::SpOrigin,
            "how does it make the characters life easier" | "special ability pros" => Key::SpPros,
            "how does it make the characters life harder" | "special ability cons" => Key::SpCons,
            _ => return None,
        };
        Some(found)
    }

    /// Values that may run over several lines
    fn long_form(self) -> bool {
        matches!(
            self,
            Key::Backstory
                | Key::Extra
                | Key::SpDescription
                | Key::SpOrigin
                | Key::SpPros
                | Key::SpCons
        )
    }
}

/// Template filler text that means the field was left blank
const PLACEHOLDERS: [&str; 12] = [
    "none",
    "n/a",
    "oc's name",
    "oc's age",
    "oc's species",
    "oc's gender",
    "oc's ability",
    "oc's preferred pronoun",
    "character's backstory",
    "character's extra information",
    "oc's fakemon species",
    "move",
];

/// A character read from a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSheet {
    pub template: Template,
    pub character: Character,
    /// Values that named nothing in the catalog, as `Key: value`
    pub unresolved: Vec<String>,
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split([',', '\n', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// Short labels made of words, as opposed to prose that happens to hold a
/// colon
fn looks_like_key(raw: &str) -> bool {
    let raw = raw.trim();
    !raw.is_empty()
        && raw.split_whitespace().count() <= 8
        && raw
            .chars()
            .all(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '.' | '\'' | '?'))
}

fn collect_values(text: &str) -> BTreeMap<Key, String> {
    let mut values: BTreeMap<Key, String> = BTreeMap::new();
    let mut last: Option<Key> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        let labelled = trimmed.split_once(':').filter(|(key, _)| looks_like_key(key));
        let keyed = labelled.and_then(|(key, value)| Key::lookup(key).map(|key| (key, value.trim())));
        if labelled.is_some() && keyed.is_none() {
            // A field this parser does not know, such as Artist
            last = None;
            continue;
        }

        match keyed {
            Some((key, value)) => {
                last = Some(key);
                if value.is_empty() || PLACEHOLDERS.contains(&value.to_lowercase().as_str()) {
                    continue;
                }
                // Repeated keys, such as one Fusion line per part, accumulate
                values
                    .entry(key)
                    .and_modify(|existing| {
                        existing.push('\n');
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.to_string());
            }
            None => match last {
                Some(key) if key.long_form() && !trimmed.is_empty() => {
                    let entry = values.entry(key).or_default();
                    if !entry.is_empty() {
                        entry.push('\n');
                    }
                    entry.push_str(trimmed);
                }
                _ => {
                    if !trimmed.is_empty() {
                        tracing::trace!(line = trimmed, "ignoring sheet line");
                    }
                }
            },
        }
    }
    values
}

/// Read a sheet into a draft character. Nothing here fails: what cannot be
/// understood is left for the submission wizard to report.
pub fn parse_sheet(text: &str, catalog: &Catalog, author: u64, server: u64) -> ParsedSheet {
    let values = collect_values(text);
    let mut character = Character::new(author, server);
    let mut unresolved = Vec::new();
    let mut miss = |key: &str, value: &str| unresolved.push(format!("{key}: {value}"));

    if let Some(name) = values.get(&Key::Name) {
        character.name = name.lines().next().unwrap_or_default().trim().to_string();
    }
    if let Some(age) = values.get(&Key::Age) {
        let digits: String = age.chars().filter(char::is_ascii_digit).take(3).collect();
        character.set_age(digits.parse::<i64>().ok());
    }
    if let Some(pronoun) = values.get(&Key::Pronoun) {
        character.pronoun = Pronoun::deduce(pronoun);
    }
    character.backstory = values.get(&Key::Backstory).cloned();
    character.extra = values.get(&Key::Extra).cloned();
    if let Some(url) = values
        .get(&Key::Image)
        .filter(|url| url.starts_with("https://") || url.starts_with("http://"))
    {
        character.image = ImageRef::Url { url: url.clone() };
    }

    let kind = values.get(&Key::Kind).and_then(|kind| Template::deduce(kind));
    let species = resolve_species(&values, kind, catalog, &mut miss);
    let template = species
        .as_ref()
        .map(Species::template)
        .or(kind)
        .unwrap_or(Template::Pokemon);

    if let Some(mut species) = species {
        if let Some(text) = values.get(&Key::Types) {
            let types = Typing::deduce_many(text);
            if !species.set_types(types) && species.has_custom_types() {
                miss("Types", text);
            }
        }

        let moves = values
            .get(&Key::Moveset)
            .map(|text| resolve_moves(text, catalog, "Moveset", &mut miss));
        if species.has_custom_movepool() {
            let pool = values
                .get(&Key::Movepool)
                .map(|text| resolve_moves(text, catalog, "Movepool", &mut miss))
                .or_else(|| moves.clone())
                .unwrap_or_default();
            if !pool.is_empty() {
                species.set_movepool(Movepool::from_moves(pool));
            }
        }

        let abilities = values.get(&Key::Abilities).map(|text| {
            let mut found = BTreeSet::new();
            for item in split_list(text) {
                match catalog.deduce_ability(item) {
                    Some(ability) => {
                        found.insert(ability.name.clone());
                    }
                    None => miss("Abilities", item),
                }
            }
            found
        });
        if let Some(abilities) = &abilities {
            if species.has_custom_abilities() {
                species.set_abilities(abilities.clone());
            }
        }

        character.assign_species(species);
        if let Some(abilities) = abilities.filter(|a| !a.is_empty()) {
            character.abilities = abilities;
        }
        if let Some(moves) = moves.filter(|m| !m.is_empty()) {
            character.moveset = moves;
        }
    }

    let sp = SpAbility {
        name: values.get(&Key::SpName).cloned().unwrap_or_default(),
        description: values.get(&Key::SpDescription).cloned().unwrap_or_default(),
        origin: values.get(&Key::SpOrigin).cloned().unwrap_or_default(),
        pros: values.get(&Key::SpPros).cloned().unwrap_or_default(),
        cons: values.get(&Key::SpCons).cloned().unwrap_or_default(),
        kind: Default::default(),
    };
    if sp != SpAbility::default() {
        if character.can_have_special_abilities() {
            character.sp_ability = Some(sp);
        } else {
            miss("Special Ability", &sp.name);
        }
    }

    tracing::debug!(
        author,
        template = template.label(),
        unresolved = unresolved.len(),
        "sheet parsed"
    );
    ParsedSheet {
        template,
        character,
        unresolved,
    }
}

fn resolve_moves(
    text: &str,
    catalog: &Catalog,
    key: &str,
    miss: &mut impl FnMut(&str, &str),
) -> BTreeSet<CompactString> {
    let mut found = BTreeSet::new();
    for item in split_list(text) {
        match catalog.deduce_move(item) {
            Some(found_move) if !found_move.banned => {
                found.insert(found_move.name.clone());
            }
            _ => miss(key, item),
        }
    }
    found
}

fn resolve_species(
    values: &BTreeMap<Key, String>,
    kind: Option<Template>,
    catalog: &Catalog,
    miss: &mut impl FnMut(&str, &str),
) -> Option<Species> {
    if let Some(text) = values.get(&Key::Fakemon) {
        let name = text.lines().next().unwrap_or_default().trim();
        let lowered = name.to_lowercase();
        if let Some(base) = lowered.strip_prefix("mega ") {
            let found = catalog.deduce_species(base).map(CustomMega::new);
            if found.is_none() {
                miss("Fakemon", name);
            }
            return found.map(Species::CustomMega);
        }
        if let Some(base) = lowered.strip_prefix("variant ") {
            let found = catalog
                .deduce_species(base)
                .map(|base| Variant::new(base, "Variant"));
            if found.is_none() {
                miss("Fakemon", name);
            }
            return found.map(Species::Variant);
        }
        let origin = kind
            .and_then(Template::fakemon_origin)
            .unwrap_or(FakemonOrigin::Regular);
        return Some(Species::Fakemon(Fakemon::new(name, origin)));
    }

    let fusion_text = values.get(&Key::Fusion).cloned().or_else(|| {
        values
            .get(&Key::Species)
            .filter(|text| text.contains('/'))
            .cloned()
    });
    if let Some(text) = fusion_text {
        let parts: Vec<&str> = text
            .split(['/', ',', '\n'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        let resolved: Vec<_> = parts
            .iter()
            .filter_map(|part| catalog.deduce_species(part))
            .collect();
        return match <[_; 2]>::try_from(resolved) {
            Ok([first, second]) => match Fusion::new(first, second) {
                Ok(fusion) => Some(Species::Fusion(fusion)),
                Err(e) => {
                    tracing::debug!("sheet fusion rejected: {}", e);
                    miss("Fusion", &text);
                    None
                }
            },
            Err(_) => {
                miss("Fusion", &text);
                None
            }
        };
    }

    let text = values.get(&Key::Species)?;
    let found = catalog.deduce_species(text).map(Species::Pokemon);
    if found.is_none() {
        miss("Species", text);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Field;
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        Catalog::bundled().unwrap()
    }

    #[test]
    fn test_parse_canon_sheet() {
        let sheet = "\
Name: Sparky
Age: 19 years
Species: Pikachu
Pronoun: She/Her
Moveset: Thunderbolt, Quick Attack, Iron Tail
Backstory: Grew up in a power plant.
Kept the lights on for years.
Random chatter nobody asked for
Artist: someone";

        let parsed = parse_sheet(sheet, &catalog(), 7, 1);
        let oc = &parsed.character;
        assert_eq!(parsed.template, Template::Pokemon);
        assert_eq!(oc.name, "Sparky");
        assert_eq!(oc.age, Some(19));
        assert_eq!(oc.pronoun, Pronoun::She);
        assert_eq!(oc.abilities, BTreeSet::from([CompactString::from("Static")]));
        assert_eq!(oc.moveset.len(), 3);
        assert_eq!(
            oc.backstory.as_deref(),
            Some("Grew up in a power plant.\nKept the lights on for years.\nRandom chatter nobody asked for")
        );
        assert!(parsed.unresolved.is_empty());
        assert_eq!(Field::Moveset.evaluate(oc, &catalog()), None);
    }

    #[test]
    fn test_placeholders_are_blank() {
        let parsed = parse_sheet("Name: OC's Name\nSpecies: OC's Species", &catalog(), 7, 1);
        assert!(parsed.character.name.is_empty());
        assert!(parsed.character.species.is_none());
        assert!(parsed.unresolved.is_empty());
    }

    #[test]
    fn test_unknown_references_are_reported() {
        let sheet = "Species: Pikachu\nMoveset: Thunderbolt, Laser Kitten Beam";
        let parsed = parse_sheet(sheet, &catalog(), 7, 1);
        assert_eq!(parsed.unresolved, vec!["Moveset: Laser Kitten Beam".to_string()]);
        assert_eq!(
            parsed.character.moveset,
            BTreeSet::from([CompactString::from("Thunderbolt")])
        );
    }

    #[test]
    fn test_parse_fusion_lines() {
        let parsed = parse_sheet("Fusion: Charizard\nFusion: Bulbasaur", &catalog(), 7, 1);
        assert_eq!(parsed.template, Template::Fusion);
        assert!(matches!(parsed.character.species, Some(Species::Fusion(_))));

        let parsed = parse_sheet("Species: Charizard/Charizard", &catalog(), 7, 1);
        assert!(parsed.character.species.is_none());
        assert_eq!(parsed.unresolved.len(), 1);
    }

    #[test]
    fn test_parse_fakemon_sheet() {
        let sheet = "\
F. Species: Voltmouse
Types: Electric/Fairy
Abilities: Static
Moveset: Thunderbolt, Swift
What is it Called?: Overcharge
What does the Special Ability do?: Stores lightning.";

        let parsed = parse_sheet(sheet, &catalog(), 7, 1);
        let oc = &parsed.character;
        assert_eq!(parsed.template, Template::Fakemon);
        let Some(Species::Fakemon(fakemon)) = &oc.species else {
            panic!("expected a fan-made species, got {:?}", oc.species);
        };
        assert_eq!(fakemon.name, "Voltmouse");
        assert_eq!(oc.types(), BTreeSet::from([Typing::Electric, Typing::Fairy]));
        assert_eq!(fakemon.movepool.all(), oc.moveset);
        assert_eq!(oc.abilities, BTreeSet::from([CompactString::from("Static")]));
        let sp = oc.sp_ability.as_ref().unwrap();
        assert_eq!(sp.name, "Overcharge");
        assert!(!sp.is_complete());
    }

    #[test]
    fn test_parse_custom_mega() {
        let parsed = parse_sheet("Fakemon: Mega Pikachu", &catalog(), 7, 1);
        assert_eq!(parsed.template, Template::CustomMega);
    }
}
