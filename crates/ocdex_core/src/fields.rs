//! Field validators and collectors.
//!
//! Every editable part of a character is a [`Field`]. Validation is pure:
//! [`Field::evaluate`] reads the character and reports a defect string or
//! nothing. [`Field::collect`] is the only place that talks to the user.

use crate::catalog::{Catalog, Movepool, Pronoun, SpeciesClass, SpeciesData, Typing, join_types};
use crate::character::{Character, MAX_MOVES, SpAbility, TraitKind};
use crate::prompt::{Answer, CHOICE_LIMIT, ChoiceOption, ChoiceRequest, Prompter, TextRequest};
use crate::species::{CustomMega, Fakemon, Fusion, Species, Template, Variant};
use crate::{CoreError, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const NAME_LIMIT: usize = 100;
const BACKSTORY_LIMIT: usize = 4000;
const EXTRA_LIMIT: usize = 1024;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Age,
    Pronoun,
    Species,
    PreEvolution,
    Types,
    Moveset,
    Movepool,
    Abilities,
    HiddenPower,
    SpecialAbility,
    Backstory,
    Extra,
    Image,
}

/// Result of running a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    Updated,
    Unchanged,
    Cancelled,
}

macro_rules! answer {
    ($answer:expr) => {
        match $answer {
            Answer::Value(value) => value,
            Answer::Skipped => return Ok(FieldOutcome::Unchanged),
            Answer::Cancelled => return Ok(FieldOutcome::Cancelled),
        }
    };
}

impl Field {
    /// Menu order
    pub const ALL: [Field; 14] = [
        Field::Name,
        Field::Species,
        Field::PreEvolution,
        Field::Types,
        Field::Abilities,
        Field::Movepool,
        Field::Moveset,
        Field::SpecialAbility,
        Field::HiddenPower,
        Field::Age,
        Field::Pronoun,
        Field::Backstory,
        Field::Extra,
        Field::Image,
    ];

    /// Fields whose progress depends on the species
    pub const SPECIES_BOUND: [Field; 4] =
        [Field::Species, Field::Types, Field::Abilities, Field::Moveset];

    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Age => "Age",
            Field::Pronoun => "Pronoun",
            Field::Species => "Species",
            Field::PreEvolution => "Pre-Evolution",
            Field::Types => "Types",
            Field::Moveset => "Moveset",
            Field::Movepool => "Movepool",
            Field::Abilities => "Abilities",
            Field::HiddenPower => "Hidden Power",
            Field::SpecialAbility => "Special Ability",
            Field::Backstory => "Backstory",
            Field::Extra => "Extra Information",
            Field::Image => "Image",
        }
    }

    pub fn applicable(self, character: &Character, template: Template) -> bool {
        let species = character.species.as_ref();
        match self {
            Field::PreEvolution => template.fakemon_origin().is_some(),
            Field::Types => match template {
                Template::Fusion => species.is_none_or(Species::has_custom_types),
                Template::Variant | Template::CustomMega => true,
                other => other.fakemon_origin().is_some(),
            },
            Field::Movepool => {
                template == Template::Variant || template.fakemon_origin().is_some()
            }
            Field::Abilities => {
                species.is_none_or(|s| s.has_custom_abilities() || !s.abilities().is_empty())
            }
            Field::SpecialAbility => {
                template.can_have_special_abilities()
                    && species.is_none_or(Species::can_have_special_abilities)
            }
            _ => true,
        }
    }

    /// Whether the field must be filled before submitting
    pub fn required(self, character: &Character) -> bool {
        match self {
            Field::Name | Field::Species | Field::Moveset => true,
            Field::Types | Field::Movepool | Field::Abilities => character.species.is_some(),
            Field::Image => character.requires_image(),
            _ => false,
        }
    }

    /// Describe what is wrong with the field, if anything
    pub fn evaluate(self, character: &Character, catalog: &Catalog) -> Option<String> {
        let species = character.species.as_ref();
        match self {
            Field::Name => character
                .name
                .trim()
                .is_empty()
                .then(|| "Missing Name".to_string()),
            Field::Age | Field::Pronoun | Field::HiddenPower | Field::Backstory | Field::Extra => {
                None
            }
            Field::Species => match species {
                None => Some("Missing Species".to_string()),
                Some(s) if s.banned() => Some(format!("{} is banned", s.name())),
                Some(_) => None,
            },
            Field::PreEvolution => match species {
                Some(Species::Fakemon(f)) => f
                    .evolves_from
                    .as_ref()
                    .filter(|pre| pre.banned)
                    .map(|pre| format!("{} is banned", pre.name)),
                _ => None,
            },
            Field::Types => {
                let types = character.types();
                if species.is_none() || types.is_empty() {
                    Some("Missing Types".to_string())
                } else if types.len() > 2 {
                    Some("Too many types, max 2".to_string())
                } else {
                    None
                }
            }
            Field::Movepool => match species {
                Some(s) if s.has_custom_movepool() && s.movepool().is_empty() => {
                    Some("Missing Movepool".to_string())
                }
                _ => None,
            },
            Field::Moveset => {
                if character.moveset.is_empty() {
                    return Some("Missing Moveset".to_string());
                }
                if character.moveset.len() > MAX_MOVES {
                    return Some(format!("Too many moves, max {MAX_MOVES}"));
                }
                let illegal = character.illegal_moves();
                if !illegal.is_empty() {
                    return Some(format!("Moves not in the movepool: {}", join(&illegal)));
                }
                let banned = catalog.banned_moves(&character.moveset);
                (!banned.is_empty()).then(|| format!("Banned moves: {}", join(&banned)))
            }
            Field::Abilities => {
                let species = species?;
                let max = character.max_amount_abilities();
                if character.abilities.is_empty() {
                    return Some("Missing Abilities".to_string());
                }
                if character.abilities.len() > max {
                    return Some(format!("Too many abilities, max {max}"));
                }
                let stray: BTreeSet<CompactString> = if species.has_custom_abilities() {
                    character
                        .abilities
                        .iter()
                        .filter(|a| catalog.ability(a).is_none())
                        .cloned()
                        .collect()
                } else {
                    character
                        .abilities
                        .difference(&species.abilities())
                        .cloned()
                        .collect()
                };
                (!stray.is_empty())
                    .then(|| format!("Abilities {} cannot have: {}", species.name(), join(&stray)))
            }
            Field::SpecialAbility => {
                let sp = character.sp_ability.as_ref()?;
                if !species.is_some_and(Species::can_have_special_abilities) {
                    Some("Special ability not allowed for this species".to_string())
                } else if !sp.is_complete() {
                    Some("Special ability is incomplete".to_string())
                } else {
                    None
                }
            }
            Field::Image => (character.requires_image() && character.image.is_default())
                .then(|| "Missing Image".to_string()),
        }
    }

    /// Ask for a new value and write it into `character`.
    ///
    /// Errors leave the character partially written; callers run this on a
    /// working copy.
    pub async fn collect(
        self,
        prompter: &dyn Prompter,
        catalog: &Catalog,
        template: Template,
        character: &mut Character,
    ) -> Result<FieldOutcome> {
        tracing::debug!(field = self.label(), "collecting field");
        match self {
            Field::Name => {
                let request = TextRequest::new("Character", "Name")
                    .default_value(Some(character.name.clone()).filter(|n| !n.is_empty()))
                    .max_length(NAME_LIMIT)
                    .required();
                let name = answer!(prompter.text(request).await?).trim().to_string();
                if name.is_empty() || name == character.name {
                    return Ok(FieldOutcome::Unchanged);
                }
                character.name = name;
                Ok(FieldOutcome::Updated)
            }
            Field::Age => {
                let request = TextRequest::new("Character", "Age")
                    .placeholder("13 to 99, empty if unknown")
                    .default_value(character.age.map(|a| a.to_string()))
                    .max_length(3);
                let text = answer!(prompter.text(request).await?);
                let digits: String = text.chars().filter(char::is_ascii_digit).collect();
                let before = character.age;
                character.set_age(digits.parse::<i64>().ok());
                Ok(changed(before != character.age))
            }
            Field::Pronoun => {
                let options = Pronoun::ALL
                    .iter()
                    .map(|p| ChoiceOption::new(p.label()).selected(*p == character.pronoun))
                    .collect();
                let picked = answer!(
                    prompter
                        .choose(ChoiceRequest::single("Pronoun", options))
                        .await?
                );
                let pronoun = first(&picked, &Pronoun::ALL, "Pronoun")?;
                let before = character.pronoun;
                character.pronoun = pronoun;
                Ok(changed(before != pronoun))
            }
            Field::Species => collect_species(prompter, catalog, template, character).await,
            Field::PreEvolution => collect_pre_evolution(prompter, catalog, character).await,
            Field::Types => collect_types(prompter, character).await,
            Field::Movepool => collect_movepool(prompter, catalog, character).await,
            Field::Moveset => collect_moveset(prompter, catalog, character).await,
            Field::Abilities => collect_abilities(prompter, catalog, character).await,
            Field::HiddenPower => {
                let options = Typing::ALL
                    .iter()
                    .map(|t| ChoiceOption::new(t.name()).selected(Some(*t) == character.hidden_power))
                    .collect();
                let picked = answer!(
                    prompter
                        .choose(ChoiceRequest::single("Hidden Power", options))
                        .await?
                );
                let typing = first(&picked, &Typing::ALL, "Hidden Power")?;
                let before = character.hidden_power.replace(typing);
                Ok(changed(before != Some(typing)))
            }
            Field::SpecialAbility => collect_special_ability(prompter, character).await,
            Field::Backstory => {
                let request = TextRequest::new("Character", "Backstory")
                    .default_value(character.backstory.clone())
                    .max_length(BACKSTORY_LIMIT)
                    .multiline();
                let text = answer!(prompter.text(request).await?);
                Ok(set_optional_text(&mut character.backstory, text))
            }
            Field::Extra => {
                let request = TextRequest::new("Character", "Extra Information")
                    .default_value(character.extra.clone())
                    .max_length(EXTRA_LIMIT)
                    .multiline();
                let text = answer!(prompter.text(request).await?);
                Ok(set_optional_text(&mut character.extra, text))
            }
            Field::Image => {
                let default = character.default_image();
                let image = answer!(prompter.image("Image", default.as_deref()).await?);
                if image == character.image {
                    return Ok(FieldOutcome::Unchanged);
                }
                character.image = image;
                Ok(FieldOutcome::Updated)
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn changed(changed: bool) -> FieldOutcome {
    if changed {
        FieldOutcome::Updated
    } else {
        FieldOutcome::Unchanged
    }
}

fn join(names: &BTreeSet<CompactString>) -> String {
    names
        .iter()
        .map(CompactString::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn first<T: Copy>(picked: &[usize], options: &[T], field: &str) -> Result<T> {
    picked
        .first()
        .and_then(|idx| options.get(*idx))
        .copied()
        .ok_or_else(|| CoreError::input_failed(field, "no option picked"))
}

fn set_optional_text(slot: &mut Option<String>, text: String) -> FieldOutcome {
    let text = text.trim();
    let value = (!text.is_empty()).then(|| text.to_string());
    if *slot == value {
        return FieldOutcome::Unchanged;
    }
    *slot = value;
    FieldOutcome::Updated
}

async fn ask(prompter: &dyn Prompter, request: TextRequest) -> Result<Answer<String>> {
    Ok(prompter.text(request).await?.map(|s| s.trim().to_string()))
}

/// Pick names out of a pool. Small pools are offered as a menu, larger ones
/// are typed and fuzzy matched with `resolve`.
async fn pick(
    prompter: &dyn Prompter,
    title: &str,
    category: &'static str,
    pool: &[CompactString],
    current: &BTreeSet<CompactString>,
    (min, max): (usize, usize),
    resolve: impl Fn(&str) -> Option<CompactString> + Send + Sync,
) -> Result<Answer<BTreeSet<CompactString>>> {
    if pool.len() <= CHOICE_LIMIT {
        let options = pool
            .iter()
            .map(|name| ChoiceOption::new(name.as_str()).selected(current.contains(name)))
            .collect();
        let answer = prompter
            .choose(ChoiceRequest::many(title, options, min, max))
            .await?;
        return Ok(answer.map(|picked| {
            picked
                .into_iter()
                .filter_map(|idx| pool.get(idx).cloned())
                .collect()
        }));
    }

    let default = join(current);
    let request = TextRequest::new(title, title)
        .placeholder(format!("Up to {max}, separated by commas"))
        .default_value(Some(default).filter(|d| !d.is_empty()))
        .multiline();
    let text = match prompter.text(request).await? {
        Answer::Value(text) => text,
        Answer::Skipped => return Ok(Answer::Skipped),
        Answer::Cancelled => return Ok(Answer::Cancelled),
    };

    let mut picked = BTreeSet::new();
    for item in text.split([',', '\n']).map(str::trim).filter(|s| !s.is_empty()) {
        picked.insert(resolve(item).ok_or_else(|| CoreError::unknown(category, item))?);
    }
    if picked.len() > max {
        return Err(CoreError::input_failed(
            title,
            format!("at most {max} can be picked"),
        ));
    }
    Ok(Answer::Value(picked))
}

async fn collect_species(
    prompter: &dyn Prompter,
    catalog: &Catalog,
    template: Template,
    character: &mut Character,
) -> Result<FieldOutcome> {
    let current = character.species.as_ref().map(Species::name);
    let request = |label: &str| {
        TextRequest::new(template.label(), label)
            .default_value(current.clone())
            .required()
    };
    let resolve = |query: &str, filter: &dyn Fn(&SpeciesData) -> bool| {
        catalog
            .deduce_species_where(query, |s| !s.banned && filter(s))
            .ok_or_else(|| CoreError::unknown("species", query))
    };

    let species = if let Some(class) = template.class() {
        let query = answer!(ask(prompter, request("Species")).await?);
        Species::Pokemon(resolve(&query, &|s: &SpeciesData| s.class == class)?)
    } else {
        match template {
            Template::Fusion => {
                let first = answer!(ask(prompter, request("First species")).await?);
                let second = answer!(
                    ask(prompter, TextRequest::new("Fusion", "Second species").required()).await?
                );
                let fusion = Fusion::new(
                    resolve(&first, &|s: &SpeciesData| s.is_common())?,
                    resolve(&second, &|s: &SpeciesData| s.is_common())?,
                )?;
                Species::Fusion(fusion)
            }
            Template::Variant => {
                let base = answer!(ask(prompter, request("Base species")).await?);
                let base = resolve(&base, &|s: &SpeciesData| s.is_common())?;
                let name = answer!(
                    ask(
                        prompter,
                        TextRequest::new("Variant", "Variant name")
                            .placeholder("e.g. Shadow")
                            .max_length(NAME_LIMIT)
                            .required(),
                    )
                    .await?
                );
                match &character.species {
                    Some(Species::Variant(v)) if v.base.id == base.id => {
                        let mut variant = v.clone();
                        variant.name = name.into();
                        Species::Variant(variant)
                    }
                    _ => Species::Variant(Variant::new(base, name)),
                }
            }
            Template::CustomMega => {
                let base = answer!(ask(prompter, request("Base species")).await?);
                let base = resolve(&base, &|s: &SpeciesData| s.class != SpeciesClass::Mega)?;
                Species::CustomMega(CustomMega::new(base))
            }
            other => {
                let origin = other.fakemon_origin().unwrap_or_default();
                let name = answer!(
                    ask(
                        prompter,
                        request("Species name").max_length(NAME_LIMIT)
                    )
                    .await?
                );
                if name.is_empty() {
                    return Ok(FieldOutcome::Unchanged);
                }
                match &character.species {
                    Some(Species::Fakemon(f)) if f.origin == origin => {
                        let mut fakemon = f.clone();
                        fakemon.name = name.into();
                        Species::Fakemon(fakemon)
                    }
                    _ => Species::Fakemon(Fakemon::new(name, origin)),
                }
            }
        }
    };

    if character.species.as_ref() == Some(&species) {
        return Ok(FieldOutcome::Unchanged);
    }
    character.assign_species(species);
    Ok(FieldOutcome::Updated)
}

async fn collect_pre_evolution(
    prompter: &dyn Prompter,
    catalog: &Catalog,
    character: &mut Character,
) -> Result<FieldOutcome> {
    let Some(Species::Fakemon(fakemon)) = character.species.as_mut() else {
        return Err(CoreError::input_failed(
            "Pre-Evolution",
            "only fan-made species have a pre-evolution",
        ));
    };
    let request = TextRequest::new("Fakemon", "Evolves from")
        .placeholder("Leave empty if it does not evolve from anything")
        .default_value(fakemon.evolves_from.as_ref().map(|s| s.name.to_string()));
    let query = answer!(ask(prompter, request).await?);

    let pre = if query.is_empty() {
        None
    } else {
        Some(
            catalog
                .deduce_species_where(&query, |s| !s.banned)
                .ok_or_else(|| CoreError::unknown("species", query.as_str()))?,
        )
    };
    if fakemon.evolves_from == pre {
        return Ok(FieldOutcome::Unchanged);
    }
    if let Some(pre) = &pre {
        if fakemon.movepool.is_empty() {
            fakemon.movepool = pre.movepool.clone();
        }
        if fakemon.types.is_empty() {
            fakemon.types = pre.types.clone();
        }
    }
    fakemon.evolves_from = pre;
    Ok(FieldOutcome::Updated)
}

async fn collect_types(prompter: &dyn Prompter, character: &mut Character) -> Result<FieldOutcome> {
    let current = character.types();
    let Some(species) = character.species.as_mut() else {
        return Err(CoreError::input_failed("Types", "pick a species first"));
    };

    let types = if let Species::Fusion(fusion) = species {
        let options = fusion.possible_types();
        let choices = options
            .iter()
            .map(|types| ChoiceOption::new(join_types(types)).selected(*types == current))
            .collect();
        let picked = answer!(
            prompter
                .choose(ChoiceRequest::single("Fusion Typing", choices))
                .await?
        );
        picked
            .first()
            .and_then(|idx| options.get(*idx))
            .cloned()
            .ok_or_else(|| CoreError::input_failed("Types", "no option picked"))?
    } else {
        let choices = Typing::ALL
            .iter()
            .map(|t| ChoiceOption::new(t.name()).selected(current.contains(t)))
            .collect();
        let picked = answer!(
            prompter
                .choose(ChoiceRequest::many("Types", choices, 1, 2))
                .await?
        );
        picked
            .into_iter()
            .filter_map(|idx| Typing::ALL.get(idx).copied())
            .collect()
    };

    if types == current {
        return Ok(FieldOutcome::Unchanged);
    }
    if !species.set_types(types) {
        return Err(CoreError::input_failed(
            "Types",
            "that typing is not allowed for this species",
        ));
    }
    Ok(FieldOutcome::Updated)
}

async fn collect_movepool(
    prompter: &dyn Prompter,
    catalog: &Catalog,
    character: &mut Character,
) -> Result<FieldOutcome> {
    let current = character.total_movepool();
    let request = TextRequest::new("Movepool", "Moves")
        .placeholder("Every move the species can learn, separated by commas")
        .default_value(Some(join(&current.all())).filter(|d| !d.is_empty()))
        .multiline();
    let text = answer!(ask(prompter, request).await?);

    let mut moves = BTreeSet::new();
    for item in text.split([',', '\n']).map(str::trim).filter(|s| !s.is_empty()) {
        let found = catalog
            .deduce_move(item)
            .ok_or_else(|| CoreError::unknown("move", item))?;
        if !found.banned {
            moves.insert(found.name.clone());
        }
    }
    if moves == current.all() {
        return Ok(FieldOutcome::Unchanged);
    }

    let movepool = Movepool::from_moves(moves);
    let accepted = character
        .species
        .as_mut()
        .is_some_and(|s| s.set_movepool(movepool.clone()));
    if !accepted {
        return Err(CoreError::input_failed(
            "Movepool",
            "this species uses its canon movepool",
        ));
    }
    character.moveset.retain(|m| movepool.contains(m));
    Ok(FieldOutcome::Updated)
}

async fn collect_moveset(
    prompter: &dyn Prompter,
    catalog: &Catalog,
    character: &mut Character,
) -> Result<FieldOutcome> {
    let movepool = character.total_movepool().all();
    if movepool.is_empty() {
        return Err(CoreError::input_failed("Moveset", "the species has no movepool yet"));
    }
    let banned = catalog.banned_moves(&movepool);
    let legal: BTreeSet<CompactString> = movepool.difference(&banned).cloned().collect();
    let pool: Vec<CompactString> = legal.iter().cloned().collect();

    let moveset = answer!(
        pick(
            prompter,
            "Moveset",
            "move",
            &pool,
            &character.moveset,
            (1, MAX_MOVES),
            |text| catalog.deduce_move_in(text, &legal).map(|m| m.name.clone()),
        )
        .await?
    );
    if moveset == character.moveset {
        return Ok(FieldOutcome::Unchanged);
    }
    character.moveset = moveset;
    Ok(FieldOutcome::Updated)
}

async fn collect_abilities(
    prompter: &dyn Prompter,
    catalog: &Catalog,
    character: &mut Character,
) -> Result<FieldOutcome> {
    let Some(species) = character.species.as_ref() else {
        return Err(CoreError::input_failed("Abilities", "pick a species first"));
    };
    let custom = species.has_custom_abilities();
    let legal: BTreeSet<CompactString> = if custom {
        catalog.all_abilities().map(|a| a.name.clone()).collect()
    } else {
        species.abilities()
    };
    if legal.is_empty() {
        return Ok(FieldOutcome::Unchanged);
    }
    let pool: Vec<CompactString> = legal.iter().cloned().collect();
    let max = character.max_amount_abilities();

    let abilities = answer!(
        pick(
            prompter,
            "Abilities",
            "ability",
            &pool,
            &character.abilities,
            (1, max),
            |text| {
                let found = if custom {
                    catalog.deduce_ability(text)
                } else {
                    catalog.deduce_ability_in(text, &legal)
                };
                found.map(|a| a.name.clone())
            },
        )
        .await?
    );
    if abilities == character.abilities {
        return Ok(FieldOutcome::Unchanged);
    }
    if custom {
        if let Some(species) = character.species.as_mut() {
            species.set_abilities(abilities.clone());
        }
    }
    character.abilities = abilities;
    Ok(FieldOutcome::Updated)
}

async fn collect_special_ability(
    prompter: &dyn Prompter,
    character: &mut Character,
) -> Result<FieldOutcome> {
    if character.sp_ability.is_none() && !character.can_have_special_abilities() {
        return Err(CoreError::input_failed(
            "Special Ability",
            "needs an eligible species and at most one ability",
        ));
    }

    let wanted = answer!(
        prompter
            .confirm("Does the character have a special ability?")
            .await?
    );
    if !wanted {
        return Ok(changed(character.sp_ability.take().is_some()));
    }

    let mut sp = character.sp_ability.clone().unwrap_or_default();
    for (label, slot, multiline) in [
        ("Name", &mut sp.name, false),
        ("Description", &mut sp.description, true),
        ("Origin", &mut sp.origin, true),
        ("Pros", &mut sp.pros, true),
        ("Cons", &mut sp.cons, true),
    ] {
        let mut request = TextRequest::new("Special Ability", label)
            .default_value(Some(slot.clone()).filter(|s| !s.is_empty()))
            .required();
        if multiline {
            request = request.multiline().max_length(EXTRA_LIMIT);
        } else {
            request = request.max_length(NAME_LIMIT);
        }
        match ask(prompter, request).await? {
            Answer::Value(value) => *slot = value,
            Answer::Skipped => {}
            Answer::Cancelled => return Ok(FieldOutcome::Cancelled),
        }
    }

    let options = TraitKind::ALL
        .iter()
        .map(|k| ChoiceOption::new(k.label()).selected(*k == sp.kind))
        .collect();
    match prompter
        .choose(ChoiceRequest::single("Special Ability Kind", options))
        .await?
    {
        Answer::Value(picked) => sp.kind = first(&picked, &TraitKind::ALL, "Special Ability")?,
        Answer::Skipped => {}
        Answer::Cancelled => return Ok(FieldOutcome::Cancelled),
    }

    let before: Option<SpAbility> = character.sp_ability.replace(sp);
    Ok(changed(before != character.sp_ability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedPrompter;
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        Catalog::bundled().unwrap()
    }

    fn pikachu(catalog: &Catalog) -> Character {
        let mut oc = Character::new(1, 2);
        oc.assign_species(Species::Pokemon(catalog.species("pikachu").unwrap()));
        oc
    }

    fn defects(oc: &Character, template: Template, catalog: &Catalog) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| f.applicable(oc, template))
            .filter(|f| f.evaluate(oc, catalog).is_some())
            .collect()
    }

    #[test]
    fn test_pikachu_needs_name_and_moveset() {
        let catalog = catalog();
        let oc = pikachu(&catalog);
        assert_eq!(Field::Abilities.evaluate(&oc, &catalog), None);
        assert_eq!(
            defects(&oc, Template::Pokemon, &catalog),
            vec![Field::Name, Field::Moveset]
        );
    }

    #[test]
    fn test_too_many_abilities_is_a_defect() {
        let catalog = catalog();
        let mut oc = Character::new(1, 2);
        oc.assign_species(Species::Pokemon(catalog.species("eevee").unwrap()));
        oc.abilities = catalog.species("eevee").unwrap().abilities.clone();
        assert_eq!(oc.abilities.len(), 3);
        assert_eq!(
            Field::Abilities.evaluate(&oc, &catalog).as_deref(),
            Some("Too many abilities, max 2")
        );
    }

    #[test]
    fn test_applicability_follows_template() {
        let catalog = catalog();
        let oc = pikachu(&catalog);
        assert!(!Field::Movepool.applicable(&oc, Template::Pokemon));
        assert!(!Field::Types.applicable(&oc, Template::Pokemon));
        assert!(Field::Movepool.applicable(&Character::new(1, 2), Template::Fakemon));
        assert!(!Field::SpecialAbility.applicable(&Character::new(1, 2), Template::Legendary));
    }

    #[test]
    fn test_fakemon_requires_image_and_movepool() {
        let catalog = catalog();
        let mut oc = Character::new(1, 2);
        oc.name = "Voltori".into();
        oc.assign_species(Species::Fakemon(Fakemon::new(
            "Voltori",
            crate::species::FakemonOrigin::Regular,
        )));
        let found = defects(&oc, Template::Fakemon, &catalog);
        assert!(found.contains(&Field::Image));
        assert!(found.contains(&Field::Movepool));
        assert!(found.contains(&Field::Types));
    }

    #[tokio::test]
    async fn test_collect_moveset_from_menu() {
        let catalog = catalog();
        let mut oc = pikachu(&catalog);
        let pool: Vec<CompactString> = oc.total_movepool().all().into_iter().collect();
        let thunderbolt = pool.iter().position(|m| m == "Thunderbolt").unwrap();
        let prompter = ScriptedPrompter::new().choose([thunderbolt]);

        let outcome = Field::Moveset
            .collect(&prompter, &catalog, Template::Pokemon, &mut oc)
            .await
            .unwrap();
        assert_eq!(outcome, FieldOutcome::Updated);
        assert_eq!(oc.moveset, BTreeSet::from([CompactString::from("Thunderbolt")]));
        assert!(oc.illegal_moves().is_empty());
    }

    #[tokio::test]
    async fn test_collect_species_rejects_self_fusion() {
        let catalog = catalog();
        let mut oc = Character::new(1, 2);
        let prompter = ScriptedPrompter::new().text("Charizard").text("charizard");

        let err = Field::Species
            .collect(&prompter, &catalog, Template::Fusion, &mut oc)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidFusion { .. }));
        assert!(oc.species.is_none());
    }

    #[tokio::test]
    async fn test_collect_unknown_species_fails() {
        let catalog = catalog();
        let mut oc = Character::new(1, 2);
        let prompter = ScriptedPrompter::new().text("Definitely Not A Pokemon");

        let err = Field::Species
            .collect(&prompter, &catalog, Template::Pokemon, &mut oc)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownEntity { category: "species", .. }));
    }

    #[tokio::test]
    async fn test_collect_skip_keeps_value() {
        let catalog = catalog();
        let mut oc = pikachu(&catalog);
        oc.name = "Ash".into();
        let prompter = ScriptedPrompter::new().skip();

        let outcome = Field::Name
            .collect(&prompter, &catalog, Template::Pokemon, &mut oc)
            .await
            .unwrap();
        assert_eq!(outcome, FieldOutcome::Unchanged);
        assert_eq!(oc.name, "Ash");
    }

    #[tokio::test]
    async fn test_collect_special_ability() {
        let catalog = catalog();
        let mut oc = pikachu(&catalog);
        let prompter = ScriptedPrompter::new()
            .confirm(true)
            .text("Storm Call")
            .text("Calls lightning from clear skies")
            .text("Struck as a child")
            .text("Powerful")
            .text("Exhausting")
            .choose([2]);

        let outcome = Field::SpecialAbility
            .collect(&prompter, &catalog, Template::Pokemon, &mut oc)
            .await
            .unwrap();
        assert_eq!(outcome, FieldOutcome::Updated);
        let sp = oc.sp_ability.as_ref().unwrap();
        assert_eq!(sp.kind, TraitKind::Elemental);
        assert_eq!(Field::SpecialAbility.evaluate(&oc, &catalog), None);
        assert_eq!(oc.max_amount_abilities(), 1);
    }

    #[tokio::test]
    async fn test_collect_age_parses_digits() {
        let catalog = catalog();
        let mut oc = Character::new(1, 2);
        let prompter = ScriptedPrompter::new().text("about 25 years");

        Field::Age
            .collect(&prompter, &catalog, Template::Pokemon, &mut oc)
            .await
            .unwrap();
        assert_eq!(oc.age, Some(25));
    }
}
