use super::{WizardState, publish_character};
use crate::catalog::{CATALOG_CUTOFF, Catalog};
use crate::character::{Character, ImageRef};
use crate::fields::{Field, FieldOutcome};
use crate::prompt::{Answer, CHOICE_LIMIT, ChoiceOption, ChoiceRequest, Prompter, TextRequest};
use crate::publish::Publisher;
use crate::registry::{EditLease, Registry};
use crate::species::{Fusion, Species, Template, Variant};
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// A targeted change to a published character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modification {
    Name,
    Age,
    Pronoun,
    Backstory,
    Extra,
    Moveset,
    Abilities,
    Image,
    Movepool,
    Evolution,
    Devolution,
    /// Fuse with a member of the own evolution line
    Fusion,
    SpecialAbility,
}

impl Modification {
    pub const ALL: [Modification; 13] = [
        Modification::Name,
        Modification::Age,
        Modification::Pronoun,
        Modification::Backstory,
        Modification::Extra,
        Modification::Moveset,
        Modification::Abilities,
        Modification::Image,
        Modification::Movepool,
        Modification::Evolution,
        Modification::Devolution,
        Modification::Fusion,
        Modification::SpecialAbility,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Modification::Name => "Name",
            Modification::Age => "Age",
            Modification::Pronoun => "Pronoun",
            Modification::Backstory => "Backstory",
            Modification::Extra => "Extra Information",
            Modification::Moveset => "Moveset",
            Modification::Abilities => "Abilities",
            Modification::Image => "Image",
            Modification::Movepool => "Movepool",
            Modification::Evolution => "Evolution",
            Modification::Devolution => "Devolve",
            Modification::Fusion => "Fuse Evolve",
            Modification::SpecialAbility => "Special Ability",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Modification::Name => "Modify the character's name",
            Modification::Age => "Modify the character's age",
            Modification::Pronoun => "Modify the character's pronoun",
            Modification::Backstory => "Modify the character's backstory",
            Modification::Extra => "Modify the character's extra information",
            Modification::Moveset => "Modify the character's moveset",
            Modification::Abilities => "Modify the character's abilities",
            Modification::Image => "Modify the character's image",
            Modification::Movepool => "Modify the movepool of a fan-made species or variant",
            Modification::Evolution => "Evolve the character",
            Modification::Devolution => "Devolve the character",
            Modification::Fusion => "Fuse within the evolution line",
            Modification::SpecialAbility => "Add, modify or remove the special ability",
        }
    }

    /// The field collector a simple modification delegates to
    fn field(self) -> Option<Field> {
        match self {
            Modification::Name => Some(Field::Name),
            Modification::Age => Some(Field::Age),
            Modification::Pronoun => Some(Field::Pronoun),
            Modification::Backstory => Some(Field::Backstory),
            Modification::Extra => Some(Field::Extra),
            Modification::Moveset => Some(Field::Moveset),
            Modification::Abilities => Some(Field::Abilities),
            Modification::Image => Some(Field::Image),
            Modification::Movepool => Some(Field::Movepool),
            Modification::SpecialAbility => Some(Field::SpecialAbility),
            Modification::Evolution | Modification::Devolution | Modification::Fusion => None,
        }
    }

    /// Whether the modification can be offered for `character`
    pub fn check(self, character: &Character, catalog: &Catalog) -> bool {
        let Some(species) = character.species.as_ref() else {
            return false;
        };
        match self {
            Modification::Abilities => {
                species.has_custom_abilities() || species.abilities().len() > 1
            }
            Modification::Movepool => species.has_custom_movepool(),
            Modification::Moveset => !character.total_movepool().is_empty(),
            Modification::SpecialAbility => species.can_have_special_abilities(),
            Modification::Evolution => !evolutions(species, catalog).is_empty(),
            Modification::Devolution => !devolutions(species, catalog).is_empty(),
            Modification::Fusion => !line_fusions(species, catalog).is_empty(),
            _ => true,
        }
    }

    /// Run the modification against `character`.
    ///
    /// `Some(changed)` when it went through, `None` when the user cancelled.
    pub async fn apply(
        self,
        prompter: &dyn Prompter,
        catalog: &Catalog,
        character: &mut Character,
    ) -> Result<Option<bool>> {
        if let Some(field) = self.field() {
            let template = character
                .species
                .as_ref()
                .map_or(Template::Pokemon, Species::template);
            let outcome = field.collect(prompter, catalog, template, character).await?;
            return Ok(outcome_changed(outcome));
        }

        let Some(species) = character.species.as_ref() else {
            return Err(CoreError::input_failed(self.label(), "the character has no species"));
        };
        let (options, verb) = match self {
            Modification::Evolution => (evolutions(species, catalog), "Evolve"),
            Modification::Devolution => (devolutions(species, catalog), "Devolve"),
            _ => (line_fusions(species, catalog), "Fuse"),
        };
        if options.is_empty() {
            return Err(CoreError::input_failed(self.label(), "no species to change into"));
        }

        let species = match choose_species(prompter, catalog, verb, options).await? {
            Answer::Value(species) => species,
            Answer::Skipped => return Ok(Some(false)),
            Answer::Cancelled => return Ok(None),
        };
        replace_species(prompter, catalog, character, species).await
    }
}

impl std::fmt::Display for Modification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn outcome_changed(outcome: FieldOutcome) -> Option<bool> {
    match outcome {
        FieldOutcome::Updated => Some(true),
        FieldOutcome::Unchanged => Some(false),
        FieldOutcome::Cancelled => None,
    }
}

/// Species one evolution step ahead. Fusions evolve one part at a time and
/// variants keep their name over the new base.
fn evolutions(species: &Species, catalog: &Catalog) -> Vec<Species> {
    match species {
        Species::Pokemon(data) => catalog
            .evolutions(data)
            .into_iter()
            .map(Species::Pokemon)
            .collect(),
        Species::Variant(v) => catalog
            .evolutions(&v.base)
            .into_iter()
            .map(|base| Species::Variant(Variant::new(base, v.name.clone())))
            .collect(),
        Species::Fusion(f) => {
            let [a, b] = f.parts();
            let mut options = Vec::new();
            for evolved in catalog.evolutions(a) {
                options.extend(Fusion::new(evolved, Arc::clone(b)).ok().map(Species::Fusion));
            }
            for evolved in catalog.evolutions(b) {
                options.extend(Fusion::new(Arc::clone(a), evolved).ok().map(Species::Fusion));
            }
            options
        }
        Species::Fakemon(_) | Species::CustomMega(_) => Vec::new(),
    }
}

/// Species one evolution step back. A fan-made species devolves into the
/// canon species it was declared to evolve from.
fn devolutions(species: &Species, catalog: &Catalog) -> Vec<Species> {
    match species {
        Species::Fusion(f) => {
            let [a, b] = f.parts();
            let mut options = Vec::new();
            if let Some(pre) = catalog.pre_evolution(a) {
                options.extend(Fusion::new(pre, Arc::clone(b)).ok().map(Species::Fusion));
            }
            if let Some(pre) = catalog.pre_evolution(b) {
                options.extend(Fusion::new(Arc::clone(a), pre).ok().map(Species::Fusion));
            }
            options
        }
        Species::Variant(v) => species
            .evolves_from(catalog)
            .into_iter()
            .map(|base| Species::Variant(Variant::new(base, v.name.clone())))
            .collect(),
        _ => species
            .evolves_from(catalog)
            .into_iter()
            .map(Species::Pokemon)
            .collect(),
    }
}

/// Every fusion of two members of the line made of the species and its
/// evolutions
fn line_fusions(species: &Species, catalog: &Catalog) -> Vec<Species> {
    let Species::Pokemon(data) = species else {
        return Vec::new();
    };
    let mut line = vec![Arc::clone(data)];
    line.extend(catalog.evolutions(data));

    let mut options = Vec::new();
    for (i, first) in line.iter().enumerate() {
        for second in &line[i + 1..] {
            options.extend(
                Fusion::new(Arc::clone(first), Arc::clone(second))
                    .ok()
                    .map(Species::Fusion),
            );
        }
    }
    options
}

async fn choose_species(
    prompter: &dyn Prompter,
    catalog: &Catalog,
    verb: &str,
    options: Vec<Species>,
) -> Result<Answer<Species>> {
    let names: Vec<String> = options.iter().map(Species::name).collect();
    let picked = if options.len() <= CHOICE_LIMIT {
        let choices = names
            .iter()
            .map(|name| ChoiceOption::new(name.as_str()).describe(format!("{verb} to {name}")))
            .collect();
        let answer = prompter
            .choose(ChoiceRequest::single(format!("Select the species ({verb})"), choices))
            .await?;
        match answer {
            Answer::Value(picked) => picked.first().copied(),
            Answer::Skipped => return Ok(Answer::Skipped),
            Answer::Cancelled => return Ok(Answer::Cancelled),
        }
    } else {
        let request = TextRequest::new(format!("Select the species ({verb})"), "Species")
            .placeholder(names.join(" | "))
            .required();
        let query = match prompter.text(request).await? {
            Answer::Value(query) => query,
            Answer::Skipped => return Ok(Answer::Skipped),
            Answer::Cancelled => return Ok(Answer::Cancelled),
        };
        let choices: Vec<&str> = names.iter().map(String::as_str).collect();
        let found = catalog.matcher().best(&query, &choices, CATALOG_CUTOFF);
        if found.is_none() {
            return Err(CoreError::unknown("species", query));
        }
        found
    };

    let index = picked.ok_or_else(|| CoreError::input_failed("Species", "no option picked"))?;
    options
        .into_iter()
        .nth(index)
        .map(Answer::Value)
        .ok_or_else(|| CoreError::input_failed("Species", "picked option out of range"))
}

/// Swap the species and walk the follow-up fields the new species may need
async fn replace_species(
    prompter: &dyn Prompter,
    catalog: &Catalog,
    character: &mut Character,
    species: Species,
) -> Result<Option<bool>> {
    let template = species.template();
    let ask_types = match &species {
        Species::Fusion(f) => f.possible_types().len() > 1,
        Species::Variant(_) => true,
        _ => false,
    };
    let movepool = species.movepool();
    let dropped: Vec<_> = character
        .moveset
        .iter()
        .filter(|m| !movepool.contains(m))
        .cloned()
        .collect();

    tracing::debug!(
        from = ?character.species.as_ref().map(Species::name),
        to = %species.name(),
        ?dropped,
        "replacing species"
    );
    character.assign_species(species);
    character.image = ImageRef::Default;

    if ask_types
        && Field::Types.collect(prompter, catalog, template, character).await?
            == FieldOutcome::Cancelled
    {
        return Ok(None);
    }
    if Field::Abilities.evaluate(character, catalog).is_some()
        && Field::Abilities.collect(prompter, catalog, template, character).await?
            == FieldOutcome::Cancelled
    {
        return Ok(None);
    }
    // A skipped re-pick keeps the leading abilities that still fit
    let max = character.max_amount_abilities();
    if character.abilities.len() > max {
        character.abilities = character.abilities.iter().take(max).cloned().collect();
    }
    if !dropped.is_empty()
        && Field::Moveset.evaluate(character, catalog).is_some()
        && Field::Moveset.collect(prompter, catalog, template, character).await?
            == FieldOutcome::Cancelled
    {
        return Ok(None);
    }
    // The image is only re-confirmed, leaving it unanswered keeps the default
    Field::Image
        .collect(prompter, catalog, template, character)
        .await?;
    Ok(Some(true))
}

/// Species-bound fields that passed before a modification and fail after it
fn introduced_defects(before: &Character, after: &Character, catalog: &Catalog) -> Vec<String> {
    let Some(template) = after.species.as_ref().map(Species::template) else {
        return Vec::new();
    };
    Field::SPECIES_BOUND
        .into_iter()
        .filter(|field| field.applicable(after, template))
        .filter(|field| field.evaluate(before, catalog).is_none())
        .filter_map(|field| field.evaluate(after, catalog))
        .collect()
}

/// What a modification batch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModificationReport {
    pub applied: Vec<Modification>,
    /// The modification the user cancelled, halting the batch
    pub cancelled: Option<Modification>,
    /// The modification that failed, halting the batch, with the reason
    pub failed: Option<(Modification, String)>,
    pub changed: bool,
    /// Message id the character is published under afterwards
    pub id: Option<u64>,
}

#[derive(Debug)]
pub struct ModificationWizard {
    registry: Arc<Registry>,
    character: Character,
    state: WizardState,
    lease: Option<EditLease>,
}

impl ModificationWizard {
    pub fn new(registry: Arc<Registry>, actor: u64, id: u64) -> Result<Self> {
        let character = registry
            .get(id)
            .ok_or(CoreError::CharacterNotFound { id })?;
        registry.ensure_owner(actor, &character)?;
        let lease = registry.lease(&character)?;
        Ok(Self {
            registry,
            character,
            state: WizardState::Selecting,
            lease,
        })
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    /// Modifications that pass their check for the current character
    pub fn available(&self) -> Vec<Modification> {
        let catalog = self.registry.catalog();
        Modification::ALL
            .into_iter()
            .filter(|m| m.check(&self.character, catalog))
            .collect()
    }

    /// Apply `kinds` in order. A cancellation or failure stops the batch;
    /// whatever changed before it is still published and saved. A
    /// modification that breaks a species-bound field counts as failed.
    #[instrument(skip_all, fields(id = ?self.character.id, kinds = kinds.len()))]
    pub async fn run(
        &mut self,
        kinds: &[Modification],
        prompter: &dyn Prompter,
        publisher: &dyn Publisher,
    ) -> Result<ModificationReport> {
        if !matches!(self.state, WizardState::Selecting | WizardState::Committed) {
            return Err(CoreError::invalid_transition(self.state, "modify"));
        }
        let catalog = Arc::clone(self.registry.catalog());
        let mut working = self.character.clone();
        let mut report = ModificationReport::default();

        for &kind in kinds {
            if !kind.check(&working, &catalog) {
                tracing::debug!(kind = kind.label(), "modification no longer applies, skipped");
                continue;
            }
            let mut attempt = working.clone();
            match kind.apply(prompter, &catalog, &mut attempt).await {
                Ok(Some(changed)) => {
                    let defects = introduced_defects(&working, &attempt, &catalog);
                    if !defects.is_empty() {
                        tracing::warn!(
                            kind = kind.label(),
                            ?defects,
                            "modification left the character invalid"
                        );
                        report.failed = Some((kind, defects.join(", ")));
                        break;
                    }
                    working = attempt;
                    report.applied.push(kind);
                    report.changed |= changed;
                }
                Ok(None) => {
                    tracing::debug!(kind = kind.label(), "modification cancelled");
                    report.cancelled = Some(kind);
                    break;
                }
                Err(e) => {
                    tracing::warn!(kind = kind.label(), "modification failed: {}", e);
                    report.failed = Some((kind, e.to_string()));
                    break;
                }
            }
        }

        if report.changed {
            let previous = publish_character(&self.registry, publisher, &mut working).await?;
            let id = self.registry.save(&working, previous).await?;
            if self.lease.as_ref().is_none_or(|lease| lease.id() != id) {
                self.lease = None;
                self.lease = self.registry.lease(&working)?;
            }
            self.character = working;
            tracing::info!(id, applied = report.applied.len(), "modifications committed");
        }
        report.id = self.character.id;
        self.state = WizardState::Committed;
        Ok(report)
    }

    pub fn cancel(&mut self) {
        self.state = WizardState::Cancelled;
        self.lease = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_helpers::{RecordingPublisher, ScriptedPrompter};
    use compact_str::CompactString;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::bundled().unwrap())
    }

    fn canon(catalog: &Catalog, id: &str) -> Character {
        let mut oc = Character::new(7, 1);
        oc.name = "Sparky".into();
        oc.assign_species(Species::Pokemon(catalog.species(id).unwrap()));
        oc
    }

    async fn published(registry: &Arc<Registry>, mut oc: Character) -> u64 {
        let publisher = RecordingPublisher::new();
        let previous = publish_character(registry, &publisher, &mut oc).await.unwrap();
        registry.save(&oc, previous).await.unwrap()
    }

    #[test]
    fn test_devolution_not_offered_without_pre_evolution() {
        let catalog = catalog();
        let bulbasaur = canon(&catalog, "bulbasaur");
        assert!(!Modification::Devolution.check(&bulbasaur, &catalog));
        assert!(!Modification::Evolution.check(&bulbasaur, &catalog));
        assert!(!Modification::Fusion.check(&bulbasaur, &catalog));
        assert!(Modification::Abilities.check(&bulbasaur, &catalog));

        let pikachu = canon(&catalog, "pikachu");
        assert!(Modification::Devolution.check(&pikachu, &catalog));
        assert!(Modification::Evolution.check(&pikachu, &catalog));
        assert!(!Modification::Abilities.check(&pikachu, &catalog));
        assert!(!Modification::Movepool.check(&pikachu, &catalog));
    }

    #[test]
    fn test_fusion_devolution_replaces_one_part() {
        let catalog = catalog();
        let fusion = Species::Fusion(
            Fusion::new(
                catalog.species("charmeleon").unwrap(),
                catalog.species("bulbasaur").unwrap(),
            )
            .unwrap(),
        );
        let names: Vec<String> = devolutions(&fusion, &catalog).iter().map(Species::name).collect();
        assert_eq!(names, vec!["Charmander/Bulbasaur".to_string()]);
        assert!(line_fusions(&fusion, &catalog).is_empty());
    }

    #[test]
    fn test_line_fusions_pair_the_line() {
        let catalog = catalog();
        let species = Species::Pokemon(catalog.species("charmander").unwrap());
        let names: Vec<String> = line_fusions(&species, &catalog)
            .iter()
            .map(Species::name)
            .collect();
        assert_eq!(names, vec!["Charmander/Charmeleon".to_string()]);
    }

    #[tokio::test]
    async fn test_evolution_drops_unlearnable_moves() {
        let catalog = catalog();
        let mut oc = canon(&catalog, "pikachu");
        oc.moveset = BTreeSet::from([
            CompactString::from("Thunderbolt"),
            CompactString::from("Volt Tackle"),
        ]);
        let prompter = ScriptedPrompter::new().choose([0]).skip();

        let changed = Modification::Evolution
            .apply(&prompter, &catalog, &mut oc)
            .await
            .unwrap();

        assert_eq!(changed, Some(true));
        assert_eq!(oc.species.as_ref().map(Species::name).as_deref(), Some("Raichu"));
        assert_eq!(oc.moveset, BTreeSet::from([CompactString::from("Thunderbolt")]));
        assert_eq!(oc.image, ImageRef::Default);
        assert_eq!(Field::Moveset.evaluate(&oc, &catalog), None);
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn test_cancel_halts_batch_but_keeps_earlier_changes() {
        let registry = Arc::new(Registry::new(catalog(), Arc::new(MemoryStore::new())));
        let id = published(&registry, canon(registry.catalog(), "pikachu")).await;
        let publisher = RecordingPublisher::new();
        publisher.publish(&registry.get(id).unwrap()).await.unwrap();

        let mut wizard = ModificationWizard::new(Arc::clone(&registry), 7, id).unwrap();
        let prompter = ScriptedPrompter::new().text("Volt").cancel();
        let report = wizard
            .run(
                &[Modification::Name, Modification::Age, Modification::Backstory],
                &prompter,
                &publisher,
            )
            .await
            .unwrap();

        assert_eq!(report.applied, vec![Modification::Name]);
        assert_eq!(report.cancelled, Some(Modification::Age));
        assert!(report.changed);
        assert_eq!(registry.get(report.id.unwrap()).unwrap().name, "Volt");
        assert_eq!(wizard.state(), WizardState::Committed);
    }

    #[tokio::test]
    async fn test_vanished_message_is_republished() {
        let registry = Arc::new(Registry::new(catalog(), Arc::new(MemoryStore::new())));
        let id = published(&registry, canon(registry.catalog(), "pikachu")).await;
        let publisher = RecordingPublisher::new();
        let stale = publisher.publish(&Character::new(1, 1)).await.unwrap();
        publisher.remove(stale.message_id);

        let mut wizard = ModificationWizard::new(Arc::clone(&registry), 7, id).unwrap();
        let prompter = ScriptedPrompter::new().text("Volt");
        let report = wizard
            .run(&[Modification::Name], &prompter, &publisher)
            .await
            .unwrap();

        let new_id = report.id.unwrap();
        assert_ne!(new_id, id);
        assert!(registry.get(id).is_none());
        assert_eq!(publisher.message(new_id).unwrap().name, "Volt");
        assert!(registry.is_leased(new_id));
        assert!(!registry.is_leased(id));
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_reverted() {
        let registry = Arc::new(Registry::new(catalog(), Arc::new(MemoryStore::new())));
        let id = published(&registry, canon(registry.catalog(), "pikachu")).await;
        let publisher = RecordingPublisher::new();

        let mut wizard = ModificationWizard::new(Arc::clone(&registry), 7, id).unwrap();
        let prompter = ScriptedPrompter::new().fail();
        let report = wizard
            .run(&[Modification::Name], &prompter, &publisher)
            .await
            .unwrap();

        assert!(!report.changed);
        assert_eq!(report.failed.map(|(kind, _)| kind), Some(Modification::Name));
        assert_eq!(wizard.character().name, "Sparky");
        assert_eq!(publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_only_owner_may_modify() {
        let registry = Arc::new(Registry::new(catalog(), Arc::new(MemoryStore::new())));
        let id = published(&registry, canon(registry.catalog(), "pikachu")).await;

        assert!(matches!(
            ModificationWizard::new(Arc::clone(&registry), 99, id),
            Err(CoreError::NotOwner { .. })
        ));
        registry.add_supporting(99, 7);
        let wizard = ModificationWizard::new(Arc::clone(&registry), 99, id).unwrap();
        assert!(wizard.available().contains(&Modification::Evolution));
        assert!(!wizard.available().contains(&Modification::Movepool));
    }

    #[tokio::test]
    async fn test_fusion_with_skipped_repick_trims_abilities() {
        let registry = Arc::new(Registry::new(catalog(), Arc::new(MemoryStore::new())));
        let mut eevee = canon(registry.catalog(), "eevee");
        eevee.abilities = BTreeSet::from([
            CompactString::from("Run Away"),
            CompactString::from("Adaptability"),
        ]);
        eevee.moveset = BTreeSet::from([
            CompactString::from("Tackle"),
            CompactString::from("Tail Whip"),
        ]);
        let id = published(&registry, eevee).await;
        let publisher = RecordingPublisher::new();

        let mut wizard = ModificationWizard::new(Arc::clone(&registry), 7, id).unwrap();
        let prompter = ScriptedPrompter::new().choose([0]).skip().skip();
        let report = wizard
            .run(&[Modification::Fusion], &prompter, &publisher)
            .await
            .unwrap();

        assert_eq!(report.applied, vec![Modification::Fusion]);
        assert_eq!(report.failed, None);
        let saved = registry.get(report.id.unwrap()).unwrap();
        assert!(matches!(saved.species, Some(Species::Fusion(_))));
        assert_eq!(saved.abilities.len(), 1);
        assert_eq!(Field::Abilities.evaluate(&saved, registry.catalog()), None);
        assert_eq!(Field::Moveset.evaluate(&saved, registry.catalog()), None);
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn test_devolution_then_cancel_keeps_the_devolution() {
        let registry = Arc::new(Registry::new(catalog(), Arc::new(MemoryStore::new())));
        let mut pikachu = canon(registry.catalog(), "pikachu");
        pikachu.moveset = BTreeSet::from([
            CompactString::from("Thunderbolt"),
            CompactString::from("Tail Whip"),
        ]);
        let id = published(&registry, pikachu).await;
        let publisher = RecordingPublisher::new();

        let mut wizard = ModificationWizard::new(Arc::clone(&registry), 7, id).unwrap();
        let prompter = ScriptedPrompter::new().choose([0]).skip().cancel();
        let report = wizard
            .run(
                &[Modification::Devolution, Modification::Name],
                &prompter,
                &publisher,
            )
            .await
            .unwrap();

        assert_eq!(report.applied, vec![Modification::Devolution]);
        assert_eq!(report.cancelled, Some(Modification::Name));
        assert!(report.changed);
        let saved = registry.get(report.id.unwrap()).unwrap();
        assert_eq!(saved.species.as_ref().map(Species::name).as_deref(), Some("Pichu"));
        assert_eq!(saved.moveset, BTreeSet::from([CompactString::from("Tail Whip")]));
        assert_eq!(Field::Abilities.evaluate(&saved, registry.catalog()), None);
        assert_eq!(Field::Moveset.evaluate(&saved, registry.catalog()), None);
    }

    #[tokio::test]
    async fn test_species_change_leaving_defects_is_refused() {
        let registry = Arc::new(Registry::new(catalog(), Arc::new(MemoryStore::new())));
        let mut pikachu = canon(registry.catalog(), "pikachu");
        pikachu.moveset = BTreeSet::from([CompactString::from("Thunderbolt")]);
        let id = published(&registry, pikachu).await;
        let publisher = RecordingPublisher::new();

        // Pichu cannot learn Thunderbolt and the moveset re-pick is skipped
        let mut wizard = ModificationWizard::new(Arc::clone(&registry), 7, id).unwrap();
        let prompter = ScriptedPrompter::new().text("Volt").choose([0]).skip().skip();
        let report = wizard
            .run(
                &[Modification::Name, Modification::Devolution],
                &prompter,
                &publisher,
            )
            .await
            .unwrap();

        assert_eq!(report.applied, vec![Modification::Name]);
        let (kind, reason) = report.failed.unwrap();
        assert_eq!(kind, Modification::Devolution);
        assert!(reason.contains("Missing Moveset"));
        let saved = registry.get(report.id.unwrap()).unwrap();
        assert_eq!(saved.name, "Volt");
        assert_eq!(saved.species.as_ref().map(Species::name).as_deref(), Some("Pikachu"));
        assert_eq!(Field::Moveset.evaluate(&saved, registry.catalog()), None);
        assert_eq!(prompter.remaining(), 0);
    }
}
