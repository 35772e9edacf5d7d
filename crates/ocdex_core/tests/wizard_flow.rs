//! End to end runs of the submission and modification wizards against the
//! bundled catalog, an in-memory store and a recording publisher.

use compact_str::CompactString;
use ocdex_core::fields::{Field, FieldOutcome};
use ocdex_core::species::{Fakemon, FakemonOrigin, Fusion};
use ocdex_core::store::MemoryStore;
use ocdex_core::test_helpers::{RecordingPublisher, ScriptedPrompter};
use ocdex_core::{
    Catalog, CoreError, Modification, ModificationWizard, Registry, Species, SubmissionWizard,
    Template, WizardState,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::Arc;

const AUTHOR: u64 = 7;
const SERVER: u64 = 1;

fn registry() -> Arc<Registry> {
    Arc::new(Registry::new(
        Arc::new(Catalog::bundled().unwrap()),
        Arc::new(MemoryStore::new()),
    ))
}

fn moves(names: &[&str]) -> BTreeSet<CompactString> {
    names.iter().map(|n| CompactString::from(*n)).collect()
}

/// Index of `name` in the moveset menu of the wizard's current species
fn menu_index(wizard: &SubmissionWizard, name: &str) -> usize {
    wizard
        .character()
        .total_movepool()
        .all()
        .into_iter()
        .position(|m| m == name)
        .unwrap()
}

async fn committed_pikachu(registry: &Arc<Registry>, publisher: &RecordingPublisher) -> u64 {
    let mut wizard = SubmissionWizard::new(Arc::clone(registry), AUTHOR, SERVER, Template::Pokemon);
    let prompter = ScriptedPrompter::new().text("Pikachu").text("Sparky");
    wizard.select(Field::Species, &prompter).await.unwrap();
    wizard.select(Field::Name, &prompter).await.unwrap();

    let picks = [
        menu_index(&wizard, "Thunderbolt"),
        menu_index(&wizard, "Volt Tackle"),
    ];
    let prompter = ScriptedPrompter::new().choose(picks);
    wizard.select(Field::Moveset, &prompter).await.unwrap();
    wizard.submit(publisher).await.unwrap()
}

#[tokio::test]
async fn pikachu_is_blocked_only_by_name_and_moveset() {
    let registry = registry();
    let mut wizard = SubmissionWizard::new(Arc::clone(&registry), AUTHOR, SERVER, Template::Pokemon);
    let prompter = ScriptedPrompter::new().text("Pikachu");

    let outcome = wizard.select(Field::Species, &prompter).await.unwrap();
    assert_eq!(outcome, FieldOutcome::Updated);

    let menu = wizard.menu();
    let abilities = menu.iter().find(|e| e.field == Field::Abilities).unwrap();
    assert_eq!(abilities.defect, None);
    assert!(abilities.done);
    assert_eq!(
        wizard.character().abilities,
        BTreeSet::from([CompactString::from("Static")])
    );

    let blocking: Vec<Field> = menu
        .iter()
        .filter(|e| e.defect.is_some())
        .map(|e| e.field)
        .collect();
    assert_eq!(blocking, vec![Field::Name, Field::Moveset]);
    assert!(!wizard.can_submit());
}

#[tokio::test]
async fn resubmitting_keeps_identity() {
    let registry = registry();
    let publisher = RecordingPublisher::new();
    let mut wizard = SubmissionWizard::new(Arc::clone(&registry), AUTHOR, SERVER, Template::Pokemon);
    let prompter = ScriptedPrompter::new().text("Pikachu").text("Sparky");
    wizard.select(Field::Species, &prompter).await.unwrap();
    wizard.select(Field::Name, &prompter).await.unwrap();
    let prompter = ScriptedPrompter::new().choose([menu_index(&wizard, "Thunderbolt")]);
    wizard.select(Field::Moveset, &prompter).await.unwrap();

    let first = wizard.submit(&publisher).await.unwrap();
    let second = wizard.submit(&publisher).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(wizard.state(), WizardState::Committed);
    assert_eq!(registry.characters_of(AUTHOR).len(), 1);
    assert_eq!(registry.thread_of(AUTHOR), Some(RecordingPublisher::thread_for(AUTHOR)));
    assert_eq!(publisher.message_count(), 1);
}

#[tokio::test]
async fn switching_kind_resets_species_progress() {
    let registry = registry();
    let mut wizard = SubmissionWizard::new(Arc::clone(&registry), AUTHOR, SERVER, Template::Pokemon);
    let prompter = ScriptedPrompter::new().text("Pikachu");
    wizard.select(Field::Species, &prompter).await.unwrap();
    assert!(wizard.progress().contains(&Field::Species));

    wizard.switch_template(Template::Fakemon).await.unwrap();

    assert_eq!(wizard.template(), Template::Fakemon);
    for field in Field::SPECIES_BOUND {
        assert!(!wizard.progress().contains(&field), "{field} still marked");
    }
    assert!(wizard.character().species.is_none());
    assert!(wizard.menu().iter().any(|e| e.field == Field::Movepool));
}

#[tokio::test]
async fn moveset_stays_inside_movepool() {
    let registry = registry();
    let mut wizard = SubmissionWizard::new(Arc::clone(&registry), AUTHOR, SERVER, Template::Pokemon);
    let prompter = ScriptedPrompter::new().text("Charmeleon");
    wizard.select(Field::Species, &prompter).await.unwrap();

    let picks = [
        menu_index(&wizard, "Flamethrower"),
        menu_index(&wizard, "Flare Blitz"),
    ];
    wizard
        .select(Field::Moveset, &ScriptedPrompter::new().choose(picks))
        .await
        .unwrap();
    assert!(wizard.character().illegal_moves().is_empty());

    // Charmander cannot learn Flare Blitz, switching species drops it
    let prompter = ScriptedPrompter::new().text("Charmander");
    wizard.select(Field::Species, &prompter).await.unwrap();
    assert_eq!(wizard.character().moveset, moves(&["Flamethrower"]));
    assert!(wizard.character().illegal_moves().is_empty());
    assert!(wizard.progress().contains(&Field::Moveset));
}

#[tokio::test]
async fn fusion_with_itself_is_rejected() {
    let registry = registry();
    let mut wizard = SubmissionWizard::new(Arc::clone(&registry), AUTHOR, SERVER, Template::Fusion);
    let prompter = ScriptedPrompter::new().text("Charizard").text("charizard");

    let err = wizard.select(Field::Species, &prompter).await.unwrap_err();

    assert!(matches!(err, CoreError::InvalidFusion { .. }));
    assert!(wizard.character().species.is_none());
    assert_eq!(wizard.state(), WizardState::Selecting);
}

#[tokio::test]
async fn devolution_is_not_offered_without_pre_evolution() {
    let registry = registry();
    let publisher = RecordingPublisher::new();
    let mut wizard = SubmissionWizard::new(Arc::clone(&registry), AUTHOR, SERVER, Template::Pokemon);
    let prompter = ScriptedPrompter::new().text("Bulbasaur").text("Bulby");
    wizard.select(Field::Species, &prompter).await.unwrap();
    wizard.select(Field::Name, &prompter).await.unwrap();
    let prompter = ScriptedPrompter::new().choose([menu_index(&wizard, "Vine Whip")]);
    wizard.select(Field::Moveset, &prompter).await.unwrap();
    let id = wizard.submit(&publisher).await.unwrap();
    drop(wizard);

    let modification = ModificationWizard::new(Arc::clone(&registry), AUTHOR, id).unwrap();
    let offered = modification.available();
    assert!(!offered.contains(&Modification::Devolution));
    assert!(!offered.contains(&Modification::Evolution));
    assert!(offered.contains(&Modification::Abilities));
}

#[tokio::test]
async fn open_submission_locks_out_modification() {
    let registry = registry();
    let publisher = RecordingPublisher::new();
    let mut wizard = SubmissionWizard::new(Arc::clone(&registry), AUTHOR, SERVER, Template::Pokemon);
    let prompter = ScriptedPrompter::new().text("Pikachu").text("Sparky");
    wizard.select(Field::Species, &prompter).await.unwrap();
    wizard.select(Field::Name, &prompter).await.unwrap();
    let prompter = ScriptedPrompter::new().choose([menu_index(&wizard, "Thunderbolt")]);
    wizard.select(Field::Moveset, &prompter).await.unwrap();
    let id = wizard.submit(&publisher).await.unwrap();

    let locked = ModificationWizard::new(Arc::clone(&registry), AUTHOR, id);
    assert!(matches!(locked, Err(CoreError::RecordLocked { .. })));

    wizard.cancel().await.unwrap();
    assert!(ModificationWizard::new(Arc::clone(&registry), AUTHOR, id).is_ok());
}

#[tokio::test]
async fn evolution_batch_commits_and_republishes() {
    let registry = registry();
    let publisher = RecordingPublisher::new();
    let id = committed_pikachu(&registry, &publisher).await;
    assert_eq!(
        registry.get(id).unwrap().moveset,
        moves(&["Thunderbolt", "Volt Tackle"])
    );

    let mut wizard = ModificationWizard::new(Arc::clone(&registry), AUTHOR, id).unwrap();
    let prompter = ScriptedPrompter::new().choose([0]).skip();
    let report = wizard
        .run(&[Modification::Evolution], &prompter, &publisher)
        .await
        .unwrap();

    assert_eq!(report.applied, vec![Modification::Evolution]);
    assert!(report.failed.is_none());
    assert!(report.changed);
    assert_eq!(report.id, Some(id));

    let stored = registry.get(id).unwrap();
    assert_eq!(stored.species.as_ref().map(Species::name).as_deref(), Some("Raichu"));
    assert_eq!(stored.moveset, moves(&["Thunderbolt"]));
    assert_eq!(Field::Moveset.evaluate(&stored, registry.catalog()), None);
    assert_eq!(publisher.message(id).unwrap().moveset, moves(&["Thunderbolt"]));
}

#[test]
fn ability_slots_stay_between_one_and_three() {
    let catalog = Catalog::bundled().unwrap();
    let mut kinds: Vec<Species> = catalog
        .all_species()
        .map(|s| Species::Pokemon(Arc::clone(s)))
        .collect();

    let charizard = catalog.species("charizard").unwrap();
    let eevee = catalog.species("eevee").unwrap();
    kinds.push(Species::Fusion(Fusion::new(Arc::clone(&charizard), Arc::clone(&eevee)).unwrap()));
    kinds.push(Species::Variant(ocdex_core::species::Variant::new(
        Arc::clone(&eevee),
        "Shadow",
    )));
    kinds.push(Species::CustomMega(ocdex_core::species::CustomMega::new(charizard)));
    for origin in [FakemonOrigin::Regular, FakemonOrigin::Paradox, FakemonOrigin::UltraBeast] {
        kinds.push(Species::Fakemon(Fakemon::new("Voltmouse", origin)));
        let mut signature = Fakemon::new("Voltmouse", origin);
        signature.signature = Some("Static".into());
        kinds.push(Species::Fakemon(signature));
    }

    for species in kinds {
        let max = species.max_amount_abilities();
        assert!((1..=3).contains(&max), "{} allows {max}", species.name());
    }
}
