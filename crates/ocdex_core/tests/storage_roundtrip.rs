//! Characters written through the registry come back field for field after a
//! restart, on both storage backends.

use compact_str::CompactString;
use ocdex_core::catalog::{Movepool, Pronoun, Typing};
use ocdex_core::character::{ImageRef, SpAbility, TraitKind};
use ocdex_core::species::{Fakemon, FakemonOrigin, Fusion};
use ocdex_core::store::{self, DatabaseConfig, MemoryStore};
use ocdex_core::{Catalog, Character, DocumentStore, Registry, Species};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::Arc;

fn fakemon(catalog: &Catalog) -> Character {
    let mut species = Fakemon::new("Voltmouse", FakemonOrigin::Regular);
    species.types = BTreeSet::from([Typing::Electric, Typing::Fairy]);
    species.abilities = BTreeSet::from([CompactString::from("Static")]);
    species.movepool = Movepool::from_moves(["Thunderbolt", "Swift"]);
    species.evolves_from = catalog.species("pichu");

    let mut oc = Character::new(7, 1);
    oc.name = "Volty".into();
    oc.age = Some(21);
    oc.pronoun = Pronoun::She;
    oc.backstory = Some("Born in a storm.".into());
    oc.extra = Some("Hates rubber.".into());
    oc.image = ImageRef::Url {
        url: "https://example.com/volty.png".into(),
    };
    oc.assign_species(Species::Fakemon(species));
    oc.sp_ability = Some(SpAbility {
        name: "Overcharge".into(),
        description: "Stores lightning.".into(),
        origin: "Struck as a child.".into(),
        pros: "Never runs out of power.".into(),
        cons: "Shocks friends.".into(),
        kind: TraitKind::Elemental,
    });
    oc.hidden_power = Some(Typing::Ice);
    oc.update(4242);
    oc.thread = Some(99);
    oc
}

fn fusion(catalog: &Catalog) -> Character {
    let species = Fusion::new(
        catalog.species("charizard").unwrap(),
        catalog.species("eevee").unwrap(),
    )
    .unwrap();
    let mut oc = Character::new(8, 1);
    oc.name = "Cinder".into();
    oc.assign_species(Species::Fusion(species));
    oc.moveset = BTreeSet::from([CompactString::from("Flamethrower")]);
    oc.update(4243);
    oc.thread = Some(100);
    oc
}

async fn round_trip(store: Arc<dyn DocumentStore>) {
    let catalog = Arc::new(Catalog::bundled().unwrap());
    let originals = [fakemon(&catalog), fusion(&catalog)];

    let registry = Registry::new(Arc::clone(&catalog), Arc::clone(&store));
    for oc in &originals {
        registry.save(oc, None).await.unwrap();
    }

    let restarted = Registry::new(catalog, store);
    assert_eq!(restarted.init().await.unwrap(), 2);
    for oc in &originals {
        let id = oc.id.unwrap();
        assert_eq!(restarted.get(id).as_ref(), Some(oc));
        assert_eq!(restarted.thread_of(oc.author), oc.thread);
    }
}

#[tokio::test]
async fn memory_store_round_trip() {
    round_trip(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn surreal_memory_round_trip() {
    let store = store::connect(&DatabaseConfig::SurrealMemory).await.unwrap();
    round_trip(store).await;
}

#[tokio::test]
async fn undecodable_documents_are_skipped() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    store
        .insert_one(
            store::CHARACTERS,
            serde_json::json!({ "id": 1, "name": "broken" }),
        )
        .await
        .unwrap();
    let catalog = Arc::new(Catalog::bundled().unwrap());
    let registry = Registry::new(Arc::clone(&catalog), Arc::clone(&store));
    registry.save(&fusion(&catalog), None).await.unwrap();

    let restarted = Registry::new(catalog, store);
    assert_eq!(restarted.init().await.unwrap(), 1);
    assert!(restarted.get(1).is_none());
}
