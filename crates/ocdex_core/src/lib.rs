//! ocdex core - character registry for role-play communities
//!
//! This crate holds everything that does not talk to the chat platform
//! directly: the species, ability and move catalogs, the character
//! aggregate and its field validators, the submission and modification
//! wizards, NPC presets, the sheet parser and persistence.
//!
//! Platform glue plugs in through three traits: [`prompt::Prompter`] for
//! collecting input, [`publish::Publisher`] for posting characters and
//! [`store::DocumentStore`] for persistence.

pub mod catalog;
pub mod character;
pub mod config;
pub mod error;
pub mod fields;
pub mod id;
pub mod npc;
pub mod parser;
pub mod prompt;
pub mod publish;
pub mod registry;
pub mod species;
pub mod store;
pub mod wizard;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use catalog::{Catalog, Movepool, Pronoun, Typing};
pub use character::{Character, CharacterEmbed, ImageRef, SpAbility, TraitKind};
pub use config::BotConfig;
pub use error::{CoreError, PlatformError, Result};
pub use fields::{Field, FieldOutcome};
pub use id::{DraftId, Id, IdType, NpcId};
pub use npc::{Npc, NpcBook};
pub use parser::{ParsedSheet, parse_sheet};
pub use prompt::{Answer, Prompter};
pub use publish::{Published, Publisher};
pub use registry::{EditLease, Registry};
pub use species::{Species, Template};
pub use store::DocumentStore;
pub use wizard::{Modification, ModificationReport, ModificationWizard, SubmissionWizard, WizardState};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        Answer, Catalog, Character, CoreError, DocumentStore, Field, FieldOutcome, ImageRef,
        Modification, ModificationWizard, Npc, NpcBook, PlatformError, Prompter, Published,
        Publisher, Registry, Result, Species, SubmissionWizard, Template, WizardState,
    };
}
