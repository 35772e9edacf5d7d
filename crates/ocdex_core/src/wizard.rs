//! Interactive flows that create and change characters.
//!
//! - [`SubmissionWizard`] walks a new or existing character field by field
//!   and commits it once nothing is left to fix.
//! - [`ModificationWizard`] applies a batch of targeted changes to a
//!   published character.
//!
//! Both publish before persisting: the store only ever holds characters
//! whose message exists.

use crate::character::{Character, ImageRef};
use crate::fields::Field;
use crate::publish::Publisher;
use crate::registry::Registry;
use crate::Result;
use serde::{Deserialize, Serialize};

pub mod modification;
pub mod submission;

pub use modification::{Modification, ModificationReport, ModificationWizard};
pub use submission::{Draft, MenuEntry, SubmissionWizard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardState {
    /// Showing the field menu
    Selecting,
    /// Collecting one field
    Editing(Field),
    Committed,
    Cancelled,
    Deleted,
}

impl WizardState {
    /// No further transitions are possible
    pub fn is_finished(self) -> bool {
        matches!(self, WizardState::Cancelled | WizardState::Deleted)
    }
}

/// Publish `character`, or update its message when it already has one. A
/// message that vanished is published again under a new id.
///
/// Returns the id the character was known by before, when it changed.
pub(crate) async fn publish_character(
    registry: &Registry,
    publisher: &dyn Publisher,
    character: &mut Character,
) -> Result<Option<u64>> {
    if character.thread.is_none() {
        let thread = match registry.thread_of(character.author) {
            Some(thread) => thread,
            None => {
                publisher
                    .ensure_thread(character.author, character.server)
                    .await?
            }
        };
        character.thread = Some(thread);
    }

    let previous = character.id;
    let published = match previous {
        Some(id) => match publisher.edit(character).await {
            Ok(published) => published,
            Err(e) if e.is_not_found() => {
                tracing::warn!(id, "published message is gone, publishing again");
                publisher.publish(character).await?
            }
            Err(e) => return Err(e.into()),
        },
        None => publisher.publish(character).await?,
    };

    character.update(published.message_id);
    character.thread = Some(published.thread);
    if let Some(url) = published.image_url {
        character.image = ImageRef::Url { url };
    }
    Ok(previous.filter(|id| *id != published.message_id))
}
