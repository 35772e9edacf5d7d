use super::{WizardState, publish_character};
use crate::catalog::CATALOG_REVISION;
use crate::character::{Character, StoredCharacter};
use crate::fields::{Field, FieldOutcome};
use crate::id::DraftId;
use crate::parser::ParsedSheet;
use crate::prompt::Prompter;
use crate::publish::Publisher;
use crate::registry::{EditLease, Registry};
use crate::species::{Species, Template};
use crate::store::DRAFTS;
use crate::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

/// Persisted progress of an unfinished submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub template: Template,
    pub author: u64,
    pub server: u64,
    pub character: StoredCharacter,
    #[serde(default)]
    pub progress: BTreeSet<Field>,
    /// Catalog the draft was written against
    #[serde(default)]
    pub revision: String,
    pub updated_at: DateTime<Utc>,
}

/// One line of the field menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub field: Field,
    pub defect: Option<String>,
    pub done: bool,
    pub required: bool,
}

impl MenuEntry {
    pub fn label(&self) -> &'static str {
        self.field.label()
    }
}

#[derive(Debug)]
pub struct SubmissionWizard {
    registry: Arc<Registry>,
    draft: DraftId,
    template: Template,
    character: Character,
    progress: BTreeSet<Field>,
    state: WizardState,
    lease: Option<EditLease>,
}

impl SubmissionWizard {
    pub fn new(registry: Arc<Registry>, author: u64, server: u64, template: Template) -> Self {
        Self {
            registry,
            draft: DraftId::generate(),
            template,
            character: Character::new(author, server),
            progress: BTreeSet::new(),
            state: WizardState::Selecting,
            lease: None,
        }
    }

    /// Pick up the author's unfinished submission, if there is one
    #[instrument(skip(registry))]
    pub async fn resume(registry: Arc<Registry>, author: u64, server: u64) -> Result<Option<Self>> {
        let Some(doc) = registry
            .store()
            .find_one(DRAFTS, &json!({ "author": author, "server": server }))
            .await?
        else {
            return Ok(None);
        };

        let draft: Draft = serde_json::from_value(doc).map_err(|e| CoreError::MalformedDocument {
            collection: DRAFTS,
            cause: e,
        })?;
        if draft.revision != CATALOG_REVISION {
            tracing::info!(
                draft = %draft.id,
                "draft was written against catalog {}, revalidating",
                draft.revision
            );
        }
        let character = Character::from_storage(draft.character, registry.catalog())?;

        let mut wizard = Self {
            registry,
            draft: draft.id,
            template: draft.template,
            character,
            progress: draft.progress,
            state: WizardState::Selecting,
            lease: None,
        };
        wizard.refresh_progress();
        tracing::debug!(draft = %wizard.draft, "resumed draft");
        Ok(Some(wizard))
    }

    /// Reopen a published character for a full walk through its fields
    pub fn edit(registry: Arc<Registry>, actor: u64, id: u64) -> Result<Self> {
        let character = registry
            .get(id)
            .ok_or(CoreError::CharacterNotFound { id })?;
        registry.ensure_owner(actor, &character)?;
        let lease = registry.lease(&character)?;
        let template = character
            .species
            .as_ref()
            .map_or(Template::Pokemon, Species::template);

        let mut wizard = Self {
            registry,
            draft: DraftId::generate(),
            template,
            character,
            progress: BTreeSet::new(),
            state: WizardState::Selecting,
            lease,
        };
        wizard.progress = wizard.clean_fields();
        Ok(wizard)
    }

    /// Start a submission prefilled from a character sheet. Fields the sheet
    /// got right count as done.
    #[instrument(skip_all, fields(author = sheet.character.author))]
    pub async fn from_sheet(registry: Arc<Registry>, sheet: ParsedSheet) -> Result<Self> {
        let mut wizard = Self {
            registry,
            draft: DraftId::generate(),
            template: sheet.template,
            character: sheet.character,
            progress: BTreeSet::new(),
            state: WizardState::Selecting,
            lease: None,
        };
        wizard.progress = wizard.clean_fields();
        wizard.save_draft().await?;
        Ok(wizard)
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn template(&self) -> Template {
        self.template
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn draft_id(&self) -> DraftId {
        self.draft
    }

    pub fn progress(&self) -> &BTreeSet<Field> {
        &self.progress
    }

    fn applicable(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL
            .into_iter()
            .filter(|f| f.applicable(&self.character, self.template))
    }

    /// The field menu with every defect freshly computed
    pub fn menu(&self) -> Vec<MenuEntry> {
        let catalog = self.registry.catalog();
        self.applicable()
            .map(|field| MenuEntry {
                field,
                defect: field.evaluate(&self.character, catalog),
                done: self.progress.contains(&field),
                required: field.required(&self.character),
            })
            .collect()
    }

    pub fn defects(&self) -> Vec<String> {
        self.menu().into_iter().filter_map(|entry| entry.defect).collect()
    }

    pub fn can_submit(&self) -> bool {
        matches!(self.state, WizardState::Selecting | WizardState::Committed)
            && self.defects().is_empty()
    }

    fn clean_fields(&self) -> BTreeSet<Field> {
        let catalog = self.registry.catalog();
        self.applicable()
            .filter(|field| field.evaluate(&self.character, catalog).is_none())
            .collect()
    }

    /// Drop progress markers that no longer hold
    fn refresh_progress(&mut self) {
        let catalog = Arc::clone(self.registry.catalog());
        let applicable: BTreeSet<Field> = self.applicable().collect();
        self.progress.retain(|field| {
            applicable.contains(field) && field.evaluate(&self.character, &catalog).is_none()
        });
    }

    /// Open a field for editing. Returns false when that field is already
    /// open.
    pub fn begin(&mut self, field: Field) -> Result<bool> {
        match self.state {
            WizardState::Editing(open) if open == field => Ok(false),
            WizardState::Selecting | WizardState::Committed => {
                if !field.applicable(&self.character, self.template) {
                    return Err(CoreError::invalid_transition(self.state, "edit a field that does not apply"));
                }
                self.state = WizardState::Editing(field);
                Ok(true)
            }
            state => Err(CoreError::invalid_transition(state, "edit field")),
        }
    }

    /// Run the collector for the open field. Any failure or cancellation
    /// leaves the character as it was before.
    #[instrument(skip_all, fields(author = self.character.author, draft = %self.draft))]
    pub async fn collect(&mut self, prompter: &dyn Prompter) -> Result<FieldOutcome> {
        let WizardState::Editing(field) = self.state else {
            return Err(CoreError::invalid_transition(self.state, "collect field"));
        };

        let mut working = self.character.clone();
        let result = field
            .collect(prompter, self.registry.catalog(), self.template, &mut working)
            .await;
        self.state = WizardState::Selecting;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(field = field.label(), "field collection failed: {}", e);
                return Err(e);
            }
        };
        if outcome == FieldOutcome::Cancelled {
            tracing::debug!(field = field.label(), "field cancelled");
            return Ok(outcome);
        }

        self.character = working;
        // Re-entering a field resets its own marker only
        self.progress.remove(&field);
        let catalog = Arc::clone(self.registry.catalog());
        if field.evaluate(&self.character, &catalog).is_none() {
            self.progress.insert(field);
        }
        if field == Field::Species {
            // Autofilled abilities and moves count as done
            for bound in [Field::Abilities, Field::Moveset] {
                if bound.applicable(&self.character, self.template)
                    && bound.evaluate(&self.character, &catalog).is_none()
                {
                    self.progress.insert(bound);
                }
            }
        }
        self.refresh_progress();
        self.save_draft().await?;
        Ok(outcome)
    }

    /// Open `field` and collect it in one go
    pub async fn select(&mut self, field: Field, prompter: &dyn Prompter) -> Result<FieldOutcome> {
        if !self.begin(field)? {
            return Ok(FieldOutcome::Unchanged);
        }
        self.collect(prompter).await
    }

    /// Change the species kind being submitted
    #[instrument(skip(self), fields(author = self.character.author))]
    pub async fn switch_template(&mut self, template: Template) -> Result<()> {
        if !matches!(self.state, WizardState::Selecting | WizardState::Committed) {
            return Err(CoreError::invalid_transition(self.state, "switch template"));
        }
        if template == self.template {
            return Ok(());
        }

        self.template = template;
        for field in Field::SPECIES_BOUND {
            self.progress.remove(&field);
        }
        let mismatched = self
            .character
            .species
            .as_ref()
            .is_some_and(|s| s.template() != template);
        if mismatched {
            self.character.species = None;
            self.character.abilities.clear();
            self.character.moveset.clear();
        }
        if !template.can_have_special_abilities() && self.character.sp_ability.take().is_some() {
            tracing::debug!("special ability cleared by template switch");
        }
        self.refresh_progress();
        self.save_draft().await
    }

    /// Publish the character and make it authoritative
    #[instrument(skip_all, fields(author = self.character.author, draft = %self.draft))]
    pub async fn submit(&mut self, publisher: &dyn Publisher) -> Result<u64> {
        if !matches!(self.state, WizardState::Selecting | WizardState::Committed) {
            return Err(CoreError::invalid_transition(self.state, "submit"));
        }
        let defects = self.defects();
        if !defects.is_empty() {
            return Err(CoreError::SubmissionBlocked { defects });
        }

        let mut character = self.character.clone();
        let previous = publish_character(&self.registry, publisher, &mut character).await?;
        let id = self.registry.save(&character, previous).await?;
        self.registry
            .store()
            .delete_one(DRAFTS, &json!({ "id": self.draft }))
            .await?;

        if self.lease.as_ref().is_none_or(|lease| lease.id() != id) {
            self.lease = None;
            self.lease = self.registry.lease(&character)?;
        }
        self.character = character;
        self.state = WizardState::Committed;
        tracing::info!(id, name = %self.character.name, "character committed");
        Ok(id)
    }

    /// Throw the working copy away
    pub async fn cancel(&mut self) -> Result<()> {
        if self.state.is_finished() {
            return Err(CoreError::invalid_transition(self.state, "cancel"));
        }
        if self.character.id.is_none() {
            self.registry
                .store()
                .delete_one(DRAFTS, &json!({ "id": self.draft }))
                .await?;
        }
        self.state = WizardState::Cancelled;
        self.lease = None;
        tracing::debug!(draft = %self.draft, "submission cancelled");
        Ok(())
    }

    /// Remove a committed character and its message
    #[instrument(skip_all, fields(id = ?self.character.id))]
    pub async fn delete(&mut self, publisher: &dyn Publisher) -> Result<()> {
        let Some(id) = self.character.id else {
            return Err(CoreError::invalid_transition(self.state, "delete an unpublished character"));
        };
        if self.state.is_finished() {
            return Err(CoreError::invalid_transition(self.state, "delete"));
        }

        match publisher.delete(&self.character).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => tracing::debug!(id, "message already gone"),
            Err(e) => return Err(e.into()),
        }
        self.registry.remove(id).await?;
        self.state = WizardState::Deleted;
        self.lease = None;
        tracing::info!(id, "character deleted");
        Ok(())
    }

    /// The interaction expired. Nothing is written; the last saved draft
    /// stays available for `resume`.
    pub fn on_timeout(&mut self) {
        tracing::debug!(draft = %self.draft, state = ?self.state, "submission timed out");
        if !self.state.is_finished() {
            self.state = WizardState::Cancelled;
        }
        self.lease = None;
    }

    fn to_draft(&self) -> Draft {
        Draft {
            id: self.draft,
            template: self.template,
            author: self.character.author,
            server: self.character.server,
            character: self.character.to_storage(),
            progress: self.progress.clone(),
            revision: CATALOG_REVISION.to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Store the current progress. Published characters have no draft.
    pub async fn save_draft(&self) -> Result<()> {
        if self.character.id.is_some() {
            return Ok(());
        }
        let doc = serde_json::to_value(self.to_draft()).map_err(|e| CoreError::MalformedDocument {
            collection: DRAFTS,
            cause: e,
        })?;
        self.registry
            .store()
            .replace_one(DRAFTS, &json!({ "id": self.draft }), doc, true)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::error::PlatformError;
    use crate::publish::{MockPublisher, Published};
    use crate::store::{CHARACTERS, MemoryStore};
    use crate::test_helpers::{RecordingPublisher, ScriptedPrompter};
    use pretty_assertions::assert_eq;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::new(
            Arc::new(Catalog::bundled().unwrap()),
            Arc::new(MemoryStore::new()),
        ))
    }

    async fn ready_pikachu(registry: &Arc<Registry>) -> SubmissionWizard {
        let mut wizard = SubmissionWizard::new(Arc::clone(registry), 7, 1, Template::Pokemon);
        let prompter = ScriptedPrompter::new().text("Pikachu").text("Sparky");
        wizard.select(Field::Species, &prompter).await.unwrap();
        wizard.select(Field::Name, &prompter).await.unwrap();

        let pool: Vec<_> = wizard.character().total_movepool().all().into_iter().collect();
        let pick = pool.iter().position(|m| m == "Thunderbolt").unwrap();
        let prompter = ScriptedPrompter::new().choose([pick]);
        wizard.select(Field::Moveset, &prompter).await.unwrap();
        wizard
    }

    #[tokio::test]
    async fn test_pikachu_blocked_by_name_and_moveset() {
        let registry = registry();
        let mut wizard = SubmissionWizard::new(Arc::clone(&registry), 7, 1, Template::Pokemon);
        let prompter = ScriptedPrompter::new().text("pikachu");
        wizard.select(Field::Species, &prompter).await.unwrap();

        assert!(wizard.progress().contains(&Field::Abilities));
        assert_eq!(
            wizard.defects(),
            vec!["Missing Name".to_string(), "Missing Moveset".to_string()]
        );
        let err = wizard.submit(&RecordingPublisher::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::SubmissionBlocked { ref defects } if defects.len() == 2));
    }

    #[tokio::test]
    async fn test_begin_twice_is_a_noop() {
        let registry = registry();
        let mut wizard = SubmissionWizard::new(registry, 7, 1, Template::Pokemon);
        assert!(wizard.begin(Field::Name).unwrap());
        assert!(!wizard.begin(Field::Name).unwrap());
        assert_eq!(wizard.state(), WizardState::Editing(Field::Name));
        assert!(wizard.begin(Field::Age).is_err());
    }

    #[tokio::test]
    async fn test_failed_collect_reverts_field() {
        let registry = registry();
        let mut wizard = ready_pikachu(&registry).await;
        let before = wizard.character().clone();

        let prompter = ScriptedPrompter::new().fail();
        assert!(wizard.select(Field::Name, &prompter).await.is_err());
        assert_eq!(wizard.state(), WizardState::Selecting);
        assert_eq!(wizard.character(), &before);
        assert!(wizard.progress().contains(&Field::Name));
    }

    #[tokio::test]
    async fn test_draft_saved_and_resumed() {
        let registry = registry();
        let wizard = ready_pikachu(&registry).await;
        let draft = wizard.draft_id();

        let resumed = SubmissionWizard::resume(Arc::clone(&registry), 7, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resumed.draft_id(), draft);
        assert_eq!(resumed.character(), wizard.character());
        assert_eq!(resumed.progress(), wizard.progress());
        assert!(SubmissionWizard::resume(registry, 8, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_submit_twice_keeps_identity() {
        let registry = registry();
        let publisher = RecordingPublisher::new();
        let mut wizard = ready_pikachu(&registry).await;

        let first = wizard.submit(&publisher).await.unwrap();
        assert_eq!(wizard.state(), WizardState::Committed);
        let second = wizard.submit(&publisher).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(publisher.publish_count(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_leased(first));
        let drafts = registry.store().find_many(DRAFTS, &json!({})).await.unwrap();
        assert!(drafts.is_empty());
    }

    #[tokio::test]
    async fn test_submit_republishes_missing_message() {
        let registry = registry();
        let mut wizard = ready_pikachu(&registry).await;

        let mut publisher = MockPublisher::new();
        publisher.expect_ensure_thread().returning(|_, _| Ok(70));
        publisher.expect_publish().times(1).returning(|oc| {
            Ok(Published {
                message_id: if oc.id.is_none() { 100 } else { 101 },
                thread: 70,
                image_url: None,
            })
        });
        let first = wizard.submit(&publisher).await.unwrap();
        assert_eq!(first, 100);

        let mut publisher = MockPublisher::new();
        publisher
            .expect_edit()
            .times(1)
            .returning(|_| Err(PlatformError::NotFound { message_id: 100 }));
        publisher.expect_publish().times(1).returning(|_| {
            Ok(Published {
                message_id: 101,
                thread: 70,
                image_url: None,
            })
        });
        let second = wizard.submit(&publisher).await.unwrap();

        assert_eq!(second, 101);
        assert!(registry.get(100).is_none());
        let stored = registry.store().find_many(CHARACTERS, &json!({})).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["id"], 101);
    }

    #[tokio::test]
    async fn test_publish_failure_persists_nothing() {
        let registry = registry();
        let mut wizard = ready_pikachu(&registry).await;

        let mut publisher = MockPublisher::new();
        publisher.expect_ensure_thread().returning(|_, _| Ok(70));
        publisher.expect_publish().returning(|_| {
            Err(PlatformError::request_failed(
                "publish",
                std::io::Error::other("gateway down"),
            ))
        });

        assert!(wizard.submit(&publisher).await.is_err());
        assert!(registry.is_empty());
        assert_eq!(wizard.state(), WizardState::Selecting);
    }

    #[tokio::test]
    async fn test_switch_template_resets_species_fields() {
        let registry = registry();
        let mut wizard = ready_pikachu(&registry).await;
        wizard.character.sp_ability = Some(Default::default());

        wizard.switch_template(Template::Legendary).await.unwrap();

        for field in Field::SPECIES_BOUND {
            assert!(!wizard.progress().contains(&field));
        }
        assert!(wizard.progress().contains(&Field::Name));
        assert!(wizard.character().species.is_none());
        assert!(wizard.character().sp_ability.is_none());
    }

    #[tokio::test]
    async fn test_cancel_removes_uncommitted_draft() {
        let registry = registry();
        let mut wizard = ready_pikachu(&registry).await;
        wizard.cancel().await.unwrap();

        assert_eq!(wizard.state(), WizardState::Cancelled);
        assert!(SubmissionWizard::resume(registry, 7, 1).await.unwrap().is_none());
        assert!(wizard.begin(Field::Name).is_err());
    }

    #[tokio::test]
    async fn test_timeout_keeps_draft() {
        let registry = registry();
        let mut wizard = ready_pikachu(&registry).await;
        wizard.on_timeout();

        assert_eq!(wizard.state(), WizardState::Cancelled);
        assert!(SubmissionWizard::resume(registry, 7, 1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_requires_commit() {
        let registry = registry();
        let publisher = RecordingPublisher::new();
        let mut wizard = ready_pikachu(&registry).await;
        assert!(wizard.delete(&publisher).await.is_err());

        let id = wizard.submit(&publisher).await.unwrap();
        wizard.delete(&publisher).await.unwrap();
        assert_eq!(wizard.state(), WizardState::Deleted);
        assert!(registry.get(id).is_none());
        assert_eq!(publisher.message_count(), 0);
        assert!(!registry.is_leased(id));
    }

    #[tokio::test]
    async fn test_sheet_prefills_progress() {
        let registry = registry();
        let sheet = crate::parser::parse_sheet(
            "Name: Sparky\nSpecies: Pikachu\nMoveset: Thunderbolt",
            registry.catalog(),
            7,
            1,
        );
        let wizard = SubmissionWizard::from_sheet(Arc::clone(&registry), sheet)
            .await
            .unwrap();

        assert!(wizard.can_submit());
        for field in [Field::Name, Field::Species, Field::Abilities, Field::Moveset] {
            assert!(wizard.progress().contains(&field), "{field} not done");
        }
        assert!(SubmissionWizard::resume(registry, 7, 1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_editor_is_locked_out() {
        let registry = registry();
        let publisher = RecordingPublisher::new();
        let mut wizard = ready_pikachu(&registry).await;
        let id = wizard.submit(&publisher).await.unwrap();

        let err = SubmissionWizard::edit(Arc::clone(&registry), 7, id).unwrap_err();
        assert!(matches!(err, CoreError::RecordLocked { .. }));

        drop(wizard);
        let reopened = SubmissionWizard::edit(Arc::clone(&registry), 7, id).unwrap();
        assert!(reopened.can_submit());
        assert!(matches!(
            SubmissionWizard::edit(registry, 9, id),
            Err(CoreError::NotOwner { .. })
        ));
    }
}
