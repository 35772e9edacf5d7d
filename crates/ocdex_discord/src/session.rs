//! Drives the core wizards through one interaction chain.
//!
//! The loops here only see a [`Prompter`], a [`Notifier`] and a
//! [`Publisher`], so they run the same against Discord and against the
//! scripted collaborators in tests.

use crate::Result;
use crate::error::{DiscordError, bullet_list};
use async_trait::async_trait;
use ocdex_core::prompt::{Answer, ChoiceOption, ChoiceRequest, Prompter};
use ocdex_core::{
    CoreError, Field, FieldOutcome, Modification, ModificationReport, ModificationWizard,
    Publisher, SubmissionWizard, Template,
};
use serenity::builder::CreateEmbed;

/// Tells the person driving a session how things went
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notice(&self, content: &str) -> ocdex_core::Result<()>;

    async fn show(&self, content: &str, embed: CreateEmbed) -> ocdex_core::Result<()>;

    /// The last prompt went unanswered until it expired
    fn timed_out(&self) -> bool;
}

/// How a submission session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Submitted(u64),
    /// Left for later, the draft is stored
    Saved,
    Cancelled,
    TimedOut,
}

/// One entry of the submission menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Edit(Field),
    SwitchKind,
    Submit,
}

pub fn menu_actions(wizard: &SubmissionWizard) -> Vec<(MenuAction, ChoiceOption)> {
    let mut actions: Vec<(MenuAction, ChoiceOption)> = wizard
        .menu()
        .into_iter()
        .map(|entry| {
            let mark = match (&entry.defect, entry.done) {
                (Some(_), _) => "✗",
                (None, true) => "✓",
                (None, false) => "·",
            };
            let option = ChoiceOption::new(format!("{mark} {}", entry.label()));
            let option = match (entry.defect, entry.required) {
                (Some(defect), _) => option.describe(defect),
                (None, false) => option.describe("Optional"),
                (None, true) => option,
            };
            (MenuAction::Edit(entry.field), option)
        })
        .collect();

    let published = wizard.character().id.is_some();
    if !published {
        actions.push((
            MenuAction::SwitchKind,
            ChoiceOption::new("Change kind").describe(wizard.template().label()),
        ));
    }
    if wizard.can_submit() {
        let label = if published { "Update" } else { "Submit" };
        actions.push((
            MenuAction::Submit,
            ChoiceOption::new(label).describe("Everything checks out"),
        ));
    }
    actions
}

/// Failures caused by the user's input rather than the platform
fn recoverable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::InvalidFusion { .. }
            | CoreError::UnknownEntity { .. }
            | CoreError::InputFailed { .. }
            | CoreError::SubmissionBlocked { .. }
    )
}

async fn stop(wizard: &mut SubmissionWizard, notifier: &dyn Notifier) -> Result<SessionEnd> {
    if notifier.timed_out() {
        wizard.on_timeout();
        let note = if wizard.character().id.is_some() {
            "Timed out, nothing was changed."
        } else {
            "Timed out. Your progress is saved, run `/submit` to pick it up again."
        };
        if let Err(e) = notifier.notice(note).await {
            tracing::debug!("could not report timeout: {}", e);
        }
        return Ok(SessionEnd::TimedOut);
    }
    wizard.cancel().await?;
    notifier.notice("Submission cancelled.").await?;
    Ok(SessionEnd::Cancelled)
}

fn menu_title(wizard: &SubmissionWizard) -> String {
    let character = wizard.character();
    if character.name.is_empty() {
        format!("New {} character", wizard.template().label())
    } else {
        format!("{} ({})", character.name, wizard.template().label())
    }
}

/// Show the field menu until the character is submitted or the user leaves
#[tracing::instrument(skip_all, fields(author = wizard.character().author))]
pub async fn drive_submission(
    wizard: &mut SubmissionWizard,
    prompter: &dyn Prompter,
    notifier: &dyn Notifier,
    publisher: &dyn Publisher,
) -> Result<SessionEnd> {
    loop {
        let (actions, options): (Vec<MenuAction>, Vec<ChoiceOption>) =
            menu_actions(wizard).into_iter().unzip();
        let picked = match prompter
            .choose(ChoiceRequest::single(menu_title(wizard), options))
            .await?
        {
            Answer::Value(picks) => picks.first().and_then(|idx| actions.get(*idx)).copied(),
            Answer::Skipped => {
                wizard.save_draft().await?;
                let note = if wizard.character().id.is_some() {
                    "Left unchanged."
                } else {
                    "Saved for later, run `/submit` to continue."
                };
                notifier.notice(note).await?;
                return Ok(SessionEnd::Saved);
            }
            Answer::Cancelled => return stop(wizard, notifier).await,
        };
        let Some(action) = picked else {
            continue;
        };

        match action {
            MenuAction::Edit(field) => match wizard.select(field, prompter).await {
                Ok(FieldOutcome::Cancelled) if notifier.timed_out() => {
                    return stop(wizard, notifier).await;
                }
                Ok(_) => {}
                Err(e) if notifier.timed_out() => {
                    tracing::debug!(field = field.label(), "edit ended by timeout: {}", e);
                    return stop(wizard, notifier).await;
                }
                Err(e) => {
                    if !recoverable(&e) {
                        tracing::warn!(field = field.label(), "field edit failed: {}", e);
                    }
                    notifier
                        .notice(&DiscordError::from(e).user_message())
                        .await?;
                }
            },
            MenuAction::SwitchKind => {
                let options = Template::ALL
                    .iter()
                    .map(|t| {
                        ChoiceOption::new(t.label())
                            .describe(t.description())
                            .selected(*t == wizard.template())
                    })
                    .collect();
                match prompter
                    .choose(ChoiceRequest::single("Kind of character", options))
                    .await?
                {
                    Answer::Value(picks) => {
                        if let Some(template) = picks.first().and_then(|idx| Template::ALL.get(*idx)) {
                            wizard.switch_template(*template).await?;
                        }
                    }
                    Answer::Skipped => {}
                    Answer::Cancelled if notifier.timed_out() => {
                        return stop(wizard, notifier).await;
                    }
                    Answer::Cancelled => {}
                }
            }
            MenuAction::Submit => match wizard.submit(publisher).await {
                Ok(id) => {
                    let link = wizard
                        .character()
                        .jump_url()
                        .map(|url| format!(" {url}"))
                        .unwrap_or_default();
                    notifier
                        .notice(&format!("**{}** is registered.{link}", wizard.character().name))
                        .await?;
                    return Ok(SessionEnd::Submitted(id));
                }
                Err(CoreError::SubmissionBlocked { defects }) => {
                    notifier
                        .notice(&format!("Not ready yet:\n{}", bullet_list(&defects)))
                        .await?;
                }
                Err(e) => return Err(e.into()),
            },
        }
    }
}

pub fn report_summary(report: &ModificationReport, name: &str) -> String {
    let mut lines = Vec::new();
    if report.changed {
        let applied = report
            .applied
            .iter()
            .map(|m| m.label())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Updated **{name}**: {applied}."));
    } else {
        lines.push(format!("Nothing about **{name}** changed."));
    }
    if let Some(cancelled) = report.cancelled {
        lines.push(format!("Stopped at {}.", cancelled.label()));
    }
    if let Some((failed, reason)) = &report.failed {
        lines.push(format!("{} failed: {reason}", failed.label()));
    }
    lines.join("\n")
}

/// Let the user pick modifications and run them as one batch
#[tracing::instrument(skip_all, fields(id = ?wizard.character().id))]
pub async fn drive_modification(
    wizard: &mut ModificationWizard,
    prompter: &dyn Prompter,
    notifier: &dyn Notifier,
    publisher: &dyn Publisher,
) -> Result<Option<ModificationReport>> {
    let available = wizard.available();
    if available.is_empty() {
        wizard.cancel();
        notifier.notice("There is nothing to change on this character.").await?;
        return Ok(None);
    }

    let options = available
        .iter()
        .map(|m| ChoiceOption::new(m.label()).describe(m.description()))
        .collect();
    let request = ChoiceRequest::many(
        format!("What should change on {}?", wizard.character().name),
        options,
        1,
        available.len(),
    );
    let kinds: Vec<Modification> = match prompter.choose(request).await? {
        Answer::Value(picks) => picks
            .iter()
            .filter_map(|idx| available.get(*idx).copied())
            .collect(),
        Answer::Skipped | Answer::Cancelled => Vec::new(),
    };
    if kinds.is_empty() {
        wizard.cancel();
        if !notifier.timed_out() {
            notifier.notice("Nothing was changed.").await?;
        }
        return Ok(None);
    }

    let report = wizard.run(&kinds, prompter, publisher).await?;
    let mut summary = report_summary(&report, &wizard.character().name);
    if let Some(url) = wizard.character().jump_url().filter(|_| report.changed) {
        summary.push_str(&format!("\n{url}"));
    }
    notifier.notice(&summary).await?;
    Ok(Some(report))
}

/// Confirm, then remove a published character and its message
pub async fn drive_deletion(
    wizard: &mut SubmissionWizard,
    prompter: &dyn Prompter,
    notifier: &dyn Notifier,
    publisher: &dyn Publisher,
) -> Result<bool> {
    let name = wizard.character().name.clone();
    let confirmed = prompter
        .confirm(&format!("Delete **{name}**? This cannot be undone."))
        .await?;
    if confirmed != Answer::Value(true) {
        wizard.cancel().await?;
        if !notifier.timed_out() {
            notifier.notice(&format!("**{name}** was kept.")).await?;
        }
        return Ok(false);
    }
    wizard.delete(publisher).await?;
    notifier.notice(&format!("**{name}** was deleted.")).await?;
    Ok(true)
}
