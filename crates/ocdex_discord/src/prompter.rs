//! Interaction driven [`Prompter`].
//!
//! Every prompt is an ephemeral followup carrying its own components. Free
//! text goes through a modal opened from a button, choices through a select
//! menu, images through a message the user posts in the channel. Each
//! answered component hands us a fresh interaction token, so long sessions
//! keep outliving the fifteen minute token lifetime.

use crate::helpers::{LABEL_LIMIT, MODAL_TITLE_LIMIT, truncate};
use crate::session::Notifier;
use async_trait::async_trait;
use ocdex_core::character::ImageRef;
use ocdex_core::prompt::{Answer, CHOICE_LIMIT, ChoiceRequest, Prompter, TextRequest};
use ocdex_core::{CoreError, PlatformError};
use parking_lot::Mutex;
use serenity::{
    builder::{
        CreateActionRow, CreateButton, CreateEmbed, CreateInputText,
        CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, CreateSelectMenu,
        CreateSelectMenuKind, CreateSelectMenuOption,
    },
    client::Context,
    collector::MessageCollector,
    utils::CreateQuickModal,
    model::{
        application::{
            ButtonStyle, CommandInteraction, ComponentInteraction, ComponentInteractionDataKind,
            InputTextStyle,
        },
        channel::Message,
        id::{ChannelId, UserId},
    },
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const OPEN: &str = "open";
const PICK: &str = "pick";
const YES: &str = "yes";
const NO: &str = "no";
const SKIP: &str = "skip";
const CANCEL: &str = "cancel";

/// Largest upload accepted as character art
const IMAGE_LIMIT: u32 = 8 * 1024 * 1024;

fn platform(operation: &'static str, e: serenity::Error) -> CoreError {
    PlatformError::request_failed(operation, e).into()
}

fn button(id: &str, label: &str, style: ButtonStyle) -> CreateButton {
    CreateButton::new(id).label(label).style(style)
}

fn skip_cancel_row(skip_label: &str) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        button(SKIP, skip_label, ButtonStyle::Secondary),
        button(CANCEL, "Cancel", ButtonStyle::Danger),
    ])
}

/// Indexes a select menu reported, ignoring anything out of range
pub(crate) fn parse_picks(values: &[String], len: usize) -> Vec<usize> {
    let mut picks: Vec<usize> = values
        .iter()
        .filter_map(|value| value.parse::<usize>().ok())
        .filter(|idx| *idx < len)
        .collect();
    picks.sort_unstable();
    picks.dedup();
    picks
}

/// Art a user posted as a message: the first image attachment, or a link
pub(crate) fn image_link(content: &str) -> Option<String> {
    let content = content.trim();
    (content.starts_with("https://") || content.starts_with("http://"))
        .then(|| content.split_whitespace().next().unwrap_or(content).to_string())
}

pub struct DiscordPrompter {
    ctx: Context,
    user: UserId,
    channel: ChannelId,
    /// Token of the most recent interaction, used for followups
    token: Mutex<String>,
    timeout: Duration,
    timed_out: AtomicBool,
}

impl DiscordPrompter {
    /// Prompt the invoker of `command`, which must already be deferred
    pub fn new(ctx: &Context, command: &CommandInteraction, timeout: Duration) -> Self {
        Self {
            ctx: ctx.clone(),
            user: command.user.id,
            channel: command.channel_id,
            token: Mutex::new(command.token.clone()),
            timeout,
            timed_out: AtomicBool::new(false),
        }
    }

    fn token(&self) -> String {
        self.token.lock().clone()
    }

    async fn followup(
        &self,
        builder: CreateInteractionResponseFollowup,
    ) -> Result<Message, CoreError> {
        let token = self.token();
        self.ctx
            .http
            .create_followup_message(&token, &builder, Vec::new())
            .await
            .map_err(|e| platform("send prompt", e))
    }

    async fn ask(
        &self,
        content: &str,
        components: Vec<CreateActionRow>,
    ) -> Result<Message, CoreError> {
        self.followup(
            CreateInteractionResponseFollowup::new()
                .content(content)
                .components(components)
                .ephemeral(true),
        )
        .await
    }

    /// The next component the user presses on `message`
    async fn wait(&self, message: &Message) -> Option<ComponentInteraction> {
        let pressed = message
            .await_component_interaction(&self.ctx.shard)
            .author_id(self.user)
            .timeout(self.timeout)
            .await;
        match &pressed {
            Some(interaction) => *self.token.lock() = interaction.token.clone(),
            None => {
                tracing::debug!(user = %self.user, "prompt timed out");
                self.timed_out.store(true, Ordering::SeqCst);
            }
        }
        pressed
    }

    /// Answer the press by replacing the prompt with `summary`
    async fn close(&self, pressed: &ComponentInteraction, summary: &str) -> Result<(), CoreError> {
        pressed
            .create_response(
                &self.ctx.http,
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .content(summary)
                        .components(Vec::new()),
                ),
            )
            .await
            .map_err(|e| platform("close prompt", e))
    }

    /// Remove a prompt whose press was answered some other way
    async fn forget(&self, message: &Message) {
        let token = self.token();
        if let Err(e) = self
            .ctx
            .http
            .delete_followup_message(&token, message.id)
            .await
        {
            tracing::debug!("could not remove prompt {}: {}", message.id, e);
        }
    }

    /// Answer `Skipped` or `Cancelled` when the press was one of those
    async fn skip_or_cancel<T>(
        &self,
        pressed: &ComponentInteraction,
    ) -> Result<Option<Answer<T>>, CoreError> {
        match pressed.data.custom_id.as_str() {
            SKIP => {
                self.close(pressed, "Skipped.").await?;
                Ok(Some(Answer::Skipped))
            }
            CANCEL => {
                self.close(pressed, "Cancelled.").await?;
                Ok(Some(Answer::Cancelled))
            }
            _ => Ok(None),
        }
    }

    async fn wait_for_post(&self) -> Option<Message> {
        MessageCollector::new(&self.ctx.shard)
            .channel_id(self.channel)
            .author_id(self.user)
            .timeout(self.timeout)
            .next()
            .await
    }

    async fn image_from_post(&self, post: &Message) -> Result<Option<ImageRef>, CoreError> {
        let attachment = post.attachments.iter().find(|a| {
            a.content_type
                .as_deref()
                .is_some_and(|kind| kind.starts_with("image/"))
        });
        let image = match attachment {
            Some(attachment) if attachment.size > IMAGE_LIMIT => {
                return Err(CoreError::input_failed(
                    "Image",
                    format!("{} is larger than 8 MB", attachment.filename),
                ));
            }
            Some(attachment) => {
                let bytes = attachment
                    .download()
                    .await
                    .map_err(|e| platform("download image", e))?;
                Some(ImageRef::Upload {
                    filename: attachment.filename.clone(),
                    bytes,
                })
            }
            None => image_link(&post.content).map(|url| ImageRef::Url { url }),
        };
        if image.is_some() {
            // The art lives on in the character message
            if let Err(e) = post.delete(&self.ctx.http).await {
                tracing::debug!("could not tidy image post: {}", e);
            }
        }
        Ok(image)
    }
}

#[async_trait]
impl Prompter for DiscordPrompter {
    async fn text(&self, request: TextRequest) -> ocdex_core::Result<Answer<String>> {
        let mut row = vec![button(
            OPEN,
            &truncate(&request.label, LABEL_LIMIT),
            ButtonStyle::Primary,
        )];
        if !request.required {
            row.push(button(SKIP, "Keep", ButtonStyle::Secondary));
        }
        row.push(button(CANCEL, "Cancel", ButtonStyle::Danger));
        let content = match &request.default {
            Some(current) if !current.is_empty() => format!(
                "**{}**\nCurrently: {}",
                request.title,
                truncate(current, 1500)
            ),
            _ => format!("**{}**", request.title),
        };
        let message = self
            .ask(&content, vec![CreateActionRow::Buttons(row)])
            .await?;

        let Some(pressed) = self.wait(&message).await else {
            return Ok(Answer::Cancelled);
        };
        if let Some(answer) = self.skip_or_cancel(&pressed).await? {
            return Ok(answer);
        }

        let style = if request.multiline {
            InputTextStyle::Paragraph
        } else {
            InputTextStyle::Short
        };
        let mut input = CreateInputText::new(
            style,
            truncate(&request.label, MODAL_TITLE_LIMIT),
            "value",
        )
        .required(request.required);
        if let Some(placeholder) = &request.placeholder {
            input = input.placeholder(truncate(placeholder, LABEL_LIMIT));
        }
        if let Some(default) = &request.default {
            input = input.value(default);
        }
        if let Some(max) = request.max_length {
            input = input.max_length(max.min(4000) as u16);
        }
        let modal = CreateQuickModal::new(truncate(&request.title, MODAL_TITLE_LIMIT))
            .timeout(self.timeout)
            .field(input);

        let response = pressed
            .quick_modal(&self.ctx, modal)
            .await
            .map_err(|e| platform("open modal", e))?;
        let Some(response) = response else {
            self.timed_out.store(true, Ordering::SeqCst);
            self.forget(&message).await;
            return Ok(Answer::Cancelled);
        };
        response
            .interaction
            .create_response(&self.ctx.http, CreateInteractionResponse::Acknowledge)
            .await
            .map_err(|e| platform("acknowledge modal", e))?;
        *self.token.lock() = response.interaction.token.clone();
        self.forget(&message).await;

        let value = response.inputs.into_iter().next().unwrap_or_default();
        Ok(Answer::Value(value.trim().to_string()))
    }

    async fn choose(&self, request: ChoiceRequest) -> ocdex_core::Result<Answer<Vec<usize>>> {
        let shown = request.options.len().min(CHOICE_LIMIT);
        let options: Vec<CreateSelectMenuOption> = request
            .options
            .iter()
            .take(shown)
            .enumerate()
            .map(|(idx, option)| {
                let mut rendered =
                    CreateSelectMenuOption::new(truncate(&option.label, LABEL_LIMIT), idx.to_string())
                        .default_selection(option.selected);
                if let Some(description) = &option.description {
                    rendered = rendered.description(truncate(description, LABEL_LIMIT));
                }
                rendered
            })
            .collect();
        let max = request.max.min(shown).max(1);
        let menu = CreateSelectMenu::new(PICK, CreateSelectMenuKind::String { options })
            .placeholder(truncate(&request.title, LABEL_LIMIT))
            .min_values(request.min.min(max) as u8)
            .max_values(max as u8);

        let message = self
            .ask(
                &format!("**{}**", request.title),
                vec![CreateActionRow::SelectMenu(menu), skip_cancel_row("Skip")],
            )
            .await?;
        let Some(pressed) = self.wait(&message).await else {
            return Ok(Answer::Cancelled);
        };
        if let Some(answer) = self.skip_or_cancel(&pressed).await? {
            return Ok(answer);
        }

        let picks = match &pressed.data.kind {
            ComponentInteractionDataKind::StringSelect { values } => parse_picks(values, shown),
            other => {
                tracing::warn!("unexpected component answer: {:?}", other);
                Vec::new()
            }
        };
        let summary = picks
            .iter()
            .map(|idx| request.options[*idx].label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        self.close(&pressed, &format!("**{}**: {}", request.title, summary))
            .await?;
        Ok(Answer::Value(picks))
    }

    async fn confirm(&self, prompt: &str) -> ocdex_core::Result<Answer<bool>> {
        let message = self
            .ask(
                prompt,
                vec![CreateActionRow::Buttons(vec![
                    button(YES, "Yes", ButtonStyle::Success),
                    button(NO, "No", ButtonStyle::Secondary),
                    button(CANCEL, "Cancel", ButtonStyle::Danger),
                ])],
            )
            .await?;
        let Some(pressed) = self.wait(&message).await else {
            return Ok(Answer::Cancelled);
        };
        if let Some(answer) = self.skip_or_cancel(&pressed).await? {
            return Ok(answer);
        }
        let yes = pressed.data.custom_id == YES;
        self.close(&pressed, if yes { "Yes." } else { "No." }).await?;
        Ok(Answer::Value(yes))
    }

    async fn image(&self, prompt: &str, default: Option<&str>) -> ocdex_core::Result<Answer<ImageRef>> {
        let mut content = format!("**{prompt}**\nPost an image or a link in this channel.");
        if let Some(current) = default {
            content.push_str(&format!("\nCurrently: {current}"));
        }
        let message = self.ask(&content, vec![skip_cancel_row("Keep")]).await?;

        tokio::select! {
            pressed = self.wait(&message) => {
                let Some(pressed) = pressed else {
                    return Ok(Answer::Cancelled);
                };
                Ok(self.skip_or_cancel(&pressed).await?.unwrap_or(Answer::Skipped))
            }
            post = self.wait_for_post() => {
                self.forget(&message).await;
                let Some(post) = post else {
                    self.timed_out.store(true, Ordering::SeqCst);
                    return Ok(Answer::Cancelled);
                };
                match self.image_from_post(&post).await? {
                    Some(image) => Ok(Answer::Value(image)),
                    None => Err(CoreError::input_failed(
                        "Image",
                        "that message held no image or link",
                    )),
                }
            }
        }
    }
}

#[async_trait]
impl Notifier for DiscordPrompter {
    async fn notice(&self, content: &str) -> ocdex_core::Result<()> {
        self.followup(
            CreateInteractionResponseFollowup::new()
                .content(truncate(content, 2000))
                .ephemeral(true),
        )
        .await
        .map(|_| ())
    }

    async fn show(&self, content: &str, embed: CreateEmbed) -> ocdex_core::Result<()> {
        self.followup(
            CreateInteractionResponseFollowup::new()
                .content(content)
                .embed(embed)
                .ephemeral(true),
        )
        .await
        .map(|_| ())
    }

    fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_picks_drops_out_of_range() {
        let values = vec!["3".to_string(), "0".to_string(), "x".to_string(), "30".to_string(), "3".to_string()];
        assert_eq!(parse_picks(&values, 25), vec![0, 3]);
    }

    #[test]
    fn test_image_link_takes_first_url() {
        assert_eq!(
            image_link(" https://example.com/a.png look at this"),
            Some("https://example.com/a.png".to_string())
        );
        assert_eq!(image_link("a picture"), None);
    }
}
