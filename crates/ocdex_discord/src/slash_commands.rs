//! Discord slash command implementations

use crate::bot::BotState;
use crate::error::bullet_list;
use crate::helpers::{
    attachment_option, character_list, find_character, leaf_options, npc_embed, string_option,
    truncate, user_option,
};
use crate::prompter::DiscordPrompter;
use crate::session::{self, Notifier, SessionEnd};
use crate::{DiscordError, Result};
use ocdex_core::npc::PrefixChange;
use ocdex_core::prompt::{Answer, ChoiceOption, ChoiceRequest, Prompter};
use ocdex_core::{
    Character, CoreError, ModificationWizard, Npc, SubmissionWizard, Template, parse_sheet,
};
use serenity::{
    builder::{
        CreateAutocompleteResponse, CreateCommand, CreateCommandOption, CreateEmbed,
        CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage,
    },
    client::Context,
    model::{
        application::{CommandInteraction, CommandOptionType},
        channel::Attachment,
        colour::Colour,
        permissions::Permissions,
    },
};
use std::sync::Arc;

/// Largest sheet file read
const SHEET_LIMIT: u32 = 256 * 1024;

/// Embeds a single message may carry
const EMBED_LIMIT: usize = 10;

fn character_option(description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, "character", description)
        .required(true)
        .set_autocomplete(true)
}

fn npc_name_option() -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, "name", "Name of the NPC")
        .required(true)
        .set_autocomplete(true)
}

/// Create all slash commands for registration
pub fn create_commands() -> Vec<CreateCommand> {
    let mut kind = CreateCommandOption::new(
        CommandOptionType::String,
        "kind",
        "Kind of character to submit",
    )
    .required(false);
    for template in Template::ALL {
        kind = kind.add_string_choice(template.label(), template.label());
    }

    vec![
        CreateCommand::new("submit")
            .description("Submit a new character, or continue your draft")
            .dm_permission(false)
            .add_option(kind)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Attachment,
                    "sheet",
                    "A filled in character sheet as a text file",
                )
                .required(false),
            ),
        CreateCommand::new("edit")
            .description("Walk through every field of one of your characters")
            .dm_permission(false)
            .add_option(character_option("Character to edit")),
        CreateCommand::new("modify")
            .description("Evolve, rename or otherwise change one of your characters")
            .dm_permission(false)
            .add_option(character_option("Character to modify")),
        CreateCommand::new("delete")
            .description("Delete one of your characters")
            .dm_permission(false)
            .add_option(character_option("Character to delete")),
        CreateCommand::new("ocs")
            .description("List registered characters")
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "member", "Whose characters")
                    .required(false),
            ),
        CreateCommand::new("npc")
            .description("Manage NPC presets you can narrate as")
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "create", "Create an NPC")
                    .add_sub_option(
                        CreateCommandOption::new(CommandOptionType::String, "name", "Display name")
                            .required(true),
                    )
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::String,
                            "prefix",
                            "How you call it, like npc:text or [text]",
                        )
                        .required(false),
                    )
                    .add_sub_option(
                        CreateCommandOption::new(CommandOptionType::String, "image", "Avatar url")
                            .required(false),
                    ),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::SubCommand,
                    "prefix",
                    "Add a prefix to an NPC, or remove it if it has it",
                )
                .add_sub_option(npc_name_option())
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "pattern",
                        "Like npc:text or [text]",
                    )
                    .required(true),
                ),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "image", "Change an NPC's avatar")
                    .add_sub_option(npc_name_option())
                    .add_sub_option(
                        CreateCommandOption::new(CommandOptionType::String, "url", "Avatar url")
                            .required(true),
                    ),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "delete", "Delete an NPC")
                    .add_sub_option(npc_name_option()),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "list",
                "List your NPCs",
            )),
        CreateCommand::new("support")
            .description("Manage characters on behalf of a member")
            .dm_permission(false)
            .default_member_permissions(Permissions::MANAGE_GUILD)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::User,
                    "member",
                    "Member to act for, leave empty to stop",
                )
                .required(false),
            ),
    ]
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: impl Into<String>) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await
        .map_err(|e| DiscordError::interaction("respond", command.user.id.get(), e))
}

async fn respond_embeds(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
    embeds: Vec<CreateEmbed>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .embeds(embeds)
                    .ephemeral(true),
            ),
        )
        .await
        .map_err(|e| DiscordError::interaction("respond", command.user.id.get(), e))
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await
        .map_err(|e| DiscordError::interaction("defer", command.user.id.get(), e))
}

/// Tell the user a command failed, whether or not it was answered already
pub async fn report_error(ctx: &Context, command: &CommandInteraction, error: &DiscordError) {
    let message = error.user_message();
    let first = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(&message)
            .ephemeral(true),
    );
    if command.create_response(&ctx.http, first).await.is_ok() {
        return;
    }
    if let Err(e) = command
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content(message)
                .ephemeral(true),
        )
        .await
    {
        tracing::warn!("could not report error to {}: {}", command.user.name, e);
    }
}

fn server_of(command: &CommandInteraction) -> u64 {
    command.guild_id.map_or(0, |guild| guild.get())
}

async fn read_sheet(sheet: &Attachment) -> Result<String> {
    let attachment_error = |cause: Box<dyn std::error::Error + Send + Sync>| {
        DiscordError::AttachmentError {
            filename: sheet.filename.clone(),
            size_bytes: sheet.size,
            cause,
        }
    };
    if sheet.size > SHEET_LIMIT {
        return Err(attachment_error("sheet is larger than 256 KB".into()));
    }
    let bytes = sheet
        .download()
        .await
        .map_err(|e| attachment_error(Box::new(e)))?;
    String::from_utf8(bytes).map_err(|e| attachment_error(Box::new(e)))
}

async fn pick_template(prompter: &DiscordPrompter) -> Result<Option<Template>> {
    let options = Template::ALL
        .iter()
        .map(|t| ChoiceOption::new(t.label()).describe(t.description()))
        .collect();
    match prompter
        .choose(ChoiceRequest::single("What kind of character?", options))
        .await?
    {
        Answer::Value(picks) => Ok(picks.first().and_then(|idx| Template::ALL.get(*idx)).copied()),
        Answer::Skipped | Answer::Cancelled => Ok(None),
    }
}

/// Handle the /submit command
pub async fn handle_submit(state: &BotState, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let publisher = state.publisher(ctx)?;
    defer(ctx, command).await?;

    let author = state.registry.acting_for(command.user.id.get());
    let server = server_of(command);
    let prompter = DiscordPrompter::new(ctx, command, state.prompt_timeout());
    let (_, options) = leaf_options(command);
    let registry = Arc::clone(&state.registry);

    let mut wizard = if let Some(sheet) = attachment_option(command, options, "sheet") {
        let text = read_sheet(sheet).await?;
        let parsed = parse_sheet(&text, registry.catalog(), author, server);
        if !parsed.unresolved.is_empty() {
            prompter
                .notice(&format!(
                    "These entries did not match anything:\n{}",
                    bullet_list(&parsed.unresolved)
                ))
                .await?;
        }
        SubmissionWizard::from_sheet(registry, parsed).await?
    } else {
        let resumed = match SubmissionWizard::resume(Arc::clone(&registry), author, server).await? {
            Some(mut draft) => match prompter
                .confirm("You have an unfinished submission. Continue it?")
                .await?
            {
                Answer::Value(true) => Some(draft),
                Answer::Value(false) => {
                    draft.cancel().await?;
                    None
                }
                Answer::Skipped | Answer::Cancelled => return Ok(()),
            },
            None => None,
        };
        match resumed {
            Some(draft) => draft,
            None => {
                let chosen = string_option(options, "kind").and_then(Template::deduce);
                let template = match chosen {
                    Some(template) => template,
                    None => match pick_template(&prompter).await? {
                        Some(template) => template,
                        None => return Ok(()),
                    },
                };
                SubmissionWizard::new(registry, author, server, template)
            }
        }
    };

    let end = session::drive_submission(&mut wizard, &prompter, &prompter, &publisher).await?;
    tracing::info!(author, ?end, "submission session ended");
    Ok(())
}

/// The caller's character named by the `character` option
fn chosen_character(state: &BotState, command: &CommandInteraction) -> Result<Character> {
    let (_, options) = leaf_options(command);
    let value = string_option(options, "character")
        .ok_or_else(|| DiscordError::invalid_option(&command.data.name, "character"))?;
    let author = state.registry.acting_for(command.user.id.get());
    let characters = state.registry.characters_of(author);
    find_character(&characters, value)
        .cloned()
        .ok_or_else(|| CoreError::unknown("character", value).into())
}

fn character_id(character: &Character) -> Result<u64> {
    character
        .id
        .ok_or_else(|| CoreError::unknown("character", character.name.clone()).into())
}

/// Handle the /edit command
pub async fn handle_edit(state: &BotState, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let id = character_id(&chosen_character(state, command)?)?;
    let mut wizard = SubmissionWizard::edit(Arc::clone(&state.registry), command.user.id.get(), id)?;
    let publisher = state.publisher(ctx)?;
    defer(ctx, command).await?;

    let prompter = DiscordPrompter::new(ctx, command, state.prompt_timeout());
    let end = session::drive_submission(&mut wizard, &prompter, &prompter, &publisher).await?;
    if end == SessionEnd::Cancelled {
        tracing::debug!(id, "edit abandoned");
    }
    Ok(())
}

/// Handle the /modify command
pub async fn handle_modify(state: &BotState, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let id = character_id(&chosen_character(state, command)?)?;
    let mut wizard =
        ModificationWizard::new(Arc::clone(&state.registry), command.user.id.get(), id)?;
    let publisher = state.publisher(ctx)?;
    defer(ctx, command).await?;

    let prompter = DiscordPrompter::new(ctx, command, state.prompt_timeout());
    if let Some(report) =
        session::drive_modification(&mut wizard, &prompter, &prompter, &publisher).await?
    {
        tracing::info!(id, applied = report.applied.len(), "modification session ended");
    }
    Ok(())
}

/// Handle the /delete command
pub async fn handle_delete(state: &BotState, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let id = character_id(&chosen_character(state, command)?)?;
    let mut wizard = SubmissionWizard::edit(Arc::clone(&state.registry), command.user.id.get(), id)?;
    let publisher = state.publisher(ctx)?;
    defer(ctx, command).await?;

    let prompter = DiscordPrompter::new(ctx, command, state.prompt_timeout());
    session::drive_deletion(&mut wizard, &prompter, &prompter, &publisher).await?;
    Ok(())
}

/// Handle the /ocs command
pub async fn handle_ocs(state: &BotState, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let (_, options) = leaf_options(command);
    let (author, name) = match user_option(command, options, "member") {
        Some(user) => (user.id.get(), user.name.clone()),
        None => (command.user.id.get(), command.user.name.clone()),
    };
    let characters = state.registry.characters_of(author);
    if characters.is_empty() {
        return respond(ctx, command, format!("{name} has no registered characters.")).await;
    }

    let embed = CreateEmbed::new()
        .title(format!("{name}'s characters"))
        .colour(Colour::from_rgb(100, 150, 200))
        .description(truncate(&character_list(&characters), 4096));
    respond_embeds(ctx, command, "", vec![embed]).await
}

/// Handle the /npc command and its subcommands
pub async fn handle_npc(state: &BotState, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let (subcommand, options) = leaf_options(command);
    let author = command.user.id.get();
    let npc_named = |name: &str| {
        state
            .npcs
            .find(author, name)
            .ok_or_else(|| DiscordError::from(CoreError::unknown("NPC", name)))
    };

    match subcommand {
        Some("create") => {
            let name = string_option(options, "name")
                .ok_or_else(|| DiscordError::invalid_option("npc create", "name"))?;
            if state.npcs.find(author, name).is_some() {
                return respond(ctx, command, format!("You already have an NPC called **{name}**.")).await;
            }
            let mut npc = Npc::new(author, server_of(command), name)?;
            npc.image = string_option(options, "image").map(str::to_string);
            if let Some(prefix) = string_option(options, "prefix").and_then(Npc::parse_prefix) {
                npc.toggle_prefix(prefix);
            }
            state.npcs.save(&npc).await?;
            tracing::info!(author, npc = %npc.name, "NPC created");
            respond_embeds(ctx, command, "NPC created.", vec![npc_embed(&npc)]).await
        }
        Some("prefix") => {
            let mut npc = npc_named(string_option(options, "name").unwrap_or_default())?;
            let Some(prefix) = string_option(options, "pattern").and_then(Npc::parse_prefix) else {
                return Err(DiscordError::invalid_option("npc prefix", "pattern"));
            };
            let change = npc.toggle_prefix(prefix);
            state.npcs.save(&npc).await?;
            let verb = match change {
                PrefixChange::Added => "added",
                PrefixChange::Removed => "removed",
            };
            respond_embeds(ctx, command, format!("Prefix {verb}."), vec![npc_embed(&npc)]).await
        }
        Some("image") => {
            let mut npc = npc_named(string_option(options, "name").unwrap_or_default())?;
            npc.image = string_option(options, "url").map(str::to_string);
            state.npcs.save(&npc).await?;
            respond_embeds(ctx, command, "Avatar updated.", vec![npc_embed(&npc)]).await
        }
        Some("delete") => {
            let npc = npc_named(string_option(options, "name").unwrap_or_default())?;
            state.npcs.delete(&npc).await?;
            respond(ctx, command, format!("**{}** was deleted.", npc.name)).await
        }
        Some("list") => {
            let npcs = state.npcs.list(author);
            if npcs.is_empty() {
                return respond(ctx, command, "You have no NPCs yet, make one with `/npc create`.").await;
            }
            let embeds = npcs.iter().take(EMBED_LIMIT).map(npc_embed).collect();
            let content = if npcs.len() > EMBED_LIMIT {
                format!("Showing {EMBED_LIMIT} of {} NPCs.", npcs.len())
            } else {
                String::new()
            };
            respond_embeds(ctx, command, content, embeds).await
        }
        other => Err(DiscordError::invalid_option("npc", other.unwrap_or("subcommand"))),
    }
}

/// Handle the /support command
pub async fn handle_support(state: &BotState, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let (_, options) = leaf_options(command);
    let actor = command.user.id.get();
    match user_option(command, options, "member") {
        Some(member) => {
            state.registry.add_supporting(actor, member.id.get());
            tracing::info!(actor, author = %member.id, "acting on behalf of member");
            respond(
                ctx,
                command,
                format!("You are now managing characters for **{}**.", member.name),
            )
            .await
        }
        None => {
            let content = match state.registry.remove_supporting(actor) {
                Some(_) => "You are managing your own characters again.",
                None => "You were not acting for anyone.",
            };
            respond(ctx, command, content).await
        }
    }
}

/// Suggestions for the focused `character` or NPC `name` option
pub fn suggestions(state: &BotState, user: u64, option: &str, typed: &str) -> Vec<(String, String)> {
    let typed = typed.trim().to_lowercase();
    let mut found: Vec<(String, String)> = match option {
        "character" => state
            .registry
            .characters_of(state.registry.acting_for(user))
            .into_iter()
            .filter(|oc| oc.name.to_lowercase().contains(&typed))
            .filter_map(|oc| oc.id.map(|id| (oc.name, id.to_string())))
            .collect(),
        "name" => state
            .npcs
            .list(user)
            .into_iter()
            .filter(|npc| npc.name.to_lowercase().contains(&typed))
            .map(|npc| (npc.name.clone(), npc.name))
            .collect(),
        _ => Vec::new(),
    };
    found.truncate(ocdex_core::prompt::CHOICE_LIMIT);
    found
}

pub fn autocomplete_response(choices: Vec<(String, String)>) -> CreateInteractionResponse {
    let response = choices
        .into_iter()
        .fold(CreateAutocompleteResponse::new(), |response, (name, value)| {
            response.add_string_choice(truncate(&name, 100), value)
        });
    CreateInteractionResponse::Autocomplete(response)
}
