use ocdex_core::character::CharacterEmbed;
use ocdex_core::{Character, Npc};
use serenity::{
    builder::{CreateEmbed, CreateEmbedFooter},
    model::{
        application::{CommandDataOption, CommandDataOptionValue, CommandInteraction},
        channel::Attachment,
        colour::Colour,
        user::User,
    },
};

/// Discord rejects embed fields with an empty value
const BLANK: &str = "\u{200b}";

/// Longest label a select option or button accepts
pub const LABEL_LIMIT: usize = 100;

/// Longest title a modal or its inputs accept
pub const MODAL_TITLE_LIMIT: usize = 45;

pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) if limit > 1 => {
            let cut = text[..idx]
                .char_indices()
                .last()
                .map_or(0, |(last, _)| last);
            format!("{}…", &text[..cut])
        }
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn non_empty(value: &str) -> &str {
    if value.trim().is_empty() { BLANK } else { value }
}

/// Render the platform neutral embed a character produces
pub fn render_embed(embed: &CharacterEmbed) -> CreateEmbed {
    let mut rendered = CreateEmbed::new().title(non_empty(&embed.title));

    if let Some(description) = &embed.description {
        rendered = rendered.description(description);
    }
    if let Some(url) = &embed.url {
        rendered = rendered.url(url);
    }
    if let Some(color) = embed.color {
        rendered = rendered.colour(Colour::new(color));
    }
    if let Some(image) = &embed.image {
        rendered = rendered.image(image);
    }
    rendered = rendered.fields(
        embed
            .fields
            .iter()
            .map(|field| (field.name.clone(), non_empty(&field.value).to_string(), field.inline)),
    );
    if let Some(footer) = &embed.footer {
        rendered = rendered.footer(CreateEmbedFooter::new(footer));
    }
    rendered
}

/// The character embed with an uploaded image pointed at its attachment
pub fn character_embed(character: &Character, attachment: Option<&str>) -> CreateEmbed {
    let embed = render_embed(&character.embed());
    match attachment {
        Some(filename) => embed.attachment(filename),
        None => embed,
    }
}

/// One line per character, linking to its message when published
pub fn character_list(characters: &[Character]) -> String {
    characters
        .iter()
        .map(|oc| {
            let species = oc
                .species
                .as_ref()
                .map_or_else(|| "Unknown".to_string(), |s| s.name());
            match oc.jump_url() {
                Some(url) => format!("• [{}]({url}) - {species}", oc.name),
                None => format!("• {} - {species}", oc.name),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn npc_embed(npc: &Npc) -> CreateEmbed {
    let prefixes = npc.prefix_patterns();
    let mut embed = CreateEmbed::new().title(&npc.name).field(
        "Prefixes",
        if prefixes.is_empty() {
            "None yet, add one with `/npc prefix`".to_string()
        } else {
            prefixes
                .iter()
                .map(|p| format!("`{p}`"))
                .collect::<Vec<_>>()
                .join(", ")
        },
        false,
    );
    if let Some(image) = &npc.image {
        embed = embed.thumbnail(image);
    }
    embed
}

/// Options of a command, or of its first subcommand when it has one
pub fn leaf_options(command: &CommandInteraction) -> (Option<&str>, &[CommandDataOption]) {
    match command.data.options.first() {
        Some(CommandDataOption {
            name,
            value: CommandDataOptionValue::SubCommand(options),
            ..
        }) => (Some(name.as_str()), options.as_slice()),
        _ => (None, command.data.options.as_slice()),
    }
}

pub fn string_option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn attachment_option<'a>(
    command: &'a CommandInteraction,
    options: &[CommandDataOption],
    name: &str,
) -> Option<&'a Attachment> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_attachment_id())
        .and_then(|id| command.data.resolved.attachments.get(&id))
}

pub fn user_option<'a>(
    command: &'a CommandInteraction,
    options: &[CommandDataOption],
    name: &str,
) -> Option<&'a User> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_user_id())
        .and_then(|id| command.data.resolved.users.get(&id))
}

/// A character named by an option: its id as picked from autocomplete, or
/// its name typed out
pub fn find_character<'a>(characters: &'a [Character], value: &str) -> Option<&'a Character> {
    if let Ok(id) = value.parse::<u64>() {
        if let Some(found) = characters.iter().find(|oc| oc.id == Some(id)) {
            return Some(found);
        }
    }
    characters
        .iter()
        .find(|oc| oc.name.eq_ignore_ascii_case(value))
}
