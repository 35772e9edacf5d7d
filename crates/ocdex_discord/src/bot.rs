use crate::proxy::WebhookProxy;
use crate::publisher::ChannelPublisher;
use crate::slash_commands;
use crate::{DiscordError, Result};
use ocdex_core::config::{DiscordConfig, WizardConfig};
use ocdex_core::{BotConfig, Catalog, NpcBook, Registry, store};
use serenity::{
    all::Command,
    async_trait,
    client::{Context, EventHandler},
    model::{
        application::{CommandInteraction, Interaction},
        channel::{GuildChannel, Message, PartialGuildChannel},
        gateway::Ready,
        id::{ChannelId, GuildId, MessageId},
    },
    prelude::*,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Shared state for the Discord bot
pub struct BotState {
    pub registry: Arc<Registry>,
    pub npcs: Arc<NpcBook>,
    pub discord: DiscordConfig,
    pub wizard: WizardConfig,
    pub proxy: WebhookProxy,
}

impl BotState {
    pub fn new(registry: Arc<Registry>, npcs: Arc<NpcBook>, config: &BotConfig) -> Self {
        Self {
            registry,
            npcs,
            discord: config.discord.clone(),
            wizard: config.wizard.clone(),
            proxy: WebhookProxy::new(config.discord.npc_webhook_name.clone()),
        }
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.wizard.timeout_secs)
    }

    /// Publisher posting into the configured submission channel
    pub fn publisher(&self, ctx: &Context) -> Result<ChannelPublisher> {
        let channel = self
            .discord
            .submission_channel
            .ok_or(DiscordError::SubmissionChannelMissing)?;
        Ok(ChannelPublisher::new(
            Arc::clone(&ctx.http),
            ChannelId::new(channel),
        ))
    }
}

/// Discord bot handler
pub struct OcdexBot {
    state: Arc<BotState>,
}

impl OcdexBot {
    pub fn new(state: BotState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    async fn register_commands(&self, ctx: &Context) -> Result<usize> {
        let commands = slash_commands::create_commands();
        let registered = match self.state.discord.guild_id {
            Some(guild) => GuildId::new(guild)
                .set_commands(&ctx.http, commands)
                .await
                .map_err(|cause| DiscordError::CommandRegistrationFailed {
                    scope: format!("guild {guild}"),
                    cause,
                })?,
            None => Command::set_global_commands(&ctx.http, commands)
                .await
                .map_err(|cause| DiscordError::CommandRegistrationFailed {
                    scope: "global scope".to_string(),
                    cause,
                })?,
        };
        Ok(registered.len())
    }

    async fn run_command(&self, ctx: &Context, command: &CommandInteraction) -> Result<()> {
        let state = self.state.as_ref();
        match command.data.name.as_str() {
            "submit" => slash_commands::handle_submit(state, ctx, command).await,
            "edit" => slash_commands::handle_edit(state, ctx, command).await,
            "modify" => slash_commands::handle_modify(state, ctx, command).await,
            "delete" => slash_commands::handle_delete(state, ctx, command).await,
            "ocs" => slash_commands::handle_ocs(state, ctx, command).await,
            "npc" => slash_commands::handle_npc(state, ctx, command).await,
            "support" => slash_commands::handle_support(state, ctx, command).await,
            _ => {
                warn!("Unknown command: {}", command.data.name);
                Ok(())
            }
        }
    }

    async fn autocomplete(&self, ctx: &Context, interaction: &CommandInteraction) {
        let Some(focused) = interaction.data.autocomplete() else {
            return;
        };
        let choices = slash_commands::suggestions(
            &self.state,
            interaction.user.id.get(),
            focused.name,
            focused.value,
        );
        if let Err(e) = interaction
            .create_response(&ctx.http, slash_commands::autocomplete_response(choices))
            .await
        {
            debug!("autocomplete for {} failed: {}", interaction.data.name, e);
        }
    }

    async fn forget_messages(&self, ids: impl IntoIterator<Item = MessageId>) {
        for id in ids {
            match self.state.registry.on_message_deleted(id.get()).await {
                Ok(removed) if !removed.is_empty() => {
                    info!("removed {} character(s) whose message {} was deleted", removed.len(), id);
                }
                Ok(_) => {}
                Err(e) => error!("Error handling deleted message {}: {:?}", id, e),
            }
        }
    }
}

#[async_trait]
impl EventHandler for OcdexBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        match self.register_commands(&ctx).await {
            Ok(count) => info!("Registered {} slash commands", count),
            Err(e) => error!("Cannot create slash commands: {:?}", e),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.webhook_id.is_some() || msg.guild_id.is_none() {
            return;
        }

        let Some((npc, text)) = self.state.npcs.proxy_target(msg.author.id.get(), &msg.content)
        else {
            return;
        };
        if let Err(e) = self.state.proxy.speak(&ctx, &msg, &npc, &text).await {
            error!("Error proxying NPC {}: {:?}", npc.name, e);
        }
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        _channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        self.forget_messages([deleted_message_id]).await;
    }

    async fn message_delete_bulk(
        &self,
        _ctx: Context,
        _channel_id: ChannelId,
        multiple_deleted_messages_ids: Vec<MessageId>,
        _guild_id: Option<GuildId>,
    ) {
        self.forget_messages(multiple_deleted_messages_ids).await;
    }

    async fn thread_delete(
        &self,
        _ctx: Context,
        thread: PartialGuildChannel,
        _full_thread_data: Option<GuildChannel>,
    ) {
        match self.state.registry.on_thread_deleted(thread.id.get()).await {
            Ok(removed) if !removed.is_empty() => {
                info!("thread {} deleted, dropped {} character(s)", thread.id, removed.len());
            }
            Ok(_) => {}
            Err(e) => error!("Error handling deleted thread {}: {:?}", thread.id, e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                info!(
                    "Received slash command: {} from user {}",
                    command.data.name, command.user.name
                );
                if let Err(e) = self.run_command(&ctx, &command).await {
                    match &e {
                        DiscordError::Core(_) | DiscordError::InvalidOption { .. } => {
                            debug!("/{} refused: {}", command.data.name, e)
                        }
                        _ => error!("Error running /{}: {:?}", command.data.name, e),
                    }
                    slash_commands::report_error(&ctx, &command, &e).await;
                }
            }
            Interaction::Autocomplete(interaction) => self.autocomplete(&ctx, &interaction).await,
            _ => {}
        }
    }
}

/// Load catalogs and stored records, then run the bot until it disconnects
pub async fn run(config: BotConfig) -> Result<()> {
    let token = config.token()?.to_string();

    let store = store::connect(&config.database).await.map_err(ocdex_core::CoreError::from)?;
    let catalog = Arc::new(Catalog::bundled()?);
    let registry = Arc::new(Registry::new(catalog, Arc::clone(&store)));
    let characters = registry.init().await?;
    let npcs = Arc::new(NpcBook::new(store));
    let presets = npcs.init().await?;
    info!("Loaded {} characters and {} NPC presets", characters, presets);

    let handler = OcdexBot::new(BotState::new(registry, npcs, &config));
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| DiscordError::auth_failed(e, &token))?;

    info!("Starting Discord bot...");
    client
        .start()
        .await
        .map_err(|e| DiscordError::auth_failed(e, &token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocdex_core::store::MemoryStore;

    fn state(config: &BotConfig) -> BotState {
        let store: Arc<dyn ocdex_core::DocumentStore> = Arc::new(MemoryStore::new());
        let catalog = Arc::new(Catalog::bundled().unwrap());
        let registry = Arc::new(Registry::new(catalog, Arc::clone(&store)));
        BotState::new(registry, Arc::new(NpcBook::new(store)), config)
    }

    #[test]
    fn test_prompt_timeout_follows_config() {
        let mut config = BotConfig::default();
        config.wizard.timeout_secs = 90;
        assert_eq!(state(&config).prompt_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_suggestions_filter_npcs_by_name() {
        let config = BotConfig::default();
        let state = state(&config);
        assert!(slash_commands::suggestions(&state, 1, "name", "zz").is_empty());
        assert!(slash_commands::suggestions(&state, 1, "unknown", "").is_empty());
    }
}
