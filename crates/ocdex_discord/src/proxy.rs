//! Re-posts NPC narration through a channel webhook

use crate::{DiscordError, Result};
use dashmap::DashMap;
use ocdex_core::Npc;
use serenity::{
    builder::{CreateWebhook, ExecuteWebhook},
    client::Context,
    model::{
        channel::{Channel, Message},
        id::ChannelId,
        webhook::Webhook,
    },
};

/// One bot-owned webhook per channel, created on first use
pub struct WebhookProxy {
    name: String,
    hooks: DashMap<ChannelId, Webhook>,
}

impl WebhookProxy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: DashMap::new(),
        }
    }

    /// Where a message was posted: the channel that owns webhooks, plus the
    /// thread when the message sits in one
    async fn target(&self, ctx: &Context, msg: &Message) -> (ChannelId, Option<ChannelId>) {
        match msg.channel(ctx).await {
            Ok(Channel::Guild(channel)) if channel.thread_metadata.is_some() => {
                match channel.parent_id {
                    Some(parent) => (parent, Some(channel.id)),
                    None => (channel.id, None),
                }
            }
            Ok(_) => (msg.channel_id, None),
            Err(e) => {
                tracing::debug!("could not resolve channel {}: {}", msg.channel_id, e);
                (msg.channel_id, None)
            }
        }
    }

    async fn webhook(&self, ctx: &Context, channel: ChannelId) -> Result<Webhook> {
        if let Some(hook) = self.hooks.get(&channel) {
            return Ok(hook.clone());
        }
        let webhook_error = |operation: &'static str, cause: serenity::Error| DiscordError::WebhookError {
            channel_id: channel.get(),
            operation,
            cause,
        };

        let existing = channel
            .webhooks(&ctx.http)
            .await
            .map_err(|e| webhook_error("list webhooks", e))?
            .into_iter()
            .find(|hook| hook.name.as_deref() == Some(self.name.as_str()) && hook.token.is_some());
        let hook = match existing {
            Some(hook) => hook,
            None => {
                tracing::info!(channel = %channel, "creating NPC webhook");
                channel
                    .create_webhook(&ctx.http, CreateWebhook::new(&self.name))
                    .await
                    .map_err(|e| webhook_error("create webhook", e))?
            }
        };
        self.hooks.insert(channel, hook.clone());
        Ok(hook)
    }

    /// Post `text` as `npc` where `msg` was, then remove `msg`
    pub async fn speak(&self, ctx: &Context, msg: &Message, npc: &Npc, text: &str) -> Result<()> {
        let (channel, thread) = self.target(ctx, msg).await;
        let hook = self.webhook(ctx, channel).await?;

        let mut post = ExecuteWebhook::new().content(text).username(&npc.name);
        if let Some(image) = &npc.image {
            post = post.avatar_url(image);
        }
        if let Some(thread) = thread {
            post = post.in_thread(thread);
        }
        if let Some(reference) = &msg.referenced_message {
            // Webhooks cannot reply, keep a pointer to what was answered
            post = post.content(format!("> {}\n{text}", reference.link()));
        }

        if let Err(e) = hook.execute(&ctx.http, false, post).await {
            // The webhook was probably deleted under us
            self.hooks.remove(&channel);
            return Err(DiscordError::WebhookError {
                channel_id: channel.get(),
                operation: "execute webhook",
                cause: e,
            });
        }
        if let Err(e) = msg.delete(&ctx.http).await {
            tracing::warn!("could not remove proxied message {}: {}", msg.id, e);
        }
        tracing::debug!(npc = %npc.name, channel = %channel, "proxied NPC message");
        Ok(())
    }
}
