//! ocdex Discord - the character registry as a Discord bot
//!
//! Slash commands drive the wizards from `ocdex-core` through component
//! prompts, published characters live in per-author threads of one
//! submission channel, and NPC presets are voiced through channel webhooks.

pub mod bot;
pub mod error;
pub mod helpers;
pub mod prompter;
pub mod proxy;
pub mod publisher;
pub mod session;
pub mod slash_commands;

pub use bot::{BotState, OcdexBot, run};
pub use error::{DiscordError, Result};
pub use prompter::DiscordPrompter;
pub use proxy::WebhookProxy;
pub use publisher::ChannelPublisher;
pub use session::{Notifier, SessionEnd};

// Re-export serenity for convenience
pub use serenity;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        BotState, ChannelPublisher, DiscordError, DiscordPrompter, Notifier, OcdexBot, Result,
        SessionEnd, WebhookProxy,
    };
}
