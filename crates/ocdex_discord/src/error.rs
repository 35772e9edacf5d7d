use miette::Diagnostic;
use ocdex_core::CoreError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DiscordError {
    #[error("Discord authentication failed")]
    #[diagnostic(
        code(ocdex::discord::auth_failed),
        help("Check that your Discord bot token is valid and has not been regenerated")
    )]
    AuthenticationFailed {
        #[source]
        cause: serenity::Error,
        token_preview: String, // First/last few chars of token for debugging
    },

    #[error("No submission channel configured")]
    #[diagnostic(
        code(ocdex::discord::submission_channel_missing),
        help("Set discord.submission_channel to the channel that holds character threads")
    )]
    SubmissionChannelMissing,

    #[error("Command registration failed")]
    #[diagnostic(
        code(ocdex::discord::command_registration_failed),
        help("Failed to register slash commands in {scope}")
    )]
    CommandRegistrationFailed {
        scope: String,
        #[source]
        cause: serenity::Error,
    },

    #[error("Interaction failed")]
    #[diagnostic(
        code(ocdex::discord::interaction_failed),
        help("Failed to answer the '{operation}' step of an interaction")
    )]
    InteractionFailed {
        operation: &'static str,
        user_id: u64,
        #[source]
        cause: serenity::Error,
    },

    #[error("Webhook error")]
    #[diagnostic(
        code(ocdex::discord::webhook_error),
        help("Webhook operation '{operation}' failed in channel {channel_id}")
    )]
    WebhookError {
        channel_id: u64,
        operation: &'static str,
        #[source]
        cause: serenity::Error,
    },

    #[error("Attachment error")]
    #[diagnostic(
        code(ocdex::discord::attachment_error),
        help("Failed to read attachment '{filename}'")
    )]
    AttachmentError {
        filename: String,
        size_bytes: u32,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unknown command option")]
    #[diagnostic(
        code(ocdex::discord::invalid_option),
        help("Command '{command}' has no usable option '{option}'")
    )]
    InvalidOption { command: String, option: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, DiscordError>;

impl DiscordError {
    pub fn auth_failed(cause: serenity::Error, token: &str) -> Self {
        // Show first 6 and last 4 characters of token for debugging
        let token_preview = if token.len() > 10 {
            format!("{}...{}", &token[..6], &token[token.len() - 4..])
        } else {
            "***".to_string()
        };

        Self::AuthenticationFailed {
            cause,
            token_preview,
        }
    }

    pub fn interaction(operation: &'static str, user_id: u64, cause: serenity::Error) -> Self {
        Self::InteractionFailed {
            operation,
            user_id,
            cause,
        }
    }

    pub fn invalid_option(command: impl Into<String>, option: impl Into<String>) -> Self {
        Self::InvalidOption {
            command: command.into(),
            option: option.into(),
        }
    }

    /// Text shown to the user when a command ends in this error
    pub fn user_message(&self) -> String {
        match self {
            Self::Core(CoreError::RecordLocked { name, .. }) => {
                format!("**{name}** is already open in another session.")
            }
            Self::Core(CoreError::NotOwner { .. }) => {
                "You can only change characters you own.".to_string()
            }
            Self::Core(CoreError::CharacterNotFound { .. }) => {
                "That character no longer exists.".to_string()
            }
            Self::Core(CoreError::SubmissionBlocked { defects }) => {
                format!("Not ready yet:\n{}", bullet_list(defects))
            }
            Self::Core(CoreError::InvalidFusion { reason }) => format!("That fusion does not work: {reason}"),
            Self::Core(CoreError::InputFailed { field, cause }) => format!("{field}: {cause}"),
            Self::Core(e @ CoreError::UnknownEntity { .. }) => e.to_string(),
            Self::SubmissionChannelMissing => {
                "Submissions are not set up on this server yet.".to_string()
            }
            Self::AttachmentError { filename, .. } => {
                format!("Could not read `{filename}`, sheets must be plain text.")
            }
            Self::InvalidOption { option, .. } => format!("Missing or invalid `{option}`."),
            _ => "Something went wrong, try again in a moment.".to_string(),
        }
    }
}

pub(crate) fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("• {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_auth_error_hides_token() {
        let fake_error = serenity::Error::Other("test");
        let error = DiscordError::auth_failed(
            fake_error,
            "MTE2MzU5NzE0MjQ5NzI1NTQyNA.GqvKfH.verysecrettoken",
        );

        if let DiscordError::AuthenticationFailed { token_preview, .. } = &error {
            assert_eq!(token_preview, "MTE2Mz...oken");
            assert!(!token_preview.contains("secret"));
        }
    }

    #[test]
    fn test_short_token_is_masked() {
        let error = DiscordError::auth_failed(serenity::Error::Other("test"), "short");
        assert!(matches!(
            error,
            DiscordError::AuthenticationFailed { ref token_preview, .. } if token_preview == "***"
        ));
    }

    #[test]
    fn test_blocked_submission_lists_defects() {
        let error = DiscordError::from(CoreError::SubmissionBlocked {
            defects: vec!["Name: missing".to_string(), "Moveset: empty".to_string()],
        });
        assert_eq!(
            error.user_message(),
            "Not ready yet:\n• Name: missing\n• Moveset: empty"
        );
    }
}
