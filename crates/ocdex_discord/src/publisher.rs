//! [`Publisher`] over a channel of per-author threads

use crate::helpers::character_embed;
use async_trait::async_trait;
use ocdex_core::character::ImageRef;
use ocdex_core::{Character, PlatformError, Published, Publisher};
use serenity::{
    builder::{CreateAttachment, CreateMessage, CreateThread, EditMessage},
    http::{Http, HttpError},
    model::{
        channel::{ChannelType, Message},
        id::{ChannelId, MessageId, UserId},
    },
};
use std::sync::Arc;

/// Whether Discord answered with 404, the message or channel is gone
pub(crate) fn is_not_found(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}

fn map_error(operation: &'static str, message_id: u64, error: serenity::Error) -> PlatformError {
    if is_not_found(&error) {
        PlatformError::NotFound { message_id }
    } else {
        PlatformError::request_failed(operation, error)
    }
}

/// The upload carried by a character, if its image is not hosted yet
fn upload(character: &Character) -> Option<CreateAttachment> {
    match &character.image {
        ImageRef::Upload { filename, bytes } => {
            Some(CreateAttachment::bytes(bytes.clone(), filename.clone()))
        }
        _ => None,
    }
}

/// Hosted url of the image the message ended up showing
fn hosted_image(message: &Message) -> Option<String> {
    message
        .embeds
        .first()
        .and_then(|embed| embed.image.as_ref())
        .map(|image| image.url.clone())
}

#[derive(Clone)]
pub struct ChannelPublisher {
    http: Arc<Http>,
    channel: ChannelId,
}

impl ChannelPublisher {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }

    fn thread_of(character: &Character) -> Result<ChannelId, PlatformError> {
        character.thread.map(ChannelId::new).ok_or_else(|| {
            PlatformError::request_failed(
                "resolve thread",
                serenity::Error::Other("character has no thread"),
            )
        })
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn ensure_thread(&self, author: u64, _server: u64) -> Result<u64, PlatformError> {
        let name = match UserId::new(author).to_user(&self.http).await {
            Ok(user) => user.global_name.unwrap_or(user.name),
            Err(e) => {
                tracing::warn!(author, "could not look up author: {}", e);
                author.to_string()
            }
        };
        let thread = self
            .channel
            .create_thread(
                &self.http,
                CreateThread::new(format!("{name}'s characters")).kind(ChannelType::PublicThread),
            )
            .await
            .map_err(|e| PlatformError::request_failed("create thread", e))?;
        tracing::info!(author, thread = %thread.id, "created character thread");
        Ok(thread.id.get())
    }

    async fn publish(&self, character: &Character) -> Result<Published, PlatformError> {
        let thread = Self::thread_of(character)?;
        let attachment = upload(character);
        let filename = attachment.as_ref().map(|a| a.filename.clone());
        let mut message = CreateMessage::new().embed(character_embed(character, filename.as_deref()));
        if let Some(attachment) = attachment {
            message = message.add_file(attachment);
        }

        let sent = thread
            .send_message(&self.http, message)
            .await
            .map_err(|e| map_error("publish character", 0, e))?;
        tracing::debug!(message = %sent.id, "character published");
        Ok(Published {
            message_id: sent.id.get(),
            thread: thread.get(),
            image_url: filename.and_then(|_| hosted_image(&sent)),
        })
    }

    async fn edit(&self, character: &Character) -> Result<Published, PlatformError> {
        let Some(id) = character.id else {
            return Err(PlatformError::NotFound { message_id: 0 });
        };
        let thread = Self::thread_of(character)?;
        let attachment = upload(character);
        let filename = attachment.as_ref().map(|a| a.filename.clone());
        let mut edit = EditMessage::new().embed(character_embed(character, filename.as_deref()));
        if let Some(attachment) = attachment {
            edit = edit.new_attachment(attachment);
        }

        let edited = thread
            .edit_message(&self.http, MessageId::new(id), edit)
            .await
            .map_err(|e| map_error("edit character", id, e))?;
        Ok(Published {
            message_id: edited.id.get(),
            thread: thread.get(),
            image_url: filename.and_then(|_| hosted_image(&edited)),
        })
    }

    async fn delete(&self, character: &Character) -> Result<(), PlatformError> {
        let Some(id) = character.id else {
            return Ok(());
        };
        let thread = Self::thread_of(character)?;
        thread
            .delete_message(&self.http, MessageId::new(id))
            .await
            .map_err(|e| map_error("delete character", id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_other_errors_are_not_not_found() {
        let error = serenity::Error::Other("boom");
        assert!(!is_not_found(&error));
        assert!(!map_error("edit character", 5, error).is_not_found());
    }

    #[test]
    fn test_only_uploads_are_attached() {
        let mut oc = Character::new(7, 1);
        assert!(upload(&oc).is_none());

        oc.image = ImageRef::Upload {
            filename: "sparky.png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let attachment = upload(&oc).unwrap();
        assert_eq!(attachment.filename, "sparky.png");
        assert_eq!(attachment.data, vec![1, 2, 3]);
    }

    #[test]
    fn test_unthreaded_character_cannot_publish() {
        let oc = Character::new(7, 1);
        assert!(ChannelPublisher::thread_of(&oc).is_err());
    }
}
