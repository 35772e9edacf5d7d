//! Platform messaging collaborator

use crate::character::Character;
use crate::error::PlatformError;
use async_trait::async_trait;

/// Where a character's message ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub message_id: u64,
    pub thread: u64,
    /// Hosted url of an uploaded image, once the platform has it
    pub image_url: Option<String>,
}

/// Publishes character messages into each author's list thread
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// The author's list thread, created when missing
    async fn ensure_thread(&self, author: u64, server: u64) -> Result<u64, PlatformError>;

    async fn publish(&self, character: &Character) -> Result<Published, PlatformError>;

    /// Update the published message in place. `NotFound` when it is gone.
    async fn edit(&self, character: &Character) -> Result<Published, PlatformError>;

    async fn delete(&self, character: &Character) -> Result<(), PlatformError>;
}
