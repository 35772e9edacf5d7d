//! Scripted collaborators for driving wizards in tests.

use crate::character::{Character, ImageRef};
use crate::error::PlatformError;
use crate::prompt::{Answer, ChoiceRequest, Prompter, TextRequest};
use crate::publish::{Published, Publisher};
use crate::{CoreError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
enum Step {
    Text(String),
    Choose(Vec<usize>),
    Confirm(bool),
    Image(ImageRef),
    Skip,
    Cancel,
    Fail,
    Conflict,
}

/// Answers prompts from a queue, in order
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    steps: Mutex<VecDeque<Step>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Step) -> Self {
        self.steps.lock().push_back(step);
        self
    }

    pub fn text(self, value: impl Into<String>) -> Self {
        self.push(Step::Text(value.into()))
    }

    pub fn choose(self, picked: impl IntoIterator<Item = usize>) -> Self {
        self.push(Step::Choose(picked.into_iter().collect()))
    }

    pub fn confirm(self, value: bool) -> Self {
        self.push(Step::Confirm(value))
    }

    pub fn image(self, url: impl Into<String>) -> Self {
        self.push(Step::Image(ImageRef::Url { url: url.into() }))
    }

    pub fn skip(self) -> Self {
        self.push(Step::Skip)
    }

    pub fn cancel(self) -> Self {
        self.push(Step::Cancel)
    }

    /// The next prompt errors, as if the interaction died
    pub fn fail(self) -> Self {
        self.push(Step::Fail)
    }

    /// The next prompt hits an edit conflict on the platform
    pub fn conflict(self) -> Self {
        self.push(Step::Conflict)
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().len()
    }

    fn next<T>(&self, kind: &str, take: impl FnOnce(Step) -> Option<T>) -> Result<Answer<T>> {
        let step = self
            .steps
            .lock()
            .pop_front()
            .ok_or_else(|| CoreError::input_failed(kind, "script exhausted"))?;
        match step {
            Step::Skip => Ok(Answer::Skipped),
            Step::Cancel => Ok(Answer::Cancelled),
            Step::Fail => Err(CoreError::input_failed(kind, "scripted failure")),
            Step::Conflict => Err(PlatformError::Conflict { message_id: 0 }.into()),
            other => {
                let described = format!("{other:?}");
                take(other)
                    .map(Answer::Value)
                    .ok_or_else(|| CoreError::input_failed(kind, format!("script has {described}")))
            }
        }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn text(&self, _request: TextRequest) -> Result<Answer<String>> {
        self.next("text", |step| match step {
            Step::Text(value) => Some(value),
            _ => None,
        })
    }

    async fn choose(&self, _request: ChoiceRequest) -> Result<Answer<Vec<usize>>> {
        self.next("choose", |step| match step {
            Step::Choose(picked) => Some(picked),
            _ => None,
        })
    }

    async fn confirm(&self, _prompt: &str) -> Result<Answer<bool>> {
        self.next("confirm", |step| match step {
            Step::Confirm(value) => Some(value),
            _ => None,
        })
    }

    async fn image(&self, _prompt: &str, _default: Option<&str>) -> Result<Answer<ImageRef>> {
        self.next("image", |step| match step {
            Step::Image(image) => Some(image),
            _ => None,
        })
    }
}

/// Keeps published characters in memory, keyed by message id
#[derive(Debug)]
pub struct RecordingPublisher {
    next_id: AtomicU64,
    messages: Mutex<BTreeMap<u64, Character>>,
    publishes: AtomicU64,
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            messages: Mutex::new(BTreeMap::new()),
            publishes: AtomicU64::new(0),
        }
    }
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread id handed out for an author
    pub fn thread_for(author: u64) -> u64 {
        author + 500
    }

    pub fn message(&self, id: u64) -> Option<Character> {
        self.messages.lock().get(&id).cloned()
    }

    /// Drop a message as if a moderator deleted it
    pub fn remove(&self, id: u64) {
        self.messages.lock().remove(&id);
    }

    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::SeqCst)
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn ensure_thread(&self, author: u64, _server: u64) -> std::result::Result<u64, PlatformError> {
        Ok(Self::thread_for(author))
    }

    async fn publish(&self, character: &Character) -> std::result::Result<Published, PlatformError> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.publishes.fetch_add(1, Ordering::SeqCst);
        let mut stored = character.clone();
        stored.update(message_id);
        self.messages.lock().insert(message_id, stored);
        Ok(Published {
            message_id,
            thread: character
                .thread
                .unwrap_or_else(|| Self::thread_for(character.author)),
            image_url: None,
        })
    }

    async fn edit(&self, character: &Character) -> std::result::Result<Published, PlatformError> {
        let message_id = character.id.unwrap_or_default();
        let mut messages = self.messages.lock();
        let Some(slot) = messages.get_mut(&message_id) else {
            return Err(PlatformError::NotFound { message_id });
        };
        *slot = character.clone();
        Ok(Published {
            message_id,
            thread: character
                .thread
                .unwrap_or_else(|| Self::thread_for(character.author)),
            image_url: None,
        })
    }

    async fn delete(&self, character: &Character) -> std::result::Result<(), PlatformError> {
        let message_id = character.id.unwrap_or_default();
        match self.messages.lock().remove(&message_id) {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound { message_id }),
        }
    }
}
