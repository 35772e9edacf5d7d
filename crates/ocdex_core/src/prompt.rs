//! Interactive input collection.
//!
//! Field collectors only talk to a [`Prompter`]. The Discord glue drives
//! modals and select menus behind it, tests feed scripted answers.

use crate::Result;
use crate::character::ImageRef;
use async_trait::async_trait;

/// Most options a single choice prompt shows. Larger pools are entered as
/// free text and resolved by fuzzy matching.
pub const CHOICE_LIMIT: usize = 25;

/// The user's response to one prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer<T> {
    Value(T),
    /// Moved on without answering
    Skipped,
    /// Abandoned the prompt
    Cancelled,
}

impl<T> Answer<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Answer<U> {
        match self {
            Answer::Value(v) => Answer::Value(f(v)),
            Answer::Skipped => Answer::Skipped,
            Answer::Cancelled => Answer::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Answer::Cancelled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRequest {
    pub title: String,
    pub label: String,
    pub placeholder: Option<String>,
    /// Prefilled value, usually the current one
    pub default: Option<String>,
    pub multiline: bool,
    pub required: bool,
    pub max_length: Option<usize>,
}

impl TextRequest {
    pub fn new(title: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn default_value(mut self, default: Option<impl Into<String>>) -> Self {
        self.default = default.map(Into::into);
        self
    }

    pub fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: String,
    pub description: Option<String>,
    pub selected: bool,
}

impl ChoiceOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            selected: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceRequest {
    pub title: String,
    pub options: Vec<ChoiceOption>,
    pub min: usize,
    pub max: usize,
}

impl ChoiceRequest {
    pub fn single(title: impl Into<String>, options: Vec<ChoiceOption>) -> Self {
        Self {
            title: title.into(),
            options,
            min: 1,
            max: 1,
        }
    }

    pub fn many(title: impl Into<String>, options: Vec<ChoiceOption>, min: usize, max: usize) -> Self {
        let max = max.min(options.len()).max(1);
        Self {
            title: title.into(),
            options,
            min: min.min(max),
            max,
        }
    }
}

/// Collects answers from the person driving a wizard
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn text(&self, request: TextRequest) -> Result<Answer<String>>;

    /// Indexes into `request.options`, between `min` and `max` of them
    async fn choose(&self, request: ChoiceRequest) -> Result<Answer<Vec<usize>>>;

    async fn confirm(&self, prompt: &str) -> Result<Answer<bool>>;

    async fn image(&self, prompt: &str, default: Option<&str>) -> Result<Answer<ImageRef>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_clamps_bounds() {
        let options = vec![ChoiceOption::new("a"), ChoiceOption::new("b")];
        let request = ChoiceRequest::many("Pick", options, 3, 6);
        assert_eq!(request.max, 2);
        assert_eq!(request.min, 2);
    }

    #[test]
    fn test_answer_map_keeps_outcome() {
        assert_eq!(Answer::Value(2).map(|v| v * 2), Answer::Value(4));
        assert!(Answer::<u8>::Cancelled.map(|v| v + 1).is_cancelled());
        assert_eq!(Answer::<u8>::Skipped.map(|v| v + 1), Answer::Skipped);
    }
}
