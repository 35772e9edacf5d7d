use crate::store::StoreError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Character not found")]
    #[diagnostic(
        code(ocdex_core::character_not_found),
        help("No registered character has message id {id}")
    )]
    CharacterNotFound { id: u64 },

    #[error("Character is being edited elsewhere")]
    #[diagnostic(
        code(ocdex_core::record_locked),
        help("Finish or cancel the other wizard editing {name} before starting a new one")
    )]
    RecordLocked { id: u64, name: String },

    #[error("Not allowed to edit this character")]
    #[diagnostic(
        code(ocdex_core::not_owner),
        help(
            "User {actor} is neither the author ({author}) nor a registered supporting delegate"
        )
    )]
    NotOwner { actor: u64, author: u64 },

    #[error("Unknown {category}: {query}")]
    #[diagnostic(
        code(ocdex_core::unknown_entity),
        help("Check the spelling, lookups accept small typos and ignore accents")
    )]
    UnknownEntity { category: &'static str, query: String },

    #[error("Invalid fusion")]
    #[diagnostic(
        code(ocdex_core::invalid_fusion),
        help("A fusion needs two different species that are not banned")
    )]
    InvalidFusion { reason: String },

    #[error("Character cannot be submitted")]
    #[diagnostic(
        code(ocdex_core::submission_blocked),
        help("Resolve the remaining defects: {}", defects.join("; "))
    )]
    SubmissionBlocked { defects: Vec<String> },

    #[error("Operation not available in the current wizard state")]
    #[diagnostic(code(ocdex_core::invalid_transition), help("Wizard is {state}"))]
    InvalidTransition { state: String, action: &'static str },

    #[error("Input collection failed")]
    #[diagnostic(
        code(ocdex_core::input_failed),
        help("The interaction for {field} ended unexpectedly")
    )]
    InputFailed {
        field: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Platform operation failed")]
    #[diagnostic(code(ocdex_core::platform_error))]
    Platform(#[from] PlatformError),

    #[error("Storage operation failed")]
    #[diagnostic(code(ocdex_core::store_error))]
    Store(#[from] StoreError),

    #[error("Catalog data is malformed")]
    #[diagnostic(
        code(ocdex_core::catalog_malformed),
        help("The bundled {resource} data failed to parse")
    )]
    CatalogMalformed {
        resource: &'static str,
        #[source]
        cause: serde_json::Error,
    },

    #[error("Stored document is malformed")]
    #[diagnostic(
        code(ocdex_core::malformed_document),
        help("Document in {collection} could not be decoded")
    )]
    MalformedDocument {
        collection: &'static str,
        #[source]
        cause: serde_json::Error,
    },

    #[error("Configuration error")]
    #[diagnostic(
        code(ocdex_core::configuration_error),
        help("Check configuration file at {config_path}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Failures reported by the chat platform collaborator.
#[derive(Error, Diagnostic, Debug)]
pub enum PlatformError {
    #[error("Message {message_id} no longer exists")]
    #[diagnostic(
        code(ocdex_core::platform::not_found),
        help("The published message was removed, it will be recreated")
    )]
    NotFound { message_id: u64 },

    #[error("Edit conflict on message {message_id}")]
    #[diagnostic(code(ocdex_core::platform::conflict))]
    Conflict { message_id: u64 },

    #[error("Platform request failed: {operation}")]
    #[diagnostic(code(ocdex_core::platform::request_failed))]
    RequestFailed {
        operation: &'static str,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CoreError {
    pub fn unknown(category: &'static str, query: impl Into<String>) -> Self {
        Self::UnknownEntity {
            category,
            query: query.into(),
        }
    }

    pub fn invalid_fusion(reason: impl Into<String>) -> Self {
        Self::InvalidFusion {
            reason: reason.into(),
        }
    }

    pub fn input_failed(field: impl Into<String>, error: impl Into<String>) -> Self {
        #[derive(Debug, Error)]
        #[error("{0}")]
        struct StringError(String);

        Self::InputFailed {
            field: field.into(),
            cause: Box::new(StringError(error.into())),
        }
    }

    pub fn invalid_transition(state: impl std::fmt::Debug, action: &'static str) -> Self {
        Self::InvalidTransition {
            state: format!("{state:?}"),
            action,
        }
    }
}

impl PlatformError {
    pub fn request_failed(
        operation: &'static str,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::RequestFailed {
            operation,
            cause: Box::new(cause),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
