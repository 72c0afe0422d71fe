//! Error types for the ctxattr core library.
//!
//! Uses `thiserror` for public API error types. Argument validation failures
//! live in [`ArgsError`]; everything that can go wrong while loading, saving,
//! or resolving a request is wrapped by [`CtxAttrError`].

use std::path::PathBuf;

/// Top-level error type for the ctxattr core library.
#[derive(Debug, thiserror::Error)]
pub enum CtxAttrError {
    #[error("Invalid arguments: {0}")]
    Args(#[from] ArgsError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Request file not found: {path}")]
    RequestNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),
}

/// Invalid combinations of context attribution arguments.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgsError {
    #[error("--input-current-text must be a non-empty string")]
    EmptyCurrentText,

    #[error("{placeholder} format placeholder is missing from {field} {template}")]
    MissingPlaceholder {
        placeholder: &'static str,
        field: &'static str,
        template: String,
    },

    #[error(
        "{{context}} format placeholder is present in input_template {template}, but --input-context-text is not specified"
    )]
    MissingContextText { template: String },

    #[error("{{context}} placeholder must appear before {{current}} in output_template '{template}'")]
    PlaceholderOrder { template: String },

    #[error(
        "{{context}} format placeholder is not allowed in --contextless-input-current-text '{text}'"
    )]
    ContextInContextlessInput { text: String },

    #[error(
        "Only one of contextless_output_next_tokens and prompt_user_for_contextless_output_next_tokens can be specified"
    )]
    ConflictingContextlessTokens,

    #[error(
        "If --handle-output-context-strategy=pre and {{context}} is used in --output-template, --output-context-text must be specified to avoid user prompt for output context"
    )]
    PredefinedOutputContextRequired,

    #[error("Unknown step function: {name}")]
    UnknownStepFunction { name: String },

    #[error("Step function '{name}' is not contrastive and cannot be used as context sensitivity metric")]
    NonContrastiveMetric { name: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidThreshold { field: &'static str, reason: String },
}

/// A type alias for results using the top-level `CtxAttrError`.
pub type Result<T> = std::result::Result<T, CtxAttrError>;
