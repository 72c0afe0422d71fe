//! # ctxattr Core
//!
//! Argument schema for context attribution runs: which generated tokens are
//! sensitive to the provided context (context-sensitive target
//! identification, CTI), and which context tokens drive them (contextual cues
//! imputation, CCI). Provides the argument groups, construction-time
//! validation, the step function registry, templates, and layered
//! configuration. The attribution engine itself consumes a validated
//! [`ContextRequest`].

pub mod args;
pub mod config;
pub mod error;
pub mod persistence;
pub mod step_functions;
pub mod template;
pub mod validate;

// Re-export commonly used types at the crate root.
pub use args::{
    AttributeBaseArgs, AttributeContextArgs, ContextInputArgs, ContextMethodArgs,
    ContextOutputArgs, HandleOutputContextStrategy,
};
pub use config::{ConfigSources, config_exists};
pub use error::{ArgsError, CtxAttrError, Result};
pub use step_functions::{StepFunction, is_contrastive_step_function, list_step_functions};
pub use validate::ContextRequest;
