//! Layered configuration for context attribution arguments.
//!
//! Uses `figment`: defaults -> user config -> workspace config -> explicit
//! file -> environment -> CLI overrides, with a saved request (if any)
//! between the workspace config and the explicit file. User config lives in
//! `~/.config/ctxattr/config.toml` (platform equivalent), workspace config in
//! `.ctxattr/config.toml`. Keys are the flat argument names, e.g.
//!
//! ```toml
//! model_name_or_path = "Helsinki-NLP/opus-mt-en-fr"
//! attribution_method = "saliency"
//! context_sensitivity_std_threshold = 1.5
//! special_tokens_to_keep = ["<brk>"]
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::args::AttributeContextArgs;
use crate::error::{CtxAttrError, Result};
use crate::validate::ContextRequest;

/// Environment variable prefix, e.g. `CTXATTR_ATTRIBUTION_METHOD`.
pub const ENV_PREFIX: &str = "CTXATTR_";

const CONFIG_DIR: &str = ".ctxattr";
const CONFIG_FILE: &str = "config.toml";

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "ctxattr", "ctxattr")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Path of the workspace-level configuration file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Where the configuration layers of a run are read from.
///
/// [`ConfigSources::new`] includes the user config and `CTXATTR_` environment
/// variables. A default value reads neither, which keeps a run independent of
/// the machine it executes on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    pub user_config: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    /// Explicit config file (TOML, or JSON when it ends in `.json`).
    pub config_file: Option<PathBuf>,
    /// Request saved by [`save_request`](crate::persistence::save_request).
    /// Replaces user and workspace config; the explicit file, environment
    /// and CLI overrides still apply on top of it.
    pub saved_request: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

impl ConfigSources {
    pub fn new(workspace: Option<&Path>, config_file: Option<&Path>) -> Self {
        Self {
            user_config: user_config_path(),
            workspace: workspace.map(Path::to_path_buf),
            config_file: config_file.map(Path::to_path_buf),
            saved_request: None,
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    pub fn with_saved_request(mut self, path: impl Into<PathBuf>) -> Self {
        self.saved_request = Some(path.into());
        self
    }

    /// Build the layered figment without CLI overrides.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (prefixed with `env_prefix`)
    /// 2. Explicit config file
    /// 3. Saved request
    /// 4. Workspace-local config (`.ctxattr/config.toml`)
    /// 5. User config
    /// 6. Built-in defaults
    pub fn figment(&self) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AttributeContextArgs::default()));

        if let Some(user_config) = &self.user_config {
            if user_config.exists() {
                figment = figment.merge(Toml::file(user_config));
            }
        }

        if let Some(ws) = &self.workspace {
            let ws_config = workspace_config_path(ws);
            if ws_config.exists() {
                figment = figment.merge(Toml::file(&ws_config));
            }
        }

        if let Some(path) = &self.saved_request {
            figment = figment.merge(Json::file_exact(path));
        }

        // An explicitly requested file that does not exist is an error at extraction.
        if let Some(path) = &self.config_file {
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            figment = if is_json {
                figment.merge(Json::file_exact(path))
            } else {
                figment.merge(Toml::file_exact(path))
            };
        }

        if let Some(prefix) = &self.env_prefix {
            figment = figment.merge(Env::prefixed(prefix));
        }
        figment
    }

    /// Extract unvalidated arguments with `overrides` on top of every layer.
    ///
    /// `overrides` should serialize only the keys the caller actually set.
    pub fn extract_args<T: Serialize>(
        &self,
        overrides: &T,
    ) -> std::result::Result<AttributeContextArgs, Box<figment::Error>> {
        self.figment()
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(Box::new)
    }

    /// Extract and validate a context attribution request.
    pub fn extract_request<T: Serialize>(&self, overrides: &T) -> Result<ContextRequest> {
        if let Some(path) = &self.saved_request {
            if !path.exists() {
                return Err(CtxAttrError::RequestNotFound { path: path.clone() });
            }
        }
        let args = self.extract_args(overrides)?;
        Ok(args.validate()?)
    }
}

/// Check whether any configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Write the default arguments to `.ctxattr/config.toml` in `workspace`.
///
/// Returns `Ok(None)` without touching the file if it already exists.
pub fn init_workspace_config(workspace: &Path) -> Result<Option<PathBuf>> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        return Ok(None);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(&AttributeContextArgs::default())?;
    std::fs::write(&path, toml_str)?;
    tracing::info!(path = %path.display(), "Created default configuration");
    Ok(Some(path))
}
