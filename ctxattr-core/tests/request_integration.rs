//! End-to-end request resolution: config layers, validation, persistence.

use ctxattr_core::config::init_workspace_config;
use ctxattr_core::persistence;
use ctxattr_core::{
    ArgsError, ConfigSources, ContextRequest, CtxAttrError, HandleOutputContextStrategy,
};
use pretty_assertions::assert_eq;
use serde::Serialize;
use serde_json::json;
use std::path::Path;

/// Resolve a request from the workspace config and `overrides` only, so the
/// host's user config and `CTXATTR_*` variables do not leak in.
fn load_request<T: Serialize>(
    workspace: &Path,
    overrides: &T,
) -> ctxattr_core::Result<ContextRequest> {
    ConfigSources {
        workspace: Some(workspace.to_path_buf()),
        ..Default::default()
    }
    .extract_request(overrides)
}

#[test]
fn hello_without_context() {
    let dir = tempfile::tempdir().unwrap();
    let request = load_request(dir.path(), &json!({ "input_current_text": "Hello" })).unwrap();
    assert_eq!(request.input_template(), "{current}");
    assert!(!request.has_input_context());
}

#[test]
fn hello_with_world_context() {
    let dir = tempfile::tempdir().unwrap();
    let request = load_request(
        dir.path(),
        &json!({ "input_current_text": "Hello", "input_context_text": "World" }),
    )
    .unwrap();
    assert_eq!(request.input_template(), "{context} {current}");
    assert!(request.has_input_context());
}

#[test]
fn workspace_strategy_with_cli_output_template() {
    let dir = tempfile::tempdir().unwrap();
    init_workspace_config(dir.path()).unwrap();
    let config_path = dir.path().join(".ctxattr").join("config.toml");
    let mut contents = std::fs::read_to_string(&config_path).unwrap();
    contents = contents.replace(
        "handle_output_context_strategy = \"manual\"",
        "handle_output_context_strategy = \"pre\"",
    );
    std::fs::write(&config_path, contents).unwrap();

    let overrides = json!({
        "input_current_text": "Translate this.",
        "output_template": "{context}<brk>{current}",
    });
    let err = load_request(dir.path(), &overrides).unwrap_err();
    assert!(matches!(
        err,
        CtxAttrError::Args(ArgsError::PredefinedOutputContextRequired)
    ));

    let overrides = json!({
        "input_current_text": "Translate this.",
        "output_template": "{context}<brk>{current}",
        "output_context_text": "Previous sentence.",
        "output_current_text": "Traduisez ceci.",
    });
    let request = load_request(dir.path(), &overrides).unwrap();
    assert_eq!(
        request.handle_output_context_strategy(),
        HandleOutputContextStrategy::Pre
    );
    assert_eq!(
        request.formatted_output().as_deref(),
        Some("Previous sentence.<brk>Traduisez ceci.")
    );
}

#[test]
fn saved_request_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let request = load_request(
        dir.path(),
        &json!({
            "input_current_text": "Hello",
            "contextless_output_next_tokens": ["Bonjour"],
            "attribution_topk": 3,
            "generation_kwargs": { "max_new_tokens": 20 },
        }),
    )
    .unwrap();
    let path = dir.path().join("request.json");
    persistence::save_request(&path, &request).unwrap();
    let loaded = persistence::load_request(&path).unwrap();
    assert_eq!(loaded, request);
    assert_eq!(
        loaded.args().method.base.generation_kwargs["max_new_tokens"],
        20
    );
}
