//! CLI subcommand handlers.

use crate::{Commands, ConfigAction};
use ctxattr_core::step_functions::list_step_functions;
use ctxattr_core::config::ConfigSources;
use ctxattr_core::{ContextRequest, config, persistence};
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    dispatch(command, ConfigSources::new(Some(workspace), config_file))
}

fn dispatch(command: Commands, sources: ConfigSources) -> anyhow::Result<()> {
    match command {
        Commands::AttributeContext {
            flags,
            from_request,
            dump_request,
        } => {
            let sources = match from_request {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "Using saved request as base layer");
                    sources.with_saved_request(path)
                }
                None => sources,
            };
            let request = sources.extract_request(&flags)?;
            handle_attribute_context(&request, dump_request)
        }
        Commands::StepFunctions { contrastive } => handle_step_functions(contrastive),
        Commands::Config { action } => handle_config(action, &sources),
    }
}

fn handle_attribute_context(
    request: &ContextRequest,
    dump_request: Option<PathBuf>,
) -> anyhow::Result<()> {
    tracing::info!(
        has_input_context = request.has_input_context(),
        has_output_context = request.has_output_context(),
        strategy = %request.handle_output_context_strategy(),
        "Resolved context attribution request"
    );
    if request.has_output_context() && request.output_context_text().is_none() {
        tracing::info!(
            strategy = %request.handle_output_context_strategy(),
            "Output context will be generated and split from the output current text"
        );
    }

    match dump_request {
        Some(path) => {
            persistence::save_request(&path, request)?;
            println!("Saved request to: {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(request)?),
    }
    Ok(())
}

fn handle_step_functions(contrastive_only: bool) -> anyhow::Result<()> {
    let functions: Vec<_> = list_step_functions()
        .iter()
        .filter(|f| !contrastive_only || f.contrastive)
        .collect();
    let width = functions.iter().map(|f| f.name.len()).max().unwrap_or(0);
    println!("Step functions ({}):", functions.len());
    for f in functions {
        let marker = if f.contrastive { "contrastive" } else { "" };
        println!(
            "  {:<width$}  {:<11}  {}",
            f.name,
            marker,
            f.description,
            width = width
        );
    }
    Ok(())
}

fn handle_config(action: ConfigAction, sources: &ConfigSources) -> anyhow::Result<()> {
    let workspace = sources.workspace.as_deref().unwrap_or(Path::new("."));
    match action {
        ConfigAction::Init => {
            match config::init_workspace_config(workspace)? {
                Some(path) => println!("Created default configuration at: {}", path.display()),
                None => println!(
                    "Configuration file already exists at: {}",
                    config::workspace_config_path(workspace).display()
                ),
            }
            Ok(())
        }
        ConfigAction::Show => {
            if !ctxattr_core::config_exists(Some(workspace)) && sources.config_file.is_none() {
                tracing::info!("No configuration file found, showing built-in defaults");
            }
            let args = sources
                .extract_args(&serde_json::json!({}))
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", toml::to_string_pretty(&args)?);
            Ok(())
        }
    }
}
