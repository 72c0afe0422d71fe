//! Command-line flags for `ctxattr attribute-context`.
//!
//! Every flag is optional and only serialized when given, so it overrides the
//! configuration layers without resetting keys the user did not pass.

use clap::builder::PossibleValuesParser;
use ctxattr_core::HandleOutputContextStrategy;
use ctxattr_core::step_functions::contrastive_step_functions;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(clap::Args, Debug, Default, Serialize)]
pub struct AttributeContextFlags {
    // -- Input --
    /// Input text used for generation, formatted as {current} in the input template
    #[arg(long, help_heading = "Input")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_current_text: Option<String>,

    /// Additional input context, formatted as {context} in the input template
    #[arg(long, help_heading = "Input")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_context_text: Option<String>,

    /// Template for model inputs [default: '{context} {current}' with input context, '{current}' otherwise]
    #[arg(long, help_heading = "Input")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_template: Option<String>,

    /// Output context for which context sensitivity should be detected
    #[arg(long, help_heading = "Input")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_context_text: Option<String>,

    /// Output generated with all contexts available; force-decoded when given
    #[arg(long, help_heading = "Input")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_current_text: Option<String>,

    /// Template for model outputs; {context} must precede {current}
    #[arg(long, help_heading = "Input")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_template: Option<String>,

    /// Contextless input for the contrastive comparison [default: '{current}']
    #[arg(long, help_heading = "Input")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contextless_input_current_text: Option<String>,

    // -- Attribution --
    /// Model identifier or local path
    #[arg(short, long, help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name_or_path: Option<String>,

    /// Attribution method used for contextual cues imputation
    #[arg(long, help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution_method: Option<String>,

    /// Step function to attribute
    #[arg(long, help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributed_fn: Option<String>,

    /// Device to run the model on (e.g. cpu, cuda)
    #[arg(long, help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Indices of the generated tokens to attribute
    #[arg(long, num_args = 1.., help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attribution_selectors: Vec<usize>,

    /// Aggregators applied to attribution scores
    #[arg(long, num_args = 1.., help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attribution_aggregators: Vec<String>,

    /// Normalize attribution scores
    #[arg(long, num_args = 0..=1, default_missing_value = "true", help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize_attributions: Option<bool>,

    /// Rescale attribution scores
    #[arg(long, num_args = 0..=1, default_missing_value = "true", help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescale_attributions: Option<bool>,

    /// Model loading arguments as a JSON object
    #[arg(long, value_parser = parse_json_object, help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_kwargs: Option<Map<String, Value>>,

    /// Tokenizer arguments as a JSON object
    #[arg(long, value_parser = parse_json_object, help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_kwargs: Option<Map<String, Value>>,

    /// Generation arguments as a JSON object
    #[arg(long, value_parser = parse_json_object, help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_kwargs: Option<Map<String, Value>>,

    /// Attribution method arguments as a JSON object
    #[arg(long, value_parser = parse_json_object, help_heading = "Attribution")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution_kwargs: Option<Map<String, Value>>,

    // -- Context sensitivity --
    /// Contrastive metric used to detect context-sensitive output tokens [default: kl_divergence]
    #[arg(long, value_parser = PossibleValuesParser::new(contrastive_step_functions()), help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_sensitivity_metric: Option<String>,

    /// How to split an output context generated together with the output current text:
    /// manual (user verifies), auto (alignment with input context), pre (fail instead of prompting)
    #[arg(long, value_parser = PossibleValuesParser::new(HandleOutputContextStrategy::VARIANTS), help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_output_context_strategy: Option<String>,

    /// One token per CCI output to force-decode as contextless output
    #[arg(long, num_args = 1.., conflicts_with = "prompt_user_for_contextless_output_next_tokens", help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contextless_output_next_tokens: Vec<String>,

    /// Prompt for the contextless next token of every CCI output
    #[arg(long, num_args = 0..=1, default_missing_value = "true", help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_user_for_contextless_output_next_tokens: Option<bool>,

    /// Special tokens to preserve in generated strings (e.g. <brk>)
    #[arg(long, num_args = 1.., help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub special_tokens_to_keep: Vec<String>,

    /// Separator between decoder input and output [default: ' ']
    #[arg(long, help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder_input_output_separator: Option<String>,

    /// Standard deviations from the mean metric score for context-sensitive tokens [default: 1.0]
    #[arg(long, help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_sensitivity_std_threshold: Option<f64>,

    /// Keep only the top-K context-sensitive tokens
    #[arg(long, help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_sensitivity_topk: Option<usize>,

    /// Standard deviations from the mean attribution score for salient context tokens [default: 1.0]
    #[arg(long, help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution_std_threshold: Option<f64>,

    /// Keep only the top-K salient context tokens
    #[arg(long, help_heading = "Context sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution_topk: Option<usize>,

    // -- Output --
    /// Show intermediate CTI and CCI outputs
    #[arg(long, num_args = 0..=1, default_missing_value = "true", help_heading = "Output")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_intermediate_outputs: Option<bool>,

    /// Save the results as JSON at this path
    #[arg(short = 'o', long, help_heading = "Output")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<PathBuf>,

    /// Add attribution process information to the saved output [default: true]
    #[arg(long, num_args = 0..=1, default_missing_value = "true", help_heading = "Output")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_output_info: Option<bool>,

    /// Save the HTML visualization at this path
    #[arg(long, help_heading = "Output")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viz_path: Option<PathBuf>,

    /// Show the visualization in the terminal [default: true]
    #[arg(long, num_args = 0..=1, default_missing_value = "true", help_heading = "Output")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_viz: Option<bool>,
}

fn parse_json_object(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", other)),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}
