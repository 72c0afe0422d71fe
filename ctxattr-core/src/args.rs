//! Argument groups for context attribution.
//!
//! A context attribution run identifies which generated tokens are sensitive to
//! the context (CTI) and attributes them back to context tokens (CCI). Its
//! arguments come in three groups: what text to use ([`ContextInputArgs`]),
//! how to score and select tokens ([`ContextMethodArgs`]), and what to do with
//! the results ([`ContextOutputArgs`]). [`AttributeContextArgs`] flattens the
//! three so every source (config file, environment, CLI, JSON dump) shares one
//! set of keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::str::FromStr;

/// How an output context produced together with the output current text is
/// split from it before context sensitivity detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleOutputContextStrategy {
    /// The user verifies an automatic detection attempt and can fix it by hand.
    #[default]
    Manual,
    /// Automatic detection by alignment with the source context (MT-like tasks).
    Auto,
    /// The output context must be given up front; never prompt.
    Pre,
}

impl HandleOutputContextStrategy {
    pub const VARIANTS: [&'static str; 3] = ["manual", "auto", "pre"];

    pub fn as_str(&self) -> &'static str {
        match self {
            HandleOutputContextStrategy::Manual => "manual",
            HandleOutputContextStrategy::Auto => "auto",
            HandleOutputContextStrategy::Pre => "pre",
        }
    }
}

impl std::fmt::Display for HandleOutputContextStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandleOutputContextStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            "pre" => Ok(Self::Pre),
            other => Err(format!(
                "unknown output context strategy '{}' (expected one of: {})",
                other,
                Self::VARIANTS.join(", ")
            )),
        }
    }
}

/// Texts and templates fed to the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextInputArgs {
    /// Prompt (decoder-only) or source text (encoder-decoder). Infilled as
    /// `{current}` in `input_template`.
    #[serde(default, deserialize_with = "lenient::string")]
    pub input_current_text: String,
    /// Input-side context, infilled as `{context}` in `input_template`.
    #[serde(default, deserialize_with = "lenient::option_string")]
    pub input_context_text: Option<String>,
    /// Must contain `{current}`. Defaults to `{context} {current}` when
    /// `input_context_text` is given, `{current}` otherwise.
    #[serde(default, deserialize_with = "lenient::option_string")]
    pub input_template: Option<String>,
    /// Output-side context (target prefix or e.g. a chain of thought).
    /// When absent but required by `output_template`, it is generated along
    /// with the output current text and split per the configured strategy.
    #[serde(default, deserialize_with = "lenient::option_string")]
    pub output_context_text: Option<String>,
    /// Force-decoded output tested for context sensitivity. Generated by the
    /// model when absent.
    #[serde(default, deserialize_with = "lenient::option_string")]
    pub output_current_text: Option<String>,
    /// Must contain `{current}`, preceded by `{context}` if present.
    #[serde(default, deserialize_with = "lenient::option_string")]
    pub output_template: Option<String>,
    /// Contextless input used for the contrastive comparison. Infilled with
    /// `input_current_text` when it contains `{current}`, used as-is otherwise.
    /// It has no context to infill, so `{context}` is rejected here.
    #[serde(default, deserialize_with = "lenient::option_string")]
    pub contextless_input_current_text: Option<String>,
}

/// Base attribution arguments shared with plain (non-context) attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeBaseArgs {
    /// Model identifier or local path, resolved by the attribution engine.
    #[serde(default, deserialize_with = "lenient::string")]
    pub model_name_or_path: String,
    #[serde(
        default = "default_attribution_method",
        deserialize_with = "lenient::string"
    )]
    pub attribution_method: String,
    /// Step function attributed in CCI. Engine default when absent.
    #[serde(default, deserialize_with = "lenient::option_string")]
    pub attributed_fn: Option<String>,
    #[serde(default, deserialize_with = "lenient::option_string")]
    pub device: Option<String>,
    /// Indices of the generated tokens to attribute. Empty means all.
    #[serde(default)]
    pub attribution_selectors: Vec<usize>,
    #[serde(default)]
    pub attribution_aggregators: Vec<String>,
    #[serde(default)]
    pub normalize_attributions: bool,
    #[serde(default)]
    pub rescale_attributions: bool,
    #[serde(default)]
    pub model_kwargs: Map<String, Value>,
    #[serde(default)]
    pub tokenizer_kwargs: Map<String, Value>,
    #[serde(default)]
    pub generation_kwargs: Map<String, Value>,
    #[serde(default)]
    pub attribution_kwargs: Map<String, Value>,
}

impl Default for AttributeBaseArgs {
    fn default() -> Self {
        Self {
            model_name_or_path: String::new(),
            attribution_method: default_attribution_method(),
            attributed_fn: None,
            device: None,
            attribution_selectors: Vec::new(),
            attribution_aggregators: Vec::new(),
            normalize_attributions: false,
            rescale_attributions: false,
            model_kwargs: Map::new(),
            tokenizer_kwargs: Map::new(),
            generation_kwargs: Map::new(),
            attribution_kwargs: Map::new(),
        }
    }
}

fn default_attribution_method() -> String {
    "saliency".to_string()
}

/// Scoring and selection hyperparameters for CTI and CCI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMethodArgs {
    #[serde(flatten)]
    pub base: AttributeBaseArgs,
    /// Contrastive step function used to detect context-sensitive tokens.
    #[serde(
        default = "default_context_sensitivity_metric",
        deserialize_with = "lenient::string"
    )]
    pub context_sensitivity_metric: String,
    #[serde(default)]
    pub handle_output_context_strategy: HandleOutputContextStrategy,
    /// One token per CCI output to force-decode as contextless output.
    #[serde(default)]
    pub contextless_output_next_tokens: Vec<String>,
    /// Ask the user for the contextless next token of every CCI output.
    #[serde(default)]
    pub prompt_user_for_contextless_output_next_tokens: bool,
    /// Special tokens preserved in generated strings (e.g. `<brk>`).
    #[serde(default)]
    pub special_tokens_to_keep: Vec<String>,
    #[serde(default = "default_separator", deserialize_with = "lenient::string")]
    pub decoder_input_output_separator: String,
    /// Standard deviations from the mean metric score for a token to be
    /// considered context-sensitive.
    #[serde(default = "default_std_threshold")]
    pub context_sensitivity_std_threshold: f64,
    #[serde(default)]
    pub context_sensitivity_topk: Option<usize>,
    /// Standard deviations from the mean attribution score for a context
    /// token to be considered salient in the visualization.
    #[serde(default = "default_std_threshold")]
    pub attribution_std_threshold: f64,
    #[serde(default)]
    pub attribution_topk: Option<usize>,
}

impl Default for ContextMethodArgs {
    fn default() -> Self {
        Self {
            base: AttributeBaseArgs::default(),
            context_sensitivity_metric: default_context_sensitivity_metric(),
            handle_output_context_strategy: HandleOutputContextStrategy::default(),
            contextless_output_next_tokens: Vec::new(),
            prompt_user_for_contextless_output_next_tokens: false,
            special_tokens_to_keep: Vec::new(),
            decoder_input_output_separator: default_separator(),
            context_sensitivity_std_threshold: default_std_threshold(),
            context_sensitivity_topk: None,
            attribution_std_threshold: default_std_threshold(),
            attribution_topk: None,
        }
    }
}

fn default_context_sensitivity_metric() -> String {
    "kl_divergence".to_string()
}

fn default_separator() -> String {
    " ".to_string()
}

fn default_std_threshold() -> f64 {
    1.0
}

/// Display and persistence options for the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextOutputArgs {
    /// Show intermediate CTI and CCI outputs while running.
    #[serde(default)]
    pub show_intermediate_outputs: bool,
    /// Where to save the results as JSON.
    #[serde(default)]
    pub save_path: Option<PathBuf>,
    /// Include run metadata in the saved output.
    #[serde(default = "default_true")]
    pub add_output_info: bool,
    /// Where to save the HTML visualization.
    #[serde(default)]
    pub viz_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub show_viz: bool,
}

impl Default for ContextOutputArgs {
    fn default() -> Self {
        Self {
            show_intermediate_outputs: false,
            save_path: None,
            add_output_info: true,
            viz_path: None,
            show_viz: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// The full, unvalidated argument set of a context attribution run.
///
/// Call [`AttributeContextArgs::validate`] to obtain a
/// [`ContextRequest`](crate::validate::ContextRequest).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeContextArgs {
    #[serde(flatten)]
    pub input: ContextInputArgs,
    #[serde(flatten)]
    pub method: ContextMethodArgs,
    #[serde(flatten)]
    pub output: ContextOutputArgs,
}

impl AttributeContextArgs {
    /// Arguments with default method and output settings for a single input.
    pub fn new(input_current_text: impl Into<String>) -> Self {
        Self {
            input: ContextInputArgs {
                input_current_text: input_current_text.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Flat key/value view of every argument.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// String deserializers that also accept scalars.
///
/// Environment variables are parsed into typed values, so
/// `CTXATTR_INPUT_CURRENT_TEXT=42` arrives as an integer. Text fields take
/// the scalar's textual form instead of failing.
mod lenient {
    use serde::Deserializer;
    use serde::de::{self, Visitor};
    use std::fmt;

    struct StringVisitor;

    impl<'de> Visitor<'de> for StringVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or a scalar value")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_char<E: de::Error>(self, v: char) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    struct OptionVisitor;

    impl<'de> Visitor<'de> for OptionVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an optional string or scalar value")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            string(d).map(Some)
        }
    }

    pub(super) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        d.deserialize_any(StringVisitor)
    }

    pub(super) fn option_string<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<String>, D::Error> {
        d.deserialize_option(OptionVisitor)
    }
}
