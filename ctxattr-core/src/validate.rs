//! Construction-time validation of context attribution arguments.
//!
//! [`AttributeContextArgs::validate`] fails fast on inconsistent arguments,
//! fills in derived defaults, and warns about user input that will be
//! ignored. The resulting [`ContextRequest`] is read-only.

use serde::Serialize;
use tracing::{debug, warn};

use crate::args::{AttributeContextArgs, HandleOutputContextStrategy};
use crate::error::ArgsError;
use crate::step_functions;
use crate::template::{self, CONTEXT_PLACEHOLDER, CURRENT_ONLY_TEMPLATE, CURRENT_PLACEHOLDER};

/// Validated arguments of a context attribution run.
///
/// Templates and the contextless input current text are always set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextRequest {
    #[serde(flatten)]
    args: AttributeContextArgs,
    has_input_context: bool,
    has_output_context: bool,
}

impl AttributeContextArgs {
    /// Check cross-field consistency and resolve defaults.
    pub fn validate(mut self) -> Result<ContextRequest, ArgsError> {
        let input = &mut self.input;
        let method = &self.method;

        if method.handle_output_context_strategy == HandleOutputContextStrategy::Pre
            && is_blank(&input.output_context_text)
            && input
                .output_template
                .as_deref()
                .is_some_and(template::has_context)
        {
            return Err(ArgsError::PredefinedOutputContextRequired);
        }
        if !method.contextless_output_next_tokens.is_empty()
            && method.prompt_user_for_contextless_output_next_tokens
        {
            return Err(ArgsError::ConflictingContextlessTokens);
        }

        let input_context_given = input.input_context_text.is_some();
        let output_context_given = input.output_context_text.is_some();
        let input_template = input
            .input_template
            .get_or_insert_with(|| template::default_template(input_context_given).to_string())
            .clone();
        let output_template = input
            .output_template
            .get_or_insert_with(|| template::default_template(output_context_given).to_string())
            .clone();
        input
            .contextless_input_current_text
            .get_or_insert_with(|| CURRENT_PLACEHOLDER.to_string());
        debug!(
            input_template = %input_template,
            output_template = %output_template,
            "Resolved context attribution templates"
        );

        let has_input_context = template::has_context(&input_template);
        let has_output_context = template::has_context(&output_template);

        if input.input_current_text.is_empty() {
            return Err(ArgsError::EmptyCurrentText);
        }
        if !is_blank(&input.input_context_text) && !has_input_context {
            warn!(
                "input_template has format {} (no {}), but --input-context-text is specified. \
                 Ignoring provided --input-context-text.",
                input_template, CONTEXT_PLACEHOLDER
            );
            input.input_context_text = None;
        }
        if !is_blank(&input.output_context_text) && !has_output_context {
            warn!(
                "output_template has format {} (no {}), but --output-context-text is specified. \
                 Ignoring provided --output-context-text.",
                output_template, CONTEXT_PLACEHOLDER
            );
            input.output_context_text = None;
        }
        if is_blank(&input.input_context_text) && has_input_context {
            return Err(ArgsError::MissingContextText {
                template: input_template,
            });
        }
        if !template::has_current(&input_template) {
            return Err(ArgsError::MissingPlaceholder {
                placeholder: CURRENT_PLACEHOLDER,
                field: "input_template",
                template: input_template,
            });
        }
        if !template::has_current(&output_template) {
            return Err(ArgsError::MissingPlaceholder {
                placeholder: CURRENT_PLACEHOLDER,
                field: "output_template",
                template: output_template,
            });
        }
        if has_output_context && template::context_after_current(&output_template) {
            return Err(ArgsError::PlaceholderOrder {
                template: output_template,
            });
        }
        if let Some(text) = input
            .contextless_input_current_text
            .as_deref()
            .filter(|text| template::has_context(text))
        {
            return Err(ArgsError::ContextInContextlessInput {
                text: text.to_string(),
            });
        }
        if !output_template.ends_with(CURRENT_PLACEHOLDER) {
            warn!(
                "Suffix '{}' was specified in output_template and will be used to ignore the \
                 specified suffix tokens during context sensitivity detection. Make sure that the \
                 suffix corresponds to the end of the output_current_text by forcing \
                 --output-current-text if necessary.",
                template::suffix_after_current(&output_template)
            );
        }

        validate_method(&self)?;

        Ok(ContextRequest {
            args: self,
            has_input_context,
            has_output_context,
        })
    }
}

fn validate_method(args: &AttributeContextArgs) -> Result<(), ArgsError> {
    let method = &args.method;
    let metric = &method.context_sensitivity_metric;
    match step_functions::find(metric) {
        None => {
            return Err(ArgsError::UnknownStepFunction {
                name: metric.clone(),
            });
        }
        Some(f) if !f.contrastive => {
            return Err(ArgsError::NonContrastiveMetric {
                name: metric.clone(),
            });
        }
        Some(_) => {}
    }

    let overrides_next_tokens = !method.contextless_output_next_tokens.is_empty()
        || method.prompt_user_for_contextless_output_next_tokens;
    if let Some(attributed_fn) = method.base.attributed_fn.as_deref() {
        if overrides_next_tokens
            && step_functions::find(attributed_fn).is_some_and(|f| !f.contrastive)
        {
            warn!(
                attributed_fn,
                "Contextless output next tokens are ignored because the attributed function is \
                 not contrastive."
            );
        }
    }

    check_std_threshold(
        "context_sensitivity_std_threshold",
        method.context_sensitivity_std_threshold,
    )?;
    check_std_threshold("attribution_std_threshold", method.attribution_std_threshold)?;
    check_topk("context_sensitivity_topk", method.context_sensitivity_topk)?;
    check_topk("attribution_topk", method.attribution_topk)?;
    Ok(())
}

fn check_std_threshold(field: &'static str, value: f64) -> Result<(), ArgsError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ArgsError::InvalidThreshold {
            field,
            reason: format!("expected a non-negative number of standard deviations, got {value}"),
        });
    }
    Ok(())
}

fn check_topk(field: &'static str, value: Option<usize>) -> Result<(), ArgsError> {
    if value == Some(0) {
        return Err(ArgsError::InvalidThreshold {
            field,
            reason: "top-k must be at least 1 when set".to_string(),
        });
    }
    Ok(())
}

/// `None` and the empty string both count as "not supplied".
fn is_blank(text: &Option<String>) -> bool {
    text.as_deref().is_none_or(str::is_empty)
}

impl ContextRequest {
    pub fn args(&self) -> &AttributeContextArgs {
        &self.args
    }

    pub fn has_input_context(&self) -> bool {
        self.has_input_context
    }

    pub fn has_output_context(&self) -> bool {
        self.has_output_context
    }

    pub fn input_current_text(&self) -> &str {
        &self.args.input.input_current_text
    }

    pub fn input_context_text(&self) -> Option<&str> {
        self.args.input.input_context_text.as_deref()
    }

    pub fn output_context_text(&self) -> Option<&str> {
        self.args.input.output_context_text.as_deref()
    }

    pub fn output_current_text(&self) -> Option<&str> {
        self.args.input.output_current_text.as_deref()
    }

    pub fn input_template(&self) -> &str {
        self.args
            .input
            .input_template
            .as_deref()
            .unwrap_or(CURRENT_ONLY_TEMPLATE)
    }

    pub fn output_template(&self) -> &str {
        self.args
            .input
            .output_template
            .as_deref()
            .unwrap_or(CURRENT_ONLY_TEMPLATE)
    }

    pub fn contextless_input_current_text(&self) -> &str {
        self.args
            .input
            .contextless_input_current_text
            .as_deref()
            .unwrap_or(CURRENT_PLACEHOLDER)
    }

    pub fn handle_output_context_strategy(&self) -> HandleOutputContextStrategy {
        self.args.method.handle_output_context_strategy
    }

    /// The model input with both context and current text infilled.
    pub fn formatted_input(&self) -> String {
        template::infill(
            self.input_template(),
            self.input_context_text(),
            self.input_current_text(),
        )
    }

    /// The contextless model input used for contrastive comparison.
    pub fn formatted_contextless_input(&self) -> String {
        template::infill(
            self.contextless_input_current_text(),
            None,
            self.input_current_text(),
        )
    }

    /// The forced output when both output texts are known, `None` if the
    /// model still has to generate part of it.
    pub fn formatted_output(&self) -> Option<String> {
        let current = self.output_current_text()?;
        if self.has_output_context && self.output_context_text().is_none() {
            return None;
        }
        Some(template::infill(
            self.output_template(),
            self.output_context_text(),
            current,
        ))
    }

    /// Output template suffix excluded from context sensitivity detection.
    pub fn output_suffix(&self) -> &str {
        template::suffix_after_current(self.output_template())
    }
}

impl std::fmt::Display for ContextRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        write!(f, "ContextRequest({rendered})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn args(current: &str) -> AttributeContextArgs {
        AttributeContextArgs::new(current)
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` with a warn-level subscriber and return what it logged.
    fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        let output = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        (result, output)
    }

    #[test]
    fn test_current_only_defaults() {
        let request = args("Hello").validate().unwrap();
        assert_eq!(request.input_template(), "{current}");
        assert_eq!(request.output_template(), "{current}");
        assert_eq!(request.contextless_input_current_text(), "{current}");
        assert!(!request.has_input_context());
        assert!(!request.has_output_context());
    }

    #[test]
    fn test_input_context_defaults() {
        let mut a = args("Hello");
        a.input.input_context_text = Some("World".into());
        let request = a.validate().unwrap();
        assert_eq!(request.input_template(), "{context} {current}");
        assert!(request.has_input_context());
        assert_eq!(request.formatted_input(), "World Hello");
        assert_eq!(request.formatted_contextless_input(), "Hello");
    }

    #[test]
    fn test_empty_current_text_fails() {
        assert_eq!(args("").validate(), Err(ArgsError::EmptyCurrentText));
    }

    #[test]
    fn test_missing_current_placeholder_fails() {
        let mut a = args("Hello");
        a.input.input_template = Some("no placeholder".into());
        assert!(matches!(
            a.validate(),
            Err(ArgsError::MissingPlaceholder {
                field: "input_template",
                ..
            })
        ));

        let mut a = args("Hello");
        a.input.output_template = Some("<s>".into());
        assert!(matches!(
            a.validate(),
            Err(ArgsError::MissingPlaceholder {
                field: "output_template",
                ..
            })
        ));
    }

    #[test]
    fn test_input_context_placeholder_without_text_fails() {
        let mut a = args("Hello");
        a.input.input_template = Some("{context} <brk> {current}".into());
        assert_eq!(
            a.validate(),
            Err(ArgsError::MissingContextText {
                template: "{context} <brk> {current}".into()
            })
        );
    }

    #[test]
    fn test_empty_input_context_text_counts_as_missing() {
        let mut a = args("Hello");
        a.input.input_context_text = Some(String::new());
        assert!(matches!(
            a.validate(),
            Err(ArgsError::MissingContextText { .. })
        ));
    }

    #[test]
    fn test_context_text_without_placeholder_is_cleared() {
        let mut a = args("Hello");
        a.input.input_context_text = Some("World".into());
        a.input.input_template = Some("Q: {current}".into());
        a.input.output_context_text = Some("Because".into());
        a.input.output_template = Some("{current}".into());
        let request = a.validate().unwrap();
        assert!(request.input_context_text().is_none());
        assert!(request.output_context_text().is_none());
        assert!(!request.has_input_context());
        assert!(!request.has_output_context());
    }

    #[test]
    fn test_cleared_context_text_is_logged() {
        let mut a = args("Hello");
        a.input.input_context_text = Some("World".into());
        a.input.input_template = Some("Q: {current}".into());
        a.input.output_context_text = Some("Because".into());
        a.input.output_template = Some("{current}".into());
        let (result, logs) = capture_warnings(|| a.validate());
        assert!(result.is_ok());
        assert!(logs.contains("WARN"));
        assert!(logs.contains("input_template has format Q: {current} (no {context})"));
        assert!(logs.contains("Ignoring provided --input-context-text."));
        assert!(logs.contains("Ignoring provided --output-context-text."));
    }

    #[test]
    fn test_default_templates_log_nothing() {
        let mut a = args("Hello");
        a.input.input_context_text = Some("World".into());
        let (result, logs) = capture_warnings(|| a.validate());
        assert!(result.is_ok());
        assert_eq!(logs, "");
    }

    #[test]
    fn test_output_context_without_text_is_allowed_when_not_pre() {
        let mut a = args("Hello");
        a.input.output_template = Some("{context} {current}".into());
        let request = a.validate().unwrap();
        assert!(request.has_output_context());
        assert!(request.output_context_text().is_none());
        assert_eq!(request.formatted_output(), None);
    }

    #[test]
    fn test_pre_strategy_requires_output_context_text() {
        let mut a = args("Hello");
        a.method.handle_output_context_strategy = HandleOutputContextStrategy::Pre;
        a.input.output_template = Some("{context} {current}".into());
        assert_eq!(
            a.clone().validate(),
            Err(ArgsError::PredefinedOutputContextRequired)
        );

        a.input.output_context_text = Some("Context".into());
        a.input.output_current_text = Some("Current".into());
        let request = a.validate().unwrap();
        assert_eq!(request.formatted_output().as_deref(), Some("Context Current"));
    }

    #[test]
    fn test_pre_strategy_without_output_context_placeholder_passes() {
        let mut a = args("Hello");
        a.method.handle_output_context_strategy = HandleOutputContextStrategy::Pre;
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_conflicting_contextless_tokens_fails() {
        let mut a = args("Hello");
        a.method.contextless_output_next_tokens = vec!["the".into()];
        a.method.prompt_user_for_contextless_output_next_tokens = true;
        assert_eq!(a.validate(), Err(ArgsError::ConflictingContextlessTokens));
    }

    #[test]
    fn test_output_placeholder_order() {
        let mut a = args("Hello");
        a.input.output_context_text = Some("ctx".into());
        a.input.output_template = Some("{current} {context}".into());
        assert!(matches!(
            a.validate(),
            Err(ArgsError::PlaceholderOrder { .. })
        ));
    }

    #[test]
    fn test_output_suffix_is_kept() {
        let mut a = args("Hello");
        a.input.output_template = Some("{current}</s>".into());
        let request = a.validate().unwrap();
        assert_eq!(request.output_suffix(), "</s>");
    }

    #[test]
    fn test_output_suffix_is_logged() {
        let mut a = args("Hello");
        a.input.output_template = Some("{current}</s>".into());
        let (result, logs) = capture_warnings(|| a.validate());
        assert!(result.is_ok());
        assert!(logs.contains("Suffix '</s>' was specified in output_template"));
    }

    #[test]
    fn test_non_contrastive_attributed_fn_is_logged() {
        let mut a = args("Hello");
        a.method.base.attributed_fn = Some("probability".into());
        a.method.contextless_output_next_tokens = vec!["the".into()];
        let (result, logs) = capture_warnings(|| a.validate());
        assert!(result.is_ok());
        assert!(logs.contains("attributed_fn=\"probability\""));
        assert!(logs.contains("Contextless output next tokens are ignored"));
    }

    #[test]
    fn test_contextless_input_verbatim_without_placeholder() {
        let mut a = args("Hello");
        a.input.contextless_input_current_text = Some("Different input".into());
        let request = a.validate().unwrap();
        assert_eq!(request.formatted_contextless_input(), "Different input");
    }

    #[test]
    fn test_context_placeholder_in_contextless_input_fails() {
        let mut a = args("Hello");
        a.input.input_context_text = Some("World".into());
        a.input.contextless_input_current_text = Some("{context} <brk> {current}".into());
        assert_eq!(
            a.validate(),
            Err(ArgsError::ContextInContextlessInput {
                text: "{context} <brk> {current}".into()
            })
        );
    }

    #[test]
    fn test_metric_must_be_contrastive() {
        let mut a = args("Hello");
        a.method.context_sensitivity_metric = "probability".into();
        assert_eq!(
            a.validate(),
            Err(ArgsError::NonContrastiveMetric {
                name: "probability".into()
            })
        );

        let mut a = args("Hello");
        a.method.context_sensitivity_metric = "made_up".into();
        assert!(matches!(
            a.validate(),
            Err(ArgsError::UnknownStepFunction { .. })
        ));
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut a = args("Hello");
        a.method.attribution_std_threshold = -0.5;
        assert!(matches!(
            a.validate(),
            Err(ArgsError::InvalidThreshold {
                field: "attribution_std_threshold",
                ..
            })
        ));

        let mut a = args("Hello");
        a.method.context_sensitivity_topk = Some(0);
        assert!(matches!(
            a.validate(),
            Err(ArgsError::InvalidThreshold {
                field: "context_sensitivity_topk",
                ..
            })
        ));
    }

    #[test]
    fn test_serialized_request_carries_derived_flags() {
        let mut a = args("Hello");
        a.input.input_context_text = Some("World".into());
        let request = a.validate().unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["has_input_context"], true);
        assert_eq!(value["has_output_context"], false);
        assert_eq!(value["input_template"], "{context} {current}");
        assert!(request.to_string().starts_with("ContextRequest({"));
    }
}
