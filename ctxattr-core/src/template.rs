//! Input/output templates with `{context}` and `{current}` placeholders.

/// Placeholder replaced by the context text.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";
/// Placeholder replaced by the current text.
pub const CURRENT_PLACEHOLDER: &str = "{current}";
/// Default template when a context text is supplied.
pub const CONTEXT_TEMPLATE: &str = "{context} {current}";
/// Default template when no context text is supplied.
pub const CURRENT_ONLY_TEMPLATE: &str = "{current}";

/// Default template for a side of the model, depending on whether a context
/// text was supplied for it.
pub fn default_template(has_context_text: bool) -> &'static str {
    if has_context_text {
        CONTEXT_TEMPLATE
    } else {
        CURRENT_ONLY_TEMPLATE
    }
}

pub fn has_context(template: &str) -> bool {
    template.contains(CONTEXT_PLACEHOLDER)
}

pub fn has_current(template: &str) -> bool {
    template.contains(CURRENT_PLACEHOLDER)
}

/// Whether the first `{context}` comes after the first `{current}`.
///
/// Templates lacking either placeholder are never out of order.
pub fn context_after_current(template: &str) -> bool {
    match (
        template.find(CONTEXT_PLACEHOLDER),
        template.find(CURRENT_PLACEHOLDER),
    ) {
        (Some(ctx), Some(cur)) => ctx > cur,
        _ => false,
    }
}

/// Text following the first `{current}` placeholder, if any.
pub fn suffix_after_current(template: &str) -> &str {
    template
        .split_once(CURRENT_PLACEHOLDER)
        .map(|(_, suffix)| suffix)
        .unwrap_or("")
}

/// Fill both placeholders in a single pass. A missing context infills as an
/// empty string.
pub fn infill(template: &str, context: Option<&str>, current: &str) -> String {
    let context = context.unwrap_or("");
    let mut out = String::with_capacity(template.len() + context.len() + current.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(CURRENT_PLACEHOLDER) {
            out.push_str(current);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
