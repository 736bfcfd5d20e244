//! String sanitization shared by validation and patching.
//!
//! Single-line values lose every control character. Free text (blotter
//! descriptions, remarks) keeps line breaks and tabs.

use crate::error::RecordError;

fn filter(raw: &str, strip_control: bool, keep_breaks: bool) -> String {
    if !strip_control {
        return raw.to_string();
    }
    raw.chars()
        .filter(|c| !c.is_control() || (keep_breaks && matches!(c, '\n' | '\t')))
        .collect()
}

/// Trims and strips control characters; blank becomes `None`.
pub(crate) fn sanitize_optional(value: Option<String>, strip_control: bool) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = filter(&raw, strip_control, false).trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// Like [`sanitize_optional`] but blank is a [`RecordError::MissingField`].
pub(crate) fn sanitize_required(
    field: &str,
    value: String,
    strip_control: bool,
) -> Result<String, RecordError> {
    sanitize_optional(Some(value), strip_control).ok_or_else(|| RecordError::missing(field))
}

/// Multi-line variant used for descriptions and remarks.
pub(crate) fn sanitize_text(value: String, strip_control: bool) -> Option<String> {
    let trimmed = filter(&value, strip_control, true).trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub(crate) fn check_length(
    field: &str,
    value: &str,
    max: Option<usize>,
) -> Result<(), RecordError> {
    match max {
        Some(limit) if value.chars().count() > limit => Err(RecordError::invalid(
            field,
            format!("longer than {limit} characters"),
        )),
        _ => Ok(()),
    }
}
