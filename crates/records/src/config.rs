//! Validation settings for request creation and admin edits.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::CategoryRegistry;

/// Limits and policies applied by [`crate::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    /// Attachments accepted on a blotter report at creation. Default: `3`.
    pub max_attachments: usize,

    /// Strip control characters from submitted strings. Default: `true`.
    pub strip_control_chars: bool,

    /// Upper bound, in characters, for single-line fields such as names,
    /// titles and contacts. Default: `200`.
    pub max_line_chars: Option<usize>,

    /// Upper bound, in characters, for descriptions and remarks. Default: `5000`.
    pub max_text_chars: Option<usize>,

    /// Reject blotter reports whose incident date lies in the future.
    /// Default: `true`.
    pub reject_future_incidents: bool,

    /// Document categories and their fields.
    pub categories: CategoryRegistry,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            max_attachments: 3,
            strip_control_chars: true,
            max_line_chars: Some(200),
            max_text_chars: Some(5000),
            reject_future_incidents: true,
            categories: CategoryRegistry::default(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("max_line_chars ({line}) exceeds max_text_chars ({text})")]
    LineExceedsText { line: usize, text: usize },

    #[error("category registry is empty; document requests could never validate")]
    EmptyRegistry,
}

impl RecordsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(line), Some(text)) = (self.max_line_chars, self.max_text_chars) {
            if line > text {
                return Err(ConfigError::LineExceedsText { line, text });
            }
        }
        if self.categories.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        Ok(())
    }
}
