//! Error types for bqviews.

use thiserror::Error;

use crate::validator::ValidationError;

/// The main error type for view generation.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The configuration failed validation. Every problem found is reported.
    #[error("Invalid configuration ({} error(s)):\n{}", .0.len(), format_errors(.0))]
    Invalid(Vec<ValidationError>),

    /// Failed to load or decode the configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to parse or render a SQL template.
    #[error("Template error at position {position}: {message}")]
    Template { position: usize, message: String },

    /// Invalid filter operator.
    #[error("Invalid operator: '{0}'. Expected: AND or OR")]
    InvalidOperator(String),

    /// A view key that is not part of the resolved set.
    #[error("Unknown view: '{0}'")]
    UnknownView(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewError {
    /// Create a template error at the given position.
    pub fn template(position: usize, message: impl Into<String>) -> Self {
        Self::Template {
            position,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<toml::de::Error> for ViewError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias for view generation.
pub type ViewResult<T> = Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ViewError::template(5, "unknown placeholder 'foo'");
        assert_eq!(
            err.to_string(),
            "Template error at position 5: unknown placeholder 'foo'"
        );
    }

    #[test]
    fn test_invalid_lists_every_error() {
        let err = ViewError::Invalid(vec![
            ValidationError::UnknownTargetDataset {
                source_dataset: "raw".to_string(),
                target: "acme".to_string(),
                suggestion: None,
            },
            ValidationError::MalformedOperator {
                view: "raw.users".to_string(),
                index: 1,
                operator: "XOR".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid configuration (2 error(s)):"));
        assert!(msg.contains("  - Source dataset 'raw'"));
        assert!(msg.contains("'XOR'"));
    }
}
