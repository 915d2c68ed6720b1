//! Error types for Kiln

use thiserror::Error;

/// Hard failures. Everything recoverable during a batch is a
/// [`Diagnostic`](crate::Diagnostic) instead.
#[derive(Debug, Error)]
pub enum KilnError {
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("Fetch timed out after {0:?}")]
    FetchTimeout(std::time::Duration),

    #[error("Import error: {0}")]
    ImportError(String),
}

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

impl From<toml::de::Error> for KilnError {
    fn from(err: toml::de::Error) -> Self {
        KilnError::TomlParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_error_conversion() {
        let err: KilnError = toml::from_str::<toml::Value>("= nope").unwrap_err().into();
        assert!(matches!(err, KilnError::TomlParseError(_)));
    }

    #[test]
    fn test_display() {
        let err = KilnError::MalformedBatch("expected an array".to_string());
        assert_eq!(err.to_string(), "Malformed batch: expected an array");
    }
}
