//! Error types for the form-analysis engine.
//!
//! Only failures that must reach the caller live here. A missing landmark or an
//! unmatched exercise name is not an error: the first is an absent measurement,
//! the second resolves through fallback rule synthesis.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Rule document format error: {0}")]
    DataFormat(String),

    #[error("Invalid rule for exercise '{exercise}': {reason}")]
    InvalidRule { exercise: String, reason: String },

    #[error("Unknown {kind}: '{value}'")]
    UnknownIdentifier { kind: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn invalid_rule(exercise: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidRule {
            exercise: exercise.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Error::UnknownIdentifier {
            kind,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DataFormat(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::DataFormat(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_is_data_format() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{ not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::DataFormat(_)));
    }

    #[test]
    fn test_invalid_rule_message_names_exercise() {
        let err = Error::invalid_rule("Barbell Squat", "minDegrees >= maxDegrees");
        assert!(err.to_string().contains("Barbell Squat"));
    }
}
