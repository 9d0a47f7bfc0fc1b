//! Error types for Reqgraph

use thiserror::Error;

/// Result type alias using Reqgraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Reqgraph error types with helpful messages and suggestions
///
/// Only [`Error::Connection`] is fatal to a population run. Row, match and
/// rule failures are recoverable and end up aggregated in the run report.
#[derive(Error, Debug)]
pub enum Error {
    // Connection errors (E100-E199)
    #[error("Graph store connection failed: {0}. Check `reqgraph config list` and that the store is reachable.")]
    Connection(String),

    #[error("Graph session is not connected")]
    NotConnected,

    // Ingestion errors (E200-E299)
    #[error("Row {row}: could not parse embedding: {reason}")]
    RowParse { row: usize, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Relationship errors (E300-E399)
    #[error("Rule '{rule}' failed: {reason}")]
    RuleExecution { rule: String, reason: String },

    #[error("Invalid rule set: {0}")]
    InvalidRuleSet(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "E100",
            Self::NotConnected => "E101",
            Self::RowParse { .. } => "E200",
            Self::Csv(_) => "E201",
            Self::RuleExecution { .. } => "E301",
            Self::InvalidRuleSet(_) => "E302",
            Self::Database(_) => "E400",
            Self::Config(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Serialization(_) | Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Connection(_) => Some("reqgraph config list".to_string()),
            Self::NotConnected => Some("connect the session before issuing graph operations".to_string()),
            Self::Config(_) => Some("reqgraph config path".to_string()),
            Self::InvalidRuleSet(_) => Some("reqgraph rules".to_string()),
            _ => None,
        }
    }

    /// Whether a population run must stop when this error surfaces
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_is_fatal() {
        let error = Error::Connection("refused".to_string());
        assert_eq!(error.code(), "E100");
        assert!(error.is_fatal());
        assert_eq!(error.suggestion(), Some("reqgraph config list".to_string()));
        assert!(error.to_string().contains("refused"));
    }

    #[test]
    fn test_recoverable_errors() {
        let row = Error::RowParse {
            row: 3,
            reason: "expected `[`".to_string(),
        };
        let rule = Error::RuleExecution {
            rule: "classify_functional".to_string(),
            reason: "bad pattern".to_string(),
        };

        assert!(!row.is_fatal());
        assert!(!rule.is_fatal());
        assert_eq!(row.code(), "E200");
        assert_eq!(rule.code(), "E301");
        assert!(rule.to_string().contains("classify_functional"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let error: Error = io.into();
        assert_eq!(error.code(), "E9999");
        assert_eq!(error.suggestion(), None);
    }
}
