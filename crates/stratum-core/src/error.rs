use thiserror::Error;

/// Core error type for stratum operations.
#[derive(Error, Debug)]
pub enum StratumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A ledger entry whose name no longer carries a readable timestamp.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Migration error: {0}")]
    Migration(String),

    /// A single statement of a batch file failed. Reported, never fatal.
    #[error("Statement {index} of [{file}] failed: {message}")]
    Statement {
        file: String,
        index: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl StratumError {
    /// Whether this error was reported without aborting the run.
    pub fn is_statement_failure(&self) -> bool {
        matches!(self, StratumError::Statement { .. })
    }
}

impl From<serde_json::Error> for StratumError {
    fn from(e: serde_json::Error) -> Self {
        StratumError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for StratumError {
    fn from(e: toml::de::Error) -> Self {
        StratumError::Config(e.to_string())
    }
}

/// Result type alias using StratumError.
pub type Result<T> = std::result::Result<T, StratumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_message() {
        let err = StratumError::Statement {
            file: "20230101000000_up.sql".into(),
            index: 2,
            message: "syntax error".into(),
        };
        assert_eq!(
            err.to_string(),
            "Statement 2 of [20230101000000_up.sql] failed: syntax error"
        );
        assert!(err.is_statement_failure());
        assert!(!StratumError::Parse("x".into()).is_statement_failure());
    }
}
