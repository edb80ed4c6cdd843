//! Error types for the migrator.

use thiserror::Error;

/// Exit code for configuration errors (invalid YAML, missing fields).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when the database cannot be reached.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code when the migration transaction failed and was rolled back.
pub const EXIT_MIGRATION_ERROR: u8 = 3;
/// Exit code for a malformed snapshot document.
pub const EXIT_INPUT_ERROR: u8 = 4;
/// Exit code for file system errors (missing snapshot or config file).
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid values, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error in the config file
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot document is not in the expected shape
    #[error("Invalid snapshot {path}: {message}")]
    Input { path: String, message: String },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Target database query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// TLS setup failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// A stage failed inside the migration transaction; the transaction was rolled back
    #[error("Migration failed during {stage} (rolled back): {message}")]
    Migration { stage: String, message: String },
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create an Input error for a snapshot path
    pub fn input(path: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Input {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Migration error for a failed stage
    pub fn migration(stage: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Migration {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Pool { .. } | MigrateError::Tls(_) => EXIT_CONNECTION_ERROR,
            MigrateError::Target(_) | MigrateError::Migration { .. } => EXIT_MIGRATION_ERROR,
            MigrateError::Input { .. } | MigrateError::Json(_) => EXIT_INPUT_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(MigrateError::pool("x", "y").exit_code(), EXIT_CONNECTION_ERROR);
        assert_eq!(
            MigrateError::migration("vessels", "boom").exit_code(),
            EXIT_MIGRATION_ERROR
        );
        assert_eq!(
            MigrateError::input("app_data.json", "bad").exit_code(),
            EXIT_INPUT_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MigrateError::migration("alert rules", "duplicate key");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Migration failed during alert rules"));
        assert!(detailed.contains("duplicate key"));
    }

    #[test]
    fn test_pool_error_carries_context() {
        let err = MigrateError::pool("timed out", "connecting to 127.0.0.1:5433/alerts");
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("Context: connecting to 127.0.0.1:5433/alerts"));
    }
}
