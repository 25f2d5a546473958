//! Error types for schema synchronization.

/// Errors that can occur while planning or applying table upgrades.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A declared column type could not be parsed.
    #[error("Failed to parse column type '{input}': {message}")]
    Parse {
        /// The offending type string.
        input: String,
        /// Why it was rejected.
        message: String,
    },

    /// A table definition is structurally invalid.
    #[error("Invalid definition for table '{table}': {message}")]
    Definition {
        /// Table name.
        table: String,
        /// What is wrong with the definition.
        message: String,
    },

    /// The database rejected a statement issued for a table.
    #[error("Failed to {action} '{table}': {source}")]
    Driver {
        /// Table name.
        table: String,
        /// The step that was attempted (e.g. "alter table").
        action: &'static str,
        /// The underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// An internal invariant was broken (a bug, not a user error).
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Database error not tied to a single table.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading definition files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<SyncError>),
}

impl SyncError {
    /// Creates a definition error for the given table.
    pub fn definition(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Definition {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns a closure wrapping a driver error with table and action context.
    pub(crate) fn driver(table: &str, action: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        let table = table.to_string();
        move |source| Self::Driver {
            table,
            action,
            source,
        }
    }

    /// Folds a list of failures into a single error, if there are any.
    #[must_use]
    pub fn collect(mut errors: Vec<SyncError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

/// Result type for schema synchronization.
pub type Result<T> = std::result::Result<T, SyncError>;
