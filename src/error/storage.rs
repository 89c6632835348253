use thiserror::Error;

/// Raw failure reported by a storage backend.
///
/// Backends translate their driver's structured error codes into these
/// variants at the boundary (e.g. SQLSTATE `23505` becomes
/// [`StorageError::UniqueViolation`]). Nothing above this type inspects
/// error message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("no matching row")]
    NoRows,

    #[error("unique constraint {constraint} violated")]
    UniqueViolation {
        constraint: String,
        column: Option<String>,
    },

    #[error("check constraint {constraint} violated")]
    CheckViolation {
        constraint: String,
        column: Option<String>,
    },

    #[error("foreign key constraint {constraint} violated")]
    ForeignKeyViolation {
        constraint: String,
        column: Option<String>,
    },

    #[error("connection failure: {0}")]
    Connection(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("storage lock poisoned during {0}")]
    Poisoned(&'static str),

    #[error("row serialization failed: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Other(String),
}

impl StorageError {
    /// Whether the failure belongs to the connection/timeout class.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Connection(_) | StorageError::Timeout(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
