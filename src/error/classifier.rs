use tracing::warn;

use super::{ClassifiedError, ErrorCode, StorageError};
use crate::entity_kind::EntityKind;

/// Maps raw storage failures onto the error taxonomy.
///
/// | Condition                  | Code              | Retryable | Severity |
/// |----------------------------|-------------------|-----------|----------|
/// | no matching row            | NOT_FOUND         | no        | low      |
/// | uniqueness violation       | ALREADY_EXISTS    | no        | medium   |
/// | check-constraint violation | VALIDATION        | no        | medium   |
/// | foreign-key violation      | INVALID_REFERENCE | no        | medium   |
/// | connection/timeout class   | TRANSIENT         | yes       | high     |
/// | anything else              | UNKNOWN           | no        | high     |
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Create a classifier.
    pub fn new() -> Self {
        ErrorClassifier
    }

    /// Classify `err` raised while working on `kind`.
    pub fn classify(&self, err: &StorageError, kind: EntityKind) -> ClassifiedError {
        classify(err, kind)
    }
}

/// Classify a storage failure raised while working on `kind`.
pub fn classify(err: &StorageError, kind: EntityKind) -> ClassifiedError {
    match err {
        StorageError::NoRows => ClassifiedError::not_found(kind),
        StorageError::UniqueViolation { column, .. } => {
            let field = column
                .clone()
                .unwrap_or_else(|| kind.code_field().to_string());
            ClassifiedError::new(
                ErrorCode::AlreadyExists,
                format!("{} with this {} already exists", kind, field),
            )
            .with_field(field)
        }
        StorageError::CheckViolation { column, .. } => {
            with_optional_field(
                ClassifiedError::new(
                    ErrorCode::Validation,
                    format!("{} violates a validation constraint", kind),
                ),
                column,
            )
        }
        StorageError::ForeignKeyViolation { column, .. } => with_optional_field(
            ClassifiedError::new(
                ErrorCode::InvalidReference,
                format!("{} references an entity that does not exist", kind),
            ),
            column,
        ),
        StorageError::Connection(_) => {
            ClassifiedError::new(ErrorCode::Transient, "database connection failed")
        }
        StorageError::Timeout(_) => {
            ClassifiedError::new(ErrorCode::Transient, "database operation timed out")
        }
        StorageError::Poisoned(_) | StorageError::Serialization(_) | StorageError::Other(_) => {
            warn!(entity = %kind, error = %err, "unrecognized storage failure");
            ClassifiedError::new(ErrorCode::Unknown, "unknown database error")
        }
    }
}

fn with_optional_field(err: ClassifiedError, column: &Option<String>) -> ClassifiedError {
    match column {
        Some(column) => err.with_field(column.clone()),
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;

    #[test]
    fn no_rows_is_not_found() {
        let err = classify(&StorageError::NoRows, EntityKind::Country);
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Country not found");
        assert!(!err.retryable);
        assert_eq!(err.severity, Severity::Low);
    }

    #[test]
    fn unique_violation_defaults_field_to_business_code() {
        let err = classify(
            &StorageError::UniqueViolation {
                constraint: "uq_regions_code".into(),
                column: None,
            },
            EntityKind::Region,
        );
        assert_eq!(err.code, ErrorCode::AlreadyExists);
        assert_eq!(err.field.as_deref(), Some("region_code"));
        assert_eq!(err.severity, Severity::Medium);
    }

    #[test]
    fn check_violation_is_validation() {
        let err = classify(
            &StorageError::CheckViolation {
                constraint: "chk_version_positive".into(),
                column: Some("version".into()),
            },
            EntityKind::Language,
        );
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.field.as_deref(), Some("version"));
        assert!(!err.retryable);
    }

    #[test]
    fn foreign_key_violation_is_invalid_reference() {
        let err = classify(
            &StorageError::ForeignKeyViolation {
                constraint: "fk_countries_region_id".into(),
                column: Some("region_id".into()),
            },
            EntityKind::Country,
        );
        assert_eq!(err.code, ErrorCode::InvalidReference);
        assert_eq!(err.severity, Severity::Medium);
    }

    #[test]
    fn connection_and_timeout_are_transient() {
        for raw in [
            StorageError::Connection("reset by peer".into()),
            StorageError::Timeout("statement timeout".into()),
        ] {
            let err = classify(&raw, EntityKind::Country);
            assert_eq!(err.code, ErrorCode::Transient);
            assert!(err.retryable);
            assert_eq!(err.severity, Severity::High);
        }
    }

    #[test]
    fn everything_else_is_unknown() {
        let err = ErrorClassifier::new().classify(
            &StorageError::Other("disk full".into()),
            EntityKind::Country,
        );
        assert_eq!(err.code, ErrorCode::Unknown);
        assert!(!err.retryable);
        assert_eq!(err.severity, Severity::High);
    }
}
