//! Two-pass entity validation run before anything reaches the store.
//!
//! The structural pass checks presence and length from a static field
//! table; the business-rule pass runs the entity's own checks (formats,
//! allowed values). Either pass stops at the first problem and reports it as
//! a `VALIDATION` error naming the field.

use crate::error::ClassifiedError;

/// Presence and length constraints for one field. Lengths count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub min_len: usize,
    pub max_len: usize,
}

impl FieldSpec {
    /// A field that must be present, trimmed length within `min_len..=max_len`.
    pub const fn required(name: &'static str, min_len: usize, max_len: usize) -> Self {
        Self {
            name,
            required: true,
            min_len,
            max_len,
        }
    }

    /// A field that may be absent but is at most `max_len` when set.
    pub const fn optional(name: &'static str, max_len: usize) -> Self {
        Self {
            name,
            required: false,
            min_len: 0,
            max_len,
        }
    }

    /// Check one value. Empty optional values are treated as absent.
    pub fn check(&self, value: Option<&str>) -> Result<(), ClassifiedError> {
        let value = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ if self.required => {
                return Err(ClassifiedError::validation(
                    self.name,
                    format!("{} is required", self.name),
                ))
            }
            _ => return Ok(()),
        };

        let len = value.chars().count();
        if len < self.min_len || len > self.max_len {
            return Err(ClassifiedError::validation(self.name, self.length_message()));
        }
        Ok(())
    }

    fn length_message(&self) -> String {
        if self.min_len == self.max_len {
            format!("{} must be exactly {} characters", self.name, self.min_len)
        } else if self.min_len == 0 {
            format!("{} must be at most {} characters", self.name, self.max_len)
        } else {
            format!(
                "{} must be {}-{} characters",
                self.name, self.min_len, self.max_len
            )
        }
    }
}

pub trait Validate {
    /// Structural constraints, checked in order.
    const SCHEMA: &'static [FieldSpec];

    /// Current value of a field named in [`SCHEMA`](Self::SCHEMA).
    fn field(&self, name: &str) -> Option<&str>;

    /// Business rules; only run once the structural pass is clean.
    fn check_rules(&self) -> Result<(), ClassifiedError> {
        Ok(())
    }

    fn validate(&self) -> Result<(), ClassifiedError> {
        for spec in Self::SCHEMA {
            spec.check(self.field(spec.name))?;
        }
        self.check_rules()
    }
}

/// Apply `rule` to an optional field, skipping empty values.
pub(crate) fn check_optional<F>(
    field: &'static str,
    value: Option<&str>,
    rule: F,
) -> Result<(), ClassifiedError>
where
    F: FnOnce(&str) -> Result<(), String>,
{
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => rule(v).map_err(|msg| ClassifiedError::validation(field, msg)),
        _ => Ok(()),
    }
}
