use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entity_kind::EntityKind;
use crate::error::ClassifiedError;
use crate::outbox::EventPayload;
use crate::store::validation::check_optional;
use crate::store::{FieldSpec, ReferenceEntity, Validate};

static ISO639_1: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}$").expect("valid iso639-1 regex"));
static ISO639_3: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{3}$").expect("valid iso639-3 regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// ISO 639 language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub language_code: String,
    pub language_name: String,
    pub iso3_code: Option<String>,
    pub native_name: Option<String>,
    #[serde(default)]
    pub direction: TextDirection,
}

impl Language {
    /// A left-to-right language with only the required fields set.
    pub fn new(language_code: impl Into<String>, language_name: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            language_name: language_name.into(),
            iso3_code: None,
            native_name: None,
            direction: TextDirection::Ltr,
        }
    }

    pub fn with_iso3(mut self, iso3: impl Into<String>) -> Self {
        self.iso3_code = Some(iso3.into());
        self
    }

    pub fn with_native_name(mut self, name: impl Into<String>) -> Self {
        self.native_name = Some(name.into());
        self
    }

    /// Set the script direction.
    pub fn with_direction(mut self, direction: TextDirection) -> Self {
        self.direction = direction;
        self
    }
}

impl Validate for Language {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("language_code", 2, 2),
        FieldSpec::required("language_name", 1, 100),
        FieldSpec::optional("iso3_code", 3),
        FieldSpec::optional("native_name", 100),
    ];

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "language_code" => Some(&self.language_code),
            "language_name" => Some(&self.language_name),
            "iso3_code" => self.iso3_code.as_deref(),
            "native_name" => self.native_name.as_deref(),
            _ => None,
        }
    }

    fn check_rules(&self) -> Result<(), ClassifiedError> {
        if !ISO639_1.is_match(&self.language_code) {
            return Err(ClassifiedError::validation(
                "language_code",
                "language_code must be 2 lowercase letters (ISO 639-1)",
            ));
        }
        check_optional("iso3_code", self.iso3_code.as_deref(), |v| {
            if ISO639_3.is_match(v) {
                Ok(())
            } else {
                Err("iso3_code must be 3 lowercase letters (ISO 639-3)".to_string())
            }
        })
    }
}

impl ReferenceEntity for Language {
    const KIND: EntityKind = EntityKind::Language;

    fn code(&self) -> &str {
        &self.language_code
    }

    fn into_payload(self) -> EventPayload {
        EventPayload::Language(self)
    }
}
