use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entity_kind::EntityKind;
use crate::error::ClassifiedError;
use crate::outbox::EventPayload;
use crate::store::validation::check_optional;
use crate::store::{FieldSpec, ReferenceEntity, RowReference, Validate};

static ISO2: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid regex"));
static ISO3: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid regex"));
static PHONE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[1-9]\d{0,3}$").expect("valid regex"));

/// Accepted values of `continent_code`.
pub const CONTINENT_CODES: [&str; 7] = ["AF", "AS", "EU", "NA", "SA", "OC", "AN"];

/// ISO 3166-1 country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub country_code: String,
    pub country_name: String,
    pub iso3_code: Option<String>,
    pub official_name: Option<String>,
    pub capital_city: Option<String>,
    pub continent_code: Option<String>,
    pub phone_prefix: Option<String>,
    pub region_id: Option<String>,
    pub primary_language_id: Option<String>,
}

impl Country {
    /// A country with only the required fields set.
    pub fn new(country_code: impl Into<String>, country_name: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            country_name: country_name.into(),
            iso3_code: None,
            official_name: None,
            capital_city: None,
            continent_code: None,
            phone_prefix: None,
            region_id: None,
            primary_language_id: None,
        }
    }

    pub fn with_iso3(mut self, iso3: impl Into<String>) -> Self {
        self.iso3_code = Some(iso3.into());
        self
    }

    pub fn with_official_name(mut self, name: impl Into<String>) -> Self {
        self.official_name = Some(name.into());
        self
    }

    pub fn with_capital(mut self, city: impl Into<String>) -> Self {
        self.capital_city = Some(city.into());
        self
    }

    pub fn with_continent(mut self, code: impl Into<String>) -> Self {
        self.continent_code = Some(code.into());
        self
    }

    pub fn with_phone_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.phone_prefix = Some(prefix.into());
        self
    }

    /// Set the owning region's entity id.
    pub fn with_region(mut self, region_id: impl Into<String>) -> Self {
        self.region_id = Some(region_id.into());
        self
    }

    /// Set the primary language's entity id.
    pub fn with_primary_language(mut self, language_id: impl Into<String>) -> Self {
        self.primary_language_id = Some(language_id.into());
        self
    }
}

impl Validate for Country {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("country_code", 2, 2),
        FieldSpec::required("country_name", 2, 100),
        FieldSpec::optional("iso3_code", 3),
        FieldSpec::optional("official_name", 200),
        FieldSpec::optional("capital_city", 100),
        FieldSpec::optional("continent_code", 2),
        FieldSpec::optional("phone_prefix", 5),
    ];

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "country_code" => Some(&self.country_code),
            "country_name" => Some(&self.country_name),
            "iso3_code" => self.iso3_code.as_deref(),
            "official_name" => self.official_name.as_deref(),
            "capital_city" => self.capital_city.as_deref(),
            "continent_code" => self.continent_code.as_deref(),
            "phone_prefix" => self.phone_prefix.as_deref(),
            _ => None,
        }
    }

    fn check_rules(&self) -> Result<(), ClassifiedError> {
        if !ISO2.is_match(&self.country_code) {
            return Err(ClassifiedError::validation(
                "country_code",
                "country_code must be 2 uppercase letters (ISO 3166-1)",
            ));
        }
        if self.country_name.contains("  ") {
            return Err(ClassifiedError::validation(
                "country_name",
                "country_name cannot contain double spaces",
            ));
        }
        check_optional("iso3_code", self.iso3_code.as_deref(), |v| {
            if ISO3.is_match(v) {
                Ok(())
            } else {
                Err("iso3_code must be 3 uppercase letters (ISO 3166-1 alpha-3)".to_string())
            }
        })?;
        check_optional("continent_code", self.continent_code.as_deref(), |v| {
            if CONTINENT_CODES.contains(&v) {
                Ok(())
            } else {
                Err(format!(
                    "continent_code must be one of {}",
                    CONTINENT_CODES.join(", ")
                ))
            }
        })?;
        check_optional("phone_prefix", self.phone_prefix.as_deref(), |v| {
            if PHONE_PREFIX.is_match(v) {
                Ok(())
            } else {
                Err("phone_prefix must look like +1 to +9999".to_string())
            }
        })
    }
}

impl ReferenceEntity for Country {
    const KIND: EntityKind = EntityKind::Country;

    fn code(&self) -> &str {
        &self.country_code
    }

    fn references(&self) -> Vec<RowReference> {
        let mut refs = Vec::new();
        if let Some(id) = non_empty(&self.region_id) {
            refs.push(RowReference::new("region_id", EntityKind::Region, id));
        }
        if let Some(id) = non_empty(&self.primary_language_id) {
            refs.push(RowReference::new(
                "primary_language_id",
                EntityKind::Language,
                id,
            ));
        }
        refs
    }

    fn into_payload(self) -> EventPayload {
        EventPayload::Country(self)
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn united_states() -> Country {
        Country::new("US", "United States")
            .with_iso3("USA")
            .with_continent("NA")
            .with_phone_prefix("+1")
            .with_capital("Washington, D.C.")
    }

    #[test]
    fn valid_country_passes() {
        assert!(united_states().validate().is_ok());
        assert!(Country::new("FR", "France").validate().is_ok());
    }

    #[test]
    fn country_code_format() {
        let err = Country::new("us", "United States").validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.field.as_deref(), Some("country_code"));

        let err = Country::new("USA", "United States").validate().unwrap_err();
        assert_eq!(err.message, "country_code must be exactly 2 characters");

        let err = Country::new("", "United States").validate().unwrap_err();
        assert_eq!(err.message, "country_code is required");
    }

    #[test]
    fn country_name_rules() {
        let err = Country::new("US", "U").validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("country_name"));

        let err = Country::new("US", "United  States").validate().unwrap_err();
        assert_eq!(err.message, "country_name cannot contain double spaces");
    }

    #[test]
    fn optional_formats() {
        let err = united_states().with_iso3("US1").validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("iso3_code"));

        let err = united_states().with_continent("XX").validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("continent_code"));

        let err = united_states().with_phone_prefix("+0").validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("phone_prefix"));

        assert!(united_states().with_phone_prefix("+1268").validate().is_ok());
    }

    #[test]
    fn references_skip_empty_ids() {
        assert!(Country::new("US", "United States").references().is_empty());

        let country = Country::new("US", "United States")
            .with_region("r-1")
            .with_primary_language("");
        let refs = country.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].column, "region_id");
        assert_eq!(refs[0].kind, EntityKind::Region);
    }
}
