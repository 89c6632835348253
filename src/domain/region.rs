use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::country::non_empty;
use crate::entity_kind::EntityKind;
use crate::error::ClassifiedError;
use crate::outbox::EventPayload;
use crate::store::{FieldSpec, ReferenceEntity, RowReference, Validate};

static REGION_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9-]+$").expect("valid region code regex"));

/// Geographic or political grouping of countries; may nest under a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub region_code: String,
    pub region_name: String,
    pub region_type: Option<String>,
    pub parent_region_id: Option<String>,
}

impl Region {
    /// A region with only the required fields set.
    pub fn new(region_code: impl Into<String>, region_name: impl Into<String>) -> Self {
        Self {
            region_code: region_code.into(),
            region_name: region_name.into(),
            region_type: None,
            parent_region_id: None,
        }
    }

    pub fn with_type(mut self, region_type: impl Into<String>) -> Self {
        self.region_type = Some(region_type.into());
        self
    }

    /// Nest under the region with entity id `parent_region_id`.
    pub fn with_parent(mut self, parent_region_id: impl Into<String>) -> Self {
        self.parent_region_id = Some(parent_region_id.into());
        self
    }
}

impl Validate for Region {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("region_code", 1, 10),
        FieldSpec::required("region_name", 1, 100),
        FieldSpec::optional("region_type", 20),
    ];

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "region_code" => Some(&self.region_code),
            "region_name" => Some(&self.region_name),
            "region_type" => self.region_type.as_deref(),
            _ => None,
        }
    }

    fn check_rules(&self) -> Result<(), ClassifiedError> {
        if !REGION_CODE.is_match(&self.region_code) {
            return Err(ClassifiedError::validation(
                "region_code",
                "region_code may only contain uppercase letters, digits and dashes",
            ));
        }
        Ok(())
    }
}

impl ReferenceEntity for Region {
    const KIND: EntityKind = EntityKind::Region;

    fn code(&self) -> &str {
        &self.region_code
    }

    fn references(&self) -> Vec<RowReference> {
        non_empty(&self.parent_region_id)
            .map(|id| RowReference::new("parent_region_id", EntityKind::Region, id))
            .into_iter()
            .collect()
    }

    fn into_payload(self) -> EventPayload {
        EventPayload::Region(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_codes() {
        assert!(Region::new("EU", "Europe").validate().is_ok());
        assert!(Region::new("EU-WEST", "Western Europe").validate().is_ok());

        let err = Region::new("eu", "Europe").validate().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("region_code"));

        let err = Region::new("EUROPE-WEST", "Western Europe")
            .validate()
            .unwrap_err();
        assert_eq!(err.message, "region_code must be 1-10 characters");
    }

    #[test]
    fn region_type_length() {
        let err = Region::new("EU", "Europe")
            .with_type("a-very-long-region-type")
            .validate()
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("region_type"));
    }

    #[test]
    fn parent_is_a_reference() {
        let refs = Region::new("EU-WEST", "Western Europe")
            .with_parent("r-eu")
            .references();
        assert_eq!(
            refs,
            vec![RowReference::new("parent_region_id", EntityKind::Region, "r-eu")]
        );
    }
}
