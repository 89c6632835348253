use std::fmt;

use serde::{Deserialize, Serialize};

/// The reference-data entity types managed by the stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Country,
    Region,
    Language,
}

impl EntityKind {
    /// Human-readable name, also used as the prefix of event types (`CountryCreated`).
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Country => "Country",
            EntityKind::Region => "Region",
            EntityKind::Language => "Language",
        }
    }

    /// Collection (table) name used as the storage key prefix.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Country => "countries",
            EntityKind::Region => "regions",
            EntityKind::Language => "languages",
        }
    }

    /// Column holding the business code that must be unique per tenant.
    pub fn code_field(&self) -> &'static str {
        match self {
            EntityKind::Country => "country_code",
            EntityKind::Region => "region_code",
            EntityKind::Language => "language_code",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
