//! Geopolitical reference entities and their validation rules.

mod country;
mod language;
mod region;

pub use country::{Country, CONTINENT_CODES};
pub use language::{Language, TextDirection};
pub use region::Region;
