use serde::{Deserialize, Serialize};

/// A city the trip visits. Accommodation entries are keyed by this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

impl Destination {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: None,
            country_code: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>, code: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self.country_code = Some(code.into());
        self
    }

    pub fn matches_city(&self, city: &str) -> bool {
        same_city(&self.city, city)
    }
}

/// City names compare case- and whitespace-insensitively.
pub fn same_city(a: &str, b: &str) -> bool {
    normalize_city(a) == normalize_city(b)
}

pub fn normalize_city(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Kind of place returned by the location lookup service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    City,
    Airport,
    Region,
    Country,
}

/// One ranked candidate from a city/airport lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationCandidate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LocationKind,
    pub country_code: String,
    #[serde(default)]
    pub country: Option<String>,
    /// City the airport serves; for city candidates this is `name`.
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub iata: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

impl LocationCandidate {
    pub fn city_name(&self) -> &str {
        self.city.as_deref().unwrap_or(&self.name)
    }
}
