use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MemoryError, MemoryResult};

/// Oldest entries are evicted beyond this many.
pub const MAX_NEGATIVE_PREFERENCES: usize = 100;
/// Entries older than this are dropped when the memory is loaded.
pub const NEGATIVE_PREFERENCE_MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NegativeCategory {
    Destination,
    Airline,
    Hotel,
    Activity,
    Timing,
    Budget,
    Style,
    Food,
    Transport,
    General,
}

impl NegativeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Destination => "destination",
            Self::Airline => "airline",
            Self::Hotel => "hotel",
            Self::Activity => "activity",
            Self::Timing => "timing",
            Self::Budget => "budget",
            Self::Style => "style",
            Self::Food => "food",
            Self::Transport => "transport",
            Self::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "destination" => Some(Self::Destination),
            "airline" => Some(Self::Airline),
            "hotel" => Some(Self::Hotel),
            "activity" => Some(Self::Activity),
            "timing" => Some(Self::Timing),
            "budget" => Some(Self::Budget),
            "style" => Some(Self::Style),
            "food" => Some(Self::Food),
            "transport" => Some(Self::Transport),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// Whether the user said it outright or it was inferred from behaviour.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceSource {
    #[default]
    Explicit,
    Implicit,
}

/// Something the traveller does not want.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NegativePreference {
    pub id: Uuid,
    pub category: NegativeCategory,
    /// Trimmed, lowercased.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub source: PreferenceSource,
}

/// Input for recording a negative preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNegativePreferenceInput {
    pub category: NegativeCategory,
    pub value: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub source: PreferenceSource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NegativePreferencesMemory {
    pub preferences: Vec<NegativePreference>,
}

pub fn normalize_value(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl NegativePreferencesMemory {
    pub fn validate(&self) -> MemoryResult<()> {
        if self.preferences.len() > MAX_NEGATIVE_PREFERENCES {
            return Err(MemoryError::validation(format!(
                "{} negative preferences exceed the cap of {}",
                self.preferences.len(),
                MAX_NEGATIVE_PREFERENCES
            )));
        }
        Ok(())
    }

    /// Records a preference. Returns `None` when the (category, value) pair is
    /// already known; duplicates are not an error.
    pub fn add(
        &mut self,
        input: AddNegativePreferenceInput,
        now: DateTime<Utc>,
    ) -> MemoryResult<Option<Uuid>> {
        let value = normalize_value(&input.value);
        if value.is_empty() {
            return Err(MemoryError::validation("negative preference value is empty"));
        }
        if self.is_avoided(input.category, &value) {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        self.preferences.push(NegativePreference {
            id,
            category: input.category,
            value,
            reason: input.reason.filter(|r| !r.trim().is_empty()),
            timestamp: now,
            source: input.source,
        });
        if self.preferences.len() > MAX_NEGATIVE_PREFERENCES {
            self.preferences.sort_by_key(|p| p.timestamp);
            let excess = self.preferences.len() - MAX_NEGATIVE_PREFERENCES;
            self.preferences.drain(..excess);
        }
        Ok(Some(id))
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.preferences.len();
        self.preferences.retain(|p| p.id != id);
        self.preferences.len() != before
    }

    pub fn is_avoided(&self, category: NegativeCategory, value: &str) -> bool {
        let value = normalize_value(value);
        self.preferences
            .iter()
            .any(|p| p.category == category && p.value == value)
    }

    /// Drops stale entries and enforces the size cap. Returns how many were dropped.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.preferences.len();
        let cutoff = now - Duration::days(NEGATIVE_PREFERENCE_MAX_AGE_DAYS);
        self.preferences.retain(|p| p.timestamp >= cutoff);
        if self.preferences.len() > MAX_NEGATIVE_PREFERENCES {
            self.preferences.sort_by_key(|p| p.timestamp);
            let excess = self.preferences.len() - MAX_NEGATIVE_PREFERENCES;
            self.preferences.drain(..excess);
        }
        before - self.preferences.len()
    }

    /// One line per category, for inclusion in the chat model's context.
    pub fn summary(&self) -> String {
        let mut categories: Vec<NegativeCategory> = Vec::new();
        for p in &self.preferences {
            if !categories.contains(&p.category) {
                categories.push(p.category);
            }
        }
        categories
            .iter()
            .map(|category| {
                let values: Vec<&str> = self
                    .preferences
                    .iter()
                    .filter(|p| p.category == *category)
                    .map(|p| p.value.as_str())
                    .collect();
                format!("Avoid {}: {}", category.as_str(), values.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
