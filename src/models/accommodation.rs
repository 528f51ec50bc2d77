use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::budget::Budget;
use super::destination::{same_city, Destination};
use super::flight::Travelers;
use crate::error::{MemoryError, MemoryResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedFilters {
    pub meal_plan: Option<String>,
    pub views: Vec<String>,
    pub services: Vec<String>,
    pub accessibility: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub adults: u8,
    pub children: u8,
}

/// Accommodation search settings for one destination of the trip.
///
/// # Budget protection
/// `user_modified_budget` is `Some(true)` only when the budget fields were last
/// written by an explicit user action on this entry. Entries created from the
/// collection defaults leave it unset, and propagated writes never touch an
/// entry where it is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccommodationEntry {
    pub id: Uuid,
    pub city: String,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    #[serde(flatten)]
    pub budget: Budget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_modified_budget: Option<bool>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub min_rating: Option<u8>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub advanced_filters: AdvancedFilters,
}

impl AccommodationEntry {
    /// Fresh entry with a new identity and the given starting budget.
    /// The override flag is always left unset.
    pub fn new(destination: &Destination, budget: Budget) -> Self {
        Self {
            id: Uuid::new_v4(),
            city: destination.city.clone(),
            country: destination.country.clone(),
            country_code: destination.country_code.clone(),
            check_in: None,
            check_out: None,
            budget,
            user_modified_budget: None,
            types: Vec::new(),
            min_rating: None,
            amenities: Vec::new(),
            advanced_filters: AdvancedFilters::default(),
        }
    }

    pub fn is_budget_protected(&self) -> bool {
        self.user_modified_budget == Some(true)
    }

    pub fn validate(&self) -> MemoryResult<()> {
        self.budget.validate()?;
        if let (Some(check_in), Some(check_out)) = (self.check_in, self.check_out) {
            if check_out < check_in {
                return Err(MemoryError::validation(format!(
                    "check-out {} is before check-in {} in {}",
                    check_out, check_in, self.city
                )));
            }
        }
        if let Some(rating) = self.min_rating {
            if rating > 5 {
                return Err(MemoryError::validation(format!(
                    "min rating {} is outside 0-5",
                    rating
                )));
            }
        }
        Ok(())
    }
}

/// Partial update of an entry's search filters and stay dates.
///
/// Budget fields are deliberately absent: budget goes through the budget
/// operations so the override flag stays truthful.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccommodationPatch {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub types: Option<Vec<String>>,
    pub min_rating: Option<u8>,
    pub amenities: Option<Vec<String>>,
    pub advanced_filters: Option<AdvancedFilters>,
}

/// Persisted accommodation state: one entry per destination plus the defaults
/// new entries start from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AccommodationMemory {
    pub accommodations: Vec<AccommodationEntry>,
    pub active_accommodation_index: usize,
    pub use_auto_rooms: bool,
    pub custom_rooms: Vec<Room>,
    pub default_budget: Budget,
    /// Entry whose user-set budget most recently became the default template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_source_id: Option<Uuid>,
}

impl Default for AccommodationMemory {
    fn default() -> Self {
        Self {
            accommodations: Vec::new(),
            active_accommodation_index: 0,
            use_auto_rooms: true,
            custom_rooms: Vec::new(),
            default_budget: Budget::default(),
            default_source_id: None,
        }
    }
}

impl AccommodationMemory {
    pub fn validate(&self) -> MemoryResult<()> {
        self.default_budget.validate()?;
        if !self.accommodations.is_empty()
            && self.active_accommodation_index >= self.accommodations.len()
        {
            return Err(MemoryError::validation(format!(
                "active index {} out of range for {} entries",
                self.active_accommodation_index,
                self.accommodations.len()
            )));
        }
        for (i, entry) in self.accommodations.iter().enumerate() {
            entry.validate()?;
            if self.accommodations[..i].iter().any(|e| e.id == entry.id) {
                return Err(MemoryError::validation(format!(
                    "duplicate accommodation id {}",
                    entry.id
                )));
            }
        }
        for room in &self.custom_rooms {
            if room.adults < 1 {
                return Err(MemoryError::validation("every room needs an adult"));
            }
        }
        Ok(())
    }

    pub fn active(&self) -> Option<&AccommodationEntry> {
        self.accommodations.get(self.active_accommodation_index)
    }

    pub fn get(&self, id: Uuid) -> Option<&AccommodationEntry> {
        self.accommodations.iter().find(|e| e.id == id)
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.accommodations.iter().position(|e| e.id == id)
    }

    pub fn find_by_city(&self, city: &str) -> Option<&AccommodationEntry> {
        self.accommodations.iter().find(|e| same_city(&e.city, city))
    }

    /// Index of the entry an operation targets: the given id, or the active
    /// entry when no id is given.
    pub fn resolve_target(&self, target: Option<Uuid>) -> MemoryResult<usize> {
        match target {
            Some(id) => self
                .position(id)
                .ok_or_else(|| MemoryError::not_found(format!("accommodation {}", id))),
            None if self.accommodations.is_empty() => {
                Err(MemoryError::not_found("no accommodation entries"))
            }
            None => Ok(self.active_accommodation_index),
        }
    }

    pub fn set_active(&mut self, index: usize) -> MemoryResult<()> {
        if index >= self.accommodations.len() {
            return Err(MemoryError::validation(format!(
                "index {} out of range for {} entries",
                index,
                self.accommodations.len()
            )));
        }
        self.active_accommodation_index = index;
        Ok(())
    }

    pub fn apply_patch(&mut self, index: usize, patch: AccommodationPatch) {
        let entry = &mut self.accommodations[index];
        if let Some(check_in) = patch.check_in {
            entry.check_in = Some(check_in);
        }
        if let Some(check_out) = patch.check_out {
            entry.check_out = Some(check_out);
        }
        if let Some(types) = patch.types {
            entry.types = types;
        }
        if let Some(rating) = patch.min_rating {
            entry.min_rating = Some(rating);
        }
        if let Some(amenities) = patch.amenities {
            entry.amenities = amenities;
        }
        if let Some(filters) = patch.advanced_filters {
            entry.advanced_filters = filters;
        }
    }

    /// Drops an entry and keeps the active index pointing at a live entry.
    pub fn remove_at(&mut self, index: usize) -> AccommodationEntry {
        let removed = self.accommodations.remove(index);
        if self.default_source_id == Some(removed.id) {
            self.default_source_id = None;
        }
        if self.active_accommodation_index > index
            || self.active_accommodation_index >= self.accommodations.len()
        {
            self.active_accommodation_index = self.active_accommodation_index.saturating_sub(1);
        }
        removed
    }

    /// Rooms to search with. Auto mode packs two adults per room and spreads
    /// children over those rooms.
    pub fn effective_rooms(&self, travelers: &Travelers) -> Vec<Room> {
        if !self.use_auto_rooms && !self.custom_rooms.is_empty() {
            return self.custom_rooms.clone();
        }
        let adults = travelers.adults.max(1);
        let count = adults.div_ceil(2);
        (0..count)
            .map(|i| {
                let room_adults = if i + 1 == count && adults % 2 == 1 { 1 } else { 2 };
                let children = travelers.children / count + u8::from(i < travelers.children % count);
                Room {
                    adults: room_adults,
                    children,
                }
            })
            .collect()
    }
}
