//! Accommodation entries follow the trip's destinations.
//!
//! The desired destination set comes from the flight itinerary. Entries whose
//! city left the trip are removed, new cities get a fresh entry seeded from
//! the collection defaults, and every other entry keeps its id, flags and
//! filters. A city that comes back after removal is a new entry: nothing of
//! the removed entry is restored.

use uuid::Uuid;

use crate::models::{AccommodationEntry, AccommodationMemory, FlightMemory};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    pub created: Vec<Uuid>,
    pub removed: Vec<Uuid>,
}

impl LifecycleReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty()
    }
}

/// Brings `accommodation` in line with the destinations of `flight`.
pub fn sync_destinations(
    accommodation: &mut AccommodationMemory,
    flight: &FlightMemory,
) -> LifecycleReport {
    let desired = flight.destinations();
    let mut report = LifecycleReport::default();
    let active_id = accommodation.active().map(|e| e.id);

    let mut i = 0;
    while i < accommodation.accommodations.len() {
        let city = &accommodation.accommodations[i].city;
        if desired.iter().any(|d| d.matches_city(city)) {
            i += 1;
        } else {
            let removed = accommodation.remove_at(i);
            tracing::info!("Removed accommodation for {} ({})", removed.city, removed.id);
            report.removed.push(removed.id);
        }
    }

    for destination in &desired {
        if accommodation.find_by_city(&destination.city).is_some() {
            continue;
        }
        let mut entry = AccommodationEntry::new(destination, accommodation.default_budget);
        let (check_in, check_out) = flight.stay_dates(&destination.city);
        entry.check_in = check_in;
        entry.check_out = check_out;
        tracing::info!(
            "Created accommodation for {} ({}) with {} budget",
            entry.city,
            entry.id,
            entry.budget.budget_preset.as_str()
        );
        report.created.push(entry.id);
        accommodation.accommodations.push(entry);
    }

    // Existing entries only gain dates they never had.
    for entry in accommodation.accommodations.iter_mut() {
        if entry.check_in.is_some() && entry.check_out.is_some() {
            continue;
        }
        let (check_in, check_out) = flight.stay_dates(&entry.city);
        if entry.check_in.is_none() && (entry.check_out.is_none() || check_in <= entry.check_out) {
            entry.check_in = check_in;
        }
        if entry.check_out.is_none() && check_out >= entry.check_in {
            entry.check_out = check_out;
        }
    }

    accommodation.accommodations.sort_by_key(|e| {
        desired
            .iter()
            .position(|d| d.matches_city(&e.city))
            .unwrap_or(usize::MAX)
    });
    accommodation.active_accommodation_index = active_id
        .and_then(|id| accommodation.position(id))
        .unwrap_or(0);

    report
}
