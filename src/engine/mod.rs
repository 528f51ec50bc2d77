//! The travel memory engine.
//!
//! [`MemoryEngine`] is the one object that owns the four memory stores for an
//! application session. UI widgets, the chat pipeline and lookup results all
//! mutate through it, so every cross-store rule runs inside the call that
//! triggered it:
//!
//! - passengers and travelers are written together, in either direction;
//! - destination changes re-run the accommodation lifecycle;
//! - budget writes go through the propagation rules, which never overwrite a
//!   user-set budget.

mod chat;
pub mod lifecycle;
pub mod preferences;
pub mod propagation;
pub mod requests;
pub mod resolver;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::{DocumentStore, MemoryStorage};
use crate::error::{MemoryError, MemoryResult};
use crate::memory::{MemoryChange, MemoryDomain, Store};
use crate::models::*;

pub use chat::{ChatOutcome, ChatStatus};
use propagation::{Mutation, RuleContext, Trigger};
pub use requests::{RequestChannel, RequestGuard, RequestTicket};
pub use resolver::{Completeness, Resolution};

const EVENT_CAPACITY: usize = 256;

/// Receives control actions (`trigger_search`, `delegate_choice`) resolved
/// from chat.
pub trait ControlActionSink: Send {
    fn dispatch(&mut self, action: ControlAction);
}

impl<F> ControlActionSink for F
where
    F: FnMut(ControlAction) + Send,
{
    fn dispatch(&mut self, action: ControlAction) {
        self(action)
    }
}

/// Read-only copy of every memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub flight: FlightMemory,
    pub accommodation: AccommodationMemory,
    pub travel: TravelMemory,
    pub negative_preferences: NegativePreferencesMemory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupOutcome {
    Applied,
    /// A newer lookup on the same channel was issued; result discarded.
    Stale,
    NoCandidates,
}

pub struct MemoryEngine {
    flight: Store<FlightMemory>,
    accommodation: Store<AccommodationMemory>,
    travel: Store<TravelMemory>,
    negative: Store<NegativePreferencesMemory>,
    events: broadcast::Sender<MemoryChange>,
    requests: RequestGuard,
    action_sink: Option<Box<dyn ControlActionSink>>,
}

impl MemoryEngine {
    /// Loads every memory from `storage` and repairs traveler divergence left
    /// by a previous session.
    pub fn load(storage: Arc<dyn DocumentStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut engine = Self {
            flight: Store::load(storage.clone(), events.clone()),
            accommodation: Store::load(storage.clone(), events.clone()),
            travel: Store::load(storage.clone(), events.clone()),
            negative: Store::load(storage, events.clone()),
            events,
            requests: RequestGuard::new(),
            action_sink: None,
        };

        let passengers = engine.flight.state().passengers;
        if engine.travel.state().travelers != passengers {
            tracing::warn!("Travel memory diverged from flight passengers; realigning");
            if let Err(e) = engine.travel.mutate(|t| {
                t.travelers = passengers;
                Ok(())
            }) {
                tracing::warn!("Failed to realign travelers: {}", e);
            }
        }

        tracing::info!(
            "Memory engine loaded: {} accommodations, {} negative preferences",
            engine.accommodation.state().accommodations.len(),
            engine.negative.state().preferences.len()
        );
        engine
    }

    /// Engine over volatile storage.
    pub fn in_memory() -> Self {
        Self::load(Arc::new(MemoryStorage::new()))
    }

    pub fn set_action_sink(&mut self, sink: Box<dyn ControlActionSink>) {
        self.action_sink = Some(sink);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryChange> {
        self.events.subscribe()
    }

    // ============================================================
    // Reads
    // ============================================================

    pub fn flight(&self) -> &FlightMemory {
        self.flight.state()
    }

    pub fn accommodation(&self) -> &AccommodationMemory {
        self.accommodation.state()
    }

    pub fn active_accommodation(&self) -> Option<&AccommodationEntry> {
        self.accommodation.state().active()
    }

    pub fn travel(&self) -> &TravelMemory {
        self.travel.state()
    }

    pub fn negative_preferences(&self) -> &NegativePreferencesMemory {
        self.negative.state()
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            flight: self.flight.state().clone(),
            accommodation: self.accommodation.state().clone(),
            travel: self.travel.state().clone(),
            negative_preferences: self.negative.state().clone(),
        }
    }

    pub fn revision(&self, domain: MemoryDomain) -> u64 {
        match domain {
            MemoryDomain::Flight => self.flight.revision(),
            MemoryDomain::Accommodation => self.accommodation.revision(),
            MemoryDomain::Travel => self.travel.revision(),
            MemoryDomain::NegativePreferences => self.negative.revision(),
        }
    }

    /// Serialized document of one memory, as persisted.
    pub fn serialize(&self, domain: MemoryDomain) -> MemoryResult<String> {
        match domain {
            MemoryDomain::Flight => self.flight.serialize(),
            MemoryDomain::Accommodation => self.accommodation.serialize(),
            MemoryDomain::Travel => self.travel.serialize(),
            MemoryDomain::NegativePreferences => self.negative.serialize(),
        }
    }

    pub fn completeness(&self) -> Completeness {
        let flight = self.flight.state();
        Completeness {
            destination: flight.has_destination(),
            dates: flight.has_dates(),
            return_date_missing: flight.needs_return_date(),
            travelers: self.travel.state().travelers_confirmed,
        }
    }

    // ============================================================
    // Flight & travelers
    // ============================================================

    /// Partial flight update. Passengers are mirrored into the travel memory;
    /// itinerary changes re-run the accommodation lifecycle.
    pub fn update_flight(&mut self, patch: FlightPatch) -> MemoryResult<()> {
        let passengers = patch.passengers;
        if let Some(p) = &passengers {
            p.validate()?;
        }
        let resync = patch.touches_destinations() || patch.touches_dates();

        let apply = |f: &mut FlightMemory| {
            f.apply_patch(patch);
            Ok(())
        };
        if resync {
            self.change_itinerary(apply)?;
        } else {
            self.flight.mutate(apply)?;
        }

        if let Some(p) = passengers {
            self.propagate(Trigger::PassengersSet(p))?;
        }
        Ok(())
    }

    /// Sets flight passengers and trip travelers in one operation.
    pub fn set_passengers(&mut self, travelers: Travelers) -> MemoryResult<()> {
        travelers.validate()?;
        self.flight.mutate(|f| {
            f.passengers = travelers;
            Ok(())
        })?;
        self.propagate(Trigger::PassengersSet(travelers))
    }

    /// Travel memory update. Travelers set here are mirrored into the flight
    /// passengers.
    pub fn update_travel(&mut self, patch: TravelPatch) -> MemoryResult<()> {
        let travelers = patch.travelers;
        if let Some(t) = &travelers {
            t.validate()?;
        }
        self.travel.mutate(|t| {
            t.apply_patch(patch);
            Ok(())
        })?;
        if let Some(t) = travelers {
            self.propagate(Trigger::TravelersSet(t))?;
        }
        Ok(())
    }

    pub fn set_trip_type(&mut self, trip_type: TripType) -> MemoryResult<()> {
        self.change_itinerary(|f| {
            f.set_trip_type(trip_type);
            Ok(())
        })
    }

    /// Adds a stay. Returns the id of the city's accommodation entry, which is
    /// the existing one when the city was already part of the trip. Returns
    /// `None` when the city is the departure of a multi-destination trip: the
    /// leg home gets no accommodation.
    pub fn add_destination(
        &mut self,
        destination: Destination,
        date: Option<NaiveDate>,
    ) -> MemoryResult<Option<Uuid>> {
        if destination.city.trim().is_empty() {
            return Err(MemoryError::validation("destination city is empty"));
        }
        self.change_itinerary(|f| {
            f.add_destination(&destination, date);
            Ok(())
        })?;
        Ok(self
            .accommodation
            .state()
            .find_by_city(&destination.city)
            .map(|e| e.id))
    }

    /// Removes a stay, its flight legs and its accommodation entry.
    pub fn remove_destination(&mut self, city: &str) -> MemoryResult<bool> {
        if !self.flight.state().destinations().iter().any(|d| d.matches_city(city)) {
            return Ok(false);
        }
        self.change_itinerary(|f| Ok(f.remove_destination(city)))?;
        Ok(true)
    }

    /// Applies `f` to the flight and runs the accommodation lifecycle against
    /// the result. Both drafts are validated before either store commits, so a
    /// rejected accommodation draft leaves the flight untouched as well.
    fn change_itinerary<R>(
        &mut self,
        f: impl FnOnce(&mut FlightMemory) -> MemoryResult<R>,
    ) -> MemoryResult<R> {
        let (flight, out) = self.flight.draft(f)?;
        let (accommodation, _) = self.accommodation.draft(|acc| {
            lifecycle::sync_destinations(acc, &flight);
            Ok(())
        })?;

        self.flight.commit(flight);
        if &accommodation != self.accommodation.state() {
            self.accommodation.commit(accommodation);
        }
        Ok(out)
    }

    // ============================================================
    // Accommodation
    // ============================================================

    pub fn set_active_accommodation(&mut self, index: usize) -> MemoryResult<()> {
        self.accommodation.mutate(|acc| acc.set_active(index))
    }

    /// Updates filters or stay dates of an entry (the active one when
    /// `target` is `None`). Returns the entry id.
    pub fn update_accommodation(
        &mut self,
        target: Option<Uuid>,
        patch: AccommodationPatch,
    ) -> MemoryResult<Uuid> {
        self.accommodation.mutate(|acc| {
            let index = acc.resolve_target(target)?;
            acc.apply_patch(index, patch);
            Ok(acc.accommodations[index].id)
        })
    }

    pub fn set_room_mode(&mut self, use_auto_rooms: bool, custom_rooms: Vec<Room>) -> MemoryResult<()> {
        self.accommodation.mutate(|acc| {
            acc.use_auto_rooms = use_auto_rooms;
            acc.custom_rooms = custom_rooms;
            Ok(())
        })
    }

    pub fn effective_rooms(&self) -> Vec<Room> {
        self.accommodation
            .state()
            .effective_rooms(&self.travel.state().travelers)
    }

    /// Explicit user choice of a budget tier for one entry (the active entry
    /// when `target` is `None`). Marks the entry as user-modified.
    pub fn set_budget_preset(
        &mut self,
        preset: BudgetPreset,
        target: Option<Uuid>,
    ) -> MemoryResult<Uuid> {
        self.set_user_budget(Budget::from_preset(preset)?, target)
    }

    /// Explicit price range typed by the user. Marks the entry as user-modified.
    pub fn set_custom_budget(
        &mut self,
        price_min: u32,
        price_max: Option<u32>,
        target: Option<Uuid>,
    ) -> MemoryResult<Uuid> {
        self.set_user_budget(Budget::custom(price_min, price_max)?, target)
    }

    /// The only write path that sets `user_modified_budget`.
    ///
    /// The target becomes the default source when it is the active entry or
    /// already was the default source; defaults then follow it.
    pub fn set_user_budget(&mut self, budget: Budget, target: Option<Uuid>) -> MemoryResult<Uuid> {
        budget.validate()?;
        self.accommodation.mutate(|acc| {
            let index = acc.resolve_target(target)?;
            let entry = &mut acc.accommodations[index];
            entry.budget = budget;
            entry.user_modified_budget = Some(true);
            let entry_id = entry.id;
            tracing::debug!("User set {} budget on {}", budget.budget_preset.as_str(), entry.city);

            let default_source = index == acc.active_accommodation_index
                || acc.default_source_id == Some(entry_id);
            let mutations = propagation::evaluate(
                &Trigger::UserBudgetSet {
                    entry_id,
                    budget,
                    default_source,
                },
                &RuleContext { accommodation: &*acc },
            );
            propagation::apply_to_accommodation(acc, &mutations);
            Ok(entry_id)
        })
    }

    /// Trip-wide budget: becomes the default for new entries and is
    /// propagated to every entry the user has not set by hand.
    pub fn set_default_budget(&mut self, budget: Budget) -> MemoryResult<()> {
        budget.validate()?;
        self.propagate(Trigger::DefaultBudgetSet(budget))
    }

    // ============================================================
    // Preferences
    // ============================================================

    /// A `preferences:updated` event. Only chat-sourced updates that touch
    /// comfort, style or must-haves move hotel budgets. Returns the budget
    /// that was propagated, if any.
    pub fn apply_preferences(&mut self, update: &PreferenceUpdate) -> MemoryResult<Option<Budget>> {
        let applies = update.origin == UpdateOrigin::Chat && update.touches_budget_signals();
        self.propagate(Trigger::PreferencesUpdated(update))?;
        Ok(if applies {
            preferences::budget_for(update)
        } else {
            None
        })
    }

    /// Explicit `preferences:applyToHotels` request.
    pub fn apply_preferences_to_hotels(
        &mut self,
        update: &PreferenceUpdate,
    ) -> MemoryResult<Option<Budget>> {
        self.propagate(Trigger::ApplyPreferencesToHotels(update))?;
        Ok(preferences::budget_for(update))
    }

    // ============================================================
    // Negative preferences
    // ============================================================

    /// Returns `None` for a duplicate, which is not an error and writes nothing.
    pub fn add_negative_preference(
        &mut self,
        input: AddNegativePreferenceInput,
    ) -> MemoryResult<Option<Uuid>> {
        if self.negative.state().is_avoided(input.category, &input.value) {
            return Ok(None);
        }
        self.negative.mutate(|n| n.add(input, Utc::now()))
    }

    pub fn remove_negative_preference(&mut self, id: Uuid) -> MemoryResult<bool> {
        if !self.negative.state().preferences.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        self.negative.mutate(|n| Ok(n.remove(id)))
    }

    pub fn clear_negative_preferences(&mut self) {
        self.negative.reset();
    }

    // ============================================================
    // Async lookups
    // ============================================================

    /// Starts a request on `channel`, superseding any request in flight there.
    pub fn begin_request(&mut self, channel: RequestChannel) -> RequestTicket {
        self.requests.issue(channel)
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.requests.is_current(ticket)
    }

    /// Applies the top candidate of a location lookup, unless a newer lookup
    /// on the same channel was issued meanwhile.
    pub fn complete_lookup(
        &mut self,
        ticket: RequestTicket,
        candidates: &[LocationCandidate],
    ) -> MemoryResult<LookupOutcome> {
        if !self.requests.is_current(&ticket) {
            tracing::warn!("Discarding stale lookup result for {:?}", ticket.channel);
            return Ok(LookupOutcome::Stale);
        }
        let Some(top) = candidates.first() else {
            return Ok(LookupOutcome::NoCandidates);
        };
        let airport = Airport::from(top);

        match ticket.channel {
            RequestChannel::Departure => self.update_flight(FlightPatch {
                departure: Some(airport),
                ..Default::default()
            })?,
            RequestChannel::Arrival => self.update_flight(FlightPatch {
                arrival: Some(airport),
                ..Default::default()
            })?,
            RequestChannel::Leg(index) => {
                self.change_itinerary(|f| {
                    let leg = f
                        .legs
                        .get_mut(index)
                        .ok_or_else(|| MemoryError::not_found(format!("flight leg {}", index)))?;
                    leg.to = airport.clone();
                    if let Some(next) = f.legs.get_mut(index + 1) {
                        next.from = Some(airport);
                    }
                    Ok(())
                })?;
            }
            RequestChannel::Chat => {
                return Err(MemoryError::validation(
                    "chat tickets cannot complete a location lookup",
                ))
            }
        }
        Ok(LookupOutcome::Applied)
    }

    // ============================================================
    // Reset
    // ============================================================

    /// Resets one memory while keeping travelers consistent and accommodations
    /// in line with the itinerary.
    pub fn reset(&mut self, domain: MemoryDomain) -> MemoryResult<()> {
        tracing::info!("Resetting {} memory", domain.as_str());
        match domain {
            MemoryDomain::Flight => {
                self.change_itinerary(|f| {
                    *f = FlightMemory::default();
                    Ok(())
                })?;
                let passengers = self.flight.state().passengers;
                self.propagate(Trigger::PassengersSet(passengers))?;
            }
            MemoryDomain::Accommodation => {
                let flight = self.flight.state();
                self.accommodation.mutate(|acc| {
                    *acc = AccommodationMemory::default();
                    lifecycle::sync_destinations(acc, flight);
                    Ok(())
                })?;
            }
            MemoryDomain::Travel => {
                let passengers = self.flight.state().passengers;
                self.travel.mutate(|t| {
                    *t = TravelMemory {
                        travelers: passengers,
                        ..Default::default()
                    };
                    Ok(())
                })?;
            }
            MemoryDomain::NegativePreferences => self.negative.reset(),
        }
        Ok(())
    }

    pub fn reset_all(&mut self) {
        tracing::info!("Resetting all memories");
        self.flight.reset();
        self.accommodation.reset();
        self.travel.reset();
        self.negative.reset();
    }

    // ============================================================
    // Propagation
    // ============================================================

    /// Evaluates the rule table for `trigger` and applies the result with at
    /// most one write per affected store.
    fn propagate(&mut self, trigger: Trigger<'_>) -> MemoryResult<()> {
        let mutations = propagation::evaluate(
            &trigger,
            &RuleContext {
                accommodation: self.accommodation.state(),
            },
        );

        if propagation::touches_accommodation(&mutations) {
            self.accommodation.mutate(|acc| {
                propagation::apply_to_accommodation(acc, &mutations);
                Ok(())
            })?;
        }

        for mutation in &mutations {
            match *mutation {
                Mutation::Travelers(t) => self.travel.mutate(|travel| {
                    travel.travelers = t;
                    travel.travelers_confirmed = true;
                    Ok(())
                })?,
                Mutation::Passengers(t) => {
                    if self.flight.state().passengers != t {
                        self.flight.mutate(|f| {
                            f.passengers = t;
                            Ok(())
                        })?
                    }
                }
                Mutation::EntryBudget { .. } | Mutation::Defaults { .. } => {}
            }
        }
        Ok(())
    }

    fn dispatch_action(&mut self, action: ControlAction) {
        tracing::info!("Dispatching control action {:?}", action);
        if let Some(sink) = self.action_sink.as_mut() {
            sink.dispatch(action);
        }
    }
}
