//! Applying a classified chat message to the memories.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::resolver::{self, Resolution, MIN_CONFIDENCE};
use super::{MemoryEngine, RequestTicket};
use crate::error::{MemoryError, MemoryResult};
use crate::models::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Handled,
    LowConfidence,
    /// A newer chat request superseded this one.
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatOutcome {
    pub status: ChatStatus,
    /// Entities written to memory, e.g. `"destination:Tokyo"`.
    pub applied: Vec<String>,
    /// Entities refused by validation, with the reason.
    pub rejected: Vec<String>,
    pub resolution: Resolution,
}

impl ChatOutcome {
    fn skipped(status: ChatStatus, resolution: Resolution) -> Self {
        Self {
            status,
            applied: Vec::new(),
            rejected: Vec::new(),
            resolution,
        }
    }
}

/// Collects per-entity results; only storage failures abort the message.
#[derive(Default)]
struct Ledger {
    applied: Vec<String>,
    rejected: Vec<String>,
}

impl Ledger {
    fn record(&mut self, label: String, result: MemoryResult<()>) -> MemoryResult<()> {
        match result {
            Ok(()) => {
                self.applied.push(label);
                Ok(())
            }
            Err(MemoryError::Storage(e)) => Err(MemoryError::Storage(e)),
            Err(e) => {
                tracing::debug!("Chat entity {} rejected: {}", label, e);
                self.rejected.push(format!("{}: {}", label, e));
                Ok(())
            }
        }
    }

    fn reject(&mut self, label: &str, reason: &str) {
        tracing::debug!("Chat entity {} rejected: {}", label, reason);
        self.rejected.push(format!("{}: {}", label, reason));
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn count(value: Option<i64>, fallback: u8) -> Result<u8, String> {
    match value {
        None => Ok(fallback),
        Some(v) => u8::try_from(v).map_err(|_| format!("count {} out of range", v)),
    }
}

fn price(value: Option<i64>) -> Result<Option<u32>, String> {
    value
        .map(|v| u32::try_from(v).map_err(|_| format!("price {} out of range", v)))
        .transpose()
}

impl MemoryEngine {
    /// Handles one classified chat message: writes its entities through the
    /// regular mutation paths, then decides what the UI shows next.
    ///
    /// Messages below the confidence threshold change nothing. A message
    /// whose ticket was superseded by a newer chat request is dropped.
    pub fn handle_chat(
        &mut self,
        ticket: Option<RequestTicket>,
        intent: &ClassifiedIntent,
    ) -> MemoryResult<ChatOutcome> {
        if let Some(ticket) = ticket {
            if !self.requests.is_current(&ticket) {
                tracing::warn!("Discarding stale chat classification {}", ticket.token);
                return Ok(ChatOutcome::skipped(ChatStatus::Stale, Resolution::Nothing));
            }
        }

        let confidence = resolver::sanitize_confidence(intent.confidence);
        if confidence < MIN_CONFIDENCE {
            tracing::debug!(
                "Ignoring {} at confidence {}",
                intent.primary_intent,
                confidence
            );
            return Ok(ChatOutcome::skipped(
                ChatStatus::LowConfidence,
                Resolution::Suppressed,
            ));
        }

        let mut ledger = Ledger::default();
        self.apply_entities(&intent.entities, &mut ledger)?;

        let resolution = resolver::resolve(intent, &self.completeness());
        if let Resolution::Dispatch { action } = &resolution {
            self.dispatch_action(*action);
        }

        Ok(ChatOutcome {
            status: ChatStatus::Handled,
            applied: ledger.applied,
            rejected: ledger.rejected,
            resolution,
        })
    }

    fn apply_entities(&mut self, entities: &IntentEntities, ledger: &mut Ledger) -> MemoryResult<()> {
        if let Some(raw) = &entities.trip_type {
            match TripType::from_str(raw) {
                Some(trip_type) => {
                    let result = self.set_trip_type(trip_type);
                    ledger.record(format!("tripType:{}", trip_type.as_str()), result)?;
                }
                None => ledger.reject("tripType", &format!("unknown trip type '{}'", raw)),
            }
        }

        self.apply_destinations(entities, ledger)?;
        self.apply_dates(entities, ledger)?;

        if entities.has_travelers() {
            let current = self.flight().passengers;
            let travelers = count(entities.adults, current.adults).and_then(|adults| {
                Ok(Travelers::new(
                    adults,
                    count(entities.children, 0)?,
                    count(entities.infants, 0)?,
                ))
            });
            match travelers {
                Ok(t) => {
                    let result = self.set_passengers(t);
                    ledger.record(
                        format!("travelers:{}/{}/{}", t.adults, t.children, t.infants),
                        result,
                    )?;
                }
                Err(reason) => ledger.reject("travelers", &reason),
            }
        }

        if let Some(entity) = &entities.budget {
            self.apply_budget(entity, ledger)?;
        }

        if entities.has_preference_signal() {
            let update = PreferenceUpdate {
                comfort_level: entities.comfort_level.map(|c| c.clamp(0, 100) as u8),
                style_axes: entities.style_axes.clone(),
                must_haves: entities.must_haves.clone(),
                origin: UpdateOrigin::Chat,
            };
            let result = self.apply_preferences(&update).map(|_| ());
            ledger.record("preferences".to_string(), result)?;
        }

        for rejection in &entities.rejections {
            let Some(category) = NegativeCategory::from_str(&rejection.category) else {
                ledger.reject(
                    "rejection",
                    &format!("unknown category '{}'", rejection.category),
                );
                continue;
            };
            let result = self
                .add_negative_preference(AddNegativePreferenceInput {
                    category,
                    value: rejection.value.clone(),
                    reason: rejection.reason.clone(),
                    source: PreferenceSource::Explicit,
                })
                .map(|_| ());
            ledger.record(
                format!("avoid:{}:{}", category.as_str(), rejection.value),
                result,
            )?;
        }
        Ok(())
    }

    fn apply_destinations(&mut self, entities: &IntentEntities, ledger: &mut Ledger) -> MemoryResult<()> {
        if !entities.destinations.is_empty() {
            for destination in &entities.destinations {
                let result = self.add_destination(destination.clone(), None).map(|_| ());
                ledger.record(format!("destination:{}", destination.city), result)?;
            }
            return Ok(());
        }

        let Some(destination) = &entities.destination else {
            return Ok(());
        };
        let result = if self.flight().trip_type == TripType::Multi {
            self.add_destination(destination.clone(), None).map(|_| ())
        } else if destination.city.trim().is_empty() {
            Err(MemoryError::validation("destination city is empty"))
        } else {
            self.update_flight(FlightPatch {
                arrival: Some(Airport::city(destination)),
                ..Default::default()
            })
        };
        ledger.record(format!("destination:{}", destination.city), result)
    }

    fn apply_dates(&mut self, entities: &IntentEntities, ledger: &mut Ledger) -> MemoryResult<()> {
        let mut patch = FlightPatch::default();
        if let Some(raw) = &entities.departure_date {
            match parse_date(raw) {
                Some(d) => patch.departure_date = Some(d),
                None => ledger.reject("departureDate", &format!("unparseable date '{}'", raw)),
            }
        }
        if let Some(raw) = &entities.return_date {
            match parse_date(raw) {
                Some(d) => {
                    patch.return_date = Some(d);
                    if self.flight().trip_type == TripType::Oneway {
                        patch.trip_type = Some(TripType::Roundtrip);
                    }
                }
                None => ledger.reject("returnDate", &format!("unparseable date '{}'", raw)),
            }
        }
        if patch.departure_date.is_none() && patch.return_date.is_none() {
            return Ok(());
        }

        let label = match (patch.departure_date, patch.return_date) {
            (Some(out), Some(back)) => format!("dates:{}..{}", out, back),
            (Some(out), None) => format!("dates:{}", out),
            (None, Some(back)) => format!("dates:..{}", back),
            (None, None) => unreachable!(),
        };
        let result = self.update_flight(patch);
        ledger.record(label, result)
    }

    fn apply_budget(&mut self, entity: &BudgetEntity, ledger: &mut Ledger) -> MemoryResult<()> {
        let budget = match entity.preset.as_deref().map(BudgetPreset::from_str) {
            Some(Some(BudgetPreset::Custom)) | None => {
                let range = price(entity.price_min).and_then(|min| Ok((min, price(entity.price_max)?)));
                match range {
                    Err(reason) => {
                        ledger.reject("budget", &reason);
                        return Ok(());
                    }
                    Ok((None, None)) => {
                        ledger.reject("budget", "no preset or price range");
                        return Ok(());
                    }
                    Ok((min, max)) => Budget::custom(min.unwrap_or(0), max),
                }
            }
            Some(Some(preset)) => Budget::from_preset(preset),
            Some(None) => {
                ledger.reject(
                    "budget",
                    &format!("unknown preset '{}'", entity.preset.as_deref().unwrap_or_default()),
                );
                return Ok(());
            }
        };
        let budget = match budget {
            Ok(b) => b,
            Err(e) => {
                ledger.reject("budget", &e.to_string());
                return Ok(());
            }
        };

        match entity.city.as_deref().filter(|c| !c.trim().is_empty()) {
            // Naming the city makes this a manual edit of that one stay.
            Some(city) => {
                let label = format!("budget:{}:{}", city, budget.budget_preset.as_str());
                let result = match self.accommodation().find_by_city(city).map(|e| e.id) {
                    Some(id) => self.set_user_budget(budget, Some(id)).map(|_| ()),
                    None => Err(MemoryError::not_found(format!("no accommodation in {}", city))),
                };
                ledger.record(label, result)
            }
            None => {
                let result = self.set_default_budget(budget);
                ledger.record(format!("budget:{}", budget.budget_preset.as_str()), result)
            }
        }
    }
}
