//! Decides which widget, if any, answers a classified chat message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{ClassifiedIntent, ControlAction, WidgetPrompt, WidgetType};

/// Classifications below this confidence are noise.
pub const MIN_CONFIDENCE: f64 = 40.0;

/// What the trip form already knows, as far as widget gating cares.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Completeness {
    pub destination: bool,
    pub dates: bool,
    /// Round trip without a return date yet.
    pub return_date_missing: bool,
    pub travelers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    Destination,
    Dates,
    ReturnDate,
    Travelers,
}

impl Prerequisite {
    fn satisfied(&self, c: &Completeness) -> bool {
        match self {
            Self::Destination => c.destination,
            Self::Dates => c.dates,
            Self::ReturnDate => !c.return_date_missing,
            Self::Travelers => c.travelers,
        }
    }

    /// Widget that collects this prerequisite.
    fn widget(&self) -> WidgetType {
        match self {
            Self::Destination => WidgetType::CitySelector,
            Self::Dates | Self::ReturnDate => WidgetType::DateRangePicker,
            Self::Travelers => WidgetType::TravelersSelector,
        }
    }
}

/// Chain prefix a widget needs before it may be shown, in chain order.
pub fn prerequisites(widget: WidgetType) -> &'static [Prerequisite] {
    use Prerequisite::*;
    match widget {
        WidgetType::CitySelector => &[],
        WidgetType::DateRangePicker | WidgetType::BudgetSelector => &[Destination],
        WidgetType::TravelersSelector => &[Destination, Dates, ReturnDate],
        WidgetType::TripTypeConfirm => &[Destination, Dates, ReturnDate, Travelers],
    }
}

/// Static intent → widget table.
pub fn widget_for_intent(intent: &str) -> Option<WidgetType> {
    match intent {
        "provide_destination" => Some(WidgetType::CitySelector),
        "provide_dates" => Some(WidgetType::DateRangePicker),
        "provide_travelers" => Some(WidgetType::TravelersSelector),
        "confirm_selection" => Some(WidgetType::TripTypeConfirm),
        "provide_budget" => Some(WidgetType::BudgetSelector),
        _ => None,
    }
}

/// `widget` if its prerequisites hold, else the widget for the first unmet one.
pub fn gate(widget: WidgetType, completeness: &Completeness) -> WidgetType {
    prerequisites(widget)
        .iter()
        .find(|p| !p.satisfied(completeness))
        .map(Prerequisite::widget)
        .unwrap_or(widget)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Confidence too low to act on.
    Suppressed,
    /// A control action; no widget.
    Dispatch { action: ControlAction },
    Show { widget: WidgetPrompt },
    Nothing,
}

/// Treats NaN and out-of-range confidence as untrusted and clamps it to 0-100.
pub fn sanitize_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 100.0)
    }
}

pub fn resolve(intent: &ClassifiedIntent, completeness: &Completeness) -> Resolution {
    if sanitize_confidence(intent.confidence) < MIN_CONFIDENCE {
        return Resolution::Suppressed;
    }

    if let Some(action) = ControlAction::from_intent(&intent.primary_intent) {
        return Resolution::Dispatch { action };
    }

    let mut data = entity_data(intent);

    if let Some(request) = &intent.widget_to_show {
        match WidgetType::from_str(&request.widget_type) {
            Some(requested) => {
                let widget = gate(requested, completeness);
                if widget == requested {
                    if let Some(Value::Object(extra)) = &request.data {
                        for (k, v) in extra {
                            data.entry(k.clone()).or_insert_with(|| v.clone());
                        }
                    }
                } else {
                    tracing::debug!(
                        "Requested {} not ready, showing {} instead",
                        requested.as_str(),
                        widget.as_str()
                    );
                }
                return Resolution::Show {
                    widget: WidgetPrompt { widget, data },
                };
            }
            None => tracing::debug!("Ignoring unknown widget '{}'", request.widget_type),
        }
    }

    match widget_for_intent(&intent.primary_intent) {
        Some(mapped) => Resolution::Show {
            widget: WidgetPrompt {
                widget: gate(mapped, completeness),
                data,
            },
        },
        None => Resolution::Nothing,
    }
}

/// Prefill values extracted from the message.
fn entity_data(intent: &ClassifiedIntent) -> Map<String, Value> {
    let entities = &intent.entities;
    let mut data = Map::new();
    if let Some(month) = &entities.preferred_month {
        data.insert("preferredMonth".to_string(), Value::from(month.clone()));
    }
    if let Some(duration) = entities.trip_duration.filter(|d| *d > 0) {
        data.insert("tripDuration".to_string(), Value::from(duration));
    }
    let country_code = entities.country_code.clone().or_else(|| {
        entities
            .destination
            .as_ref()
            .and_then(|d| d.country_code.clone())
    });
    if let Some(code) = country_code {
        data.insert("countryCode".to_string(), Value::from(code));
    }
    let country_name = entities
        .country_name
        .clone()
        .or_else(|| entities.destination.as_ref().and_then(|d| d.country.clone()));
    if let Some(name) = country_name {
        data.insert("countryName".to_string(), Value::from(name));
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntentEntities, WidgetRequest};

    fn intent(primary: &str, confidence: f64) -> ClassifiedIntent {
        ClassifiedIntent {
            primary_intent: primary.to_string(),
            confidence,
            entities: IntentEntities::default(),
            widget_to_show: None,
        }
    }

    fn shown(resolution: Resolution) -> WidgetType {
        match resolution {
            Resolution::Show { widget } => widget.widget,
            other => panic!("expected a widget, got {:?}", other),
        }
    }

    const EVERYTHING: Completeness = Completeness {
        destination: true,
        dates: true,
        return_date_missing: false,
        travelers: true,
    };

    #[test]
    fn low_confidence_is_suppressed() {
        assert_eq!(
            resolve(&intent("provide_dates", 39.9), &EVERYTHING),
            Resolution::Suppressed
        );
        assert_eq!(
            resolve(&intent("provide_dates", f64::NAN), &EVERYTHING),
            Resolution::Suppressed
        );
    }

    #[test]
    fn control_intents_dispatch() {
        assert_eq!(
            resolve(&intent("trigger_search", 90.0), &Completeness::default()),
            Resolution::Dispatch {
                action: ControlAction::TriggerSearch
            }
        );
    }

    #[test]
    fn mapped_intent_falls_back_to_first_unmet_prerequisite() {
        let c = Completeness {
            destination: true,
            ..Default::default()
        };
        assert_eq!(
            shown(resolve(&intent("provide_travelers", 80.0), &c)),
            WidgetType::DateRangePicker
        );
    }

    #[test]
    fn round_trip_needs_return_date_before_travelers() {
        let c = Completeness {
            destination: true,
            dates: true,
            return_date_missing: true,
            travelers: false,
        };
        assert_eq!(gate(WidgetType::TravelersSelector, &c), WidgetType::DateRangePicker);
    }

    #[test]
    fn requested_widget_is_validated() {
        let mut i = intent("chitchat", 75.0);
        i.widget_to_show = Some(WidgetRequest {
            widget_type: "travelersSelector".to_string(),
            data: Some(serde_json::json!({ "hint": "family" })),
        });
        let resolution = resolve(&i, &Completeness::default());
        assert_eq!(shown(resolution), WidgetType::CitySelector);

        let resolution = resolve(&i, &EVERYTHING);
        match resolution {
            Resolution::Show { widget } => {
                assert_eq!(widget.widget, WidgetType::TravelersSelector);
                assert_eq!(widget.data["hint"], "family");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_widget_falls_through_to_intent_table() {
        let mut i = intent("provide_destination", 75.0);
        i.widget_to_show = Some(WidgetRequest {
            widget_type: "hologram".to_string(),
            data: None,
        });
        assert_eq!(shown(resolve(&i, &EVERYTHING)), WidgetType::CitySelector);
    }

    #[test]
    fn unmapped_intent_shows_nothing() {
        assert_eq!(
            resolve(&intent("small_talk", 99.0), &EVERYTHING),
            Resolution::Nothing
        );
    }

    #[test]
    fn entity_prefill_is_attached() {
        let mut i = intent("provide_dates", 70.0);
        i.entities.preferred_month = Some("october".to_string());
        i.entities.trip_duration = Some(10);
        i.entities.country_code = Some("JP".to_string());
        match resolve(&i, &EVERYTHING) {
            Resolution::Show { widget } => {
                assert_eq!(widget.data["preferredMonth"], "october");
                assert_eq!(widget.data["tripDuration"], 10);
                assert_eq!(widget.data["countryCode"], "JP");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn travelers_selector_never_shown_without_destination_and_dates() {
        let states = [
            Completeness::default(),
            Completeness {
                destination: true,
                ..Default::default()
            },
            Completeness {
                dates: true,
                travelers: true,
                ..Default::default()
            },
        ];
        for c in states {
            for primary in ["provide_travelers", "confirm_selection", "provide_dates"] {
                assert_ne!(
                    shown(resolve(&intent(primary, 100.0), &c)),
                    WidgetType::TravelersSelector
                );
            }
        }
    }
}
