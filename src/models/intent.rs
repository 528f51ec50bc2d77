use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::destination::Destination;
use super::preferences::StyleAxes;

/// Output of the chat classification service for one user message.
///
/// Every field comes from a language model and is treated as untrusted:
/// confidence may be out of range, widget names may be unknown, counts may be
/// negative. The resolver and the engine validate before acting. A field of
/// the wrong shape is dropped on its own; it never fails the whole message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedIntent {
    pub primary_intent: String,
    #[serde(default, deserialize_with = "confidence")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub entities: IntentEntities,
    #[serde(default, deserialize_with = "lenient")]
    pub widget_to_show: Option<WidgetRequest>,
}

/// Reads a field, falling back to its default when the value has the wrong
/// type or range.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::debug!("Dropping malformed classifier field: {}", e);
        T::default()
    }))
}

/// Confidence as a number or a numeric string (`"85"`, `"85%"`). Anything
/// else reads as 0.
fn confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Structured values the classifier pulled out of the message.
///
/// Numbers are read wide (`i64`) and range-checked where they are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentEntities {
    #[serde(deserialize_with = "lenient")]
    pub destination: Option<Destination>,
    /// Several stays named at once ("Tokyo then Bangkok").
    #[serde(deserialize_with = "lenient")]
    pub destinations: Vec<Destination>,
    #[serde(deserialize_with = "lenient")]
    pub country_code: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub country_name: Option<String>,
    /// `YYYY-MM-DD`; unparseable values are ignored.
    #[serde(deserialize_with = "lenient")]
    pub departure_date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub return_date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub preferred_month: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub trip_duration: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub adults: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub children: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub infants: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub trip_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub budget: Option<BudgetEntity>,
    /// 0-100; clamped when applied.
    #[serde(deserialize_with = "lenient")]
    pub comfort_level: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub style_axes: Option<StyleAxes>,
    #[serde(deserialize_with = "lenient")]
    pub must_haves: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub rejections: Vec<RejectionEntity>,
}

impl IntentEntities {
    pub fn has_travelers(&self) -> bool {
        self.adults.is_some() || self.children.is_some() || self.infants.is_some()
    }

    pub fn has_preference_signal(&self) -> bool {
        self.comfort_level.is_some() || self.style_axes.is_some() || !self.must_haves.is_empty()
    }
}

/// A budget request from chat. With `city` set it targets that one stay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetEntity {
    #[serde(deserialize_with = "lenient")]
    pub preset: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub price_min: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub price_max: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RejectionEntity {
    pub category: String,
    pub value: String,
    pub reason: Option<String>,
}

/// Widget suggestion as sent by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetRequest {
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Structured prompts the UI can surface in the chat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WidgetType {
    CitySelector,
    DateRangePicker,
    TravelersSelector,
    TripTypeConfirm,
    BudgetSelector,
}

impl WidgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CitySelector => "citySelector",
            Self::DateRangePicker => "dateRangePicker",
            Self::TravelersSelector => "travelersSelector",
            Self::TripTypeConfirm => "tripTypeConfirm",
            Self::BudgetSelector => "budgetSelector",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "citySelector" => Some(Self::CitySelector),
            "dateRangePicker" => Some(Self::DateRangePicker),
            "travelersSelector" => Some(Self::TravelersSelector),
            "tripTypeConfirm" => Some(Self::TripTypeConfirm),
            "budgetSelector" => Some(Self::BudgetSelector),
            _ => None,
        }
    }
}

/// A widget the UI should show, with prefill data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidgetPrompt {
    #[serde(rename = "type")]
    pub widget: WidgetType,
    pub data: Map<String, Value>,
}

/// Side effects a chat message can ask for instead of a widget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    TriggerSearch,
    DelegateChoice,
}

impl ControlAction {
    pub fn from_intent(intent: &str) -> Option<Self> {
        match intent {
            "trigger_search" => Some(Self::TriggerSearch),
            "delegate_choice" => Some(Self::DelegateChoice),
            _ => None,
        }
    }
}
