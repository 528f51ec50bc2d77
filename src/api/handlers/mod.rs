use std::sync::MutexGuard;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::client::{ClassifyContext, ClientError};
use crate::engine::{
    ChatOutcome, LookupOutcome, MemoryEngine, MemorySnapshot, RequestChannel, RequestTicket,
};
use crate::error::MemoryError;
use crate::memory::MemoryDomain;
use crate::models::*;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Validation and lookup failures are the caller's fault and safe to expose.
/// Storage failures are logged in full and answered with a generic message.
fn memory_error(e: MemoryError) -> (StatusCode, String) {
    match e {
        MemoryError::Validation(msg) => {
            tracing::warn!("Validation error: {}", msg);
            (StatusCode::BAD_REQUEST, msg)
        }
        MemoryError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("Not found: {}", msg)),
        MemoryError::Storage(msg) => {
            tracing::error!("Internal error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn services_error(e: ClientError) -> (StatusCode, String) {
    match e {
        ClientError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        other => {
            tracing::error!("Travel services error: {}", other);
            (
                StatusCode::BAD_GATEWAY,
                "Travel services request failed".to_string(),
            )
        }
    }
}

fn parse_domain(raw: &str) -> ApiResult<MemoryDomain> {
    MemoryDomain::from_str(raw)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown memory '{}'", raw)))
}

impl AppState {
    fn engine(&self) -> MutexGuard<'_, MemoryEngine> {
        self.engine.lock().expect("engine lock poisoned")
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Snapshots & Reset
// ============================================================

pub async fn get_memory(State(state): State<AppState>) -> Json<MemorySnapshot> {
    Json(state.engine().snapshot())
}

pub async fn get_domain(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let domain = parse_domain(&domain)?;
    let snapshot = state.engine().snapshot();
    let value = match domain {
        MemoryDomain::Flight => serde_json::to_value(snapshot.flight),
        MemoryDomain::Accommodation => serde_json::to_value(snapshot.accommodation),
        MemoryDomain::Travel => serde_json::to_value(snapshot.travel),
        MemoryDomain::NegativePreferences => serde_json::to_value(snapshot.negative_preferences),
    };
    value
        .map(Json)
        .map_err(|e| memory_error(MemoryError::Storage(e.to_string())))
}

pub async fn reset_all(State(state): State<AppState>) -> StatusCode {
    state.engine().reset_all();
    StatusCode::NO_CONTENT
}

pub async fn reset_domain(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> ApiResult<StatusCode> {
    let domain = parse_domain(&domain)?;
    state.engine().reset(domain).map_err(memory_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Flight & Travelers
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripTypeInput {
    pub trip_type: TripType,
}

#[derive(Debug, Deserialize)]
pub struct AddDestinationInput {
    #[serde(flatten)]
    pub destination: Destination,
    #[serde(default)]
    pub date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDestinationResponse {
    pub accommodation_id: Option<Uuid>,
    pub flight: FlightMemory,
}

pub async fn update_flight(
    State(state): State<AppState>,
    Json(patch): Json<FlightPatch>,
) -> ApiResult<Json<FlightMemory>> {
    let mut engine = state.engine();
    engine.update_flight(patch).map_err(memory_error)?;
    Ok(Json(engine.flight().clone()))
}

pub async fn set_passengers(
    State(state): State<AppState>,
    Json(travelers): Json<Travelers>,
) -> ApiResult<Json<FlightMemory>> {
    let mut engine = state.engine();
    engine.set_passengers(travelers).map_err(memory_error)?;
    Ok(Json(engine.flight().clone()))
}

pub async fn set_trip_type(
    State(state): State<AppState>,
    Json(input): Json<TripTypeInput>,
) -> ApiResult<Json<FlightMemory>> {
    let mut engine = state.engine();
    engine.set_trip_type(input.trip_type).map_err(memory_error)?;
    Ok(Json(engine.flight().clone()))
}

pub async fn add_destination(
    State(state): State<AppState>,
    Json(input): Json<AddDestinationInput>,
) -> ApiResult<(StatusCode, Json<AddDestinationResponse>)> {
    let mut engine = state.engine();
    let accommodation_id = engine
        .add_destination(input.destination, input.date)
        .map_err(memory_error)?;
    Ok((
        StatusCode::CREATED,
        Json(AddDestinationResponse {
            accommodation_id,
            flight: engine.flight().clone(),
        }),
    ))
}

pub async fn remove_destination(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> ApiResult<StatusCode> {
    if state.engine().remove_destination(&city).map_err(memory_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Destination not found".to_string()))
    }
}

pub async fn update_travel(
    State(state): State<AppState>,
    Json(patch): Json<TravelPatch>,
) -> ApiResult<Json<TravelMemory>> {
    let mut engine = state.engine();
    engine.update_travel(patch).map_err(memory_error)?;
    Ok(Json(engine.travel().clone()))
}

// ============================================================
// Accommodation
// ============================================================

#[derive(Debug, Deserialize)]
pub struct SetActiveInput {
    pub index: usize,
}

/// Explicit user budget. `preset: custom` (or no preset) takes the price range.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBudgetInput {
    #[serde(default)]
    pub target: Option<Uuid>,
    #[serde(default)]
    pub preset: Option<BudgetPreset>,
    #[serde(default)]
    pub price_min: Option<u32>,
    #[serde(default)]
    pub price_max: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsInput {
    pub use_auto_rooms: bool,
    #[serde(default)]
    pub custom_rooms: Vec<Room>,
}

pub async fn set_active_accommodation(
    State(state): State<AppState>,
    Json(input): Json<SetActiveInput>,
) -> ApiResult<Json<AccommodationMemory>> {
    let mut engine = state.engine();
    engine
        .set_active_accommodation(input.index)
        .map_err(memory_error)?;
    Ok(Json(engine.accommodation().clone()))
}

fn entry_json(engine: &MemoryEngine, id: Uuid) -> ApiResult<Json<AccommodationEntry>> {
    engine
        .accommodation()
        .get(id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Accommodation not found".to_string()))
}

pub async fn update_accommodation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AccommodationPatch>,
) -> ApiResult<Json<AccommodationEntry>> {
    let mut engine = state.engine();
    let id = engine
        .update_accommodation(Some(id), patch)
        .map_err(memory_error)?;
    entry_json(&engine, id)
}

pub async fn set_budget(
    State(state): State<AppState>,
    Json(input): Json<SetBudgetInput>,
) -> ApiResult<Json<AccommodationEntry>> {
    let mut engine = state.engine();
    let id = match input.preset {
        Some(preset) if preset != BudgetPreset::Custom => {
            engine.set_budget_preset(preset, input.target)
        }
        _ if input.price_min.is_none() && input.price_max.is_none() => {
            return Err((
                StatusCode::BAD_REQUEST,
                "a preset or a price range is required".to_string(),
            ));
        }
        _ => engine.set_custom_budget(
            input.price_min.unwrap_or(0),
            input.price_max,
            input.target,
        ),
    }
    .map_err(memory_error)?;
    entry_json(&engine, id)
}

pub async fn set_default_budget(
    State(state): State<AppState>,
    Json(budget): Json<Budget>,
) -> ApiResult<Json<AccommodationMemory>> {
    let mut engine = state.engine();
    engine.set_default_budget(budget).map_err(memory_error)?;
    Ok(Json(engine.accommodation().clone()))
}

pub async fn set_rooms(
    State(state): State<AppState>,
    Json(input): Json<RoomsInput>,
) -> ApiResult<Json<Vec<Room>>> {
    let mut engine = state.engine();
    engine
        .set_room_mode(input.use_auto_rooms, input.custom_rooms)
        .map_err(memory_error)?;
    Ok(Json(engine.effective_rooms()))
}

// ============================================================
// Negative Preferences
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct NegativePreferencesResponse {
    pub preferences: Vec<NegativePreference>,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddNegativePreferenceResponse {
    pub id: Option<Uuid>,
    pub duplicate: bool,
}

pub async fn list_negative_preferences(
    State(state): State<AppState>,
) -> Json<NegativePreferencesResponse> {
    let engine = state.engine();
    let memory = engine.negative_preferences();
    Json(NegativePreferencesResponse {
        preferences: memory.preferences.clone(),
        summary: memory.summary(),
    })
}

pub async fn add_negative_preference(
    State(state): State<AppState>,
    Json(input): Json<AddNegativePreferenceInput>,
) -> ApiResult<(StatusCode, Json<AddNegativePreferenceResponse>)> {
    let id = state
        .engine()
        .add_negative_preference(input)
        .map_err(memory_error)?;
    let status = if id.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(AddNegativePreferenceResponse {
            id,
            duplicate: id.is_none(),
        }),
    ))
}

pub async fn remove_negative_preference(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state
        .engine()
        .remove_negative_preference(id)
        .map_err(memory_error)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Preference not found".to_string()))
    }
}

pub async fn clear_negative_preferences(State(state): State<AppState>) -> StatusCode {
    state.engine().clear_negative_preferences();
    StatusCode::NO_CONTENT
}

// ============================================================
// Preference Bridge
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceResponse {
    /// Budget written to unprotected entries, if the update implied one.
    pub applied_budget: Option<Budget>,
    pub accommodation: AccommodationMemory,
}

pub async fn apply_preferences(
    State(state): State<AppState>,
    Json(update): Json<PreferenceUpdate>,
) -> ApiResult<Json<PreferenceResponse>> {
    let mut engine = state.engine();
    let applied_budget = engine.apply_preferences(&update).map_err(memory_error)?;
    Ok(Json(PreferenceResponse {
        applied_budget,
        accommodation: engine.accommodation().clone(),
    }))
}

pub async fn apply_preferences_to_hotels(
    State(state): State<AppState>,
    Json(update): Json<PreferenceUpdate>,
) -> ApiResult<Json<PreferenceResponse>> {
    let mut engine = state.engine();
    let applied_budget = engine
        .apply_preferences_to_hotels(&update)
        .map_err(memory_error)?;
    Ok(Json(PreferenceResponse {
        applied_budget,
        accommodation: engine.accommodation().clone(),
    }))
}

// ============================================================
// Chat
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ChatIntentInput {
    #[serde(default)]
    pub ticket: Option<RequestTicket>,
    pub intent: ClassifiedIntent,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageInput {
    pub message: String,
}

/// An intent already classified by the caller.
pub async fn handle_intent(
    State(state): State<AppState>,
    Json(input): Json<ChatIntentInput>,
) -> ApiResult<Json<ChatOutcome>> {
    state
        .engine()
        .handle_chat(input.ticket, &input.intent)
        .map(Json)
        .map_err(memory_error)
}

/// Classifies a raw message through the hosted service, then handles it.
/// A message overtaken by a newer one while classifying comes back as stale.
pub async fn handle_message(
    State(state): State<AppState>,
    Json(input): Json<ChatMessageInput>,
) -> ApiResult<Json<ChatOutcome>> {
    let services = state
        .services
        .clone()
        .ok_or_else(|| services_error(ClientError::NotConfigured))?;

    let (ticket, context) = {
        let mut engine = state.engine();
        let ticket = engine.begin_request(RequestChannel::Chat);
        let context = ClassifyContext {
            completeness: engine.completeness(),
            avoid: engine.negative_preferences().summary(),
        };
        (ticket, context)
    };

    let intent = services
        .classify(&input.message, &context)
        .await
        .map_err(services_error)?;

    state
        .engine()
        .handle_chat(Some(ticket), &intent)
        .map(Json)
        .map_err(memory_error)
}

// ============================================================
// Location Lookups
// ============================================================

#[derive(Debug, Deserialize)]
pub struct BeginLookupInput {
    pub channel: RequestChannel,
}

#[derive(Debug, Deserialize)]
pub struct CompleteLookupInput {
    pub ticket: RequestTicket,
    pub candidates: Vec<LocationCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct LookupInput {
    pub channel: RequestChannel,
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LookupResponse {
    pub outcome: LookupOutcome,
    pub flight: FlightMemory,
}

pub async fn begin_lookup(
    State(state): State<AppState>,
    Json(input): Json<BeginLookupInput>,
) -> ApiResult<Json<RequestTicket>> {
    if input.channel == RequestChannel::Chat {
        return Err((
            StatusCode::BAD_REQUEST,
            "chat is not a lookup channel".to_string(),
        ));
    }
    Ok(Json(state.engine().begin_request(input.channel)))
}

pub async fn complete_lookup(
    State(state): State<AppState>,
    Json(input): Json<CompleteLookupInput>,
) -> ApiResult<Json<LookupResponse>> {
    let mut engine = state.engine();
    let outcome = engine
        .complete_lookup(input.ticket, &input.candidates)
        .map_err(memory_error)?;
    Ok(Json(LookupResponse {
        outcome,
        flight: engine.flight().clone(),
    }))
}

/// Searches the location service and applies the best match.
pub async fn lookup(
    State(state): State<AppState>,
    Json(input): Json<LookupInput>,
) -> ApiResult<Json<LookupResponse>> {
    let services = state
        .services
        .clone()
        .ok_or_else(|| services_error(ClientError::NotConfigured))?;
    if input.channel == RequestChannel::Chat {
        return Err((
            StatusCode::BAD_REQUEST,
            "chat is not a lookup channel".to_string(),
        ));
    }

    let ticket = state.engine().begin_request(input.channel);
    let candidates = services
        .search_locations(&input.query)
        .await
        .map_err(services_error)?;

    let mut engine = state.engine();
    let outcome = engine
        .complete_lookup(ticket, &candidates)
        .map_err(memory_error)?;
    Ok(Json(LookupResponse {
        outcome,
        flight: engine.flight().clone(),
    }))
}
