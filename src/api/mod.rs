mod handlers;

use std::sync::{Arc, Mutex};

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::client::TravelServicesClient;
use crate::engine::MemoryEngine;

/// Shared state of the HTTP surface. The engine lock is never held across an
/// `.await`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<MemoryEngine>>,
    pub services: Option<TravelServicesClient>,
}

impl AppState {
    pub fn new(engine: MemoryEngine, services: Option<TravelServicesClient>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            services,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Snapshots and resets
        .route("/memory", get(handlers::get_memory).delete(handlers::reset_all))
        .route(
            "/memory/{domain}",
            get(handlers::get_domain).delete(handlers::reset_domain),
        )
        // Flight & travelers
        .route("/flight", patch(handlers::update_flight))
        .route("/flight/passengers", put(handlers::set_passengers))
        .route("/flight/trip-type", put(handlers::set_trip_type))
        .route("/destinations", post(handlers::add_destination))
        .route("/destinations/{city}", delete(handlers::remove_destination))
        .route("/travel", patch(handlers::update_travel))
        // Accommodation
        .route("/accommodation/active", put(handlers::set_active_accommodation))
        .route("/accommodation/budget", put(handlers::set_budget))
        .route("/accommodation/default-budget", put(handlers::set_default_budget))
        .route("/accommodation/rooms", put(handlers::set_rooms))
        .route("/accommodation/{id}", patch(handlers::update_accommodation))
        // Negative preferences
        .route(
            "/negative-preferences",
            get(handlers::list_negative_preferences)
                .post(handlers::add_negative_preference)
                .delete(handlers::clear_negative_preferences),
        )
        .route(
            "/negative-preferences/{id}",
            delete(handlers::remove_negative_preference),
        )
        // Preference bridge
        .route("/preferences", post(handlers::apply_preferences))
        .route("/preferences/apply-to-hotels", post(handlers::apply_preferences_to_hotels))
        // Chat
        .route("/chat/intents", post(handlers::handle_intent))
        .route("/chat/messages", post(handlers::handle_message))
        // Location lookups
        .route("/lookups", post(handlers::lookup))
        .route("/lookups/tickets", post(handlers::begin_lookup))
        .route("/lookups/complete", post(handlers::complete_lookup))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
