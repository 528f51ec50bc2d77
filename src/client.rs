//! HTTP client for the hosted travel services.
//!
//! Two endpoints are used:
//! - `POST /classify-intent` turns a chat message into a [`ClassifiedIntent`]
//! - `GET /locations?q=` searches cities and airports
//!
//! Both are optional collaborators: without `VOYAGE_SERVICES_URL` the client
//! is not built and callers report the feature as unavailable.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::engine::Completeness;
use crate::models::{ClassifiedIntent, LocationCandidate};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: services key required or invalid")]
    Unauthorized,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Travel services are not configured")]
    NotConfigured,
}

/// What the classifier is told about the current trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyContext {
    pub completeness: Completeness,
    /// `NegativePreferencesMemory::summary()`; empty when nothing is avoided.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub avoid: String,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    message: &'a str,
    context: &'a ClassifyContext,
}

#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    results: Vec<LocationCandidate>,
}

#[derive(Debug, Clone)]
pub struct TravelServicesClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl TravelServicesClient {
    /// Client for the configured services, if any.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .services_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.services_key.clone()))
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_config(&Config::from_env()).ok_or(ClientError::NotConfigured)
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            match status {
                StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(body)),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Unauthorized),
                _ => Err(ClientError::Server(format!("{}: {}", status, body))),
            }
        }
    }

    /// Classifies one chat message.
    pub async fn classify(
        &self,
        message: &str,
        context: &ClassifyContext,
    ) -> Result<ClassifiedIntent, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/classify-intent")
            .json(&ClassifyRequest { message, context })
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Location candidates for a free-text query, best match first.
    pub async fn search_locations(&self, query: &str) -> Result<Vec<LocationCandidate>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/locations")
            .query(&[("q", query)])
            .send()
            .await?;
        let body: LocationsResponse = self.handle_response(response).await?;
        Ok(body.results)
    }
}
