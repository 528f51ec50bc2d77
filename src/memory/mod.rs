//! Persisted memory stores.
//!
//! A [`Store`] owns one memory document. All writes go through
//! [`Store::mutate`], which works on a draft copy: the closure and the
//! document's validation either both succeed and the draft replaces the state,
//! or the state is left exactly as it was. Each committed call bumps the
//! revision, persists once and sends one [`MemoryChange`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::DocumentStore;
use crate::error::{MemoryError, MemoryResult};
use crate::models::{AccommodationMemory, FlightMemory, NegativePreferencesMemory, TravelMemory};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryDomain {
    Flight,
    Accommodation,
    Travel,
    NegativePreferences,
}

impl MemoryDomain {
    pub const ALL: [MemoryDomain; 4] = [
        Self::Flight,
        Self::Accommodation,
        Self::Travel,
        Self::NegativePreferences,
    ];

    /// Storage key of the domain's document.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Flight => "flight-memory",
            Self::Accommodation => "accommodation-memory",
            Self::Travel => "travel-memory",
            Self::NegativePreferences => "negative-preferences",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flight => "flight",
            Self::Accommodation => "accommodation",
            Self::Travel => "travel",
            Self::NegativePreferences => "negative-preferences",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "flight" => Some(Self::Flight),
            "accommodation" => Some(Self::Accommodation),
            "travel" => Some(Self::Travel),
            "negative-preferences" | "negative_preferences" => Some(Self::NegativePreferences),
            _ => None,
        }
    }
}

/// Notification sent after every committed store write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryChange {
    pub domain: MemoryDomain,
    pub revision: u64,
}

/// A document a [`Store`] can own.
pub trait MemoryDocument:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + Send + Sync + 'static
{
    const DOMAIN: MemoryDomain;

    fn validate(&self) -> MemoryResult<()>;

    /// Housekeeping applied to a freshly loaded document.
    fn after_load(&mut self, _now: DateTime<Utc>) {}
}

impl MemoryDocument for FlightMemory {
    const DOMAIN: MemoryDomain = MemoryDomain::Flight;

    fn validate(&self) -> MemoryResult<()> {
        FlightMemory::validate(self)
    }
}

impl MemoryDocument for AccommodationMemory {
    const DOMAIN: MemoryDomain = MemoryDomain::Accommodation;

    fn validate(&self) -> MemoryResult<()> {
        AccommodationMemory::validate(self)
    }
}

impl MemoryDocument for TravelMemory {
    const DOMAIN: MemoryDomain = MemoryDomain::Travel;

    fn validate(&self) -> MemoryResult<()> {
        TravelMemory::validate(self)
    }
}

impl MemoryDocument for NegativePreferencesMemory {
    const DOMAIN: MemoryDomain = MemoryDomain::NegativePreferences;

    fn validate(&self) -> MemoryResult<()> {
        NegativePreferencesMemory::validate(self)
    }

    fn after_load(&mut self, now: DateTime<Utc>) {
        let dropped = self.prune(now);
        if dropped > 0 {
            tracing::info!("Dropped {} expired negative preferences", dropped);
        }
    }
}

pub struct Store<T: MemoryDocument> {
    state: T,
    revision: u64,
    storage: Arc<dyn DocumentStore>,
    events: broadcast::Sender<MemoryChange>,
}

impl<T: MemoryDocument> Store<T> {
    /// Loads the persisted document. A missing, unreadable or invalid document
    /// yields the default state; loading never fails.
    pub fn load(storage: Arc<dyn DocumentStore>, events: broadcast::Sender<MemoryChange>) -> Self {
        let key = T::DOMAIN.key();
        let (state, revision) = match storage.get(key) {
            Ok(Some(doc)) => match serde_json::from_str::<T>(&doc.body) {
                Ok(mut state) => {
                    state.after_load(Utc::now());
                    match state.validate() {
                        Ok(()) => (state, doc.revision),
                        Err(e) => {
                            tracing::warn!("Discarding invalid {} document: {}", key, e);
                            (T::default(), doc.revision)
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable {} document: {}", key, e);
                    (T::default(), doc.revision)
                }
            },
            Ok(None) => (T::default(), 0),
            Err(e) => {
                tracing::warn!("Failed to read {} document: {}", key, e);
                (T::default(), 0)
            }
        };
        tracing::debug!("Loaded {} at revision {}", key, revision);

        Self {
            state,
            revision,
            storage,
            events,
        }
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Applies `f` to a draft and commits it when `f` and validation succeed.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut T) -> MemoryResult<R>) -> MemoryResult<R> {
        let (draft, out) = self.draft(f)?;
        self.commit(draft);
        Ok(out)
    }

    /// Builds and validates a draft without committing it. Used when several
    /// stores must change together: every draft is built first, then each is
    /// handed to [`Store::commit`].
    pub fn draft<R>(&self, f: impl FnOnce(&mut T) -> MemoryResult<R>) -> MemoryResult<(T, R)> {
        let mut draft = self.state.clone();
        let out = f(&mut draft)?;
        draft.validate()?;
        Ok((draft, out))
    }

    pub fn reset(&mut self) {
        self.commit(T::default());
    }

    pub fn serialize(&self) -> MemoryResult<String> {
        serde_json::to_string(&self.state).map_err(|e| MemoryError::Storage(e.to_string()))
    }

    /// Replaces the state with a validated draft.
    pub fn commit(&mut self, next: T) {
        self.state = next;
        self.revision += 1;
        self.persist();
        // No subscribers is fine.
        let _ = self.events.send(MemoryChange {
            domain: T::DOMAIN,
            revision: self.revision,
        });
    }

    fn persist(&self) {
        let key = T::DOMAIN.key();
        let body = match serde_json::to_string(&self.state) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to serialize {}: {}", key, e);
                return;
            }
        };
        match self.storage.set(key, self.revision, &body) {
            Ok(true) => tracing::trace!("Persisted {} revision {}", key, self.revision),
            Ok(false) => tracing::warn!(
                "Storage refused {} revision {} as stale",
                key,
                self.revision
            ),
            Err(e) => tracing::warn!("Failed to persist {}: {}", key, e),
        }
    }
}
