use serde::{Deserialize, Serialize};

use super::flight::Travelers;
use crate::error::MemoryResult;

/// Trip-wide record of who is travelling.
///
/// `travelers` always mirrors `FlightMemory::passengers`; the engine writes
/// both in the same operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TravelMemory {
    pub travelers: Travelers,
    /// Set once the headcount came from the user rather than the default.
    pub travelers_confirmed: bool,
    pub trip_purpose: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TravelPatch {
    pub travelers: Option<Travelers>,
    pub trip_purpose: Option<String>,
    pub notes: Option<String>,
}

impl TravelMemory {
    pub fn validate(&self) -> MemoryResult<()> {
        self.travelers.validate()
    }

    pub fn apply_patch(&mut self, patch: TravelPatch) {
        if let Some(travelers) = patch.travelers {
            self.travelers = travelers;
            self.travelers_confirmed = true;
        }
        if let Some(purpose) = patch.trip_purpose {
            self.trip_purpose = Some(purpose);
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
    }
}
