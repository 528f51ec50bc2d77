use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::destination::{same_city, Destination, LocationCandidate};
use crate::error::{MemoryError, MemoryResult};

/// Seats on one booking: adults plus children. Infants travel on a lap.
pub const MAX_SEATED_PASSENGERS: u8 = 9;

/// Trip shape selected in the flight form.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    Oneway,
    #[default]
    Roundtrip,
    Multi,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oneway => "oneway",
            Self::Roundtrip => "roundtrip",
            Self::Multi => "multi",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "oneway" => Some(Self::Oneway),
            "roundtrip" | "return" => Some(Self::Roundtrip),
            "multi" | "multicity" | "multidestination" => Some(Self::Multi),
            _ => None,
        }
    }
}

/// Headcount shared by flight passengers and the trip-wide traveler record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Travelers {
    pub adults: u8,
    pub children: u8,
    pub infants: u8,
}

impl Travelers {
    pub fn new(adults: u8, children: u8, infants: u8) -> Self {
        Self {
            adults,
            children,
            infants,
        }
    }

    pub fn validate(&self) -> MemoryResult<()> {
        if self.adults < 1 {
            return Err(MemoryError::validation("at least one adult is required"));
        }
        if self.infants > self.adults {
            return Err(MemoryError::validation(format!(
                "{} infants need at least as many adults (got {})",
                self.infants, self.adults
            )));
        }
        if self.adults as u16 + self.children as u16 > MAX_SEATED_PASSENGERS as u16 {
            return Err(MemoryError::validation(format!(
                "at most {} seated passengers per booking",
                MAX_SEATED_PASSENGERS
            )));
        }
        Ok(())
    }

    pub fn total(&self) -> u16 {
        self.adults as u16 + self.children as u16 + self.infants as u16
    }
}

impl Default for Travelers {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    #[serde(default)]
    pub iata: Option<String>,
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl Airport {
    /// A city-level endpoint with no airport chosen yet.
    pub fn city(destination: &Destination) -> Self {
        Self {
            iata: None,
            city: destination.city.clone(),
            country: destination.country.clone(),
            country_code: destination.country_code.clone(),
            lat: None,
            lng: None,
        }
    }

    pub fn destination(&self) -> Destination {
        Destination {
            city: self.city.clone(),
            country: self.country.clone(),
            country_code: self.country_code.clone(),
        }
    }
}

impl From<&LocationCandidate> for Airport {
    fn from(candidate: &LocationCandidate) -> Self {
        Self {
            iata: candidate.iata.clone(),
            city: candidate.city_name().to_string(),
            country: candidate.country.clone(),
            country_code: Some(candidate.country_code.clone()),
            lat: Some(candidate.lat),
            lng: Some(candidate.lng),
        }
    }
}

/// One hop of a multi-destination itinerary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightLeg {
    pub from: Option<Airport>,
    pub to: Airport,
    pub date: Option<NaiveDate>,
}

/// Persisted state of the flight search form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightMemory {
    pub departure: Option<Airport>,
    pub arrival: Option<Airport>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub trip_type: TripType,
    pub passengers: Travelers,
    /// Ordered legs; only meaningful when `trip_type` is `Multi`.
    pub legs: Vec<FlightLeg>,
}

/// Partial update of the flight form. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightPatch {
    pub departure: Option<Airport>,
    pub arrival: Option<Airport>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub trip_type: Option<TripType>,
    pub passengers: Option<Travelers>,
    pub legs: Option<Vec<FlightLeg>>,
}

impl FlightPatch {
    /// Whether applying this patch can change the set of trip destinations.
    pub fn touches_destinations(&self) -> bool {
        self.arrival.is_some()
            || self.trip_type.is_some()
            || self.legs.is_some()
            || self.departure.is_some()
    }

    pub fn touches_dates(&self) -> bool {
        self.departure_date.is_some() || self.return_date.is_some() || self.legs.is_some()
    }
}

impl FlightMemory {
    pub fn validate(&self) -> MemoryResult<()> {
        self.passengers.validate()?;
        if let (Some(out), Some(back)) = (self.departure_date, self.return_date) {
            if back < out {
                return Err(MemoryError::validation(format!(
                    "return date {} is before departure date {}",
                    back, out
                )));
            }
        }
        let mut previous: Option<NaiveDate> = None;
        for leg in &self.legs {
            if let (Some(prev), Some(date)) = (previous, leg.date) {
                if date < prev {
                    return Err(MemoryError::validation(format!(
                        "leg to {} on {} is before the previous leg",
                        leg.to.city, date
                    )));
                }
            }
            previous = leg.date.or(previous);
        }
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: FlightPatch) {
        if let Some(trip_type) = patch.trip_type {
            self.set_trip_type(trip_type);
        }
        if let Some(departure) = patch.departure {
            self.departure = Some(departure);
        }
        if let Some(arrival) = patch.arrival {
            self.arrival = Some(arrival);
        }
        if let Some(date) = patch.departure_date {
            self.departure_date = Some(date);
        }
        if let Some(date) = patch.return_date {
            self.return_date = Some(date);
        }
        if let Some(passengers) = patch.passengers {
            self.passengers = passengers;
        }
        if let Some(legs) = patch.legs {
            self.legs = legs;
        }
    }

    /// Switches trip shape, converting the itinerary so no destination is lost
    /// silently: single → multi seeds the first leg from departure/arrival,
    /// multi → single keeps the first leg's target as arrival.
    pub fn set_trip_type(&mut self, trip_type: TripType) {
        if trip_type == self.trip_type {
            return;
        }
        match (self.trip_type, trip_type) {
            (_, TripType::Multi) => {
                if self.legs.is_empty() {
                    if let Some(arrival) = self.arrival.clone() {
                        self.legs.push(FlightLeg {
                            from: self.departure.clone(),
                            to: arrival,
                            date: self.departure_date,
                        });
                    }
                }
            }
            (TripType::Multi, single) => {
                if let Some(first) = self.legs.first() {
                    self.arrival = Some(first.to.clone());
                    if self.departure_date.is_none() {
                        self.departure_date = first.date;
                    }
                }
                self.legs.clear();
                if single == TripType::Oneway {
                    self.return_date = None;
                }
            }
            (_, TripType::Oneway) => self.return_date = None,
            (_, TripType::Roundtrip) => {}
        }
        self.trip_type = trip_type;
    }

    /// Destinations the trip stays in, in itinerary order.
    ///
    /// A multi-destination leg back to the departure city is the way home,
    /// not a stay.
    pub fn destinations(&self) -> Vec<Destination> {
        match self.trip_type {
            TripType::Oneway | TripType::Roundtrip => {
                self.arrival.iter().map(Airport::destination).collect()
            }
            TripType::Multi => {
                let home = self.departure.as_ref().map(|d| d.city.as_str());
                let mut out: Vec<Destination> = Vec::new();
                for leg in &self.legs {
                    if home.is_some_and(|h| same_city(h, &leg.to.city)) {
                        continue;
                    }
                    if out.iter().any(|d| d.matches_city(&leg.to.city)) {
                        continue;
                    }
                    out.push(leg.to.destination());
                }
                out
            }
        }
    }

    /// Stay dates for a destination derived from the itinerary.
    pub fn stay_dates(&self, city: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self.trip_type {
            TripType::Oneway | TripType::Roundtrip => (self.departure_date, self.return_date),
            TripType::Multi => {
                let Some(pos) = self.legs.iter().position(|l| same_city(&l.to.city, city)) else {
                    return (None, None);
                };
                let check_in = self.legs[pos].date;
                let check_out = self.legs.get(pos + 1).and_then(|l| l.date);
                (check_in, check_out)
            }
        }
    }

    /// Adds a stay to the itinerary. A second distinct city turns a single
    /// destination trip into a multi-destination one.
    pub fn add_destination(&mut self, destination: &Destination, date: Option<NaiveDate>) {
        if self.destinations().iter().any(|d| d.matches_city(&destination.city)) {
            return;
        }
        if self.trip_type != TripType::Multi {
            if self.arrival.is_none() {
                self.arrival = Some(Airport::city(destination));
                if date.is_some() {
                    self.departure_date = date;
                }
                return;
            }
            self.set_trip_type(TripType::Multi);
        }
        let from = self
            .legs
            .last()
            .map(|l| l.to.clone())
            .or_else(|| self.departure.clone());
        self.legs.push(FlightLeg {
            from,
            to: Airport::city(destination),
            date,
        });
    }

    /// Removes a stay and every leg that points at it. The leg after a
    /// removed one inherits its origin so the chain stays connected.
    pub fn remove_destination(&mut self, city: &str) -> bool {
        match self.trip_type {
            TripType::Oneway | TripType::Roundtrip => {
                if self.arrival.as_ref().is_some_and(|a| same_city(&a.city, city)) {
                    self.arrival = None;
                    true
                } else {
                    false
                }
            }
            TripType::Multi => {
                let before = self.legs.len();
                let mut kept: Vec<FlightLeg> = Vec::with_capacity(before);
                let mut carried_from: Option<Option<Airport>> = None;
                for mut leg in self.legs.drain(..) {
                    if same_city(&leg.to.city, city) {
                        if carried_from.is_none() {
                            carried_from = Some(leg.from.clone());
                        }
                        continue;
                    }
                    if let Some(from) = carried_from.take() {
                        leg.from = from;
                    }
                    kept.push(leg);
                }
                self.legs = kept;
                if self.arrival.as_ref().is_some_and(|a| same_city(&a.city, city)) {
                    self.arrival = None;
                }
                self.legs.len() != before
            }
        }
    }

    pub fn has_destination(&self) -> bool {
        !self.destinations().is_empty()
    }

    /// Outbound date is known: departure date for single trips, first leg's
    /// date for multi.
    pub fn has_dates(&self) -> bool {
        match self.trip_type {
            TripType::Multi => {
                self.legs.first().and_then(|l| l.date).is_some() || self.departure_date.is_some()
            }
            _ => self.departure_date.is_some(),
        }
    }

    pub fn needs_return_date(&self) -> bool {
        self.trip_type == TripType::Roundtrip && self.return_date.is_none()
    }
}
