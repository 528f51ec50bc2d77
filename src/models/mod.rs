//! Domain models for the travel memory engine.
//!
//! # Memories
//!
//! Each memory is a persisted document owned by one store:
//!
//! - [`FlightMemory`]: the flight form. Airports, dates, [`TripType`],
//!   passengers and, for multi-destination trips, the ordered [`FlightLeg`]s.
//! - [`AccommodationMemory`]: one [`AccommodationEntry`] per destination plus
//!   the default [`Budget`] every new entry starts from.
//! - [`TravelMemory`]: the trip-wide traveler record, kept equal to the
//!   flight passengers.
//! - [`NegativePreferencesMemory`]: things the traveller wants to avoid.
//!
//! # Chat input
//!
//! [`ClassifiedIntent`] is the untrusted output of the chat classifier;
//! [`WidgetPrompt`] and [`ControlAction`] are what the engine answers with.

mod accommodation;
mod budget;
mod destination;
mod flight;
mod intent;
mod negative;
mod preferences;
mod travel;

pub use accommodation::*;
pub use budget::*;
pub use destination::*;
pub use flight::*;
pub use intent::*;
pub use negative::*;
pub use preferences::*;
pub use travel::*;
