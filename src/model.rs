use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directions::RouteEstimate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AddressId(pub u64);

impl Display for AddressId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SampleId(pub u64);

impl Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which end of a commute an address sits on. Samples are only ever taken
/// from an origin to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(alias = "home")]
    Origin,
    #[serde(alias = "work")]
    Destination,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Origin => write!(f, "origin"),
            Role::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown address role '{0}', expected 'origin' ('home') or 'destination' ('work')")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "origin" | "home" => Ok(Role::Origin),
            "destination" | "work" => Ok(Role::Destination),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub label: String,
    pub address: String,
    pub role: Role,
}

/// The analytic unit: every sample taken from `origin` to `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub origin: AddressId,
    pub destination: AddressId,
}

impl Route {
    pub fn new(origin: AddressId, destination: AddressId) -> Route {
        Route {
            origin,
            destination,
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Day of week (0 = Monday) and hour of day a sample was collected in.
/// Fixed at write time and never recomputed from the timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeSlot {
    pub day_of_week: u8,
    pub hour: u8,
}

impl TimeSlot {
    pub fn day_name(&self) -> &'static str {
        day_name(self.day_of_week)
    }
}

pub fn day_name(day_of_week: u8) -> &'static str {
    DAY_NAMES
        .get(day_of_week as usize)
        .copied()
        .unwrap_or("Unknown")
}

/// A sample as handed to the store, before it has been assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSample {
    pub route: Route,
    pub duration_seconds: u32,
    pub traffic_duration_seconds: u32,
    pub distance_meters: u32,
    pub collected_at: DateTime<Utc>,
    pub slot: TimeSlot,
}

impl NewSample {
    pub fn from_estimate(
        route: Route,
        estimate: &RouteEstimate,
        collected_at: DateTime<Utc>,
        slot: TimeSlot,
    ) -> NewSample {
        NewSample {
            route,
            duration_seconds: estimate.duration_seconds,
            traffic_duration_seconds: estimate.traffic_or_plain_seconds(),
            distance_meters: estimate.distance_meters,
            collected_at,
            slot,
        }
    }

    pub fn with_id(self, id: SampleId) -> CommuteSample {
        CommuteSample {
            id,
            origin_id: self.route.origin,
            destination_id: self.route.destination,
            duration_seconds: self.duration_seconds,
            traffic_duration_seconds: self.traffic_duration_seconds,
            distance_meters: self.distance_meters,
            collected_at: self.collected_at,
            slot: self.slot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommuteSample {
    pub id: SampleId,
    pub origin_id: AddressId,
    pub destination_id: AddressId,
    pub duration_seconds: u32,
    pub traffic_duration_seconds: u32,
    pub distance_meters: u32,
    pub collected_at: DateTime<Utc>,
    pub slot: TimeSlot,
}

impl CommuteSample {
    #[inline]
    pub fn route(&self) -> Route {
        Route::new(self.origin_id, self.destination_id)
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::{day_name, Role};

    #[test]
    fn role_accepts_aliases() {
        assert_eq!(Role::from_str("home").unwrap(), Role::Origin);
        assert_eq!(Role::from_str("Work").unwrap(), Role::Destination);
        assert_eq!(Role::from_str("origin").unwrap(), Role::Origin);
        assert!(Role::from_str("office").is_err());
    }

    #[test]
    fn day_names_start_on_monday() {
        assert_eq!(day_name(0), "Monday");
        assert_eq!(day_name(6), "Sunday");
        assert_eq!(day_name(7), "Unknown");
    }
}
