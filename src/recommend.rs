use std::{fmt::Display, str::FromStr};

use serde::Serialize;

use crate::{
    aggregate::{Aggregator, BucketSummary, DayBuckets},
    model::{day_name, Route},
    store::{SampleStore, StoreError},
};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// A wall-clock time of day with minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockTimeError {
    #[error("Invalid time format '{0}'. Expected HH:MM (e.g., 09:00)")]
    Format(String),
    #[error("Invalid time '{0}'. Hour must be 0-23 and minute 0-59")]
    OutOfRange(String),
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<ClockTime> {
        (hour < 24 && minute < 60).then_some(ClockTime { hour, minute })
    }

    /// Wraps any minute count onto the 24 hour ring.
    pub fn from_minutes(minutes: i64) -> ClockTime {
        let minutes = minutes.rem_euclid(MINUTES_PER_DAY);
        ClockTime {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    #[inline]
    pub fn minutes(&self) -> i64 {
        self.hour as i64 * 60 + self.minute as i64
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl FromStr for ClockTime {
    type Err = ClockTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_error = || ClockTimeError::Format(s.to_string());
        let (hour, minute) = s.split_once(':').ok_or_else(format_error)?;
        if minute.contains(':') {
            return Err(format_error());
        }
        let hour: u32 = hour.trim().parse().map_err(|_| format_error())?;
        let minute: u32 = minute.trim().parse().map_err(|_| format_error())?;
        if hour > 23 || minute > 59 {
            return Err(ClockTimeError::OutOfRange(s.to_string()));
        }
        Ok(ClockTime {
            hour: hour as u8,
            minute: minute as u8,
        })
    }
}

impl Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub day_of_week: u8,
    pub day: &'static str,
    pub departure: ClockTime,
    pub expected_duration_minutes: u32,
    pub data_points: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error(transparent)]
    InvalidArrival(#[from] ClockTimeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The quickest bucket of a day. Strict comparison keeps the earliest hour
/// on ties since buckets arrive in ascending hour order.
fn fastest_bucket(buckets: &[BucketSummary]) -> Option<&BucketSummary> {
    buckets.iter().fold(None, |best, bucket| match best {
        Some(best) if best.mean_seconds <= bucket.mean_seconds => Some(best),
        _ => Some(bucket),
    })
}

/// One recommendation per day that has qualifying buckets, Monday first.
pub fn recommend_departures(buckets: &DayBuckets, arrival: ClockTime) -> Vec<Recommendation> {
    buckets
        .iter()
        .filter_map(|(&day_of_week, day_buckets)| {
            let best = fastest_bucket(day_buckets)?;
            let expected = best.mean_minutes();
            Some(Recommendation {
                day_of_week,
                day: day_name(day_of_week),
                departure: ClockTime::from_minutes(arrival.minutes() - expected as i64),
                expected_duration_minutes: expected,
                data_points: best.count,
            })
        })
        .collect()
}

pub struct Recommender<'a, S: SampleStore + ?Sized> {
    aggregator: Aggregator<'a, S>,
}

impl<'a, S: SampleStore + ?Sized> Recommender<'a, S> {
    pub fn new(store: &'a S) -> Recommender<'a, S> {
        Recommender {
            aggregator: Aggregator::new(store),
        }
    }

    /// An empty list means there isn't enough history yet, not a failure.
    pub fn recommend(
        &self,
        route: Route,
        target_arrival: &str,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let arrival: ClockTime = target_arrival.parse()?;
        self.recommend_for(route, arrival)
    }

    pub fn recommend_for(
        &self,
        route: Route,
        arrival: ClockTime,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let buckets = self.aggregator.buckets(route)?;
        Ok(recommend_departures(&buckets, arrival))
    }
}
