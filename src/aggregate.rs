use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    model::{CommuteSample, Route, TimeSlot},
    store::{SampleStore, StoreError},
};

/// Buckets with fewer samples than this are left out of the per-day view.
pub const MIN_BUCKET_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketSummary {
    pub hour: u8,
    pub mean_seconds: f64,
    pub count: usize,
}

impl BucketSummary {
    /// Mean traffic duration in whole minutes, truncated.
    #[inline]
    pub fn mean_minutes(&self) -> u32 {
        (self.mean_seconds / 60.0) as u32
    }
}

/// Qualifying buckets keyed by day of week (0 = Monday), hours ascending.
pub type DayBuckets = BTreeMap<u8, Vec<BucketSummary>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RouteStatistics {
    pub min_minutes: u32,
    pub max_minutes: u32,
    pub avg_minutes: u32,
    pub total_samples: usize,
}

/// Groups samples by their stored slot. The timestamp is never consulted.
pub fn day_buckets(samples: &[CommuteSample], min_samples: usize) -> DayBuckets {
    let mut totals: BTreeMap<TimeSlot, (u64, usize)> = BTreeMap::new();
    for sample in samples {
        let entry = totals.entry(sample.slot).or_default();
        entry.0 += sample.traffic_duration_seconds as u64;
        entry.1 += 1;
    }

    let mut days = DayBuckets::new();
    for (slot, (sum, count)) in totals {
        if count < min_samples {
            continue;
        }
        days.entry(slot.day_of_week).or_default().push(BucketSummary {
            hour: slot.hour,
            mean_seconds: sum as f64 / count as f64,
            count,
        });
    }
    days
}

pub fn route_statistics(samples: &[CommuteSample]) -> RouteStatistics {
    let durations = samples.iter().map(|sample| sample.traffic_duration_seconds);
    let (Some(min), Some(max)) = (durations.clone().min(), durations.clone().max()) else {
        return RouteStatistics::default();
    };
    let sum: u64 = durations.map(u64::from).sum();
    let mean = sum as f64 / samples.len() as f64;
    RouteStatistics {
        min_minutes: min / 60,
        max_minutes: max / 60,
        avg_minutes: (mean / 60.0) as u32,
        total_samples: samples.len(),
    }
}

/// Read-only view over a sample store.
pub struct Aggregator<'a, S: SampleStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SampleStore + ?Sized> Aggregator<'a, S> {
    pub fn new(store: &'a S) -> Aggregator<'a, S> {
        Aggregator { store }
    }

    pub fn buckets(&self, route: Route) -> Result<DayBuckets, StoreError> {
        let samples = self.store.samples_for_route(route)?;
        Ok(day_buckets(&samples, MIN_BUCKET_SAMPLES))
    }

    pub fn statistics(&self, route: Route) -> Result<RouteStatistics, StoreError> {
        let samples = self.store.samples_for_route(route)?;
        Ok(route_statistics(&samples))
    }
}

#[cfg(test)]
mod test {
    use approx::assert_abs_diff_eq;
    use chrono::{TimeZone, Utc};

    use super::{day_buckets, route_statistics, Aggregator, RouteStatistics, MIN_BUCKET_SAMPLES};
    use crate::{
        model::{AddressId, NewSample, Route, TimeSlot},
        store::{InMemoryStore, SampleStore},
    };

    fn route() -> Route {
        Route::new(AddressId(1), AddressId(2))
    }

    fn push(store: &InMemoryStore, day_of_week: u8, hour: u8, traffic: u32) {
        store
            .append(NewSample {
                route: route(),
                duration_seconds: traffic,
                traffic_duration_seconds: traffic,
                distance_meters: 10_000,
                collected_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                slot: TimeSlot { day_of_week, hour },
            })
            .unwrap();
    }

    #[test]
    fn bucket_of_three_is_reported_in_truncated_minutes() {
        let store = InMemoryStore::new();
        for traffic in [600, 700, 800] {
            push(&store, 0, 8, traffic);
        }
        let buckets = Aggregator::new(&store).buckets(route()).unwrap();
        let monday = &buckets[&0];
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].hour, 8);
        assert_eq!(monday[0].count, 3);
        assert_abs_diff_eq!(monday[0].mean_seconds, 700.0, epsilon = 1e-9);
        assert_eq!(monday[0].mean_minutes(), 11);
    }

    #[test]
    fn thin_buckets_and_empty_days_are_left_out() {
        let store = InMemoryStore::new();
        push(&store, 0, 8, 600);
        push(&store, 0, 8, 600);
        for _ in 0..3 {
            push(&store, 0, 9, 900);
        }
        push(&store, 3, 7, 500);
        push(&store, 3, 7, 500);

        let buckets = Aggregator::new(&store).buckets(route()).unwrap();
        assert_eq!(buckets.keys().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(buckets[&0].len(), 1);
        assert_eq!(buckets[&0][0].hour, 9);
        assert!(buckets[&0].iter().all(|bucket| bucket.count >= MIN_BUCKET_SAMPLES));
    }

    #[test]
    fn hours_within_a_day_are_ascending() {
        let store = InMemoryStore::new();
        for hour in [18, 7, 12] {
            for _ in 0..3 {
                push(&store, 5, hour, 1000);
            }
        }
        let samples = store.samples_for_route(route()).unwrap();
        let hours: Vec<u8> = day_buckets(&samples, MIN_BUCKET_SAMPLES)[&5]
            .iter()
            .map(|bucket| bucket.hour)
            .collect();
        assert_eq!(hours, vec![7, 12, 18]);
    }

    #[test]
    fn statistics_without_samples_are_zero() {
        let store = InMemoryStore::new();
        assert_eq!(
            Aggregator::new(&store).statistics(route()).unwrap(),
            RouteStatistics::default()
        );
    }

    #[test]
    fn statistics_ignore_bucket_threshold() {
        let store = InMemoryStore::new();
        push(&store, 0, 8, 600);
        push(&store, 2, 9, 1200);
        push(&store, 4, 17, 1800);
        assert_eq!(
            Aggregator::new(&store).statistics(route()).unwrap(),
            RouteStatistics {
                min_minutes: 10,
                max_minutes: 30,
                avg_minutes: 20,
                total_samples: 3,
            }
        );
    }

    #[test]
    fn statistics_truncate_minutes() {
        let store = InMemoryStore::new();
        push(&store, 0, 8, 659);
        push(&store, 0, 8, 721);
        let samples = store.samples_for_route(route()).unwrap();
        let stats = route_statistics(&samples);
        assert_eq!(stats.min_minutes, 10);
        assert_eq!(stats.max_minutes, 12);
        assert_eq!(stats.avg_minutes, 11);
    }

    #[test]
    fn aggregation_is_repeatable() {
        let store = InMemoryStore::new();
        for traffic in [600, 660, 720, 780] {
            push(&store, 1, 8, traffic);
        }
        let aggregator = Aggregator::new(&store);
        assert_eq!(
            aggregator.buckets(route()).unwrap(),
            aggregator.buckets(route()).unwrap()
        );
    }
}
