use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::time::timeout;

use crate::{
    clock::{Clock, SlotZone, SystemClock},
    directions::{RouteEstimate, RoutingError, RoutingProvider},
    model::{Address, AddressId, CommuteSample, NewSample, Role, Route},
    store::{AddressRegistry, SampleStore, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("routing service did not answer within {0:?}")]
    Timeout(Duration),
    #[error("failed to store sample: {0}")]
    Store(#[from] StoreError),
    #[error("sample writer stopped before the sample was stored")]
    Interrupted,
}

/// A stored sample together with the addresses it was taken between.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSample {
    pub origin: Address,
    pub destination: Address,
    pub sample: CommuteSample,
}

impl fmt::Display for PairSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {}: {} min",
            self.origin.label,
            self.destination.label,
            self.sample.traffic_duration_seconds / 60
        )
    }
}

/// One origin/destination pair that could not be sampled.
#[derive(Debug)]
pub struct PairFailure {
    pub origin: Address,
    pub destination: Address,
    pub error: SampleError,
}

#[derive(Debug, Default)]
pub struct SampleRunReport {
    pub collected: Vec<PairSample>,
    pub failures: Vec<PairFailure>,
}

impl SampleRunReport {
    fn fail(&mut self, origin: Address, destination: Address, error: SampleError) {
        warn!(
            "Error sampling {} → {}: {}",
            origin.label, destination.label, error
        );
        self.failures.push(PairFailure {
            origin,
            destination,
            error,
        });
    }
}

#[derive(Debug)]
pub enum SampleRunOutcome {
    /// No routing service was configured, nothing was queried.
    Unconfigured,
    /// Either side of the commute has no addresses yet.
    NoPairs { origins: usize, destinations: usize },
    Completed(SampleRunReport),
}

#[derive(Debug, thiserror::Error)]
pub enum CurrentEstimateError {
    #[error("no routing service configured")]
    Unconfigured,
    #[error("address {0} not found")]
    UnknownAddress(AddressId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Query(#[from] SampleError),
}

pub struct RouteSampler<S, R, C = SystemClock> {
    store: Arc<S>,
    routing: Option<R>,
    clock: C,
    zone: SlotZone,
    query_timeout: Duration,
}

impl<S, R> RouteSampler<S, R, SystemClock>
where
    S: AddressRegistry + SampleStore,
    R: RoutingProvider,
{
    pub fn new(
        store: Arc<S>,
        routing: Option<R>,
        zone: SlotZone,
        query_timeout: Duration,
    ) -> RouteSampler<S, R, SystemClock> {
        RouteSampler {
            store,
            routing,
            clock: SystemClock,
            zone,
            query_timeout,
        }
    }
}

impl<S, R, C> RouteSampler<S, R, C>
where
    S: AddressRegistry + SampleStore + 'static,
    R: RoutingProvider,
    C: Clock,
{
    pub fn with_clock<C2: Clock>(self, clock: C2) -> RouteSampler<S, R, C2> {
        RouteSampler {
            store: self.store,
            routing: self.routing,
            clock,
            zone: self.zone,
            query_timeout: self.query_timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.routing.is_some()
    }

    /// Queries every origin x destination pair once at the current instant
    /// and stores a sample for each pair that answered. A failing pair is
    /// reported in the outcome and never stops the others.
    pub async fn sample_all(&self) -> Result<SampleRunOutcome, StoreError> {
        let Some(routing) = &self.routing else {
            warn!("Routing service not configured, cannot sample commute times.");
            return Ok(SampleRunOutcome::Unconfigured);
        };

        let origins = self.store.addresses(Some(Role::Origin))?;
        let destinations = self.store.addresses(Some(Role::Destination))?;
        if origins.is_empty() || destinations.is_empty() {
            info!(
                "Nothing to sample: {} origin(s), {} destination(s) configured.",
                origins.len(),
                destinations.len()
            );
            return Ok(SampleRunOutcome::NoPairs {
                origins: origins.len(),
                destinations: destinations.len(),
            });
        }

        let now = self.clock.now();
        let slot = self.zone.slot(now);
        let pairs: Vec<(&Address, &Address)> = origins
            .iter()
            .flat_map(|origin| {
                destinations
                    .iter()
                    .map(move |destination| (origin, destination))
            })
            .collect();
        debug!("Sampling {} pairs for {:?}", pairs.len(), slot);

        let estimates = join_all(
            pairs
                .iter()
                .map(|(origin, destination)| self.query(routing, origin, destination, now)),
        )
        .await;

        let mut report = SampleRunReport::default();
        let mut pending = Vec::new();
        for ((origin, destination), estimate) in pairs.into_iter().zip(estimates) {
            match estimate {
                Ok(estimate) => {
                    let route = Route::new(origin.id, destination.id);
                    let sample = NewSample::from_estimate(route, &estimate, now, slot);
                    pending.push(((origin.clone(), destination.clone()), sample));
                }
                Err(error) => report.fail(origin.clone(), destination.clone(), error),
            }
        }

        for ((origin, destination), stored) in self.persist(pending).await {
            match stored {
                Ok(sample) => {
                    let collected = PairSample {
                        origin,
                        destination,
                        sample,
                    };
                    info!("Logged: {}", collected);
                    report.collected.push(collected);
                }
                Err(error) => report.fail(origin, destination, error),
            }
        }
        Ok(SampleRunOutcome::Completed(report))
    }

    /// Appends the samples in pair order on the blocking pool. Each append
    /// commits its own write transaction.
    async fn persist(
        &self,
        pending: Vec<((Address, Address), NewSample)>,
    ) -> Vec<((Address, Address), Result<CommuteSample, SampleError>)> {
        if pending.is_empty() {
            return Vec::new();
        }
        let (pairs, samples): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
        let store = self.store.clone();
        let written = tokio::task::spawn_blocking(move || {
            samples
                .into_iter()
                .map(|sample| store.append(sample))
                .collect::<Vec<_>>()
        })
        .await;
        match written {
            Ok(written) => pairs
                .into_iter()
                .zip(written)
                .map(|(pair, stored)| (pair, stored.map_err(SampleError::from)))
                .collect(),
            Err(err) => {
                error!("Sample writer failed: {}", err);
                pairs
                    .into_iter()
                    .map(|pair| (pair, Err(SampleError::Interrupted)))
                    .collect()
            }
        }
    }

    /// A fresh estimate for a single route. Nothing is stored.
    pub async fn current_estimate(
        &self,
        route: Route,
    ) -> Result<RouteEstimate, CurrentEstimateError> {
        let routing = self
            .routing
            .as_ref()
            .ok_or(CurrentEstimateError::Unconfigured)?;
        let origin = self
            .store
            .address(route.origin)?
            .ok_or(CurrentEstimateError::UnknownAddress(route.origin))?;
        let destination = self
            .store
            .address(route.destination)?
            .ok_or(CurrentEstimateError::UnknownAddress(route.destination))?;
        Ok(self
            .query(routing, &origin, &destination, self.clock.now())
            .await?)
    }

    async fn query(
        &self,
        routing: &R,
        origin: &Address,
        destination: &Address,
        departure: DateTime<Utc>,
    ) -> Result<RouteEstimate, SampleError> {
        let request = routing.query(&origin.address, &destination.address, departure);
        match timeout(self.query_timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SampleError::Timeout(self.query_timeout)),
        }
    }
}
