pub mod google;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use google::GoogleDirections;

/// What the routing service says about one origin/destination query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub duration_seconds: u32,
    pub traffic_duration_seconds: Option<u32>,
    pub distance_meters: u32,
}

impl RouteEstimate {
    /// Traffic-adjusted duration, or the plain duration when the service
    /// didn't report one.
    #[inline]
    pub fn traffic_or_plain_seconds(&self) -> u32 {
        self.traffic_duration_seconds
            .unwrap_or(self.duration_seconds)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("service returned status {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Service {
        status: String,
        message: Option<String>,
    },
    #[error("no route found")]
    NoRoute,
}

pub trait RoutingProvider: Send + Sync {
    /// Driving directions from `origin` to `destination` leaving at
    /// `departure`, with traffic taken into account.
    fn query(
        &self,
        origin: &str,
        destination: &str,
        departure: DateTime<Utc>,
    ) -> impl Future<Output = Result<RouteEstimate, RoutingError>> + Send;
}
