use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::{RouteEstimate, RoutingError, RoutingProvider};

pub const DEFAULT_DIRECTIONS_ENDPOINT: &str =
    "https://maps.googleapis.com/maps/api/directions/json";

#[derive(Debug, Clone, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Clone, Deserialize)]
struct DirectionsRoute {
    #[serde(default)]
    legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Clone, Deserialize)]
struct DirectionsLeg {
    duration: ValueItem,
    #[serde(default)]
    duration_in_traffic: Option<ValueItem>,
    distance: ValueItem,
}

#[derive(Debug, Clone, Deserialize)]
struct ValueItem {
    value: u32,
}

/// Google Maps Directions API client, driving mode.
#[derive(Debug, Clone)]
pub struct GoogleDirections {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleDirections {
    pub fn new(
        endpoint: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<GoogleDirections, RoutingError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(GoogleDirections {
            client,
            endpoint,
            api_key,
        })
    }
}

impl RoutingProvider for GoogleDirections {
    async fn query(
        &self,
        origin: &str,
        destination: &str,
        departure: DateTime<Utc>,
    ) -> Result<RouteEstimate, RoutingError> {
        debug!("Requesting directions from {:?} to {:?}", origin, destination);
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("origin", origin.to_string()),
                ("destination", destination.to_string()),
                ("mode", "driving".to_string()),
                ("departure_time", departure.timestamp().to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?
            .text()
            .await?;
        parse_directions(&body)
    }
}

/// Pulls the first leg of the first route out of a Directions response.
fn parse_directions(body: &str) -> Result<RouteEstimate, RoutingError> {
    let response: DirectionsResponse = serde_json::from_str(body)?;
    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" | "NOT_FOUND" => return Err(RoutingError::NoRoute),
        _ => {
            return Err(RoutingError::Service {
                status: response.status,
                message: response.error_message,
            })
        }
    }
    let leg = response
        .routes
        .into_iter()
        .next()
        .and_then(|route| route.legs.into_iter().next())
        .ok_or(RoutingError::NoRoute)?;
    Ok(RouteEstimate {
        duration_seconds: leg.duration.value,
        traffic_duration_seconds: leg.duration_in_traffic.map(|item| item.value),
        distance_meters: leg.distance.value,
    })
}
