use std::{path::PathBuf, time::Duration};

use chrono_tz::Tz;
use clap::Args;
use log::warn;

use crate::{
    clock::SlotZone,
    directions::{google::DEFAULT_DIRECTIONS_ENDPOINT, GoogleDirections, RoutingError},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
    #[error("failed to build routing client: {0}")]
    Routing(#[from] RoutingError),
}

/// Options shared by every command.
#[derive(Debug, Clone, Args)]
pub struct TrackerConfig {
    /// Path of the commute database.
    #[arg(long, env = "COMMUTER_DB", default_value = "commute_data.db")]
    pub db_path: PathBuf,
    /// Google Maps API key. Without one, nothing can be sampled.
    #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    #[arg(long, default_value = DEFAULT_DIRECTIONS_ENDPOINT)]
    pub directions_endpoint: String,
    /// IANA zone used to file samples under a day and hour. Defaults to the
    /// system's local zone.
    #[arg(long, env = "COMMUTER_TZ")]
    pub timezone: Option<String>,
    /// Give up on a single routing request after this many seconds.
    #[arg(long, default_value_t = 30)]
    pub query_timeout_secs: u64,
}

impl TrackerConfig {
    pub fn slot_zone(&self) -> Result<SlotZone, ConfigError> {
        match &self.timezone {
            None => Ok(SlotZone::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(SlotZone::Named)
                .map_err(|_| ConfigError::UnknownTimeZone(name.clone())),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// `None` when no API key was given, which leaves sampling unconfigured.
    pub fn routing(&self) -> Result<Option<GoogleDirections>, ConfigError> {
        let Some(api_key) = self.api_key.as_ref().filter(|key| !key.is_empty()) else {
            warn!("Google Maps API key not configured.");
            return Ok(None);
        };
        Ok(Some(GoogleDirections::new(
            self.directions_endpoint.clone(),
            api_key.clone(),
            self.query_timeout(),
        )?))
    }
}

#[cfg(test)]
mod test {
    use chrono_tz::Tz;
    use clap::Parser;

    use super::{ConfigError, TrackerConfig};
    use crate::clock::SlotZone;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: TrackerConfig,
    }

    fn parse(args: &[&str]) -> TrackerConfig {
        Cli::parse_from(std::iter::once("commuter").chain(args.iter().copied())).config
    }

    #[test]
    fn zone_defaults_to_local() {
        let config = parse(&["--timezone", "Europe/Paris"]);
        assert_eq!(config.slot_zone().unwrap(), SlotZone::Named(Tz::Europe__Paris));

        let mut config = parse(&[]);
        config.timezone = None;
        assert_eq!(config.slot_zone().unwrap(), SlotZone::Local);
    }

    #[test]
    fn bad_zone_is_reported() {
        let config = parse(&["--timezone", "Mars/Olympus"]);
        assert!(matches!(
            config.slot_zone(),
            Err(ConfigError::UnknownTimeZone(name)) if name == "Mars/Olympus"
        ));
    }

    #[test]
    fn missing_key_leaves_routing_unconfigured() {
        let mut config = parse(&["--query-timeout-secs", "5"]);
        config.api_key = None;
        assert!(config.routing().unwrap().is_none());
        assert_eq!(config.query_timeout().as_secs(), 5);

        config.api_key = Some("secret".to_string());
        assert!(config.routing().unwrap().is_some());
    }
}
