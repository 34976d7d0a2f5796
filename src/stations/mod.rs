use std::collections::BTreeMap;

use crate::config::Config;
use crate::CatcherError;

/// Immutable lookup table from station name to stream URL
#[derive(Debug, Clone)]
pub struct StationRegistry {
    stations: BTreeMap<String, String>,
    default_station: String,
}

impl StationRegistry {
    /// Create a registry; the default station must be one of the entries
    pub fn new(
        stations: BTreeMap<String, String>,
        default_station: impl Into<String>,
    ) -> Result<Self, CatcherError> {
        let default_station = default_station.into();
        if !stations.contains_key(&default_station) {
            return Err(CatcherError::InvalidConfig(format!(
                "default station {} is not in the station list",
                default_station
            )));
        }

        Ok(Self {
            stations,
            default_station,
        })
    }

    /// Build the registry from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self, CatcherError> {
        Self::new(config.stations.clone(), config.default_station.clone())
    }

    /// Stream URL for a station
    pub fn lookup(&self, name: &str) -> Result<&str, CatcherError> {
        self.stations
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CatcherError::UnknownStation(name.to_string()))
    }

    /// Station used when the caller names none
    pub fn default_station(&self) -> &str {
        &self.default_station
    }

    /// Resolve an optional station name to `(name, url)`
    pub fn resolve<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a str), CatcherError> {
        let name = name.unwrap_or(self.default_station.as_str());
        Ok((name, self.lookup(name)?))
    }

    /// All stations in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stations.iter().map(|(name, url)| (name.as_str(), url.as_str()))
    }
}
