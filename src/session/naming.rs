use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::OutputLayout;
use crate::utils;

/// Hands out base names for the attempts of one session.
///
/// The first attempt is named after the station itself. Resumed attempts get
/// the station name plus the Unix timestamp, with a counter appended when that
/// name was already used in this session or its files already exist on disk.
#[derive(Debug)]
pub struct BaseNamer {
    station: String,
    used: HashSet<String>,
}

impl BaseNamer {
    pub fn new(station: &str) -> Self {
        Self {
            station: utils::sanitize_filename(station),
            used: HashSet::new(),
        }
    }

    /// Name for the first attempt; overwrites output left by an earlier session
    pub fn first(&mut self) -> String {
        let name = self.station.clone();
        self.used.insert(name.clone());
        name
    }

    /// Name for a resumed attempt started at `now`
    pub fn resumed(&mut self, now: DateTime<Utc>, layout: &OutputLayout) -> String {
        let stem = format!("{}-{}", self.station, now.timestamp());

        let mut candidate = stem.clone();
        let mut counter = 1;
        while self.used.contains(&candidate) || layout.is_taken(&candidate) {
            counter += 1;
            candidate = format!("{}-{}", stem, counter);
        }

        self.used.insert(candidate.clone());
        candidate
    }
}
