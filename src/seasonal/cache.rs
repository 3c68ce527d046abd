//! Profile cache
//!
//! Pattern detection walks the full history, so profiles are cached per
//! agent and recomputed only when the history's fingerprint changes. The
//! cache is an explicit object owned by the orchestrator (or whoever drives
//! the pipeline); it is read-mostly and last-writer-wins safe, the worst a
//! stale entry can cost being one redundant recomputation.

use crate::seasonal::detect::{series_fingerprint, PatternDetector};
use crate::seasonal::profile::SeasonalProfile;
use crate::time_series::TimeSeries;
use std::collections::HashMap;

/// Per-agent cache of detected seasonal profiles.
#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: HashMap<String, SeasonalProfile>,
    detector: PatternDetector,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached profile for `agent_id`, recomputing it when the
    /// history's fingerprint no longer matches.
    pub fn get_or_compute(&mut self, agent_id: &str, history: &TimeSeries) -> SeasonalProfile {
        let fingerprint = series_fingerprint(history);
        if let Some(cached) = self.entries.get(agent_id) {
            if cached.fingerprint == fingerprint {
                return cached.clone();
            }
            log::debug!("profile cache: history changed for agent {}", agent_id);
        }

        let profile = self.detector.detect(history);
        self.entries.insert(agent_id.to_string(), profile.clone());
        profile
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
