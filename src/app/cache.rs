//! Explicit analysis cache for interactive front-ends.
//!
//! The TUI flips between stages and filters frequently; each distinct
//! `(stage, filter, policy)` combination is analyzed once per loaded file.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::domain::{ClassifyPolicy, FilterParams, Stage};
use crate::engine::Analysis;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub stage: Stage,
    pub filter: FilterParams,
    pub policy: ClassifyPolicy,
}

#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: HashMap<CacheKey, Analysis>,
    hits: usize,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached analysis for `key`, computing it on a miss.
    ///
    /// Failed computations are not cached.
    pub fn get_or_compute<F>(&mut self, key: CacheKey, compute: F) -> Result<&Analysis, AppError>
    where
        F: FnOnce() -> Result<Analysis, AppError>,
    {
        match self.entries.entry(key) {
            Entry::Occupied(e) => {
                self.hits += 1;
                Ok(e.into_mut())
            }
            Entry::Vacant(v) => {
                debug!(stage = v.key().stage.key(), "analysis cache miss");
                let analysis = compute()?;
                Ok(v.insert(analysis))
            }
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&Analysis> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleConfig, generate_history};
    use crate::engine::analyze;

    fn key(stage: Stage) -> CacheKey {
        CacheKey {
            stage,
            filter: FilterParams::default(),
            policy: ClassifyPolicy::default(),
        }
    }

    #[test]
    fn computes_once_per_key() {
        let table = generate_history(&SampleConfig::default()).unwrap();
        let cfg = Stage::Fw.default_config();
        let mut cache = AnalysisCache::new();
        let mut calls = 0;

        for _ in 0..3 {
            cache
                .get_or_compute(key(Stage::Fw), || {
                    calls += 1;
                    analyze(&table, &cfg, ClassifyPolicy::default(), &FilterParams::default())
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
        assert_eq!((cache.hits(), cache.len()), (2, 1));

        let mut other = key(Stage::Fw);
        other.policy.include_unknown_in_total = true;
        assert!(cache.get(&other).is_none());
    }

    #[test]
    fn errors_are_not_cached() {
        let mut cache = AnalysisCache::new();
        let err = cache
            .get_or_compute(key(Stage::Pcb), || Err(AppError::input("Missing required column(s): `PcbPass`")))
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(cache.is_empty());
    }
}
