//! The build-once, serve-many holder for a load cycle.
//!
//! A `PulseService` is constructed explicitly and handed to whoever needs the
//! data. `build()` loads and normalizes the extracts on first use; concurrent
//! callers wait on the same lock and then share the result. `rebuild()`
//! replaces the dataset and drops scores computed from the old one. Nothing
//! handed out is mutated afterwards, so readers share it through `Arc`.
use crate::aggregate::build_features;
use crate::anomaly::{score_districts, AnomalyReport, ScoredDistrict};
use crate::config::Config;
use crate::error::{PulseError, Result};
use crate::loader::load_dataset;
use crate::reference::ReferenceTables;
use crate::resources::{estimate, ResourcePlan};
use crate::types::Dataset;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

type ScoreCache = Option<(Arc<Dataset>, Arc<AnomalyReport>)>;

pub struct PulseService {
    config: Config,
    reference: ReferenceTables,
    dataset: Mutex<Option<Arc<Dataset>>>,
    scores: Mutex<ScoreCache>,
}

// A panic mid-build leaves `None` behind, which is a valid state to resume from.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PulseService {
    pub fn new(config: Config, reference: ReferenceTables) -> Self {
        Self {
            config,
            reference,
            dataset: Mutex::new(None),
            scores: Mutex::new(None),
        }
    }

    /// Uses `config.reference` when set, the embedded tables otherwise.
    pub fn from_config(config: Config) -> Result<Self> {
        let reference = match &config.reference {
            Some(path) => ReferenceTables::load(path)?,
            None => ReferenceTables::shared()?.clone(),
        };
        Ok(Self::new(config, reference))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceTables {
        &self.reference
    }

    /// The current dataset if one has been built.
    pub fn dataset(&self) -> Option<Arc<Dataset>> {
        lock(&self.dataset).clone()
    }

    /// Loads the dataset on first call and returns the shared copy after.
    ///
    /// # Errors
    ///
    /// A structural input defect, or no update data at all.
    pub fn build(&self) -> Result<Arc<Dataset>> {
        let mut slot = lock(&self.dataset);
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let fresh = Arc::new(self.load()?);
        *slot = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Reloads unconditionally. On failure the previous dataset stays.
    pub fn rebuild(&self) -> Result<Arc<Dataset>> {
        let mut slot = lock(&self.dataset);
        let fresh = Arc::new(self.load()?);
        *slot = Some(Arc::clone(&fresh));
        *lock(&self.scores) = None;
        Ok(fresh)
    }

    fn load(&self) -> Result<Dataset> {
        info!("Loading data from {}", self.config.data_dir.display());
        let dataset = load_dataset(&self.config, &self.reference)?;
        if dataset.demographic.is_empty() && dataset.biometric.is_empty() {
            return Err(PulseError::EmptyDataset(format!(
                "no demographic or biometric update records under {}",
                self.config.data_dir.display()
            )));
        }
        Ok(dataset)
    }

    /// Scores for the current dataset, computed once and cached. A failed
    /// run caches nothing, so calling again retries.
    pub fn scores(&self) -> Result<Arc<AnomalyReport>> {
        let dataset = self.build()?;
        let mut cache = lock(&self.scores);
        if let Some((scored_from, report)) = cache.as_ref() {
            if Arc::ptr_eq(scored_from, &dataset) {
                return Ok(Arc::clone(report));
            }
        }
        let report = Arc::new(self.score(&dataset)?);
        *cache = Some((dataset, Arc::clone(&report)));
        Ok(report)
    }

    /// Recomputes scores even when a cached run exists.
    pub fn rescore(&self) -> Result<Arc<AnomalyReport>> {
        *lock(&self.scores) = None;
        self.scores()
    }

    fn score(&self, dataset: &Dataset) -> Result<AnomalyReport> {
        info!("Training anomaly model...");
        let features = build_features(&dataset.demographic, &dataset.biometric);
        score_districts(&features, &self.config.scoring)
    }

    /// Regions present in the demographic-update data, sorted.
    pub fn regions(&self) -> Result<Vec<String>> {
        let dataset = self.build()?;
        let set: BTreeSet<String> = dataset
            .demographic
            .records
            .iter()
            .map(|r| r.region.clone())
            .collect();
        Ok(set.into_iter().collect())
    }

    pub fn districts_in(&self, region: &str) -> Result<Vec<String>> {
        let dataset = self.build()?;
        let set: BTreeSet<String> = dataset
            .demographic
            .records
            .iter()
            .filter(|r| r.region == region)
            .filter_map(|r| r.district.clone())
            .collect();
        Ok(set.into_iter().collect())
    }

    /// Scored rows for every district with this name, across regions.
    pub fn district_stats(&self, district: &str) -> Result<Vec<ScoredDistrict>> {
        let report = self.scores()?;
        Ok(report
            .districts
            .iter()
            .filter(|d| d.features.district == district)
            .cloned()
            .collect())
    }

    /// Resource estimate from the district's current `total_load`.
    pub fn recommend(&self, region: &str, district: &str, growth: f64) -> Result<ResourcePlan> {
        let report = self.scores()?;
        let row = report
            .districts
            .iter()
            .find(|d| d.features.region == region && d.features.district == district)
            .ok_or_else(|| PulseError::UnknownDistrict {
                region: region.to_string(),
                district: district.to_string(),
            })?;
        estimate(row.features.total_load, growth, &self.config.resources)
    }
}
