//! District risk scoring.
//!
//! The model inputs are `total_load`, `volatility` and the two per-category
//! totals, standardized and fed to a seeded isolation forest. Every district
//! gets a flag and a decision score; flagged districts also get a risk score,
//! the absolute decision score, used to rank them.
use crate::config::ScoringConfig;
use crate::error::Result;
use crate::iforest::IsolationForest;
use crate::scaler::StandardScaler;
use crate::types::DistrictFeatures;
use crate::util::sample_std;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDistrict {
    pub features: DistrictFeatures,
    pub is_anomaly: bool,
    /// Negative for outliers; the further below zero the stranger.
    pub anomaly_score: f64,
    /// `|anomaly_score|` for outliers, `None` otherwise.
    pub risk_score: Option<f64>,
}

impl ScoredDistrict {
    /// -1 for outliers, 1 for normal districts.
    pub fn label(&self) -> i8 {
        if self.is_anomaly {
            -1
        } else {
            1
        }
    }
}

/// Both views of one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    /// Every district, in feature-table order.
    pub districts: Vec<ScoredDistrict>,
    /// Flagged districts, highest risk first.
    pub high_risk: Vec<ScoredDistrict>,
}

impl AnomalyReport {
    pub fn max_risk_score(&self) -> f64 {
        self.high_risk
            .first()
            .and_then(|d| d.risk_score)
            .unwrap_or(0.0)
    }
}

fn unflagged(features: &[DistrictFeatures]) -> AnomalyReport {
    AnomalyReport {
        districts: features
            .iter()
            .cloned()
            .map(|features| ScoredDistrict {
                features,
                is_anomaly: false,
                anomaly_score: 0.0,
                risk_score: None,
            })
            .collect(),
        high_risk: Vec::new(),
    }
}

/// Scores every district in `features`.
///
/// Fewer than `params.min_districts` rows (or too few for the contamination
/// share to cover a single district) is not an error: nothing is flagged and
/// every decision score is 0.
pub fn score_districts(
    features: &[DistrictFeatures],
    params: &ScoringConfig,
) -> Result<AnomalyReport> {
    let n = features.len();
    let too_small = n < params.min_districts.max(2)
        || (params.contamination * n as f64) < 1.0;
    if too_small {
        warn!(
            "{} districts is too few to score at contamination {}; no anomalies flagged",
            n, params.contamination
        );
        return Ok(unflagged(features));
    }

    let x: Vec<Vec<f64>> = features.iter().map(|f| f.model_inputs().to_vec()).collect();
    let scaled = StandardScaler::new().fit_transform(&x)?;

    let mut forest = IsolationForest::new()
        .with_n_estimators(params.n_estimators)
        .with_max_samples(params.max_samples)
        .with_contamination(params.contamination)
        .with_random_state(params.seed);
    forest.fit(&scaled)?;
    let decisions = forest.decision_function(&scaled);

    let districts: Vec<ScoredDistrict> = features
        .iter()
        .zip(decisions)
        .map(|(f, score)| {
            let is_anomaly = score < 0.0;
            ScoredDistrict {
                features: f.clone(),
                is_anomaly,
                anomaly_score: score,
                risk_score: is_anomaly.then(|| score.abs()),
            }
        })
        .collect();

    let mut high_risk: Vec<ScoredDistrict> =
        districts.iter().filter(|d| d.is_anomaly).cloned().collect();
    high_risk.sort_by(|a, b| {
        b.risk_score
            .partial_cmp(&a.risk_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.features.region.cmp(&b.features.region))
            .then_with(|| a.features.district.cmp(&b.features.district))
    });

    info!("Detected {} anomalies among {} districts.", high_risk.len(), n);
    Ok(AnomalyReport {
        districts,
        high_risk,
    })
}

/// A district that stands out from the other districts of its own region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerOutlier {
    pub region: String,
    pub district: String,
    pub total_load: f64,
    pub z_score: f64,
}

/// Z-score of `total_load` against the district's regional peers. Regions
/// with fewer than three districts or no spread are skipped. Results with
/// `|z| > threshold` come back highest z first.
pub fn peer_outliers(features: &[DistrictFeatures], threshold: f64) -> Vec<PeerOutlier> {
    let mut by_region: BTreeMap<&str, Vec<&DistrictFeatures>> = BTreeMap::new();
    for f in features {
        by_region.entry(f.region.as_str()).or_default().push(f);
    }

    let mut out = Vec::new();
    for (region, group) in by_region {
        if group.len() < 3 {
            continue;
        }
        let loads: Vec<f64> = group.iter().map(|f| f.total_load).collect();
        let mean = loads.iter().sum::<f64>() / loads.len() as f64;
        let std = sample_std(&loads);
        if std == 0.0 {
            continue;
        }
        for f in group {
            let z = (f.total_load - mean) / std;
            if z.abs() > threshold {
                out.push(PeerOutlier {
                    region: region.to_string(),
                    district: f.district.clone(),
                    total_load: f.total_load,
                    z_score: z,
                });
            }
        }
    }
    out.sort_by(|a, b| b.z_score.partial_cmp(&a.z_score).unwrap_or(Ordering::Equal));
    out
}
