use crate::types::{CategoryStats, DistrictFeatures, NormalizedTable};
use crate::util::{average, sample_std};
use std::collections::BTreeMap;

type DistrictKey = (String, String);

/// Sum, mean and sample standard deviation of `total` per (region, district).
/// Records without a district are not grouped.
pub fn district_stats(table: &NormalizedTable) -> BTreeMap<DistrictKey, CategoryStats> {
    let mut groups: BTreeMap<DistrictKey, Vec<f64>> = BTreeMap::new();
    for r in &table.records {
        let Some(district) = &r.district else {
            continue;
        };
        groups
            .entry((r.region.clone(), district.clone()))
            .or_default()
            .push(r.total);
    }
    groups
        .into_iter()
        .map(|(key, totals)| {
            let stats = CategoryStats {
                records: totals.len(),
                sum: totals.iter().sum(),
                mean: average(&totals),
                std: sample_std(&totals),
            };
            (key, stats)
        })
        .collect()
}

/// Outer-joins demographic and biometric statistics into one row per
/// district, sorted by (region, district).
///
/// A district seen in only one category gets zeroed statistics for the
/// other, which understates its `total_load` and `volatility`. That is a
/// known approximation and is kept as is.
pub fn build_features(
    demographic: &NormalizedTable,
    biometric: &NormalizedTable,
) -> Vec<DistrictFeatures> {
    let mut joined: BTreeMap<DistrictKey, (CategoryStats, CategoryStats)> = BTreeMap::new();
    for (key, stats) in district_stats(demographic) {
        joined.entry(key).or_default().0 = stats;
    }
    for (key, stats) in district_stats(biometric) {
        joined.entry(key).or_default().1 = stats;
    }

    joined
        .into_iter()
        .map(|((region, district), (demo, bio))| {
            let total_load = demo.sum + bio.sum;
            let records = demo.records + bio.records;
            let mean_load = if records == 0 {
                0.0
            } else {
                total_load / records as f64
            };
            DistrictFeatures {
                region,
                district,
                demographic: demo,
                biometric: bio,
                total_load,
                mean_load,
                volatility: demo.std + bio.std,
            }
        })
        .collect()
}
