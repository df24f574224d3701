// Data-quality diagnostics used when curating the reference tables.
use crate::types::{NormalizeReport, NormalizedTable};
use serde::Serialize;
use std::collections::BTreeMap;

/// District spellings inside one region that collapse to the same key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub region: String,
    pub key: String,
    /// Each spelling with its record count.
    pub variants: Vec<(String, usize)>,
}

/// Lower-case with spaces, hyphens and dots removed.
pub fn comparison_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.'))
        .collect()
}

/// Candidates for new district corrections: names that differ only in case,
/// spacing or punctuation within a region.
pub fn duplicate_district_variants(table: &NormalizedTable) -> Vec<DuplicateGroup> {
    let mut counts: BTreeMap<(String, String), BTreeMap<String, usize>> = BTreeMap::new();
    for r in &table.records {
        let Some(district) = &r.district else {
            continue;
        };
        *counts
            .entry((r.region.clone(), comparison_key(district)))
            .or_default()
            .entry(district.clone())
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, variants)| variants.len() > 1)
        .map(|((region, key), variants)| DuplicateGroup {
            region,
            key,
            variants: variants.into_iter().collect(),
        })
        .collect()
}

/// Rejected region names, most frequent first.
pub fn unrecognized_regions(report: &NormalizeReport) -> Vec<(String, usize)> {
    let mut v: Vec<(String, usize)> = report
        .unrecognized_regions
        .iter()
        .map(|(k, c)| (k.clone(), *c))
        .collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v
}
