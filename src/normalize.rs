//! Record normalization: turns one concatenated raw table into typed,
//! canonical records.
//!
//! The stages run in a fixed order and each one can be re-run on its own
//! output without changing it:
//!
//! 1. count columns coerced to non-negative numbers (junk becomes 0),
//! 2. dates parsed with the primary format, falling back to a permissive
//!    parser only when the primary format rejects every row,
//! 3. region names cleaned, corrected and whitelisted,
//! 4. district names canonicalized (when a district column exists); a name
//!    that cleans to nothing becomes missing,
//! 5. `total` derived from the category's bracket columns.
//!
//! Row-level defects never surface as errors. A table that lacks the region,
//! date or enrolment bracket columns altogether does.
use crate::config::SchemaConfig;
use crate::error::{PulseError, Result};
use crate::reference::{ReferenceTables, RegionVerdict};
use crate::types::{
    Category, NormalizeReport, NormalizedRecord, NormalizedTable, RawTable, TotalRule,
};
use crate::util::{parse_count, parse_date_permissive, parse_date_with};
use chrono::NaiveDate;
use tracing::{info, warn};

/// A row between stages.
#[derive(Debug, Clone, PartialEq)]
struct Staged {
    region: Option<String>,
    district: Option<String>,
    date_raw: Option<String>,
    date: Option<NaiveDate>,
    counts: Vec<f64>,
}

/// Where the interesting columns sit in the raw table.
struct Layout {
    region: usize,
    district: Option<usize>,
    date: usize,
    counts: Vec<usize>,
    count_names: Vec<String>,
    total_positions: Vec<usize>,
}

fn resolve_layout(raw: &RawTable, category: Category, schema: &SchemaConfig) -> Result<Layout> {
    let mut missing = Vec::new();
    let region = raw.column_index(&schema.region_column);
    let date = raw.column_index(&schema.date_column);
    if region.is_none() {
        missing.push(schema.region_column.clone());
    }
    if date.is_none() {
        missing.push(schema.date_column.clone());
    }

    let mut counts = Vec::new();
    let mut count_names = Vec::new();
    for (idx, name) in raw.headers.iter().enumerate() {
        let fixed_bracket = category.total_rule() == TotalRule::Enrolment
            && schema.enrolment_age_columns.contains(name);
        if schema.is_count_column(name) || fixed_bracket {
            counts.push(idx);
            count_names.push(name.clone());
        }
    }

    let total_positions: Vec<usize> = match category.total_rule() {
        TotalRule::Enrolment => {
            let mut positions = Vec::new();
            for col in &schema.enrolment_age_columns {
                match count_names.iter().position(|n| n == col) {
                    Some(p) => positions.push(p),
                    None => missing.push(col.clone()),
                }
            }
            positions
        }
        TotalRule::Update => count_names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.contains(&schema.age_token))
            .map(|(p, _)| p)
            .collect(),
    };

    match (region, date) {
        (Some(region), Some(date)) if missing.is_empty() => Ok(Layout {
            region,
            district: raw.column_index(&schema.district_column),
            date,
            counts,
            count_names,
            total_positions,
        }),
        _ => Err(PulseError::MissingColumns {
            category: category.to_string(),
            columns: missing,
        }),
    }
}

/// Stage 1.
fn coerce_counts(raw: RawTable, layout: &Layout) -> Vec<Staged> {
    raw.rows
        .into_iter()
        .map(|mut row| {
            let counts = layout
                .counts
                .iter()
                .map(|&i| parse_count(row.get(i).and_then(|c| c.as_deref())))
                .collect();
            let mut take = |i: usize| row.get_mut(i).and_then(Option::take);
            Staged {
                region: take(layout.region),
                district: layout.district.and_then(&mut take),
                date_raw: take(layout.date),
                date: None,
                counts,
            }
        })
        .collect()
}

/// Stage 2. Returns whether the permissive parser was needed.
fn parse_dates(rows: &mut Vec<Staged>, format: &str, report: &mut NormalizeReport) -> bool {
    for row in rows.iter_mut() {
        if row.date.is_none() {
            row.date = parse_date_with(row.date_raw.as_deref(), format);
        }
    }
    let fallback = !rows.is_empty() && rows.iter().all(|r| r.date.is_none());
    if fallback {
        for row in rows.iter_mut() {
            row.date = parse_date_permissive(row.date_raw.as_deref());
        }
    }
    let before = rows.len();
    rows.retain(|r| r.date.is_some());
    report.dropped_bad_date += before - rows.len();
    fallback
}

/// Stage 3.
fn clean_regions(rows: &mut Vec<Staged>, reference: &ReferenceTables, report: &mut NormalizeReport) {
    rows.retain_mut(|row| {
        let Some(raw) = row.region.as_deref() else {
            report.dropped_missing_region += 1;
            return false;
        };
        match reference.canonical_region(raw) {
            RegionVerdict::Valid(name) => {
                row.region = Some(name);
                true
            }
            RegionVerdict::Numeric => {
                report.dropped_numeric_region += 1;
                false
            }
            RegionVerdict::Unrecognized(name) => {
                report.dropped_unrecognized_region += 1;
                *report.unrecognized_regions.entry(name).or_insert(0) += 1;
                false
            }
        }
    });
}

/// Stage 4. A name that is nothing but decoration counts as missing.
fn clean_districts(rows: &mut [Staged], reference: &ReferenceTables) {
    for row in rows.iter_mut() {
        if let Some(d) = row.district.take() {
            let name = reference.canonical_district(&d);
            row.district = (!name.is_empty()).then_some(name);
        }
    }
}

/// Stage 5.
fn derive_totals(rows: Vec<Staged>, total_positions: &[usize]) -> Vec<NormalizedRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let total = total_positions.iter().map(|&p| row.counts[p]).sum();
            Some(NormalizedRecord {
                region: row.region?,
                district: row.district,
                date: row.date?,
                counts: row.counts,
                total,
            })
        })
        .collect()
}

/// Cleans one raw table per the stages above. A table with no columns at all
/// (nothing was loaded) normalizes to an empty table.
pub fn normalize(
    raw: RawTable,
    category: Category,
    schema: &SchemaConfig,
    reference: &ReferenceTables,
) -> Result<NormalizedTable> {
    if raw.headers.is_empty() {
        warn!("{}: no input rows", category);
        return Ok(NormalizedTable::empty(category));
    }
    let layout = resolve_layout(&raw, category, schema)?;
    let mut report = NormalizeReport {
        rows_read: raw.rows.len(),
        ..NormalizeReport::default()
    };

    let mut rows = coerce_counts(raw, &layout);
    report.used_fallback_date_parser = parse_dates(&mut rows, &schema.date_format, &mut report);
    if report.used_fallback_date_parser {
        warn!(
            "{}: no date matched '{}', used permissive parsing",
            category, schema.date_format
        );
    }
    clean_regions(&mut rows, reference, &mut report);
    if layout.district.is_some() {
        clean_districts(&mut rows, reference);
    }
    let records = derive_totals(rows, &layout.total_positions);
    report.rows_kept = records.len();

    info!(
        "{}: kept {} of {} rows (bad date {}, missing region {}, numeric region {}, unrecognized region {})",
        category,
        report.rows_kept,
        report.rows_read,
        report.dropped_bad_date,
        report.dropped_missing_region,
        report.dropped_numeric_region,
        report.dropped_unrecognized_region
    );

    Ok(NormalizedTable {
        category,
        count_columns: layout.count_names,
        records,
        report,
    })
}
