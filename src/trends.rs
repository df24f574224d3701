// Time series behind the pulse monitor: yearly and monthly volume, the
// split of volume across the count columns, and calendar seasonality.
use crate::types::NormalizedTable;
use crate::util::{average, sample_std};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTotal<P> {
    pub period: P,
    pub total: f64,
}

pub fn yearly_totals(table: &NormalizedTable) -> Vec<PeriodTotal<i32>> {
    let mut map: BTreeMap<i32, f64> = BTreeMap::new();
    for r in &table.records {
        *map.entry(r.date.year()).or_insert(0.0) += r.total;
    }
    map.into_iter()
        .map(|(period, total)| PeriodTotal { period, total })
        .collect()
}

/// Keyed by the first day of each month.
pub fn monthly_totals(table: &NormalizedTable) -> Vec<PeriodTotal<NaiveDate>> {
    let mut map: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in &table.records {
        let month = r.date.with_day(1).unwrap_or(r.date);
        *map.entry(month).or_insert(0.0) += r.total;
    }
    map.into_iter()
        .map(|(period, total)| PeriodTotal { period, total })
        .collect()
}

/// Sum of each count column, in column order.
pub fn column_totals(table: &NormalizedTable) -> Vec<(String, f64)> {
    let mut sums = vec![0.0; table.count_columns.len()];
    for r in &table.records {
        for (s, v) in sums.iter_mut().zip(&r.counts) {
            *s += v;
        }
    }
    table.count_columns.iter().cloned().zip(sums).collect()
}

/// Calendar-month profile of per-record volume, pooled across years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seasonality {
    /// 1 = January.
    pub peak_month: u32,
    pub peak_mean: f64,
    pub low_month: u32,
    pub low_mean: f64,
    /// Coefficient of variation of the monthly means (sample std over mean).
    pub variation: f64,
}

/// Mean `total` per record for each calendar month, then the busiest and
/// quietest month. Ties go to the earlier month. `None` for an empty table.
pub fn seasonality(table: &NormalizedTable) -> Option<Seasonality> {
    let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for r in &table.records {
        by_month.entry(r.date.month()).or_default().push(r.total);
    }
    let means: Vec<(u32, f64)> = by_month
        .into_iter()
        .map(|(m, totals)| (m, average(&totals)))
        .collect();

    let (mut peak, mut low) = (*means.first()?, *means.first()?);
    for &(m, v) in &means[1..] {
        if v > peak.1 {
            peak = (m, v);
        }
        if v < low.1 {
            low = (m, v);
        }
    }
    let values: Vec<f64> = means.iter().map(|&(_, v)| v).collect();
    let mean = average(&values);
    let variation = if mean == 0.0 {
        0.0
    } else {
        sample_std(&values) / mean
    };
    Some(Seasonality {
        peak_month: peak.0,
        peak_mean: peak.1,
        low_month: low.0,
        low_mean: low.1,
        variation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, NormalizedRecord};

    fn table() -> NormalizedTable {
        let mut t = NormalizedTable::empty(Category::Biometric);
        t.count_columns = vec!["bio_age_5_17".into(), "bio_age_17_".into()];
        for (y, m, d, a, b) in [
            (2024, 12, 30, 1.0, 2.0),
            (2025, 1, 3, 10.0, 5.0),
            (2025, 1, 28, 4.0, 0.0),
            (2025, 3, 9, 0.0, 7.0),
        ] {
            t.records.push(NormalizedRecord {
                region: "Goa".into(),
                district: Some("North Goa".into()),
                date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                counts: vec![a, b],
                total: a + b,
            });
        }
        t
    }

    #[test]
    fn yearly() {
        let y = yearly_totals(&table());
        assert_eq!(
            y,
            vec![
                PeriodTotal { period: 2024, total: 3.0 },
                PeriodTotal { period: 2025, total: 26.0 },
            ]
        );
    }

    #[test]
    fn monthly_buckets_by_month_start() {
        let m = monthly_totals(&table());
        assert_eq!(m.len(), 3);
        assert_eq!(m[1].period, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(m[1].total, 19.0);
    }

    #[test]
    fn per_column() {
        let c = column_totals(&table());
        assert_eq!(c, vec![("bio_age_5_17".to_string(), 15.0), ("bio_age_17_".to_string(), 14.0)]);
    }

    #[test]
    fn seasonality_pools_years_by_calendar_month() {
        // Means: Jan 9.5, Mar 7.0, Dec 3.0.
        let s = seasonality(&table()).unwrap();
        assert_eq!((s.peak_month, s.peak_mean), (1, 9.5));
        assert_eq!((s.low_month, s.low_mean), (12, 3.0));
        assert!((s.variation - 0.504_418).abs() < 1e-6, "{}", s.variation);
    }

    #[test]
    fn seasonality_of_one_month_is_flat() {
        let mut t = table();
        t.records.retain(|r| r.date.month() == 1);
        let s = seasonality(&t).unwrap();
        assert_eq!(s.peak_month, s.low_month);
        assert_eq!(s.variation, 0.0);
        assert!(seasonality(&NormalizedTable::empty(Category::Enrolment)).is_none());
    }
}
