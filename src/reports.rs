// Presentation rows for the console previews and CSV exports. Numbers are
// pre-formatted with thousands separators, like the dashboard shows them.
use crate::anomaly::{peer_outliers, AnomalyReport};
use crate::config::ScoringConfig;
use crate::trends::{column_totals, monthly_totals, seasonality, yearly_totals};
use crate::types::{
    AnomalySummary, Category, Dataset, DistrictFeatureRow, DistrictFeatures, HighRiskRow, PeerRow,
    QualityRow, SeasonalityRow, TrendRow,
};
use crate::util::{format_int, format_number};

pub fn feature_rows(report: &AnomalyReport) -> Vec<DistrictFeatureRow> {
    report
        .districts
        .iter()
        .map(|d| {
            let f = &d.features;
            DistrictFeatureRow {
                region: f.region.clone(),
                district: f.district.clone(),
                total_load: format_number(f.total_load, 0),
                mean_load: format_number(f.mean_load, 2),
                volatility: format_number(f.volatility, 2),
                demographic_total: format_number(f.demographic.sum, 0),
                biometric_total: format_number(f.biometric.sum, 0),
                anomaly: d.label(),
                anomaly_score: format!("{:.4}", d.anomaly_score),
            }
        })
        .collect()
}

pub fn high_risk_rows(report: &AnomalyReport, limit: usize) -> Vec<HighRiskRow> {
    report
        .high_risk
        .iter()
        .take(limit)
        .enumerate()
        .map(|(idx, d)| HighRiskRow {
            rank: idx + 1,
            region: d.features.region.clone(),
            district: d.features.district.clone(),
            total_load: format_number(d.features.total_load, 0),
            risk_score: format!("{:.4}", d.risk_score.unwrap_or(0.0)),
        })
        .collect()
}

/// Yearly enrolment volume.
pub fn enrolment_trend_rows(dataset: &Dataset) -> Vec<TrendRow> {
    yearly_totals(&dataset.enrolment)
        .into_iter()
        .map(|p| TrendRow {
            period: p.period.to_string(),
            series: "Enrolment".to_string(),
            total: format_number(p.total, 0),
        })
        .collect()
}

/// Monthly demographic and biometric volume, interleaved by month.
pub fn update_trend_rows(dataset: &Dataset) -> Vec<TrendRow> {
    let mut rows: Vec<(chrono::NaiveDate, &'static str, f64)> = Vec::new();
    for (table, label) in [
        (&dataset.demographic, "Demographic"),
        (&dataset.biometric, "Biometric"),
    ] {
        rows.extend(
            monthly_totals(table)
                .into_iter()
                .map(|p| (p.period, label, p.total)),
        );
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    rows.into_iter()
        .map(|(month, label, total)| TrendRow {
            period: month.format("%Y-%m").to_string(),
            series: label.to_string(),
            total: format_number(total, 0),
        })
        .collect()
}

/// Enrolment volume per age bracket over the whole period.
pub fn age_split_rows(dataset: &Dataset) -> Vec<TrendRow> {
    column_totals(&dataset.enrolment)
        .into_iter()
        .map(|(column, total)| TrendRow {
            period: "All".to_string(),
            series: column,
            total: format_number(total, 0),
        })
        .collect()
}

fn month_label(month: u32, mean: f64) -> String {
    let name = chrono::NaiveDate::from_ymd_opt(2000, month, 1)
        .map(|d| d.format("%b").to_string())
        .unwrap_or_else(|| month.to_string());
    format!("{} (avg {})", name, format_number(mean, 2))
}

/// Busiest and quietest calendar month for enrolment and each update stream.
pub fn seasonality_rows(dataset: &Dataset) -> Vec<SeasonalityRow> {
    Category::ALL
        .iter()
        .filter_map(|&c| {
            let s = seasonality(dataset.table(c))?;
            Some(SeasonalityRow {
                series: c.to_string(),
                peak_month: month_label(s.peak_month, s.peak_mean),
                low_month: month_label(s.low_month, s.low_mean),
                variation: format!("{:.2}", s.variation),
            })
        })
        .collect()
}

/// Districts far from their own region's typical load.
pub fn peer_rows(report: &AnomalyReport, threshold: f64) -> Vec<PeerRow> {
    let features: Vec<DistrictFeatures> =
        report.districts.iter().map(|d| d.features.clone()).collect();
    peer_outliers(&features, threshold)
        .into_iter()
        .map(|p| PeerRow {
            region: p.region,
            district: p.district,
            total_load: format_number(p.total_load, 0),
            z_score: format!("{:.2}", p.z_score),
        })
        .collect()
}

pub fn quality_rows(dataset: &Dataset) -> Vec<QualityRow> {
    Category::ALL
        .iter()
        .map(|&c| {
            let r = &dataset.table(c).report;
            QualityRow {
                category: c.to_string(),
                rows_read: format_int(r.rows_read as u64),
                bad_date: format_int(r.dropped_bad_date as u64),
                numeric_region: format_int(r.dropped_numeric_region as u64),
                unknown_region: format_int(
                    (r.dropped_unrecognized_region + r.dropped_missing_region) as u64,
                ),
                rows_kept: format_int(r.rows_kept as u64),
            }
        })
        .collect()
}

pub fn anomaly_summary(report: &AnomalyReport, scoring: &ScoringConfig) -> AnomalySummary {
    AnomalySummary {
        districts_scanned: report.districts.len(),
        anomalies_detected: report.high_risk.len(),
        max_risk_score: report.max_risk_score(),
        contamination: scoring.contamination,
        seed: scoring.seed,
    }
}
