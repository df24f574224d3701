use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

/// The three administrative record streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Enrolment,
    Demographic,
    Biometric,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Enrolment,
        Category::Demographic,
        Category::Biometric,
    ];

    /// How `total` is derived for this stream.
    pub fn total_rule(self) -> TotalRule {
        match self {
            Category::Enrolment => TotalRule::Enrolment,
            Category::Demographic | Category::Biometric => TotalRule::Update,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Enrolment => "enrolment",
            Category::Demographic => "demographic-update",
            Category::Biometric => "biometric-update",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalRule {
    /// Sum exactly the configured enrolment age brackets.
    Enrolment,
    /// Sum every column carrying the age token.
    Update,
}

/// Concatenated raw CSV content for one category. Blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Appends another table, aligning columns by name. Columns new to `self`
    /// are added and back-filled with `None`.
    pub fn append(&mut self, other: RawTable) {
        let mut mapping = Vec::with_capacity(other.headers.len());
        for h in &other.headers {
            let idx = match self.column_index(h) {
                Some(i) => i,
                None => {
                    self.headers.push(h.clone());
                    for row in &mut self.rows {
                        row.push(None);
                    }
                    self.headers.len() - 1
                }
            };
            mapping.push(idx);
        }
        let width = self.headers.len();
        for row in other.rows {
            let mut aligned = vec![None; width];
            for (src, cell) in row.into_iter().enumerate() {
                if let Some(&dst) = mapping.get(src) {
                    aligned[dst] = cell;
                }
            }
            self.rows.push(aligned);
        }
    }
}

/// One cleaned row. `counts` lines up with `NormalizedTable::count_columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub region: String,
    pub district: Option<String>,
    pub date: NaiveDate,
    pub counts: Vec<f64>,
    pub total: f64,
}

/// What normalization kept and threw away for one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub rows_read: usize,
    pub dropped_bad_date: usize,
    pub dropped_missing_region: usize,
    pub dropped_numeric_region: usize,
    pub dropped_unrecognized_region: usize,
    pub used_fallback_date_parser: bool,
    pub unrecognized_regions: BTreeMap<String, usize>,
    pub rows_kept: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub category: Category,
    pub count_columns: Vec<String>,
    pub records: Vec<NormalizedRecord>,
    pub report: NormalizeReport,
}

impl NormalizedTable {
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            count_columns: Vec::new(),
            records: Vec::new(),
            report: NormalizeReport::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// The three normalized tables of one load cycle.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub enrolment: NormalizedTable,
    pub demographic: NormalizedTable,
    pub biometric: NormalizedTable,
}

impl Dataset {
    pub fn table(&self, category: Category) -> &NormalizedTable {
        match category {
            Category::Enrolment => &self.enrolment,
            Category::Demographic => &self.demographic,
            Category::Biometric => &self.biometric,
        }
    }
}

/// Per-category statistics of `total` for one district.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    pub records: usize,
    pub sum: f64,
    pub mean: f64,
    pub std: f64,
}

/// One row of the district feature table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictFeatures {
    pub region: String,
    pub district: String,
    pub demographic: CategoryStats,
    pub biometric: CategoryStats,
    pub total_load: f64,
    pub mean_load: f64,
    pub volatility: f64,
}

impl DistrictFeatures {
    /// Model inputs, in a fixed order.
    pub fn model_inputs(&self) -> [f64; 4] {
        [
            self.total_load,
            self.volatility,
            self.biometric.sum,
            self.demographic.sum,
        ]
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DistrictFeatureRow {
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "TotalLoad")]
    #[tabled(rename = "TotalLoad")]
    pub total_load: String,
    #[serde(rename = "MeanLoad")]
    #[tabled(rename = "MeanLoad")]
    pub mean_load: String,
    #[serde(rename = "Volatility")]
    #[tabled(rename = "Volatility")]
    pub volatility: String,
    #[serde(rename = "DemographicTotal")]
    #[tabled(rename = "DemographicTotal")]
    pub demographic_total: String,
    #[serde(rename = "BiometricTotal")]
    #[tabled(rename = "BiometricTotal")]
    pub biometric_total: String,
    #[serde(rename = "Anomaly")]
    #[tabled(rename = "Anomaly")]
    pub anomaly: i8,
    #[serde(rename = "AnomalyScore")]
    #[tabled(rename = "AnomalyScore")]
    pub anomaly_score: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HighRiskRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "TotalLoad")]
    #[tabled(rename = "TotalLoad")]
    pub total_load: String,
    #[serde(rename = "RiskScore")]
    #[tabled(rename = "RiskScore")]
    pub risk_score: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TrendRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "Series")]
    #[tabled(rename = "Series")]
    pub series: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct QualityRow {
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "RowsRead")]
    #[tabled(rename = "RowsRead")]
    pub rows_read: String,
    #[serde(rename = "BadDate")]
    #[tabled(rename = "BadDate")]
    pub bad_date: String,
    #[serde(rename = "NumericRegion")]
    #[tabled(rename = "NumericRegion")]
    pub numeric_region: String,
    #[serde(rename = "UnknownRegion")]
    #[tabled(rename = "UnknownRegion")]
    pub unknown_region: String,
    #[serde(rename = "RowsKept")]
    #[tabled(rename = "RowsKept")]
    pub rows_kept: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SeasonalityRow {
    #[serde(rename = "Series")]
    #[tabled(rename = "Series")]
    pub series: String,
    #[serde(rename = "PeakMonth")]
    #[tabled(rename = "PeakMonth")]
    pub peak_month: String,
    #[serde(rename = "LowMonth")]
    #[tabled(rename = "LowMonth")]
    pub low_month: String,
    #[serde(rename = "Variation")]
    #[tabled(rename = "Variation")]
    pub variation: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PeerRow {
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "TotalLoad")]
    #[tabled(rename = "TotalLoad")]
    pub total_load: String,
    #[serde(rename = "ZScore")]
    #[tabled(rename = "ZScore")]
    pub z_score: String,
}

#[derive(Debug, Serialize)]
pub struct AnomalySummary {
    pub districts_scanned: usize,
    pub anomalies_detected: usize,
    pub max_risk_score: f64,
    pub contamination: f64,
    pub seed: u64,
}
