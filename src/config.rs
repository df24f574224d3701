//! Runtime configuration.
//!
//! Everything is optional in the TOML file; missing keys fall back to the
//! stock values below, so `Config::default()` is a complete configuration for
//! the public enrolment/update extracts.
use crate::error::{PulseError, Result};
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory holding one sub-folder per category.
    pub data_dir: PathBuf,
    /// Reference tables to use instead of the embedded ones.
    pub reference: Option<PathBuf>,
    pub categories: CategoryFolders,
    pub schema: SchemaConfig,
    pub scoring: ScoringConfig,
    pub resources: ResourceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            reference: None,
            categories: CategoryFolders::default(),
            schema: SchemaConfig::default(),
            scoring: ScoringConfig::default(),
            resources: ResourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFolders {
    pub enrolment: String,
    pub demographic: String,
    pub biometric: String,
}

impl Default for CategoryFolders {
    fn default() -> Self {
        Self {
            enrolment: "api_data_aadhar_enrolment".to_string(),
            demographic: "api_data_aadhar_demographic".to_string(),
            biometric: "api_data_aadhar_biometric".to_string(),
        }
    }
}

impl CategoryFolders {
    pub fn folder(&self, category: Category) -> &str {
        match category {
            Category::Enrolment => &self.enrolment,
            Category::Demographic => &self.demographic,
            Category::Biometric => &self.biometric,
        }
    }
}

/// Column layout of the raw extracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub region_column: String,
    pub district_column: String,
    pub date_column: String,
    /// chrono format tried first for every date cell.
    pub date_format: String,
    /// Substring marking an age-bracket count column.
    pub age_token: String,
    /// Substring marking a pre-computed total column.
    pub total_token: String,
    /// The fixed brackets summed into `total` for enrolment rows.
    pub enrolment_age_columns: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            region_column: "state".to_string(),
            district_column: "district".to_string(),
            date_column: "date".to_string(),
            date_format: "%d-%m-%Y".to_string(),
            age_token: "age".to_string(),
            total_token: "total".to_string(),
            enrolment_age_columns: vec![
                "age_0_5".to_string(),
                "age_5_17".to_string(),
                "age_18_greater".to_string(),
            ],
        }
    }
}

impl SchemaConfig {
    /// True for columns coerced to numbers during normalization.
    pub fn is_count_column(&self, name: &str) -> bool {
        name.contains(&self.age_token) || name.contains(&self.total_token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Expected share of anomalous districts.
    pub contamination: f64,
    /// Below this many districts nothing is flagged.
    pub min_districts: usize,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            min_districts: 10,
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// Throughput assumptions behind the resource estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub updates_per_kit_day: f64,
    pub updates_per_staff_day: f64,
    pub days_per_month: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            updates_per_kit_day: 50.0,
            updates_per_staff_day: 40.0,
            days_per_month: 30.0,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PulseError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = self.scoring.contamination;
        if !(c > 0.0 && c <= 0.5) {
            return Err(PulseError::Config(format!(
                "scoring.contamination must be in (0, 0.5], got {}",
                c
            )));
        }
        if self.scoring.n_estimators == 0 || self.scoring.max_samples == 0 {
            return Err(PulseError::Config(
                "scoring.n_estimators and scoring.max_samples must be positive".to_string(),
            ));
        }
        let r = &self.resources;
        for (name, v) in [
            ("updates_per_kit_day", r.updates_per_kit_day),
            ("updates_per_staff_day", r.updates_per_staff_day),
            ("days_per_month", r.days_per_month),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(PulseError::Config(format!(
                    "resources.{} must be positive, got {}",
                    name, v
                )));
            }
        }
        if self.schema.enrolment_age_columns.is_empty() {
            return Err(PulseError::Config(
                "schema.enrolment_age_columns must name at least one column".to_string(),
            ));
        }
        Ok(())
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.data_dir.join(self.categories.folder(category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.scoring.contamination, 0.05);
        assert_eq!(config.scoring.seed, 42);
        assert_eq!(config.schema.date_format, "%d-%m-%Y");
        assert_eq!(config.resources.updates_per_kit_day, 50.0);
    }

    #[test]
    fn partial_sections_override_only_named_keys() {
        let config = Config::from_toml_str(
            r#"
            data_dir = "/srv/extracts"

            [schema]
            region_column = "region"

            [scoring]
            contamination = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/extracts"));
        assert_eq!(config.schema.region_column, "region");
        assert_eq!(config.schema.district_column, "district");
        assert_eq!(config.scoring.contamination, 0.1);
        assert_eq!(config.scoring.min_districts, 10);
        assert_eq!(
            config.category_dir(Category::Biometric),
            PathBuf::from("/srv/extracts/api_data_aadhar_biometric")
        );
    }

    #[test]
    fn rejects_out_of_range_contamination() {
        let err = Config::from_toml_str("[scoring]\ncontamination = 0.0").unwrap_err();
        assert!(matches!(err, PulseError::Config(_)));
        assert!(Config::from_toml_str("[scoring]\ncontamination = 0.7").is_err());
    }

    #[test]
    fn rejects_zero_throughput() {
        assert!(Config::from_toml_str("[resources]\nupdates_per_kit_day = 0.0").is_err());
    }

    #[test]
    fn count_columns_match_either_token() {
        let schema = SchemaConfig::default();
        assert!(schema.is_count_column("bio_age_17_"));
        assert!(schema.is_count_column("total"));
        assert!(!schema.is_count_column("district"));
    }

    #[test]
    fn example_file_matches_defaults() {
        let config =
            Config::from_toml_str(include_str!("../district_pulse.example.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.data_dir, defaults.data_dir);
        assert!(config.reference.is_none());
        assert_eq!(config.categories.folder(Category::Enrolment), "api_data_aadhar_enrolment");
        assert_eq!(config.schema.enrolment_age_columns, defaults.schema.enrolment_age_columns);
        assert_eq!(config.scoring.n_estimators, defaults.scoring.n_estimators);
        assert_eq!(config.resources.days_per_month, defaults.resources.days_per_month);
    }
}
