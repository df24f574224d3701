use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid file pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{category} data is missing expected columns: {}", .columns.join(", "))]
    MissingColumns {
        category: String,
        columns: Vec<String>,
    },

    #[error("no usable data: {0}")]
    EmptyDataset(String),

    #[error("{table} correction for '{key}' does not settle within two passes ({})", .trail.join(" -> "))]
    CorrectionCycle {
        table: String,
        key: String,
        trail: Vec<String>,
    },

    #[error("growth fraction must be a non-negative number, got {0}")]
    InvalidGrowth(f64),

    #[error("load must be a non-negative number, got {0}")]
    InvalidLoad(f64),

    #[error("outlier model error: {0}")]
    Model(String),

    #[error("no feature row for district '{district}' in '{region}'")]
    UnknownDistrict { region: String, district: String },
}

pub type Result<T> = std::result::Result<T, PulseError>;
