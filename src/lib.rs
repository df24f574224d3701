//! Normalization, aggregation and risk scoring for identity enrolment and
//! update extracts.
//!
//! Raw per-category CSV folders are loaded ([`loader`]), cleaned into
//! canonical records ([`normalize`]), rolled up into one feature row per
//! district ([`aggregate`]) and scored with a seeded isolation forest
//! ([`anomaly`]). [`service::PulseService`] ties the stages together behind
//! an explicit build/rebuild lifecycle.
pub mod aggregate;
pub mod anomaly;
pub mod config;
pub mod error;
pub mod iforest;
pub mod loader;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod quality;
pub mod reference;
pub mod reports;
pub mod resources;
pub mod scaler;
pub mod service;
pub mod trends;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::{PulseError, Result};
pub use reference::ReferenceTables;
pub use service::PulseService;
