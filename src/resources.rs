use crate::config::ResourceConfig;
use crate::error::{PulseError, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Advisory {
    /// More than 100 kits: mobile units are the cheaper way to absorb it.
    HighDemand,
    Moderate,
    /// Fewer than 5 kits.
    Sufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourcePlan {
    pub projected_monthly_load: u64,
    pub daily_load: f64,
    pub kits_required: u64,
    pub staff_required: u64,
}

impl ResourcePlan {
    pub fn advisory(&self) -> Advisory {
        if self.kits_required > 100 {
            Advisory::HighDemand
        } else if self.kits_required < 5 {
            Advisory::Sufficient
        } else {
            Advisory::Moderate
        }
    }
}

/// Projects `current_load` by `growth` (0.2 = +20%) over one month and sizes
/// kits and staff from the configured daily throughput, rounding up.
///
/// Negative or non-finite growth and load are rejected.
pub fn estimate(current_load: f64, growth: f64, config: &ResourceConfig) -> Result<ResourcePlan> {
    if !(current_load.is_finite() && current_load >= 0.0) {
        return Err(PulseError::InvalidLoad(current_load));
    }
    if !(growth.is_finite() && growth >= 0.0) {
        return Err(PulseError::InvalidGrowth(growth));
    }
    let projected = current_load * (1.0 + growth);
    let daily_load = projected / config.days_per_month;
    Ok(ResourcePlan {
        projected_monthly_load: projected.round() as u64,
        daily_load,
        kits_required: (daily_load / config.updates_per_kit_day).ceil() as u64,
        staff_required: (daily_load / config.updates_per_staff_day).ceil() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_percent_growth_on_three_thousand() {
        let plan = estimate(3000.0, 0.20, &ResourceConfig::default()).unwrap();
        assert_eq!(plan.projected_monthly_load, 3600);
        assert!((plan.daily_load - 120.0).abs() < 1e-9);
        assert_eq!(plan.kits_required, 3);
        assert_eq!(plan.staff_required, 3);
        assert_eq!(plan.advisory(), Advisory::Sufficient);
    }

    #[test]
    fn counts_round_up() {
        let plan = estimate(1530.0, 0.0, &ResourceConfig::default()).unwrap();
        // 51 per day
        assert_eq!(plan.kits_required, 2);
        assert_eq!(plan.staff_required, 2);
    }

    #[test]
    fn zero_load_needs_nothing() {
        let plan = estimate(0.0, 0.5, &ResourceConfig::default()).unwrap();
        assert_eq!(plan.kits_required, 0);
        assert_eq!(plan.staff_required, 0);
    }

    #[test]
    fn large_load_is_high_demand() {
        let plan = estimate(200_000.0, 0.0, &ResourceConfig::default()).unwrap();
        assert_eq!(plan.kits_required, 134);
        assert_eq!(plan.advisory(), Advisory::HighDemand);
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let cfg = ResourceConfig::default();
        assert!(matches!(estimate(100.0, -0.1, &cfg), Err(PulseError::InvalidGrowth(_))));
        assert!(matches!(estimate(-1.0, 0.1, &cfg), Err(PulseError::InvalidLoad(_))));
        assert!(matches!(estimate(100.0, f64::NAN, &cfg), Err(PulseError::InvalidGrowth(_))));
    }
}
