//! Feature standardization.
use crate::error::{PulseError, Result};

/// Standardizes features by removing the mean and scaling to unit variance.
///
/// The standard score of a sample x is `z = (x - mean) / std`, with the
/// population standard deviation. A constant feature keeps a scale of 1 so it
/// maps to all zeros instead of NaN.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
}

impl StandardScaler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    pub fn mean(&self) -> Option<&[f64]> {
        self.mean.as_deref()
    }

    pub fn scale(&self) -> Option<&[f64]> {
        self.scale.as_deref()
    }

    /// Learns per-column mean and spread from row-major samples.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty input or ragged rows.
    pub fn fit(&mut self, x: &[Vec<f64>]) -> Result<()> {
        let n_features = check_shape(x)?;
        let n = x.len() as f64;
        let mut mean = vec![0.0; n_features];
        for row in x {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        let mut scale = vec![0.0; n_features];
        for row in x {
            for ((s, v), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (v - m) * (v - m);
            }
        }
        for s in &mut scale {
            *s = (*s / n).sqrt();
            if *s < 1e-12 {
                *s = 1.0;
            }
        }
        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the scaler is not fitted or dimensions mismatch.
    pub fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let (Some(mean), Some(scale)) = (&self.mean, &self.scale) else {
            return Err(PulseError::Model("scaler not fitted".to_string()));
        };
        if x.iter().any(|row| row.len() != mean.len()) {
            return Err(PulseError::Model("feature dimension mismatch".to_string()));
        }
        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(mean)
                    .zip(scale)
                    .map(|((v, m), s)| (v - m) / s)
                    .collect()
            })
            .collect())
    }

    pub fn fit_transform(&mut self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Number of features, after checking the matrix is non-empty and rectangular.
pub(crate) fn check_shape(x: &[Vec<f64>]) -> Result<usize> {
    let Some(first) = x.first() else {
        return Err(PulseError::Model("no samples".to_string()));
    };
    let n_features = first.len();
    if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
        return Err(PulseError::Model(
            "samples must share a non-zero feature count".to_string(),
        ));
    }
    Ok(n_features)
}
