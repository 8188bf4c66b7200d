use crate::error::{AppError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature standardisation learned from the training matrix
///
/// Uses population variance. Constant columns keep unit scale so they map to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    variance: Array1<f64>,
    scale: Array1<f64>,
    n_samples_seen: usize,
}

impl StandardScaler {
    /// Learn mean and variance of every column
    pub fn fit(features: &Array2<f64>) -> Result<Self> {
        let n_samples = features.nrows();
        if n_samples == 0 {
            return Err(AppError::Training(
                "cannot fit scaler on an empty feature matrix".to_string(),
            ));
        }

        let mean = features
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Internal("mean of empty axis".to_string()))?;
        let variance = features.var_axis(Axis(0), 0.0);
        let scale = variance.mapv(|v| {
            let std = v.sqrt();
            if std > 1e-12 {
                std
            } else {
                1.0
            }
        });

        Ok(Self {
            mean,
            variance,
            scale,
            n_samples_seen: n_samples,
        })
    }

    /// Standardise with the learned statistics; never refits
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features() {
            return Err(AppError::DimensionMismatch {
                expected: self.n_features(),
                actual: features.ncols(),
            });
        }
        Ok((features - &self.mean) / &self.scale)
    }

    /// Standardise a single feature vector
    pub fn transform_row(&self, row: &[f64]) -> Result<Array2<f64>> {
        let matrix = Array2::from_shape_vec((1, row.len()), row.to_vec())
            .map_err(|e| AppError::Internal(format!("Failed to create feature array: {}", e)))?;
        self.transform(&matrix)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn variance(&self) -> &Array1<f64> {
        &self.variance
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }
}
