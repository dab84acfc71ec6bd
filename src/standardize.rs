//! Per-feature standardization to zero mean and unit population standard deviation.

use crate::error::{PcaError, Result};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted per-feature statistics of a standardization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaling {
    /// Column means. Shape: (n_features)
    mean: Array1<f64>,
    /// Population standard deviations (divisor n), 0 for degenerate features.
    /// Shape: (n_features)
    std_dev: Array1<f64>,
    /// Divisor actually applied: `std_dev`, or 1.0 for degenerate features.
    /// Shape: (n_features)
    scale: Array1<f64>,
    /// Indices of constant features.
    degenerate_features: Vec<usize>,
}

impl FeatureScaling {
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std_dev(&self) -> &Array1<f64> {
        &self.std_dev
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn degenerate_features(&self) -> &[usize] {
        &self.degenerate_features
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardizes new samples with the fitted statistics.
    ///
    /// Degenerate features map to exactly 0 regardless of the incoming value.
    pub fn transform(&self, data: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_features() {
            return Err(PcaError::InvalidInput(format!(
                "Expected {} features, got {}.",
                self.n_features(),
                data.ncols()
            )));
        }
        ensure_finite(data)?;
        let mut out = data.to_owned();
        out -= &self.mean;
        out /= &self.scale;
        for &j in &self.degenerate_features {
            out.column_mut(j).fill(0.0);
        }
        ensure_finite(&out.view())?;
        Ok(out)
    }

    /// Checks that the statistics describe one consistent set of features:
    /// equal lengths, finite means, finite non-negative standard deviations,
    /// finite positive scales and in-range degenerate indices.
    pub(crate) fn check_consistency(&self) -> std::result::Result<(), String> {
        let n = self.mean.len();
        if self.std_dev.len() != n || self.scale.len() != n {
            return Err(format!(
                "scaling lengths differ: mean={}, std_dev={}, scale={}",
                n,
                self.std_dev.len(),
                self.scale.len()
            ));
        }
        if let Some(j) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(format!("mean of feature {} is {}", j, self.mean[j]));
        }
        if let Some(j) = self.std_dev.iter().position(|s| !s.is_finite() || *s < 0.0) {
            return Err(format!("standard deviation of feature {} is {}", j, self.std_dev[j]));
        }
        if let Some(j) = self.scale.iter().position(|s| !s.is_finite() || *s <= 0.0) {
            return Err(format!("scale of feature {} is {}", j, self.scale[j]));
        }
        if let Some(&j) = self.degenerate_features.iter().find(|&&j| j >= n) {
            return Err(format!("degenerate feature index {} out of range for {} features", j, n));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        mean: Array1<f64>,
        std_dev: Array1<f64>,
        scale: Array1<f64>,
        degenerate_features: Vec<usize>,
    ) -> Self {
        Self { mean, std_dev, scale, degenerate_features }
    }
}

/// A standardized matrix together with the statistics used to produce it.
#[derive(Clone, Debug)]
pub struct StandardizedFeatures {
    /// Shape: (n_samples, n_features)
    pub data: Array2<f64>,
    pub scaling: FeatureScaling,
}

/// Rejects NaN and infinite entries.
pub(crate) fn ensure_finite(data: &ArrayView2<f64>) -> Result<()> {
    if let Some(((row, col), value)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(PcaError::InvalidInput(format!(
            "Non-finite value {} at sample {}, feature {}.",
            value, row, col
        )));
    }
    Ok(())
}

/// Centers and scales every column to mean 0 and population standard deviation 1.
///
/// A column whose values are all identical is a *degenerate feature*: its
/// standard deviation is recorded as 0, the applied scale is defined as 1, and
/// the standardized column is filled with exact zeros instead of NaN. Columns
/// whose spread is not representable as a positive finite standard deviation
/// are treated the same way.
///
/// Moments are computed on each column divided by its largest magnitude, so
/// features anywhere in the finite f64 range standardize to finite values.
///
/// # Errors
/// - `EmptyFeatureSet` if the matrix has no columns.
/// - `InvalidInput` if it has no rows or contains non-finite values.
pub fn standardize(data: &ArrayView2<f64>) -> Result<StandardizedFeatures> {
    let (n_samples, n_features) = data.dim();
    if n_features == 0 {
        return Err(PcaError::EmptyFeatureSet);
    }
    if n_samples == 0 {
        return Err(PcaError::InvalidInput("Feature matrix has zero samples.".into()));
    }
    ensure_finite(data)?;

    info!("Standardizing {} features over {} samples.", n_features, n_samples);

    let mut standardized = data.to_owned();
    let n = n_samples as f64;

    // (mean, population std, degenerate) per column
    let column_stats: Vec<(f64, f64, bool)> = standardized
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .map(|mut column| {
            let first = column[0];
            if column.iter().all(|&v| v == first) {
                column.fill(0.0);
                return (first, 0.0, true);
            }
            // moments are taken with max |x| = 1 so squares neither overflow nor underflow
            let magnitude = column.iter().fold(0.0f64, |m, &v| m.max(v.abs()));
            column.mapv_inplace(|v| v / magnitude);
            let scaled_mean = column.sum() / n;
            column.mapv_inplace(|v| v - scaled_mean);
            let scaled_std = (column.iter().map(|v| v * v).sum::<f64>() / n).sqrt();
            let mean = scaled_mean * magnitude;
            let std_dev = scaled_std * magnitude;
            if scaled_std <= 0.0 || std_dev <= 0.0 || !std_dev.is_finite() {
                // spread below what f64 can represent at this magnitude
                column.fill(0.0);
                return (mean, 0.0, true);
            }
            column.mapv_inplace(|v| v / scaled_std);
            (mean, std_dev, false)
        })
        .collect();

    let mean = Array1::from_iter(column_stats.iter().map(|s| s.0));
    let std_dev = Array1::from_iter(column_stats.iter().map(|s| s.1));
    let scale = Array1::from_iter(column_stats.iter().map(|s| if s.2 { 1.0 } else { s.1 }));
    let degenerate_features: Vec<usize> = column_stats
        .iter()
        .enumerate()
        .filter_map(|(j, s)| if s.2 { Some(j) } else { None })
        .collect();

    if !degenerate_features.is_empty() {
        warn!(
            "{} of {} features are constant; their standardized columns are zero.",
            degenerate_features.len(),
            n_features
        );
        debug!("Degenerate feature indices: {:?}", degenerate_features);
    }

    Ok(StandardizedFeatures {
        data: standardized,
        scaling: FeatureScaling { mean, std_dev, scale, degenerate_features },
    })
}
