//! Explained-variance accounting.

use crate::error::{PcaError, Result};
use log::warn;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Whether the dataset carries any variance at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetCondition {
    /// Total variance is positive.
    Informative,
    /// Every feature is constant; all ratios are defined as 0.
    Degenerate,
}

/// Explained-variance ratio and its running sum for the retained components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarianceProfile {
    /// Shape: (k_components)
    pub explained_variance_ratio: Array1<f64>,
    /// Prefix sums of `explained_variance_ratio`. Shape: (k_components)
    pub cumulative_variance: Array1<f64>,
    pub condition: DatasetCondition,
}

/// Total variance over all possible components of a standardized matrix:
/// the trace of its covariance matrix, `sum(z^2) / (n - 1)`.
///
/// Returns 0 for fewer than two samples.
pub fn total_variance(standardized: &ArrayView2<f64>) -> f64 {
    let n_samples = standardized.nrows();
    if n_samples < 2 {
        return 0.0;
    }
    standardized.iter().map(|v| v * v).sum::<f64>() / (n_samples - 1) as f64
}

/// Divides each component variance by the total variance and accumulates.
///
/// `total` must cover *all* possible components, not only the retained ones,
/// so the cumulative sum reaches 1 only when every component is kept.
/// A total of exactly 0 marks the dataset as degenerate and yields all-zero ratios.
///
/// # Errors
/// `InvalidInput` if any variance or the total is negative or non-finite.
pub fn explained_variance(variances: &ArrayView1<f64>, total: f64) -> Result<VarianceProfile> {
    if !total.is_finite() || total < 0.0 {
        return Err(PcaError::InvalidInput(format!(
            "Total variance must be finite and non-negative, got {}.",
            total
        )));
    }
    if let Some(bad) = variances.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(PcaError::InvalidInput(format!(
            "Component variances must be finite and non-negative, got {}.",
            bad
        )));
    }

    if total == 0.0 {
        warn!("Total variance is zero; every explained-variance ratio is defined as 0.");
        return Ok(VarianceProfile {
            explained_variance_ratio: Array1::zeros(variances.len()),
            cumulative_variance: Array1::zeros(variances.len()),
            condition: DatasetCondition::Degenerate,
        });
    }

    let explained_variance_ratio = variances.mapv(|v| v / total);
    let mut running = 0.0;
    let cumulative_variance = explained_variance_ratio.mapv(|r| {
        running += r;
        running
    });

    Ok(VarianceProfile {
        explained_variance_ratio,
        cumulative_variance,
        condition: DatasetCondition::Informative,
    })
}
