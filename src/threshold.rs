//! Component counts needed to reach a cumulative variance fraction.

use crate::error::{PcaError, Result};
use serde::{Deserialize, Serialize};

/// How many components a cumulative variance target needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarianceThreshold {
    /// Target fraction, e.g. 0.95.
    pub target: f64,
    /// 1-based component count, or `None` if the retained components never reach `target`.
    pub n_components: Option<usize>,
}

/// Smallest 1-based `i` with `cumulative[i - 1] >= target`.
///
/// `cumulative` must be non-decreasing. Returns `Ok(None)` when the target is
/// not reached within the given components, which happens whenever fewer than
/// all possible components were retained.
///
/// # Errors
/// `InvalidInput` for an empty sequence or a non-finite target.
pub fn components_for_variance(cumulative: &[f64], target: f64) -> Result<Option<usize>> {
    if cumulative.is_empty() {
        return Err(PcaError::InvalidInput("Cumulative variance sequence is empty.".into()));
    }
    if !target.is_finite() {
        return Err(PcaError::InvalidInput(format!("Variance target must be finite, got {}.", target)));
    }
    let idx = cumulative.partition_point(|&c| c < target);
    Ok(if idx < cumulative.len() { Some(idx + 1) } else { None })
}

/// Evaluates several targets against the same cumulative sequence.
pub fn variance_thresholds(cumulative: &[f64], targets: &[f64]) -> Result<Vec<VarianceThreshold>> {
    targets
        .iter()
        .map(|&target| {
            components_for_variance(cumulative, target)
                .map(|n_components| VarianceThreshold { target, n_components })
        })
        .collect()
}
