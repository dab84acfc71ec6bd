use serde::{Deserialize, Serialize};

/// Cumulative variance fractions reported by default (80% and 95%).
pub const DEFAULT_VARIANCE_TARGETS: [f64; 2] = [0.80, 0.95];

/// How the standardized matrix is decomposed into principal axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecompositionMethod {
    /// Singular value decomposition of the standardized matrix itself.
    /// Numerically preferred for ill-conditioned data.
    #[default]
    Svd,
    /// Eigen-decomposition of the covariance matrix (features x features), or of
    /// the Gram matrix (samples x samples) when there are more features than samples.
    Covariance,
}

/// Parameters of a single analysis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Number of components to keep. `None` keeps `min(n_samples - 1, n_features)`.
    pub n_components: Option<usize>,
    /// Decomposition strategy.
    pub method: DecompositionMethod,
    /// Cumulative variance fractions for which the needed component count is reported.
    pub variance_targets: Vec<f64>,
}

impl Default for PcaConfig {
    fn default() -> Self {
        PcaConfig {
            n_components: None,
            method: DecompositionMethod::default(),
            variance_targets: DEFAULT_VARIANCE_TARGETS.to_vec(),
        }
    }
}

impl PcaConfig {
    pub fn with_n_components(mut self, n_components: Option<usize>) -> Self {
        self.n_components = n_components;
        self
    }

    pub fn with_method(mut self, method: DecompositionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_variance_targets(mut self, targets: Vec<f64>) -> Self {
        self.variance_targets = targets;
        self
    }
}
