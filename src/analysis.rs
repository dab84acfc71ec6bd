//! The full analysis pipeline and the result bundle it produces.

use crate::config::PcaConfig;
use crate::diagnostics::orthogonality_error;
use crate::error::{PcaError, Result};
use crate::pca::{PcaEngine, PrincipalComponents};
use crate::standardize::{standardize, FeatureScaling};
use crate::threshold::{components_for_variance, variance_thresholds, VarianceThreshold};
use crate::variance::{explained_variance, total_variance, DatasetCondition, VarianceProfile};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Everything one analysis run produces.
///
/// All fields are derived from the input matrix of a single call; the bundle
/// never refers back to caller-owned data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PcaAnalysis {
    /// Resolved component count k.
    n_components: usize,
    /// `min(n_samples - 1, n_features)` of the analysed matrix.
    max_components: usize,
    scaling: FeatureScaling,
    components: PrincipalComponents,
    /// Standardized data projected onto the components.
    /// Shape: (n_samples, k)
    projected: Array2<f64>,
    /// Variance summed over all possible components.
    total_variance: f64,
    variance: VarianceProfile,
    thresholds: Vec<VarianceThreshold>,
    /// Per-sample labels supplied by the caller; never read by the core.
    labels: Option<Vec<String>>,
}

impl PcaAnalysis {
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn max_components(&self) -> usize {
        self.max_components
    }

    pub fn n_samples(&self) -> usize {
        self.projected.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.components.n_features()
    }

    /// Component matrix with orthonormal rows. Shape: (k, n_features)
    pub fn components(&self) -> &Array2<f64> {
        self.components.components()
    }

    pub fn principal_components(&self) -> &PrincipalComponents {
        &self.components
    }

    /// Variance along each component. Shape: (k)
    pub fn explained_variance(&self) -> &Array1<f64> {
        self.components.variances()
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.variance.explained_variance_ratio
    }

    pub fn cumulative_variance(&self) -> &Array1<f64> {
        &self.variance.cumulative_variance
    }

    /// Shape: (n_samples, k)
    pub fn projected(&self) -> &Array2<f64> {
        &self.projected
    }

    pub fn total_variance(&self) -> f64 {
        self.total_variance
    }

    pub fn condition(&self) -> DatasetCondition {
        self.variance.condition
    }

    pub fn is_degenerate(&self) -> bool {
        self.variance.condition == DatasetCondition::Degenerate
    }

    pub fn scaling(&self) -> &FeatureScaling {
        &self.scaling
    }

    /// Component counts for the configured variance targets.
    pub fn variance_thresholds(&self) -> &[VarianceThreshold] {
        &self.thresholds
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Attaches one label per sample.
    pub fn with_labels(mut self, labels: Vec<String>) -> Result<Self> {
        if labels.len() != self.n_samples() {
            return Err(PcaError::LabelLengthMismatch { expected: self.n_samples(), got: labels.len() });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Smallest component count whose cumulative variance reaches `target`,
    /// or `None` if the retained components fall short.
    pub fn components_for_variance(&self, target: f64) -> Result<Option<usize>> {
        components_for_variance(self.variance.cumulative_variance.as_slice().unwrap_or(&[]), target)
    }

    pub fn thresholds_for(&self, targets: &[f64]) -> Result<Vec<VarianceThreshold>> {
        variance_thresholds(self.variance.cumulative_variance.as_slice().unwrap_or(&[]), targets)
    }

    /// Standardizes raw samples with the fitted statistics and projects them.
    pub fn transform_raw(&self, raw: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let standardized = self.scaling.transform(raw)?;
        self.components.project(&standardized.view())
    }

    /// Turns a degenerate result into `PcaError::DegenerateDataset`.
    pub fn require_informative(self) -> Result<Self> {
        match self.variance.condition {
            DatasetCondition::Informative => Ok(self),
            DatasetCondition::Degenerate => Err(PcaError::DegenerateDataset),
        }
    }

    /// Saves the analysis to a file using bincode serialization.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| PcaError::Serialization(format!("Failed to serialize PCA analysis: {}", e)))?;
        Ok(())
    }

    /// Loads an analysis written by [`PcaAnalysis::save`] and checks that its
    /// parts agree on shape.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let analysis: PcaAnalysis = bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
            .map_err(|e| PcaError::Serialization(format!("Failed to deserialize PCA analysis: {}", e)))?;
        analysis.validate()?;
        Ok(analysis)
    }

    fn validate(&self) -> Result<()> {
        let k = self.n_components;
        let inconsistent = |what: String| -> Result<()> {
            Err(PcaError::Serialization(format!("Loaded PCA analysis is inconsistent: {}", what)))
        };

        if let Err(what) = self.scaling.check_consistency() {
            return inconsistent(what);
        }
        if self.components.n_components() != k {
            return inconsistent(format!("{} components stored, expected {}", self.components.n_components(), k));
        }
        if self.components.n_features() != self.scaling.n_features() {
            return inconsistent(format!(
                "components have {} features, scaling has {}",
                self.components.n_features(),
                self.scaling.n_features()
            ));
        }
        if self.components.variances().len() != k
            || self.variance.explained_variance_ratio.len() != k
            || self.variance.cumulative_variance.len() != k
        {
            return inconsistent("variance vectors do not match the component count".into());
        }
        let non_negative = |v: &Array1<f64>| v.iter().all(|x| x.is_finite() && *x >= 0.0);
        if !non_negative(self.components.variances())
            || !non_negative(&self.variance.explained_variance_ratio)
            || !non_negative(&self.variance.cumulative_variance)
        {
            return inconsistent("variances must be finite and non-negative".into());
        }
        if self.components.components().iter().any(|x| !x.is_finite()) {
            return inconsistent("component matrix has non-finite entries".into());
        }
        if self.projected.ncols() != k {
            return inconsistent(format!("projected data has {} columns, expected {}", self.projected.ncols(), k));
        }
        if let Some(labels) = &self.labels {
            if labels.len() != self.projected.nrows() {
                return inconsistent(format!("{} labels for {} samples", labels.len(), self.projected.nrows()));
            }
        }
        if !self.total_variance.is_finite() || self.total_variance < 0.0 {
            return inconsistent(format!("total variance {}", self.total_variance));
        }
        Ok(())
    }
}

/// Runs standardization, decomposition, variance accounting and threshold
/// search as one strict pipeline.
///
/// The pipeline holds no state between calls, so one instance can serve
/// concurrent analyses of independent inputs.
#[derive(Debug, Clone, Default)]
pub struct PcaPipeline {
    config: PcaConfig,
    engine: PcaEngine,
}

impl PcaPipeline {
    pub fn new(config: PcaConfig) -> Self {
        let engine = PcaEngine::new(config.method);
        Self { config, engine }
    }

    pub fn config(&self) -> &PcaConfig {
        &self.config
    }

    /// Analyses a feature matrix of shape (n_samples, n_features).
    ///
    /// # Errors
    /// Any stage failure aborts the whole call: `EmptyFeatureSet`,
    /// `InvalidInput`, `InvalidComponentCount` or `Decomposition`. A dataset
    /// whose features are all constant is *not* an error; the result reports
    /// [`DatasetCondition::Degenerate`] with all-zero ratios.
    pub fn analyze(&self, data: &ArrayView2<f64>) -> Result<PcaAnalysis> {
        let (n_samples, n_features) = data.dim();
        info!(
            "Starting PCA analysis. Samples={}, Features={}, Requested components={:?}",
            n_samples, n_features, self.config.n_components
        );
        let overall_start_time = std::time::Instant::now();

        let standardized = standardize(data)?;
        let fit = self.engine.fit(&standardized.data.view(), self.config.n_components)?;

        if let Some(err) = orthogonality_error(&fit.components.components().view()) {
            debug!("Component orthogonality error ||I - C C^T||_F = {:e}", err);
        }

        let total = total_variance(&standardized.data.view());
        let variance = explained_variance(&fit.components.variances().view(), total)?;
        if variance.condition == DatasetCondition::Degenerate {
            warn!("All {} features are constant; the dataset carries no variance.", n_features);
        }

        let thresholds = variance_thresholds(
            variance.cumulative_variance.as_slice().unwrap_or(&[]),
            &self.config.variance_targets,
        )?;
        for threshold in &thresholds {
            match threshold.n_components {
                Some(n) => debug!("{:.0}% variance reached with {} components.", threshold.target * 100.0, n),
                None => debug!(
                    "{:.0}% variance not reached within {} components.",
                    threshold.target * 100.0,
                    fit.components.n_components()
                ),
            }
        }

        info!(
            "PCA analysis completed in {:?}. Kept {} of {} possible components.",
            overall_start_time.elapsed(),
            fit.components.n_components(),
            fit.max_components
        );

        Ok(PcaAnalysis {
            n_components: fit.components.n_components(),
            max_components: fit.max_components,
            scaling: standardized.scaling,
            components: fit.components,
            projected: fit.projected,
            total_variance: total,
            variance,
            thresholds,
            labels: None,
        })
    }
}

/// Runs a [`PcaPipeline`] built from `config` on `data`.
pub fn analyze(data: &ArrayView2<f64>, config: &PcaConfig) -> Result<PcaAnalysis> {
    PcaPipeline::new(config.clone()).analyze(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn sample_matrix() -> Array2<f64> {
        array![
            [2.5, 2.4, 1.0],
            [0.5, 0.7, 2.0],
            [2.2, 2.9, 1.5],
            [1.9, 2.2, 0.5],
            [3.1, 3.0, 1.0],
            [2.3, 2.7, 2.5],
            [2.0, 1.6, 1.0],
            [1.0, 1.1, 0.0],
            [1.5, 1.6, 1.5],
            [1.1, 0.9, 2.0]
        ]
    }

    #[test]
    fn analysis_bundle_has_consistent_shapes() {
        let analysis = analyze(&sample_matrix().view(), &PcaConfig::default()).unwrap();
        assert_eq!(analysis.n_components(), 3);
        assert_eq!(analysis.max_components(), 3);
        assert_eq!(analysis.components().dim(), (3, 3));
        assert_eq!(analysis.projected().dim(), (10, 3));
        assert_eq!(analysis.explained_variance_ratio().len(), 3);
        assert_eq!(analysis.cumulative_variance().len(), 3);
        assert_abs_diff_eq!(analysis.explained_variance_ratio().sum(), 1.0, epsilon = 1e-9);
        assert_eq!(analysis.variance_thresholds().len(), 2);
        assert_eq!(analysis.condition(), DatasetCondition::Informative);
    }

    #[test]
    fn thresholds_match_cumulative_search() {
        let analysis = analyze(&sample_matrix().view(), &PcaConfig::default()).unwrap();
        for t in analysis.variance_thresholds() {
            assert_eq!(analysis.components_for_variance(t.target).unwrap(), t.n_components);
        }
        assert_eq!(analysis.components_for_variance(1.0 - 1e-9).unwrap(), Some(3));
    }

    #[test]
    fn transform_raw_reproduces_projection() {
        let data = sample_matrix();
        let analysis = analyze(&data.view(), &PcaConfig::default()).unwrap();
        let again = analysis.transform_raw(&data.view()).unwrap();
        assert_abs_diff_eq!(&again, analysis.projected(), epsilon = 1e-12);
    }

    #[test]
    fn labels_must_match_sample_count() {
        let analysis = analyze(&sample_matrix().view(), &PcaConfig::default()).unwrap();
        let too_few = vec!["a".to_string(); 3];
        assert!(matches!(
            analysis.clone().with_labels(too_few),
            Err(PcaError::LabelLengthMismatch { expected: 10, got: 3 })
        ));
        let labelled = analysis.with_labels(vec!["a".to_string(); 10]).unwrap();
        assert_eq!(labelled.labels().map(|l| l.len()), Some(10));
    }

    #[test]
    fn degenerate_dataset_is_flagged_not_failed() {
        let data = array![[1.0, 5.0], [1.0, 5.0], [1.0, 5.0]];
        let analysis = analyze(&data.view(), &PcaConfig::default()).unwrap();
        assert!(analysis.is_degenerate());
        assert_eq!(analysis.total_variance(), 0.0);
        assert!(analysis.explained_variance_ratio().iter().all(|&r| r == 0.0));
        assert!(analysis.projected().iter().all(|v| v.is_finite()));
        assert_eq!(analysis.variance_thresholds()[0].n_components, None);
        assert!(matches!(analysis.require_informative(), Err(PcaError::DegenerateDataset)));
    }

    #[test]
    fn invalid_target_aborts_the_run() {
        let config = PcaConfig::default().with_variance_targets(vec![0.8, f64::NAN]);
        assert!(matches!(analyze(&sample_matrix().view(), &config), Err(PcaError::InvalidInput(_))));
    }

    #[test]
    fn save_and_load_preserve_the_bundle() {
        let analysis = analyze(&sample_matrix().view(), &PcaConfig::default().with_n_components(Some(2)))
            .unwrap()
            .with_labels((0..10).map(|i| format!("s{}", i)).collect())
            .unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        analysis.save(file.path()).unwrap();
        let loaded = PcaAnalysis::load(file.path()).unwrap();
        assert_eq!(loaded.n_components(), 2);
        assert_eq!(loaded.components(), analysis.components());
        assert_eq!(loaded.projected(), analysis.projected());
        assert_eq!(loaded.labels(), analysis.labels());
        assert_eq!(loaded.variance_thresholds(), analysis.variance_thresholds());
    }

    #[test]
    fn load_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(PcaAnalysis::load(dir.path().join("absent.bin")), Err(PcaError::Io(_))));
    }

    fn reload(analysis: &PcaAnalysis) -> Result<PcaAnalysis> {
        let file = tempfile::NamedTempFile::new().unwrap();
        analysis.save(file.path()).unwrap();
        PcaAnalysis::load(file.path())
    }

    #[test]
    fn load_rejects_inconsistent_scaling() {
        let analysis = analyze(&sample_matrix().view(), &PcaConfig::default()).unwrap();
        let scaling = analysis.scaling().clone();

        let mut short_scale = analysis.clone();
        short_scale.scaling = FeatureScaling::from_parts(
            scaling.mean().clone(),
            scaling.std_dev().clone(),
            array![1.0, 1.0],
            vec![],
        );
        assert!(matches!(reload(&short_scale), Err(PcaError::Serialization(_))));

        let mut zero_scale = analysis.clone();
        zero_scale.scaling =
            FeatureScaling::from_parts(scaling.mean().clone(), array![1.0, 1.0, 0.0], array![1.0, 1.0, 0.0], vec![]);
        assert!(matches!(reload(&zero_scale), Err(PcaError::Serialization(_))));

        let mut bad_index = analysis.clone();
        bad_index.scaling = FeatureScaling::from_parts(
            scaling.mean().clone(),
            scaling.std_dev().clone(),
            scaling.scale().clone(),
            vec![7],
        );
        assert!(matches!(reload(&bad_index), Err(PcaError::Serialization(_))));

        assert!(reload(&analysis).is_ok());
    }

    #[test]
    fn load_rejects_non_finite_variances() {
        let mut analysis = analyze(&sample_matrix().view(), &PcaConfig::default()).unwrap();
        analysis.variance.explained_variance_ratio[1] = f64::NAN;
        assert!(matches!(reload(&analysis), Err(PcaError::Serialization(_))));
    }
}
