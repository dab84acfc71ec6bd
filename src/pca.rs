// Principal component decomposition of a standardized matrix.

use crate::config::DecompositionMethod;
use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendEigh, BackendSVD, NdarrayLinAlgBackend};
use log::{debug, info, trace};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Below this norm a Gram-trick axis carries no usable direction and is
/// replaced from the canonical basis.
const AXIS_NORM_EPSILON: f64 = 1e-6;

/// Largest number of components a matrix of this shape supports:
/// `min(n_samples - 1, n_features)`.
pub fn max_components(n_samples: usize, n_features: usize) -> usize {
    n_samples.saturating_sub(1).min(n_features)
}

/// Resolves the requested component count against the matrix shape.
///
/// `None` means "all possible". With a single sample no component can be
/// estimated and an unset request fails with `InvalidInput`.
pub fn resolve_component_count(
    n_samples: usize,
    n_features: usize,
    requested: Option<usize>,
) -> Result<usize> {
    if n_features == 0 {
        return Err(PcaError::EmptyFeatureSet);
    }
    let max = max_components(n_samples, n_features);
    match requested {
        Some(k) if k < 1 || k > max => Err(PcaError::InvalidComponentCount { requested: k, max }),
        Some(k) => Ok(k),
        None if max == 0 => Err(PcaError::InvalidInput(format!(
            "At least 2 samples are required to estimate a principal component, got {}.",
            n_samples
        ))),
        None => Ok(max),
    }
}

/// An ordered, orthonormal set of principal axes with their variances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrincipalComponents {
    /// Unit-length, mutually orthogonal rows ordered by descending variance.
    /// Shape: (k_components, n_features)
    components: Array2<f64>,
    /// Variance along each component (eigenvalues of the covariance matrix).
    /// Shape: (k_components)
    variances: Array1<f64>,
}

impl PrincipalComponents {
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn variances(&self) -> &Array1<f64> {
        &self.variances
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    /// Projects standardized samples onto the components.
    /// Output shape: (n_samples, k_components).
    pub fn project(&self, standardized: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if standardized.ncols() != self.n_features() {
            return Err(PcaError::InvalidInput(format!(
                "Cannot project {} features onto components of length {}.",
                standardized.ncols(),
                self.n_features()
            )));
        }
        Ok(standardized.dot(&self.components.t()))
    }

    /// Maps component scores back into standardized feature space.
    /// Output shape: (n_samples, n_features).
    pub fn reconstruct(&self, scores: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if scores.ncols() != self.n_components() {
            return Err(PcaError::InvalidInput(format!(
                "Expected scores for {} components, got {}.",
                self.n_components(),
                scores.ncols()
            )));
        }
        Ok(scores.dot(&self.components))
    }
}

/// Output of one decomposition: the components and the projected data.
#[derive(Clone, Debug)]
pub struct PcaFit {
    pub components: PrincipalComponents,
    /// Shape: (n_samples, k_components)
    pub projected: Array2<f64>,
    /// `min(n_samples - 1, n_features)` for the fitted matrix.
    pub max_components: usize,
}

/// Decomposes standardized data into principal components.
///
/// Ordering is a stable sort by descending variance, so equal variances keep
/// the order the backend produced them in. Every component is sign-fixed so
/// that its entry of largest magnitude is positive (lowest index wins ties in
/// magnitude), which makes repeated runs on the same input bit-identical.
#[derive(Debug, Clone, Default)]
pub struct PcaEngine<B = NdarrayLinAlgBackend> {
    method: DecompositionMethod,
    backend: B,
}

impl PcaEngine<NdarrayLinAlgBackend> {
    pub fn new(method: DecompositionMethod) -> Self {
        Self { method, backend: NdarrayLinAlgBackend }
    }
}

impl<B> PcaEngine<B>
where
    B: BackendSVD<f64> + BackendEigh<f64>,
{
    pub fn with_backend(method: DecompositionMethod, backend: B) -> Self {
        Self { method, backend }
    }

    pub fn method(&self) -> DecompositionMethod {
        self.method
    }

    /// Extracts the `k` directions of largest variance and projects the data onto them.
    ///
    /// * `standardized` - shape (n_samples, n_features), columns already standardized.
    /// * `requested` - component count; `None` keeps `min(n_samples - 1, n_features)`.
    ///
    /// # Errors
    /// `EmptyFeatureSet`, `InvalidComponentCount`, `InvalidInput` (fewer than two
    /// samples with no explicit request) or `Decomposition` if the backend fails.
    /// Data with fewer informative directions than `k` is not an error; the extra
    /// components carry (near) zero variance.
    pub fn fit(&self, standardized: &ArrayView2<f64>, requested: Option<usize>) -> Result<PcaFit> {
        let (n_samples, n_features) = standardized.dim();
        let k = resolve_component_count(n_samples, n_features, requested)?;
        let max = max_components(n_samples, n_features);

        info!(
            "Decomposing {}x{} standardized matrix via {:?}, keeping {} of {} possible components.",
            n_samples, n_features, self.method, k, max
        );
        let start_time = std::time::Instant::now();

        let (axes, variances) = match self.method {
            DecompositionMethod::Svd => self.axes_via_svd(standardized)?,
            DecompositionMethod::Covariance if n_features <= n_samples => {
                self.axes_via_covariance(standardized)?
            }
            DecompositionMethod::Covariance => self.axes_via_gram(standardized)?,
        };

        let order = descending_variance_order(&variances);
        let keep = &order[..k];
        let mut components = axes.select(Axis(0), keep);
        let variances = variances.select(Axis(0), keep);
        apply_sign_convention(&mut components);

        let projected = standardized.dot(&components.t());
        debug!("Component variances: {:?}", variances);
        info!("Decomposition finished in {:?}.", start_time.elapsed());

        Ok(PcaFit {
            components: PrincipalComponents { components, variances },
            projected,
            max_components: max,
        })
    }

    /// Economy SVD of the standardized matrix; variance = s^2 / (n - 1).
    fn axes_via_svd(&self, standardized: &ArrayView2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        let n_samples = standardized.nrows();
        let output = self
            .backend
            .svd_into(standardized.to_owned(), false, true)
            .map_err(|e| PcaError::Decomposition(format!("SVD of standardized matrix failed: {}", e)))?;
        let vt = output
            .vt
            .ok_or_else(|| PcaError::Decomposition("SVD did not return right singular vectors.".into()))?;
        let rank = output.s.len();
        let axes = vt.slice(s![..rank, ..]).to_owned();
        let denom = (n_samples - 1) as f64;
        let variances = output.s.mapv(|sv| sv * sv / denom);
        trace!("SVD produced {} singular values.", rank);
        Ok((axes, variances))
    }

    /// Eigen-decomposition of the (n_features x n_features) covariance matrix.
    fn axes_via_covariance(&self, standardized: &ArrayView2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        let n_samples = standardized.nrows();
        let mut cov_matrix = standardized.t().dot(standardized);
        cov_matrix /= (n_samples - 1) as f64;

        let eig = self
            .backend
            .eigh_upper(&cov_matrix)
            .map_err(|e| PcaError::Decomposition(format!("Eigen decomposition of covariance matrix failed: {}", e)))?;

        // eigh is ascending; flip to descending before the stable sort
        let n = eig.eigenvalues.len();
        let mut axes = Array2::<f64>::zeros((n, standardized.ncols()));
        let mut variances = Array1::<f64>::zeros(n);
        for (dst, src) in (0..n).rev().enumerate() {
            axes.row_mut(dst).assign(&eig.eigenvectors.column(src));
            variances[dst] = eig.eigenvalues[src].max(0.0);
        }
        normalize_rows(&mut axes);
        Ok((axes, variances))
    }

    /// Gram trick for wide data: eigen-decompose X X^T / (n - 1) and map the
    /// eigenvectors back to feature space with X^T u.
    fn axes_via_gram(&self, standardized: &ArrayView2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        let (n_samples, n_features) = standardized.dim();
        let mut gram_matrix = standardized.dot(&standardized.t());
        gram_matrix /= (n_samples - 1) as f64;

        let eig = self
            .backend
            .eigh_upper(&gram_matrix)
            .map_err(|e| PcaError::Decomposition(format!("Eigen decomposition of Gram matrix failed: {}", e)))?;

        let n = eig.eigenvalues.len();
        let mut axes = Array2::<f64>::zeros((n, n_features));
        let mut variances = Array1::<f64>::zeros(n);
        for (dst, src) in (0..n).rev().enumerate() {
            let axis = standardized.t().dot(&eig.eigenvectors.column(src));
            axes.row_mut(dst).assign(&axis);
            variances[dst] = eig.eigenvalues[src].max(0.0);
        }
        orthonormalize_rows(&mut axes);
        Ok((axes, variances))
    }
}

/// Indices sorted by descending variance; stable, so ties keep backend order.
fn descending_variance_order(variances: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..variances.len()).collect();
    order.sort_by(|&a, &b| variances[b].total_cmp(&variances[a]));
    order
}

/// Flips each row so its entry of largest absolute value is positive.
/// The first such entry wins when several share the largest magnitude.
pub(crate) fn apply_sign_convention(components: &mut Array2<f64>) {
    for mut row in components.rows_mut() {
        let mut pivot = 0;
        let mut largest = f64::NEG_INFINITY;
        for (j, &value) in row.iter().enumerate() {
            if value.abs() > largest {
                largest = value.abs();
                pivot = j;
            }
        }
        if !row.is_empty() && row[pivot] < 0.0 {
            row.mapv_inplace(|v| -v);
        }
    }
}

fn normalize_rows(rows: &mut Array2<f64>) {
    for mut row in rows.rows_mut() {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

/// Modified Gram-Schmidt over the rows, in order. Rows that collapse (zero
/// variance axes) are replaced by the canonical basis vector with the largest
/// residual against the rows before them.
fn orthonormalize_rows(rows: &mut Array2<f64>) {
    let n_rows = rows.nrows();
    for i in 0..n_rows {
        let mut v = rows.row(i).to_owned();
        let initial_norm = v.dot(&v).sqrt();
        if initial_norm > 0.0 {
            v.mapv_inplace(|x| x / initial_norm);
        }
        // two passes keep the residual orthogonal to working precision
        for _ in 0..2 {
            for j in 0..i {
                let prev = rows.row(j);
                let d = prev.dot(&v);
                v.scaled_add(-d, &prev);
            }
        }
        let norm = v.dot(&v).sqrt();
        let axis = if initial_norm > 0.0 && norm > AXIS_NORM_EPSILON {
            v.mapv(|x| x / norm)
        } else {
            trace!("Axis {} has no usable direction; completing from the canonical basis.", i);
            canonical_completion(rows, i)
        };
        rows.row_mut(i).assign(&axis);
    }
}

/// Unit vector orthogonal to rows `0..i`, built from the canonical basis vector
/// whose residual is largest (lowest index on ties).
fn canonical_completion(rows: &Array2<f64>, i: usize) -> Array1<f64> {
    let n_features = rows.ncols();
    let mut best = Array1::<f64>::zeros(n_features);
    let mut best_norm = 0.0;
    for e in 0..n_features {
        let mut v = Array1::<f64>::zeros(n_features);
        v[e] = 1.0;
        for _ in 0..2 {
            for j in 0..i {
                let prev = rows.row(j);
                let d = prev.dot(&v);
                v.scaled_add(-d, &prev);
            }
        }
        let norm = v.dot(&v).sqrt();
        if norm > best_norm {
            best_norm = norm;
            best = v;
        }
    }
    if best_norm > 0.0 {
        best.mapv_inplace(|x| x / best_norm);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn assert_orthonormal_rows(m: &Array2<f64>, eps: f64) {
        let gram = m.dot(&m.t());
        assert_abs_diff_eq!(gram, Array2::<f64>::eye(m.nrows()), epsilon = eps);
    }

    #[test]
    fn resolves_component_counts() {
        assert_eq!(resolve_component_count(5, 3, None).unwrap(), 3);
        assert_eq!(resolve_component_count(3, 10, None).unwrap(), 2);
        assert_eq!(resolve_component_count(5, 3, Some(2)).unwrap(), 2);
        assert!(matches!(
            resolve_component_count(5, 3, Some(0)),
            Err(PcaError::InvalidComponentCount { requested: 0, max: 3 })
        ));
        assert!(matches!(
            resolve_component_count(3, 10, Some(3)),
            Err(PcaError::InvalidComponentCount { requested: 3, max: 2 })
        ));
        assert!(matches!(resolve_component_count(1, 4, None), Err(PcaError::InvalidInput(_))));
        assert!(matches!(
            resolve_component_count(1, 4, Some(1)),
            Err(PcaError::InvalidComponentCount { requested: 1, max: 0 })
        ));
        assert!(matches!(resolve_component_count(4, 0, None), Err(PcaError::EmptyFeatureSet)));
    }

    #[test]
    fn sign_convention_makes_largest_entry_positive() {
        let mut m = array![[0.1, -0.9, 0.3], [0.5, -0.5, 0.0], [-0.2, 0.1, 0.0]];
        apply_sign_convention(&mut m);
        assert_eq!(m.row(0).to_vec(), vec![-0.1, 0.9, -0.3]);
        // magnitude tie: first index decides
        assert_eq!(m.row(1).to_vec(), vec![0.5, -0.5, 0.0]);
        assert_eq!(m.row(2).to_vec(), vec![0.2, -0.1, -0.0]);
    }

    #[test]
    fn stable_ordering_keeps_ties_in_backend_order() {
        let variances = array![1.0, 3.0, 1.0, 2.0];
        assert_eq!(descending_variance_order(&variances), vec![1, 3, 0, 2]);
    }

    #[test]
    fn orthonormalize_completes_zero_rows() {
        let mut rows = array![[3.0, 0.0, 4.0], [0.0, 0.0, 0.0], [1e-20, 0.0, 0.0]];
        orthonormalize_rows(&mut rows);
        assert_orthonormal_rows(&rows, 1e-12);
        assert_abs_diff_eq!(rows[[0, 0]], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn axis_aligned_data_recovers_axes() {
        // variance lives on feature 1 mostly, feature 0 less, feature 2 none
        let z = array![[1.0, 3.0, 0.0], [-1.0, -3.0, 0.0], [1.0, -3.0, 0.0], [-1.0, 3.0, 0.0]];
        for method in [DecompositionMethod::Svd, DecompositionMethod::Covariance] {
            let fit = PcaEngine::new(method).fit(&z.view(), None).unwrap();
            let c = fit.components.components();
            assert_eq!(c.dim(), (3, 3));
            assert_abs_diff_eq!(c.row(0).to_owned(), array![0.0, 1.0, 0.0], epsilon = 1e-12);
            assert_abs_diff_eq!(c.row(1).to_owned(), array![1.0, 0.0, 0.0], epsilon = 1e-12);
            let v = fit.components.variances();
            assert_abs_diff_eq!(v[0], 12.0, epsilon = 1e-10);
            assert_abs_diff_eq!(v[1], 4.0 / 3.0, epsilon = 1e-10);
            assert_abs_diff_eq!(v[2], 0.0, epsilon = 1e-10);
            assert_orthonormal_rows(c, 1e-12);
        }
    }

    #[test]
    fn gram_path_matches_svd_path_on_wide_data() {
        let z = array![
            [1.0, 2.0, -1.0, 0.5, 0.0],
            [-2.0, 0.5, 1.0, -1.0, 2.0],
            [0.5, -1.5, 0.5, 1.5, -1.0],
            [0.5, -1.0, -0.5, -1.0, -1.0]
        ];
        let svd = PcaEngine::new(DecompositionMethod::Svd).fit(&z.view(), None).unwrap();
        let gram = PcaEngine::new(DecompositionMethod::Covariance).fit(&z.view(), None).unwrap();
        assert_eq!(svd.max_components, 3);
        assert_abs_diff_eq!(svd.components.variances(), gram.components.variances(), epsilon = 1e-9);
        assert_abs_diff_eq!(svd.components.components(), gram.components.components(), epsilon = 1e-8);
        assert_orthonormal_rows(gram.components.components(), 1e-10);
    }

    #[test]
    fn projection_and_reconstruction_check_shapes() {
        let z = array![[1.0, -1.0], [-1.0, 1.0], [0.5, 0.5], [-0.5, -0.5]];
        let fit = PcaEngine::new(DecompositionMethod::Svd).fit(&z.view(), Some(1)).unwrap();
        assert_eq!(fit.projected.dim(), (4, 1));
        assert!(fit.components.project(&array![[1.0, 2.0, 3.0]].view()).is_err());
        assert!(fit.components.reconstruct(&array![[1.0, 2.0]].view()).is_err());
        let back = fit.components.reconstruct(&fit.projected.view()).unwrap();
        assert_eq!(back.dim(), (4, 2));
    }
}
