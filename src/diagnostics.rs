// src/diagnostics.rs

use ndarray::{Array2, ArrayView2};

/// Frobenius norm of a matrix.
pub fn frobenius_norm(matrix: &ArrayView2<f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    matrix.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Orthogonality error ||I - C C^T||_F for a matrix whose rows should be orthonormal.
/// Returns `None` for an empty matrix.
pub fn orthogonality_error(components: &ArrayView2<f64>) -> Option<f64> {
    if components.nrows() == 0 || components.ncols() == 0 {
        return None;
    }
    let cct = components.dot(&components.t());
    let diff = Array2::<f64>::eye(cct.nrows()) - cct;
    Some(frobenius_norm(&diff.view()))
}

/// Relative reconstruction error ||A - R||_F / ||A||_F.
///
/// Returns `None` on a shape mismatch. A zero original reconstructs perfectly
/// only from a zero reconstruction; otherwise the error is infinite.
pub fn reconstruction_error(original: &ArrayView2<f64>, reconstructed: &ArrayView2<f64>) -> Option<f64> {
    if original.dim() != reconstructed.dim() {
        return None;
    }
    let diff = original - reconstructed;
    let norm_diff = frobenius_norm(&diff.view());
    let norm_original = frobenius_norm(original);

    if norm_original < 1e-12 {
        if norm_diff < 1e-12 {
            Some(0.0)
        } else {
            Some(f64::INFINITY)
        }
    } else {
        Some(norm_diff / norm_original)
    }
}

/// Largest absolute entry-wise difference between two matrices of equal shape.
pub fn max_abs_difference(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> Option<f64> {
    if a.dim() != b.dim() {
        return None;
    }
    Some(a.iter().zip(b.iter()).fold(0.0, |acc, (x, y)| f64::max(acc, (x - y).abs())))
}
