//! Lyzenga (1978) Appendix B coordinate rotation.
//!
//! Rotates the N normalized bands so that the last axis lies along the
//! attenuation direction `k = -slopes`. The first N-1 rotated bands are then
//! depth-invariant and the last one carries the depth signal.
//!
//! Row layout of the rotation matrix `A`, with `n_m = sqrt(k_0² + ... + k_m²)`:
//!
//! * rows `i < N-1`, `j <= i`:  `A[i, j] = k_{i+1} k_j / (n_i n_{i+1})`   (B5)
//! * rows `i < N-1`, `j = i+1`: `A[i, j] = -n_i / n_{i+1}`                (B6)
//! * rows `i < N-1`, `j > i+1`: `A[i, j] = 0`                             (B7)
//! * row `N-1`:                 `A[N-1, j] = k_j / n_{N-1}`               (B2)

use crate::types::{WcError, WcResult};
use ndarray::{Array2, Array3};

#[derive(Debug, Clone)]
pub struct CoordinateRotation {
    matrix: Array2<f64>,
}

impl CoordinateRotation {
    /// Build the rotation from per-band regression slopes.
    ///
    /// Fails with `InvalidInput` for fewer than two bands, non-finite or
    /// all-zero slopes, and with `DivisionByZero { band: 0 }` when only the
    /// first slope is zero.
    pub fn from_slopes(slopes: &[f64]) -> WcResult<Self> {
        let n = slopes.len();
        if n < 2 {
            return Err(WcError::InvalidInput(format!(
                "rotation needs at least 2 bands, got {}",
                n
            )));
        }
        if let Some((band, slope)) = slopes.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(WcError::InvalidInput(format!(
                "slope of band {} is not finite ({})",
                band, slope
            )));
        }
        if slopes.iter().all(|&s| s == 0.0) {
            return Err(WcError::InvalidInput(
                "all slopes are zero, attenuation direction is undefined".to_string(),
            ));
        }
        // n_0 = |k_0| divides every row below the last
        if slopes[0] == 0.0 {
            return Err(WcError::DivisionByZero { band: 0 });
        }

        let k: Vec<f64> = slopes.iter().map(|s| -s).collect();

        // norms[m] = |k[..=m]|
        let norms: Vec<f64> = k
            .iter()
            .scan(0.0, |acc, &v| {
                *acc += v * v;
                Some(acc.sqrt())
            })
            .collect();

        let matrix = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == n - 1 {
                k[j] / norms[n - 1]
            } else if j <= i {
                k[i + 1] * k[j] / (norms[i] * norms[i + 1])
            } else if j == i + 1 {
                -norms[i] / norms[i + 1]
            } else {
                0.0
            }
        });

        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn n_bands(&self) -> usize {
        self.matrix.nrows()
    }

    /// Rotate (N, H*W) normalized bands into an (N, H, W) cube.
    ///
    /// Layers `0..N-1` are depth-invariant, layer `N-1` is depth-dependent.
    pub fn apply(&self, normalized: &Array2<f64>, shape: (usize, usize, usize)) -> WcResult<Array3<f64>> {
        let (height, width, n_bands) = shape;
        if self.n_bands() != n_bands || normalized.nrows() != n_bands {
            return Err(WcError::ShapeMismatch(format!(
                "rotation has {} bands, normalized data {}, image {}",
                self.n_bands(),
                normalized.nrows(),
                n_bands
            )));
        }
        if normalized.ncols() != height * width {
            return Err(WcError::ShapeMismatch(format!(
                "normalized bands hold {} pixels, expected {}x{}",
                normalized.ncols(),
                height,
                width
            )));
        }

        log::info!("Applying {}-band Lyzenga rotation to {}x{} pixels", n_bands, height, width);

        let rotated = self.matrix.dot(normalized);
        let flat: Vec<f64> = rotated.iter().copied().collect();
        Array3::from_shape_vec((n_bands, height, width), flat)
            .map_err(|e| WcError::ShapeMismatch(format!("Shape error: {}", e)))
    }
}
