use crate::types::{WcError, WcResult};
use ndarray::Array2;

/// Pairwise attenuation coefficient ratios `k_i / k_j`.
///
/// The diagonal holds `NaN` and is never read by the composer.
#[derive(Debug, Clone)]
pub struct RatioMatrix {
    values: Array2<f64>,
}

impl RatioMatrix {
    /// Wrap an externally computed square matrix
    pub fn from_array(values: Array2<f64>) -> WcResult<Self> {
        let (rows, cols) = values.dim();
        if rows != cols {
            return Err(WcError::ShapeMismatch(format!(
                "ratio matrix must be square, got {}x{}",
                rows, cols
            )));
        }
        if rows == 0 {
            return Err(WcError::InvalidInput("ratio matrix is empty".to_string()));
        }
        Ok(Self { values })
    }

    pub fn n_bands(&self) -> usize {
        self.values.nrows()
    }

    /// Ratio for an off-diagonal entry, `None` on the diagonal or out of range
    pub fn ratio(&self, i: usize, j: usize) -> Option<f64> {
        if i == j || i >= self.n_bands() || j >= self.n_bands() {
            None
        } else {
            Some(self.values[[i, j]])
        }
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_array(self) -> Array2<f64> {
        self.values
    }
}

/// Compute `slopes[i] / slopes[j]` for every ordered pair `i != j`.
///
/// A zero slope cannot serve as a denominator and fails with
/// [`WcError::DivisionByZero`] naming the first such band.
pub fn compute_ratios(slopes: &[f64]) -> WcResult<RatioMatrix> {
    let n = slopes.len();
    if n == 0 {
        return Err(WcError::InvalidInput("no slopes supplied".to_string()));
    }
    if let Some((band, slope)) = slopes.iter().enumerate().find(|(_, s)| !s.is_finite()) {
        return Err(WcError::InvalidInput(format!(
            "slope of band {} is not finite ({})",
            band, slope
        )));
    }
    if n > 1 {
        if let Some(band) = slopes.iter().position(|&s| s == 0.0) {
            return Err(WcError::DivisionByZero { band });
        }
    }

    let values = Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            f64::NAN
        } else {
            slopes[i] / slopes[j]
        }
    });

    log::debug!("Attenuation ratio matrix for {} bands: {:?}", n, values);
    Ok(RatioMatrix { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_band_ratio() {
        let ratios = compute_ratios(&[-1.0, -0.5]).unwrap();
        assert_eq!(ratios.ratio(0, 1), Some(2.0));
        assert_eq!(ratios.ratio(1, 0), Some(0.5));
        assert_eq!(ratios.ratio(0, 0), None);
        assert!(ratios.as_array()[[1, 1]].is_nan());
    }

    #[test]
    fn test_reciprocal_symmetry() {
        let slopes = [-0.93, -0.41, -0.077, -1.6, 0.22];
        let ratios = compute_ratios(&slopes).unwrap();

        for i in 0..slopes.len() {
            for j in 0..slopes.len() {
                if i == j {
                    continue;
                }
                let forward = ratios.ratio(i, j).unwrap();
                let backward = ratios.ratio(j, i).unwrap();
                assert_eq!(forward, slopes[i] / slopes[j]);
                assert_relative_eq!(forward * backward, 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_equal_slopes_give_unit_ratio() {
        let ratios = compute_ratios(&[-0.4, -0.4]).unwrap();
        assert_eq!(ratios.ratio(0, 1), Some(1.0));
    }

    #[test]
    fn test_zero_slope_fails() {
        let result = compute_ratios(&[-0.4, 0.0, -0.2]);
        assert!(matches!(result, Err(WcError::DivisionByZero { band: 1 })));
    }

    #[test]
    fn test_single_band_has_no_denominator() {
        let ratios = compute_ratios(&[0.0]).unwrap();
        assert_eq!(ratios.n_bands(), 1);
        assert_eq!(ratios.ratio(0, 0), None);
    }

    #[test]
    fn test_rejects_empty_and_non_finite() {
        assert!(matches!(compute_ratios(&[]), Err(WcError::InvalidInput(_))));
        assert!(matches!(
            compute_ratios(&[-0.2, f64::INFINITY]),
            Err(WcError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_array_requires_square() {
        assert!(RatioMatrix::from_array(Array2::zeros((2, 3))).is_err());
        assert!(RatioMatrix::from_array(Array2::zeros((3, 3))).is_ok());
    }
}
