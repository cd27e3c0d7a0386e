use crate::types::{MultibandImage, WcError, WcResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// What to do with pixels whose logarithm is undefined (<= 0, NaN, inf)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidPixelPolicy {
    /// Stop at the first invalid pixel in (band, row-major pixel) order
    #[default]
    Fail,
    /// Write NaN for the pixel and carry on; NaN flows through composition
    Propagate,
}

/// Log-deviation of one pixel from the deep-water reference
pub fn log_deviation(pixel: f64, deep_water: f64) -> f64 {
    pixel.ln() - deep_water.ln()
}

/// Computes `Xi = ln(L) - ln(L_deep)` per band and pixel
#[derive(Debug, Clone)]
pub struct BandNormalizer {
    policy: InvalidPixelPolicy,
    /// Images with at least this many pixels per band run bands in parallel
    parallel_min_pixels: usize,
}

impl Default for BandNormalizer {
    fn default() -> Self {
        Self {
            policy: InvalidPixelPolicy::Fail,
            parallel_min_pixels: 262_144, // 512x512
        }
    }
}

impl BandNormalizer {
    pub fn new(policy: InvalidPixelPolicy, parallel_min_pixels: usize) -> Self {
        Self {
            policy,
            parallel_min_pixels,
        }
    }

    pub fn with_policy(policy: InvalidPixelPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> InvalidPixelPolicy {
        self.policy
    }

    /// Normalize every band of `image`.
    ///
    /// # Arguments
    /// * `image` - Multiband scene
    /// * `deep_water` - Positive deep-water mean per band
    ///
    /// # Returns
    /// * (N, H*W) array whose row `k` is band `k` flattened row-major
    pub fn normalize(&self, image: &MultibandImage, deep_water: &[f64]) -> WcResult<Array2<f64>> {
        let n_bands = image.n_bands();
        let n_pixels = image.n_pixels();

        if deep_water.len() != n_bands {
            return Err(WcError::InvalidInput(format!(
                "{} deep-water means supplied for {} bands",
                deep_water.len(),
                n_bands
            )));
        }
        if let Some((band, value)) = deep_water
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v > 0.0))
        {
            return Err(WcError::InvalidInput(format!(
                "deep-water mean of band {} must be positive, got {}",
                band, value
            )));
        }

        log::info!(
            "Normalizing {} bands of {}x{} against deep water ({:?} policy)",
            n_bands,
            image.shape().0,
            image.shape().1,
            self.policy
        );

        let bands = if n_pixels >= self.parallel_min_pixels {
            self.normalize_bands_parallel(image, deep_water)?
        } else {
            log::debug!("Normalizing bands sequentially");
            (0..n_bands)
                .map(|band| self.normalize_band(image, band, deep_water[band]))
                .collect::<WcResult<Vec<Vec<f64>>>>()?
        };

        let flat: Vec<f64> = bands.into_iter().flatten().collect();
        Array2::from_shape_vec((n_bands, n_pixels), flat)
            .map_err(|e| WcError::ShapeMismatch(format!("Shape error: {}", e)))
    }

    #[cfg(feature = "parallel")]
    fn normalize_bands_parallel(
        &self,
        image: &MultibandImage,
        deep_water: &[f64],
    ) -> WcResult<Vec<Vec<f64>>> {
        use rayon::prelude::*;

        log::debug!("Normalizing {} bands in parallel", image.n_bands());

        let results: Vec<WcResult<Vec<f64>>> = (0..image.n_bands())
            .into_par_iter()
            .map(|band| self.normalize_band(image, band, deep_water[band]))
            .collect();

        // Report the lowest failing band, same as the sequential path
        results.into_iter().collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn normalize_bands_parallel(
        &self,
        image: &MultibandImage,
        deep_water: &[f64],
    ) -> WcResult<Vec<Vec<f64>>> {
        (0..image.n_bands())
            .map(|band| self.normalize_band(image, band, deep_water[band]))
            .collect()
    }

    fn normalize_band(&self, image: &MultibandImage, band: usize, deep_water: f64) -> WcResult<Vec<f64>> {
        let pixels = image.band(band);
        let (_, width) = image.shape();

        let mut out = Vec::with_capacity(pixels.len());
        let mut invalid = 0usize;

        for (index, &value) in pixels.iter().enumerate() {
            if value.is_finite() && value > 0.0 {
                out.push(log_deviation(value, deep_water));
                continue;
            }
            match self.policy {
                InvalidPixelPolicy::Fail => {
                    return Err(WcError::InvalidPixelValue {
                        band,
                        row: index / width,
                        col: index % width,
                        value,
                    });
                }
                InvalidPixelPolicy::Propagate => {
                    invalid += 1;
                    out.push(f64::NAN);
                }
            }
        }

        if invalid > 0 {
            log::warn!("Band {}: {} invalid pixels set to NaN", band, invalid);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn two_band_image() -> MultibandImage {
        MultibandImage::from_bands(vec![
            array![[10.0, 20.0], [30.0, 40.0]],
            array![[5.0, 10.0], [15.0, 20.0]],
        ])
        .unwrap()
    }

    #[test]
    fn test_log_deviation_against_deep_water() {
        let xi = BandNormalizer::default()
            .normalize(&two_band_image(), &[10.0, 5.0])
            .unwrap();

        assert_eq!(xi.dim(), (2, 4));
        let expected = [0.0, 2f64.ln(), 3f64.ln(), 4f64.ln()];
        for band in 0..2 {
            for (p, &e) in expected.iter().enumerate() {
                assert_abs_diff_eq!(xi[[band, p]], e, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_formula_and_monotonicity() {
        let m = 0.037f64;
        let mut previous = f64::NEG_INFINITY;
        for p in [0.001f64, 0.01, 0.037, 0.2, 3.5, 1.0e4] {
            let value = log_deviation(p, m);
            assert_eq!(value, p.ln() - m.ln());
            assert!(value > previous);
            previous = value;
        }
    }

    #[test]
    fn test_zero_pixel_fails_with_location() {
        let image = MultibandImage::from_bands(vec![
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            array![[1.0, 2.0, 3.0], [4.0, 0.0, 6.0]],
        ])
        .unwrap();

        let result = BandNormalizer::default().normalize(&image, &[1.0, 1.0]);
        match result {
            Err(WcError::InvalidPixelValue { band, row, col, value }) => {
                assert_eq!((band, row, col), (1, 1, 1));
                assert_eq!(value, 0.0);
            }
            other => panic!("expected InvalidPixelValue, got {:?}", other),
        }
    }

    #[test]
    fn test_propagate_policy_writes_nan() {
        let image = MultibandImage::from_bands(vec![array![[1.0, -2.0], [f64::NAN, 4.0]]]).unwrap();

        let normalizer = BandNormalizer::with_policy(InvalidPixelPolicy::Propagate);
        assert_eq!(normalizer.policy(), InvalidPixelPolicy::Propagate);
        assert_eq!(BandNormalizer::default().policy(), InvalidPixelPolicy::Fail);

        let xi = normalizer.normalize(&image, &[1.0]).unwrap();

        assert_eq!(xi[[0, 0]], 0.0);
        assert!(xi[[0, 1]].is_nan());
        assert!(xi[[0, 2]].is_nan());
        assert_abs_diff_eq!(xi[[0, 3]], 4f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_deep_water_validation() {
        let normalizer = BandNormalizer::default();
        let image = two_band_image();

        assert!(matches!(
            normalizer.normalize(&image, &[10.0]),
            Err(WcError::InvalidInput(_))
        ));
        assert!(matches!(
            normalizer.normalize(&image, &[10.0, 0.0]),
            Err(WcError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let image = MultibandImage::from_bands(vec![
            Array2::from_shape_fn((16, 9), |(r, c)| 1.0 + (r * 9 + c) as f64),
            Array2::from_shape_fn((16, 9), |(r, c)| 0.5 + (r + c) as f64 * 0.25),
            Array2::from_shape_fn((16, 9), |(r, c)| 2.0 + ((r * c) % 7) as f64),
        ])
        .unwrap();
        let dw = [1.5, 0.7, 2.2];

        let sequential = BandNormalizer::new(InvalidPixelPolicy::Fail, usize::MAX)
            .normalize(&image, &dw)
            .unwrap();
        let parallel = BandNormalizer::new(InvalidPixelPolicy::Fail, 0)
            .normalize(&image, &dw)
            .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_parallel_reports_lowest_failing_band() {
        let image = MultibandImage::from_bands(vec![
            array![[1.0, 1.0]],
            array![[1.0, 0.0]],
            array![[-1.0, 1.0]],
        ])
        .unwrap();

        let result = BandNormalizer::new(InvalidPixelPolicy::Fail, 0).normalize(&image, &[1.0; 3]);
        assert!(matches!(
            result,
            Err(WcError::InvalidPixelValue { band: 1, row: 0, col: 1, .. })
        ));
    }
}
