use crate::core::attenuation::{compute_ratios, RatioMatrix};
use crate::core::depth_invariant::{DepthInvariantComposer, DepthInvariantStack};
use crate::core::normalize::{BandNormalizer, InvalidPixelPolicy};
use crate::core::regression::RegressionEstimator;
use crate::core::rotation::CoordinateRotation;
use crate::types::{CalibrationSet, MultibandImage, WcError, WcResult};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Water column correction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionParams {
    /// Handling of pixels <= 0 under the logarithm
    pub invalid_pixel_policy: InvalidPixelPolicy,
    /// Pixel count from which bands and pairs are processed in parallel
    pub parallel_min_pixels: usize,
    /// Regression fits below this r² are logged as weak
    pub min_r_squared: f64,
    /// Also produce the Lyzenga rotated cube (N-1 invariant bands + depth band)
    pub include_rotation: bool,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            invalid_pixel_policy: InvalidPixelPolicy::Fail,
            parallel_min_pixels: 262_144, // 512x512
            min_r_squared: 0.5,
            include_rotation: false,
        }
    }
}

impl CorrectionParams {
    /// Parse parameters from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> WcResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Result of one water column correction run
#[derive(Debug, Clone)]
pub struct CorrectionOutput {
    /// Regression slope per band
    pub slopes: Vec<f64>,
    pub ratios: RatioMatrix,
    /// Pairwise depth-invariant indices
    pub stack: DepthInvariantStack,
    /// (N, H, W) rotated cube, present when `include_rotation` is set
    pub rotated: Option<Array3<f64>>,
}

/// End-to-end water column correction
pub struct WaterColumnCorrector {
    params: CorrectionParams,
}

impl WaterColumnCorrector {
    pub fn new(params: CorrectionParams) -> Self {
        Self { params }
    }

    /// Create corrector with default parameters
    pub fn standard() -> Self {
        Self::new(CorrectionParams::default())
    }

    pub fn params(&self) -> &CorrectionParams {
        &self.params
    }

    /// Regress every band's calibration samples and return the slopes
    pub fn estimate_slopes(&self, calibration: &[CalibrationSet]) -> WcResult<Vec<f64>> {
        RegressionEstimator::new(self.params.min_r_squared).fit_bands(calibration)
    }

    /// Run the full correction from calibration samples
    ///
    /// # Arguments
    /// * `image` - Multiband scene, one (H, W) layer per band
    /// * `calibration` - Depth/reflectance samples, `calibration[k]` for band `k`
    /// * `deep_water` - Optically deep water mean per band, all positive
    ///
    /// # Returns
    /// * Slopes, ratio matrix, pairwise index stack and, if `include_rotation`
    ///   is set, the rotated cube
    pub fn correct(
        &self,
        image: &MultibandImage,
        calibration: &[CalibrationSet],
        deep_water: &[f64],
    ) -> WcResult<CorrectionOutput> {
        if calibration.len() != image.n_bands() {
            return Err(WcError::InvalidInput(format!(
                "{} calibration sets supplied for {} bands",
                calibration.len(),
                image.n_bands()
            )));
        }

        let slopes = self.estimate_slopes(calibration)?;
        self.correct_with_slopes(image, &slopes, deep_water)
    }

    /// Run the correction with slopes estimated elsewhere
    pub fn correct_with_slopes(
        &self,
        image: &MultibandImage,
        slopes: &[f64],
        deep_water: &[f64],
    ) -> WcResult<CorrectionOutput> {
        let (height, width) = image.shape();
        log::info!(
            "Water column correction: {} bands, {}x{} pixels",
            image.n_bands(),
            height,
            width
        );

        if slopes.len() != image.n_bands() {
            return Err(WcError::InvalidInput(format!(
                "{} slopes supplied for {} bands",
                slopes.len(),
                image.n_bands()
            )));
        }
        log::debug!("Slopes: {:?}", slopes);

        let ratios = compute_ratios(slopes)?;

        let normalizer = BandNormalizer::new(
            self.params.invalid_pixel_policy,
            self.params.parallel_min_pixels,
        );
        let normalized = normalizer.normalize(image, deep_water)?;

        let shape = image.composition_shape();
        let stack = DepthInvariantComposer::new(self.params.parallel_min_pixels)
            .compose(&ratios, &normalized, shape)?;

        let rotated = if self.params.include_rotation {
            Some(CoordinateRotation::from_slopes(slopes)?.apply(&normalized, shape)?)
        } else {
            None
        };

        log::info!("Water column correction complete: {} index bands", stack.len());

        Ok(CorrectionOutput {
            slopes: slopes.to_vec(),
            ratios,
            stack,
            rotated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_params_from_partial_json() {
        let params = CorrectionParams::from_json(r#"{"invalid_pixel_policy": "propagate"}"#).unwrap();
        assert_eq!(params.invalid_pixel_policy, InvalidPixelPolicy::Propagate);
        assert_eq!(params.parallel_min_pixels, 262_144);
        assert!(!params.include_rotation);
    }

    #[test]
    fn test_corrector_keeps_params() {
        let params = CorrectionParams::from_json(
            r#"{"include_rotation": true, "min_r_squared": 0.9, "parallel_min_pixels": 16}"#,
        )
        .unwrap();
        let corrector = WaterColumnCorrector::new(params.clone());

        assert_eq!(corrector.params(), &params);
        assert!(corrector.params().include_rotation);
        assert_eq!(corrector.params().parallel_min_pixels, 16);
        assert_eq!(WaterColumnCorrector::standard().params(), &CorrectionParams::default());
    }

    #[test]
    fn test_params_from_bad_json() {
        let result = CorrectionParams::from_json(r#"{"invalid_pixel_policy": "ignore"}"#);
        assert!(matches!(result, Err(WcError::Config(_))));
    }

    #[test]
    fn test_correct_with_slopes() {
        let image = MultibandImage::from_bands(vec![
            array![[10.0, 20.0], [30.0, 40.0]],
            array![[5.0, 10.0], [15.0, 20.0]],
        ])
        .unwrap();

        let output = WaterColumnCorrector::standard()
            .correct_with_slopes(&image, &[-1.0, -0.5], &[10.0, 5.0])
            .unwrap();

        let index = output.stack.get(0, 1).unwrap();
        assert_abs_diff_eq!(index[[1, 1]], -(4f64.ln()), epsilon = 1e-12);
        assert!(output.rotated.is_none());
    }

    #[test]
    fn test_slope_count_must_match_bands() {
        let image = MultibandImage::from_bands(vec![array![[1.0, 2.0]], array![[1.0, 2.0]]]).unwrap();
        let result = WaterColumnCorrector::standard().correct_with_slopes(&image, &[-1.0], &[1.0, 1.0]);
        assert!(matches!(result, Err(WcError::InvalidInput(_))));
    }

    #[test]
    fn test_rotation_included_on_request() {
        let image = MultibandImage::from_bands(vec![
            array![[10.0, 20.0], [30.0, 40.0]],
            array![[5.0, 10.0], [15.0, 20.0]],
            array![[2.0, 3.0], [4.0, 5.0]],
        ])
        .unwrap();
        let params = CorrectionParams {
            include_rotation: true,
            ..CorrectionParams::default()
        };

        let output = WaterColumnCorrector::new(params)
            .correct_with_slopes(&image, &[-1.0, -0.5, -0.2], &[10.0, 5.0, 2.0])
            .unwrap();

        assert_eq!(output.stack.len(), 3);
        assert_eq!(output.rotated.unwrap().dim(), (3, 2, 2));
    }
}
