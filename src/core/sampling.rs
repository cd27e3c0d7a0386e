use crate::types::{CalibrationSample, CalibrationSet, MultibandImage, WcError, WcResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Pixel with a known water depth, e.g. from a sounding or lidar survey
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthPoint {
    pub row: usize,
    pub col: usize,
    pub depth: f64,
}

/// Mean of each band over the pixels selected by `mask`.
///
/// Every selected pixel must be positive and finite, since the means feed a
/// logarithm downstream.
pub fn deep_water_means(image: &MultibandImage, mask: &Array2<bool>) -> WcResult<Vec<f64>> {
    if mask.dim() != image.shape() {
        return Err(WcError::ShapeMismatch(format!(
            "mask shape {:?} does not match image shape {:?}",
            mask.dim(),
            image.shape()
        )));
    }

    let selected = mask.iter().filter(|&&m| m).count();
    if selected == 0 {
        return Err(WcError::InvalidInput("deep-water mask selects no pixels".to_string()));
    }

    let mut means = Vec::with_capacity(image.n_bands());
    for band in 0..image.n_bands() {
        let mut sum = 0.0f64;
        let mut invalid: Option<(usize, usize, f64)> = None;

        for ((row, col), &value) in image.band(band).indexed_iter() {
            if !mask[[row, col]] {
                continue;
            }
            if value.is_finite() && value > 0.0 {
                sum += value;
            } else {
                invalid = Some((row, col, value));
                break;
            }
        }

        if let Some((row, col, value)) = invalid {
            return Err(WcError::InvalidPixelValue {
                band,
                row,
                col,
                value,
            });
        }
        means.push(sum / selected as f64);
    }

    log::info!(
        "Deep-water means over {} pixels: {:?}",
        selected,
        means
    );
    Ok(means)
}

/// Read every band at each known-depth pixel, one calibration set per band
pub fn extract_calibration(image: &MultibandImage, points: &[DepthPoint]) -> WcResult<Vec<CalibrationSet>> {
    let (height, width) = image.shape();

    for (index, point) in points.iter().enumerate() {
        if point.row >= height || point.col >= width {
            return Err(WcError::InvalidInput(format!(
                "depth point {} at ({}, {}) is outside the {}x{} image",
                index, point.row, point.col, height, width
            )));
        }
    }

    let sets = (0..image.n_bands())
        .map(|band| {
            let pixels = image.band(band);
            let samples = points
                .iter()
                .map(|p| CalibrationSample {
                    depth: p.depth,
                    reflectance: pixels[[p.row, p.col]],
                })
                .collect();
            CalibrationSet::new(band, samples)
        })
        .collect();

    log::debug!(
        "Extracted {} calibration samples per band for {} bands",
        points.len(),
        image.n_bands()
    );
    Ok(sets)
}
