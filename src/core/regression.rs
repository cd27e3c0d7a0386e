use crate::types::{CalibrationSet, WcError, WcResult};
use ndarray::{Array1, ArrayView1};

/// Ordinary least-squares fit of `ln(reflectance)` against depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Change of log-reflectance per meter of depth (negative under attenuation)
    pub slope: f64,
    /// Log-reflectance extrapolated to zero depth
    pub intercept: f64,
    /// Coefficient of determination
    pub r_squared: f64,
    pub n_samples: usize,
}

/// Per-band regression of log-reflectance on depth
#[derive(Debug, Clone)]
pub struct RegressionEstimator {
    /// Fits below this r² are logged as weak
    min_r_squared: f64,
}

impl Default for RegressionEstimator {
    fn default() -> Self {
        Self { min_r_squared: 0.5 }
    }
}

impl RegressionEstimator {
    pub fn new(min_r_squared: f64) -> Self {
        Self { min_r_squared }
    }

    /// Fit one band and return the slope only
    pub fn fit(&self, depths: &[f64], reflectances: &[f64]) -> WcResult<f64> {
        Ok(self.fit_line(depths, reflectances)?.slope)
    }

    /// Fit one band and return slope, intercept and r²
    pub fn fit_line(&self, depths: &[f64], reflectances: &[f64]) -> WcResult<LinearFit> {
        self.fit_labelled(depths, reflectances, None)
    }

    /// Fit the samples of one calibration set
    pub fn fit_set(&self, set: &CalibrationSet) -> WcResult<LinearFit> {
        self.fit_labelled(&set.depths(), &set.reflectances(), Some(set.band))
    }

    /// Fit every band and return the slopes in band order.
    ///
    /// `sets[k]` must hold the samples of band `k`.
    pub fn fit_bands(&self, sets: &[CalibrationSet]) -> WcResult<Vec<f64>> {
        log::info!("Fitting attenuation slopes for {} bands", sets.len());

        let mut slopes = Vec::with_capacity(sets.len());
        for (index, set) in sets.iter().enumerate() {
            if set.band != index {
                return Err(WcError::InvalidInput(format!(
                    "calibration set at position {} belongs to band {}",
                    index, set.band
                )));
            }
            slopes.push(self.fit_set(set)?.slope);
        }

        Ok(slopes)
    }

    /// Fit every band against one shared depth vector
    pub fn fit_shared_depths(&self, depths: &[f64], bands: &[Vec<f64>]) -> WcResult<Vec<f64>> {
        bands
            .iter()
            .enumerate()
            .map(|(band, reflectances)| {
                self.fit_labelled(depths, reflectances, Some(band))
                    .map(|fit| fit.slope)
            })
            .collect()
    }

    fn fit_labelled(
        &self,
        depths: &[f64],
        reflectances: &[f64],
        band: Option<usize>,
    ) -> WcResult<LinearFit> {
        let label = match band {
            Some(b) => format!("band {}", b),
            None => "regression".to_string(),
        };

        if depths.len() != reflectances.len() {
            return Err(WcError::InvalidInput(format!(
                "{}: {} depths but {} reflectances",
                label,
                depths.len(),
                reflectances.len()
            )));
        }
        if depths.len() < 2 {
            return Err(WcError::InvalidInput(format!(
                "{}: at least 2 samples required, got {}",
                label,
                depths.len()
            )));
        }
        if let Some((index, depth)) = depths.iter().enumerate().find(|(_, d)| !d.is_finite()) {
            return Err(WcError::InvalidInput(format!(
                "{}: depth {} at sample {} is not finite",
                label, depth, index
            )));
        }
        if let Some((index, value)) = reflectances
            .iter()
            .enumerate()
            .find(|(_, r)| !(r.is_finite() && **r > 0.0))
        {
            return Err(WcError::InvalidInput(format!(
                "{}: reflectance {} at sample {} must be positive",
                label, value, index
            )));
        }
        if depths.iter().all(|&d| d == depths[0]) {
            return Err(WcError::DegenerateInput(format!(
                "{}: all {} depths equal {}, slope is undefined",
                label,
                depths.len(),
                depths[0]
            )));
        }

        let x = ArrayView1::from(depths);
        let y: Array1<f64> = reflectances.iter().map(|r| r.ln()).collect();
        let fit = least_squares(x, y.view())?;

        log::debug!(
            "{}: slope={:.6}, intercept={:.6}, r²={:.4}, n={}",
            label, fit.slope, fit.intercept, fit.r_squared, fit.n_samples
        );
        if fit.slope > 0.0 {
            log::warn!(
                "{}: log-reflectance increases with depth (slope {:.6})",
                label, fit.slope
            );
        }
        if fit.r_squared < self.min_r_squared {
            log::warn!(
                "{}: weak depth fit, r²={:.4} below {:.4}",
                label, fit.r_squared, self.min_r_squared
            );
        }

        Ok(fit)
    }
}

/// Closed-form OLS with intercept on centred data
fn least_squares(x: ArrayView1<f64>, y: ArrayView1<f64>) -> WcResult<LinearFit> {
    let n = x.len();
    let x_mean = x.sum() / n as f64;
    let y_mean = y.sum() / n as f64;

    let xc = x.mapv(|v| v - x_mean);
    let yc = y.mapv(|v| v - y_mean);

    let sxx = xc.dot(&xc);
    let sxy = xc.dot(&yc);
    let syy = yc.dot(&yc);

    if sxx <= 0.0 {
        return Err(WcError::DegenerateInput(
            "depth variance is zero, slope is undefined".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    // Constant response is fitted exactly by the flat line
    let r_squared = if syy > 0.0 { (sxy * sxy) / (sxx * syy) } else { 1.0 };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        n_samples: n,
    })
}
