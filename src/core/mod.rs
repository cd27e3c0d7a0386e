//! Water column correction modules

pub mod regression;
pub mod attenuation;
pub mod normalize;
pub mod depth_invariant;
pub mod rotation;
pub mod sampling;
pub mod pipeline;

// Re-export main types
pub use regression::{RegressionEstimator, LinearFit};
pub use attenuation::{compute_ratios, RatioMatrix};
pub use normalize::{BandNormalizer, InvalidPixelPolicy, log_deviation};
pub use depth_invariant::{DepthInvariantComposer, DepthInvariantStack, flatten, unflatten};
pub use rotation::CoordinateRotation;
pub use sampling::{DepthPoint, deep_water_means, extract_calibration};
pub use pipeline::{WaterColumnCorrector, CorrectionParams, CorrectionOutput};
