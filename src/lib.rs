//! watercol: Water Column Correction for Shallow-Water Multispectral Imagery
//!
//! Implements the Lyzenga (1978) depth-invariant index: per-band attenuation
//! slopes are regressed from known-depth samples, bands are log-normalized
//! against a deep-water reference, and band pairs are combined so that the
//! result depends on bottom type rather than water depth.
//!
//! Reference: Lyzenga, D.R., 1978. Passive remote sensing techniques for
//! mapping water depth and bottom features. Appl. Opt. 17, 379-383.

pub mod types;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    BandCube, BandImage, BandPair, CalibrationSample, CalibrationSet, MultibandImage, Reflectance,
    WcError, WcResult,
};

pub use crate::core::{
    compute_ratios, BandNormalizer, CoordinateRotation, CorrectionOutput, CorrectionParams,
    DepthInvariantComposer, DepthInvariantStack, InvalidPixelPolicy, RatioMatrix,
    RegressionEstimator, WaterColumnCorrector,
};
