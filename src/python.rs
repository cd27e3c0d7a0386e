//! Python bindings, built with `--features python`

use crate::core::{
    compute_ratios, BandNormalizer, CoordinateRotation, DepthInvariantComposer,
    InvalidPixelPolicy, RatioMatrix, RegressionEstimator,
};
use crate::types::{MultibandImage, WcError};
use numpy::{IntoPyArray, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
use pyo3::prelude::*;

fn to_py_err(err: WcError) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", err))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(regression_slope, m)?)?;
    m.add_function(wrap_pyfunction!(attenuation_ratios, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_bands, m)?)?;
    m.add_function(wrap_pyfunction!(depth_invariant, m)?)?;
    m.add_function(wrap_pyfunction!(lyzenga_rotation, m)?)?;
    Ok(())
}

/// Slope of ln(reflectance) against depth
#[pyfunction]
fn regression_slope(depths: Vec<f64>, reflectances: Vec<f64>) -> PyResult<f64> {
    RegressionEstimator::default()
        .fit(&depths, &reflectances)
        .map_err(to_py_err)
}

/// N x N matrix of slope ratios, NaN on the diagonal
#[pyfunction]
fn attenuation_ratios<'py>(py: Python<'py>, slopes: Vec<f64>) -> PyResult<&'py PyArray2<f64>> {
    let ratios = compute_ratios(&slopes).map_err(to_py_err)?;
    Ok(ratios.into_array().into_pyarray(py))
}

/// (N, H, W) image and N deep-water means -> (N, H*W) log deviations
#[pyfunction]
#[pyo3(signature = (image, deep_water, propagate_nan = false))]
fn normalize_bands<'py>(
    py: Python<'py>,
    image: PyReadonlyArray3<'py, f64>,
    deep_water: Vec<f64>,
    propagate_nan: bool,
) -> PyResult<&'py PyArray2<f64>> {
    let image = MultibandImage::from_cube(image.as_array().to_owned()).map_err(to_py_err)?;
    let policy = if propagate_nan {
        InvalidPixelPolicy::Propagate
    } else {
        InvalidPixelPolicy::Fail
    };

    let normalized = BandNormalizer::with_policy(policy)
        .normalize(&image, &deep_water)
        .map_err(to_py_err)?;
    Ok(normalized.into_pyarray(py))
}

/// Pairwise depth-invariant indices stacked as (pairs, H, W), pairs ordered i < j
#[pyfunction]
fn depth_invariant<'py>(
    py: Python<'py>,
    ratios: PyReadonlyArray2<'py, f64>,
    normalized: PyReadonlyArray2<'py, f64>,
    height: usize,
    width: usize,
) -> PyResult<&'py PyArray3<f64>> {
    let ratios = RatioMatrix::from_array(ratios.as_array().to_owned()).map_err(to_py_err)?;
    let normalized = normalized.as_array().to_owned();
    let shape = (height, width, normalized.nrows());

    let stack = DepthInvariantComposer::default()
        .compose(&ratios, &normalized, shape)
        .map_err(to_py_err)?;
    Ok(stack.to_cube().into_pyarray(py))
}

/// Lyzenga rotation: (N, H, W) with N-1 invariant bands and a final depth band
#[pyfunction]
fn lyzenga_rotation<'py>(
    py: Python<'py>,
    slopes: Vec<f64>,
    normalized: PyReadonlyArray2<'py, f64>,
    height: usize,
    width: usize,
) -> PyResult<&'py PyArray3<f64>> {
    let rotation = CoordinateRotation::from_slopes(&slopes).map_err(to_py_err)?;
    let normalized = normalized.as_array().to_owned();
    let shape = (height, width, normalized.nrows());

    let rotated = rotation.apply(&normalized, shape).map_err(to_py_err)?;
    Ok(rotated.into_pyarray(py))
}
