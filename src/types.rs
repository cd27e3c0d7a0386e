use ndarray::{Array2, Array3, ArrayView2, Axis};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Reflectance or radiance value of one pixel
pub type Reflectance = f64;

/// 2D single-band array (row x col)
pub type BandImage = Array2<Reflectance>;

/// 3D multiband array (band x row x col)
pub type BandCube = Array3<Reflectance>;

/// Multispectral image: N bands sharing one (height, width) grid.
///
/// Pixels are addressed row-major within each band. Every stage of the
/// correction flattens and reshapes with that same convention.
#[derive(Debug, Clone, PartialEq)]
pub struct MultibandImage {
    data: BandCube,
}

impl MultibandImage {
    /// Build an image from a (band, row, col) cube
    pub fn from_cube(data: BandCube) -> WcResult<Self> {
        let (bands, height, width) = data.dim();
        if bands == 0 {
            return Err(WcError::InvalidInput("image has no bands".to_string()));
        }
        if height == 0 || width == 0 {
            return Err(WcError::InvalidInput(format!(
                "image has empty spatial shape {}x{}",
                height, width
            )));
        }
        Ok(Self { data })
    }

    /// Build an image from individual bands, which must all share one shape
    pub fn from_bands(bands: Vec<BandImage>) -> WcResult<Self> {
        let first = bands
            .first()
            .ok_or_else(|| WcError::InvalidInput("image has no bands".to_string()))?;
        let (height, width) = first.dim();

        for (index, band) in bands.iter().enumerate() {
            if band.dim() != (height, width) {
                return Err(WcError::ShapeMismatch(format!(
                    "band {} has shape {:?}, expected {:?}",
                    index,
                    band.dim(),
                    (height, width)
                )));
            }
        }

        let views: Vec<ArrayView2<Reflectance>> = bands.iter().map(|b| b.view()).collect();
        let data = ndarray::stack(Axis(0), &views)
            .map_err(|e| WcError::ShapeMismatch(format!("Shape error: {}", e)))?;
        Self::from_cube(data)
    }

    /// Build an image from raw sensor counts (u8, u16, f32, ...)
    pub fn from_raw_bands<T>(bands: &[Array2<T>]) -> WcResult<Self>
    where
        T: ToPrimitive + Copy,
    {
        let mut converted = Vec::with_capacity(bands.len());
        for (index, band) in bands.iter().enumerate() {
            let mut out = Array2::<Reflectance>::zeros(band.dim());
            for ((row, col), value) in band.indexed_iter() {
                out[[row, col]] = value.to_f64().ok_or_else(|| {
                    WcError::InvalidInput(format!(
                        "band {} pixel ({}, {}) is not representable as f64",
                        index, row, col
                    ))
                })?;
            }
            converted.push(out);
        }
        Self::from_bands(converted)
    }

    pub fn n_bands(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Spatial shape (height, width)
    pub fn shape(&self) -> (usize, usize) {
        let (_, height, width) = self.data.dim();
        (height, width)
    }

    pub fn n_pixels(&self) -> usize {
        let (height, width) = self.shape();
        height * width
    }

    /// Shape in the (H, W, N) form the composer expects
    pub fn composition_shape(&self) -> (usize, usize, usize) {
        let (height, width) = self.shape();
        (height, width, self.n_bands())
    }

    pub fn band(&self, index: usize) -> ArrayView2<'_, Reflectance> {
        self.data.index_axis(Axis(0), index)
    }

    pub fn cube(&self) -> &BandCube {
        &self.data
    }

    pub fn into_cube(self) -> BandCube {
        self.data
    }
}

/// One known-depth measurement for a band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub depth: f64,            // meters, positive down
    pub reflectance: Reflectance,
}

/// Calibration samples collected for a single band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSet {
    pub band: usize,
    pub samples: Vec<CalibrationSample>,
}

impl CalibrationSet {
    pub fn new(band: usize, samples: Vec<CalibrationSample>) -> Self {
        Self { band, samples }
    }

    /// Build a set from parallel depth / reflectance columns
    pub fn from_columns(band: usize, depths: &[f64], reflectances: &[Reflectance]) -> WcResult<Self> {
        if depths.len() != reflectances.len() {
            return Err(WcError::InvalidInput(format!(
                "band {}: {} depths but {} reflectances",
                band,
                depths.len(),
                reflectances.len()
            )));
        }
        let samples = depths
            .iter()
            .zip(reflectances)
            .map(|(&depth, &reflectance)| CalibrationSample { depth, reflectance })
            .collect();
        Ok(Self { band, samples })
    }

    pub fn depths(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.depth).collect()
    }

    pub fn reflectances(&self) -> Vec<Reflectance> {
        self.samples.iter().map(|s| s.reflectance).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Unordered band pair, stored with `first < second`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BandPair {
    first: usize,
    second: usize,
}

impl BandPair {
    /// Returns `None` for a band paired with itself
    pub fn new(a: usize, b: usize) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            std::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn second(&self) -> usize {
        self.second
    }

    /// All pairs i < j for `n_bands` bands, in canonical order
    pub fn canonical(n_bands: usize) -> Vec<BandPair> {
        (0..n_bands)
            .flat_map(|i| ((i + 1)..n_bands).map(move |j| BandPair { first: i, second: j }))
            .collect()
    }

    /// Position of this pair in `canonical(n_bands)`
    pub fn canonical_index(&self, n_bands: usize) -> Option<usize> {
        if self.second >= n_bands {
            return None;
        }
        let i = self.first;
        Some(i * (2 * n_bands - i - 1) / 2 + (self.second - i - 1))
    }
}

impl std::fmt::Display for BandPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Error types for water column correction
#[derive(Debug, thiserror::Error)]
pub enum WcError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Division by zero: slope of band {band} is zero")]
    DivisionByZero { band: usize },

    #[error("Invalid pixel value {value} in band {band} at ({row}, {col})")]
    InvalidPixelValue {
        band: usize,
        row: usize,
        col: usize,
        value: f64,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Parameter parsing error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for water column correction
pub type WcResult<T> = Result<T, WcError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_bands_rejects_mismatched_shapes() {
        let result = MultibandImage::from_bands(vec![
            Array2::<f64>::ones((2, 2)),
            Array2::<f64>::ones((2, 3)),
        ]);
        assert!(matches!(result, Err(WcError::ShapeMismatch(_))));
    }

    #[test]
    fn test_from_bands_keeps_band_order() {
        let image = MultibandImage::from_bands(vec![
            array![[1.0, 2.0], [3.0, 4.0]],
            array![[5.0, 6.0], [7.0, 8.0]],
        ])
        .unwrap();

        assert_eq!(image.n_bands(), 2);
        assert_eq!(image.shape(), (2, 2));
        assert_eq!(image.composition_shape(), (2, 2, 2));
        assert_eq!(image.band(1)[[1, 0]], 7.0);
    }

    #[test]
    fn test_cube_is_band_row_col() {
        let image = MultibandImage::from_bands(vec![
            array![[1.0, 2.0, 3.0]],
            array![[4.0, 5.0, 6.0]],
        ])
        .unwrap();

        let cube = image.cube();
        assert_eq!(cube.dim(), (2, 1, 3));
        assert_eq!(cube[[1, 0, 2]], 6.0);
        assert_eq!(cube.index_axis(Axis(0), 0), image.band(0));
        assert_eq!(image.clone().into_cube(), *cube);
    }

    #[test]
    fn test_from_raw_bands_converts_counts() {
        let counts: Array2<u16> = array![[100, 200], [300, 400]];
        let image = MultibandImage::from_raw_bands(&[counts]).unwrap();
        assert_eq!(image.band(0)[[1, 1]], 400.0);
    }

    #[test]
    fn test_empty_image_rejected() {
        assert!(MultibandImage::from_bands(Vec::new()).is_err());
        assert!(MultibandImage::from_cube(Array3::zeros((1, 0, 4))).is_err());
    }

    #[test]
    fn test_band_pair_is_unordered() {
        assert_eq!(BandPair::new(3, 1), BandPair::new(1, 3));
        assert!(BandPair::new(2, 2).is_none());
    }

    #[test]
    fn test_canonical_pairs_and_index() {
        let pairs = BandPair::canonical(4);
        assert_eq!(pairs.len(), 6);
        for (position, pair) in pairs.iter().enumerate() {
            assert!(pair.first() < pair.second());
            assert_eq!(pair.canonical_index(4), Some(position));
        }
        assert_eq!(BandPair::new(0, 4).unwrap().canonical_index(4), None);
    }

    #[test]
    fn test_calibration_set_from_columns() {
        let set = CalibrationSet::from_columns(0, &[1.0, 2.0], &[0.5, 0.25]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.depths(), vec![1.0, 2.0]);
        assert!(CalibrationSet::from_columns(0, &[1.0], &[0.5, 0.25]).is_err());
    }
}
