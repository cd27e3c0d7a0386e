use crate::core::attenuation::RatioMatrix;
use crate::types::{BandPair, WcError, WcResult};
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// Flatten a 2D band row-major
pub fn flatten(band: &ArrayView2<f64>) -> Vec<f64> {
    band.iter().copied().collect()
}

/// Inverse of [`flatten`]: rebuild a (height, width) band from row-major values
pub fn unflatten(flat: Vec<f64>, height: usize, width: usize) -> WcResult<Array2<f64>> {
    if flat.len() != height * width {
        return Err(WcError::ShapeMismatch(format!(
            "{} values cannot fill a {}x{} band",
            flat.len(),
            height,
            width
        )));
    }
    Array2::from_shape_vec((height, width), flat)
        .map_err(|e| WcError::ShapeMismatch(format!("Shape error: {}", e)))
}

/// Depth-invariant indices for every band pair `i < j`, in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct DepthInvariantStack {
    n_bands: usize,
    height: usize,
    width: usize,
    pairs: Vec<BandPair>,
    indices: Vec<Array2<f64>>,
}

impl DepthInvariantStack {
    pub fn n_bands(&self) -> usize {
        self.n_bands
    }

    /// Spatial shape (height, width) shared by every index band
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[BandPair] {
        &self.pairs
    }

    /// Position of pair (i, j) in the stack; argument order does not matter
    pub fn pair_index(&self, i: usize, j: usize) -> Option<usize> {
        BandPair::new(i, j)?.canonical_index(self.n_bands)
    }

    /// Index band for pair (i, j); argument order does not matter
    pub fn get(&self, i: usize, j: usize) -> Option<&Array2<f64>> {
        self.pair_index(i, j).map(|index| &self.indices[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (BandPair, &Array2<f64>)> + '_ {
        self.pairs.iter().copied().zip(self.indices.iter())
    }

    /// Stack into a (pairs, height, width) cube, one layer per pair
    pub fn to_cube(&self) -> Array3<f64> {
        let mut cube = Array3::<f64>::zeros((self.len(), self.height, self.width));
        for (layer, index) in self.indices.iter().enumerate() {
            cube.index_axis_mut(Axis(0), layer).assign(index);
        }
        cube
    }

    pub fn into_pairs(self) -> Vec<(BandPair, Array2<f64>)> {
        self.pairs.into_iter().zip(self.indices).collect()
    }
}

/// Combines normalized bands into pairwise depth-invariant indices
#[derive(Debug, Clone)]
pub struct DepthInvariantComposer {
    /// Images with at least this many pixels compose pairs in parallel
    parallel_min_pixels: usize,
}

impl Default for DepthInvariantComposer {
    fn default() -> Self {
        Self {
            parallel_min_pixels: 262_144,
        }
    }
}

impl DepthInvariantComposer {
    pub fn new(parallel_min_pixels: usize) -> Self {
        Self { parallel_min_pixels }
    }

    /// Compute `Xi_i - A[i, j] * Xi_j` for each pair `i < j`.
    ///
    /// # Arguments
    /// * `ratios` - N x N attenuation ratio matrix
    /// * `normalized` - (N, H*W) log-deviations from the band normalizer
    /// * `shape` - (H, W, N) shape of the source image
    ///
    /// # Returns
    /// * N(N-1)/2 (H, W) index bands in canonical pair order
    pub fn compose(
        &self,
        ratios: &RatioMatrix,
        normalized: &Array2<f64>,
        shape: (usize, usize, usize),
    ) -> WcResult<DepthInvariantStack> {
        let (height, width, n_bands) = shape;
        let n_pixels = height * width;

        if ratios.n_bands() != n_bands {
            return Err(WcError::ShapeMismatch(format!(
                "ratio matrix is {}x{} but image has {} bands",
                ratios.n_bands(),
                ratios.n_bands(),
                n_bands
            )));
        }
        if normalized.nrows() != n_bands {
            return Err(WcError::ShapeMismatch(format!(
                "{} normalized bands supplied for {} image bands",
                normalized.nrows(),
                n_bands
            )));
        }
        if normalized.ncols() != n_pixels {
            return Err(WcError::ShapeMismatch(format!(
                "normalized bands hold {} pixels, expected {}x{} = {}",
                normalized.ncols(),
                height,
                width,
                n_pixels
            )));
        }

        let pairs = BandPair::canonical(n_bands);
        log::info!(
            "Composing {} depth-invariant pairs from {} bands ({}x{})",
            pairs.len(),
            n_bands,
            height,
            width
        );

        let indices = if n_pixels >= self.parallel_min_pixels {
            self.compose_pairs_parallel(ratios, normalized, &pairs, height, width)?
        } else {
            log::debug!("Composing pairs sequentially");
            pairs
                .iter()
                .map(|&pair| compose_pair(ratios, normalized, pair, height, width))
                .collect::<WcResult<Vec<_>>>()?
        };

        Ok(DepthInvariantStack {
            n_bands,
            height,
            width,
            pairs,
            indices,
        })
    }

    #[cfg(feature = "parallel")]
    fn compose_pairs_parallel(
        &self,
        ratios: &RatioMatrix,
        normalized: &Array2<f64>,
        pairs: &[BandPair],
        height: usize,
        width: usize,
    ) -> WcResult<Vec<Array2<f64>>> {
        use rayon::prelude::*;

        log::debug!("Composing {} pairs in parallel", pairs.len());

        // Indexed collect keeps canonical pair order
        let results: Vec<WcResult<Array2<f64>>> = pairs
            .par_iter()
            .map(|&pair| compose_pair(ratios, normalized, pair, height, width))
            .collect();

        results.into_iter().collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn compose_pairs_parallel(
        &self,
        ratios: &RatioMatrix,
        normalized: &Array2<f64>,
        pairs: &[BandPair],
        height: usize,
        width: usize,
    ) -> WcResult<Vec<Array2<f64>>> {
        pairs
            .iter()
            .map(|&pair| compose_pair(ratios, normalized, pair, height, width))
            .collect()
    }
}

fn compose_pair(
    ratios: &RatioMatrix,
    normalized: &Array2<f64>,
    pair: BandPair,
    height: usize,
    width: usize,
) -> WcResult<Array2<f64>> {
    let (i, j) = (pair.first(), pair.second());
    let a = ratios
        .ratio(i, j)
        .ok_or_else(|| WcError::ShapeMismatch(format!("no ratio for pair {}", pair)))?;

    let xi = normalized.row(i);
    let xj = normalized.row(j);
    let flat: Vec<f64> = xi
        .iter()
        .zip(xj.iter())
        .map(|(&x_i, &x_j)| x_i - a * x_j)
        .collect();

    unflatten(flat, height, width)
}
