//! Texture-based embedding strength estimate.
//!
//! Advisory only: the QIM step is a shared constant so the extractor can
//! decode without the original tile. The multiplier is reported for
//! diagnostics.

use ndarray::ArrayView2;

/// Lower bound of the multiplier (flat regions).
pub const MIN_STRENGTH: f64 = 0.7;
/// Upper bound of the multiplier (highly textured regions).
pub const MAX_STRENGTH: f64 = 1.5;
/// Variance mapped to [`MAX_STRENGTH`].
pub const VARIANCE_CEILING: f64 = 2500.0;

/// Map a tile's luminance variance linearly into `[MIN_STRENGTH, MAX_STRENGTH]`.
pub fn adaptive_strength(tile: ArrayView2<f64>) -> f64 {
    let n = tile.len();
    if n == 0 {
        return MIN_STRENGTH;
    }

    let mean = tile.sum() / n as f64;
    let variance = tile.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let normalized = (variance / VARIANCE_CEILING).min(1.0);

    MIN_STRENGTH + normalized * (MAX_STRENGTH - MIN_STRENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_flat_tile_gets_minimum() {
        let tile = Array2::from_elem((32, 32), 128.0);
        assert_eq!(adaptive_strength(tile.view()), MIN_STRENGTH);
    }

    #[test]
    fn test_high_contrast_tile_saturates() {
        let tile = Array2::from_shape_fn((32, 32), |(i, j)| if (i + j) % 2 == 0 { 0.0 } else { 255.0 });
        assert_eq!(adaptive_strength(tile.view()), MAX_STRENGTH);
    }

    #[test]
    fn test_midrange_is_linear() {
        // Alternating +-25 around a mean: variance 625, a quarter of the ceiling.
        let tile = Array2::from_shape_fn((8, 8), |(i, _)| if i % 2 == 0 { 75.0 } else { 125.0 });
        let expected = MIN_STRENGTH + 0.25 * (MAX_STRENGTH - MIN_STRENGTH);
        assert!((adaptive_strength(tile.view()) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_tile() {
        let tile = Array2::<f64>::zeros((0, 0));
        assert_eq!(adaptive_strength(tile.view()), MIN_STRENGTH);
    }
}
