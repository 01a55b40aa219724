//! One-level 2D Haar wavelet transform.
//!
//! Uses the averaging basis: the forward pass maps a pair `(a, b)` to
//! `((a + b) / 2, (a - b) / 2)` and the inverse maps `(low, high)` back to
//! `(low + high, low - high)`. The transform is exact up to floating-point
//! rounding, which the watermark relies on when it writes coefficients and
//! reconstructs pixels.
//!
//! Sub-band layout follows the usual quadrant convention of the combined
//! coefficient plane:
//!
//! ```text
//! +----+----+
//! | LL | LH |   LH: row-high, column-low
//! +----+----+   HL: row-low, column-high
//! | HL | HH |
//! +----+----+
//! ```

use ndarray::{Array2, ArrayView2};

use crate::error::{Result, TracemarkError};

/// The four quarter-size sub-bands of one decomposition level.
#[derive(Debug, Clone, PartialEq)]
pub struct SubBands {
    /// Approximation (low/low)
    pub ll: Array2<f64>,
    /// Horizontal detail, carries payload bits
    pub lh: Array2<f64>,
    /// Vertical detail, carries payload bits
    pub hl: Array2<f64>,
    /// Diagonal detail, carries the sync marker
    pub hh: Array2<f64>,
}

impl SubBands {
    /// Dimensions shared by all four bands.
    pub fn dim(&self) -> (usize, usize) {
        self.ll.dim()
    }
}

/// Forward one-level Haar decomposition.
///
/// Both dimensions of `data` must be even; callers truncate beforehand.
pub fn forward(data: ArrayView2<f64>) -> Result<SubBands> {
    let (height, width) = data.dim();
    if height % 2 != 0 || width % 2 != 0 {
        return Err(TracemarkError::Transform(format!(
            "Haar transform needs even dimensions, got {}x{}",
            height, width
        )));
    }

    let half_w = width / 2;

    // Row pass
    let mut row_low = Array2::zeros((height, half_w));
    let mut row_high = Array2::zeros((height, half_w));
    for i in 0..height {
        for j in 0..half_w {
            let (low, high) = analyze(data[[i, 2 * j]], data[[i, 2 * j + 1]]);
            row_low[[i, j]] = low;
            row_high[[i, j]] = high;
        }
    }

    // Column pass on both halves
    let (ll, hl) = column_pass(&row_low);
    let (lh, hh) = column_pass(&row_high);

    Ok(SubBands { ll, lh, hl, hh })
}

/// Inverse of [`forward`].
pub fn inverse(bands: &SubBands) -> Result<Array2<f64>> {
    let dim = bands.dim();
    if bands.lh.dim() != dim || bands.hl.dim() != dim || bands.hh.dim() != dim {
        return Err(TracemarkError::Transform(
            "Sub-bands must share the same dimensions".to_string(),
        ));
    }

    let (half_h, half_w) = dim;
    let row_low = column_merge(&bands.ll, &bands.hl);
    let row_high = column_merge(&bands.lh, &bands.hh);

    let mut result = Array2::zeros((half_h * 2, half_w * 2));
    for i in 0..half_h * 2 {
        for j in 0..half_w {
            let (a, b) = synthesize(row_low[[i, j]], row_high[[i, j]]);
            result[[i, 2 * j]] = a;
            result[[i, 2 * j + 1]] = b;
        }
    }

    Ok(result)
}

fn column_pass(data: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let (height, width) = data.dim();
    let half_h = height / 2;
    let mut low = Array2::zeros((half_h, width));
    let mut high = Array2::zeros((half_h, width));
    for i in 0..half_h {
        for j in 0..width {
            let (l, h) = analyze(data[[2 * i, j]], data[[2 * i + 1, j]]);
            low[[i, j]] = l;
            high[[i, j]] = h;
        }
    }
    (low, high)
}

fn column_merge(low: &Array2<f64>, high: &Array2<f64>) -> Array2<f64> {
    let (half_h, width) = low.dim();
    let mut merged = Array2::zeros((half_h * 2, width));
    for i in 0..half_h {
        for j in 0..width {
            let (a, b) = synthesize(low[[i, j]], high[[i, j]]);
            merged[[2 * i, j]] = a;
            merged[[2 * i + 1, j]] = b;
        }
    }
    merged
}

#[inline]
fn analyze(a: f64, b: f64) -> (f64, f64) {
    ((a + b) / 2.0, (a - b) / 2.0)
}

#[inline]
fn synthesize(low: f64, high: f64) -> (f64, f64) {
    (low + high, low - high)
}
