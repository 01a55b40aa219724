//! Corner sync markers in the HH band.
//!
//! A fixed 16-bit pattern is written row-major, most significant bit first,
//! into each 4x4 corner of the band. Detection reports the fraction of the 64
//! marker positions that still decode to the pattern. The score only weights a
//! tile's vote during extraction; no geometric realignment is attempted.

use ndarray::{Array2, ArrayView2};

use super::qim::{embed_bit, extract_bit};

/// Marker pattern written into every corner.
pub const SYNC_PATTERN: u16 = 0b1011_0110_0100_1101;

/// Side length of a marker corner.
pub const CORNER_SIZE: usize = 4;

fn pattern_bit(index: usize) -> u8 {
    ((SYNC_PATTERN >> (15 - index)) & 1) as u8
}

fn corner_origins(height: usize, width: usize) -> [(usize, usize); 4] {
    let bottom = height - CORNER_SIZE;
    let right = width - CORNER_SIZE;
    [(0, 0), (0, right), (bottom, 0), (bottom, right)]
}

fn fits(height: usize, width: usize) -> bool {
    height >= CORNER_SIZE && width >= CORNER_SIZE
}

/// Embed the pattern into all four corners of `band`.
///
/// Bands smaller than one corner are left untouched.
pub fn embed_sync(band: &mut Array2<f64>) {
    let (height, width) = band.dim();
    if !fits(height, width) {
        return;
    }

    for (oy, ox) in corner_origins(height, width) {
        for k in 0..CORNER_SIZE * CORNER_SIZE {
            let (y, x) = (oy + k / CORNER_SIZE, ox + k % CORNER_SIZE);
            band[[y, x]] = embed_bit(band[[y, x]], pattern_bit(k));
        }
    }
}

/// Reliability score in `[0, 1]`: matching marker bits averaged over the corners.
pub fn sync_score(band: ArrayView2<f64>) -> f64 {
    let (height, width) = band.dim();
    if !fits(height, width) {
        return 0.0;
    }

    let corners = corner_origins(height, width);
    let total: f64 = corners
        .iter()
        .map(|&(oy, ox)| {
            let matches = (0..CORNER_SIZE * CORNER_SIZE)
                .filter(|&k| {
                    let (y, x) = (oy + k / CORNER_SIZE, ox + k % CORNER_SIZE);
                    extract_bit(band[[y, x]]) == pattern_bit(k)
                })
                .count();
            matches as f64 / (CORNER_SIZE * CORNER_SIZE) as f64
        })
        .sum();

    total / corners.len() as f64
}
