//! Pixel side of the embedding pipeline.

use image::RgbaImage;
use ndarray::{s, Array2};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::dwt::{forward, inverse};
use super::luminance::{even_dimensions, luminance_grid};
use super::qim::embed_bit;
use super::strength::adaptive_strength;
use super::sync::embed_sync;
use super::tiles::{tile_grid, Tile};
use crate::error::{Result, TracemarkError};

/// Luminance change computed for one tile.
struct TileDelta {
    tile: Tile,
    delta: Array2<f64>,
}

/// Write `encoded` into every usable tile of `image`, in place.
///
/// Returns the number of tiles that carry the watermark.
pub(crate) fn embed_bits(
    image: &mut RgbaImage,
    encoded: &[u8],
    cancel: &CancellationToken,
) -> Result<usize> {
    if encoded.is_empty() {
        return Err(TracemarkError::InvalidPayload("empty bitstream".into()));
    }

    let (width, height) = even_dimensions(image.width(), image.height());
    let luma = luminance_grid(image, width, height);
    let tiles = tile_grid(height as usize, width as usize);
    debug!(width, height, tile_count = tiles.len(), bits = encoded.len(), "Embedding watermark");

    let deltas = tiles
        .par_iter()
        .map(|&tile| {
            if cancel.is_cancelled() {
                return Err(TracemarkError::Cancelled);
            }
            embed_tile(&luma, tile.even(), encoded)
        })
        .collect::<Result<Vec<_>>>()?;

    for TileDelta { tile, delta } in &deltas {
        apply_delta(image, tile, delta);
    }

    Ok(deltas.len())
}

fn embed_tile(luma: &Array2<f64>, tile: Tile, encoded: &[u8]) -> Result<TileDelta> {
    let original = luma.slice(s![tile.y..tile.y + tile.height, tile.x..tile.x + tile.width]);
    trace!(
        y = tile.y,
        x = tile.x,
        strength = adaptive_strength(original),
        "Tile texture"
    );

    let mut bands = forward(original)?;
    write_cyclic(&mut bands.lh, encoded);
    write_cyclic(&mut bands.hl, encoded);
    embed_sync(&mut bands.hh);

    let reconstructed = inverse(&bands)?;
    Ok(TileDelta {
        tile,
        delta: &reconstructed - &original,
    })
}

/// Fill every coefficient of `band`, in raster order, with `bits` repeated.
fn write_cyclic(band: &mut Array2<f64>, bits: &[u8]) {
    for (i, coefficient) in band.iter_mut().enumerate() {
        *coefficient = embed_bit(*coefficient, bits[i % bits.len()]);
    }
}

/// Add the luminance delta equally to R, G and B, clamping to `0..=255`.
fn apply_delta(image: &mut RgbaImage, tile: &Tile, delta: &Array2<f64>) {
    for ((dy, dx), d) in delta.indexed_iter() {
        let pixel = image.get_pixel_mut((tile.x + dx) as u32, (tile.y + dy) as u32);
        for channel in pixel.0.iter_mut().take(3) {
            *channel = (*channel as f64 + d).round().clamp(0.0, 255.0) as u8;
        }
    }
}
