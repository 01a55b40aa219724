//! Fixed-size tile grid over an image.

use super::{MIN_TILE_SIZE, TILE_SIZE};

/// Axis-aligned rectangular image region, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub y: usize,
    pub x: usize,
    pub height: usize,
    pub width: usize,
}

impl Tile {
    /// The same region shrunk to even dimensions.
    pub fn even(self) -> Self {
        Self {
            height: self.height & !1,
            width: self.width & !1,
            ..self
        }
    }
}

/// Partition a `height x width` image into non-overlapping tiles.
///
/// Steps of [`TILE_SIZE`] along both axes; edge tiles are clipped to the
/// image and dropped when either side falls below [`MIN_TILE_SIZE`].
pub fn tile_grid(height: usize, width: usize) -> Vec<Tile> {
    let mut tiles = Vec::new();
    for y in (0..height).step_by(TILE_SIZE) {
        let tile_h = TILE_SIZE.min(height - y);
        if tile_h < MIN_TILE_SIZE {
            continue;
        }
        for x in (0..width).step_by(TILE_SIZE) {
            let tile_w = TILE_SIZE.min(width - x);
            if tile_w < MIN_TILE_SIZE {
                continue;
            }
            tiles.push(Tile {
                y,
                x,
                height: tile_h,
                width: tile_w,
            });
        }
    }
    tiles
}
