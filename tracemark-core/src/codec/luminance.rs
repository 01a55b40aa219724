//! RGB(A) to luminance conversion.

use image::RgbaImage;
use ndarray::Array2;

/// ITU-R BT.601 luma weights.
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Largest even dimensions not exceeding the image's own.
pub fn even_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width & !1, height & !1)
}

/// Luma of a single RGB triple.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    LUMA_WEIGHTS[0] * r as f64 + LUMA_WEIGHTS[1] * g as f64 + LUMA_WEIGHTS[2] * b as f64
}

/// Build a `height x width` luminance grid over the top-left region of `image`.
///
/// Alpha is ignored. `width`/`height` must not exceed the image's own.
pub fn luminance_grid(image: &RgbaImage, width: u32, height: u32) -> Array2<f64> {
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let p = image.get_pixel(x as u32, y as u32).0;
        luma(p[0], p[1], p[2])
    })
}
