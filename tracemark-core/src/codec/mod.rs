//! Frequency-domain watermark codec.
//!
//! The image is converted to luminance and cut into fixed-size tiles. Each
//! tile goes through a one-level Haar DWT; the payload bitstream is written
//! cyclically into every coefficient of the LH and HL bands with QIM, a sync
//! marker goes into the HH corners, and the inverse transform's luminance
//! delta is added to R, G and B.
//!
//! Extraction reads the same bands from every tile and recovers the payload
//! by sync-weighted majority voting, see [`extract`].
//!
//! All parameters below are shared by embedder and extractor; changing any of
//! them breaks recovery of previously watermarked images.

pub mod dwt;
mod embed;
pub mod extract;
pub mod luminance;
pub mod payload;
pub mod qim;
pub mod strength;
pub mod sync;
pub mod tiles;

use std::sync::Arc;

use image::{DynamicImage, RgbaImage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use self::payload::{encode_framed, encode_legacy};
use crate::attribution::{ExtractedPayload, Payload, PayloadLayout};
use crate::error::{Result, TracemarkError};

/// Nominal tile side in pixels.
pub const TILE_SIZE: usize = 128;

/// Edge tiles narrower or shorter than this are skipped.
pub const MIN_TILE_SIZE: usize = 32;

/// QIM lattice spacing in the averaging Haar basis.
pub const QIM_STEP: f64 = 12.0;

/// Copies per bit in the repetition code.
pub const REDUNDANCY: usize = 3;

/// Longest `creatorId|timestamp` string carried, in characters.
pub const MAX_PAYLOAD_CHARS: usize = 64;

/// Vote weight of a tile whose sync marker is completely lost.
pub const BASE_TILE_WEIGHT: f64 = 0.3;

/// Extra vote weight scaled by the sync score.
pub const SYNC_TILE_WEIGHT: f64 = 0.7;

/// First candidate length of the legacy scan with ECC.
pub const ECC_SCAN_START: usize = 30;

/// First candidate length of the legacy scan without ECC.
pub const FALLBACK_SCAN_START: usize = 40;

/// Candidate length increment of both legacy scans.
pub const SCAN_STEP: usize = 2;

/// Outcome of writing a watermark into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedReport {
    /// Tiles that carry the payload
    pub tiles: usize,
    /// Encoded bitstream length
    pub encoded_bits: usize,
    pub layout: PayloadLayout,
}

/// Embeds and extracts attribution payloads.
///
/// Per-tile work runs on rayon; [`WatermarkCodec::with_threads`] bounds it to
/// a dedicated pool, otherwise the global pool is used.
#[derive(Clone, Default)]
pub struct WatermarkCodec {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl WatermarkCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated pool of `threads` workers for tile processing.
    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tracemark-tile-{i}"))
            .build()
            .map_err(|e| TracemarkError::Transform(format!("Failed to create thread pool: {}", e)))?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    fn install<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Watermark `image` in place with `payload`.
    ///
    /// The result is read back before returning; an image that cannot carry
    /// the payload fails with [`TracemarkError::Unrecoverable`] and may be
    /// left partially modified.
    pub fn embed(
        &self,
        image: &mut RgbaImage,
        payload: &Payload,
        layout: PayloadLayout,
        cancel: &CancellationToken,
    ) -> Result<EmbedReport> {
        payload.validate()?;

        let message = payload.message();
        let encoded = match layout {
            PayloadLayout::Framed => encode_framed(&message),
            PayloadLayout::Legacy => encode_legacy(&message),
        };

        let tiles = self.install(|| embed::embed_bits(image, &encoded, cancel))?;
        if tiles == 0 {
            return Err(TracemarkError::ImageTooSmall {
                width: image.width(),
                height: image.height(),
                min: MIN_TILE_SIZE,
            });
        }

        // Clamping at 0 and 255 can erase the delta on saturated content.
        let readings = self.install(|| extract::read_tiles(image, cancel))?;
        match extract::search(&readings, cancel)? {
            Some(found) if found.matches(&payload.creator_id, &payload.timestamp) => {}
            other => {
                warn!(
                    tiles,
                    recovered = ?other.map(|p| p.raw_match),
                    "Embedded payload does not read back"
                );
                return Err(TracemarkError::Unrecoverable(format!(
                    "payload lost after embedding into {}x{}",
                    image.width(),
                    image.height()
                )));
            }
        }

        info!(
            tiles,
            chars = message.len(),
            layout = ?layout,
            "Watermark embedded"
        );

        Ok(EmbedReport {
            tiles,
            encoded_bits: encoded.len(),
            layout,
        })
    }

    /// Watermark a decoded image of any pixel format, returning an RGBA copy.
    pub fn embed_image(
        &self,
        image: &DynamicImage,
        payload: &Payload,
        layout: PayloadLayout,
        cancel: &CancellationToken,
    ) -> Result<(RgbaImage, EmbedReport)> {
        let mut rgba = image.to_rgba8();
        let report = self.embed(&mut rgba, payload, layout, cancel)?;
        Ok((rgba, report))
    }

    /// Search `image` for a payload.
    ///
    /// `Ok(None)` means no recognizable payload, which is a normal outcome.
    pub fn extract(
        &self,
        image: &RgbaImage,
        cancel: &CancellationToken,
    ) -> Result<Option<ExtractedPayload>> {
        let readings = self.install(|| extract::read_tiles(image, cancel))?;
        debug!(tile_count = readings.len(), "Read tiles");
        extract::search(&readings, cancel)
    }

    /// [`WatermarkCodec::extract`] over a decoded image of any pixel format.
    pub fn extract_image(
        &self,
        image: &DynamicImage,
        cancel: &CancellationToken,
    ) -> Result<Option<ExtractedPayload>> {
        self.extract(&image.to_rgba8(), cancel)
    }
}

impl std::fmt::Debug for WatermarkCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkCodec")
            .field(
                "threads",
                &self.pool.as_ref().map(|p| p.current_num_threads()),
            )
            .finish()
    }
}
