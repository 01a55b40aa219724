//! Extraction: tile readings, weighted voting and payload search.
//!
//! Every tile is read once into a [`TileReading`]: the QIM bits of its LH and
//! HL bands in raster order plus its sync score. Voting then folds those
//! readings at a given period without touching pixels again.
//!
//! Search order:
//! 1. framed layout, header read from the first encoded positions, then
//!    from every cyclic copy for each plausible payload length;
//! 2. legacy scan with ECC, ascending candidate lengths, sync-weighted votes;
//! 3. legacy scan without ECC, ascending lengths, unweighted votes.
//!
//! The first match wins, so shorter decodings are preferred.

use image::RgbaImage;
use ndarray::s;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::dwt::forward;
use super::luminance::{even_dimensions, luminance_grid};
use super::payload::{
    bits_to_text, decode_framed, ecc_decode, framed_encoded_len, parse_header,
    ENCODED_HEADER_BITS,
};
use super::qim::extract_bit;
use super::sync::sync_score;
use super::tiles::tile_grid;
use super::{
    BASE_TILE_WEIGHT, ECC_SCAN_START, FALLBACK_SCAN_START, MAX_PAYLOAD_CHARS, REDUNDANCY,
    SCAN_STEP, SYNC_TILE_WEIGHT,
};
use crate::attribution::{find_payload, ExtractedPayload, PayloadLayout, TIMESTAMP_LEN};
use crate::error::{Result, TracemarkError};

/// Shortest `creatorId|timestamp` message: one identifier character.
const MIN_MESSAGE_CHARS: usize = TIMESTAMP_LEN + 2;

/// Decoded bits of one tile.
#[derive(Debug, Clone)]
pub struct TileReading {
    pub lh: Vec<u8>,
    pub hl: Vec<u8>,
    pub sync: f64,
}

impl TileReading {
    fn weight(&self, weighted: bool) -> f64 {
        if weighted {
            BASE_TILE_WEIGHT + SYNC_TILE_WEIGHT * self.sync
        } else {
            1.0
        }
    }
}

/// Read every usable tile of `image`.
pub(crate) fn read_tiles(
    image: &RgbaImage,
    cancel: &CancellationToken,
) -> Result<Vec<TileReading>> {
    let (width, height) = even_dimensions(image.width(), image.height());
    let luma = luminance_grid(image, width, height);
    let tiles = tile_grid(height as usize, width as usize);

    tiles
        .par_iter()
        .map(|tile| {
            if cancel.is_cancelled() {
                return Err(TracemarkError::Cancelled);
            }
            let tile = tile.even();
            let view = luma.slice(s![tile.y..tile.y + tile.height, tile.x..tile.x + tile.width]);
            let bands = forward(view)?;
            Ok(TileReading {
                lh: bands.lh.iter().map(|c| extract_bit(*c)).collect(),
                hl: bands.hl.iter().map(|c| extract_bit(*c)).collect(),
                sync: sync_score(bands.hh.view()),
            })
        })
        .collect()
}

/// Majority vote per position of a cyclic stream with the given period.
///
/// Only coefficients whose in-band index is below `window` take part; pass
/// `usize::MAX` to use them all. Ties and unvoted positions decode as 0.
pub fn vote(readings: &[TileReading], period: usize, window: usize, weighted: bool) -> Vec<u8> {
    let mut ones = vec![0.0f64; period];
    let mut zeros = vec![0.0f64; period];

    for reading in readings {
        let w = reading.weight(weighted);
        for band in [&reading.lh, &reading.hl] {
            for (i, bit) in band.iter().enumerate().take(window) {
                let pos = i % period;
                if *bit == 1 {
                    ones[pos] += w;
                } else {
                    zeros[pos] += w;
                }
            }
        }
    }

    ones.iter()
        .zip(&zeros)
        .map(|(one, zero)| u8::from(one > zero))
        .collect()
}

/// Run the full search over precomputed readings.
pub(crate) fn search(
    readings: &[TileReading],
    cancel: &CancellationToken,
) -> Result<Option<ExtractedPayload>> {
    if readings.is_empty() {
        debug!("No usable tiles");
        return Ok(None);
    }

    if let Some(found) = search_framed(readings, cancel)? {
        return Ok(Some(found));
    }

    for char_len in (ECC_SCAN_START..=MAX_PAYLOAD_CHARS).step_by(SCAN_STEP) {
        if cancel.is_cancelled() {
            return Err(TracemarkError::Cancelled);
        }
        let encoded = vote(readings, char_len * 8 * REDUNDANCY, usize::MAX, true);
        let text = bits_to_text(&ecc_decode(&encoded, char_len * 8, REDUNDANCY));
        trace!(char_len, text = %text, "Legacy ECC candidate");
        if let Some(found) = find_payload(&text, PayloadLayout::Legacy) {
            debug!(char_len, "Recovered legacy payload");
            return Ok(Some(found));
        }
    }

    for char_len in (FALLBACK_SCAN_START..=MAX_PAYLOAD_CHARS).step_by(SCAN_STEP) {
        if cancel.is_cancelled() {
            return Err(TracemarkError::Cancelled);
        }
        let bits = vote(readings, char_len * 8, usize::MAX, false);
        let text = bits_to_text(&bits);
        if let Some(found) = find_payload(&text, PayloadLayout::Legacy) {
            debug!(char_len, "Recovered payload without ECC");
            return Ok(Some(found));
        }
    }

    Ok(None)
}

fn search_framed(
    readings: &[TileReading],
    cancel: &CancellationToken,
) -> Result<Option<ExtractedPayload>> {
    let in_band = vote(readings, ENCODED_HEADER_BITS, ENCODED_HEADER_BITS, true);
    if let Some(char_len) = parse_header(&in_band) {
        let encoded = vote(readings, framed_encoded_len(char_len), usize::MAX, true);
        if let Some(found) = decode_framed_candidate(&encoded, char_len) {
            return Ok(Some(found));
        }
    }

    // Every cyclic copy of the header lands at `i % period < 48`; fold them
    // all for each plausible period and keep lengths the header confirms.
    for char_len in MIN_MESSAGE_CHARS..=MAX_PAYLOAD_CHARS {
        if cancel.is_cancelled() {
            return Err(TracemarkError::Cancelled);
        }
        let encoded = vote(readings, framed_encoded_len(char_len), usize::MAX, true);
        if parse_header(&encoded[..ENCODED_HEADER_BITS]) != Some(char_len) {
            continue;
        }
        if let Some(found) = decode_framed_candidate(&encoded, char_len) {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

fn decode_framed_candidate(encoded: &[u8], char_len: usize) -> Option<ExtractedPayload> {
    let text = decode_framed(encoded, char_len);
    trace!(char_len, text = %text, "Framed candidate");

    let found = find_payload(&text, PayloadLayout::Framed);
    if found.is_some() {
        debug!(char_len, "Recovered framed payload");
    }
    found
}
