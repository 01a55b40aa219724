#![no_main]

//! Fuzz target for watermark extraction
//!
//! Feeds arbitrary bytes through image decoding and the full payload search.
//! Decoding errors are fine; panics are not.
//!
//! Run with: cargo +nightly fuzz run fuzz_extract

use libfuzzer_sys::fuzz_target;
use tokio_util::sync::CancellationToken;
use tracemark_core::{EncodedImage, WatermarkCodec};

fuzz_target!(|data: &[u8]| {
    let encoded = EncodedImage::from_bytes(data.to_vec());
    if let Ok(image) = encoded.decode() {
        // Keep pathological dimensions from dominating the run
        if u64::from(image.width()) * u64::from(image.height()) <= 1 << 20 {
            let _ = WatermarkCodec::new().extract_image(&image, &CancellationToken::new());
        }
    }
});
