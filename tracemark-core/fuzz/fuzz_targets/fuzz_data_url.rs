#![no_main]

//! Fuzz target for data URL parsing and payload text scanning
//!
//! Run with: cargo +nightly fuzz run fuzz_data_url

use libfuzzer_sys::fuzz_target;
use tracemark_core::attribution::find_payload;
use tracemark_core::{EncodedImage, PayloadLayout};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(image) = EncodedImage::from_data_url(&text) {
        let _ = image.fingerprint();
    }
    if let Some(found) = find_payload(&text, PayloadLayout::Legacy) {
        assert!(text.contains(&found.raw_match));
    }
});
