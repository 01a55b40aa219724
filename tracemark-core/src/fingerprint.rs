//! Encoded images and their content fingerprint.
//!
//! The fingerprint is SHA-256 over the UTF-8 bytes of the image's data URL
//! (`data:<mime>;base64,<payload>`), lowercase hex. It hashes the serialized
//! form, not decoded pixels: the same pixels written by a different encoder
//! produce a different fingerprint.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};

use crate::error::{Result, TracemarkError};

/// MIME type used for every watermarked output.
pub const OUTPUT_MIME: &str = "image/png";

/// Lowercase hex SHA-256 of `text`'s UTF-8 bytes.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// An image in its serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Wrap raw file bytes, sniffing the MIME type from the content.
    ///
    /// Unrecognized content is kept as `application/octet-stream`; decoding
    /// it later fails with [`TracemarkError::ImageLoad`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime = image::guess_format(&bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");
        Self::new(bytes, mime)
    }

    /// Parse a base64 data URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| TracemarkError::InvalidDataUrl("missing data: scheme".into()))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| TracemarkError::InvalidDataUrl("missing ',' separator".into()))?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or_else(|| TracemarkError::InvalidDataUrl("only base64 data URLs are supported".into()))?;
        let bytes = BASE64
            .decode(data.trim())
            .map_err(|e| TracemarkError::InvalidDataUrl(format!("invalid base64: {}", e)))?;
        Ok(Self::new(bytes, mime))
    }

    /// Encode pixels as PNG.
    pub fn encode_png(image: &RgbaImage) -> Result<Self> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| TracemarkError::ImageEncode(e.to_string()))?;
        Ok(Self::new(buffer.into_inner(), OUTPUT_MIME))
    }

    /// Decode the pixels.
    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.bytes)
            .map_err(|e| TracemarkError::ImageLoad(format!("Failed to decode image: {}", e)))
    }

    /// The textual form the fingerprint is computed over.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }

    /// Content fingerprint of this serialized image.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.to_data_url())
    }
}
