//! Tracemark Core - invisible attribution watermarks with a provenance ledger
//!
//! This crate embeds a `creatorId|timestamp` payload into the luminance of an
//! image, recovers it again after re-encoding, and keeps a hash-chained
//! ledger of every image it has marked.
//!
//! # Features
//!
//! - One-level Haar DWT with QIM embedding in the LH and HL bands
//! - Per-tile sync markers and sync-weighted majority voting
//! - Repetition ECC and a framed, self-describing payload layout
//! - SHA-256 content fingerprints over the PNG data URL
//! - Append-only, hash-chained registry with memory, file and HTTP backends
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use tracemark_core::{
//!     EmbedRequest, EncodedImage, MemoryRegistry, Payload, Verifier, Watermarker,
//! };
//!
//! # async fn example(bytes: Vec<u8>) -> tracemark_core::Result<()> {
//! let registry = Arc::new(MemoryRegistry::new());
//! let cancel = CancellationToken::new();
//!
//! let request = EmbedRequest::new(Payload::now("alice@example.com")?);
//! let marked = Watermarker::new(registry.clone())
//!     .embed(&EncodedImage::from_bytes(bytes), request, &cancel)
//!     .await?;
//!
//! let verdict = Verifier::new(registry).verify(&marked.image, &cancel).await;
//! assert!(verdict.is_registered());
//! # Ok(())
//! # }
//! ```

pub mod attribution;
pub mod codec;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod registry;
pub mod verify;
pub mod watermark;

// Re-export main types for convenience
pub use attribution::{format_timestamp, ExtractedPayload, Payload, PayloadLayout};
pub use codec::{EmbedReport, WatermarkCodec};
pub use error::{Result, TracemarkError};
pub use fingerprint::{fingerprint, EncodedImage, OUTPUT_MIME};
pub use ledger::{
    audit_chain, ChainBreak, ChainBreakReason, LedgerRecord, NewLedgerEntry, GENESIS_HASH,
};
pub use registry::{FileRegistry, MemoryRegistry, Registry};
pub use verify::{Confidence, VerificationStatus, VerificationVerdict, Verifier};
pub use watermark::{
    EmbedRequest, MarkedImage, WatermarkResult, Watermarker, DEFAULT_REGISTRY_TIMEOUT,
};

#[cfg(feature = "network")]
pub use registry::{HttpRegistry, HttpRegistryConfig};
