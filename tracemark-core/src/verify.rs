//! Verification: is this image registered, and how sure are we?
//!
//! The verifier extracts the embedded payload, fingerprints the submitted
//! bytes exactly as received, and looks both up:
//!
//! | metadata match | hash match | status       | confidence      |
//! |----------------|------------|--------------|-----------------|
//! | yes            | yes        | registered   | `exactHash`     |
//! | yes            | no         | registered   | `metadataMatch` |
//! | no             | yes        | registered   | `exactHash`     |
//! | no             | no         | unregistered | `none`          |
//!
//! Verification never fails. Undecodable images count as carrying no
//! payload, and registry errors or timeouts count as misses.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::attribution::ExtractedPayload;
use crate::codec::WatermarkCodec;
use crate::error::{Result, TracemarkError};
use crate::fingerprint::EncodedImage;
use crate::ledger::LedgerRecord;
use crate::registry::{within, Registry};
use crate::watermark::DEFAULT_REGISTRY_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationStatus {
    Registered,
    Unregistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    /// The submitted bytes are exactly a registered image.
    ExactHash,
    /// Only the embedded creator and timestamp matched a record.
    MetadataMatch,
    None,
}

/// Outcome of [`Verifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVerdict {
    pub status: VerificationStatus,
    pub confidence: Confidence,
    /// Metadata match if there is one, else the hash match.
    pub matched_record: Option<LedgerRecord>,
    pub extracted: Option<ExtractedPayload>,
    /// Fingerprint of the submitted bytes.
    pub content_hash: String,
}

impl VerificationVerdict {
    /// Apply the verdict table to the two lookup results.
    pub fn resolve(
        extracted: Option<ExtractedPayload>,
        content_hash: String,
        metadata_match: Option<LedgerRecord>,
        hash_match: Option<LedgerRecord>,
    ) -> Self {
        let (status, confidence) = match (&metadata_match, &hash_match) {
            (_, Some(_)) => (VerificationStatus::Registered, Confidence::ExactHash),
            (Some(_), None) => (VerificationStatus::Registered, Confidence::MetadataMatch),
            (None, None) => (VerificationStatus::Unregistered, Confidence::None),
        };
        Self {
            status,
            confidence,
            matched_record: metadata_match.or(hash_match),
            extracted,
            content_hash,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.status == VerificationStatus::Registered
    }
}

/// Resolves images against a registry and an optional local cache.
pub struct Verifier {
    registry: Arc<dyn Registry>,
    cache: Option<Arc<dyn Registry>>,
    codec: WatermarkCodec,
    timeout: Duration,
}

impl Verifier {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            cache: None,
            codec: WatermarkCodec::new(),
            timeout: DEFAULT_REGISTRY_TIMEOUT,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Registry>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_codec(mut self, codec: WatermarkCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract, fingerprint and look up `image`.
    pub async fn verify(&self, image: &EncodedImage, cancel: &CancellationToken) -> VerificationVerdict {
        let content_hash = image.fingerprint();
        let extracted = self.extract(image, cancel).await;

        let metadata_match = match &extracted {
            Some(found) => {
                self.lookup("metadata", |r| {
                    let creator = found.creator_id.clone();
                    let timestamp = found.timestamp.clone();
                    async move { r.find_by_metadata(&creator, &timestamp).await }
                })
                .await
            }
            None => None,
        };

        let hash_match = self
            .lookup("hash", |r| {
                let hash = content_hash.clone();
                async move { r.find_by_hash(&hash).await }
            })
            .await;

        let verdict = VerificationVerdict::resolve(extracted, content_hash, metadata_match, hash_match);
        info!(
            status = ?verdict.status,
            confidence = ?verdict.confidence,
            record_id = ?verdict.matched_record.as_ref().map(|r| r.id),
            "Verification complete"
        );
        verdict
    }

    async fn extract(
        &self,
        image: &EncodedImage,
        cancel: &CancellationToken,
    ) -> Option<ExtractedPayload> {
        let codec = self.codec.clone();
        let image = image.clone();
        let token = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let decoded = image.decode()?;
            codec.extract_image(&decoded, &token)
        })
        .await
        .map_err(|e| TracemarkError::Transform(format!("Extraction task failed: {e}")))
        .and_then(|r| r);

        match outcome {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "No payload recovered");
                None
            }
        }
    }

    /// Ask the registry, then the cache; errors and timeouts are misses.
    async fn lookup<F, Fut>(&self, kind: &str, query: F) -> Option<LedgerRecord>
    where
        F: Fn(Arc<dyn Registry>) -> Fut,
        Fut: std::future::Future<Output = Result<Option<LedgerRecord>>>,
    {
        let sources = std::iter::once(&self.registry).chain(self.cache.as_ref());
        for source in sources {
            match within(self.timeout, query(source.clone())).await {
                Ok(Some(record)) => {
                    debug!(kind, registry = source.name(), record_id = %record.id, "Lookup hit");
                    return Some(record);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(kind, registry = source.name(), error = %e, "Lookup failed");
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("registry", &self.registry.name())
            .field("cache", &self.cache.as_ref().map(|c| c.name()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NewLedgerEntry;
    use crate::registry::MemoryRegistry;
    use async_trait::async_trait;

    /// Never answers within any sensible timeout.
    struct HangingRegistry;

    #[async_trait]
    impl Registry for HangingRegistry {
        async fn find_by_metadata(&self, _: &str, _: &str) -> Result<Option<LedgerRecord>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
        async fn find_by_hash(&self, _: &str) -> Result<Option<LedgerRecord>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
        async fn append(&self, _: NewLedgerEntry) -> Result<LedgerRecord> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(TracemarkError::Registry("hung".into()))
        }
        async fn records(&self) -> Result<Vec<LedgerRecord>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
        fn name(&self) -> &'static str {
            "hanging"
        }
    }

    struct FailingRegistry;

    #[async_trait]
    impl Registry for FailingRegistry {
        async fn find_by_metadata(&self, _: &str, _: &str) -> Result<Option<LedgerRecord>> {
            Err(TracemarkError::Registry("down".into()))
        }
        async fn find_by_hash(&self, _: &str) -> Result<Option<LedgerRecord>> {
            Err(TracemarkError::Registry("down".into()))
        }
        async fn append(&self, _: NewLedgerEntry) -> Result<LedgerRecord> {
            Err(TracemarkError::Registry("down".into()))
        }
        async fn records(&self) -> Result<Vec<LedgerRecord>> {
            Err(TracemarkError::Registry("down".into()))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    async fn cache_holding(image: &EncodedImage) -> Arc<MemoryRegistry> {
        let cache = Arc::new(MemoryRegistry::new());
        cache
            .append(NewLedgerEntry::new(
                "alice",
                "2024-01-01T00:00:00.000Z",
                None,
                image.fingerprint(),
            ))
            .await
            .unwrap();
        cache
    }

    fn record(hash: &str) -> LedgerRecord {
        NewLedgerEntry::new("alice", "2024-01-01T00:00:00.000Z", None, hash)
            .link(crate::ledger::GENESIS_HASH)
    }

    #[test]
    fn test_verdict_table() {
        let a = record("h1");
        let b = record("h2");

        let both = VerificationVerdict::resolve(None, "h".into(), Some(a.clone()), Some(b.clone()));
        assert_eq!(both.confidence, Confidence::ExactHash);
        assert_eq!(both.matched_record.as_ref().map(|r| r.id), Some(a.id));

        let meta = VerificationVerdict::resolve(None, "h".into(), Some(a.clone()), None);
        assert_eq!(meta.status, VerificationStatus::Registered);
        assert_eq!(meta.confidence, Confidence::MetadataMatch);

        let hash = VerificationVerdict::resolve(None, "h".into(), None, Some(b.clone()));
        assert_eq!(hash.confidence, Confidence::ExactHash);
        assert_eq!(hash.matched_record.map(|r| r.id), Some(b.id));

        let none = VerificationVerdict::resolve(None, "h".into(), None, None);
        assert_eq!(none.status, VerificationStatus::Unregistered);
        assert_eq!(none.confidence, Confidence::None);
        assert!(!none.is_registered());
    }

    #[test]
    fn test_verdict_json_shape() {
        let verdict = VerificationVerdict::resolve(None, "h".into(), Some(record("x")), None);
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "registered");
        assert_eq!(json["confidence"], "metadataMatch");
        assert!(json["matchedRecord"].is_object());
        assert!(json["extracted"].is_null());
    }

    #[tokio::test]
    async fn test_undecodable_image_is_unregistered() {
        let verifier = Verifier::new(Arc::new(MemoryRegistry::new()));
        let junk = EncodedImage::new(vec![1, 2, 3, 4], "image/png");
        let verdict = verifier.verify(&junk, &CancellationToken::new()).await;
        assert_eq!(verdict.status, VerificationStatus::Unregistered);
        assert_eq!(verdict.extracted, None);
        assert_eq!(verdict.content_hash, junk.fingerprint());
    }

    #[tokio::test]
    async fn test_hash_found_in_cache() {
        let junk = EncodedImage::new(vec![9, 9, 9], "image/png");
        let cache = Arc::new(MemoryRegistry::new());
        cache
            .append(NewLedgerEntry::new(
                "alice",
                "2024-01-01T00:00:00.000Z",
                None,
                junk.fingerprint(),
            ))
            .await
            .unwrap();

        let verifier = Verifier::new(Arc::new(MemoryRegistry::new())).with_cache(cache);
        let verdict = verifier.verify(&junk, &CancellationToken::new()).await;
        assert_eq!(verdict.confidence, Confidence::ExactHash);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_timeout_falls_back_to_cache() {
        let image = EncodedImage::new(vec![7, 7, 7], "image/png");
        let cache = cache_holding(&image).await;

        let verifier = Verifier::new(Arc::new(HangingRegistry))
            .with_cache(cache)
            .with_timeout(Duration::from_millis(100));
        let verdict = verifier.verify(&image, &CancellationToken::new()).await;
        assert_eq!(verdict.status, VerificationStatus::Registered);
        assert_eq!(verdict.confidence, Confidence::ExactHash);
        assert_eq!(
            verdict.matched_record.map(|r| r.image_hash),
            Some(image.fingerprint())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_timeout_without_cache_is_unregistered() {
        let image = EncodedImage::new(vec![7, 7, 7], "image/png");
        let verifier =
            Verifier::new(Arc::new(HangingRegistry)).with_timeout(Duration::from_millis(100));
        let verdict = verifier.verify(&image, &CancellationToken::new()).await;
        assert_eq!(verdict.status, VerificationStatus::Unregistered);
        assert_eq!(verdict.confidence, Confidence::None);
    }

    #[tokio::test]
    async fn test_registry_error_falls_back_to_cache() {
        let image = EncodedImage::new(vec![8, 8, 8], "image/png");
        let cache = cache_holding(&image).await;

        let verdict = Verifier::new(Arc::new(FailingRegistry))
            .with_cache(cache)
            .verify(&image, &CancellationToken::new())
            .await;
        assert_eq!(verdict.status, VerificationStatus::Registered);
        assert_eq!(verdict.confidence, Confidence::ExactHash);

        let verdict = Verifier::new(Arc::new(FailingRegistry))
            .verify(&image, &CancellationToken::new())
            .await;
        assert_eq!(verdict.status, VerificationStatus::Unregistered);
        assert_eq!(verdict.confidence, Confidence::None);
    }
}
