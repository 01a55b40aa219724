//! Watermark an image and record it in the provenance registry.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::attribution::{Payload, PayloadLayout};
use crate::codec::{EmbedReport, WatermarkCodec};
use crate::error::{Result, TracemarkError};
use crate::fingerprint::EncodedImage;
use crate::ledger::{LedgerRecord, NewLedgerEntry};
use crate::registry::{within, Registry};

/// Default bound on a single registry call.
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(5);

/// What to embed and how to record it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedRequest {
    pub payload: Payload,
    /// Stored in the ledger only, never embedded.
    pub prompt: Option<String>,
    pub layout: PayloadLayout,
}

impl EmbedRequest {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            prompt: None,
            layout: PayloadLayout::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_layout(mut self, layout: PayloadLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// A watermarked image that has not been registered yet.
#[derive(Debug, Clone)]
pub struct MarkedImage {
    /// Watermarked image, always PNG.
    pub image: EncodedImage,
    /// Fingerprint of `image`.
    pub content_hash: String,
    pub report: EmbedReport,
    request: EmbedRequest,
}

/// A watermarked image and the ledger record written for it.
#[derive(Debug, Clone)]
pub struct WatermarkResult {
    /// Watermarked image, always PNG.
    pub image: EncodedImage,
    /// Fingerprint of `image`.
    pub content_hash: String,
    pub ledger_entry: LedgerRecord,
    pub report: EmbedReport,
    /// Name of the registry that accepted the record.
    pub stored_in: &'static str,
}

/// Embeds payloads and registers the results.
///
/// Records go to the primary registry; when that fails or times out they go
/// to the optional cache instead. A successful primary write is mirrored to
/// the cache on a best-effort basis.
pub struct Watermarker {
    registry: Arc<dyn Registry>,
    cache: Option<Arc<dyn Registry>>,
    codec: WatermarkCodec,
    timeout: Duration,
}

impl Watermarker {
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

    /// Watermark `source`, encode it as PNG and register its fingerprint.
    pub async fn embed(
        &self,
        source: &EncodedImage,
        request: EmbedRequest,
        cancel: &CancellationToken,
    ) -> Result<WatermarkResult> {
        let marked = self.mark(source, request, cancel).await?;
        self.register(marked).await
    }

    /// Watermark and encode `source` without touching any registry.
    ///
    /// Callers that persist the image themselves write it between this and
    /// [`Watermarker::register`], so no record outlives a failed write.
    pub async fn mark(
        &self,
        source: &EncodedImage,
        request: EmbedRequest,
        cancel: &CancellationToken,
    ) -> Result<MarkedImage> {
        request.payload.validate()?;

        let codec = self.codec.clone();
        let source = source.clone();
        let payload = request.payload.clone();
        let layout = request.layout;
        let token = cancel.clone();
        let (image, report) = tokio::task::spawn_blocking(move || {
            let decoded = source.decode()?;
            let (pixels, report) = codec.embed_image(&decoded, &payload, layout, &token)?;
            Ok::<_, TracemarkError>((EncodedImage::encode_png(&pixels)?, report))
        })
        .await
        .map_err(|e| TracemarkError::Transform(format!("Embedding task failed: {e}")))??;

        let content_hash = image.fingerprint();
        debug!(content_hash = %content_hash, bytes = image.bytes.len(), "Encoded watermarked image");

        Ok(MarkedImage {
            image,
            content_hash,
            report,
            request,
        })
    }

    /// Record a [`MarkedImage`] in the registry, or the cache if that fails.
    pub async fn register(&self, marked: MarkedImage) -> Result<WatermarkResult> {
        let MarkedImage {
            image,
            content_hash,
            report,
            request,
        } = marked;

        let entry = NewLedgerEntry::new(
            request.payload.creator_id,
            request.payload.timestamp,
            request.prompt,
            content_hash.clone(),
        );
        let (ledger_entry, stored_in) = self.append(entry).await?;

        info!(
            record_id = %ledger_entry.id,
            registry = stored_in,
            tiles = report.tiles,
            "Watermarked image registered"
        );

        Ok(WatermarkResult {
            image,
            content_hash,
            ledger_entry,
            report,
            stored_in,
        })
    }

    async fn append(&self, entry: NewLedgerEntry) -> Result<(LedgerRecord, &'static str)> {
        let primary = within(self.timeout, self.registry.append(entry.clone())).await;

        let cache = match (&self.cache, primary) {
            (None, Ok(record)) => return Ok((record, self.registry.name())),
            (None, Err(e)) => return Err(registry_failure(self.registry.name(), e)),
            (Some(cache), Ok(record)) => {
                if let Err(e) = within(self.timeout, cache.append(entry)).await {
                    warn!(error = %e, cache = cache.name(), "Failed to mirror record into cache");
                }
                return Ok((record, self.registry.name()));
            }
            (Some(cache), Err(e)) => {
                warn!(
                    error = %e,
                    registry = self.registry.name(),
                    "Registry append failed, falling back to cache"
                );
                cache
            }
        };

        within(self.timeout, cache.append(entry))
            .await
            .map(|record| (record, cache.name()))
            .map_err(|e| registry_failure(cache.name(), e))
    }
}

fn registry_failure(name: &str, e: TracemarkError) -> TracemarkError {
    match e {
        TracemarkError::Registry(_) => e,
        other => TracemarkError::Registry(format!("{name}: {other}")),
    }
}

impl std::fmt::Debug for Watermarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watermarker")
            .field("registry", &self.registry.name())
            .field("cache", &self.cache.as_ref().map(|c| c.name()))
            .field("codec", &self.codec)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};

    struct DownRegistry;

    #[async_trait]
    impl Registry for DownRegistry {
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
            "down"
        }
    }

    fn source() -> EncodedImage {
        let img = RgbaImage::from_fn(128, 128, |x, y| {
            Rgba([60 + (x % 90) as u8, 80 + (y % 70) as u8, 120, 255])
        });
        EncodedImage::encode_png(&img).unwrap()
    }

    fn request() -> EmbedRequest {
        EmbedRequest::new(Payload::new("alice", "2024-01-01T00:00:00.000Z").unwrap())
            .with_prompt("a lighthouse")
    }

    #[tokio::test]
    async fn test_embed_registers_fingerprint() {
        let registry = Arc::new(MemoryRegistry::new());
        let watermarker = Watermarker::new(registry.clone());

        let result = watermarker
            .embed(&source(), request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.image.mime, "image/png");
        assert_eq!(result.content_hash, result.image.fingerprint());
        assert_eq!(result.ledger_entry.image_hash, result.content_hash);
        assert_eq!(result.ledger_entry.prompt.as_deref(), Some("a lighthouse"));
        assert_eq!(result.stored_in, "memory");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_cache() {
        let cache = Arc::new(MemoryRegistry::new());
        let watermarker = Watermarker::new(Arc::new(DownRegistry)).with_cache(cache.clone());

        let result = watermarker
            .embed(&source(), request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.stored_in, "memory");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_mirrors_into_cache() {
        let registry = Arc::new(MemoryRegistry::new());
        let cache = Arc::new(MemoryRegistry::new());
        let watermarker = Watermarker::new(registry.clone()).with_cache(cache.clone());

        watermarker
            .embed(&source(), request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(registry.len().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_fails_without_any_registry() {
        let watermarker = Watermarker::new(Arc::new(DownRegistry));
        let err = watermarker
            .embed(&source(), request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TracemarkError::Registry(_)));
    }

    #[tokio::test]
    async fn test_invalid_payload_rejected_before_work() {
        let registry = Arc::new(MemoryRegistry::new());
        let watermarker = Watermarker::new(registry.clone());
        let bad = EmbedRequest::new(Payload {
            creator_id: "a|b".into(),
            timestamp: "2024-01-01T00:00:00.000Z".into(),
        });

        let err = watermarker
            .embed(&source(), bad, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TracemarkError::InvalidPayload(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unrecoverable_image_not_registered() {
        let registry = Arc::new(MemoryRegistry::new());
        let cache = Arc::new(MemoryRegistry::new());
        let watermarker = Watermarker::new(registry.clone()).with_cache(cache.clone());
        let white =
            EncodedImage::encode_png(&RgbaImage::from_pixel(256, 256, Rgba([255, 255, 255, 255])))
                .unwrap();

        let err = watermarker
            .embed(&white, request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TracemarkError::Unrecoverable(_)));
        assert!(registry.is_empty().await);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_mark_then_register() {
        let registry = Arc::new(MemoryRegistry::new());
        let watermarker = Watermarker::new(registry.clone());

        let marked = watermarker
            .mark(&source(), request(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(registry.is_empty().await);
        assert_eq!(marked.content_hash, marked.image.fingerprint());

        let result = watermarker.register(marked).await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert_eq!(result.ledger_entry.image_hash, result.content_hash);
    }

    #[tokio::test]
    async fn test_cancelled_embed() {
        let watermarker = Watermarker::new(Arc::new(MemoryRegistry::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = watermarker.embed(&source(), request(), &cancel).await.unwrap_err();
        assert!(matches!(err, TracemarkError::Cancelled));
    }
}
