//! Provenance registry capability.
//!
//! A registry is an append-only, hash-chained list of [`LedgerRecord`]s that
//! can be searched by embedded metadata or by image fingerprint. The
//! watermarker writes to it and the verifier reads from it; both receive it
//! explicitly rather than reaching for global state.
//!
//! ## Backends
//!
//! - [`MemoryRegistry`] - in-process, for tests and embedding in services
//! - [`FileRegistry`] - JSON file on disk, used as the local cache
//! - `HttpRegistry` - remote registry service (feature `network`)

mod file;
#[cfg(feature = "network")]
mod http;
mod memory;

pub use file::FileRegistry;
#[cfg(feature = "network")]
pub use http::{HttpRegistry, HttpRegistryConfig};
pub use memory::MemoryRegistry;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, TracemarkError};
use crate::ledger::{LedgerRecord, NewLedgerEntry};

/// Read-by-metadata, read-by-hash and append access to a provenance ledger.
///
/// Implementations must be thread-safe (`Send + Sync`) and append-only.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Most recent record for the `(creator_id, timestamp)` pair.
    async fn find_by_metadata(
        &self,
        creator_id: &str,
        timestamp: &str,
    ) -> Result<Option<LedgerRecord>>;

    /// Most recent record whose image fingerprint equals `image_hash`.
    async fn find_by_hash(&self, image_hash: &str) -> Result<Option<LedgerRecord>>;

    /// Link `entry` after the current chain tip and store it.
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerRecord>;

    /// All records, oldest first.
    async fn records(&self) -> Result<Vec<LedgerRecord>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Newest record in `records` satisfying `predicate`.
pub(crate) fn newest_matching<F>(records: &[LedgerRecord], predicate: F) -> Option<LedgerRecord>
where
    F: Fn(&LedgerRecord) -> bool,
{
    records.iter().rev().find(|r| predicate(r)).cloned()
}

/// Run a registry call under `timeout`, mapping expiry to [`TracemarkError::Timeout`].
pub(crate) async fn within<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| TracemarkError::Timeout(timeout.as_millis() as u64))?
}
