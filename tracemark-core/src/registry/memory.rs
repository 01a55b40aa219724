//! In-memory registry.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{newest_matching, Registry};
use crate::error::Result;
use crate::ledger::{chain_tip, LedgerRecord, NewLedgerEntry};

/// Append-only ledger held in process memory. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryRegistry {
    records: RwLock<Vec<LedgerRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing records, e.g. a snapshot loaded elsewhere.
    ///
    /// The records are taken as-is; run [`crate::ledger::audit_chain`] to check them.
    pub fn with_records(records: Vec<LedgerRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn find_by_metadata(
        &self,
        creator_id: &str,
        timestamp: &str,
    ) -> Result<Option<LedgerRecord>> {
        let records = self.records.read().await;
        Ok(newest_matching(&records, |r| {
            r.creator_id == creator_id && r.timestamp == timestamp
        }))
    }

    async fn find_by_hash(&self, image_hash: &str) -> Result<Option<LedgerRecord>> {
        let records = self.records.read().await;
        Ok(newest_matching(&records, |r| r.image_hash == image_hash))
    }

    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerRecord> {
        let mut records = self.records.write().await;
        let record = entry.link(chain_tip(&records));
        debug!(record_id = %record.id, index = records.len(), "Appended record in memory");
        records.push(record.clone());
        Ok(record)
    }

    async fn records(&self) -> Result<Vec<LedgerRecord>> {
        Ok(self.records.read().await.clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegistry").finish_non_exhaustive()
    }
}
