//! JSON-file registry.
//!
//! The whole ledger is a single JSON array, oldest record first. Appends
//! rewrite the file through a temporary sibling and a rename, so a crash
//! never leaves a half-written ledger behind. A missing file is an empty
//! ledger.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{newest_matching, Registry};
use crate::error::{Result, TracemarkError};
use crate::ledger::{chain_tip, LedgerRecord, NewLedgerEntry};

/// Append-only ledger persisted as a JSON file.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<LedgerRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                TracemarkError::Registry(format!(
                    "Corrupt ledger file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, records: &[LedgerRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Registry for FileRegistry {
    async fn find_by_metadata(
        &self,
        creator_id: &str,
        timestamp: &str,
    ) -> Result<Option<LedgerRecord>> {
        let records = self.load().await?;
        Ok(newest_matching(&records, |r| {
            r.creator_id == creator_id && r.timestamp == timestamp
        }))
    }

    async fn find_by_hash(&self, image_hash: &str) -> Result<Option<LedgerRecord>> {
        let records = self.load().await?;
        Ok(newest_matching(&records, |r| r.image_hash == image_hash))
    }

    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerRecord> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let record = entry.link(chain_tip(&records));
        records.push(record.clone());
        self.store(&records).await?;
        debug!(
            record_id = %record.id,
            path = %self.path.display(),
            "Appended record to ledger file"
        );
        Ok(record)
    }

    async fn records(&self) -> Result<Vec<LedgerRecord>> {
        self.load().await
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
