//! Hash-chained provenance ledger records.
//!
//! Every record commits to its predecessor:
//! `chain_hash = sha256(creatorId|timestamp|imageHash|prompt|prevHash)`,
//! with [`GENESIS_HASH`] as the `prev_hash` of the first record. Editing or
//! removing any record breaks every link after it, which [`audit_chain`]
//! reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::fingerprint;

/// `prev_hash` of the first record in a ledger.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A record as stored by a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub id: Uuid,
    pub creator_id: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Fingerprint of the watermarked image
    pub image_hash: String,
    pub created_at: DateTime<Utc>,
    pub prev_hash: String,
    pub chain_hash: String,
}

/// A record before a registry links it into its chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLedgerEntry {
    pub id: Uuid,
    pub creator_id: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub image_hash: String,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    /// Fresh entry with a random id, created now.
    pub fn new(
        creator_id: impl Into<String>,
        timestamp: impl Into<String>,
        prompt: Option<String>,
        image_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            creator_id: creator_id.into(),
            timestamp: timestamp.into(),
            prompt,
            image_hash: image_hash.into(),
            created_at: Utc::now(),
        }
    }

    /// Link this entry after the record whose chain hash is `prev_hash`.
    pub fn link(self, prev_hash: &str) -> LedgerRecord {
        let chain_hash = chain_hash(
            &self.creator_id,
            &self.timestamp,
            &self.image_hash,
            self.prompt.as_deref(),
            prev_hash,
        );
        LedgerRecord {
            id: self.id,
            creator_id: self.creator_id,
            timestamp: self.timestamp,
            prompt: self.prompt,
            image_hash: self.image_hash,
            created_at: self.created_at,
            prev_hash: prev_hash.to_string(),
            chain_hash,
        }
    }
}

impl LedgerRecord {
    /// Chain hash recomputed from this record's own fields.
    pub fn expected_chain_hash(&self) -> String {
        chain_hash(
            &self.creator_id,
            &self.timestamp,
            &self.image_hash,
            self.prompt.as_deref(),
            &self.prev_hash,
        )
    }
}

/// `sha256("creatorId|timestamp|imageHash|prompt|prevHash")`, absent prompt as empty.
pub fn chain_hash(
    creator_id: &str,
    timestamp: &str,
    image_hash: &str,
    prompt: Option<&str>,
    prev_hash: &str,
) -> String {
    fingerprint(&format!(
        "{}|{}|{}|{}|{}",
        creator_id,
        timestamp,
        image_hash,
        prompt.unwrap_or(""),
        prev_hash
    ))
}

/// Chain hash that the next appended record must reference.
pub fn chain_tip(records: &[LedgerRecord]) -> &str {
    records
        .last()
        .map(|r| r.chain_hash.as_str())
        .unwrap_or(GENESIS_HASH)
}

/// Why a link failed the audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainBreakReason {
    /// `prev_hash` does not reference the preceding record
    PrevHashMismatch,
    /// `chain_hash` does not match the record's contents
    ChainHashMismatch,
}

impl std::fmt::Display for ChainBreakReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrevHashMismatch => write!(f, "previous hash does not match"),
            Self::ChainHashMismatch => write!(f, "chain hash does not match record contents"),
        }
    }
}

/// First broken link found by [`audit_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBreak {
    /// Position in oldest-first order
    pub index: usize,
    pub record_id: Uuid,
    pub reason: ChainBreakReason,
}

/// Walk `records` oldest first and report the first inconsistent link.
pub fn audit_chain(records: &[LedgerRecord]) -> Option<ChainBreak> {
    let mut expected_prev = GENESIS_HASH.to_string();
    for (index, record) in records.iter().enumerate() {
        let reason = if record.prev_hash != expected_prev {
            Some(ChainBreakReason::PrevHashMismatch)
        } else if record.chain_hash != record.expected_chain_hash() {
            Some(ChainBreakReason::ChainHashMismatch)
        } else {
            None
        };

        if let Some(reason) = reason {
            return Some(ChainBreak {
                index,
                record_id: record.id,
                reason,
            });
        }
        expected_prev = record.expected_chain_hash();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_chain(n: usize) -> Vec<LedgerRecord> {
        let mut records: Vec<LedgerRecord> = Vec::new();
        for i in 0..n {
            let entry = NewLedgerEntry::new(
                format!("creator{}", i),
                "2024-01-01T00:00:00.000Z",
                (i % 2 == 0).then(|| format!("prompt {}", i)),
                fingerprint(&i.to_string()),
            );
            let prev = chain_tip(&records).to_string();
            records.push(entry.link(&prev));
        }
        records
    }

    #[test]
    fn test_genesis_link() {
        let records = build_chain(1);
        assert_eq!(records[0].prev_hash, GENESIS_HASH);
        assert_eq!(records[0].chain_hash, records[0].expected_chain_hash());
    }

    #[test]
    fn test_chain_hash_formula() {
        let expected = fingerprint("alice|2024-01-01T00:00:00.000Z|abc||0");
        assert_eq!(
            chain_hash("alice", "2024-01-01T00:00:00.000Z", "abc", None, "0"),
            expected
        );
        assert_ne!(
            chain_hash("alice", "2024-01-01T00:00:00.000Z", "abc", Some("p"), "0"),
            expected
        );
    }

    #[test]
    fn test_intact_chain_passes() {
        assert_eq!(audit_chain(&build_chain(5)), None);
        assert_eq!(audit_chain(&[]), None);
    }

    #[test]
    fn test_edited_record_detected() {
        let mut records = build_chain(4);
        records[2].creator_id = "mallory".into();
        let found = audit_chain(&records).unwrap();
        assert_eq!(found.index, 2);
        assert_eq!(found.record_id, records[2].id);
        assert_eq!(found.reason, ChainBreakReason::ChainHashMismatch);
    }

    #[test]
    fn test_rehashed_edit_breaks_next_link() {
        let mut records = build_chain(4);
        records[1].image_hash = "forged".into();
        records[1].chain_hash = records[1].expected_chain_hash();
        let found = audit_chain(&records).unwrap();
        assert_eq!(found.index, 2);
        assert_eq!(found.reason, ChainBreakReason::PrevHashMismatch);
    }

    #[test]
    fn test_removed_record_detected() {
        let mut records = build_chain(4);
        records.remove(1);
        let found = audit_chain(&records).unwrap();
        assert_eq!(found.index, 1);
        assert_eq!(found.reason, ChainBreakReason::PrevHashMismatch);
    }

    #[test]
    fn test_record_json_shape() {
        let record = build_chain(1).remove(0);
        let json = serde_json::to_value(&record).unwrap();
        for key in [
            "id",
            "creatorId",
            "timestamp",
            "prompt",
            "imageHash",
            "createdAt",
            "prevHash",
            "chainHash",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        let back: LedgerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
