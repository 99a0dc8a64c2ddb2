//! Per-record hash chain heads.
//!
//! The index keeps only the latest accepted hash per record, which is also the
//! dedup window. It can be persisted as a JSON document written with the
//! atomic `.tmp` + rename pattern.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tidemark_core::types::{OrgId, RecordKey};

use crate::error::{io_err, IngestError};

/// Latest accepted link for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub content_hash: String,
    pub event_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Result of checking a candidate hash against a record's chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub content_hash: String,
    /// The hash actually stored for the record, regardless of what the
    /// producer declared.
    pub previous_hash: Option<String>,
    pub duplicate: bool,
    pub chain_broken: bool,
}

impl ChainLink {
    /// Link `content_hash` after `stored`.
    ///
    /// A duplicate is never also reported as broken. `declared` of `None`
    /// means the producer does not track chains and is never a break, even
    /// when the record already has a head. Only a producer that declares a
    /// hash can observe a mismatch.
    pub fn compute(content_hash: String, declared: Option<&str>, stored: Option<&str>) -> Self {
        let duplicate = stored == Some(content_hash.as_str());
        let chain_broken = !duplicate && declared.is_some() && declared != stored;
        Self {
            previous_hash: stored.map(str::to_owned),
            content_hash,
            duplicate,
            chain_broken,
        }
    }
}

/// In-memory map of record key to chain head.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainIndex {
    heads: HashMap<RecordKey, ChainHead>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self, key: &RecordKey) -> Option<&ChainHead> {
        self.heads.get(key)
    }

    pub fn latest(&self, key: &RecordKey) -> Option<&str> {
        self.heads.get(key).map(|h| h.content_hash.as_str())
    }

    /// Record `content_hash` as the new head for `key`.
    pub fn advance(&mut self, key: RecordKey, content_hash: String, event_id: Uuid) {
        self.heads.insert(
            key,
            ChainHead {
                content_hash,
                event_id,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &ChainHead)> {
        self.heads.iter()
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// On-disk chain index payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainIndexFile {
    pub saved_at: DateTime<Utc>,
    pub heads: Vec<StoredHead>,
}

/// One flattened entry of [`ChainIndexFile`]. JSON object keys must be
/// strings, so the record key is spelled out field by field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredHead {
    pub organization_id: OrgId,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(flatten)]
    pub head: ChainHead,
}

impl From<&ChainIndex> for ChainIndexFile {
    fn from(index: &ChainIndex) -> Self {
        let mut heads: Vec<StoredHead> = index
            .heads
            .iter()
            .map(|(key, head)| StoredHead {
                organization_id: key.organization_id.clone(),
                entity_type: key.entity_type.clone(),
                entity_id: key.entity_id.clone(),
                head: head.clone(),
            })
            .collect();
        heads.sort_by(|a, b| {
            (&a.organization_id, &a.entity_type, &a.entity_id).cmp(&(
                &b.organization_id,
                &b.entity_type,
                &b.entity_id,
            ))
        });
        Self {
            saved_at: Utc::now(),
            heads,
        }
    }
}

impl From<ChainIndexFile> for ChainIndex {
    fn from(file: ChainIndexFile) -> Self {
        let heads = file
            .heads
            .into_iter()
            .map(|s| {
                (
                    RecordKey::new(s.organization_id, s.entity_type, s.entity_id),
                    s.head,
                )
            })
            .collect();
        Self { heads }
    }
}

/// Load a chain index file. Returns `None` if the file does not exist yet.
pub fn load_at(path: &Path) -> Result<Option<ChainIndexFile>, IngestError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let file = serde_json::from_str(&contents).map_err(|source| IngestError::IndexFormat {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(file))
}

/// Save `index` atomically: write `<path>.tmp`, then rename over `<path>`.
pub fn save_at(path: &Path, index: &ChainIndex) -> Result<(), IngestError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }

    let file = ChainIndexFile::from(index);
    let json = serde_json::to_string_pretty(&file).map_err(|source| IngestError::IndexFormat {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    tracing::debug!(path = %path.display(), heads = index.len(), "chain index saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(id: &str) -> RecordKey {
        RecordKey::new("org-1", "deal", id)
    }

    #[test]
    fn first_event_has_no_previous_and_is_not_broken() {
        let link = ChainLink::compute("h1".into(), None, None);
        assert_eq!(link.previous_hash, None);
        assert!(!link.duplicate);
        assert!(!link.chain_broken);
    }

    #[test]
    fn matching_declaration_links_cleanly() {
        let link = ChainLink::compute("h2".into(), Some("h1"), Some("h1"));
        assert_eq!(link.previous_hash.as_deref(), Some("h1"));
        assert!(!link.chain_broken);
    }

    #[test]
    fn stale_declaration_breaks_chain_but_links_to_stored() {
        let link = ChainLink::compute("h3".into(), Some("h1"), Some("h2"));
        assert!(link.chain_broken);
        assert_eq!(link.previous_hash.as_deref(), Some("h2"));
    }

    #[test]
    fn declaration_on_unknown_record_is_a_break() {
        let link = ChainLink::compute("h1".into(), Some("h0"), None);
        assert!(link.chain_broken);
        assert_eq!(link.previous_hash, None);
    }

    #[test]
    fn undeclared_previous_on_existing_head_is_not_a_break() {
        let link = ChainLink::compute("h3".into(), None, Some("h2"));
        assert!(!link.chain_broken);
        assert_eq!(link.previous_hash.as_deref(), Some("h2"));
    }

    #[test]
    fn duplicate_wins_over_break() {
        let link = ChainLink::compute("h2".into(), Some("zzz"), Some("h2"));
        assert!(link.duplicate);
        assert!(!link.chain_broken);
    }

    #[test]
    fn advance_replaces_head() {
        let mut index = ChainIndex::new();
        index.advance(key("d-1"), "h1".into(), Uuid::new_v4());
        index.advance(key("d-1"), "h2".into(), Uuid::new_v4());
        assert_eq!(index.latest(&key("d-1")), Some("h2"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.latest(&key("d-2")), None);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_at(&tmp.path().join("chains.json")).unwrap().is_none());
    }

    #[test]
    fn save_then_load_restores_heads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("chains.json");

        let mut index = ChainIndex::new();
        index.advance(key("d-1"), "h1".into(), Uuid::new_v4());
        index.advance(key("d-2"), "h9".into(), Uuid::new_v4());
        save_at(&path, &index).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let loaded = ChainIndex::from(load_at(&path).unwrap().unwrap());
        assert_eq!(loaded, index);
    }

    #[test]
    fn corrupt_file_is_reported_with_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chains.json");
        std::fs::write(&path, "{not json").unwrap();
        match load_at(&path) {
            Err(IngestError::IndexFormat { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected IndexFormat, got {other:?}"),
        }
    }
}
