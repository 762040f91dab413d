//! Object store (L2 backing store).
//!
//! # Responsibilities
//! - Key/value blobs with HTTP metadata and custom metadata
//! - Ranged reads and precondition-guarded reads
//!
//! # Design Decisions
//! - A failed precondition returns the object metadata without a body, so
//!   callers can tell "missing" from "precondition failed"
//! - Upload timestamps are kept at whole-second precision, matching what
//!   HTTP dates can express

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::StorageError;

/// Standard HTTP headers stored alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMetadata {
    pub content_type: Option<String>,
    pub content_language: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
    pub cache_expiry: Option<DateTime<Utc>>,
}

pub type CustomMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    /// Bare entity tag, without quotes.
    pub etag: String,
    pub uploaded: DateTime<Utc>,
    pub http_metadata: HttpMetadata,
    pub custom_metadata: CustomMetadata,
}

impl ObjectMeta {
    /// Entity tag in header form (quoted).
    pub fn http_etag(&self) -> String {
        format!("\"{}\"", self.etag)
    }
}

/// Byte range of a ranged read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRange {
    Offset { offset: u64, length: u64 },
    Suffix { suffix: u64 },
}

impl ObjectRange {
    /// Inclusive `(start, end)` within an object of `size` bytes, or `None` when empty.
    pub fn bounds(&self, size: u64) -> Option<(u64, u64)> {
        let (start, length) = match *self {
            ObjectRange::Offset { offset, length } => (offset, length.min(size.saturating_sub(offset))),
            ObjectRange::Suffix { suffix } => {
                let length = suffix.min(size);
                (size - length, length)
            }
        };
        if length == 0 || start >= size {
            return None;
        }
        Some((start, start + length - 1))
    }
}

/// Preconditions evaluated against the stored object before the body is returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preconditions {
    pub etag_matches: Option<String>,
    pub etag_does_not_match: Option<String>,
    pub uploaded_before: Option<DateTime<Utc>>,
    pub uploaded_after: Option<DateTime<Utc>>,
}

impl Preconditions {
    pub fn is_empty(&self) -> bool {
        self == &Preconditions::default()
    }

    pub fn evaluate(&self, meta: &ObjectMeta) -> bool {
        let etag_ok = |expected: &str| expected == "*" || expected == meta.etag;

        if let Some(expected) = &self.etag_matches {
            if !etag_ok(expected) {
                return false;
            }
        }
        if let Some(expected) = &self.etag_does_not_match {
            if etag_ok(expected) {
                return false;
            }
        }
        if let Some(date) = self.uploaded_before {
            if meta.uploaded > date {
                return false;
            }
        }
        if let Some(date) = self.uploaded_after {
            if meta.uploaded <= date {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub range: Option<ObjectRange>,
    pub only_if: Option<Preconditions>,
}

#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub http_metadata: HttpMetadata,
    pub custom_metadata: CustomMetadata,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    /// `None` when a precondition failed.
    pub body: Option<Bytes>,
    /// Range actually served, when one was requested and satisfiable.
    pub range: Option<(u64, u64)>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str, options: GetOptions) -> Result<Option<StoredObject>, StorageError>;

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError>;

    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> Result<ObjectMeta, StorageError>;
}

#[derive(Debug, Clone)]
struct BlobEntry {
    meta: ObjectMeta,
    body: Bytes,
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, BlobEntry>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str, options: GetOptions) -> Result<Option<StoredObject>, StorageError> {
        let Some(entry) = self.objects.get(key).map(|e| e.clone()) else {
            return Ok(None);
        };

        if let Some(only_if) = &options.only_if {
            if !only_if.evaluate(&entry.meta) {
                return Ok(Some(StoredObject {
                    meta: entry.meta,
                    body: None,
                    range: None,
                }));
            }
        }

        let range = options.range.and_then(|r| r.bounds(entry.meta.size));
        let body = match range {
            Some((start, end)) => entry.body.slice(start as usize..=end as usize),
            None => entry.body.clone(),
        };

        Ok(Some(StoredObject {
            meta: entry.meta,
            body: Some(body),
            range,
        }))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        Ok(self.objects.get(key).map(|e| e.meta.clone()))
    }

    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> Result<ObjectMeta, StorageError> {
        let digest = hex::encode(Sha256::digest(&body));
        let meta = ObjectMeta {
            key: key.to_string(),
            size: body.len() as u64,
            etag: digest[..32].to_string(),
            uploaded: Utc::now().trunc_subsecs(0),
            http_metadata: options.http_metadata,
            custom_metadata: options.custom_metadata,
        };

        self.objects.insert(
            key.to_string(),
            BlobEntry {
                meta: meta.clone(),
                body,
            },
        );
        tracing::debug!(key = %key, size = meta.size, etag = %meta.etag, "Stored object");
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store_with(body: &'static str) -> (MemoryBlobStore, ObjectMeta) {
        let store = MemoryBlobStore::new();
        let meta = store
            .put("k", Bytes::from_static(body.as_bytes()), PutOptions::default())
            .await
            .unwrap();
        (store, meta)
    }

    #[tokio::test]
    async fn test_put_get_head() {
        let (store, meta) = store_with("hello world").await;
        assert_eq!(meta.size, 11);
        assert_eq!(meta.etag.len(), 32);
        assert_eq!(meta.http_etag(), format!("\"{}\"", meta.etag));

        let object = store.get("k", GetOptions::default()).await.unwrap().unwrap();
        assert_eq!(object.body.unwrap(), "hello world");
        assert!(store.head("missing").await.unwrap().is_none());
        assert!(store.get("missing", GetOptions::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ranged_reads() {
        let (store, _) = store_with("0123456789").await;

        let get = |range| GetOptions {
            range: Some(range),
            only_if: None,
        };
        let object = store.get("k", get(ObjectRange::Offset { offset: 2, length: 3 })).await.unwrap().unwrap();
        assert_eq!(object.body.unwrap(), "234");
        assert_eq!(object.range, Some((2, 4)));

        let object = store.get("k", get(ObjectRange::Suffix { suffix: 4 })).await.unwrap().unwrap();
        assert_eq!(object.body.unwrap(), "6789");
        assert_eq!(object.range, Some((6, 9)));
    }

    #[tokio::test]
    async fn test_preconditions() {
        let (store, meta) = store_with("body").await;
        let get = |only_if| GetOptions {
            range: None,
            only_if: Some(only_if),
        };

        let failed = store
            .get("k", get(Preconditions { etag_matches: Some("nope".into()), ..Default::default() }))
            .await
            .unwrap()
            .unwrap();
        assert!(failed.body.is_none());

        let passed = store
            .get("k", get(Preconditions { etag_does_not_match: Some("nope".into()), ..Default::default() }))
            .await
            .unwrap()
            .unwrap();
        assert!(passed.body.is_some());

        let not_modified = store
            .get("k", get(Preconditions { uploaded_after: Some(meta.uploaded), ..Default::default() }))
            .await
            .unwrap()
            .unwrap();
        assert!(not_modified.body.is_none());

        let modified = store
            .get("k", get(Preconditions { uploaded_after: Some(meta.uploaded - Duration::seconds(1)), ..Default::default() }))
            .await
            .unwrap()
            .unwrap();
        assert!(modified.body.is_some());
    }

    #[test]
    fn test_range_bounds() {
        assert_eq!(ObjectRange::Offset { offset: 0, length: 100 }.bounds(10), Some((0, 9)));
        assert_eq!(ObjectRange::Suffix { suffix: 100 }.bounds(10), Some((0, 9)));
        assert_eq!(ObjectRange::Offset { offset: 10, length: 1 }.bounds(10), None);
        assert_eq!(ObjectRange::Suffix { suffix: 1 }.bounds(0), None);
    }
}
