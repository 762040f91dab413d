//! Per-tag version counters.
//!
//! # Responsibilities
//! - Hold one integer counter per cache tag (absent tags read as 0)
//! - Serialize mutations of the same tag
//! - Persist the full counter set to a JSON file after every mutation
//!
//! # Design Decisions
//! - Per-tag async mutex: writers of one tag never block another tag
//! - Snapshot writes go through a temp file and rename so a crash never
//!   leaves a truncated state file

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter persistence failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("counter state is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Authoritative store of tag versions.
#[async_trait]
pub trait Counter: Send + Sync {
    /// Current value; 0 when the tag has never been touched.
    async fn get(&self, tag: &str) -> Result<i64, CounterError>;

    /// Add one and return the new value.
    async fn increment(&self, tag: &str) -> Result<i64, CounterError>;

    /// Subtract one and return the new value.
    async fn decrement(&self, tag: &str) -> Result<i64, CounterError>;
}

/// In-process counter with optional JSON persistence.
#[derive(Debug, Default)]
pub struct LocalCounter {
    values: DashMap<String, i64>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    persistence: Option<PathBuf>,
    writer: Mutex<()>,
}

impl LocalCounter {
    /// Counter that lives only in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter backed by `path`, loading existing state if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CounterError> {
        let path = path.as_ref().to_path_buf();
        let values = DashMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let snapshot: BTreeMap<String, i64> = serde_json::from_str(&content)?;
            for (tag, value) in snapshot {
                values.insert(tag, value);
            }
            tracing::info!(
                path = %path.display(),
                tags = values.len(),
                "Loaded tag counters from disk"
            );
        }

        Ok(Self {
            values,
            locks: DashMap::new(),
            persistence: Some(path),
            writer: Mutex::new(()),
        })
    }

    /// Build from configuration: persistent when a path is configured.
    pub fn from_path(path: Option<&str>) -> Result<Self, CounterError> {
        match path {
            Some(path) if !path.is_empty() => Self::open(path),
            _ => Ok(Self::new()),
        }
    }

    /// Copy of every counter.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    async fn apply(&self, tag: &str, delta: i64) -> Result<i64, CounterError> {
        let lock = self.locks.entry(tag.to_string()).or_default().clone();
        let _guard = lock.lock().await;

        let value = {
            let mut entry = self.values.entry(tag.to_string()).or_insert(0);
            *entry += delta;
            *entry
        };

        if let Err(e) = self.persist().await {
            // Memory never runs ahead of the state file.
            if let Some(mut entry) = self.values.get_mut(tag) {
                *entry -= delta;
            }
            tracing::error!(tag = %tag, error = %e, "Failed to persist tag counter, change rolled back");
            return Err(e);
        }
        Ok(value)
    }

    async fn persist(&self) -> Result<(), CounterError> {
        let Some(path) = &self.persistence else {
            return Ok(());
        };

        let _writer = self.writer.lock().await;
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl Counter for LocalCounter {
    async fn get(&self, tag: &str) -> Result<i64, CounterError> {
        Ok(self.values.get(tag).map(|v| *v).unwrap_or(0))
    }

    async fn increment(&self, tag: &str) -> Result<i64, CounterError> {
        self.apply(tag, 1).await
    }

    async fn decrement(&self, tag: &str) -> Result<i64, CounterError> {
        self.apply(tag, -1).await
    }
}
