//! Durable object storage for snapshots and rendered reports.

pub mod fs;
pub mod s3;
pub mod snapshot;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{info, warn};

pub use snapshot::SnapshotStore;

pub const SNAPSHOT_PREFIX: &str = "snapshots/";
pub const REPORT_PREFIX: &str = "reports/";

pub fn snapshot_key(date: NaiveDate) -> String {
    format!("{SNAPSHOT_PREFIX}{date}.json")
}

pub fn report_key(date: NaiveDate) -> String {
    format!("{REPORT_PREFIX}{date}-aws-resource-report.xlsx")
}

/// Date a snapshot or report key was written for; keys that do not start
/// with `YYYY-MM-DD` after the prefix are not ours.
pub fn key_date(key: &str) -> Option<NaiveDate> {
    let name = key.rsplit('/').next()?;
    let stamp = name.get(..10)?;
    NaiveDate::parse_from_str(stamp, "%Y-%m-%d").ok()
}

/// Key/value object store. `put` must replace the object atomically: a
/// reader sees either the previous object or the complete new one.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Time-limited read reference for `key`.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String>;
}

// Errors are logged; returns how many objects were actually removed.
pub async fn expire_older_than(store: &dyn BlobStore, prefix: &str, older_than: NaiveDate) -> usize {
    let keys = match store.list(prefix).await {
        Ok(keys) => keys,
        Err(e) => {
            warn!(store = store.name(), prefix, error = %e, "retention listing failed");
            return 0;
        }
    };

    let mut removed = 0;
    for key in keys {
        if !key_date(&key).is_some_and(|d| d < older_than) {
            continue;
        }
        match store.delete(&key).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(store = store.name(), key = %key, error = %e, "retention delete failed"),
        }
    }
    if removed > 0 {
        info!(store = store.name(), prefix, removed, %older_than, "expired old objects");
    }
    removed
}
