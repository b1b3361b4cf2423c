use super::{expire_older_than, key_date, snapshot_key, BlobStore, SNAPSHOT_PREFIX};
use crate::error::ReportError;
use crate::model::Snapshot;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct SnapshotStore {
    blobs: Arc<dyn BlobStore>,
}

impl SnapshotStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Snapshot for `date`, or `None` if that day was never saved.
    pub async fn load(&self, date: NaiveDate) -> Result<Option<Snapshot>, ReportError> {
        let key = snapshot_key(date);
        let Some(raw) = self
            .blobs
            .get(&key)
            .await
            .map_err(|e| ReportError::storage(&key, e))?
        else {
            debug!(%date, "no snapshot stored");
            return Ok(None);
        };
        let snap = serde_json::from_slice(&raw).map_err(|e| ReportError::storage(&key, e))?;
        Ok(Some(snap))
    }

    /// Newest snapshot dated strictly before `date`.
    pub async fn latest_before(&self, date: NaiveDate) -> Result<Option<Snapshot>, ReportError> {
        let keys = self
            .blobs
            .list(SNAPSHOT_PREFIX)
            .await
            .map_err(|e| ReportError::storage(SNAPSHOT_PREFIX, e))?;

        let newest = keys
            .iter()
            .filter(|k| k.ends_with(".json"))
            .filter_map(|k| key_date(k))
            .filter(|d| *d < date)
            .max();

        match newest {
            Some(d) => self.load(d).await,
            None => Ok(None),
        }
    }

    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), ReportError> {
        let key = snapshot_key(snapshot.date);
        let body = serde_json::to_vec(snapshot).map_err(|e| ReportError::storage(&key, e))?;
        self.blobs
            .put(&key, body, "application/json")
            .await
            .map_err(|e| ReportError::storage(&key, e))?;
        info!(key = %key, resources = snapshot.resources.len(), "snapshot saved");
        Ok(())
    }

    /// Removes snapshots dated before `older_than`. Failures are logged only.
    pub async fn expire(&self, older_than: NaiveDate) -> usize {
        expire_older_than(self.blobs.as_ref(), SNAPSHOT_PREFIX, older_than).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceRecord;
    use crate::store::fs::FsBlobStore;
    use chrono::{TimeZone, Utc};
    use maplit::btreemap;
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn snapshot(date: NaiveDate, ids: &[&str]) -> Snapshot {
        Snapshot {
            date,
            taken_at: Utc.from_utc_datetime(&date.and_hms_opt(0, 5, 0).unwrap()),
            resources: ids
                .iter()
                .map(|id| ResourceRecord {
                    resource_id: id.to_string(),
                    resource_type: "AWS::Lambda::Function".into(),
                    region: "us-east-1".into(),
                    state: "Active".into(),
                    created_at: Some(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()),
                    last_modified_at: None,
                    tags: btreemap! {"env".into() => "prod".into()},
                    extra: BTreeMap::new(),
                })
                .collect(),
        }
    }

    fn store(dir: &tempfile::TempDir) -> SnapshotStore {
        SnapshotStore::new(Arc::new(FsBlobStore::new(dir.path())))
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let snap = snapshot(day(29), &["fn-a", "fn-b"]);
        s.save(&snap).await.unwrap();
        assert_eq!(s.load(day(29)).await.unwrap(), Some(snap));
    }

    #[tokio::test]
    async fn missing_date_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store(&dir).load(day(1)).await.unwrap(), None);
        assert_eq!(store(&dir).latest_before(day(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn latest_before_skips_today_and_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.save(&snapshot(day(20), &["old"])).await.unwrap();
        s.save(&snapshot(day(26), &["last-good"])).await.unwrap();
        s.save(&snapshot(day(29), &["today"])).await.unwrap();

        let prev = s.latest_before(day(29)).await.unwrap().unwrap();
        assert_eq!(prev.date, day(26));
        assert_eq!(prev.resources[0].resource_id, "last-good");
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(FsBlobStore::new(dir.path()));
        blobs
            .put(&snapshot_key(day(28)), b"{truncated".to_vec(), "application/json")
            .await
            .unwrap();
        let err = SnapshotStore::new(blobs).load(day(28)).await.unwrap_err();
        assert!(matches!(err, ReportError::Storage { .. }));
    }

    #[tokio::test]
    async fn expire_drops_old_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.save(&snapshot(day(1), &["a"])).await.unwrap();
        s.save(&snapshot(day(29), &["b"])).await.unwrap();
        assert_eq!(s.expire(day(10)).await, 1);
        assert_eq!(s.load(day(1)).await.unwrap(), None);
        assert!(s.load(day(29)).await.unwrap().is_some());
    }
}
