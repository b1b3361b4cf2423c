use crate::error::ReportError;
use crate::out::{Notification, Notifier};
use crate::render::CONTENT_TYPE;
use crate::store::{expire_older_than, report_key, BlobStore, REPORT_PREFIX};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedReport {
    pub key: String,
    pub url: String,
}

/// Stores rendered reports, hands out time-limited links and notifies.
pub struct ReportPublisher {
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
    link_ttl: Duration,
}

impl ReportPublisher {
    pub fn new(blobs: Arc<dyn BlobStore>, notifier: Arc<dyn Notifier>, link_ttl: Duration) -> Self {
        Self {
            blobs,
            notifier,
            link_ttl,
        }
    }

    pub fn link_ttl(&self) -> Duration {
        self.link_ttl
    }

    pub async fn publish(&self, date: NaiveDate, artifact: Vec<u8>) -> Result<PublishedReport, ReportError> {
        let key = report_key(date);
        let size = artifact.len();
        self.blobs
            .put(&key, artifact, CONTENT_TYPE)
            .await
            .map_err(|e| ReportError::storage(&key, e))?;
        let url = match self.blobs.presign(&key, self.link_ttl).await {
            Ok(url) => url,
            Err(e) => {
                self.retract(&key).await;
                return Err(ReportError::storage(&key, e));
            }
        };
        info!(key = %key, bytes = size, "report published");
        Ok(PublishedReport { key, url })
    }

    /// Removes an artifact of a run that did not complete.
    pub async fn retract(&self, key: &str) {
        match self.blobs.delete(key).await {
            Ok(()) => info!(key = %key, "report retracted"),
            Err(e) => warn!(key = %key, error = %e, "could not retract report"),
        }
    }

    /// Removes reports dated before `older_than`. Failures are logged only.
    pub async fn expire(&self, older_than: NaiveDate) -> usize {
        expire_older_than(self.blobs.as_ref(), REPORT_PREFIX, older_than).await
    }

    pub async fn notify(&self, n: &Notification) -> bool {
        match self.notifier.notify(n).await {
            Ok(()) => {
                info!(channel = self.notifier.name(), "notification sent");
                true
            }
            Err(e) => {
                warn!(channel = self.notifier.name(), error = %e, "notification failed, report is still published");
                false
            }
        }
    }
}
