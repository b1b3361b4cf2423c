//! One report run, end to end.
//!
//! Nothing is persisted until the inventory is complete, the diff has
//! succeeded and the workbook is rendered. The report goes out first and the
//! snapshot last; if the snapshot cannot be saved the report is retracted.
//! Today's snapshot therefore only exists for a run whose report was
//! published, and a failed run leaves the next one diffing against the same
//! prior snapshot.

use crate::config::RetryPolicy;
use crate::diff::diff;
use crate::error::ReportError;
use crate::identity::IdentityResolver;
use crate::model::{ChangeRecord, ResourceRecord, Snapshot, Summary};
use crate::out::Notification;
use crate::publish::ReportPublisher;
use crate::render::render;
use crate::sources::{collect_inventory, AuditSource, InventorySource, TimeWindow};
use crate::store::SnapshotStore;
use chrono::{DateTime, Days, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

pub struct Pipeline {
    pub inventory: Arc<dyn InventorySource>,
    pub audit: Arc<dyn AuditSource>,
    pub snapshots: SnapshotStore,
    pub publisher: ReportPublisher,
    pub retry: RetryPolicy,
    pub resolve_concurrency: usize,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: &'static str,
    pub report_date: NaiveDate,
    pub report_key: String,
    pub url: String,
    pub previous_snapshot: Option<NaiveDate>,
    pub resources_tracked: usize,
    pub skipped_records: usize,
    pub summary: Summary,
    pub notified: bool,
    pub expired: usize,
    /// Attributed change set, in diff order.
    #[serde(skip)]
    pub changes: Vec<ChangeRecord>,
}

impl Pipeline {
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunOutcome, ReportError> {
        let date = now.date_naive();
        self.run_inner(now)
            .instrument(info_span!("report_run", %date))
            .await
    }

    async fn run_inner(&self, now: DateTime<Utc>) -> Result<RunOutcome, ReportError> {
        let date = now.date_naive();
        let cutoff = date
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
            .ok_or_else(|| {
                ReportError::Config(format!("retention of {} days is out of range", self.retention_days))
            })?;

        let previous = self.snapshots.latest_before(date).await?;
        match &previous {
            Some(p) => info!(previous = %p.date, resources = p.resources.len(), "prior snapshot loaded"),
            None => info!("no prior snapshot, every resource will be reported as created"),
        }

        let inventory = collect_inventory(self.inventory.as_ref(), &self.retry).await?;
        let mut current = inventory.records;
        current.sort_by_key(ResourceRecord::key);

        let mut changes = diff(previous.as_ref(), &current)?;
        let summary = Summary::from_changes(&changes);
        info!(
            created = summary.created,
            modified = summary.modified,
            deleted = summary.deleted,
            existing = summary.existing,
            "diff complete"
        );

        let window = TimeWindow {
            start: previous
                .as_ref()
                .map(|p| p.taken_at)
                .unwrap_or_else(|| now - ChronoDuration::hours(24)),
            end: now,
        };
        let resolver = IdentityResolver::new(self.audit.clone(), window, self.retry);
        resolver.attribute(&mut changes, self.resolve_concurrency).await;

        let rendered = render(&changes, date)?;

        let published = self.publisher.publish(date, rendered.bytes).await?;

        let snapshot = Snapshot {
            date,
            taken_at: now,
            resources: current,
        };
        if let Err(e) = self.snapshots.save(&snapshot).await {
            self.publisher.retract(&published.key).await;
            return Err(e);
        }

        let expired = self.snapshots.expire(cutoff).await + self.publisher.expire(cutoff).await;

        let notification = Notification {
            report_date: date,
            report_key: published.key.clone(),
            url: published.url.clone(),
            link_ttl_hours: self.publisher.link_ttl().as_secs() / 3600,
            summary: rendered.summary,
            generated_at: Utc::now(),
        };
        let notified = self.publisher.notify(&notification).await;

        Ok(RunOutcome {
            status: "SUCCESS",
            report_date: date,
            report_key: published.key,
            url: published.url,
            previous_snapshot: previous.map(|p| p.date),
            resources_tracked: changes.len(),
            skipped_records: inventory.skipped,
            summary: rendered.summary,
            notified,
            expired,
            changes,
        })
    }
}
