//! Read-only feeds the report is built from: the resource inventory and the
//! audit-event log.

pub mod config_query;
pub mod cloudtrail;
pub mod mock;

use crate::config::RetryPolicy;
use crate::error::ReportError;
use crate::normalize::{normalize, Normalized};
use crate::retry::with_backoff;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct InventoryPage {
    pub results: Vec<String>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait InventorySource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_page(&self, next_token: Option<String>) -> Result<InventoryPage>;
}

/// Half-open window `(start, end]` audit events are matched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t > self.start && t <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub actor: Option<String>,
    pub event_name: Option<String>,
    pub event_time: DateTime<Utc>,
    pub read_only: bool,
}

#[async_trait]
pub trait AuditSource: Send + Sync {
    fn name(&self) -> &'static str;
    /// Events referencing `resource_id` in `window`. May be empty.
    async fn lookup(&self, resource_id: &str, window: &TimeWindow) -> Result<Vec<AuditEvent>>;
}

/// Walks every inventory page and normalizes it.
///
/// Each page is retried on its own; running out of attempts on any page
/// fails the whole collection rather than returning a partial inventory.
pub async fn collect_inventory(
    source: &dyn InventorySource,
    retry: &RetryPolicy,
) -> Result<Normalized, ReportError> {
    let mut out = Normalized::default();
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = with_backoff(retry, "inventory page", || source.fetch_page(token.clone()))
            .await
            .map_err(|e| ReportError::FeedExhausted {
                attempts: retry.max_attempts,
                source: e,
            })?;
        pages += 1;

        let normalized = normalize(&page.results);
        debug!(
            source = source.name(),
            page = pages,
            records = normalized.records.len(),
            skipped = normalized.skipped,
            "inventory page normalized"
        );
        out.extend(normalized);

        token = page.next_token.filter(|t| !t.is_empty());
        if token.is_none() {
            break;
        }
    }

    info!(
        source = source.name(),
        pages,
        records = out.records.len(),
        skipped = out.skipped,
        "inventory collected"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Two pages; the second fails `flaky` times before answering.
    struct PagedSource {
        flaky: u32,
        failures: AtomicU32,
    }

    #[async_trait]
    impl InventorySource for PagedSource {
        fn name(&self) -> &'static str {
            "paged"
        }

        async fn fetch_page(&self, next_token: Option<String>) -> Result<InventoryPage> {
            match next_token.as_deref() {
                None => Ok(InventoryPage {
                    results: vec![
                        json!({"resourceId": "a", "resourceType": "AWS::S3::Bucket"}).to_string(),
                        "garbage".to_string(),
                    ],
                    next_token: Some("p2".into()),
                }),
                Some("p2") => {
                    if self.failures.fetch_add(1, Ordering::SeqCst) < self.flaky {
                        return Err(anyhow!("ThrottlingException"));
                    }
                    Ok(InventoryPage {
                        results: vec![json!({"resourceId": "b", "resourceType": "AWS::S3::Bucket"})
                            .to_string()],
                        next_token: None,
                    })
                }
                Some(other) => Err(anyhow!("unexpected token {other}")),
            }
        }
    }

    fn retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_step: Duration::from_millis(10),
            call_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn follows_pages_and_retries_transient_failures() {
        let src = PagedSource { flaky: 2, failures: AtomicU32::new(0) };
        let out = collect_inventory(&src, &retry(3)).await.unwrap();
        let ids: Vec<_> = out.records.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(out.skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_page_fails_the_collection() {
        let src = PagedSource { flaky: 5, failures: AtomicU32::new(0) };
        let err = collect_inventory(&src, &retry(3)).await.unwrap_err();
        assert!(matches!(err, ReportError::FeedExhausted { attempts: 3, .. }));
    }

    #[test]
    fn window_is_open_at_start_closed_at_end() {
        let start = Utc::now();
        let end = start + chrono::Duration::hours(24);
        let w = TimeWindow { start, end };
        assert!(!w.contains(start));
        assert!(w.contains(end));
        assert!(w.contains(start + chrono::Duration::minutes(1)));
        assert!(!w.contains(end + chrono::Duration::seconds(1)));
    }
}
