//! Attributes changes to the identity that made them.
//!
//! Attribution is best effort. Any failure to reach the audit source, after
//! its retry budget, yields [`UNKNOWN_ACTOR`] for that resource only.

use crate::config::RetryPolicy;
use crate::model::{ChangeRecord, UNKNOWN_ACTOR};
use crate::retry::with_backoff;
use crate::sources::{AuditEvent, AuditSource, TimeWindow};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct IdentityResolver {
    source: Arc<dyn AuditSource>,
    window: TimeWindow,
    retry: RetryPolicy,
    // resource_id -> actor, for this run only
    cache: Mutex<HashMap<String, String>>,
}

impl IdentityResolver {
    pub fn new(source: Arc<dyn AuditSource>, window: TimeWindow, retry: RetryPolicy) -> Self {
        Self {
            source,
            window,
            retry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Actor of the most recent write/delete event on `resource_id` inside
    /// the run window, or `"unknown"`.
    pub async fn resolve(&self, resource_id: &str) -> String {
        if let Some(hit) = self.cache.lock().await.get(resource_id) {
            return hit.clone();
        }

        let actor = match with_backoff(&self.retry, "audit lookup", || {
            self.source.lookup(resource_id, &self.window)
        })
        .await
        {
            Ok(events) => match latest_writer(&events, &self.window) {
                Some((actor, event)) => {
                    debug!(resource_id, actor, event = event.unwrap_or("-"), "attributed");
                    actor.to_string()
                }
                None => {
                    debug!(resource_id, "no audit event in window");
                    UNKNOWN_ACTOR.to_string()
                }
            },
            Err(e) => {
                warn!(resource_id, source = self.source.name(), error = %e, "audit lookup failed, actor unknown");
                UNKNOWN_ACTOR.to_string()
            }
        };

        self.cache
            .lock()
            .await
            .insert(resource_id.to_string(), actor.clone());
        actor
    }

    /// Fills `actor` on every change that needs attribution, resolving
    /// distinct resource ids on at most `concurrency` lookups at a time.
    pub async fn attribute(&self, changes: &mut [ChangeRecord], concurrency: usize) {
        let ids: BTreeSet<String> = changes
            .iter()
            .filter(|c| c.needs_attribution())
            .map(|c| c.resource.resource_id.clone())
            .collect();

        let resolved: HashMap<String, String> = stream::iter(ids)
            .map(|id| async move {
                let actor = self.resolve(&id).await;
                (id, actor)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut unknown = 0usize;
        for c in changes.iter_mut().filter(|c| c.needs_attribution()) {
            if let Some(actor) = resolved.get(&c.resource.resource_id) {
                c.actor = actor.clone();
            }
            if c.actor == UNKNOWN_ACTOR {
                unknown += 1;
            }
        }
        info!(lookups = resolved.len(), unknown, "attribution complete");
    }
}

/// Last-writer attribution: newest non read-only event in the window wins.
fn latest_writer<'a>(events: &'a [AuditEvent], window: &TimeWindow) -> Option<(&'a str, Option<&'a str>)> {
    events
        .iter()
        .filter(|e| !e.read_only && window.contains(e.event_time))
        .filter(|e| e.actor.as_deref().is_some_and(|a| !a.is_empty()))
        .max_by_key(|e| e.event_time)
        .and_then(|e| Some((e.actor.as_deref()?, e.event_name.as_deref())))
}
