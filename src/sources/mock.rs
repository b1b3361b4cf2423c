//! Fixture-backed feeds for `MOCK_MODE` runs.
//!
//! `config_select_resources.json` holds `{"Results": [ ... ]}` in the shape
//! AWS Config returns (objects or JSON strings), and
//! `cloudtrail_lookup_events.json` holds `{"Events": [ ... ]}` with
//! `ResourceName`, `Username`, `EventName`, `EventTime`, `ReadOnly`.

use super::{AuditEvent, AuditSource, InventoryPage, InventorySource, TimeWindow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const INVENTORY_FIXTURE: &str = "config_select_resources.json";
pub const AUDIT_FIXTURE: &str = "cloudtrail_lookup_events.json";

async fn read_json(path: &Path) -> Result<Value> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading fixture {}", path.display()))?;
    Ok(serde_json::from_str(&data)?)
}

pub struct MockInventory {
    path: PathBuf,
}

impl MockInventory {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(INVENTORY_FIXTURE),
        }
    }
}

#[async_trait]
impl InventorySource for MockInventory {
    fn name(&self) -> &'static str {
        "mock-inventory"
    }

    async fn fetch_page(&self, _next_token: Option<String>) -> Result<InventoryPage> {
        let parsed = read_json(&self.path).await?;
        let mut results = vec![];
        if let Some(arr) = parsed["Results"].as_array() {
            for r in arr {
                results.push(match r {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            }
        }
        Ok(InventoryPage {
            results,
            next_token: None,
        })
    }
}

pub struct MockAudit {
    path: PathBuf,
}

impl MockAudit {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(AUDIT_FIXTURE),
        }
    }
}

#[async_trait]
impl AuditSource for MockAudit {
    fn name(&self) -> &'static str {
        "mock-audit"
    }

    async fn lookup(&self, resource_id: &str, window: &TimeWindow) -> Result<Vec<AuditEvent>> {
        let parsed = read_json(&self.path).await?;
        let mut out = vec![];
        if let Some(arr) = parsed["Events"].as_array() {
            for e in arr {
                if e["ResourceName"].as_str() != Some(resource_id) {
                    continue;
                }
                let Some(event_time) = e["EventTime"]
                    .as_str()
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(|t| t.with_timezone(&Utc))
                else {
                    continue;
                };
                if !window.contains(event_time) {
                    continue;
                }
                out.push(AuditEvent {
                    actor: e["Username"].as_str().map(|s| s.to_string()),
                    event_name: e["EventName"].as_str().map(|s| s.to_string()),
                    event_time,
                    read_only: e["ReadOnly"].as_str() == Some("true"),
                });
            }
        }
        Ok(out)
    }
}
