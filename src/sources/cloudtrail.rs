use super::{AuditEvent, AuditSource, TimeWindow};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_cloudtrail as ct;
use ct::primitives::DateTime as SmithyDateTime;
use ct::types::{LookupAttribute, LookupAttributeKey};
use chrono::{DateTime, Utc};

/// Upper bound on pages walked per lookup. Events come newest first, so the
/// first pages are the ones that matter.
const MAX_PAGES: usize = 5;

pub struct CloudTrailAudit {
    client: ct::Client,
}

impl CloudTrailAudit {
    pub fn new(conf: &aws_config::SdkConfig) -> Self {
        Self {
            client: ct::Client::new(conf),
        }
    }

    fn to_smithy(t: DateTime<Utc>) -> SmithyDateTime {
        SmithyDateTime::from_secs(t.timestamp())
    }

    fn to_chrono(t: &SmithyDateTime) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(t.secs(), t.subsec_nanos())
    }
}

#[async_trait]
impl AuditSource for CloudTrailAudit {
    fn name(&self) -> &'static str {
        "cloudtrail"
    }

    async fn lookup(&self, resource_id: &str, window: &TimeWindow) -> Result<Vec<AuditEvent>> {
        let attr = LookupAttribute::builder()
            .attribute_key(LookupAttributeKey::ResourceName)
            .attribute_value(resource_id)
            .build()
            .map_err(|e| anyhow!("lookup attribute: {e}"))?;

        let mut out = Vec::new();
        let mut token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let resp = self
                .client
                .lookup_events()
                .lookup_attributes(attr.clone())
                .start_time(Self::to_smithy(window.start))
                .end_time(Self::to_smithy(window.end))
                .set_next_token(token.take())
                .send()
                .await?;

            for e in resp.events() {
                let Some(event_time) = e.event_time().and_then(Self::to_chrono) else {
                    continue;
                };
                out.push(AuditEvent {
                    actor: e.username().map(|s| s.to_string()),
                    event_name: e.event_name().map(|s| s.to_string()),
                    event_time,
                    // CloudTrail reports "true"/"false"; absent means a write.
                    read_only: e.read_only().map(|r| r.eq_ignore_ascii_case("true")).unwrap_or(false),
                });
            }

            token = resp.next_token().map(|s| s.to_string());
            if token.is_none() {
                break;
            }
        }
        Ok(out)
    }
}
