//! Maps raw inventory results into [`ResourceRecord`]s.
//!
//! The input is what AWS Config's advanced query returns: one JSON document
//! per resource, with a `configuration` blob whose shape depends on the
//! resource type. Anything type-specific ends up in `extra`.

use crate::model::ResourceRecord;
use chrono::{DateTime, Utc};
use serde_json::{Map as JsonMap, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub const UNKNOWN: &str = "unknown";

/// State reported for types that have no lifecycle status of their own.
pub const DEFAULT_STATE: &str = "Active";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Normalized {
    pub records: Vec<ResourceRecord>,
    pub skipped: usize,
}

impl Normalized {
    pub fn extend(&mut self, other: Normalized) {
        self.records.extend(other.records);
        self.skipped += other.skipped;
    }
}

/// Normalizes one page. Malformed entries are skipped and counted.
pub fn normalize(raw_page: &[String]) -> Normalized {
    let mut out = Normalized::default();
    for (idx, raw) in raw_page.iter().enumerate() {
        match normalize_one(raw) {
            Some(r) => out.records.push(r),
            None => {
                debug!(index = idx, "skipping malformed inventory record");
                out.skipped += 1;
            }
        }
    }
    out
}

fn normalize_one(raw: &str) -> Option<ResourceRecord> {
    let doc: Value = serde_json::from_str(raw).ok()?;
    let obj = doc.as_object()?;

    let resource_id = non_empty_str(obj, "resourceId")?;
    let resource_type = non_empty_str(obj, "resourceType")?;
    let region = non_empty_str(obj, "awsRegion").unwrap_or_else(|| UNKNOWN.to_string());

    let configuration = configuration_of(obj);
    let (state, mut extra) = type_details(&resource_type, &configuration);

    if let Some(arn) = non_empty_str(obj, "arn") {
        extra.insert("arn".into(), arn);
    }

    Some(ResourceRecord {
        resource_id,
        resource_type,
        region,
        state,
        created_at: timestamp(obj, "resourceCreationTime"),
        last_modified_at: timestamp(obj, "configurationItemCaptureTime"),
        tags: tags_of(obj.get("tags")),
        extra,
    })
}

fn non_empty_str(obj: &JsonMap<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn timestamp(obj: &JsonMap<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let raw = obj.get(key)?.as_str()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            debug!(field = key, value = raw, error = %e, "unparseable timestamp");
            None
        }
    }
}

fn configuration_of(obj: &JsonMap<String, Value>) -> Value {
    match obj.get("configuration") {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::Null),
        Some(v) => v.clone(),
        None => Value::Null,
    }
}

/// Config reports tags as `[{"key":..,"value":..}]`; plain maps are accepted too.
fn tags_of(v: Option<&Value>) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    match v {
        Some(Value::Object(m)) => {
            for (k, v) in m {
                tags.insert(k.clone(), scalar_to_string(v));
            }
        }
        Some(Value::Array(items)) => {
            for t in items {
                let k = t.get("key").or_else(|| t.get("Key")).and_then(Value::as_str);
                let v = t.get("value").or_else(|| t.get("Value"));
                if let Some(k) = k {
                    tags.insert(k.to_string(), v.map(scalar_to_string).unwrap_or_default());
                }
            }
        }
        _ => {}
    }
    tags
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn type_details(resource_type: &str, cfg: &Value) -> (String, BTreeMap<String, String>) {
    let mut extra = BTreeMap::new();
    let mut pick = |name: &str, pointer: &str| {
        if let Some(v) = cfg.pointer(pointer).filter(|v| !v.is_null()) {
            extra.insert(name.to_string(), scalar_to_string(v));
        }
    };

    let state_at = match resource_type {
        "AWS::EC2::Instance" => {
            pick("InstanceType", "/instanceType");
            Some("/state/name")
        }
        "AWS::EC2::Volume" => {
            pick("VolumeType", "/volumeType");
            pick("Size", "/size");
            Some("/state")
        }
        "AWS::Lambda::Function" => {
            pick("Runtime", "/runtime");
            Some("/state")
        }
        "AWS::RDS::DBInstance" => {
            pick("Engine", "/engine");
            pick("DBInstanceClass", "/dBInstanceClass");
            Some("/dBInstanceStatus")
        }
        _ => None,
    };

    let state = match state_at {
        Some(p) => cfg
            .pointer(p)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string(),
        None => DEFAULT_STATE.to_string(),
    };
    (state, extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> String {
        v.to_string()
    }

    #[test]
    fn ec2_instance_with_embedded_configuration() {
        let page = vec![raw(json!({
            "resourceId": "i-0123456789abcdef0",
            "resourceType": "AWS::EC2::Instance",
            "awsRegion": "ap-northeast-2",
            "arn": "arn:aws:ec2:ap-northeast-2:111122223333:instance/i-0123456789abcdef0",
            "configurationItemCaptureTime": "2025-09-29T12:00:00.000Z",
            "resourceCreationTime": "2025-09-01T08:30:00Z",
            "configurationItemStatus": "OK",
            "tags": [{"key": "env", "value": "dev"}, {"key": "team", "value": "data"}],
            "configuration": json!({"instanceType": "t3.medium", "state": {"name": "running"}}).to_string()
        }))];

        let out = normalize(&page);
        assert_eq!(out.skipped, 0);
        let r = &out.records[0];
        assert_eq!(r.resource_id, "i-0123456789abcdef0");
        assert_eq!(r.state, "running");
        assert_eq!(r.extra.get("InstanceType").map(String::as_str), Some("t3.medium"));
        assert!(r.extra.contains_key("arn"));
        assert_eq!(r.tags.get("team").map(String::as_str), Some("data"));
        assert_eq!(
            r.created_at.map(|t| t.to_rfc3339()),
            Some("2025-09-01T08:30:00+00:00".to_string())
        );
        assert!(r.last_modified_at.is_some());
    }

    #[test]
    fn untyped_resources_default_to_active() {
        let out = normalize(&[raw(json!({
            "resourceId": "demo-bucket",
            "resourceType": "AWS::S3::Bucket",
            "awsRegion": "us-east-1",
            "tags": {"owner": "platform"}
        }))]);
        let r = &out.records[0];
        assert_eq!(r.state, DEFAULT_STATE);
        assert_eq!(r.tags.get("owner").map(String::as_str), Some("platform"));
        assert!(r.created_at.is_none());
        assert!(r.extra.is_empty());
    }

    #[test]
    fn known_type_without_state_is_unknown() {
        let out = normalize(&[raw(json!({
            "resourceId": "fn-report",
            "resourceType": "AWS::Lambda::Function",
            "configuration": {"runtime": "python3.12"}
        }))]);
        let r = &out.records[0];
        assert_eq!(r.state, UNKNOWN);
        assert_eq!(r.region, UNKNOWN);
        assert_eq!(r.extra.get("Runtime").map(String::as_str), Some("python3.12"));
    }

    #[test]
    fn malformed_records_are_counted_not_fatal() {
        let page = vec![
            "{not json".to_string(),
            raw(json!({"resourceType": "AWS::EC2::Instance"})),
            raw(json!(["array", "root"])),
            raw(json!({"resourceId": "", "resourceType": "AWS::S3::Bucket"})),
            raw(json!({"resourceId": "vol-1", "resourceType": "AWS::EC2::Volume",
                       "configuration": {"state": "in-use", "volumeType": "gp3", "size": 100}})),
        ];
        let out = normalize(&page);
        assert_eq!(out.skipped, 4);
        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.state, "in-use");
        assert_eq!(r.extra.get("Size").map(String::as_str), Some("100"));
    }

    #[test]
    fn bad_timestamp_becomes_absent() {
        let out = normalize(&[raw(json!({
            "resourceId": "db-1",
            "resourceType": "AWS::RDS::DBInstance",
            "resourceCreationTime": "yesterday",
            "configuration": {"dBInstanceStatus": "available", "engine": "postgres"}
        }))]);
        let r = &out.records[0];
        assert!(r.created_at.is_none());
        assert_eq!(r.state, "available");
        assert_eq!(r.extra.get("Engine").map(String::as_str), Some("postgres"));
    }
}
