use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const UNKNOWN_ACTOR: &str = "unknown";

/// One tracked resource at a point in time, already normalized.
///
/// `tags` and `extra` are ordered maps so that serialized snapshots and
/// rendered rows do not depend on the order the feed reported them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub resource_id: String,
    pub resource_type: String, // "AWS::EC2::Instance" ...
    pub region: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ResourceRecord {
    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            resource_type: self.resource_type.clone(),
            region: self.region.clone(),
            resource_id: self.resource_id.clone(),
        }
    }
}

/// Identity of a resource within one snapshot.
///
/// Field order drives the derived `Ord`, which is the report ordering:
/// `(resource_type, region, resource_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub resource_type: String,
    pub region: String,
    pub resource_id: String,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.resource_type, self.region, self.resource_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub date: NaiveDate,
    pub taken_at: DateTime<Utc>,
    pub resources: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    Created,
    Modified,
    Deleted,
    Existing,
}

impl Classification {
    /// Report grouping order.
    pub const ALL: [Classification; 4] = [
        Classification::Created,
        Classification::Modified,
        Classification::Deleted,
        Classification::Existing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Created => "Created",
            Classification::Modified => "Modified",
            Classification::Deleted => "Deleted",
            Classification::Existing => "Existing",
        }
    }

    pub fn fill_rgb(&self) -> u32 {
        match self {
            Classification::Created => 0xC6EFCE,
            Classification::Modified => 0xFFEB9C,
            Classification::Deleted => 0xFFC7CE,
            Classification::Existing => 0xB6D7FF,
        }
    }

    pub fn color_name(&self) -> &'static str {
        match self {
            Classification::Created => "Green",
            Classification::Modified => "Yellow",
            Classification::Deleted => "Red",
            Classification::Existing => "Blue",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub resource: ResourceRecord,
    pub classification: Classification,
    pub actor: String,
    pub change_summary: Option<String>,
}

impl ChangeRecord {
    pub fn new(resource: ResourceRecord, classification: Classification) -> Self {
        Self {
            resource,
            classification,
            actor: UNKNOWN_ACTOR.to_string(),
            change_summary: None,
        }
    }

    /// Only these classifications are attributed to an actor.
    pub fn needs_attribution(&self) -> bool {
        !matches!(self.classification, Classification::Existing)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
    pub existing: usize,
}

impl Summary {
    pub fn from_changes(changes: &[ChangeRecord]) -> Self {
        let mut s = Summary::default();
        for c in changes {
            match c.classification {
                Classification::Created => s.created += 1,
                Classification::Modified => s.modified += 1,
                Classification::Deleted => s.deleted += 1,
                Classification::Existing => s.existing += 1,
            }
        }
        s
    }

    pub fn count(&self, classification: Classification) -> usize {
        match classification {
            Classification::Created => self.created,
            Classification::Modified => self.modified,
            Classification::Deleted => self.deleted,
            Classification::Existing => self.existing,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.modified + self.deleted + self.existing
    }

    pub fn to_text(&self) -> String {
        Classification::ALL
            .iter()
            .map(|c| format!("{}: {}", c, self.count(*c)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
