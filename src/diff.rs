use crate::error::{ReportError, Side};
use crate::model::{ChangeRecord, Classification, ResourceKey, ResourceRecord, Snapshot};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

const NONE: &str = "<none>";

/// Classifies every key in `previous ∪ current`.
///
/// Output is sorted by `(resource_type, region, resource_id)`. A missing
/// previous snapshot makes everything `Created`. Duplicate keys on either
/// side are an integrity failure and abort the diff.
pub fn diff(
    previous: Option<&Snapshot>,
    current: &[ResourceRecord],
) -> Result<Vec<ChangeRecord>, ReportError> {
    let prev = index(previous.map(|s| s.resources.as_slice()).unwrap_or(&[]), Side::Previous)?;
    let cur = index(current, Side::Current)?;

    let keys: BTreeSet<&ResourceKey> = prev.keys().chain(cur.keys()).collect();
    let mut out = Vec::with_capacity(keys.len());

    for key in keys {
        let change = match (prev.get(key), cur.get(key)) {
            (None, Some(now)) => ChangeRecord::new((*now).clone(), Classification::Created),
            (Some(before), None) => ChangeRecord::new((*before).clone(), Classification::Deleted),
            (Some(before), Some(now)) => {
                let deltas = field_deltas(before, now);
                if deltas.is_empty() {
                    ChangeRecord::new((*now).clone(), Classification::Existing)
                } else {
                    let mut c = ChangeRecord::new((*now).clone(), Classification::Modified);
                    c.change_summary = Some(deltas.join("; "));
                    c
                }
            }
            (None, None) => continue,
        };
        out.push(change);
    }
    Ok(out)
}

fn index(records: &[ResourceRecord], side: Side) -> Result<BTreeMap<ResourceKey, &ResourceRecord>, ReportError> {
    let mut map = BTreeMap::new();
    for r in records {
        let key = r.key();
        if map.contains_key(&key) {
            return Err(ReportError::DuplicateKey { side, key });
        }
        map.insert(key, r);
    }
    Ok(map)
}

// map fields are reported per key as `field[key]`
fn field_deltas(before: &ResourceRecord, after: &ResourceRecord) -> Vec<String> {
    let mut out = Vec::new();
    if before.state != after.state {
        out.push(format!("state: {} -> {}", before.state, after.state));
    }
    map_deltas("tags", &before.tags, &after.tags, &mut out);
    if before.last_modified_at != after.last_modified_at {
        out.push(format!(
            "last_modified_at: {} -> {}",
            ts(before.last_modified_at),
            ts(after.last_modified_at)
        ));
    }
    map_deltas("extra", &before.extra, &after.extra, &mut out);
    out
}

fn map_deltas(
    field: &str,
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
    out: &mut Vec<String>,
) {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    for k in keys {
        let (b, a) = (before.get(k), after.get(k));
        if b != a {
            out.push(format!(
                "{field}[{k}]: {} -> {}",
                b.map(String::as_str).unwrap_or(NONE),
                a.map(String::as_str).unwrap_or(NONE)
            ));
        }
    }
}

fn ts(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_else(|| NONE.to_string())
}


#[cfg(test)]
mod props {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn arb_record() -> impl Strategy<Value = ResourceRecord> {
        (
            prop::sample::select(vec!["AWS::EC2::Instance", "AWS::S3::Bucket", "AWS::Lambda::Function"]),
            prop::sample::select(vec!["us-east-1", "ap-northeast-2"]),
            "[a-z0-9]{1,6}",
            prop::sample::select(vec!["running", "stopped", "Active"]),
            prop::collection::btree_map("[a-z]{1,3}", "[a-z]{0,3}", 0..3),
        )
            .prop_map(|(t, region, id, state, tags)| ResourceRecord {
                resource_id: id,
                resource_type: t.to_string(),
                region: region.to_string(),
                state: state.to_string(),
                created_at: None,
                last_modified_at: None,
                tags,
                extra: BTreeMap::new(),
            })
    }

    fn arb_inventory() -> impl Strategy<Value = Vec<ResourceRecord>> {
        prop::collection::vec(arb_record(), 0..24).prop_map(|v| {
            let mut seen = HashSet::new();
            v.into_iter().filter(|r| seen.insert(r.key())).collect()
        })
    }

    fn as_snapshot(resources: Vec<ResourceRecord>) -> Snapshot {
        Snapshot {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            taken_at: Utc::now(),
            resources,
        }
    }

    proptest! {
        #[test]
        fn unchanged_inventory_is_all_existing(inv in arb_inventory()) {
            let prev = as_snapshot(inv.clone());
            let out = diff(Some(&prev), &inv).unwrap();
            prop_assert_eq!(out.len(), inv.len());
            prop_assert!(out.iter().all(|c| c.classification == Classification::Existing));
        }

        #[test]
        fn no_previous_is_all_created(inv in arb_inventory()) {
            let out = diff(None, &inv).unwrap();
            prop_assert_eq!(out.len(), inv.len());
            prop_assert!(out.iter().all(|c| c.classification == Classification::Created));
        }

        #[test]
        fn one_change_per_key_and_deletions_carry_prior_data(
            prev in arb_inventory(),
            cur in arb_inventory(),
        ) {
            let out = diff(Some(&as_snapshot(prev.clone())), &cur).unwrap();
            let union: HashSet<ResourceKey> =
                prev.iter().chain(cur.iter()).map(ResourceRecord::key).collect();
            prop_assert_eq!(out.len(), union.len());

            let cur_keys: HashSet<ResourceKey> = cur.iter().map(ResourceRecord::key).collect();
            for p in prev.iter().filter(|p| !cur_keys.contains(&p.key())) {
                let hits: Vec<_> = out.iter().filter(|c| c.resource.key() == p.key()).collect();
                prop_assert_eq!(hits.len(), 1);
                prop_assert_eq!(hits[0].classification, Classification::Deleted);
                prop_assert_eq!(&hits[0].resource, p);
            }

            let keys: Vec<ResourceKey> = out.iter().map(|c| c.resource.key()).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            prop_assert_eq!(keys, sorted);
        }
    }
}
