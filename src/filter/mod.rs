//! Event scoping: the one-shot navigation filter and query-style filters.

use crate::model::{EventView, IncidentRecord, Severity, DEFAULT_NAMESPACE};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Resource/namespace/kind scope handed over by a cross-page navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub resource: String,
    pub namespace: String,
    #[serde(default)]
    pub kind: String,
}

/// Whether an event falls inside the filter.
///
/// Namespace must match exactly. Resources match when either contains the
/// other, so partial names survive navigation. An empty kind on either side
/// matches any kind. With no filter set this is always false; callers decide
/// separately whether filtering is active.
pub fn matches(
    event_resource: &str,
    event_namespace: &str,
    event_kind: Option<&str>,
    filter: Option<&EventFilter>,
) -> bool {
    let Some(filter) = filter else {
        return false;
    };
    if event_namespace != filter.namespace {
        return false;
    }
    let resource_match =
        event_resource.contains(filter.resource.as_str()) || filter.resource.contains(event_resource);
    if !resource_match {
        return false;
    }
    match event_kind.filter(|k| !k.is_empty()) {
        Some(kind) if !filter.kind.is_empty() => kind == filter.kind,
        _ => true,
    }
}

/// [`matches`] over any event view; a missing namespace is compared as `default`.
pub fn matches_event<E: EventView>(event: &E, filter: Option<&EventFilter>) -> bool {
    matches(
        event.resource(),
        event.namespace().unwrap_or(DEFAULT_NAMESPACE),
        event.kind(),
        filter,
    )
}

/// Caller-owned key-value home for the navigation filter.
pub trait FilterStore: Send + Sync {
    fn get(&self) -> Option<EventFilter>;
    fn set(&self, filter: EventFilter);
    fn clear(&self);

    /// Read and clear in one step; the navigation filter applies once.
    fn take(&self) -> Option<EventFilter> {
        let filter = self.get();
        if filter.is_some() {
            self.clear();
        }
        filter
    }
}

#[derive(Debug, Default)]
pub struct MemoryFilterStore {
    slot: Mutex<Option<EventFilter>>,
}

impl MemoryFilterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilterStore for MemoryFilterStore {
    fn get(&self) -> Option<EventFilter> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, filter: EventFilter) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(filter);
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn take(&self) -> Option<EventFilter> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Query filter over raw records. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub category: Option<String>,
    pub severity: Option<Severity>,
    pub namespace: Option<String>,
    /// Drop events older than this; events with no reliable timestamp are dropped too.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl QueryFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &IncidentRecord) -> bool {
        if let Some(t) = &self.event_type {
            if record.event_type.as_deref() != Some(t.as_str()) {
                return false;
            }
        }
        if let Some(c) = &self.category {
            if record.category.as_deref() != Some(c.as_str()) {
                return false;
            }
        }
        if let Some(s) = self.severity {
            if record.severity != s {
                return false;
            }
        }
        if let Some(ns) = &self.namespace {
            if record.namespace.as_deref() != Some(ns.as_str()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            match record.timestamp() {
                Some(ts) if ts >= since => {}
                _ => return false,
            }
        }
        true
    }

    pub fn apply(&self, records: &[IncidentRecord]) -> Vec<IncidentRecord> {
        records
            .iter()
            .filter(|r| self.matches(r))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Fixed-origin timeline buckets keyed by RFC 3339 bucket start.
///
/// Only for timeline views; deduplication never uses fixed buckets.
pub fn group_by_time<E: EventView + Clone>(events: &[E], period: Duration) -> BTreeMap<String, Vec<E>> {
    let mut groups: BTreeMap<String, Vec<E>> = BTreeMap::new();
    for event in events {
        let Some(ts) = event.timestamp() else {
            continue;
        };
        let Ok(start) = ts.duration_trunc(period) else {
            continue;
        };
        groups.entry(start.to_rfc3339()).or_default().push(event.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(resource: &str, namespace: &str, kind: &str) -> EventFilter {
        EventFilter {
            resource: resource.into(),
            namespace: namespace.into(),
            kind: kind.into(),
        }
    }

    #[test]
    fn test_partial_resource_with_kind_wildcard() {
        let f = filter("checkout", "prod", "");
        assert!(matches("checkout-7d8f9-xk2p1", "prod", Some("Pod"), Some(&f)));
    }

    #[test]
    fn test_missing_namespace_matches_default() {
        let record = IncidentRecord {
            id: "a".into(),
            resource_name: "checkout-7d8f9-xk2p1".into(),
            ..Default::default()
        };
        assert!(matches_event(&record, Some(&filter("checkout", "default", ""))));
        assert!(!matches_event(&record, Some(&filter("checkout", "prod", ""))));
    }

    #[test]
    fn test_containment_is_bidirectional() {
        let f = filter("checkout-7d8f9-xk2p1", "prod", "");
        assert!(matches("checkout", "prod", None, Some(&f)));
        assert!(!matches("payments", "prod", None, Some(&f)));
    }

    #[test]
    fn test_namespace_exact() {
        let f = filter("checkout", "prod", "");
        assert!(!matches("checkout", "production", None, Some(&f)));
    }

    #[test]
    fn test_kind_rules() {
        let f = filter("web", "prod", "Pod");
        assert!(matches("web", "prod", Some("Pod"), Some(&f)));
        assert!(matches("web", "prod", None, Some(&f)));
        assert!(!matches("web", "prod", Some("Deployment"), Some(&f)));
    }

    #[test]
    fn test_no_filter_never_matches() {
        assert!(!matches("web", "prod", None, None));
    }

    #[test]
    fn test_store_take_is_one_shot() {
        let store = MemoryFilterStore::new();
        assert!(store.take().is_none());
        store.set(filter("web", "prod", ""));
        assert_eq!(store.get().map(|f| f.resource), Some("web".to_string()));
        assert!(store.take().is_some());
        assert!(store.get().is_none());
    }

    fn rec(id: &str, ns: &str, severity: Severity, at: &str) -> IncidentRecord {
        IncidentRecord {
            id: id.into(),
            category: Some("pod_failed".into()),
            event_type: Some("application".into()),
            severity,
            namespace: Some(ns.into()),
            last_seen: Some(at.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_query_filter() {
        let records = vec![
            rec("a", "prod", Severity::High, "2024-05-01T10:00:00Z"),
            rec("b", "prod", Severity::Low, "2024-05-01T10:00:00Z"),
            rec("c", "dev", Severity::High, "2024-05-01T10:00:00Z"),
            rec("d", "prod", Severity::High, "2024-05-01T08:00:00Z"),
            rec("e", "prod", Severity::High, "n/a"),
        ];
        let q = QueryFilter {
            namespace: Some("prod".into()),
            severity: Some(Severity::High),
            since: Some("2024-05-01T09:00:00Z".parse().unwrap()),
            ..Default::default()
        };
        let ids: Vec<_> = q.apply(&records).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a"]);

        let limited = QueryFilter { limit: Some(2), ..Default::default() };
        assert_eq!(limited.apply(&records).len(), 2);
        assert!(QueryFilter::default().is_empty());
    }

    #[test]
    fn test_group_by_time() {
        let records = vec![
            rec("a", "prod", Severity::High, "2024-05-01T10:01:00Z"),
            rec("b", "prod", Severity::High, "2024-05-01T10:14:59Z"),
            rec("c", "prod", Severity::High, "2024-05-01T10:15:00Z"),
            rec("d", "prod", Severity::High, "bad"),
        ];
        let groups = group_by_time(&records, Duration::minutes(15));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["2024-05-01T10:00:00+00:00"].len(), 2);
        assert_eq!(groups["2024-05-01T10:15:00+00:00"].len(), 1);
    }
}
