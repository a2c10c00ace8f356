//! Root-cause correlation.
//!
//! Two separate tiers: [`are_related`] is the precise
//! pairwise test, [`correlate`] is a cheap coarse index by namespace and tag.
//! Members of one bucket are not guaranteed to be pairwise related, and no
//! transitive clustering is attempted here.

use crate::dedup::CLUSTER_WIDE;
use crate::model::{EventView, Severity};
use chrono::Duration;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Maximum gap for two differently-named resources to count as related.
pub const DEFAULT_RELATED_WINDOW_SECS: i64 = 60;

/// Upper bound for a configured related window (one day).
pub const MAX_RELATED_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Resource name with its replica/template-hash suffix stripped:
/// last path segment, split on `-`, last two tokens dropped.
pub fn base_name(resource: &str) -> String {
    let last = resource.rsplit('/').next().unwrap_or("");
    let tokens: Vec<&str> = last.split('-').collect();
    if tokens.len() <= 2 {
        return String::new();
    }
    tokens[..tokens.len() - 2].join("-")
}

pub fn are_related<A: EventView, B: EventView>(a: &A, b: &B) -> bool {
    are_related_within(a, b, Duration::seconds(DEFAULT_RELATED_WINDOW_SECS))
}

/// Same resource in the same namespace, or same base name seen within `window`.
///
/// Events without a reliable timestamp take no part in correlation and are
/// never related to anything.
pub fn are_related_within<A: EventView, B: EventView>(a: &A, b: &B, window: Duration) -> bool {
    let (Some(ta), Some(tb)) = (a.timestamp(), b.timestamp()) else {
        return false;
    };
    if a.namespace() != b.namespace() {
        return false;
    }
    if a.resource() == b.resource() {
        return true;
    }
    if (ta - tb).num_milliseconds().abs() >= window.num_milliseconds() {
        return false;
    }
    let base = base_name(a.resource());
    !base.is_empty() && base == base_name(b.resource())
}

/// `namespace:tag` bucket key.
pub fn correlation_key<E: EventView>(event: &E) -> String {
    format!(
        "{}:{}",
        event.namespace().unwrap_or(CLUSTER_WIDE),
        event.tag().unwrap_or("unknown")
    )
}

/// Tighter `namespace:resource:tag` key.
pub fn resource_correlation_key<E: EventView>(event: &E) -> String {
    format!(
        "{}:{}:{}",
        event.namespace().unwrap_or(CLUSTER_WIDE),
        event.resource(),
        event.tag().unwrap_or("unknown")
    )
}

/// Coarse root-cause buckets keyed by [`correlation_key`].
pub fn correlate<E: EventView + Clone>(events: &[E]) -> BTreeMap<String, Vec<E>> {
    correlate_by(events, correlation_key)
}

/// Bucket events by an arbitrary key. Events without a reliable timestamp are left out.
pub fn correlate_by<E, F>(events: &[E], key: F) -> BTreeMap<String, Vec<E>>
where
    E: EventView + Clone,
    F: Fn(&E) -> String,
{
    let mut buckets: BTreeMap<String, Vec<E>> = BTreeMap::new();
    for event in events.iter().filter(|e| e.timestamp().is_some()) {
        buckets.entry(key(event)).or_default().push(event.clone());
    }
    buckets
}

/// Two events that [`are_related_within`] says share a root cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedPair {
    pub first: String,
    pub second: String,
}

/// Every related pair, in input order. Pairwise only; no transitive closure.
/// Untimed events are left out, as in [`correlate_by`].
pub fn related_pairs<E: EventView>(events: &[E], window: Duration) -> Vec<RelatedPair> {
    let timed: Vec<&E> = events.iter().filter(|e| e.timestamp().is_some()).collect();
    let mut pairs = Vec::new();
    for (i, a) in timed.iter().enumerate() {
        for b in &timed[i + 1..] {
            if are_related_within(*a, *b, window) {
                pairs.push(RelatedPair {
                    first: a.id().to_string(),
                    second: b.id().to_string(),
                });
            }
        }
    }
    pairs
}

/// Known cross-event patterns inside one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKind {
    /// Out-of-memory signals alongside pod restarts or crash loops.
    OomRestarts,
    /// A node going unavailable while pods restart.
    NodeScaleErrors,
}

/// A detected pattern with its confidence and the events that carry it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCorrelation {
    pub kind: CorrelationKind,
    pub description: String,
    pub confidence: f64,
    pub event_ids: Vec<String>,
}

const RESTART_TAGS: &[&str] = &["pod_restarted", "pod_crash_loop"];
const NODE_DOWN_TAGS: &[&str] = &["node_unavailable"];

fn has_tag<E: EventView>(event: &E, tags: &[&str]) -> bool {
    event.tag().map_or(false, |t| tags.contains(&t))
}

fn is_oom<E: EventView>(event: &E) -> bool {
    if event.tag() == Some("memory_error") {
        return true;
    }
    let text = event.text_fields().join(" ").to_lowercase();
    text.contains("oom") || text.contains("out of memory")
}

fn ids_with_tag<E: EventView>(events: &[E], tags: &[&str]) -> Vec<String> {
    events
        .iter()
        .filter(|e| has_tag(*e, tags))
        .map(|e| e.id().to_string())
        .collect()
}

/// Patterns present in a bucket, in detection order.
pub fn detect_correlations<E: EventView>(events: &[E]) -> Vec<EventCorrelation> {
    let mut found = Vec::new();
    let restarts = events.iter().any(|e| has_tag(e, RESTART_TAGS));

    if restarts && events.iter().any(|e| is_oom(e)) {
        found.push(EventCorrelation {
            kind: CorrelationKind::OomRestarts,
            description: "Out of Memory errors followed by pod restarts - memory pressure detected".into(),
            confidence: 0.90,
            event_ids: ids_with_tag(events, RESTART_TAGS),
        });
    }
    if restarts && events.iter().any(|e| has_tag(e, NODE_DOWN_TAGS)) {
        found.push(EventCorrelation {
            kind: CorrelationKind::NodeScaleErrors,
            description: "Node scaled down while errors occurred - possible node failure impact".into(),
            confidence: 0.80,
            event_ids: ids_with_tag(events, NODE_DOWN_TAGS),
        });
    }
    found
}

/// Presentation-ready view of one correlation bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationBucket {
    pub key: String,
    pub event_ids: Vec<String>,
    /// Highest member severity, never below `medium`.
    pub severity: Severity,
    pub correlations: Vec<EventCorrelation>,
    /// Description of the strongest correlation, else a keyword hint.
    pub root_cause: String,
    pub summary: String,
}

pub fn summarize_buckets<E: EventView>(buckets: &BTreeMap<String, Vec<E>>) -> Vec<CorrelationBucket> {
    buckets
        .iter()
        .map(|(key, events)| summarize_bucket(key, events))
        .collect()
}

fn summarize_bucket<E: EventView>(key: &str, events: &[E]) -> CorrelationBucket {
    let severity = events
        .iter()
        .map(EventView::severity)
        .fold(Severity::Medium, Severity::max_rank);

    let correlations = detect_correlations(events);
    let root_cause = match strongest(&correlations) {
        Some(c) => c.description.clone(),
        None => keyword_root_cause(events).to_string(),
    };

    let resources: BTreeSet<&str> = events.iter().map(EventView::resource).collect();
    let mut summary = format!("{} events, {} resources affected", events.len(), resources.len());
    let start = events.iter().filter_map(EventView::timestamp).min();
    let end = events.iter().filter_map(EventView::timestamp).max();
    if let (Some(start), Some(end)) = (start, end) {
        summary.push_str(&format!(
            " between {} and {}",
            start.format("%H:%M:%S"),
            end.format("%H:%M:%S")
        ));
    }

    CorrelationBucket {
        key: key.to_string(),
        event_ids: events.iter().map(|e| e.id().to_string()).collect(),
        severity,
        correlations,
        root_cause,
        summary,
    }
}

/// First of the highest-confidence correlations.
fn strongest(correlations: &[EventCorrelation]) -> Option<&EventCorrelation> {
    correlations.iter().fold(None, |best: Option<&EventCorrelation>, c| match best {
        Some(b) if b.confidence >= c.confidence => Some(b),
        _ => Some(c),
    })
}

fn keyword_root_cause<E: EventView>(events: &[E]) -> &'static str {
    let text = events
        .iter()
        .flat_map(|e| e.text_fields())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if text.contains("oom") || text.contains("out of memory") {
        "Memory pressure causing OOM kills"
    } else if text.contains("unhealthy") {
        "Pod health check failures"
    } else if text.contains("not ready") || text.contains("notready") || text.contains("unavailable") {
        "Node unavailability"
    } else {
        "Multiple issues detected"
    }
}
