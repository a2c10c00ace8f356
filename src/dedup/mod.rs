//! Collapse near-duplicate events into aggregates.
//!
//! Events sharing a key (`namespace:resource:tag`) are merged when they are
//! linked by a chain of pairwise gaps of at most the window. This is the same
//! grouping as testing every pair within a key, but computed by sorting each
//! key's members and scanning gaps, so the cost is O(n log n) instead of O(n²).
//! It is never fixed-origin bucketing: two events can share a group through a
//! third one even when they are further apart than the window.

use crate::model::{EventView, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_WINDOW_MINUTES: u32 = 5;

/// Namespace placeholder for cluster-scoped events.
pub const CLUSTER_WIDE: &str = "cluster-wide";

/// One aggregate per group. Rebuilt from scratch on every pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeduplicatedEvent<E> {
    /// The earliest member of the group.
    pub event: E,
    /// Number of members in the group.
    pub duplicate_count: usize,
    /// Sum of every member's own count.
    pub count: u32,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    /// Ids of the other members, oldest first.
    pub related_events: Vec<String>,
}

impl<E: EventView> EventView for DeduplicatedEvent<E> {
    fn id(&self) -> &str {
        self.event.id()
    }

    fn namespace(&self) -> Option<&str> {
        self.event.namespace()
    }

    fn resource(&self) -> &str {
        self.event.resource()
    }

    fn kind(&self) -> Option<&str> {
        self.event.kind()
    }

    fn tag(&self) -> Option<&str> {
        self.event.tag()
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_seen.or_else(|| self.event.timestamp())
    }

    fn count(&self) -> u32 {
        self.count
    }

    fn severity(&self) -> Severity {
        self.event.severity()
    }

    fn text_fields(&self) -> Vec<&str> {
        self.event.text_fields()
    }
}

pub fn dedup_key<E: EventView>(event: &E) -> String {
    format!(
        "{}:{}:{}",
        event.namespace().unwrap_or(CLUSTER_WIDE),
        event.resource(),
        event.tag().unwrap_or("")
    )
}

/// Group near-duplicates within `window_minutes` of each other.
///
/// Output is ordered by `duplicate_count` descending, then by the representative's
/// own timestamp, most recent first.
/// Events without a reliable timestamp are never merged; each becomes its own aggregate.
pub fn deduplicate<E: EventView + Clone>(events: &[E], window_minutes: u32) -> Vec<DeduplicatedEvent<E>> {
    let window = Duration::minutes(i64::from(window_minutes));

    // Key order follows first appearance so equal-ranked output stays stable.
    let mut key_order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, Vec<(DateTime<Utc>, &E)>> = HashMap::new();
    let mut untimed: Vec<&E> = Vec::new();

    for event in events {
        let Some(ts) = event.timestamp() else {
            untimed.push(event);
            continue;
        };
        let key = dedup_key(event);
        by_key
            .entry(key.clone())
            .or_insert_with(|| {
                key_order.push(key);
                Vec::new()
            })
            .push((ts, event));
    }

    let mut output = Vec::with_capacity(events.len());
    for key in &key_order {
        let Some(mut members) = by_key.remove(key) else {
            continue;
        };
        members.sort_by_key(|(ts, _)| *ts);

        let mut group: Vec<(DateTime<Utc>, &E)> = Vec::new();
        for member in members {
            if let Some((prev, _)) = group.last() {
                if member.0 - *prev > window {
                    output.push(aggregate(&group));
                    group.clear();
                }
            }
            group.push(member);
        }
        if !group.is_empty() {
            output.push(aggregate(&group));
        }
    }

    output.extend(untimed.into_iter().map(|event| DeduplicatedEvent {
        event: event.clone(),
        duplicate_count: 1,
        count: event.count(),
        first_seen: None,
        last_seen: None,
        related_events: Vec::new(),
    }));

    output.sort_by(|a, b| {
        b.duplicate_count
            .cmp(&a.duplicate_count)
            .then_with(|| b.event.timestamp().cmp(&a.event.timestamp()))
    });

    tracing::debug!(
        input = events.len(),
        output = output.len(),
        window_minutes,
        "deduplicated events"
    );
    output
}

fn aggregate<E: EventView + Clone>(group: &[(DateTime<Utc>, &E)]) -> DeduplicatedEvent<E> {
    let (first_seen, representative) = group[0];
    let last_seen = group[group.len() - 1].0;
    DeduplicatedEvent {
        event: representative.clone(),
        duplicate_count: group.len(),
        count: group.iter().map(|(_, e)| e.count()).sum(),
        first_seen: Some(first_seen),
        last_seen: Some(last_seen),
        related_events: group[1..].iter().map(|(_, e)| e.id().to_string()).collect(),
    }
}
