//! Counts handed to the presentation layer alongside the event lists.

use crate::classify::FamilyEvents;
use crate::dedup::DeduplicatedEvent;
use crate::model::EventView;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Aggregates after deduplication.
    pub total: usize,
    /// Occurrences represented by those aggregates.
    pub occurrences: u64,
    /// Aggregates per (escalated) severity.
    pub by_severity: BTreeMap<String, usize>,
    /// Classified events per family.
    pub by_family: BTreeMap<String, usize>,
    /// Classified events per `family/subtype`.
    pub by_subtype: BTreeMap<String, usize>,
    /// Classified events per alert severity.
    pub alerts_by_severity: BTreeMap<String, usize>,
}

impl Summary {
    pub fn build<E: EventView>(deduplicated: &[DeduplicatedEvent<E>], classified: &FamilyEvents) -> Self {
        let mut summary = Summary {
            total: deduplicated.len(),
            occurrences: deduplicated.iter().map(|d| u64::from(d.count)).sum(),
            ..Default::default()
        };
        for d in deduplicated {
            *summary
                .by_severity
                .entry(d.severity().as_str().to_string())
                .or_default() += 1;
        }
        for event in classified.iter() {
            *summary.by_family.entry(event.family.to_string()).or_default() += 1;
            *summary
                .by_subtype
                .entry(format!("{}/{}", event.family, event.details.subtype()))
                .or_default() += 1;
            *summary
                .alerts_by_severity
                .entry(event.severity.as_str().to_string())
                .or_default() += 1;
        }
        summary
    }
}
