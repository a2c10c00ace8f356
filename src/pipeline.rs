//! The full classify -> dedup -> escalate -> correlate pass.
//!
//! Every run recomputes from its own input snapshot; nothing is carried over
//! between runs. Hosts that poll or stream decide what snapshot to pass and
//! whether to serialize overlapping runs.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::classify::{classify_all, ClassifyOptions, FamilyEvents};
use crate::config::SieveConfig;
use crate::correlate::{
    correlate_by, correlation_key, related_pairs, resource_correlation_key, summarize_buckets,
    CorrelationBucket, RelatedPair, MAX_RELATED_WINDOW_SECS,
};
use crate::dedup::{deduplicate, DeduplicatedEvent};
use crate::filter::{matches_event, EventFilter, QueryFilter};
use crate::model::{ClassifiedEvent, EventView, IncidentRecord};
use crate::severity::escalate;
use crate::summary::Summary;

/// Everything one run hands to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Records considered after window capping and filtering.
    pub input_records: usize,
    pub classified: FamilyEvents,
    /// Classified events across all families, deduplicated.
    pub alerts: Vec<DeduplicatedEvent<ClassifiedEvent>>,
    /// Raw records deduplicated, with escalated severity on the representative.
    pub events: Vec<DeduplicatedEvent<IncidentRecord>>,
    pub buckets: Vec<CorrelationBucket>,
    /// Aggregates likely sharing a root cause, pairwise.
    pub related: Vec<RelatedPair>,
    pub summary: Summary,
}

/// Optional scoping for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub query: Option<QueryFilter>,
    /// Navigation filter; only records it matches are kept.
    pub filter: Option<EventFilter>,
    /// Overrides the configured dedup window.
    pub window_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: SieveConfig,
}

impl Pipeline {
    pub fn new(config: SieveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SieveConfig {
        &self.config
    }

    pub fn run(&self, records: &[IncidentRecord]) -> PipelineReport {
        self.run_with(records, &RunOptions::default())
    }

    pub fn run_with(&self, records: &[IncidentRecord], options: &RunOptions) -> PipelineReport {
        let run_id = Uuid::new_v4();
        let window_minutes = options.window_minutes.unwrap_or(self.config.dedup.window_minutes);

        let mut input = cap_window(
            records,
            self.config.dedup.max_events,
            self.config.dedup.retention_minutes,
        );
        if let Some(query) = options.query.as_ref().filter(|q| !q.is_empty()) {
            input = query.apply(&input);
        }
        if let Some(filter) = &options.filter {
            input.retain(|r| matches_event(r, Some(filter)));
        }
        debug!(%run_id, received = records.len(), kept = input.len(), "input window prepared");

        let classified = classify_all(&input, ClassifyOptions::from(&self.config.classify));
        let all_classified: Vec<ClassifiedEvent> = classified.iter().cloned().collect();
        let alerts = deduplicate(&all_classified, window_minutes);

        let mut events = deduplicate(&input, window_minutes);
        let mut escalated = 0usize;
        for aggregate in &mut events {
            let severity = escalate(&*aggregate);
            if severity != aggregate.event.severity {
                escalated += 1;
                aggregate.event.severity = severity;
            }
        }

        let buckets = if self.config.correlate.per_resource {
            correlate_by(&events, resource_correlation_key)
        } else {
            correlate_by(&events, correlation_key)
        };
        let buckets = summarize_buckets(&buckets);
        let related = related_pairs(
            &events,
            Duration::seconds(
                self.config
                    .correlate
                    .related_window_secs
                    .clamp(1, MAX_RELATED_WINDOW_SECS),
            ),
        );

        let summary = Summary::build(&events, &classified);
        info!(
            %run_id,
            records = input.len(),
            classified = classified.len(),
            aggregates = events.len(),
            escalated,
            buckets = buckets.len(),
            related = related.len(),
            "pipeline run complete"
        );

        PipelineReport {
            run_id,
            generated_at: Utc::now(),
            input_records: input.len(),
            classified,
            alerts,
            events,
            buckets,
            related,
            summary,
        }
    }
}

/// Bound the input before the grouping stages run.
///
/// Keeps records within `retention_minutes` of the newest timestamp (0 keeps
/// all), then the newest `max_events`. Records without a reliable timestamp
/// are kept by the retention step and rank oldest for the count cap.
pub fn cap_window(records: &[IncidentRecord], max_events: usize, retention_minutes: u32) -> Vec<IncidentRecord> {
    let newest = records.iter().filter_map(EventView::timestamp).max();
    let mut kept: Vec<&IncidentRecord> = match newest {
        Some(newest) if retention_minutes > 0 => {
            let cutoff = newest - Duration::minutes(i64::from(retention_minutes));
            records
                .iter()
                .filter(|r| r.timestamp().map_or(true, |ts| ts >= cutoff))
                .collect()
        }
        _ => records.iter().collect(),
    };

    if kept.len() > max_events {
        kept.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        kept.truncate(max_events);
    }
    let dropped = records.len() - kept.len();
    if dropped > 0 {
        debug!(dropped, max_events, retention_minutes, "capped input window");
    }
    kept.into_iter().cloned().collect()
}
