use super::{build_event, contains_any, search_text, upper_tag};
use crate::model::{ClassifiedEvent, FamilyDetails, IncidentRecord};
use once_cell::sync::Lazy;
use regex::Regex;

/// A transient scale-up must not be reported as stuck at the ceiling.
pub const MIN_DURATION_MINUTES: f64 = 5.0;

const KEYWORDS: &[&str] = &[
    "hpa",
    "horizontalpodautoscaler",
    "autoscaler",
    "max replicas",
    "maximum replicas",
    "maxreplicas",
];

static REPLICAS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:replicas|pods)\b").expect("valid replica pattern"));

static MAX_REPLICAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)max(?:imum)?[\s_-]?replicas\s*(?:of|is|=|:)?\s*(\d+)").expect("valid max replica pattern")
});

fn tag_matches(record: &IncidentRecord) -> bool {
    match upper_tag(record) {
        Some(tag) => tag.contains("HPA") || tag.contains("AUTOSCALER"),
        None => false,
    }
}

/// Replica count stated in the message as `<N> replicas` or `<N> pods`; 0 when absent.
pub fn extract_replicas(message: &str) -> u32 {
    REPLICAS_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Ceiling stated in the message (`max replicas 10`, `maxReplicas: 10`), if any.
pub fn extract_max_replicas(message: &str) -> Option<u32> {
    MAX_REPLICAS_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Minutes between first and last seen. `None` when either timestamp is unreliable.
pub fn duration_minutes(record: &IncidentRecord) -> Option<f64> {
    let first = record.first_seen_at()?;
    let last = record.last_seen_at()?;
    Some((last - first).num_milliseconds() as f64 / 60_000.0)
}

/// Autoscalers pinned at max replicas for at least [`MIN_DURATION_MINUTES`].
pub fn classify(records: &[IncidentRecord]) -> Vec<ClassifiedEvent> {
    classify_with_min_duration(records, MIN_DURATION_MINUTES)
}

pub fn classify_with_min_duration(records: &[IncidentRecord], min_minutes: f64) -> Vec<ClassifiedEvent> {
    records
        .iter()
        .filter_map(|record| {
            if !tag_matches(record) && !contains_any(&search_text(record), KEYWORDS) {
                return None;
            }
            let duration = duration_minutes(record)?;
            if duration < min_minutes {
                tracing::trace!(id = %record.id, duration, "autoscaler below ceiling duration gate");
                return None;
            }
            let message = record.text();
            let current_replicas = extract_replicas(message);
            let max_replicas = extract_max_replicas(message).unwrap_or(current_replicas);
            Some(build_event(
                record,
                FamilyDetails::AutoscalerCeiling {
                    duration_minutes: duration,
                    current_replicas,
                    max_replicas,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::test_support::record;

    fn hpa(first: &str, last: &str, message: &str) -> IncidentRecord {
        let mut r = record("hpa-1", Some("HPA_MAX_REPLICAS"), message);
        r.first_seen = Some(first.into());
        r.last_seen = Some(last.into());
        r
    }

    #[test]
    fn test_duration_gate() {
        let short = hpa("2024-05-01T10:00:00Z", "2024-05-01T10:03:00Z", "running 10 replicas");
        assert!(classify(&[short]).is_empty());

        let long = hpa("2024-05-01T10:00:00Z", "2024-05-01T10:06:00Z", "running 10 replicas");
        let events = classify(&[long]);
        assert_eq!(events.len(), 1);
        match events[0].details {
            FamilyDetails::AutoscalerCeiling { duration_minutes, current_replicas, max_replicas } => {
                assert!((duration_minutes - 6.0).abs() < 1e-9);
                assert_eq!(current_replicas, 10);
                assert_eq!(max_replicas, 10);
            }
            ref other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_exactly_five_minutes_passes() {
        let r = hpa("2024-05-01T10:00:00Z", "2024-05-01T10:05:00Z", "");
        assert_eq!(classify(&[r]).len(), 1);
    }

    #[test]
    fn test_unparsable_timestamp_excluded() {
        let r = hpa("not-a-time", "2024-05-01T10:30:00Z", "10 replicas");
        assert!(classify(&[r]).is_empty());
    }

    #[test]
    fn test_keyword_match_without_tag() {
        let mut r = hpa("2024-05-01T10:00:00Z", "2024-05-01T10:20:00Z", "HorizontalPodAutoscaler at 8 pods");
        r.category = None;
        let events = classify(&[r]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_replica_extraction() {
        assert_eq!(extract_replicas("scaled to 12 replicas"), 12);
        assert_eq!(extract_replicas("currently 4 pods ready"), 4);
        assert_eq!(extract_replicas("at ceiling"), 0);
        assert_eq!(extract_max_replicas("5 replicas, maxReplicas: 5"), Some(5));
        assert_eq!(extract_max_replicas("maximum replicas of 20 reached"), Some(20));
        assert_eq!(extract_max_replicas("scaled up"), None);
    }

    #[test]
    fn test_unknown_replicas_default_to_zero() {
        let r = hpa("2024-05-01T10:00:00Z", "2024-05-01T10:20:00Z", "autoscaler stuck");
        let events = classify(&[r]);
        assert_eq!(
            events[0].details,
            FamilyDetails::AutoscalerCeiling { duration_minutes: 20.0, current_replicas: 0, max_replicas: 0 }
        );
    }
}
