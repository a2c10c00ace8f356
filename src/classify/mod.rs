//! Per-family classifiers.
//!
//! Each family is evaluated independently over the full record list, so one raw
//! record may show up in more than one family. Matching prefers the structured
//! tag and falls back to keyword search over the free text. Classifiers never
//! fail: a record that does not match is simply left out of that family.

pub mod autoscaler;
pub mod drift;
pub mod resource_pressure;
pub mod security;

use crate::model::{AlertSeverity, ClassifiedEvent, FamilyDetails, IncidentRecord};
use serde::Serialize;

/// Output of running every classifier over the same input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FamilyEvents {
    pub resource_pressure: Vec<ClassifiedEvent>,
    pub autoscaler_ceiling: Vec<ClassifiedEvent>,
    pub drift: Vec<ClassifiedEvent>,
    pub security: Vec<ClassifiedEvent>,
}

impl FamilyEvents {
    pub fn len(&self) -> usize {
        self.resource_pressure.len()
            + self.autoscaler_ceiling.len()
            + self.drift.len()
            + self.security.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All classified events, family by family.
    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedEvent> {
        self.resource_pressure
            .iter()
            .chain(self.autoscaler_ceiling.iter())
            .chain(self.drift.iter())
            .chain(self.security.iter())
    }
}

/// Knobs for the classifiers that have any.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyOptions {
    /// Minimum time an autoscaler must sit at its ceiling before it is reported.
    pub autoscaler_min_duration_minutes: f64,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            autoscaler_min_duration_minutes: autoscaler::MIN_DURATION_MINUTES,
        }
    }
}

pub fn classify_all(records: &[IncidentRecord], options: ClassifyOptions) -> FamilyEvents {
    let events = FamilyEvents {
        resource_pressure: resource_pressure::classify(records),
        autoscaler_ceiling: autoscaler::classify_with_min_duration(
            records,
            options.autoscaler_min_duration_minutes,
        ),
        drift: drift::classify(records),
        security: security::classify(records),
    };
    tracing::debug!(
        records = records.len(),
        resource_pressure = events.resource_pressure.len(),
        autoscaler_ceiling = events.autoscaler_ceiling.len(),
        drift = events.drift.len(),
        security = events.security.len(),
        "classified records"
    );
    events
}

/// Split `resourceName` into primary resource and optional sub-resource (e.g. container).
pub fn split_resource(resource_name: &str) -> (&str, Option<&str>) {
    let mut parts = resource_name.splitn(3, '/');
    let primary = parts.next().unwrap_or("");
    let sub = parts.next().filter(|s| !s.is_empty());
    (primary, sub)
}

/// Case-insensitive match of any keyword inside already lower-cased text.
pub(crate) fn contains_any(lowered: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lowered.contains(k))
}

/// Upper-cased structured tag, if the record has one.
pub(crate) fn upper_tag(record: &IncidentRecord) -> Option<String> {
    record.tag().map(|t| t.to_ascii_uppercase())
}

/// Lower-cased message/description text plus the tag, for keyword and sub-type search.
pub(crate) fn search_text(record: &IncidentRecord) -> String {
    let mut text = String::new();
    if let Some(tag) = record.tag() {
        text.push_str(tag);
        text.push(' ');
    }
    if let Some(message) = record.message.as_deref() {
        text.push_str(message);
        text.push(' ');
    }
    if let Some(description) = record.description.as_deref() {
        text.push_str(description);
    }
    text.to_lowercase()
}

/// Common fields shared by all families.
pub(crate) fn build_event(record: &IncidentRecord, details: FamilyDetails) -> ClassifiedEvent {
    let (primary, _) = split_resource(&record.resource_name);
    let first_seen = record.first_seen_at();
    let last_seen = record.last_seen_at();
    ClassifiedEvent {
        id: record.id.clone(),
        family: details.family(),
        resource: primary.to_string(),
        namespace: record.namespace_or_default().to_string(),
        kind: record.kind_or_unknown().to_string(),
        severity: AlertSeverity::normalize(record.severity),
        timestamp: last_seen.or(first_seen),
        message: record.text().to_string(),
        count: record.count_or_one(),
        first_seen,
        last_seen,
        details,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::{IncidentRecord, Severity};

    pub fn record(id: &str, tag: Option<&str>, message: &str) -> IncidentRecord {
        IncidentRecord {
            id: id.to_string(),
            category: tag.map(str::to_string),
            severity: Severity::High,
            namespace: Some("prod".into()),
            resource_name: "api-7f9-abc/app".into(),
            resource_kind: Some("Pod".into()),
            message: Some(message.to_string()),
            first_seen: Some("2024-05-01T10:00:00Z".into()),
            last_seen: Some("2024-05-01T10:10:00Z".into()),
            ..Default::default()
        }
    }
}
