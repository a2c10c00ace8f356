use super::{build_event, contains_any, search_text, upper_tag};
use crate::model::{ClassifiedEvent, DriftType, FamilyDetails, IncidentRecord};

const KEYWORDS: &[&str] = &["drift", "configuration mismatch", "out of sync", "does not match"];

// First match wins, in this order.
const SUBTYPES: &[(DriftType, &[&str])] = &[
    (DriftType::Configuration, &["configuration", "config"]),
    (DriftType::Resource, &["resource", "limits", "requests", "replicas"]),
    (DriftType::Annotation, &["annotation"]),
    (DriftType::Label, &["label"]),
];

fn tag_matches(record: &IncidentRecord) -> bool {
    match upper_tag(record) {
        Some(tag) => tag.contains("DRIFT") || tag == "OUT_OF_SYNC",
        None => false,
    }
}

pub fn drift_type(text: &str) -> DriftType {
    SUBTYPES
        .iter()
        .find(|(_, keywords)| contains_any(text, keywords))
        .map(|(kind, _)| *kind)
        .unwrap_or(DriftType::Other)
}

/// Live state diverging from its declared configuration.
pub fn classify(records: &[IncidentRecord]) -> Vec<ClassifiedEvent> {
    records
        .iter()
        .filter_map(|record| {
            let text = search_text(record);
            if !tag_matches(record) && !contains_any(&text, KEYWORDS) {
                return None;
            }
            Some(build_event(
                record,
                FamilyDetails::Drift {
                    drift_type: drift_type(&text),
                },
            ))
        })
        .collect()
}
