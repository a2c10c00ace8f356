use super::{build_event, contains_any, search_text, split_resource, upper_tag};
use crate::model::{ClassifiedEvent, FamilyDetails, IncidentRecord, PressureType};

const KEYWORDS: &[&str] = &[
    "oom",
    "out of memory",
    "memory pressure",
    "memorypressure",
    "disk pressure",
    "diskpressure",
    "pid pressure",
    "pidpressure",
    "evicted",
];

fn tag_matches(record: &IncidentRecord) -> bool {
    match upper_tag(record) {
        Some(tag) => tag.contains("OOM") || tag.contains("PRESSURE") || tag == "EVICTED",
        None => false,
    }
}

pub fn pressure_type(text: &str) -> PressureType {
    if contains_any(text, &["oom", "out of memory"]) {
        PressureType::OomKilled
    } else if text.contains("memory") {
        PressureType::MemoryPressure
    } else if text.contains("disk") || text.contains("ephemeral-storage") {
        PressureType::DiskPressure
    } else if text.contains("pid") {
        PressureType::PidPressure
    } else {
        PressureType::Other
    }
}

/// Out-of-memory kills and node/pod resource pressure.
pub fn classify(records: &[IncidentRecord]) -> Vec<ClassifiedEvent> {
    records
        .iter()
        .filter_map(|record| {
            let text = search_text(record);
            if !tag_matches(record) && !contains_any(&text, KEYWORDS) {
                return None;
            }
            let (_, container) = split_resource(&record.resource_name);
            Some(build_event(
                record,
                FamilyDetails::ResourcePressure {
                    container: container.map(str::to_string),
                    pressure_type: pressure_type(&text),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::test_support::record;
    use crate::model::{AlertSeverity, Family, Severity};

    #[test]
    fn test_tag_match() {
        let events = classify(&[record("1", Some("oom"), "container terminated")]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].family, Family::ResourcePressure);
        assert_eq!(events[0].resource, "api-7f9-abc");
        match &events[0].details {
            FamilyDetails::ResourcePressure { container, pressure_type } => {
                assert_eq!(container.as_deref(), Some("app"));
                assert_eq!(*pressure_type, PressureType::OomKilled);
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_keyword_fallback() {
        let events = classify(&[record("1", Some("node_condition"), "Node reports DiskPressure")]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details.subtype(), "disk_pressure");
    }

    #[test]
    fn test_severity_normalized() {
        let mut critical = record("1", Some("oom"), "");
        critical.severity = Severity::Critical;
        let high = record("2", Some("oom"), "");
        let events = classify(&[critical, high]);
        assert_eq!(events[0].severity, AlertSeverity::Critical);
        assert_eq!(events[1].severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_pressure_priority() {
        assert_eq!(pressure_type("oomkilled under memory pressure"), PressureType::OomKilled);
        assert_eq!(pressure_type("memorypressure and diskpressure"), PressureType::MemoryPressure);
        assert_eq!(pressure_type("pod evicted"), PressureType::Other);
    }
}
