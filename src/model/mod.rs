//! Incident records, classified events, and the view trait shared by every stage.

pub mod severity;

pub use self::severity::{AlertSeverity, Severity};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace used when a record carries none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Resource kind used when a record carries none.
pub const UNKNOWN_KIND: &str = "Unknown";

/// Parse an RFC 3339 timestamp. Anything unparsable is treated as "no reliable timestamp".
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// A raw incident as produced by the ingestion layer. The engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default, alias = "resourceName", alias = "resource")]
    pub resource_name: String,
    #[serde(default, alias = "resourceKind", alias = "kind")]
    pub resource_kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "firstSeen")]
    pub first_seen: Option<String>,
    #[serde(default, alias = "lastSeen")]
    pub last_seen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, alias = "occurrences")]
    pub count: Option<u32>,
}

impl IncidentRecord {
    /// Structured tag: `category` if present, else `type`.
    pub fn tag(&self) -> Option<&str> {
        self.category
            .as_deref()
            .or(self.event_type.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn namespace_or_default(&self) -> &str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => DEFAULT_NAMESPACE,
        }
    }

    pub fn kind_or_unknown(&self) -> &str {
        match self.resource_kind.as_deref() {
            Some(kind) if !kind.is_empty() => kind,
            _ => UNKNOWN_KIND,
        }
    }

    pub fn count_or_one(&self) -> u32 {
        self.count.unwrap_or(1).max(1)
    }

    /// Free text of the record: message, falling back to description.
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.description.as_deref())
            .unwrap_or("")
    }

    pub fn first_seen_at(&self) -> Option<DateTime<Utc>> {
        self.first_seen
            .as_deref()
            .or(self.timestamp.as_deref())
            .and_then(parse_timestamp)
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen
            .as_deref()
            .or(self.timestamp.as_deref())
            .and_then(parse_timestamp)
    }
}

/// The incident families this engine recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    ResourcePressure,
    AutoscalerCeiling,
    Drift,
    Security,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::ResourcePressure => "resource_pressure",
            Family::AutoscalerCeiling => "autoscaler_ceiling",
            Family::Drift => "drift",
            Family::Security => "security",
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureType {
    OomKilled,
    MemoryPressure,
    DiskPressure,
    PidPressure,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    Configuration,
    Resource,
    Annotation,
    Label,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityType {
    PolicyViolation,
    RbacViolation,
    NetworkPolicy,
    PodSecurity,
    Other,
}

/// Family-specific attributes of a classified event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FamilyDetails {
    ResourcePressure {
        container: Option<String>,
        pressure_type: PressureType,
    },
    AutoscalerCeiling {
        /// Fixed at classification time from the record's own first/last seen.
        duration_minutes: f64,
        /// 0 means the message did not state a replica count.
        current_replicas: u32,
        max_replicas: u32,
    },
    Drift {
        drift_type: DriftType,
    },
    Security {
        security_type: SecurityType,
    },
}

impl FamilyDetails {
    pub fn family(&self) -> Family {
        match self {
            FamilyDetails::ResourcePressure { .. } => Family::ResourcePressure,
            FamilyDetails::AutoscalerCeiling { .. } => Family::AutoscalerCeiling,
            FamilyDetails::Drift { .. } => Family::Drift,
            FamilyDetails::Security { .. } => Family::Security,
        }
    }

    /// Sub-type label used in summaries.
    pub fn subtype(&self) -> &'static str {
        match self {
            FamilyDetails::ResourcePressure { pressure_type, .. } => match pressure_type {
                PressureType::OomKilled => "oom_killed",
                PressureType::MemoryPressure => "memory_pressure",
                PressureType::DiskPressure => "disk_pressure",
                PressureType::PidPressure => "pid_pressure",
                PressureType::Other => "other",
            },
            FamilyDetails::AutoscalerCeiling { .. } => "at_ceiling",
            FamilyDetails::Drift { drift_type } => match drift_type {
                DriftType::Configuration => "configuration",
                DriftType::Resource => "resource",
                DriftType::Annotation => "annotation",
                DriftType::Label => "label",
                DriftType::Other => "other",
            },
            FamilyDetails::Security { security_type } => match security_type {
                SecurityType::PolicyViolation => "policy_violation",
                SecurityType::RbacViolation => "rbac_violation",
                SecurityType::NetworkPolicy => "network_policy",
                SecurityType::PodSecurity => "pod_security",
                SecurityType::Other => "other",
            },
        }
    }
}

/// A record recognized as one family, normalized to alert-grade severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub id: String,
    pub family: Family,
    /// Primary resource (first `/` segment of the record's resource name).
    pub resource: String,
    pub namespace: String,
    pub kind: String,
    pub severity: AlertSeverity,
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
    pub count: u32,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub details: FamilyDetails,
}

/// Read-only view over anything the dedup, escalation and correlation stages consume.
pub trait EventView {
    fn id(&self) -> &str;
    /// `None` for cluster-scoped events.
    fn namespace(&self) -> Option<&str>;
    fn resource(&self) -> &str;
    fn kind(&self) -> Option<&str>;
    /// Category, type, or family.
    fn tag(&self) -> Option<&str>;
    fn timestamp(&self) -> Option<DateTime<Utc>>;
    fn count(&self) -> u32;
    fn severity(&self) -> Severity;
    /// Text searched by the escalator and the correlation hints.
    ///
    /// Raw records expose tag, description, message and title. Classified
    /// events keep only the family name and the message they were built from.
    fn text_fields(&self) -> Vec<&str>;
}

impl EventView for IncidentRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    fn resource(&self) -> &str {
        &self.resource_name
    }

    fn kind(&self) -> Option<&str> {
        self.resource_kind.as_deref().filter(|k| !k.is_empty())
    }

    fn tag(&self) -> Option<&str> {
        IncidentRecord::tag(self)
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at().or_else(|| self.first_seen_at())
    }

    fn count(&self) -> u32 {
        self.count_or_one()
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn text_fields(&self) -> Vec<&str> {
        let mut fields = Vec::with_capacity(4);
        if let Some(tag) = IncidentRecord::tag(self) {
            fields.push(tag);
        }
        fields.extend(self.description.as_deref());
        fields.extend(self.message.as_deref());
        fields.extend(self.title.as_deref());
        fields
    }
}

impl EventView for ClassifiedEvent {
    fn id(&self) -> &str {
        &self.id
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn resource(&self) -> &str {
        &self.resource
    }

    fn kind(&self) -> Option<&str> {
        Some(&self.kind)
    }

    fn tag(&self) -> Option<&str> {
        Some(self.family.as_str())
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn count(&self) -> u32 {
        self.count
    }

    fn severity(&self) -> Severity {
        self.severity.into()
    }

    fn text_fields(&self) -> Vec<&str> {
        vec![self.family.as_str(), &self.message]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults() {
        let record: IncidentRecord = serde_json::from_str(r#"{"id": "a", "resourceName": "web"}"#).unwrap();
        assert_eq!(record.namespace_or_default(), "default");
        assert_eq!(record.kind_or_unknown(), "Unknown");
        assert_eq!(record.count_or_one(), 1);
        assert_eq!(record.severity, Severity::Info);
    }

    #[test]
    fn test_record_aliases() {
        let record: IncidentRecord = serde_json::from_str(
            r#"{"id": "a", "type": "HPA_MAX", "occurrences": 4, "lastSeen": "2024-05-01T10:00:00Z", "resource": "api/web"}"#,
        )
        .unwrap();
        assert_eq!(record.tag(), Some("HPA_MAX"));
        assert_eq!(record.count_or_one(), 4);
        assert_eq!(record.resource_name, "api/web");
        assert!(record.last_seen_at().is_some());
    }

    #[test]
    fn test_category_preferred_over_type() {
        let record = IncidentRecord {
            category: Some("oom".into()),
            event_type: Some("application".into()),
            ..Default::default()
        };
        assert_eq!(IncidentRecord::tag(&record), Some("oom"));
    }

    #[test]
    fn test_malformed_timestamp_is_none() {
        assert!(parse_timestamp("yesterday-ish").is_none());
        assert!(parse_timestamp("2024-05-01T10:00:00+02:00").is_some());
    }

    #[test]
    fn test_text_fields_per_view() {
        let record = IncidentRecord {
            category: Some("pod_failed".into()),
            title: Some("Pod failed".into()),
            description: Some("readiness".into()),
            message: Some("Back-off".into()),
            ..Default::default()
        };
        assert_eq!(record.text_fields(), vec!["pod_failed", "readiness", "Back-off", "Pod failed"]);
    }

    #[test]
    fn test_text_falls_back_to_description() {
        let record = IncidentRecord {
            description: Some("disk pressure".into()),
            ..Default::default()
        };
        assert_eq!(record.text(), "disk pressure");
    }
}
