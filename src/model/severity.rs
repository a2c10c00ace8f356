use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Incoming severity vocabulary. Source systems disagree on the exact words,
/// so `warning` sits alongside the five-level scale at the same rank as `medium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Warning,
    Low,
    #[default]
    Info,
}

impl Severity {
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Low => 1,
            Severity::Medium | Severity::Warning => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Warning => "warning",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// The higher-ranked of the two; `self` wins ties.
    pub fn max_rank(self, other: Severity) -> Severity {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    /// Total parse: unknown words become `Info`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "warning" | "warn" => Ok(Severity::Warning),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Severity::from_label).unwrap_or_default())
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-level severity carried by classified events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

impl AlertSeverity {
    /// Only `critical` survives; everything else is a warning.
    pub fn normalize(incoming: Severity) -> Self {
        match incoming {
            Severity::Critical => AlertSeverity::Critical,
            _ => AlertSeverity::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Critical => "critical",
            AlertSeverity::Warning => "warning",
        }
    }
}

impl From<AlertSeverity> for Severity {
    fn from(s: AlertSeverity) -> Self {
        match s {
            AlertSeverity::Critical => Severity::Critical,
            AlertSeverity::Warning => Severity::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive_and_total() {
        assert_eq!(Severity::from_label("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from_label(" Warning "), Severity::Warning);
        assert_eq!(Severity::from_label("sev1"), Severity::Info);
    }

    #[test]
    fn test_warning_ranks_with_medium() {
        assert_eq!(Severity::Warning.rank(), Severity::Medium.rank());
        assert!(Severity::High.rank() > Severity::Warning.rank());
        assert_eq!(Severity::Medium.max_rank(Severity::Warning), Severity::Medium);
        assert_eq!(Severity::Low.max_rank(Severity::High), Severity::High);
    }

    #[test]
    fn test_normalize_to_alert_grade() {
        assert_eq!(AlertSeverity::normalize(Severity::Critical), AlertSeverity::Critical);
        assert_eq!(AlertSeverity::normalize(Severity::High), AlertSeverity::Warning);
        assert_eq!(AlertSeverity::normalize(Severity::Info), AlertSeverity::Warning);
    }

    #[test]
    fn test_deserialize_null_and_unknown() {
        let s: Severity = serde_json::from_str("null").unwrap();
        assert_eq!(s, Severity::Info);
        let s: Severity = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(s, Severity::Info);
        let s: Severity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(s, Severity::High);
    }
}
