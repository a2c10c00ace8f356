use super::{build_event, contains_any, search_text, upper_tag};
use crate::model::{ClassifiedEvent, FamilyDetails, IncidentRecord, SecurityType};

const KEYWORDS: &[&str] = &[
    "rbac",
    "unauthorized",
    "forbidden",
    "network policy",
    "networkpolicy",
    "security policy",
    "pod security",
];

const POLICY_KINDS: &[&str] = &["NetworkPolicy", "SecurityPolicy"];

// First match wins, in this order.
const SUBTYPES: &[(SecurityType, &[&str])] = &[
    (SecurityType::PolicyViolation, &["policy violation", "policy_violation", "violates policy"]),
    (SecurityType::RbacViolation, &["rbac", "unauthorized", "forbidden", "clusterrole", "rolebinding"]),
    (SecurityType::NetworkPolicy, &["network policy", "networkpolicy", "network_policy"]),
    (SecurityType::PodSecurity, &["pod security", "pod_security", "podsecurity", "privileged", "securitycontext"]),
];

fn tag_matches(record: &IncidentRecord) -> bool {
    match upper_tag(record) {
        Some(tag) => tag.contains("SECURITY") || tag.contains("RBAC") || tag.contains("POLICY"),
        None => false,
    }
}

fn kind_matches(record: &IncidentRecord) -> bool {
    POLICY_KINDS.contains(&record.kind_or_unknown())
}

pub fn security_type(text: &str) -> SecurityType {
    SUBTYPES
        .iter()
        .find(|(_, keywords)| contains_any(text, keywords))
        .map(|(kind, _)| *kind)
        .unwrap_or(SecurityType::Other)
}

/// RBAC denials, policy violations, and pod-security rejections.
pub fn classify(records: &[IncidentRecord]) -> Vec<ClassifiedEvent> {
    records
        .iter()
        .filter_map(|record| {
            let mut text = search_text(record);
            if !tag_matches(record) && !kind_matches(record) && !contains_any(&text, KEYWORDS) {
                return None;
            }
            text.push(' ');
            text.push_str(&record.kind_or_unknown().to_lowercase());
            Some(build_event(
                record,
                FamilyDetails::Security {
                    security_type: security_type(&text),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::test_support::record;

    #[test]
    fn test_subtype_priority() {
        assert_eq!(security_type("policy violation: forbidden by rbac"), SecurityType::PolicyViolation);
        assert_eq!(security_type("user is forbidden; network policy"), SecurityType::RbacViolation);
        assert_eq!(security_type("networkpolicy denies privileged"), SecurityType::NetworkPolicy);
        assert_eq!(security_type("privileged container rejected"), SecurityType::PodSecurity);
        assert_eq!(security_type("secret rotated"), SecurityType::Other);
    }

    #[test]
    fn test_policy_kind_qualifies() {
        let mut r = record("1", None, "ingress denied");
        r.resource_kind = Some("NetworkPolicy".into());
        let events = classify(&[r]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details, FamilyDetails::Security { security_type: SecurityType::NetworkPolicy });
    }

    #[test]
    fn test_keyword_case_insensitive() {
        let events = classify(&[record("1", None, "User system:anonymous is FORBIDDEN")]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details.subtype(), "rbac_violation");
    }

    #[test]
    fn test_non_matching_dropped() {
        assert!(classify(&[record("1", Some("pod_restarted"), "Back-off restarting")]).is_empty());
    }
}
