//! Text-driven severity escalation.
//!
//! Two ordered tiers are evaluated over the lower-cased category, description
//! and title. The critical tier is checked first; the high tier only when no
//! critical rule matched. The result is never below the event's own severity.

use crate::model::{EventView, Severity};

/// A rule matches when every one of its clauses has at least one keyword in the text.
struct Rule {
    name: &'static str,
    clauses: &'static [&'static [&'static str]],
}

impl Rule {
    fn matches(&self, text: &str) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.iter().any(|k| text.contains(k)))
    }
}

const NETWORK: &[&str] = &["network", "cni", "dns", "connection"];
const FAILURE: &[&str] = &["fail", "error", "refused", "timeout", "unreachable"];

const CRITICAL_RULES: &[Rule] = &[
    Rule {
        name: "sandbox",
        clauses: &[&["sandbox", "failed to create pod", "failedcreate"]],
    },
    Rule {
        name: "node-not-ready",
        clauses: &[&["nodenotready", "node not ready", "node_unavailable", "node is not ready"]],
    },
    Rule {
        name: "oom",
        clauses: &[&["oomkilled", "out of memory", "oom"]],
    },
    Rule {
        name: "crash-loop",
        clauses: &[&["crashloop", "crash loop", "crash_loop"]],
    },
    Rule {
        name: "image-pull",
        clauses: &[&["imagepull", "errimagepull", "image pull", "pull image"]],
    },
    Rule {
        name: "network-failure",
        clauses: &[NETWORK, FAILURE],
    },
];

const HIGH_RULES: &[Rule] = &[
    Rule {
        name: "pod-failed",
        clauses: &[&["pod"], &["failed"]],
    },
    Rule {
        name: "deployment-failed",
        clauses: &[&["deployment"], &["failed"]],
    },
    Rule {
        name: "replicaset-failed",
        clauses: &[&["replicaset"], &["failed"]],
    },
    Rule {
        name: "unhealthy",
        clauses: &[&["unhealthy"]],
    },
];

/// Restarts only escalate once they repeat more than this many times.
pub const RESTART_COUNT_THRESHOLD: u32 = 5;

fn escalation_text<E: EventView>(event: &E) -> String {
    event.text_fields().join(" ").to_lowercase()
}

/// Name of the first rule that fires, with the severity it implies.
pub fn matched_rule<E: EventView>(event: &E) -> Option<(&'static str, Severity)> {
    let text = escalation_text(event);
    if let Some(rule) = CRITICAL_RULES.iter().find(|r| r.matches(&text)) {
        return Some((rule.name, Severity::Critical));
    }
    if let Some(rule) = HIGH_RULES.iter().find(|r| r.matches(&text)) {
        return Some((rule.name, Severity::High));
    }
    if text.contains("restart") && event.count() > RESTART_COUNT_THRESHOLD {
        return Some(("repeated-restart", Severity::High));
    }
    None
}

/// Severity after applying the escalation rules. Never lower than the input.
pub fn escalate<E: EventView>(event: &E) -> Severity {
    let original = event.severity();
    match matched_rule(event) {
        Some((rule, severity)) => {
            let escalated = original.max_rank(severity);
            if escalated != original {
                tracing::trace!(id = event.id(), rule, from = %original, to = %escalated, "escalated severity");
            }
            escalated
        }
        None => original,
    }
}
