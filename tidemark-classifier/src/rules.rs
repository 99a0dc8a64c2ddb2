//! The severity decision table.
//!
//! Rows are scanned top to bottom and the first match wins, so row order is
//! the precedence policy. Add new rows where they belong in that order; never
//! sort this table.

use tidemark_core::types::{Severity, SourceKind};
use tidemark_core::ClassifierConfig;

use crate::signals::ChangeSignals;

/// Predicate signature for a table row.
pub type Predicate = fn(&ChangeSignals, &ClassifierConfig) -> bool;

/// One row of the decision table.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub summary: &'static str,
    pub severity: Severity,
    pub requires_review: bool,
    pub predicate: Predicate,
}

impl Rule {
    pub fn matches(&self, signals: &ChangeSignals, config: &ClassifierConfig) -> bool {
        (self.predicate)(signals, config)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("requires_review", &self.requires_review)
            .finish()
    }
}

/// Name of the catch-all last row.
pub const DEFAULT_RULE: &str = "default";

pub static RULES: &[Rule] = &[
    Rule {
        name: "termination",
        summary: "termination-type change",
        severity: Severity::Critical,
        requires_review: true,
        predicate: termination,
    },
    Rule {
        name: "integration_error",
        summary: "integration or processing error",
        severity: Severity::Critical,
        requires_review: false,
        predicate: integration_error,
    },
    Rule {
        name: "security_change",
        summary: "security, permission, or role change",
        severity: Severity::High,
        requires_review: true,
        predicate: security_change,
    },
    Rule {
        name: "plan_change",
        summary: "plan change",
        severity: Severity::High,
        requires_review: true,
        predicate: plan_change,
    },
    Rule {
        name: "sync_conflict",
        summary: "cross-source sync conflict",
        severity: Severity::High,
        requires_review: true,
        predicate: sync_conflict,
    },
    Rule {
        name: "high_risk_status",
        summary: "status moved into a high-risk value",
        severity: Severity::High,
        requires_review: true,
        predicate: high_risk_status,
    },
    Rule {
        name: "significant_amount_change",
        summary: "amount moved beyond the relative threshold or absolute floor",
        severity: Severity::High,
        requires_review: false,
        predicate: significant_amount_change,
    },
    Rule {
        name: "ownership_change",
        summary: "owner or assignee field changed",
        severity: Severity::Medium,
        requires_review: false,
        predicate: ownership_change,
    },
    Rule {
        name: "new_enrollment",
        summary: "new enrollment created",
        severity: Severity::Medium,
        requires_review: false,
        predicate: new_enrollment,
    },
    Rule {
        name: "new_member",
        summary: "new member record created",
        severity: Severity::Medium,
        requires_review: false,
        predicate: new_member,
    },
    Rule {
        name: "deal_stage_change",
        summary: "deal moved to another pipeline stage",
        severity: Severity::Medium,
        requires_review: false,
        predicate: deal_stage_change,
    },
    Rule {
        name: "status_change",
        summary: "status or stage change",
        severity: Severity::Medium,
        requires_review: false,
        predicate: status_change,
    },
    Rule {
        name: "sensitive_field_change",
        summary: "sensitive field touched",
        severity: Severity::Medium,
        requires_review: true,
        predicate: sensitive_field_change,
    },
    Rule {
        name: "record_created",
        summary: "record created",
        severity: Severity::Low,
        requires_review: false,
        predicate: record_created,
    },
    Rule {
        name: "record_deleted",
        summary: "record deleted",
        severity: Severity::Medium,
        requires_review: true,
        predicate: record_deleted,
    },
    Rule {
        name: "assignment",
        summary: "assignment change",
        severity: Severity::Low,
        requires_review: false,
        predicate: assignment,
    },
    Rule {
        name: DEFAULT_RULE,
        summary: "anything else",
        severity: Severity::Info,
        requires_review: false,
        predicate: always,
    },
];

/// Look up a row by name.
pub fn rule(name: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.name == name)
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

fn termination(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.mentions("terminat")
}

fn integration_error(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.mentions("error") || (s.source == SourceKind::Integration && s.mentions("fail"))
}

fn security_change(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.mentions("security") || s.mentions("permission") || s.mentions("role")
}

fn plan_change(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.mentions("plan") || s.plan_field.is_some()
}

fn sync_conflict(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.mentions("conflict")
}

fn high_risk_status(s: &ChangeSignals, config: &ClassifierConfig) -> bool {
    let Some(status) = &s.status else {
        return false;
    };
    let Some(to) = status.to.as_deref() else {
        return false;
    };
    status.from.as_deref() != Some(to)
        && config
            .high_risk_statuses
            .iter()
            .any(|risky| risky.eq_ignore_ascii_case(to))
}

/// Two branches, kept apart on purpose: relative delta over a positive
/// baseline, or an absolute floor over a zero baseline.
fn significant_amount_change(s: &ChangeSignals, config: &ClassifierConfig) -> bool {
    let Some(amount) = s.amount else {
        return false;
    };
    if amount.from > 0.0 {
        amount
            .relative_delta()
            .is_some_and(|delta| delta > config.amount_relative_threshold)
    } else if amount.from == 0.0 {
        amount.to > config.amount_absolute_floor
    } else {
        false
    }
}

fn ownership_change(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.ownership_field.is_some()
}

fn new_enrollment(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.is_creation && (s.entity_is("enrollment") || s.mentions("enrollment"))
}

fn new_member(s: &ChangeSignals, config: &ClassifierConfig) -> bool {
    s.is_creation && s.entity_is(&config.member_entity_type)
}

fn deal_stage_change(s: &ChangeSignals, config: &ClassifierConfig) -> bool {
    s.entity_is(&config.deal_entity_type) && (s.stage.is_some() || s.mentions("stage"))
}

fn status_change(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.status.is_some() || s.stage.is_some() || s.mentions("status") || s.mentions("stage")
}

fn sensitive_field_change(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    !s.sensitive_fields.is_empty()
}

fn record_created(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.is_creation
}

fn record_deleted(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.is_deletion
}

fn assignment(s: &ChangeSignals, _: &ClassifierConfig) -> bool {
    s.mentions_within("assign")
}

fn always(_: &ChangeSignals, _: &ClassifierConfig) -> bool {
    true
}
