//! Typed view over a change's loosely-shaped inputs.
//!
//! The decision table never looks at raw JSON. Everything a predicate needs is
//! extracted here once per call; anything that fails to parse is simply
//! absent, so a malformed diff makes rules *not match* rather than error.

use serde_json::Value;

use tidemark_core::types::{ChangeDiff, FieldChange, SourceKind};
use tidemark_core::ClassifierConfig;

/// Input to [`crate::classify`]. Borrowed so callers need not clone.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    pub change_type: &'a str,
    pub entity_type: &'a str,
    pub source: SourceKind,
    pub diff: Option<&'a ChangeDiff>,
    pub payload: Option<&'a Value>,
}

impl<'a> ClassifyInput<'a> {
    pub fn new(change_type: &'a str, entity_type: &'a str, source: SourceKind) -> Self {
        Self {
            change_type,
            entity_type,
            source,
            diff: None,
            payload: None,
        }
    }

    pub fn with_diff(mut self, diff: &'a ChangeDiff) -> Self {
        self.diff = Some(diff);
        self
    }

    pub fn with_payload(mut self, payload: &'a Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A `from -> to` move of a string-valued field (status, stage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub field: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// A numeric field change. A missing/null baseline reads as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountChange {
    pub from: f64,
    pub to: f64,
}

impl AmountChange {
    /// `|to - from| / from`, or `None` on a non-positive baseline.
    pub fn relative_delta(&self) -> Option<f64> {
        (self.from > 0.0).then(|| (self.to - self.from).abs() / self.from)
    }
}

/// What a change looks like to the decision table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSignals {
    /// Lowercased change-type tokens, split on `_`, `-`, `.`, `:` and spaces.
    pub tokens: Vec<String>,
    pub change_type: String,
    pub entity_type: String,
    pub source: SourceKind,
    pub is_creation: bool,
    pub is_deletion: bool,
    pub status: Option<Transition>,
    pub stage: Option<Transition>,
    pub amount: Option<AmountChange>,
    pub ownership_field: Option<String>,
    pub plan_field: Option<String>,
    pub sensitive_fields: Vec<String>,
}

impl ChangeSignals {
    pub fn extract(input: &ClassifyInput<'_>, config: &ClassifierConfig) -> Self {
        let change_type = input.change_type.trim().to_ascii_lowercase();
        let tokens: Vec<String> = change_type
            .split(|c: char| matches!(c, '_' | '-' | '.' | ':' | ' '))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let is_creation = matches!(change_type.as_str(), "create" | "created" | "insert" | "new")
            || change_type.ends_with("_created")
            || change_type.starts_with("new_")
            || tokens.iter().any(|t| t == "creation");
        let is_deletion = matches!(change_type.as_str(), "delete" | "deleted" | "remove" | "removed")
            || change_type.ends_with("_deleted")
            || change_type.ends_with("_removed")
            || tokens.iter().any(|t| t == "deletion");

        let diff = input.diff;
        let mut status = diff.and_then(|d| transition(d, &config.status_fields));
        if status.is_none() && tokens.iter().any(|t| t == "status") {
            // Status notifications without a diff may carry `{"status": "..."}`.
            status = input
                .payload
                .and_then(|p| payload_status(p, &config.status_fields));
        }
        let stage = diff.and_then(|d| transition(d, &config.stage_fields));
        let amount = diff.and_then(|d| amount_change(d, &config.amount_fields));
        let ownership_field = diff
            .and_then(|d| d.find_any(&config.ownership_fields))
            .filter(|(_, change)| change.from != change.to)
            .map(|(name, _)| name.to_string());
        let plan_field = diff
            .and_then(|d| d.find_any(&config.plan_fields))
            .map(|(name, _)| name.to_string());
        let sensitive_fields = diff
            .map(|d| {
                d.fields()
                    .filter(|f| {
                        config
                            .sensitive_fields
                            .iter()
                            .any(|s| s.eq_ignore_ascii_case(f))
                    })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            tokens,
            entity_type: input.entity_type.trim().to_ascii_lowercase(),
            change_type,
            source: input.source,
            is_creation,
            is_deletion,
            status,
            stage,
            amount,
            ownership_field,
            plan_field,
            sensitive_fields,
        }
    }

    /// `true` when any change-type token starts with `prefix`.
    pub fn mentions(&self, prefix: &str) -> bool {
        self.tokens.iter().any(|t| t.starts_with(prefix))
    }

    /// `true` when `fragment` occurs anywhere inside a change-type token, so
    /// `assign` is found in `reassigned` and `unassigned`.
    pub fn mentions_within(&self, fragment: &str) -> bool {
        self.tokens.iter().any(|t| t.contains(fragment))
    }

    pub fn entity_is(&self, entity_type: &str) -> bool {
        self.entity_type.eq_ignore_ascii_case(entity_type)
    }
}

fn transition(diff: &ChangeDiff, fields: &[String]) -> Option<Transition> {
    let (field, change) = diff.find_any(fields)?;
    Some(Transition {
        field: field.to_string(),
        from: text(&change.from),
        to: text(&change.to),
    })
}

fn payload_status(payload: &Value, fields: &[String]) -> Option<Transition> {
    let object = payload.as_object()?;
    object.iter().find_map(|(name, value)| {
        if !fields.iter().any(|f| f.eq_ignore_ascii_case(name)) {
            return None;
        }
        Some(Transition {
            field: name.clone(),
            from: None,
            to: Some(text(value)?),
        })
    })
}

fn amount_change(diff: &ChangeDiff, fields: &[String]) -> Option<AmountChange> {
    let (_, FieldChange { from, to }) = diff.find_any(fields)?;
    let from = if from.is_null() { 0.0 } else { number(from)? };
    let to = number(to)?;
    Some(AmountChange { from, to })
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_ascii_lowercase()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers, or strings such as `"$1,300.00"`. Anything else is unreadable.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' ' | '€' | '£'))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tidemark_core::types::FieldChange;

    fn signals(change_type: &str, entity: &str, diff: Option<&ChangeDiff>) -> ChangeSignals {
        let mut input = ClassifyInput::new(change_type, entity, SourceKind::User);
        input.diff = diff;
        ChangeSignals::extract(&input, &ClassifierConfig::default())
    }

    #[test]
    fn tokens_split_on_separators() {
        let s = signals("Member.Role-Updated", "member", None);
        assert_eq!(s.tokens, vec!["member", "role", "updated"]);
        assert!(s.mentions("role"));
        assert!(!s.mentions("plan"));
    }

    #[test]
    fn creation_and_deletion_detection() {
        assert!(signals("created", "x", None).is_creation);
        assert!(signals("member_created", "x", None).is_creation);
        assert!(signals("new_enrollment", "x", None).is_creation);
        assert!(signals("record_deleted", "x", None).is_deletion);
        assert!(!signals("status_change", "x", None).is_creation);
    }

    #[test]
    fn amount_parses_currency_strings_and_null_baseline() {
        let diff = ChangeDiff::new().with("amount", FieldChange::new(json!("$1,000"), json!(1300)));
        let s = signals("amount_change", "deal", Some(&diff));
        assert_eq!(s.amount, Some(AmountChange { from: 1000.0, to: 1300.0 }));

        let diff = ChangeDiff::new().with("amount", FieldChange::new(Value::Null, json!(50)));
        let s = signals("amount_change", "deal", Some(&diff));
        assert_eq!(s.amount, Some(AmountChange { from: 0.0, to: 50.0 }));
    }

    #[test]
    fn malformed_amount_is_absent() {
        let diff = ChangeDiff::new().with("amount", FieldChange::new(json!({"x": 1}), json!("lots")));
        assert!(signals("amount_change", "deal", Some(&diff)).amount.is_none());
    }

    #[test]
    fn status_payload_fallback_only_for_status_types() {
        let payload = json!({"status": "Suspended"});
        let input = ClassifyInput::new("status_change", "member", SourceKind::Vendor)
            .with_payload(&payload);
        let s = ChangeSignals::extract(&input, &ClassifierConfig::default());
        assert_eq!(s.status.and_then(|t| t.to).as_deref(), Some("suspended"));

        let input = ClassifyInput::new("member_created", "member", SourceKind::Vendor)
            .with_payload(&payload);
        let s = ChangeSignals::extract(&input, &ClassifierConfig::default());
        assert!(s.status.is_none());
    }

    #[test]
    fn unchanged_owner_is_not_an_ownership_signal() {
        let diff = ChangeDiff::new().with("owner_id", FieldChange::new("u1", "u1"));
        assert!(signals("update", "deal", Some(&diff)).ownership_field.is_none());
    }

    #[test]
    fn relative_delta_requires_positive_baseline() {
        assert_eq!(AmountChange { from: 0.0, to: 5.0 }.relative_delta(), None);
        let delta = AmountChange { from: 1000.0, to: 1300.0 }
            .relative_delta()
            .expect("delta");
        assert!((delta - 0.3).abs() < 1e-9);
    }
}
