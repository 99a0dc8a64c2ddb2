//! Template context: the serializable payload handed to tera, built from the
//! parts of a change that a human-readable title needs.

use serde::Serialize;
use serde_json::Value;

use tidemark_core::types::{Actor, ChangeDiff, SourceKind};

/// Which template set renders a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFamily {
    Status,
    Amount,
    Ownership,
    Created,
    Deleted,
    Generic,
}

impl TemplateFamily {
    pub fn all() -> &'static [TemplateFamily] {
        &[
            TemplateFamily::Status,
            TemplateFamily::Amount,
            TemplateFamily::Ownership,
            TemplateFamily::Created,
            TemplateFamily::Deleted,
            TemplateFamily::Generic,
        ]
    }

    /// Family for a classifier rule name. Unknown names render generically.
    pub fn for_rule(rule: &str) -> Self {
        match rule {
            "high_risk_status" | "status_change" | "deal_stage_change" => TemplateFamily::Status,
            "significant_amount_change" => TemplateFamily::Amount,
            "ownership_change" | "assignment" => TemplateFamily::Ownership,
            "record_created" | "new_member" | "new_enrollment" => TemplateFamily::Created,
            "record_deleted" => TemplateFamily::Deleted,
            _ => TemplateFamily::Generic,
        }
    }

    pub fn dir(self) -> &'static str {
        match self {
            TemplateFamily::Status => "status",
            TemplateFamily::Amount => "amount",
            TemplateFamily::Ownership => "ownership",
            TemplateFamily::Created => "created",
            TemplateFamily::Deleted => "deleted",
            TemplateFamily::Generic => "generic",
        }
    }

    pub fn title_template(self) -> String {
        format!("{}/title.tera", self.dir())
    }

    /// Substrings that pick the headline field out of a multi-field diff.
    fn field_hints(self) -> &'static [&'static str] {
        match self {
            TemplateFamily::Status => &["status", "stage", "state"],
            TemplateFamily::Amount => &["amount", "value", "premium", "price"],
            TemplateFamily::Ownership => &["owner", "assign"],
            _ => &[],
        }
    }

    fn verb(self) -> &'static str {
        match self {
            TemplateFamily::Created => "created",
            TemplateFamily::Deleted => "deleted",
            _ => "updated",
        }
    }
}

/// One diff row, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldCtx {
    pub field: String,
    pub from: String,
    pub to: String,
}

/// Everything the title and description templates can reference.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub entity: String,
    pub entity_type: String,
    pub change_type: String,
    /// `change_type` with separators turned into spaces.
    pub change_label: String,
    pub source: String,
    pub source_name: Option<String>,
    pub actor: String,
    pub verb: String,
    pub primary: Option<FieldCtx>,
    pub changes: Vec<FieldCtx>,
    #[serde(skip)]
    pub family: TemplateFamily,
}

/// Borrowed inputs for [`TemplateContext::build`].
#[derive(Debug, Clone, Copy)]
pub struct ChangeText<'a> {
    pub rule: &'a str,
    pub change_type: &'a str,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub entity_title: Option<&'a str>,
    pub source: SourceKind,
    pub source_name: Option<&'a str>,
    pub actor: Option<&'a Actor>,
    pub diff: Option<&'a ChangeDiff>,
}

impl TemplateContext {
    pub fn build(change: &ChangeText<'_>) -> Self {
        let family = TemplateFamily::for_rule(change.rule);
        let changes: Vec<FieldCtx> = change
            .diff
            .map(|d| {
                d.iter()
                    .map(|(field, c)| FieldCtx {
                        field: field.to_string(),
                        from: display(&c.from),
                        to: display(&c.to),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let hints = family.field_hints();
        let primary = changes
            .iter()
            .find(|c| {
                let lower = c.field.to_ascii_lowercase();
                hints.iter().any(|h| lower.contains(h))
            })
            .or_else(|| changes.first().filter(|_| !hints.is_empty()))
            .cloned();

        let entity = match change.entity_title {
            Some(title) if !title.trim().is_empty() => title.to_string(),
            _ => format!("{} {}", change.entity_type, change.entity_id),
        };

        let actor = change
            .actor
            .and_then(|a| a.name.clone().or_else(|| a.id.clone()))
            .unwrap_or_else(|| match change.source {
                SourceKind::User => "A user".to_string(),
                SourceKind::System => "The system".to_string(),
                _ => format!("The {} source", change.source),
            });

        Self {
            entity,
            entity_type: change.entity_type.to_string(),
            change_type: change.change_type.to_string(),
            change_label: change.change_type.replace(['_', '-', '.'], " "),
            source: change.source.to_string(),
            source_name: change.source_name.map(str::to_string),
            actor,
            verb: family.verb().to_string(),
            primary,
            changes,
            family,
        }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => "(none)".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::types::FieldChange;

    fn text<'a>(rule: &'a str, diff: Option<&'a ChangeDiff>) -> ChangeText<'a> {
        ChangeText {
            rule,
            change_type: "update",
            entity_type: "deal",
            entity_id: "d-1",
            entity_title: None,
            source: SourceKind::Vendor,
            source_name: None,
            actor: None,
            diff,
        }
    }

    #[test]
    fn family_mapping() {
        assert_eq!(TemplateFamily::for_rule("status_change"), TemplateFamily::Status);
        assert_eq!(TemplateFamily::for_rule("new_member"), TemplateFamily::Created);
        assert_eq!(TemplateFamily::for_rule("termination"), TemplateFamily::Generic);
        assert_eq!(TemplateFamily::for_rule("made_up"), TemplateFamily::Generic);
    }

    #[test]
    fn primary_field_prefers_family_hint() {
        let diff = ChangeDiff::new()
            .with("amount", FieldChange::new(1, 2))
            .with("stage", FieldChange::new("lead", "won"));
        let ctx = TemplateContext::build(&text("deal_stage_change", Some(&diff)));
        assert_eq!(ctx.primary.map(|p| p.field), Some("stage".to_string()));
    }

    #[test]
    fn generic_family_has_no_primary() {
        let diff = ChangeDiff::new().with("nickname", FieldChange::new("a", "b"));
        let ctx = TemplateContext::build(&text("default", Some(&diff)));
        assert!(ctx.primary.is_none());
        assert_eq!(ctx.changes.len(), 1);
    }

    #[test]
    fn entity_and_actor_fallbacks() {
        let ctx = TemplateContext::build(&text("default", None));
        assert_eq!(ctx.entity, "deal d-1");
        assert_eq!(ctx.actor, "The vendor source");

        let actor = Actor {
            id: Some("u-1".into()),
            name: None,
            kind: None,
        };
        let mut input = text("default", None);
        input.actor = Some(&actor);
        input.entity_title = Some("Acme renewal");
        let ctx = TemplateContext::build(&input);
        assert_eq!(ctx.entity, "Acme renewal");
        assert_eq!(ctx.actor, "u-1");
    }

    #[test]
    fn null_values_display_as_none() {
        let diff = ChangeDiff::new().with("owner_id", FieldChange::new(Value::Null, "u-9"));
        let ctx = TemplateContext::build(&text("ownership_change", Some(&diff)));
        let primary = ctx.primary.expect("primary");
        assert_eq!(primary.from, "(none)");
        assert_eq!(primary.to, "u-9");
    }
}
