//! Parameterised classification tests for `tidemark-classifier`.

use rstest::rstest;
use serde_json::{json, Value};

use tidemark_classifier::{classify, ClassifyInput, Classifier};
use tidemark_core::types::{ChangeDiff, FieldChange, Severity, SourceKind};
use tidemark_core::ClassifierConfig;

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

fn diff(field: &str, from: Value, to: Value) -> ChangeDiff {
    ChangeDiff::new().with(field, FieldChange::new(from, to))
}

fn run(change_type: &str, entity: &str, source: SourceKind, d: Option<&ChangeDiff>) -> (Severity, bool, &'static str) {
    let mut input = ClassifyInput::new(change_type, entity, source);
    input.diff = d;
    let c = classify(&input, &ClassifierConfig::default());
    (c.severity, c.requires_review, c.rule)
}

// ---------------------------------------------------------------------------
// Change-type driven rows
// ---------------------------------------------------------------------------

#[rstest]
#[case("member_termination", "member", Severity::Critical, true, "termination")]
#[case("terminated", "employee", Severity::Critical, true, "termination")]
#[case("integration_error", "member", Severity::Critical, false, "integration_error")]
#[case("permission_granted", "user", Severity::High, true, "security_change")]
#[case("role_change", "user", Severity::High, true, "security_change")]
#[case("security_settings_updated", "org", Severity::High, true, "security_change")]
#[case("plan_change", "member", Severity::High, true, "plan_change")]
#[case("sync_conflict", "member", Severity::High, true, "sync_conflict")]
#[case("enrollment_created", "enrollment", Severity::Medium, false, "new_enrollment")]
#[case("new_enrollment", "member", Severity::Medium, false, "new_enrollment")]
#[case("member_created", "member", Severity::Medium, false, "new_member")]
#[case("status_change", "ticket", Severity::Medium, false, "status_change")]
#[case("created", "ticket", Severity::Low, false, "record_created")]
#[case("record_deleted", "ticket", Severity::Medium, true, "record_deleted")]
#[case("assigned", "ticket", Severity::Low, false, "assignment")]
#[case("member_reassigned", "member", Severity::Low, false, "assignment")]
#[case("unassigned", "ticket", Severity::Low, false, "assignment")]
#[case("note_added", "ticket", Severity::Info, false, "default")]
#[case("", "", Severity::Info, false, "default")]
fn change_type_rows(
    #[case] change_type: &str,
    #[case] entity: &str,
    #[case] severity: Severity,
    #[case] review: bool,
    #[case] rule: &str,
) {
    let got = run(change_type, entity, SourceKind::User, None);
    assert_eq!(got, (severity, review, rule));
}

// ---------------------------------------------------------------------------
// Diff driven rows
// ---------------------------------------------------------------------------

#[rstest]
#[case("status", json!("active"), json!("inactive"), "member", Severity::High, "high_risk_status")]
#[case("status", json!("open"), json!("cancelled"), "order", Severity::High, "high_risk_status")]
#[case("status", json!("pending"), json!("active"), "member", Severity::Medium, "status_change")]
#[case("owner_id", json!("u-1"), json!("u-2"), "account", Severity::Medium, "ownership_change")]
#[case("stage", json!("qualified"), json!("proposal"), "deal", Severity::Medium, "deal_stage_change")]
#[case("stage", json!("qualified"), json!("proposal"), "lead", Severity::Medium, "status_change")]
#[case("ssn", json!("***1111"), json!("***2222"), "member", Severity::Medium, "sensitive_field_change")]
#[case("plan_id", json!("silver"), json!("gold"), "member", Severity::High, "plan_change")]
#[case("nickname", json!("al"), json!("alan"), "member", Severity::Info, "default")]
fn diff_rows(
    #[case] field: &str,
    #[case] from: Value,
    #[case] to: Value,
    #[case] entity: &str,
    #[case] severity: Severity,
    #[case] rule: &str,
) {
    let d = diff(field, from, to);
    let (got_severity, _, got_rule) = run("update", entity, SourceKind::Vendor, Some(&d));
    assert_eq!((got_severity, got_rule), (severity, rule));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn termination_beats_generic_status_change() {
    let d = diff("status", json!("active"), json!("pending_review"));
    let got = run("status_change_termination", "member", SourceKind::User, Some(&d));
    assert_eq!(got.0, Severity::Critical);
    assert_eq!(got.2, "termination");
}

#[test]
fn high_risk_status_beats_amount_and_ownership() {
    let d = ChangeDiff::new()
        .with("status", FieldChange::new("active", "suspended"))
        .with("amount", FieldChange::new(100, 900))
        .with("owner_id", FieldChange::new("a", "b"));
    let got = run("update", "deal", SourceKind::Integration, Some(&d));
    assert_eq!(got.2, "high_risk_status");
}

#[test]
fn deal_amount_thirty_percent_is_high_without_review() {
    let d = diff("amount", json!(1000), json!(1300));
    let got = run("amount_change", "deal", SourceKind::User, Some(&d));
    assert_eq!(got, (Severity::High, false, "significant_amount_change"));
}

#[test]
fn classification_is_deterministic() {
    let d = ChangeDiff::new()
        .with("stage", FieldChange::new("lead", "won"))
        .with("amount", FieldChange::new("n/a", 10));
    let classifier = Classifier::default();
    let input = ClassifyInput::new("update", "deal", SourceKind::Import).with_diff(&d);
    let first = classifier.classify(&input);
    for _ in 0..50 {
        assert_eq!(classifier.classify(&input), first);
    }
    assert_eq!(first.rule, "deal_stage_change");
}

#[test]
fn malformed_diff_degrades_instead_of_failing() {
    let d = ChangeDiff::new()
        .with("amount", FieldChange::new(json!([1, 2]), json!({"nested": true})))
        .with("status", FieldChange::new(json!(null), json!({"weird": 1})));
    let got = run("update", "deal", SourceKind::Vendor, Some(&d));
    // The status field is present but unreadable: generic status change, not high risk.
    assert_eq!(got.2, "status_change");
    assert_eq!(got.0, Severity::Medium);
}

#[test]
fn custom_floor_from_config() {
    let config = ClassifierConfig {
        amount_absolute_floor: 10_000.0,
        ..ClassifierConfig::default()
    };
    let d = diff("premium", json!(0), json!(5000));
    let input = ClassifyInput::new("update", "policy", SourceKind::User).with_diff(&d);
    assert_eq!(classify(&input, &config).severity, Severity::Info);
    assert_eq!(
        classify(&input, &ClassifierConfig::default()).rule,
        "significant_amount_change"
    );
}
