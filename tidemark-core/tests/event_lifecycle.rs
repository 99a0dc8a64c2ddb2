use chrono::{Duration, Utc};
use serde_json::json;

use tidemark_core::types::{
    ChangeDiff, ChangeEvent, FieldChange, ReconciliationStatus, RecordKey, Severity, SourceKind,
};
use tidemark_core::{EventFilter, EventQuery, MemoryEventStore, ReviewAction};

fn member_event(id: &str, change_type: &str, severity: Severity) -> ChangeEvent {
    let mut event = ChangeEvent::new(
        RecordKey::new("org-1", "member", id),
        change_type,
        SourceKind::Vendor,
    );
    event.id = uuid::Uuid::new_v4();
    event.severity = severity;
    event
}

#[test]
fn stored_event_survives_review_round_trip() {
    let store = MemoryEventStore::new();
    let mut event = member_event("m-1", "plan_change", Severity::High);
    event.requires_review = true;
    event.reconciliation_status = ReconciliationStatus::initial(true);
    event.diff = Some(ChangeDiff::between(
        &json!({"plan_id": "silver", "status": "active"}),
        &json!({"plan_id": "gold", "status": "active"}),
    ));
    store.insert(event.clone());

    let mut reviewed = store.get(event.id).expect("stored");
    reviewed
        .apply_review(
            ReviewAction::Approve {
                reviewer: "u-1".into(),
                notes: None,
            },
            Utc::now(),
        )
        .expect("approve");
    assert!(store.update(reviewed.clone()));

    let back = store.get(event.id).expect("still stored");
    assert_eq!(back.reconciliation_status, ReconciliationStatus::Approved);
    assert_eq!(back.reviewed_by.as_deref(), Some("u-1"));
    let diff = back.diff.expect("diff");
    assert_eq!(diff.len(), 1);
    assert_eq!(diff.get("plan_id"), Some(&FieldChange::new("silver", "gold")));
}

#[test]
fn update_of_unknown_event_is_rejected() {
    let store = MemoryEventStore::new();
    assert!(!store.update(member_event("m-1", "status_change", Severity::Low)));
    assert!(store.is_empty());
}

#[test]
fn query_combines_filter_dimensions() {
    let store = MemoryEventStore::new();
    let now = Utc::now();

    let mut old = member_event("m-1", "status_change", Severity::High);
    old.created_at = now - Duration::hours(2);
    store.insert(old);

    let mut recent = member_event("m-2", "status_change", Severity::High);
    recent.created_at = now - Duration::minutes(5);
    store.insert(recent);

    let mut noisy = member_event("m-3", "status_change", Severity::Info);
    noisy.created_at = now - Duration::minutes(1);
    store.insert(noisy);

    let mut other_org = member_event("m-4", "status_change", Severity::Critical);
    other_org.organization_id = "org-2".into();
    store.insert(other_org);

    let filter = EventFilter::for_org("org-1")
        .with_min_severity(Severity::Medium)
        .with_since(now - Duration::hours(1))
        .with_change_types(["status_change"]);
    let rows = store.query(&EventQuery::default().with_filter(filter));

    let ids: Vec<&str> = rows.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["m-2"]);
}

#[test]
fn event_json_uses_wire_names() {
    let mut event = member_event("m-9", "member_termination", Severity::Critical);
    event.reconciliation_status = ReconciliationStatus::AutoResolved;
    let value = serde_json::to_value(&event).expect("encode");

    assert_eq!(value["severity"], "critical");
    assert_eq!(value["source"], "vendor");
    assert_eq!(value["reconciliation_status"], "auto_resolved");
    assert_eq!(value["sync_status"], "synced");

    let decoded: ChangeEvent = serde_json::from_value(value).expect("decode");
    assert_eq!(decoded, event);
}
