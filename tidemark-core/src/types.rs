//! Domain types for change events.
//!
//! A [`ChangeEvent`] is created once by ingestion and is otherwise immutable
//! apart from its reconciliation fields and its [`SyncStatus`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed tenant (organization) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub String);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for OrgId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrgId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identity of the record a change applies to. Hash chains are kept per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub organization_id: OrgId,
    pub entity_type: String,
    pub entity_id: String,
}

impl RecordKey {
    pub fn new(
        organization_id: impl Into<OrgId>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.organization_id, self.entity_type, self.entity_id
        )
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Urgency of a change. Declaration order is the total order:
/// `Info < Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, most urgent first.
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Info,
        ]
    }

    /// `true` when `self` is at least as urgent as `threshold`.
    pub fn meets(self, threshold: Severity) -> bool {
        self >= threshold
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!(
                "unknown severity '{other}'; expected: critical, high, medium, low, info"
            )),
        }
    }
}

/// Where a change notification originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    User,
    System,
    Integration,
    Vendor,
    Import,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::User => "user",
            SourceKind::System => "system",
            SourceKind::Integration => "integration",
            SourceKind::Vendor => "vendor",
            SourceKind::Import => "import",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(SourceKind::User),
            "system" => Ok(SourceKind::System),
            "integration" => Ok(SourceKind::Integration),
            "vendor" => Ok(SourceKind::Vendor),
            "import" => Ok(SourceKind::Import),
            other => Err(format!(
                "unknown source '{other}'; expected: user, system, integration, vendor, import"
            )),
        }
    }
}

/// Review workflow state of a single event. See [`crate::reconciliation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
    AutoResolved,
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationStatus::None => write!(f, "none"),
            ReconciliationStatus::Pending => write!(f, "pending"),
            ReconciliationStatus::Approved => write!(f, "approved"),
            ReconciliationStatus::Rejected => write!(f, "rejected"),
            ReconciliationStatus::AutoResolved => write!(f, "auto_resolved"),
        }
    }
}

/// Cross-source consistency of a record, orthogonal to review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Synced,
    Pending,
    Conflict,
    Stale,
}

impl SyncStatus {
    /// Status implied by a freshly chained event.
    ///
    /// A chain break always wins over the review flag.
    pub fn after_chain(chain_broken: bool, requires_review: bool) -> Self {
        if chain_broken {
            SyncStatus::Conflict
        } else if requires_review {
            SyncStatus::Pending
        } else {
            SyncStatus::Synced
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Conflict => write!(f, "conflict"),
            SyncStatus::Stale => write!(f, "stale"),
        }
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Before/after values of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldChange {
    #[serde(default)]
    pub from: Value,
    #[serde(default)]
    pub to: Value,
}

impl FieldChange {
    pub fn new(from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Field-level diff keyed by field name. Keys are kept sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ChangeDiff(BTreeMap<String, FieldChange>);

impl ChangeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, change: FieldChange) -> Self {
        self.0.insert(field.into(), change);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, change: FieldChange) {
        self.0.insert(field.into(), change);
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    pub fn touches(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// First field present in the diff, case-insensitively, out of `candidates`.
    pub fn find_any<'a>(&'a self, candidates: &[String]) -> Option<(&'a str, &'a FieldChange)> {
        self.0.iter().find_map(|(name, change)| {
            candidates
                .iter()
                .any(|c| c.eq_ignore_ascii_case(name))
                .then_some((name.as_str(), change))
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build a diff from two JSON object snapshots of a record.
    ///
    /// Added fields get `from = null`, removed fields get `to = null`, and
    /// unchanged fields are omitted. Non-object snapshots are treated as empty.
    pub fn between(before: &Value, after: &Value) -> Self {
        let empty = serde_json::Map::new();
        let before = before.as_object().unwrap_or(&empty);
        let after = after.as_object().unwrap_or(&empty);

        let mut diff = ChangeDiff::new();
        for (field, old) in before {
            match after.get(field) {
                Some(new) if new == old => {}
                Some(new) => diff.insert(field.clone(), FieldChange::new(old.clone(), new.clone())),
                None => diff.insert(field.clone(), FieldChange::new(old.clone(), Value::Null)),
            }
        }
        for (field, new) in after {
            if !before.contains_key(field) {
                diff.insert(field.clone(), FieldChange::new(Value::Null, new.clone()));
            }
        }
        diff
    }
}

impl FromIterator<(String, FieldChange)> for ChangeDiff {
    fn from_iter<I: IntoIterator<Item = (String, FieldChange)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// ChangeEvent
// ---------------------------------------------------------------------------

/// Who performed a change, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Actor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// The record of one detected change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub organization_id: OrgId,
    pub source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub change_type: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_title: Option<String>,
    pub severity: Severity,
    pub requires_review: bool,
    /// Name of the classifier rule that produced `severity`.
    pub matched_rule: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<ChangeDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    pub reconciliation_status: ReconciliationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    pub content_hash: String,
    /// Hash of the preceding accepted event for the same record; `None` for
    /// the first event on a record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub sync_status: SyncStatus,
    pub detected_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Bare event for `record`, as a realtime adapter would build it from a
    /// raw row before handing it to the bus.
    ///
    /// The id is nil (the bus assigns one on emit), severity is `info`, the
    /// hash fields are empty, and both timestamps are now.
    pub fn new(record: RecordKey, change_type: impl Into<String>, source: SourceKind) -> Self {
        let now = Utc::now();
        let change_type = change_type.into();
        Self {
            id: Uuid::nil(),
            organization_id: record.organization_id,
            source,
            source_name: None,
            source_id: None,
            title: change_type.clone(),
            change_type,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            entity_title: None,
            severity: Severity::Info,
            requires_review: false,
            matched_rule: String::new(),
            description: None,
            diff: None,
            payload: None,
            actor: None,
            reconciliation_status: ReconciliationStatus::None,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            content_hash: String::new(),
            previous_hash: None,
            sync_status: SyncStatus::Synced,
            detected_at: now,
            created_at: now,
        }
    }

    pub fn record_key(&self) -> RecordKey {
        RecordKey {
            organization_id: self.organization_id.clone(),
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
        }
    }

    /// Display label for the affected record: its title, else `type id`.
    pub fn entity_label(&self) -> String {
        match &self.entity_title {
            Some(title) => title.clone(),
            None => format!("{} {}", self.entity_type, self.entity_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_total_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
        for a in Severity::all() {
            for b in Severity::all() {
                assert_eq!(a == b, a.cmp(b) == std::cmp::Ordering::Equal);
            }
        }
    }

    #[test]
    fn severity_meets_threshold() {
        assert!(Severity::Critical.meets(Severity::Medium));
        assert!(Severity::Medium.meets(Severity::Medium));
        assert!(!Severity::Low.meets(Severity::Medium));
        assert!(!Severity::Info.meets(Severity::Medium));
    }

    #[test]
    fn severity_parses_case_insensitive() {
        assert_eq!("HIGH".parse::<Severity>(), Ok(Severity::High));
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn sync_status_after_chain() {
        assert_eq!(SyncStatus::after_chain(true, false), SyncStatus::Conflict);
        assert_eq!(SyncStatus::after_chain(true, true), SyncStatus::Conflict);
        assert_eq!(SyncStatus::after_chain(false, true), SyncStatus::Pending);
        assert_eq!(SyncStatus::after_chain(false, false), SyncStatus::Synced);
    }

    #[test]
    fn reconciliation_status_serializes_snake_case() {
        let encoded = serde_json::to_string(&ReconciliationStatus::AutoResolved).expect("encode");
        assert_eq!(encoded, "\"auto_resolved\"");
    }

    #[test]
    fn diff_between_snapshots() {
        let before = json!({"status": "active", "amount": 100, "notes": "x"});
        let after = json!({"status": "inactive", "amount": 100, "owner_id": "u-2"});
        let diff = ChangeDiff::between(&before, &after);

        assert_eq!(diff.len(), 3);
        assert_eq!(
            diff.get("status"),
            Some(&FieldChange::new("active", "inactive"))
        );
        assert_eq!(diff.get("notes"), Some(&FieldChange::new("x", Value::Null)));
        assert_eq!(
            diff.get("owner_id"),
            Some(&FieldChange::new(Value::Null, "u-2"))
        );
        assert!(!diff.touches("amount"));
    }

    #[test]
    fn diff_find_any_is_case_insensitive() {
        let diff = ChangeDiff::new().with("Owner_Id", FieldChange::new("a", "b"));
        let candidates = vec!["owner_id".to_string()];
        let (name, _) = diff.find_any(&candidates).expect("match");
        assert_eq!(name, "Owner_Id");
    }

    #[test]
    fn diff_deserializes_missing_sides_as_null() {
        let diff: ChangeDiff = serde_json::from_value(json!({"plan": {"to": "gold"}})).expect("decode");
        let change = diff.get("plan").expect("plan");
        assert_eq!(change.from, Value::Null);
        assert_eq!(change.to, json!("gold"));
    }

    #[test]
    fn record_key_display() {
        let key = RecordKey::new("org-1", "deal", "d-9");
        assert_eq!(key.to_string(), "org-1/deal/d-9");
    }
}
