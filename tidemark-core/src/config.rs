//! Serde configuration documents.
//!
//! Every struct has defaults, so a partial YAML document (or none at all) is
//! valid. [`load_at`] reads a [`TidemarkConfig`] from disk.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::filter::EventFilter;
use crate::types::{OrgId, Severity, SourceKind};

/// Default ring-buffer capacity of the event bus history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
/// Default number of events a feed keeps visible.
pub const DEFAULT_MAX_EVENTS: usize = 50;
/// Default feed auto-refresh period.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Thresholds and field lists consulted by the severity decision table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Relative change (0.25 = 25%) above which an amount change is significant.
    pub amount_relative_threshold: f64,
    /// New value above which a change from a zero baseline is significant.
    pub amount_absolute_floor: f64,
    pub amount_fields: Vec<String>,
    pub status_fields: Vec<String>,
    pub stage_fields: Vec<String>,
    pub ownership_fields: Vec<String>,
    pub plan_fields: Vec<String>,
    pub sensitive_fields: Vec<String>,
    /// Status values whose arrival marks a high-risk transition.
    pub high_risk_statuses: Vec<String>,
    /// Entity type treated as a member record.
    pub member_entity_type: String,
    /// Entity type treated as a sales deal.
    pub deal_entity_type: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            amount_relative_threshold: 0.25,
            amount_absolute_floor: 1000.0,
            amount_fields: strings(&["amount", "value", "deal_value", "premium", "price"]),
            status_fields: strings(&["status", "state"]),
            stage_fields: strings(&["stage", "pipeline_stage", "deal_stage"]),
            ownership_fields: strings(&["owner", "owner_id", "assigned_to", "assignee_id"]),
            plan_fields: strings(&["plan", "plan_id", "plan_name"]),
            sensitive_fields: strings(&[
                "ssn",
                "date_of_birth",
                "dob",
                "bank_account",
                "routing_number",
                "salary",
                "tax_id",
            ]),
            high_risk_statuses: strings(&[
                "inactive",
                "terminated",
                "cancelled",
                "suspended",
                "failed",
                "error",
            ]),
            member_entity_type: "member".to_string(),
            deal_entity_type: "deal".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub history_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Per-observer feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub organization_id: OrgId,
    pub entity_types: Vec<String>,
    pub source_types: Vec<SourceKind>,
    pub min_severity: Option<Severity>,
    pub max_events: usize,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
    pub realtime: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            organization_id: OrgId::from(""),
            entity_types: Vec::new(),
            source_types: Vec::new(),
            min_severity: None,
            max_events: DEFAULT_MAX_EVENTS,
            auto_refresh: true,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            realtime: true,
        }
    }
}

impl FeedConfig {
    pub fn for_org(org: impl Into<OrgId>) -> Self {
        Self {
            organization_id: org.into(),
            ..Self::default()
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        // A zero period would spin the refresh loop.
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// The predicate applied to both snapshot rows and realtime pushes.
    pub fn filter(&self) -> EventFilter {
        EventFilter {
            organization_id: Some(self.organization_id.clone()),
            entity_types: self.entity_types.clone(),
            source_types: self.source_types.clone(),
            change_types: Vec::new(),
            min_severity: self.min_severity,
            since: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TidemarkConfig {
    pub classifier: ClassifierConfig,
    pub bus: BusConfig,
    /// Template for per-observer feeds; `organization_id` is filled in by
    /// [`TidemarkConfig::feed_for`].
    pub feed: FeedConfig,
}

impl TidemarkConfig {
    /// Feed configuration for one organization, starting from the template.
    pub fn feed_for(&self, org: impl Into<OrgId>) -> FeedConfig {
        FeedConfig {
            organization_id: org.into(),
            ..self.feed.clone()
        }
    }
}

/// Load a config document. A missing file yields the defaults.
pub fn load_at(path: &Path) -> Result<TidemarkConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file missing, using defaults");
        return Ok(TidemarkConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_at(&tmp.path().join("nope.yaml")).unwrap();
        assert_eq!(cfg, TidemarkConfig::default());
        assert_eq!(cfg.bus.history_capacity, 100);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tidemark.yaml");
        std::fs::write(
            &path,
            "classifier:\n  amount_absolute_floor: 5000\n  sensitive_fields: [ssn]\nbus:\n  history_capacity: 10\n",
        )
        .unwrap();

        let cfg = load_at(&path).unwrap();
        assert_eq!(cfg.classifier.amount_absolute_floor, 5000.0);
        assert_eq!(cfg.classifier.sensitive_fields, vec!["ssn".to_string()]);
        assert_eq!(cfg.classifier.amount_relative_threshold, 0.25);
        assert_eq!(cfg.bus.history_capacity, 10);
    }

    #[test]
    fn feed_section_is_a_template_per_org() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tidemark.yaml");
        std::fs::write(
            &path,
            "feed:\n  max_events: 20\n  refresh_interval_secs: 10\n  min_severity: medium\n  realtime: false\n",
        )
        .unwrap();

        let cfg = load_at(&path).unwrap();
        let feed = cfg.feed_for("org-9");
        assert_eq!(feed.organization_id, OrgId::from("org-9"));
        assert_eq!(feed.max_events, 20);
        assert_eq!(feed.refresh_interval(), Duration::from_secs(10));
        assert_eq!(feed.min_severity, Some(Severity::Medium));
        assert!(!feed.realtime);
        assert!(feed.auto_refresh);
        assert_eq!(cfg.bus, BusConfig::default());
    }

    #[test]
    fn parse_error_carries_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.yaml");
        std::fs::write(&path, "bus: [not, a, map").unwrap();

        let err = load_at(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn feed_filter_mirrors_config() {
        let mut cfg = FeedConfig::for_org("org-9");
        cfg.entity_types = vec!["deal".into()];
        cfg.min_severity = Some(Severity::High);
        let filter = cfg.filter();
        assert_eq!(filter.organization_id, Some(OrgId::from("org-9")));
        assert_eq!(filter.entity_types, vec!["deal".to_string()]);
        assert_eq!(filter.min_severity, Some(Severity::High));
        assert_eq!(cfg.max_events, 50);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(30));
    }
}
