//! The event predicate shared by feed controllers, bus history queries, and
//! the in-memory store.
//!
//! Empty allow-lists mean "no restriction".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChangeEvent, OrgId, Severity, SourceKind};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrgId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_types: Vec<SourceKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub change_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn for_org(org: impl Into<OrgId>) -> Self {
        Self {
            organization_id: Some(org.into()),
            ..Self::default()
        }
    }

    pub fn with_entity_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source_types(mut self, sources: impl IntoIterator<Item = SourceKind>) -> Self {
        self.source_types = sources.into_iter().collect();
        self
    }

    pub fn with_change_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.change_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(org) = &self.organization_id {
            if &event.organization_id != org {
                return false;
            }
        }
        if !self.entity_types.is_empty() && !self.entity_types.contains(&event.entity_type) {
            return false;
        }
        if !self.source_types.is_empty() && !self.source_types.contains(&event.source) {
            return false;
        }
        if !self.change_types.is_empty() && !self.change_types.contains(&event.change_type) {
            return false;
        }
        if let Some(min) = self.min_severity {
            if !event.severity.meets(min) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        true
    }
}
