//! Severity classification for `tidemark`.
//!
//! [`classify`] maps a change's attributes to a severity and a review flag by
//! scanning the ordered decision table in [`rules::RULES`]. The first matching
//! row wins. Classification is pure and total: it never fails, and unreadable
//! diff values only cause rows to not match.

pub mod rules;
pub mod signals;

use serde::Serialize;

use tidemark_core::types::Severity;
use tidemark_core::ClassifierConfig;

pub use rules::{Rule, DEFAULT_RULE, RULES};
pub use signals::{AmountChange, ChangeSignals, ClassifyInput, Transition};

/// Result of a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub severity: Severity,
    pub requires_review: bool,
    /// Name of the decision-table row that matched.
    pub rule: &'static str,
}

impl From<&Rule> for Classification {
    fn from(rule: &Rule) -> Self {
        Self {
            severity: rule.severity,
            requires_review: rule.requires_review,
            rule: rule.name,
        }
    }
}

/// Classifier bound to a configuration.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&self, input: &ClassifyInput<'_>) -> Classification {
        classify(input, &self.config)
    }
}

/// Classify `input` against the decision table.
pub fn classify(input: &ClassifyInput<'_>, config: &ClassifierConfig) -> Classification {
    let signals = ChangeSignals::extract(input, config);
    RULES
        .iter()
        .find(|rule| rule.matches(&signals, config))
        .map(Classification::from)
        .unwrap_or(FALLBACK)
}

// Only reachable if the table ever loses its catch-all row.
const FALLBACK: Classification = Classification {
    severity: Severity::Info,
    requires_review: false,
    rule: DEFAULT_RULE,
};
