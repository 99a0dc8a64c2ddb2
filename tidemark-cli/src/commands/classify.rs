//! `tidemark classify`: run one change through the decision table.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use tidemark_classifier::{Classifier, ClassifyInput};
use tidemark_core::types::{ChangeDiff, Severity, SourceKind};
use tidemark_core::TidemarkConfig;

use super::{review_label, severity_label};

/// Arguments for `tidemark classify`.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Change type tag, e.g. `status_change` or `member_termination`.
    #[arg(long)]
    pub change_type: String,

    /// Entity type of the affected record, e.g. `member` or `deal`.
    #[arg(long)]
    pub entity_type: String,

    /// Origin of the change: user, system, integration, vendor, import.
    #[arg(long, default_value = "user")]
    pub source: SourceKind,

    /// Field diff as JSON: `{"status": {"from": "active", "to": "inactive"}}`.
    #[arg(long)]
    pub diff: Option<String>,

    /// Opaque payload as JSON.
    #[arg(long)]
    pub payload: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ClassifyJson<'a> {
    change_type: &'a str,
    entity_type: &'a str,
    source: SourceKind,
    rule: &'static str,
    severity: Severity,
    requires_review: bool,
}

impl ClassifyArgs {
    pub fn run(self, config: &TidemarkConfig) -> Result<()> {
        let diff: Option<ChangeDiff> = self
            .diff
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("--diff must be a JSON object of {field: {from, to}}")?;
        let payload: Option<Value> = self
            .payload
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("--payload must be valid JSON")?;

        let mut input = ClassifyInput::new(&self.change_type, &self.entity_type, self.source);
        if let Some(diff) = diff.as_ref() {
            input = input.with_diff(diff);
        }
        if let Some(payload) = payload.as_ref() {
            input = input.with_payload(payload);
        }

        let classifier = Classifier::new(config.classifier.clone());
        let class = classifier.classify(&input);

        if self.json {
            let out = ClassifyJson {
                change_type: &self.change_type,
                entity_type: &self.entity_type,
                source: self.source,
                rule: class.rule,
                severity: class.severity,
                requires_review: class.requires_review,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&out).context("failed to serialize classification")?
            );
            return Ok(());
        }

        println!(
            "{} {}  rule={}  review={}",
            severity_label(class.severity),
            self.change_type,
            class.rule,
            review_label(class.requires_review),
        );
        Ok(())
    }
}
