//! `tidemark rules`: print the decision table in precedence order.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use tidemark_classifier::RULES;
use tidemark_core::types::Severity;

use super::{review_label, severity_label};

/// Arguments for `tidemark rules`.
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "rule")]
    name: &'static str,
    #[tabled(rename = "severity")]
    severity: String,
    #[tabled(rename = "review")]
    review: &'static str,
    #[tabled(rename = "matches")]
    summary: &'static str,
}

#[derive(Serialize)]
struct RuleJson {
    position: usize,
    name: &'static str,
    severity: Severity,
    requires_review: bool,
    summary: &'static str,
}

impl RulesArgs {
    pub fn run(self) -> Result<()> {
        if self.json {
            let rows: Vec<RuleJson> = RULES
                .iter()
                .enumerate()
                .map(|(i, rule)| RuleJson {
                    position: i + 1,
                    name: rule.name,
                    severity: rule.severity,
                    requires_review: rule.requires_review,
                    summary: rule.summary,
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize rules")?
            );
            return Ok(());
        }

        let rows: Vec<RuleRow> = RULES
            .iter()
            .enumerate()
            .map(|(i, rule)| RuleRow {
                position: i + 1,
                name: rule.name,
                severity: severity_label(rule.severity).to_string(),
                review: review_label(rule.requires_review),
                summary: rule.summary,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("First matching row wins.");
        Ok(())
    }
}
