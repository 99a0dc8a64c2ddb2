//! `tidemark ingest`: replay JSONL change notifications through the pipeline.
//!
//! Each non-blank line is one change input object. Lines starting with `#`
//! are skipped. With `--chain-store`, chain heads are loaded before the run
//! and saved after it, so repeated runs continue the same chains.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use tidemark_bus::EventBus;
use tidemark_chain::{
    format_age, index, ChainIndex, ChangeInput, ChangePipeline, IngestOutcome, SyncSummary,
};
use tidemark_classifier::Classifier;
use tidemark_core::types::{Severity, SyncStatus};
use tidemark_core::{ChangeEvent, EventFilter, EventQuery, MemoryEventStore, TidemarkConfig};
use tidemark_render::Renderer;

use super::{review_label, severity_label, sync_label};

/// Arguments for `tidemark ingest`.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSONL file of change inputs.
    pub file: PathBuf,

    /// JSON file holding chain heads between runs.
    #[arg(long)]
    pub chain_store: Option<PathBuf>,

    /// Directory of `.tera` files overriding the default title templates.
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Only list accepted events at or above this severity.
    #[arg(long)]
    pub min_severity: Option<Severity>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Default, Serialize)]
struct IngestReport {
    accepted: usize,
    duplicates: usize,
    conflicts: usize,
    emitted: usize,
    sync: SyncSummary,
    events: Vec<ChangeEvent>,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "severity")]
    severity: String,
    #[tabled(rename = "rule")]
    rule: String,
    #[tabled(rename = "review")]
    review: &'static str,
    #[tabled(rename = "sync")]
    sync: String,
    #[tabled(rename = "record")]
    record: String,
    #[tabled(rename = "title")]
    title: String,
}

impl IngestArgs {
    pub fn run(self, config: &TidemarkConfig) -> Result<()> {
        let chains = match self.chain_store.as_deref() {
            Some(path) => load_chains(path, self.json)?,
            None => ChainIndex::new(),
        };

        let renderer = match self.templates.as_deref() {
            Some(dir) => Renderer::with_overrides(dir)
                .with_context(|| format!("failed to load templates from {}", dir.display()))?,
            None => Renderer::new().context("failed to build default templates")?,
        };

        let bus = Arc::new(EventBus::new(&config.bus));
        let emitted = Arc::new(AtomicUsize::new(0));
        let counter = emitted.clone();
        let subscription = bus.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let pipeline = ChangePipeline::new(Classifier::new(config.classifier.clone()))
            .with_renderer(Arc::new(renderer))
            .with_bus(bus.clone())
            .with_chain_index(chains);

        let contents = std::fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;

        let store = MemoryEventStore::new();
        let mut report = IngestReport::default();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let input: ChangeInput = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid change input", self.file.display(), lineno + 1))?;
            let outcome = pipeline
                .submit(input)
                .with_context(|| format!("{}:{}: ingestion failed", self.file.display(), lineno + 1))?;
            match outcome {
                IngestOutcome::Accepted(event) => {
                    report.accepted += 1;
                    if event.sync_status == SyncStatus::Conflict {
                        report.conflicts += 1;
                    }
                    store.insert(event);
                }
                IngestOutcome::Duplicate { .. } => report.duplicates += 1,
            }
        }
        subscription.unsubscribe();

        if let Some(path) = self.chain_store.as_deref() {
            index::save_at(path, &pipeline.chain_index())
                .with_context(|| format!("failed to save chain store {}", path.display()))?;
        }

        let filter = EventFilter {
            min_severity: self.min_severity,
            ..EventFilter::default()
        };
        report.events = store.query(&EventQuery::default().with_filter(filter));
        report.emitted = emitted.load(Ordering::Relaxed);
        report.sync = pipeline.tracker().summary();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize ingest report")?
            );
            return Ok(());
        }
        print_report(&report);
        Ok(())
    }
}

fn load_chains(path: &Path, quiet: bool) -> Result<ChainIndex> {
    let loaded = index::load_at(path)
        .with_context(|| format!("failed to load chain store {}", path.display()))?;
    let Some(file) = loaded else {
        return Ok(ChainIndex::new());
    };
    if !quiet {
        println!(
            "Continuing {} chain(s) from {} (saved {} ago)",
            file.heads.len(),
            path.display(),
            format_age(file.saved_at, Utc::now()),
        );
    }
    Ok(ChainIndex::from(file))
}

fn print_report(report: &IngestReport) {
    println!(
        "{} accepted | {} duplicate(s) | {} conflict(s)",
        report.accepted, report.duplicates, report.conflicts,
    );

    if !report.events.is_empty() {
        let rows: Vec<EventRow> = report
            .events
            .iter()
            .map(|e| EventRow {
                severity: severity_label(e.severity).to_string(),
                rule: e.matched_rule.clone(),
                review: review_label(e.requires_review),
                sync: sync_label(e.sync_status).to_string(),
                record: e.record_key().to_string(),
                title: e.title.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    let sync = &report.sync;
    println!(
        "Records: {} synced, {} pending review, {} {}",
        sync.synced,
        sync.pending,
        sync.conflict,
        if sync.conflict > 0 {
            "in conflict".red().bold().to_string()
        } else {
            "in conflict".to_string()
        },
    );
}
