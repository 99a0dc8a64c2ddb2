pub mod classify;
pub mod ingest;
pub mod rules;

use colored::{ColoredString, Colorize};

use tidemark_core::types::{Severity, SyncStatus};

pub(crate) fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.as_str().to_uppercase();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.cyan(),
        Severity::Info => label.bright_black(),
    }
}

pub(crate) fn sync_label(status: SyncStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        SyncStatus::Synced => label.green(),
        SyncStatus::Pending => label.yellow(),
        SyncStatus::Conflict => label.red().bold(),
        SyncStatus::Stale => label.bright_black(),
    }
}

pub(crate) fn review_label(requires_review: bool) -> &'static str {
    if requires_review {
        "yes"
    } else {
        "no"
    }
}
