//! Review workflow for a single change event.
//!
//! ```text
//!            ┌──────────► approved
//! pending ───┼──────────► rejected
//!            └──────────► auto_resolved
//! none      (no review required; terminal)
//! ```
//!
//! `approved`, `rejected`, `auto_resolved`, and `none` accept no further
//! transition. A correction is a fresh event, never a reopened one.

use chrono::{DateTime, Utc};

use crate::error::ReconciliationError;
use crate::types::{ChangeEvent, ReconciliationStatus};

impl ReconciliationStatus {
    /// State assigned at event creation.
    pub fn initial(requires_review: bool) -> Self {
        if requires_review {
            ReconciliationStatus::Pending
        } else {
            ReconciliationStatus::None
        }
    }

    /// `true` once review has settled (or was never needed).
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReconciliationStatus::Pending)
    }

    pub fn can_transition_to(self, to: ReconciliationStatus) -> bool {
        matches!(
            (self, to),
            (
                ReconciliationStatus::Pending,
                ReconciliationStatus::Approved
                    | ReconciliationStatus::Rejected
                    | ReconciliationStatus::AutoResolved
            )
        )
    }

    /// Validate `self -> to` and return the new state.
    pub fn transition(self, to: ReconciliationStatus) -> Result<Self, ReconciliationError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(ReconciliationError::InvalidTransition { from: self, to })
        }
    }
}

/// A reviewer's (or the system's) decision on a pending event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    Approve {
        reviewer: String,
        notes: Option<String>,
    },
    Reject {
        reviewer: String,
        notes: Option<String>,
    },
    /// System-driven resolution; no reviewer identity is recorded.
    AutoResolve { notes: Option<String> },
}

impl ReviewAction {
    pub fn target(&self) -> ReconciliationStatus {
        match self {
            ReviewAction::Approve { .. } => ReconciliationStatus::Approved,
            ReviewAction::Reject { .. } => ReconciliationStatus::Rejected,
            ReviewAction::AutoResolve { .. } => ReconciliationStatus::AutoResolved,
        }
    }
}

impl ChangeEvent {
    /// Apply a review decision. On error the event is left untouched.
    pub fn apply_review(
        &mut self,
        action: ReviewAction,
        at: DateTime<Utc>,
    ) -> Result<ReconciliationStatus, ReconciliationError> {
        let next = self.reconciliation_status.transition(action.target())?;
        match action {
            ReviewAction::Approve { reviewer, notes } | ReviewAction::Reject { reviewer, notes } => {
                self.reviewed_by = Some(reviewer);
                self.reviewed_at = Some(at);
                self.review_notes = notes;
            }
            ReviewAction::AutoResolve { notes } => {
                self.reviewed_at = Some(at);
                if notes.is_some() {
                    self.review_notes = notes;
                }
            }
        }
        self.reconciliation_status = next;
        tracing::debug!(
            event_id = %self.id,
            status = %next,
            "reconciliation status updated",
        );
        Ok(next)
    }

    /// Request a raw status change without reviewer metadata.
    ///
    /// Only `pending -> auto_resolved` is reachable this way in practice;
    /// human decisions go through [`ChangeEvent::apply_review`].
    pub fn transition_to(
        &mut self,
        to: ReconciliationStatus,
    ) -> Result<ReconciliationStatus, ReconciliationError> {
        let next = self.reconciliation_status.transition(to)?;
        self.reconciliation_status = next;
        Ok(next)
    }
}
