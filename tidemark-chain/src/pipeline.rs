//! Ingestion entrypoint shared by hosts and the CLI.
//!
//! [`ChangePipeline::submit`] runs one change through classification, default
//! text rendering, hashing, chain check-and-advance, sync tracking, and bus
//! emission. The caller owns durable storage of the returned event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tidemark_bus::EventBus;
use tidemark_classifier::{Classification, Classifier, ClassifyInput};
use tidemark_core::error::ReconciliationError;
use tidemark_core::types::{
    Actor, ChangeDiff, ChangeEvent, OrgId, ReconciliationStatus, RecordKey, SourceKind,
    SyncStatus,
};
use tidemark_core::ReviewAction;
use tidemark_render::{ChangeText, TemplateEngine};

use crate::canonical::{content_hash, HashSubject};
use crate::error::IngestError;
use crate::index::{ChainIndex, ChainLink};
use crate::tracker::SyncTracker;

// ---------------------------------------------------------------------------
// Input / outcome
// ---------------------------------------------------------------------------

/// A raw change notification as a collaborator reports it.
///
/// `P` is the opaque payload type. It only has to be serializable; anything
/// that cannot become JSON fails ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeInput<P = Value> {
    pub organization_id: OrgId,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    pub change_type: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub entity_title: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub diff: Option<ChangeDiff>,
    #[serde(default)]
    pub payload: Option<P>,
    #[serde(default)]
    pub actor: Option<Actor>,
    /// Hash the producer believes is the record's latest.
    ///
    /// `None` opts out of break detection: the event links after whatever
    /// head is stored and never raises `conflict`. A producer that tracks
    /// chains declares a hash on every event after the first one it sees
    /// for a record.
    #[serde(default)]
    pub previous_hash: Option<String>,
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
}

impl ChangeInput<Value> {
    pub fn new(record: RecordKey, change_type: impl Into<String>, source: SourceKind) -> Self {
        Self {
            organization_id: record.organization_id,
            source,
            source_name: None,
            source_id: None,
            change_type: change_type.into(),
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            entity_title: None,
            title: None,
            description: None,
            diff: None,
            payload: None,
            actor: None,
            previous_hash: None,
            detected_at: None,
        }
    }
}

impl<P> ChangeInput<P> {
    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(
            self.organization_id.clone(),
            self.entity_type.clone(),
            self.entity_id.clone(),
        )
    }

    pub fn with_diff(mut self, diff: ChangeDiff) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Replace the payload, possibly changing its type.
    pub fn with_payload<Q>(self, payload: Q) -> ChangeInput<Q> {
        ChangeInput {
            organization_id: self.organization_id,
            source: self.source,
            source_name: self.source_name,
            source_id: self.source_id,
            change_type: self.change_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            entity_title: self.entity_title,
            title: self.title,
            description: self.description,
            diff: self.diff,
            payload: Some(payload),
            actor: self.actor,
            previous_hash: self.previous_hash,
            detected_at: self.detected_at,
        }
    }

    pub fn with_entity_title(mut self, title: impl Into<String>) -> Self {
        self.entity_title = Some(title.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_previous_hash(mut self, hash: impl Into<String>) -> Self {
        self.previous_hash = Some(hash.into());
        self
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// A new event was chained and emitted.
    Accepted(ChangeEvent),
    /// Identical to the record's latest accepted change; nothing recorded.
    Duplicate { content_hash: String },
}

impl IngestOutcome {
    pub fn event(&self) -> Option<&ChangeEvent> {
        match self {
            IngestOutcome::Accepted(event) => Some(event),
            IngestOutcome::Duplicate { .. } => None,
        }
    }

    pub fn into_event(self) -> Option<ChangeEvent> {
        match self {
            IngestOutcome::Accepted(event) => Some(event),
            IngestOutcome::Duplicate { .. } => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate { .. })
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Composed ingestion pipeline.
///
/// The chain index sits behind one lock, so check-and-advance is atomic per
/// pipeline and two concurrent submissions cannot claim the same predecessor.
pub struct ChangePipeline {
    classifier: Classifier,
    renderer: Option<Arc<dyn TemplateEngine>>,
    bus: Option<Arc<EventBus>>,
    chains: Mutex<ChainIndex>,
    tracker: Arc<SyncTracker>,
}

impl ChangePipeline {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            renderer: None,
            bus: None,
            chains: Mutex::new(ChainIndex::new()),
            tracker: Arc::new(SyncTracker::new()),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateEngine>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Continue from previously persisted chain heads.
    pub fn with_chain_index(mut self, index: ChainIndex) -> Self {
        self.chains = Mutex::new(index);
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<SyncTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        &self.tracker
    }

    /// Snapshot of the chain heads, for persistence.
    pub fn chain_index(&self) -> ChainIndex {
        self.chains.lock().clone()
    }

    /// Latest accepted hash for `key`.
    pub fn latest_hash(&self, key: &RecordKey) -> Option<String> {
        self.chains.lock().latest(key).map(str::to_owned)
    }

    /// Ingest one change.
    pub fn submit<P: Serialize>(&self, input: ChangeInput<P>) -> Result<IngestOutcome, IngestError> {
        let payload = input
            .payload
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(IngestError::Serialization)?;

        let key = input.record_key();
        let hash = content_hash(&HashSubject {
            organization_id: &input.organization_id,
            entity_type: &input.entity_type,
            entity_id: &input.entity_id,
            change_type: &input.change_type,
            diff: input.diff.as_ref(),
            payload: payload.as_ref(),
        })?;

        let mut classify_input =
            ClassifyInput::new(&input.change_type, &input.entity_type, input.source);
        if let Some(diff) = input.diff.as_ref() {
            classify_input = classify_input.with_diff(diff);
        }
        if let Some(payload) = payload.as_ref() {
            classify_input = classify_input.with_payload(payload);
        }
        let class = self.classifier.classify(&classify_input);

        let (title, description) = self.text_for(&input, &class);

        let (event, link) = {
            let mut chains = self.chains.lock();
            let link = ChainLink::compute(
                hash,
                input.previous_hash.as_deref(),
                chains.latest(&key),
            );
            if link.duplicate {
                tracing::debug!(
                    record = %key,
                    content_hash = %link.content_hash,
                    "duplicate change absorbed",
                );
                return Ok(IngestOutcome::Duplicate {
                    content_hash: link.content_hash,
                });
            }

            let event = build_event(input, payload, &class, title, description, &link);
            chains.advance(key, link.content_hash.clone(), event.id);
            // Tracker updates follow chain order; lock order is chains then tracker.
            self.tracker.record_chained(&event, link.chain_broken);
            (event, link)
        };

        if link.chain_broken {
            tracing::warn!(
                record = %event.record_key(),
                event_id = %event.id,
                content_hash = %event.content_hash,
                stored_previous = ?event.previous_hash,
                "hash chain broken; event accepted as conflict",
            );
        } else {
            tracing::info!(
                record = %event.record_key(),
                event_id = %event.id,
                severity = %event.severity,
                rule = %event.matched_rule,
                "change accepted",
            );
        }

        if let Some(bus) = &self.bus {
            bus.emit(event.clone());
        }
        Ok(IngestOutcome::Accepted(event))
    }

    /// Apply a review decision and settle the record's sync status.
    pub fn review(
        &self,
        event: &mut ChangeEvent,
        action: ReviewAction,
    ) -> Result<ReconciliationStatus, ReconciliationError> {
        let status = event.apply_review(action, Utc::now())?;
        if let Some(sync) = self.tracker.record_reconciled(event) {
            event.sync_status = sync;
        }
        Ok(status)
    }

    fn text_for<P>(&self, input: &ChangeInput<P>, class: &Classification) -> (String, Option<String>) {
        if let Some(title) = input.title.clone() {
            return (title, input.description.clone());
        }
        let Some(renderer) = &self.renderer else {
            return (fallback_title(&input.change_type), input.description.clone());
        };
        let text = ChangeText {
            rule: class.rule,
            change_type: &input.change_type,
            entity_type: &input.entity_type,
            entity_id: &input.entity_id,
            entity_title: input.entity_title.as_deref(),
            source: input.source,
            source_name: input.source_name.as_deref(),
            actor: input.actor.as_ref(),
            diff: input.diff.as_ref(),
        };
        match renderer.render_change(&text) {
            Ok(rendered) => (
                rendered.title,
                input.description.clone().or(Some(rendered.description)),
            ),
            Err(err) => {
                tracing::warn!(
                    change_type = %input.change_type,
                    error = %err,
                    "default text rendering failed; using change type as title",
                );
                (fallback_title(&input.change_type), input.description.clone())
            }
        }
    }
}

impl std::fmt::Debug for ChangePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePipeline")
            .field("classifier", &self.classifier)
            .field("renderer", &self.renderer.is_some())
            .field("bus", &self.bus)
            .field("chains", &self.chains.lock().len())
            .finish()
    }
}

fn fallback_title(change_type: &str) -> String {
    change_type.replace(['_', '-', '.'], " ")
}

fn build_event<P>(
    input: ChangeInput<P>,
    payload: Option<Value>,
    class: &Classification,
    title: String,
    description: Option<String>,
    link: &ChainLink,
) -> ChangeEvent {
    let now = Utc::now();
    ChangeEvent {
        id: Uuid::new_v4(),
        organization_id: input.organization_id,
        source: input.source,
        source_name: input.source_name,
        source_id: input.source_id,
        change_type: input.change_type,
        entity_type: input.entity_type,
        entity_id: input.entity_id,
        entity_title: input.entity_title,
        severity: class.severity,
        requires_review: class.requires_review,
        matched_rule: class.rule.to_string(),
        title,
        description,
        diff: input.diff,
        payload,
        actor: input.actor,
        reconciliation_status: ReconciliationStatus::initial(class.requires_review),
        reviewed_by: None,
        reviewed_at: None,
        review_notes: None,
        content_hash: link.content_hash.clone(),
        previous_hash: link.previous_hash.clone(),
        sync_status: SyncStatus::after_chain(link.chain_broken, class.requires_review),
        detected_at: input.detected_at.unwrap_or(now),
        created_at: now,
    }
}
