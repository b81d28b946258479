//! Subscription reconciliation: buffered toggles committed as a batch.
//!
//! The reconciler keeps two layers of state. The *canonical* set holds the
//! source ids the backend last confirmed as subscribed; it is never mutated
//! by a click. Toggles land in a *pending* buffer instead, and a second
//! toggle on the same source cancels the first (the buffer only ever holds
//! intents that differ from canonical state). [`SubscriptionReconciler::commit`]
//! pushes the buffer to the backend one toggle call per source and folds the
//! outcomes into a per-source report: successes update canonical state and
//! leave the buffer, failures stay pending so the user can retry them.
use crate::api::client::ApiClient;
use crate::api::types::SubscriptionAction;
use crate::api::{self, ApiError};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};

/// Toggle calls in flight at once during a commit. Sources are independent,
/// so completion order does not matter; outcomes are applied only after all
/// calls settle.
const COMMIT_CONCURRENCY: usize = 4;

// ============================================================================
// Report Types
// ============================================================================

/// Per-source failure from a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub source_id: String,
    pub message: String,
}

/// Aggregate outcome of a commit. Partial failure is normal: successes are
/// kept even when other sources fail.
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    pub succeeded: usize,
    /// Ordered by source id so output is deterministic regardless of
    /// network completion order.
    pub failures: Vec<CommitFailure>,
}

impl CommitReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded == 0 && self.failures.is_empty()
    }
}

/// How a source should be presented right now. A pending intent always
/// overrides the canonical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    Active,
    Inactive,
}

// ============================================================================
// SubscriptionReconciler
// ============================================================================

/// Canonical subscribed-ids set plus a buffer of uncommitted toggles.
#[derive(Debug, Default)]
pub struct SubscriptionReconciler {
    canonical: BTreeSet<String>,
    pending: BTreeMap<String, SubscriptionAction>,
}

impl SubscriptionReconciler {
    /// Seed from a known canonical set (typically `GET /subscriptions`).
    pub fn new(subscribed: impl IntoIterator<Item = String>) -> Self {
        Self {
            canonical: subscribed.into_iter().collect(),
            pending: BTreeMap::new(),
        }
    }

    /// Seed from the backend's view of the caller's subscriptions.
    pub async fn load(client: &ApiClient) -> Result<Self, ApiError> {
        let ids = api::subscriptions::fetch_subscribed_ids(client).await?;
        tracing::debug!(subscribed = ids.len(), "Loaded canonical subscription state");
        Ok(Self::new(ids))
    }

    /// Whether the backend last confirmed this source as subscribed.
    pub fn is_subscribed(&self, source_id: &str) -> bool {
        self.canonical.contains(source_id)
    }

    /// The uncommitted intent for this source, if any.
    pub fn pending_action(&self, source_id: &str) -> Option<SubscriptionAction> {
        self.pending.get(source_id).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Flip the pending intent for a source.
    ///
    /// The first toggle records the action that would move the source away
    /// from its canonical state; a second toggle removes the entry again.
    /// The buffer therefore never holds an intent equal to canonical state.
    pub fn toggle(&mut self, source_id: &str) {
        if self.pending.remove(source_id).is_some() {
            tracing::debug!(source = %source_id, "Cancelled pending toggle");
            return;
        }

        let action = if self.canonical.contains(source_id) {
            SubscriptionAction::Unsubscribe
        } else {
            SubscriptionAction::Subscribe
        };
        tracing::debug!(source = %source_id, action = %action, "Buffered toggle");
        self.pending.insert(source_id.to_string(), action);
    }

    /// Current presentation state: pending intent wins over canonical.
    pub fn display_state(&self, source_id: &str) -> DisplayState {
        match self.pending.get(source_id) {
            Some(SubscriptionAction::Subscribe) => DisplayState::Active,
            Some(SubscriptionAction::Unsubscribe) => DisplayState::Inactive,
            None if self.canonical.contains(source_id) => DisplayState::Active,
            None => DisplayState::Inactive,
        }
    }

    /// Push every pending toggle to the backend and fold the outcomes.
    ///
    /// One toggle request per buffered source, at most [`COMMIT_CONCURRENCY`]
    /// in flight. Outcomes are applied only after every call has settled:
    /// confirmed toggles update the canonical set and leave the buffer;
    /// failed ones stay buffered for a later retry and contribute one entry
    /// to [`CommitReport::failures`]. There is no rollback across sources.
    ///
    /// Calling with an empty buffer is a no-op that reports zero of each.
    pub async fn commit(&mut self, client: &ApiClient) -> CommitReport {
        if self.pending.is_empty() {
            return CommitReport::default();
        }

        let entries: Vec<(String, SubscriptionAction)> = self
            .pending
            .iter()
            .map(|(id, action)| (id.clone(), *action))
            .collect();

        let outcomes: Vec<(String, SubscriptionAction, Result<(), ApiError>)> =
            stream::iter(entries)
                .map(|(source_id, action)| async move {
                    let result = api::subscriptions::toggle(client, &source_id, action)
                        .await
                        .map(|_| ());
                    (source_id, action, result)
                })
                .buffer_unordered(COMMIT_CONCURRENCY)
                .collect()
                .await;

        let mut report = CommitReport::default();
        for (source_id, action, result) in outcomes {
            match result {
                Ok(()) => {
                    if action.target_state() {
                        self.canonical.insert(source_id.clone());
                    } else {
                        self.canonical.remove(&source_id);
                    }
                    self.pending.remove(&source_id);
                    report.succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!(source = %source_id, action = %action, error = %e, "Subscription toggle failed");
                    report.failures.push(CommitFailure {
                        source_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        report.failures.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failures.len(),
            still_pending = self.pending.len(),
            "Applied subscription changes"
        );
        report
    }
}

// ============================================================================
// Tests
// ============================================================================
