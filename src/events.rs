//! Change events published by the graph store.
//!
//! Every applied action and every operation phase transition is published on
//! a `flume` channel so an observer (a canvas UI, a test harness) can react
//! without polling the store. The channel is multi-consumer but not
//! broadcast: each event is delivered to exactly one receiver, so a store
//! should have a single consuming subscriber. The channel is unbounded, and
//! the store keeps its own receiver alive; events published before a
//! subscriber drains them stay queued until the store is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ids::OperationId;
use crate::store::OperationPhase;

/// A single change observed on the store.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub when: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub(crate) fn action(label: &'static str) -> Self {
        Self {
            when: Utc::now(),
            kind: ChangeKind::Action {
                action: label.to_string(),
            },
        }
    }

    pub(crate) fn operation(id: OperationId, phase: OperationPhase) -> Self {
        Self {
            when: Utc::now(),
            kind: ChangeKind::Operation { id, phase },
        }
    }
}

/// What changed.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeKind {
    /// An action was applied by the reducer.
    Action { action: String },
    /// A tracked multi-step operation moved to a new phase.
    Operation {
        id: OperationId,
        phase: OperationPhase,
    },
}
