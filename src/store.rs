//! The graph store: the single logical owner of a graph.
//!
//! All mutations flow through [`GraphStore::dispatch`], which applies the
//! pure reducer under a write lock; each dispatch is atomic and that
//! atomicity is the only mutual-exclusion guarantee multi-step workflows
//! get. Orchestrator and workflow code always takes the store handle
//! explicitly and re-reads state fresh after every await, so interleaved
//! dispatches from other interactions are visible at each suspension point.
//!
//! The store also tracks in-flight multi-step operations (generation runs,
//! file attachments) by id and phase, making their intermediate states
//! observable and giving callers a cancellation handle.
//!
//! # Examples
//!
//! ```
//! use atelier::action::Action;
//! use atelier::node::{NodeBlueprint, XyPosition};
//! use atelier::state::GraphState;
//! use atelier::store::GraphStore;
//!
//! let store = GraphStore::new(GraphState::default());
//! store.dispatch(Action::add_node(
//!     &NodeBlueprint::prompt(),
//!     "Untitled node - 1",
//!     XyPosition::default(),
//!     None,
//! ));
//! assert_eq!(store.state().nodes.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::action::Action;
use crate::events::ChangeEvent;
use crate::ids::{FileId, NodeId, OperationId};
use crate::reducer::reduce;
use crate::state::GraphState;

/// Owner of one graph's state, mutated only through dispatched actions.
pub struct GraphStore {
    state: RwLock<GraphState>,
    operations: RwLock<FxHashMap<OperationId, Operation>>,
    change_tx: flume::Sender<ChangeEvent>,
    change_rx: flume::Receiver<ChangeEvent>,
}

impl GraphStore {
    /// Create a store over an initial graph state.
    #[must_use]
    pub fn new(initial: GraphState) -> Self {
        let (change_tx, change_rx) = flume::unbounded();
        Self {
            state: RwLock::new(initial),
            operations: RwLock::new(FxHashMap::default()),
            change_tx,
            change_rx,
        }
    }

    /// Apply one action atomically and publish a change event.
    pub fn dispatch(&self, action: Action) {
        debug!(action = action.label(), "dispatch");
        {
            let mut state = self.state.write();
            *state = reduce(&state, &action);
        }
        let _ = self.change_tx.send(ChangeEvent::action(action.label()));
    }

    /// A cloned snapshot of the current state.
    ///
    /// Workflows call this again after every await rather than holding a
    /// stale copy across suspension points.
    #[must_use]
    pub fn state(&self) -> GraphState {
        self.state.read().clone()
    }

    /// Run a closure against the current state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&GraphState) -> R) -> R {
        f(&self.state.read())
    }

    /// Subscribe to change events.
    ///
    /// The channel is shared, not broadcast: each event reaches exactly one
    /// receiver, so a store should have a single consuming subscriber.
    #[must_use]
    pub fn subscribe(&self) -> flume::Receiver<ChangeEvent> {
        self.change_rx.clone()
    }

    /// Register a new in-flight operation, returning its id and a handle
    /// the owning workflow polls at each suspension point.
    pub(crate) fn begin_operation(&self, kind: OperationKind) -> (OperationId, CancelHandle) {
        let id = OperationId::fresh();
        let cancel = CancelHandle::default();
        let operation = Operation {
            id: id.clone(),
            kind,
            phase: OperationPhase::Started,
            started_at: Utc::now(),
            cancel: cancel.clone(),
        };
        self.operations.write().insert(id.clone(), operation);
        let _ = self
            .change_tx
            .send(ChangeEvent::operation(id.clone(), OperationPhase::Started));
        (id, cancel)
    }

    /// Move an operation to a new phase and publish the transition.
    pub(crate) fn set_operation_phase(&self, id: &OperationId, phase: OperationPhase) {
        if let Some(operation) = self.operations.write().get_mut(id) {
            operation.phase = phase.clone();
        }
        let _ = self.change_tx.send(ChangeEvent::operation(id.clone(), phase));
    }

    /// Look up one tracked operation.
    #[must_use]
    pub fn operation(&self, id: &OperationId) -> Option<Operation> {
        self.operations.read().get(id).cloned()
    }

    /// All tracked operations, in no particular order.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.operations.read().values().cloned().collect()
    }

    /// Drop finished operations from the tracked set, returning how many
    /// were removed.
    ///
    /// Terminal operations are kept until pruned so callers can inspect the
    /// outcome of a run after it ends; a long-lived host calls this
    /// periodically to keep the set bounded. In-flight operations are never
    /// removed.
    pub fn prune_finished_operations(&self) -> usize {
        let mut operations = self.operations.write();
        let before = operations.len();
        operations.retain(|_, operation| !operation.phase.is_terminal());
        before - operations.len()
    }

    /// Request cancellation of an operation.
    ///
    /// Returns `false` if the operation is unknown. The owning workflow
    /// observes the flag at its next suspension point; the phase moves to
    /// `Cancelled` when it does.
    pub fn cancel_operation(&self, id: &OperationId) -> bool {
        match self.operations.read().get(id) {
            Some(operation) => {
                operation.cancel.request();
                true
            }
            None => false,
        }
    }
}

/// An in-flight multi-step operation tracked by the store.
#[derive(Clone, Debug)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub phase: OperationPhase,
    pub started_at: DateTime<Utc>,
    cancel: CancelHandle,
}

impl Operation {
    /// Whether cancellation has been requested for this operation.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// What kind of multi-step workflow an operation tracks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OperationKind {
    /// One generation run for a target node.
    Generation { node: NodeId },
    /// The two-step upload/parse pipeline of a file attachment.
    FileAttach { node: NodeId, file: FileId },
}

/// Observable phase of an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum OperationPhase {
    Started,
    Uploading,
    Parsing,
    Streaming,
    Finalizing,
    Completed,
    Cancelled,
    Failed { message: String },
}

impl OperationPhase {
    /// Whether the operation has finished and will see no further phases.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Failed { .. }
        )
    }
}

/// Cooperative cancellation flag shared between a store and a workflow.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub(crate) fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
