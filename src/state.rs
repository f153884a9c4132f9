//! The graph state container.
//!
//! `GraphState` is the single source of truth for a canvas: nodes,
//! connectors, artifacts, plus the eagerly recomputed [`DerivedState`].
//! It is held in memory and mutated only through the reducer; persistence
//! is an external collaborator concern beyond the guarantee that the whole
//! state round-trips losslessly through JSON.
//!
//! # Examples
//!
//! ```
//! use atelier::state::GraphState;
//!
//! let state = GraphState::default();
//! let json = state.to_json().unwrap();
//! let restored = GraphState::from_json(&json).unwrap();
//! assert_eq!(state, restored);
//! ```

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::connector::Connector;
use crate::derivation::DerivedState;
use crate::ids::{ArtifactId, ConnectorId, NodeId};
use crate::node::GraphNode;

/// Full state of one workflow graph.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphState {
    pub nodes: Vec<GraphNode>,
    pub connectors: Vec<Connector>,
    pub artifacts: Vec<Artifact>,
    /// Derived views; always consistent with `nodes`/`connectors` because
    /// the reducer recomputes it within the same structural step.
    #[serde(default)]
    pub derived: DerivedState,
}

impl GraphState {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == *id)
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|node| node.id == *id)
    }

    /// Look up a connector by id.
    #[must_use]
    pub fn connector(&self, id: &ConnectorId) -> Option<&Connector> {
        self.connectors.iter().find(|connector| connector.id == *id)
    }

    /// Look up an artifact by id.
    #[must_use]
    pub fn artifact(&self, id: &ArtifactId) -> Option<&Artifact> {
        self.artifacts.iter().find(|artifact| artifact.id == *id)
    }

    /// The live artifact owned by a generator node, if any.
    ///
    /// At most one artifact exists per generator node; the add-or-replace
    /// action maintains that invariant.
    #[must_use]
    pub fn artifact_for_generator(&self, node: &NodeId) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|artifact| artifact.generator_node.id == *node)
    }

    /// Connectors leaving the given node.
    pub fn outgoing_connectors<'a>(
        &'a self,
        node: &'a NodeId,
    ) -> impl Iterator<Item = &'a Connector> + 'a {
        self.connectors
            .iter()
            .filter(move |connector| connector.source == *node)
    }

    /// Connectors arriving at the given node.
    pub fn incoming_connectors<'a>(
        &'a self,
        node: &'a NodeId,
    ) -> impl Iterator<Item = &'a Connector> + 'a {
        self.connectors
            .iter()
            .filter(move |connector| connector.target == *node)
    }

    /// Nodes currently selected on the canvas.
    pub fn selected_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|node| node.ui.selected)
    }

    /// Serialize the full graph to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore a graph from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
