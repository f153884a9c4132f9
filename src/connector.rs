//! Directed connectors binding one node's output to another node's slot.
//!
//! A connector denormalizes the category and archetype of both endpoints at
//! creation time so that structural lookups (e.g. finding the instruction
//! edge of a generator node) never have to chase node references. Endpoints
//! must reference existing nodes; dangling connectors are pruned by the
//! bulk-delete workflow whenever either endpoint is removed.

use serde::{Deserialize, Serialize};

use crate::ids::{ConnectorId, NodeId};
use crate::node::{GraphNode, NodeArchetype, NodeCategory};

/// A directed edge from a node's output into a named slot on another node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: ConnectorId,
    pub source: NodeId,
    pub source_category: NodeCategory,
    pub source_archetype: NodeArchetype,
    pub target: NodeId,
    /// Name of the parameter slot on the target this edge feeds.
    pub target_handle: String,
    pub target_category: NodeCategory,
    pub target_archetype: NodeArchetype,
}

impl Connector {
    /// Build a connector between two live nodes, denormalizing their
    /// category/archetype and minting a fresh id.
    pub fn between(source: &GraphNode, target: &GraphNode, handle: impl Into<String>) -> Self {
        Self {
            id: ConnectorId::fresh(),
            source: source.id.clone(),
            source_category: source.category,
            source_archetype: source.archetype,
            target: target.id.clone(),
            target_handle: handle.into(),
            target_category: target.category,
            target_archetype: target.archetype,
        }
    }

    /// Build a connector from endpoint descriptions rather than live nodes.
    ///
    /// Used when the source side is known only as an artifact's generator
    /// snapshot.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        source: NodeId,
        source_category: NodeCategory,
        source_archetype: NodeArchetype,
        target: NodeId,
        target_handle: impl Into<String>,
        target_category: NodeCategory,
        target_archetype: NodeArchetype,
    ) -> Self {
        Self {
            id: ConnectorId::fresh(),
            source,
            source_category,
            source_archetype,
            target,
            target_handle: target_handle.into(),
            target_category,
            target_archetype,
        }
    }

    /// Whether this connector touches the given node on either end.
    #[must_use]
    pub fn touches(&self, node: &NodeId) -> bool {
        self.source == *node || self.target == *node
    }
}
