//! Artifacts: the persisted results of generation runs.
//!
//! Each generator node owns at most one live artifact. A first completed run
//! creates it; regenerations replace its fields in place, keeping the same
//! id; it is destroyed when its generator node is removed. The `elements`
//! list records a snapshot of the instruction node that contributed to the
//! run, so the provenance of a result survives later edits to the graph.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ArtifactId, NodeId};
use crate::node::{GraphNode, NodeArchetype, NodeCategory};

/// The persisted output of a generator node's most recent successful run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: ArtifactId,
    pub title: String,
    pub content: String,
    /// Snapshot of the node that generated this artifact.
    pub generator_node: ArtifactElement,
    /// Snapshots of the nodes whose outputs fed the run.
    pub elements: Vec<ArtifactElement>,
}

/// Frozen view of a node at the moment an artifact was produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactElement {
    pub id: NodeId,
    pub name: String,
    pub category: NodeCategory,
    pub archetype: NodeArchetype,
    pub properties: FxHashMap<String, Value>,
}

impl From<&GraphNode> for ArtifactElement {
    fn from(node: &GraphNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            category: node.category,
            archetype: node.archetype,
            properties: node.properties.clone(),
        }
    }
}

/// A partial structured object streamed from a generation backend.
///
/// Every chunk replaces the previous one wholesale; fields fill in as the
/// backend makes progress and the final chunk is merged with
/// `completed: true` when the run finalizes.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialGeneration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PartialArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PartialGeneration {
    /// True when no field has been populated yet.
    ///
    /// The orchestrator transitions a node to `streaming` on the first
    /// non-empty chunk.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thinking.is_none() && self.artifact.is_none() && self.description.is_none()
    }

    /// Finalized form of this chunk: the artifact sub-object filled with
    /// defaults where absent and marked completed.
    #[must_use]
    pub fn finalized(mut self) -> Self {
        let artifact = self.artifact.take().unwrap_or_default();
        self.artifact = Some(PartialArtifact {
            completed: true,
            ..artifact
        });
        self
    }
}

/// The artifact sub-object of a streamed chunk.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl PartialArtifact {
    /// Title with the empty-string default applied.
    #[must_use]
    pub fn title_or_default(&self) -> String {
        self.title.clone().unwrap_or_default()
    }

    /// Content with the empty-string default applied.
    #[must_use]
    pub fn content_or_default(&self) -> String {
        self.content.clone().unwrap_or_default()
    }
}
