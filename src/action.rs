//! The graph mutation protocol.
//!
//! Every change to a [`GraphState`](crate::state::GraphState) is expressed
//! as one of these actions and applied by the reducer. Constructors on
//! [`Action`] take care of identity minting and endpoint denormalization so
//! callers never hand-assemble entities.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::{Artifact, PartialGeneration};
use crate::connector::Connector;
use crate::ids::{ArtifactId, ConnectorId, NodeId};
use crate::node::{
    GraphNode, NodeBlueprint, NodeOutput, NodeState, NodeUi, NodeUiPatch, PanelTab, XyPosition,
};
use crate::parameter::Parameter;

/// One atomic graph mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Append a fully constructed node.
    AddNode { node: GraphNode },
    /// Remove a node by id. Does not cascade: dependent connectors and
    /// artifacts must already be gone (the bulk-delete workflow orders
    /// this).
    RemoveNode { node: NodeId },
    /// Append a connector.
    AddConnector { connector: Connector },
    /// Remove a connector by id.
    RemoveConnector { connector: ConnectorId },
    /// Replace the set of selected node ids.
    SelectNode { selected: Vec<NodeId> },
    /// Set the active property-panel tab for one node.
    SetPanelTab { node: NodeId, panel_tab: PanelTab },
    /// Shallow-merge a single key/value pair into a node's properties.
    UpdateNodeProperties {
        node: NodeId,
        key: String,
        value: Value,
    },
    /// Shallow-merge UI metadata for a batch of nodes in one step.
    UpdateNodesUi { updates: Vec<NodeUiUpdate> },
    /// Replace a node's output wholesale.
    SetNodeOutput { node: NodeId, output: NodeOutput },
    /// Replace a node's output with a partial structured generation.
    SetTextGenerationNodeOutput {
        node: NodeId,
        output: PartialGeneration,
    },
    /// Transition a node's generation state.
    UpdateNodeState { node: NodeId, state: NodeState },
    /// Create the artifact for a generator node, or replace the fields of
    /// the existing one in place (same id).
    AddOrReplaceArtifact { artifact: Artifact },
    /// Remove an artifact by id.
    RemoveArtifact { artifact: ArtifactId },
    /// Insert a named entry into a node's object parameter map.
    AddParameterToNode {
        node: NodeId,
        key: String,
        parameter: Parameter,
    },
    /// Delete a named entry from a node's object parameter map.
    RemoveParameterFromNode { node: NodeId, key: String },
}

/// One entry of the batch UI-merge action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUiUpdate {
    pub node: NodeId,
    pub ui: NodeUiPatch,
}

impl Action {
    /// Construct an add-node action from a blueprint: fresh id, idle state,
    /// empty output.
    pub fn add_node(
        blueprint: &NodeBlueprint,
        name: impl Into<String>,
        position: XyPosition,
        properties: Option<FxHashMap<String, Value>>,
    ) -> Self {
        Action::AddNode {
            node: GraphNode {
                id: NodeId::fresh(),
                name: name.into(),
                category: blueprint.category,
                archetype: blueprint.archetype,
                result_port_label: blueprint.result_port_label.clone(),
                parameters: blueprint.parameters.clone(),
                ui: NodeUi::at(position),
                properties: properties.unwrap_or_default(),
                state: NodeState::Idle,
                output: NodeOutput::default(),
            },
        }
    }

    /// Construct an add-connector action between two live nodes.
    pub fn add_connector(
        source: &GraphNode,
        target: &GraphNode,
        handle: impl Into<String>,
    ) -> Self {
        Action::AddConnector {
            connector: Connector::between(source, target, handle),
        }
    }

    /// Short label for logs and change events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Action::AddNode { .. } => "addNode",
            Action::RemoveNode { .. } => "removeNode",
            Action::AddConnector { .. } => "addConnector",
            Action::RemoveConnector { .. } => "removeConnector",
            Action::SelectNode { .. } => "selectNode",
            Action::SetPanelTab { .. } => "setPanelTab",
            Action::UpdateNodeProperties { .. } => "updateNodeProperties",
            Action::UpdateNodesUi { .. } => "updateNodesUI",
            Action::SetNodeOutput { .. } => "setNodeOutput",
            Action::SetTextGenerationNodeOutput { .. } => "setTextGenerationNodeOutput",
            Action::UpdateNodeState { .. } => "updateNodeState",
            Action::AddOrReplaceArtifact { .. } => "addOrReplaceArtifact",
            Action::RemoveArtifact { .. } => "removeArtifact",
            Action::AddParameterToNode { .. } => "addParameterToNode",
            Action::RemoveParameterFromNode { .. } => "removeParameterFromNode",
        }
    }

    /// Whether this action changes graph structure and therefore requires
    /// derived state to be recomputed in the same reducer step.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Action::AddNode { .. }
                | Action::RemoveNode { .. }
                | Action::AddConnector { .. }
                | Action::RemoveConnector { .. }
                | Action::AddParameterToNode { .. }
                | Action::RemoveParameterFromNode { .. }
        )
    }
}
