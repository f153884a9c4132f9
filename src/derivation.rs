//! Eager derivation of secondary graph state.
//!
//! Two views are derived from the node and connector lists: the required
//! actions (structural problems the user still has to fix) and the inferred
//! request interface (the external input shape the graph as a whole
//! expects). Derivation is a pure, total function of the structural state
//! and is recomputed synchronously inside the same reducer step that changed
//! connectivity, so readers are never behind the structure they observe.

use serde::{Deserialize, Serialize};

use crate::connector::Connector;
use crate::ids::NodeId;
use crate::node::{GraphNode, NodeArchetype, NodeCategory, INSTRUCTION_HANDLE};

/// Derived views recomputed on every structural change.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedState {
    pub required_actions: Vec<RequiredAction>,
    pub request_interface: RequestInterface,
}

/// A structural problem the graph cannot run without fixing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RequiredAction {
    /// An action node has no incoming instruction connector.
    ConnectInstruction { node: NodeId },
    /// A declared input slot has no connector bound to it.
    BindSourceSlot { node: NodeId, handle: String },
}

/// The external input shape the graph expects when invoked.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestInterface {
    pub parameters: Vec<RequestParameter>,
}

/// One externally supplied input, rooted at a prompt node with no upstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestParameter {
    pub node: NodeId,
    pub name: String,
    pub shape: RequestShape,
}

/// Value shape of a request parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestShape {
    Text,
}

/// Recompute both derived views from the structural state.
///
/// Pure and total: any node/connector list yields a result, and node order
/// determines output order, so equal structures derive equal views.
#[must_use]
pub fn derive(nodes: &[GraphNode], connectors: &[Connector]) -> DerivedState {
    DerivedState {
        required_actions: required_actions(nodes, connectors),
        request_interface: request_interface(nodes, connectors),
    }
}

fn required_actions(nodes: &[GraphNode], connectors: &[Connector]) -> Vec<RequiredAction> {
    let mut actions = Vec::new();
    for node in nodes {
        let slot_bound = |handle: &str| {
            connectors
                .iter()
                .any(|connector| connector.target == node.id && connector.target_handle == handle)
        };

        if node.category == NodeCategory::Action && !slot_bound(INSTRUCTION_HANDLE) {
            actions.push(RequiredAction::ConnectInstruction {
                node: node.id.clone(),
            });
        }

        let Some(object) = node.parameters.as_ref().and_then(|p| p.as_object()) else {
            continue;
        };
        let mut handles: Vec<&String> = object.properties.keys().collect();
        handles.sort();
        for handle in handles {
            if handle == INSTRUCTION_HANDLE {
                continue; // covered by ConnectInstruction above
            }
            if !slot_bound(handle) {
                actions.push(RequiredAction::BindSourceSlot {
                    node: node.id.clone(),
                    handle: handle.clone(),
                });
            }
        }
    }
    actions
}

fn request_interface(nodes: &[GraphNode], connectors: &[Connector]) -> RequestInterface {
    let parameters = nodes
        .iter()
        .filter(|node| node.archetype == NodeArchetype::Prompt)
        .filter(|node| !connectors.iter().any(|c| c.target == node.id))
        .map(|node| RequestParameter {
            node: node.id.clone(),
            name: node.name.clone(),
            shape: RequestShape::Text,
        })
        .collect();
    RequestInterface { parameters }
}
