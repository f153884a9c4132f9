//! The pure graph reducer.
//!
//! `reduce` maps `(state, action)` to a new state. It is total over the
//! action set: actions referencing ids that no longer exist are no-ops, and
//! no input raises. Unknown action shapes are impossible by construction;
//! the match below is exhaustive over [`Action`].
//!
//! After any structural action the derived views are recomputed within the
//! same step, so a reader observing the returned state never sees stale
//! required actions or request interface.

use crate::action::Action;
use crate::derivation::derive;
use crate::node::NodeOutput;
use crate::parameter::Parameter;
use crate::state::GraphState;

/// Apply one action to a graph state, returning the next state.
#[must_use]
pub fn reduce(state: &GraphState, action: &Action) -> GraphState {
    let mut next = state.clone();
    apply(&mut next, action);
    if action.is_structural() {
        next.derived = derive(&next.nodes, &next.connectors);
    }
    next
}

fn apply(state: &mut GraphState, action: &Action) {
    match action {
        Action::AddNode { node } => {
            state.nodes.push(node.clone());
        }
        Action::RemoveNode { node } => {
            state.nodes.retain(|existing| existing.id != *node);
        }
        Action::AddConnector { connector } => {
            state.connectors.push(connector.clone());
        }
        Action::RemoveConnector { connector } => {
            state.connectors.retain(|existing| existing.id != *connector);
        }
        Action::SelectNode { selected } => {
            for node in &mut state.nodes {
                node.ui.selected = selected.contains(&node.id);
            }
        }
        Action::SetPanelTab { node, panel_tab } => {
            if let Some(node) = state.node_mut(node) {
                node.ui.panel_tab = Some(*panel_tab);
            }
        }
        Action::UpdateNodeProperties { node, key, value } => {
            if let Some(node) = state.node_mut(node) {
                node.properties.insert(key.clone(), value.clone());
            }
        }
        Action::UpdateNodesUi { updates } => {
            for update in updates {
                if let Some(node) = state.node_mut(&update.node) {
                    node.ui.merge(&update.ui);
                }
            }
        }
        Action::SetNodeOutput { node, output } => {
            if let Some(node) = state.node_mut(node) {
                node.output = output.clone();
            }
        }
        Action::SetTextGenerationNodeOutput { node, output } => {
            if let Some(node) = state.node_mut(node) {
                node.output = NodeOutput::Generation(output.clone());
            }
        }
        Action::UpdateNodeState {
            node,
            state: node_state,
        } => {
            if let Some(node) = state.node_mut(node) {
                node.state = node_state.clone();
            }
        }
        Action::AddOrReplaceArtifact { artifact } => {
            match state
                .artifacts
                .iter_mut()
                .find(|existing| existing.generator_node.id == artifact.generator_node.id)
            {
                Some(existing) => {
                    // Replace fields in place; the stored id stays stable
                    // across regenerations.
                    let id = existing.id.clone();
                    *existing = artifact.clone();
                    existing.id = id;
                }
                None => state.artifacts.push(artifact.clone()),
            }
        }
        Action::RemoveArtifact { artifact } => {
            state.artifacts.retain(|existing| existing.id != *artifact);
        }
        Action::AddParameterToNode {
            node,
            key,
            parameter,
        } => {
            if let Some(node) = state.node_mut(node) {
                match node.parameters.as_mut() {
                    Some(parameters) => {
                        if let Some(object) = parameters.as_object_mut() {
                            object.properties.insert(key.clone(), parameter.clone());
                        }
                    }
                    None => {
                        let mut properties = rustc_hash::FxHashMap::default();
                        properties.insert(key.clone(), parameter.clone());
                        node.parameters = Some(Parameter::object(properties));
                    }
                }
            }
        }
        Action::RemoveParameterFromNode { node, key } => {
            if let Some(node) = state.node_mut(node) {
                if let Some(object) = node.parameters.as_mut().and_then(|p| p.as_object_mut()) {
                    object.properties.remove(key);
                }
            }
        }
    }
}
