//! Graph nodes: the units of computation on the canvas.
//!
//! A node pairs identity and archetype with free-form properties, UI
//! metadata, a generation state machine, and an output value. Nodes are
//! owned exclusively by the graph and mutated only through dispatched
//! actions.
//!
//! # State machine
//!
//! `idle → inProgress → streaming → completed`, where `streaming` is entered
//! only once a non-empty partial chunk has arrived. `failed` is a terminal
//! state reachable from `inProgress`/`streaming` when an orchestrator run
//! errors; the triggering message is captured for display. `completed` and
//! `failed` re-enter `idle → …` on the next explicit regeneration.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::artifact::PartialGeneration;
use crate::ids::NodeId;
use crate::parameter::Parameter;
use crate::source::Source;

/// Name of the canonical instruction input slot on generator nodes.
pub const INSTRUCTION_HANDLE: &str = "instruction";

/// Property key under which a prompt node stores its source list.
pub const SOURCES_PROPERTY: &str = "sources";

/// A node in the workflow graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub name: String,
    pub category: NodeCategory,
    pub archetype: NodeArchetype,
    pub result_port_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameter>,
    pub ui: NodeUi,
    pub properties: FxHashMap<String, Value>,
    pub state: NodeState,
    pub output: NodeOutput,
}

impl GraphNode {
    /// Parse the node's `sources` property into typed source references.
    ///
    /// A missing property is an empty list. A property that exists but is
    /// not a list is malformed stored data and raises immediately rather
    /// than being coerced.
    pub fn sources(&self) -> Result<Vec<Source>, MalformedSourcesError> {
        let Some(value) = self.properties.get(SOURCES_PROPERTY) else {
            return Ok(Vec::new());
        };
        if !value.is_array() {
            return Err(MalformedSourcesError {
                node: self.id.clone(),
            });
        }
        serde_json::from_value(value.clone()).map_err(|_| MalformedSourcesError {
            node: self.id.clone(),
        })
    }
}

/// A node's `sources` property exists but is not a list of sources.
#[derive(Debug, Error, Diagnostic)]
#[error("node {node} has a sources property that is not a list of sources")]
#[diagnostic(
    code(atelier::node::malformed_sources),
    help("The sources property is maintained by the attach/detach workflow; edit it through those operations only.")
)]
pub struct MalformedSourcesError {
    pub node: NodeId,
}

/// Coarse role of a node; connectors denormalize it at creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeCategory {
    /// Produces instructions consumed by action nodes.
    Instruction,
    /// Performs generation work driven by an instruction.
    Action,
}

/// Concrete behavior of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeArchetype {
    Prompt,
    TextGenerator,
    WebSearch,
}

impl fmt::Display for NodeArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt => write!(f, "prompt"),
            Self::TextGenerator => write!(f, "textGenerator"),
            Self::WebSearch => write!(f, "webSearch"),
        }
    }
}

/// Generation state of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum NodeState {
    Idle,
    InProgress,
    Streaming,
    Completed,
    /// Terminal failure of a generation run, carrying the triggering error.
    Failed { message: String },
}

impl NodeState {
    /// Build a failed state from any displayable error.
    pub fn failed(message: impl fmt::Display) -> Self {
        NodeState::Failed {
            message: message.to_string(),
        }
    }

    /// Whether this state ends a generation run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Failed { .. })
    }
}

/// A node's output value: plain text or a partial structured generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeOutput {
    Text(String),
    Generation(PartialGeneration),
}

impl Default for NodeOutput {
    fn default() -> Self {
        NodeOutput::Text(String::new())
    }
}

impl NodeOutput {
    /// The output as plain text, if it is the text form.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeOutput::Text(text) => Some(text),
            NodeOutput::Generation(_) => None,
        }
    }
}

/// Canvas metadata attached to a node.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUi {
    pub position: XyPosition,
    #[serde(default)]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_tab: Option<PanelTab>,
}

impl NodeUi {
    /// UI metadata with only a position set.
    #[must_use]
    pub fn at(position: XyPosition) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Shallow-merge a patch into this UI metadata.
    pub fn merge(&mut self, patch: &NodeUiPatch) {
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(selected) = patch.selected {
            self.selected = selected;
        }
        if let Some(panel_tab) = patch.panel_tab {
            self.panel_tab = Some(panel_tab);
        }
    }
}

/// Position of a node on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct XyPosition {
    pub x: f64,
    pub y: f64,
}

impl XyPosition {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Active tab of a node's property panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelTab {
    Property,
    Result,
}

/// Shallow patch applied to a node's UI metadata.
///
/// `None` fields are left unchanged; this mirrors the batch UI-merge action.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUiPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<XyPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_tab: Option<PanelTab>,
}

/// Template from which the add-node action constructs a full node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeBlueprint {
    pub category: NodeCategory,
    pub archetype: NodeArchetype,
    pub result_port_label: String,
    pub parameters: Option<Parameter>,
}

impl NodeBlueprint {
    /// Blueprint of an instruction prompt node.
    #[must_use]
    pub fn prompt() -> Self {
        Self {
            category: NodeCategory::Instruction,
            archetype: NodeArchetype::Prompt,
            result_port_label: "Instruction".to_string(),
            parameters: None,
        }
    }

    /// Blueprint of a text generator node with its instruction slot.
    #[must_use]
    pub fn text_generator() -> Self {
        Self {
            category: NodeCategory::Action,
            archetype: NodeArchetype::TextGenerator,
            result_port_label: "Result".to_string(),
            parameters: Some(Self::instruction_parameters()),
        }
    }

    /// Blueprint of a web search node with its instruction slot.
    #[must_use]
    pub fn web_search() -> Self {
        Self {
            category: NodeCategory::Action,
            archetype: NodeArchetype::WebSearch,
            result_port_label: "Result".to_string(),
            parameters: Some(Self::instruction_parameters()),
        }
    }

    fn instruction_parameters() -> Parameter {
        let mut properties = FxHashMap::default();
        properties.insert(
            INSTRUCTION_HANDLE.to_string(),
            Parameter::string("Instruction"),
        );
        Parameter::object(properties)
    }
}
