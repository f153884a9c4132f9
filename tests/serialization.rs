//! Wire-form stability and lossless graph round-trips.

mod common;

use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

use atelier::action::Action;
use atelier::artifact::{Artifact, ArtifactElement};
use atelier::connector::Connector;
use atelier::ids::{ArtifactId, NodeId};
use atelier::node::{
    GraphNode, NodeArchetype, NodeCategory, NodeOutput, NodeState, NodeUi, PanelTab, XyPosition,
};
use atelier::state::GraphState;

fn archetype_strategy() -> impl Strategy<Value = NodeArchetype> {
    prop_oneof![
        Just(NodeArchetype::Prompt),
        Just(NodeArchetype::TextGenerator),
        Just(NodeArchetype::WebSearch),
    ]
}

fn node_state_strategy() -> impl Strategy<Value = NodeState> {
    prop_oneof![
        Just(NodeState::Idle),
        Just(NodeState::InProgress),
        Just(NodeState::Streaming),
        Just(NodeState::Completed),
        "[a-z ]{1,24}".prop_map(|message| NodeState::Failed { message }),
    ]
}

type NodeParts = (
    String,
    NodeArchetype,
    NodeState,
    (f64, f64),
    bool,
    Option<PanelTab>,
    String,
);

fn node_parts_strategy() -> impl Strategy<Value = NodeParts> {
    (
        "[A-Za-z][A-Za-z0-9 ]{0,16}",
        archetype_strategy(),
        node_state_strategy(),
        any::<(f64, f64)>().prop_filter("finite positions", |(x, y)| x.is_finite() && y.is_finite()),
        any::<bool>(),
        option::of(prop_oneof![Just(PanelTab::Property), Just(PanelTab::Result)]),
        "[a-z ]{0,16}",
    )
}

fn build_node(index: usize, parts: NodeParts) -> GraphNode {
    let (name, archetype, state, (x, y), selected, panel_tab, output) = parts;
    let category = match archetype {
        NodeArchetype::Prompt => NodeCategory::Instruction,
        _ => NodeCategory::Action,
    };
    GraphNode {
        id: NodeId::from_raw(format!("nd_{index}")),
        name,
        category,
        archetype,
        result_port_label: "Result".to_string(),
        parameters: None,
        ui: NodeUi {
            position: XyPosition::new(x, y),
            selected,
            panel_tab,
        },
        properties: Default::default(),
        state,
        output: NodeOutput::Text(output),
    }
}

fn graph_strategy() -> impl Strategy<Value = GraphState> {
    (
        vec(node_parts_strategy(), 1..8),
        vec(any::<(prop::sample::Index, prop::sample::Index)>(), 0..6),
    )
        .prop_map(|(parts, pairs)| {
            let nodes: Vec<GraphNode> = parts
                .into_iter()
                .enumerate()
                .map(|(index, parts)| build_node(index, parts))
                .collect();
            let connectors: Vec<Connector> = pairs
                .into_iter()
                .map(|(a, b)| {
                    let source = a.get(&nodes);
                    let target = b.get(&nodes);
                    Connector::between(source, target, "instruction")
                })
                .collect();
            let artifacts: Vec<Artifact> = nodes
                .iter()
                .filter(|node| node.archetype == NodeArchetype::TextGenerator)
                .map(|node| Artifact {
                    id: ArtifactId::from_raw(format!("artf_{}", node.id)),
                    title: node.name.clone(),
                    content: "generated".to_string(),
                    generator_node: ArtifactElement::from(node),
                    elements: vec![],
                })
                .collect();
            let mut state = GraphState {
                nodes,
                connectors,
                artifacts,
                derived: Default::default(),
            };
            state.derived = atelier::derivation::derive(&state.nodes, &state.connectors);
            state
        })
}

proptest! {
    #[test]
    fn graph_round_trips_losslessly(state in graph_strategy()) {
        let json = state.to_json().unwrap();
        let restored = GraphState::from_json(&json).unwrap();
        prop_assert_eq!(state, restored);
    }
}

#[test]
fn extreme_float_positions_survive_the_round_trip() {
    // Values near the edge of f64 print with 17 significant digits; the
    // JSON layer must parse them back to the identical bit pattern.
    let position = XyPosition::new(-9.419224677535293e125, 5e-324);
    let node = build_node(
        0,
        (
            "Prompt".to_string(),
            NodeArchetype::Prompt,
            NodeState::Idle,
            (position.x, position.y),
            false,
            None,
            String::new(),
        ),
    );
    let mut state = GraphState {
        nodes: vec![node],
        connectors: vec![],
        artifacts: vec![],
        derived: Default::default(),
    };
    state.derived = atelier::derivation::derive(&state.nodes, &state.connectors);
    let restored = GraphState::from_json(&state.to_json().unwrap()).unwrap();
    assert_eq!(restored.nodes[0].ui.position, position);
}

#[test]
fn action_wire_form_is_internally_tagged() {
    let action = Action::SelectNode {
        selected: vec![NodeId::from_raw("nd_1")],
    };
    let json = serde_json::to_value(&action).unwrap();
    assert_eq!(json["type"], "selectNode");
    assert_eq!(json["selected"][0], "nd_1");

    let back: Action = serde_json::from_value(json).unwrap();
    assert_eq!(back, action);
}

#[test]
fn derived_state_defaults_when_absent_from_stored_graphs() {
    // Graphs persisted before derivation existed carry no derived field.
    let restored = GraphState::from_json(r#"{"nodes":[],"connectors":[],"artifacts":[]}"#).unwrap();
    assert!(restored.derived.required_actions.is_empty());
    assert!(restored.derived.request_interface.parameters.is_empty());
}

#[test]
fn node_wire_form_uses_camel_case_keys() {
    let store = common::store();
    let action = Action::add_node(
        &atelier::node::NodeBlueprint::text_generator(),
        "Generator",
        XyPosition::default(),
        None,
    );
    store.dispatch(action);
    let json = serde_json::to_value(store.state()).unwrap();
    let node = &json["nodes"][0];
    assert_eq!(node["resultPortLabel"], "Result");
    assert_eq!(node["state"]["status"], "idle");
    assert_eq!(node["parameters"]["object"], "objectParameter");
    assert_eq!(
        node["parameters"]["properties"]["instruction"]["object"],
        "stringParameter"
    );
}
