//! # Atelier: Workflow-Graph Engine for Visual Agent Canvases
//!
//! Atelier is the in-memory core of a visual AI-agent workflow editor: a
//! directed graph of nodes, connectors, and artifacts mutated exclusively
//! through dispatched actions, with derived views recomputed eagerly and a
//! streaming generation orchestrator driving node outputs.
//!
//! ## Core Concepts
//!
//! - **Nodes**: Units of graph computation (prompt, text generator, web search)
//! - **Connectors**: Directed bindings from a node's output into a named slot
//! - **Artifacts**: Persisted outputs of a generator node's last successful run
//! - **Actions**: The only way state changes; applied by a pure reducer
//! - **Store**: The single logical owner of a graph, dispatched against
//! - **Orchestrator**: One streaming generation run per target node
//!
//! ## Quick Start
//!
//! ### Building a Graph
//!
//! ```
//! use atelier::node::{NodeBlueprint, XyPosition};
//! use atelier::state::GraphState;
//! use atelier::store::GraphStore;
//! use atelier::workflows;
//!
//! let store = GraphStore::new(GraphState::default());
//!
//! // Compose an instruction/generator pair in one step.
//! let (prompt, generator) = workflows::add_nodes_and_connect(
//!     &store,
//!     &NodeBlueprint::prompt(),
//!     XyPosition::new(100.0, 100.0),
//!     &NodeBlueprint::text_generator(),
//!     XyPosition::new(400.0, 100.0),
//! );
//!
//! let state = store.state();
//! assert_eq!(state.nodes.len(), 2);
//! assert_eq!(state.connectors.len(), 1);
//! // The derived views are already up to date: the generator's instruction
//! // slot is bound, so nothing is required.
//! assert!(state.derived.required_actions.is_empty());
//! assert!(state.node(&prompt).unwrap().ui.selected);
//! # let _ = generator;
//! ```
//!
//! ### Observing Changes
//!
//! ```
//! use atelier::action::Action;
//! use atelier::node::{NodeBlueprint, XyPosition};
//! use atelier::state::GraphState;
//! use atelier::store::GraphStore;
//!
//! let store = GraphStore::new(GraphState::default());
//! let changes = store.subscribe();
//! store.dispatch(Action::add_node(
//!     &NodeBlueprint::prompt(),
//!     "Untitled node - 1",
//!     XyPosition::default(),
//!     None,
//! ));
//! let event = changes.recv().unwrap();
//! let json = serde_json::to_value(&event).unwrap();
//! assert_eq!(json["action"], "addNode");
//! ```
//!
//! Generation runs need backends: implement the traits in [`services`] (tests
//! in this repository use `async-stream` mocks) and hand them to an
//! [`orchestrator::Orchestrator`] together with a shared store.
//!
//! ## Module Guide
//!
//! - [`ids`] - Typed, prefixed identifiers for every entity
//! - [`node`], [`connector`], [`artifact`], [`source`], [`parameter`] - The data model
//! - [`state`] - The graph container and its lookup helpers
//! - [`action`], [`reducer`] - The mutation protocol and its pure interpreter
//! - [`derivation`] - Eagerly recomputed required actions and request interface
//! - [`store`] - The dispatch/get-state handle, change events, operation tracking
//! - [`orchestrator`], [`prompt`], [`services`] - Streaming generation runs
//! - [`workflows`] - Attach/detach sources, file pipeline, ordered bulk delete
//! - [`telemetry`] - Tracing subscriber setup for hosts

pub mod action;
pub mod artifact;
pub mod connector;
pub mod derivation;
pub mod events;
pub mod ids;
pub mod node;
pub mod orchestrator;
pub mod parameter;
pub mod prompt;
pub mod reducer;
pub mod services;
pub mod source;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod workflows;
