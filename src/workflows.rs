//! Multi-step graph procedures built on top of single-action dispatches.
//!
//! These keep source references, connectors, and dynamic parameter slots
//! consistent as sources are attached to and detached from prompt nodes, run
//! the two-step file upload/parse pipeline, and perform ordered bulk delete.
//! None of them is atomic across its internal awaits: the reducer's per-action
//! atomicity is the only mutual-exclusion guarantee, and each flow re-reads
//! the graph fresh after every await so an observer (or an interleaved
//! dispatch) can see every intermediate state. The async flows are tracked as
//! store operations with observable phases and cooperative cancellation.

use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::action::{Action, NodeUiUpdate};
use crate::connector::Connector;
use crate::ids::{FileId, NodeId};
use crate::node::{
    GraphNode, MalformedSourcesError, NodeArchetype, NodeBlueprint, NodeUiPatch, PanelTab,
    XyPosition, INSTRUCTION_HANDLE, SOURCES_PROPERTY,
};
use crate::parameter::{Parameter, SOURCE_SLOT_PREFIX};
use crate::services::{FileService, ServiceError};
use crate::source::{FileSource, FileStatus, Source};
use crate::store::{GraphStore, OperationKind, OperationPhase};

/// Failure in a multi-step workflow.
#[derive(Debug, Error, Diagnostic)]
pub enum WorkflowError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    MalformedSources(#[from] MalformedSourcesError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Service(#[from] ServiceError),

    #[error("file {file} disappeared from node {node} while processing")]
    #[diagnostic(
        code(atelier::workflow::file_detached),
        help("The source was detached between the upload and parse steps; nothing to finish.")
    )]
    FileDetached { node: NodeId, file: FileId },
}

/// Attach a source to a prompt node.
///
/// Appends the source to the node's `sources` list. For an artifact
/// reference, additionally rewires the artifact's generator as a direct
/// input to every node this prompt node feeds: a fresh `sourceN` slot is
/// allocated on each downstream node and a connector from the generator into
/// that slot is created alongside it. A missing node or a non-prompt target
/// is a no-op.
#[instrument(skip(store, source), fields(node = %node))]
pub fn attach_source(
    store: &GraphStore,
    node: &NodeId,
    source: Source,
) -> Result<(), WorkflowError> {
    let state = store.state();
    let Some(prompt_node) = state.node(node) else {
        return Ok(());
    };
    if prompt_node.archetype != NodeArchetype::Prompt {
        return Ok(());
    }
    let mut sources = prompt_node.sources()?;
    sources.push(source.clone());
    dispatch_sources(store, node, &sources);

    if let Source::ArtifactReference(reference) = &source {
        let Some(artifact) = state.artifact(&reference.id) else {
            return Ok(());
        };
        for outgoing in state.outgoing_connectors(node) {
            let Some(downstream) = state.node(&outgoing.target) else {
                continue;
            };
            let slot = next_source_slot(downstream);
            store.dispatch(Action::AddParameterToNode {
                node: downstream.id.clone(),
                key: slot.clone(),
                parameter: Parameter::string(slot_label(&slot)),
            });
            store.dispatch(Action::AddConnector {
                connector: Connector::from_parts(
                    artifact.generator_node.id.clone(),
                    artifact.generator_node.category,
                    artifact.generator_node.archetype,
                    downstream.id.clone(),
                    slot,
                    downstream.category,
                    downstream.archetype,
                ),
            });
        }
    }
    Ok(())
}

/// Attach a freshly selected file to a prompt node and run its two-step
/// processing pipeline.
///
/// The file is appended with status `uploading`, then the upload records the
/// blob URL with status `processing`, then the parse records the
/// structured-data URL with status `processed`. Each step replaces the whole
/// sources list read fresh from the store, so concurrent edits to other
/// sources survive and the last write for this entry wins. The pipeline is
/// tracked as an operation; cancellation between steps removes the entry.
#[instrument(skip(store, files, bytes), fields(node = %node, name))]
pub async fn attach_file(
    store: &GraphStore,
    files: &dyn FileService,
    node: &NodeId,
    name: &str,
    bytes: Vec<u8>,
) -> Result<FileId, WorkflowError> {
    let file = FileSource::uploading(name);
    let file_id = file.id.clone();
    // A missing or non-prompt target is a no-op, same as attach_source;
    // nothing is uploaded and no operation is tracked.
    let is_prompt = store.read(|state| {
        state
            .node(node)
            .is_some_and(|target| target.archetype == NodeArchetype::Prompt)
    });
    if !is_prompt {
        return Ok(file_id);
    }
    attach_source(store, node, Source::File(file))?;

    let (operation, cancel) = store.begin_operation(OperationKind::FileAttach {
        node: node.clone(),
        file: file_id.clone(),
    });
    match run_file_pipeline(store, files, node, name, bytes, &file_id, &operation, &cancel).await {
        Ok(FilePipelineOutcome::Completed) => {
            store.set_operation_phase(&operation, OperationPhase::Completed);
            info!("file processed");
            Ok(file_id)
        }
        Ok(FilePipelineOutcome::Cancelled) => {
            remove_file_entry(store, node, &file_id)?;
            store.set_operation_phase(&operation, OperationPhase::Cancelled);
            warn!("file attach cancelled");
            Ok(file_id)
        }
        Err(error) => {
            store.set_operation_phase(
                &operation,
                OperationPhase::Failed {
                    message: error.to_string(),
                },
            );
            Err(error)
        }
    }
}

enum FilePipelineOutcome {
    Completed,
    Cancelled,
}

#[allow(clippy::too_many_arguments)]
async fn run_file_pipeline(
    store: &GraphStore,
    files: &dyn FileService,
    node: &NodeId,
    name: &str,
    bytes: Vec<u8>,
    file_id: &FileId,
    operation: &crate::ids::OperationId,
    cancel: &crate::store::CancelHandle,
) -> Result<FilePipelineOutcome, WorkflowError> {
    store.set_operation_phase(operation, OperationPhase::Uploading);
    let blob = files.upload(file_id, name, bytes).await?;
    if cancel.is_cancelled() {
        return Ok(FilePipelineOutcome::Cancelled);
    }
    replace_file_entry(store, node, file_id, |entry| {
        entry.status = FileStatus::Processing;
        entry.blob_url = Some(blob.url.clone());
    })?;

    store.set_operation_phase(operation, OperationPhase::Parsing);
    let structured = files.parse(&blob.url, name).await?;
    if cancel.is_cancelled() {
        return Ok(FilePipelineOutcome::Cancelled);
    }
    replace_file_entry(store, node, file_id, |entry| {
        entry.status = FileStatus::Processed;
        entry.structured_data_blob_url = Some(structured.url.clone());
    })?;
    Ok(FilePipelineOutcome::Completed)
}

/// Detach a source from a prompt node.
///
/// Filters the source out of the node's `sources` list. For an artifact
/// reference, also removes the direct connector and parameter slot that
/// attachment created on every downstream node, and nothing else. A missing
/// node or a non-prompt target is a no-op.
#[instrument(skip(store), fields(node = %node, source = source_id))]
pub fn detach_source(
    store: &GraphStore,
    node: &NodeId,
    source_id: &str,
) -> Result<(), WorkflowError> {
    let state = store.state();
    let Some(prompt_node) = state.node(node) else {
        return Ok(());
    };
    if prompt_node.archetype != NodeArchetype::Prompt {
        return Ok(());
    }
    let sources = prompt_node.sources()?;
    let was_artifact = sources.iter().any(|source| {
        matches!(source, Source::ArtifactReference(reference) if reference.id.as_str() == source_id)
    });
    let remaining: Vec<Source> = sources
        .into_iter()
        .filter(|source| source.id() != source_id)
        .collect();
    dispatch_sources(store, node, &remaining);

    if !was_artifact {
        return Ok(());
    }
    let Some(artifact) = state
        .artifacts
        .iter()
        .find(|artifact| artifact.id.as_str() == source_id)
    else {
        return Ok(());
    };
    for outgoing in state.outgoing_connectors(node) {
        let Some(created) = state.connectors.iter().find(|connector| {
            connector.target == outgoing.target
                && connector.source == artifact.generator_node.id
                && connector.target_handle.starts_with(SOURCE_SLOT_PREFIX)
        }) else {
            continue;
        };
        store.dispatch(Action::RemoveConnector {
            connector: created.id.clone(),
        });
        store.dispatch(Action::RemoveParameterFromNode {
            node: outgoing.target.clone(),
            key: created.target_handle.clone(),
        });
    }
    Ok(())
}

/// Delete every selected node, unwinding dependents in order.
///
/// No-ops unless at least one node is selected and every selected node is a
/// deletable archetype. Artifacts owned by selected nodes are detached from
/// the prompt nodes that still reference them and removed first, then every
/// connector touching a selected node, then the nodes themselves, so no
/// intermediate reducer state holds a dangling reference.
#[instrument(skip(store))]
pub fn remove_selected_nodes(store: &GraphStore) -> Result<(), WorkflowError> {
    let state = store.state();
    let selected: Vec<GraphNode> = state.selected_nodes().cloned().collect();
    if selected.is_empty() {
        return Ok(());
    }
    let deletable = selected.iter().all(|node| {
        matches!(
            node.archetype,
            NodeArchetype::Prompt | NodeArchetype::TextGenerator | NodeArchetype::WebSearch
        )
    });
    if !deletable {
        return Ok(());
    }

    let owned_artifacts: Vec<_> = state
        .artifacts
        .iter()
        .filter(|artifact| {
            selected
                .iter()
                .any(|node| node.id == artifact.generator_node.id)
        })
        .cloned()
        .collect();
    for artifact in &owned_artifacts {
        let dependents: Vec<NodeId> = state
            .nodes
            .iter()
            .filter(|node| references_artifact(node, artifact.id.as_str()))
            .map(|node| node.id.clone())
            .collect();
        for dependent in dependents {
            detach_source(store, &dependent, artifact.id.as_str())?;
        }
        store.dispatch(Action::RemoveArtifact {
            artifact: artifact.id.clone(),
        });
    }

    // Re-read: detach side effects above may have pruned connectors already.
    let state = store.state();
    for connector in &state.connectors {
        if selected.iter().any(|node| connector.touches(&node.id)) {
            store.dispatch(Action::RemoveConnector {
                connector: connector.id.clone(),
            });
        }
    }
    for node in &selected {
        store.dispatch(Action::RemoveNode {
            node: node.id.clone(),
        });
    }
    Ok(())
}

/// Create an instruction node and an action node joined by an instruction
/// connector, and select the instruction node for editing.
///
/// Node names continue the `Untitled node - {n}` sequence from the current
/// node count.
#[instrument(skip(store, instruction, action))]
pub fn add_nodes_and_connect(
    store: &GraphStore,
    instruction: &NodeBlueprint,
    instruction_position: XyPosition,
    action: &NodeBlueprint,
    action_position: XyPosition,
) -> (NodeId, NodeId) {
    let count = store.read(|state| state.nodes.len());
    let add_instruction = Action::add_node(
        instruction,
        format!("Untitled node - {}", count + 1),
        instruction_position,
        None,
    );
    let add_action = Action::add_node(
        action,
        format!("Untitled node - {}", count + 2),
        action_position,
        None,
    );
    let (Action::AddNode { node: source_node }, Action::AddNode { node: target_node }) =
        (&add_instruction, &add_action)
    else {
        unreachable!("add_node always builds AddNode");
    };
    let source_id = source_node.id.clone();
    let target_id = target_node.id.clone();
    let connect = Action::add_connector(source_node, target_node, INSTRUCTION_HANDLE);
    let select_prompt = source_node.archetype == NodeArchetype::Prompt;

    store.dispatch(add_instruction);
    store.dispatch(add_action);
    store.dispatch(connect);
    if select_prompt {
        store.dispatch(Action::UpdateNodesUi {
            updates: vec![NodeUiUpdate {
                node: source_id.clone(),
                ui: NodeUiPatch {
                    selected: Some(true),
                    panel_tab: Some(PanelTab::Property),
                    ..Default::default()
                },
            }],
        });
    }
    (source_id, target_id)
}

/// Make a node the sole selection and open one of its panel tabs.
pub fn select_node_and_set_panel_tab(store: &GraphStore, node: &NodeId, panel_tab: PanelTab) {
    store.dispatch(Action::SelectNode {
        selected: vec![node.clone()],
    });
    store.dispatch(Action::SetPanelTab {
        node: node.clone(),
        panel_tab,
    });
}

fn dispatch_sources(store: &GraphStore, node: &NodeId, sources: &[Source]) {
    store.dispatch(Action::UpdateNodeProperties {
        node: node.clone(),
        key: SOURCES_PROPERTY.to_string(),
        value: json!(sources),
    });
}

fn next_source_slot(node: &GraphNode) -> String {
    node.parameters
        .as_ref()
        .and_then(|parameter| parameter.as_object())
        .map_or_else(
            || format!("{SOURCE_SLOT_PREFIX}1"),
            |object| object.next_source_slot(),
        )
}

fn slot_label(slot: &str) -> String {
    let mut label = String::with_capacity(slot.len());
    let mut chars = slot.chars();
    if let Some(first) = chars.next() {
        label.extend(first.to_uppercase());
    }
    label.extend(chars);
    label
}

fn references_artifact(node: &GraphNode, artifact_id: &str) -> bool {
    node.sources().is_ok_and(|sources| {
        sources.iter().any(|source| {
            matches!(source, Source::ArtifactReference(reference) if reference.id.as_str() == artifact_id)
        })
    })
}

/// Replace the file entry with the given id in a node's sources, re-reading
/// the list fresh so edits made during the preceding await survive.
fn replace_file_entry(
    store: &GraphStore,
    node: &NodeId,
    file: &FileId,
    update: impl FnOnce(&mut FileSource),
) -> Result<(), WorkflowError> {
    let state = store.state();
    let Some(prompt_node) = state.node(node) else {
        return Err(WorkflowError::FileDetached {
            node: node.clone(),
            file: file.clone(),
        });
    };
    let mut sources = prompt_node.sources()?;
    let entry = sources.iter_mut().find_map(|source| match source {
        Source::File(existing) if existing.id == *file => Some(existing),
        _ => None,
    });
    match entry {
        Some(existing) => update(existing),
        None => {
            return Err(WorkflowError::FileDetached {
                node: node.clone(),
                file: file.clone(),
            })
        }
    }
    dispatch_sources(store, node, &sources);
    Ok(())
}

fn remove_file_entry(store: &GraphStore, node: &NodeId, file: &FileId) -> Result<(), WorkflowError> {
    let state = store.state();
    let Some(prompt_node) = state.node(node) else {
        return Ok(());
    };
    let remaining: Vec<Source> = prompt_node
        .sources()?
        .into_iter()
        .filter(|source| source.id() != file.as_str())
        .collect();
    dispatch_sources(store, node, &remaining);
    Ok(())
}
