//! The generation orchestrator: one end-to-end run for a single target node.
//!
//! A run takes an explicit [`GraphStore`] handle, never ambient state, and
//! re-reads the graph fresh after every await so interleaved dispatches are
//! visible. Each run is tracked as a store operation with observable phases
//! and a cooperative cancellation flag checked at every suspension point; a
//! cancelled run resets the target node to idle and writes no artifact.
//!
//! Chunk dispatches are coalesced to a configurable minimum interval while
//! preserving last-chunk-wins: the final chunk is always flushed at
//! finalization, so no configuration can lose the end of a stream.

use futures_util::StreamExt;
use miette::Diagnostic;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::action::Action;
use crate::artifact::{Artifact, ArtifactElement, PartialGeneration};
use crate::ids::{NodeId, OperationId};
use crate::node::{
    GraphNode, MalformedSourcesError, NodeArchetype, NodeOutput, NodeState, INSTRUCTION_HANDLE,
};
use crate::prompt;
use crate::services::{GenerationRequest, GenerationServices, ServiceError};
use crate::source::{FileStatus, ResolvedSource, ResolvedSourceKind, Source};
use crate::state::GraphState;
use crate::store::{CancelHandle, GraphStore, OperationKind, OperationPhase};

/// Why a generation run could not complete.
#[derive(Debug, Error, Diagnostic)]
pub enum OrchestratorError {
    #[error("target node {node} not found")]
    #[diagnostic(code(atelier::orchestrator::missing_target))]
    MissingTargetNode { node: NodeId },

    #[error("node {node} is not a generator archetype")]
    #[diagnostic(
        code(atelier::orchestrator::not_a_generator),
        help("Only textGenerator and webSearch nodes can run a generation.")
    )]
    TargetNotGenerator { node: NodeId },

    #[error("node {node} has no incoming instruction connector")]
    #[diagnostic(
        code(atelier::orchestrator::missing_instruction_connector),
        help("Connect an instruction node to this node's instruction slot first.")
    )]
    MissingInstructionConnector { node: NodeId },

    #[error("node {node} has {count} instruction connectors; expected exactly one")]
    #[diagnostic(
        code(atelier::orchestrator::ambiguous_instruction_connector),
        help("Remove the extra instruction connectors; there is no defined tie-break.")
    )]
    AmbiguousInstructionConnector { node: NodeId, count: usize },

    #[error("instruction node {node} not found")]
    #[diagnostic(code(atelier::orchestrator::missing_instruction_node))]
    MissingInstructionNode { node: NodeId },

    #[error("instruction node {node} is not a prompt node")]
    #[diagnostic(code(atelier::orchestrator::not_a_prompt))]
    NotAPromptNode { node: NodeId },

    #[error(transparent)]
    #[diagnostic(transparent)]
    MalformedSources(#[from] MalformedSourcesError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Service(#[from] ServiceError),
}

/// How a generation run ended, short of an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The stream was consumed to its end and the artifact was written.
    Completed,
    /// Cancellation was observed; the node was reset to idle and no
    /// artifact was written.
    Cancelled,
}

/// Tunables of the stream consumer.
#[derive(Clone, Debug)]
pub struct GenerationOptions {
    /// Minimum interval between per-chunk output dispatches. Zero dispatches
    /// every chunk.
    pub chunk_interval: Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            chunk_interval: Duration::ZERO,
        }
    }
}

impl GenerationOptions {
    /// Resolve options from the environment (`.env` honored), falling back
    /// to defaults on missing or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let chunk_interval = std::env::var("ATELIER_CHUNK_INTERVAL_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map_or(Duration::ZERO, Duration::from_millis);
        Self { chunk_interval }
    }
}

/// Drives generation runs against one store.
pub struct Orchestrator {
    store: Arc<GraphStore>,
    services: GenerationServices,
    options: GenerationOptions,
}

enum SourceResolution {
    Done(Vec<ResolvedSource>),
    Cancelled,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<GraphStore>, services: GenerationServices) -> Self {
        Self {
            store,
            services,
            options: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one generation for the target node.
    ///
    /// On error the node is moved to the failed state with the triggering
    /// message; on cancellation it is reset to idle. Either way the tracked
    /// operation's terminal phase reflects what happened.
    #[instrument(skip(self), fields(node = %target), err)]
    pub async fn generate(
        &self,
        target: &NodeId,
    ) -> Result<GenerationOutcome, OrchestratorError> {
        let (operation, cancel) = self.store.begin_operation(OperationKind::Generation {
            node: target.clone(),
        });
        match self.run(target, &operation, &cancel).await {
            Ok(GenerationOutcome::Completed) => {
                self.store
                    .set_operation_phase(&operation, OperationPhase::Completed);
                info!("generation completed");
                Ok(GenerationOutcome::Completed)
            }
            Ok(GenerationOutcome::Cancelled) => {
                self.store.dispatch(Action::SetNodeOutput {
                    node: target.clone(),
                    output: NodeOutput::default(),
                });
                self.store.dispatch(Action::UpdateNodeState {
                    node: target.clone(),
                    state: NodeState::Idle,
                });
                self.store
                    .set_operation_phase(&operation, OperationPhase::Cancelled);
                warn!("generation cancelled");
                Ok(GenerationOutcome::Cancelled)
            }
            Err(error) => {
                self.store.dispatch(Action::UpdateNodeState {
                    node: target.clone(),
                    state: NodeState::failed(&error),
                });
                self.store.set_operation_phase(
                    &operation,
                    OperationPhase::Failed {
                        message: error.to_string(),
                    },
                );
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        target: &NodeId,
        operation: &OperationId,
        cancel: &CancelHandle,
    ) -> Result<GenerationOutcome, OrchestratorError> {
        let state = self.store.state();
        let target_node = state
            .node(target)
            .ok_or_else(|| OrchestratorError::MissingTargetNode {
                node: target.clone(),
            })?;
        let archetype = target_node.archetype;
        if !matches!(
            archetype,
            NodeArchetype::TextGenerator | NodeArchetype::WebSearch
        ) {
            return Err(OrchestratorError::TargetNotGenerator {
                node: target.clone(),
            });
        }

        self.store.dispatch(Action::SetNodeOutput {
            node: target.clone(),
            output: NodeOutput::default(),
        });
        self.store.dispatch(Action::UpdateNodeState {
            node: target.clone(),
            state: NodeState::InProgress,
        });

        let instruction = instruction_node(&state, target)?.clone();
        let sources = match self.resolve_sources(&state, &instruction, cancel).await? {
            SourceResolution::Done(sources) => sources,
            SourceResolution::Cancelled => return Ok(GenerationOutcome::Cancelled),
        };

        let user_prompt = instruction
            .output
            .as_text()
            .unwrap_or_default()
            .to_string();
        let stream = match archetype {
            NodeArchetype::TextGenerator => {
                self.services
                    .text
                    .generate(GenerationRequest {
                        user_prompt,
                        system_prompt: prompt::assemble_system_prompt(&sources),
                    })
                    .await?
            }
            NodeArchetype::WebSearch => {
                self.services
                    .search
                    .search(GenerationRequest {
                        user_prompt,
                        system_prompt: Some(prompt::web_search_system_prompt(&sources)),
                    })
                    .await?
            }
            NodeArchetype::Prompt => unreachable!("rejected above"),
        };
        if cancel.is_cancelled() {
            return Ok(GenerationOutcome::Cancelled);
        }

        self.store
            .set_operation_phase(operation, OperationPhase::Streaming);
        let mut stream = stream;
        let mut streaming_entered = false;
        let mut last_chunk = PartialGeneration::default();
        let mut last_dispatch: Option<Instant> = None;
        while let Some(item) = stream.next().await {
            if cancel.is_cancelled() {
                return Ok(GenerationOutcome::Cancelled);
            }
            let chunk = item?;
            if !streaming_entered && !chunk.is_empty() {
                self.store.dispatch(Action::UpdateNodeState {
                    node: target.clone(),
                    state: NodeState::Streaming,
                });
                streaming_entered = true;
            }
            let due = match last_dispatch {
                None => true,
                Some(at) => {
                    self.options.chunk_interval.is_zero()
                        || at.elapsed() >= self.options.chunk_interval
                }
            };
            if due {
                self.store.dispatch(Action::SetTextGenerationNodeOutput {
                    node: target.clone(),
                    output: chunk.clone(),
                });
                last_dispatch = Some(Instant::now());
            }
            last_chunk = chunk;
        }
        if cancel.is_cancelled() {
            return Ok(GenerationOutcome::Cancelled);
        }

        self.store
            .set_operation_phase(operation, OperationPhase::Finalizing);
        let finalized = last_chunk.finalized();
        self.store.dispatch(Action::SetTextGenerationNodeOutput {
            node: target.clone(),
            output: finalized.clone(),
        });

        // Fresh read: the graph may have changed while the stream ran.
        let state = self.store.state();
        let target_node = state
            .node(target)
            .ok_or_else(|| OrchestratorError::MissingTargetNode {
                node: target.clone(),
            })?;
        let partial = finalized.artifact.as_ref();
        let artifact = Artifact {
            id: state
                .artifact_for_generator(target)
                .map_or_else(crate::ids::ArtifactId::fresh, |existing| {
                    existing.id.clone()
                }),
            title: partial.map(|a| a.title_or_default()).unwrap_or_default(),
            content: partial.map(|a| a.content_or_default()).unwrap_or_default(),
            generator_node: ArtifactElement::from(target_node),
            elements: vec![ArtifactElement::from(&instruction)],
        };
        self.store.dispatch(Action::AddOrReplaceArtifact { artifact });
        self.store.dispatch(Action::UpdateNodeState {
            node: target.clone(),
            state: NodeState::Completed,
        });
        Ok(GenerationOutcome::Completed)
    }

    /// Resolve the instruction node's source list to plain text.
    ///
    /// Missing artifacts and files that have not finished processing are
    /// skipped without error; only processed files cost a fetch.
    async fn resolve_sources(
        &self,
        state: &GraphState,
        instruction: &GraphNode,
        cancel: &CancelHandle,
    ) -> Result<SourceResolution, OrchestratorError> {
        let mut resolved = Vec::new();
        for source in instruction.sources()? {
            match source {
                Source::TextContent(text) => resolved.push(ResolvedSource {
                    id: text.id.as_str().to_string(),
                    title: text.title,
                    content: text.content,
                    kind: ResolvedSourceKind::TextContent,
                }),
                Source::ArtifactReference(reference) => {
                    if let Some(artifact) = state.artifact(&reference.id) {
                        resolved.push(ResolvedSource {
                            id: artifact.id.as_str().to_string(),
                            title: artifact.title.clone(),
                            content: artifact.content.clone(),
                            kind: ResolvedSourceKind::Artifact,
                        });
                    }
                }
                Source::File(file) => {
                    if file.status != FileStatus::Processed {
                        continue;
                    }
                    let Some(url) = file.structured_data_blob_url.as_deref() else {
                        continue;
                    };
                    let content = self.services.files.fetch_text(url).await?;
                    if cancel.is_cancelled() {
                        return Ok(SourceResolution::Cancelled);
                    }
                    resolved.push(ResolvedSource {
                        id: file.id.as_str().to_string(),
                        title: file.name,
                        content,
                        kind: ResolvedSourceKind::File,
                    });
                }
            }
        }
        Ok(SourceResolution::Done(resolved))
    }
}

/// Find the unique instruction node feeding the target's instruction slot.
fn instruction_node<'a>(
    state: &'a GraphState,
    target: &NodeId,
) -> Result<&'a GraphNode, OrchestratorError> {
    let mut matches = state.connectors.iter().filter(|connector| {
        connector.target == *target
            && connector.target_handle == INSTRUCTION_HANDLE
            && connector.source_category == crate::node::NodeCategory::Instruction
    });
    let connector = matches
        .next()
        .ok_or_else(|| OrchestratorError::MissingInstructionConnector {
            node: target.clone(),
        })?;
    let extra = matches.count();
    if extra > 0 {
        return Err(OrchestratorError::AmbiguousInstructionConnector {
            node: target.clone(),
            count: extra + 1,
        });
    }
    let instruction =
        state
            .node(&connector.source)
            .ok_or_else(|| OrchestratorError::MissingInstructionNode {
                node: connector.source.clone(),
            })?;
    if instruction.archetype != NodeArchetype::Prompt {
        return Err(OrchestratorError::NotAPromptNode {
            node: instruction.id.clone(),
        });
    }
    Ok(instruction)
}
