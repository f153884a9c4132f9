//! Shared fixtures and mock collaborators for integration tests.

#![allow(dead_code)]

use async_stream::stream;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use atelier::action::Action;
use atelier::artifact::{PartialArtifact, PartialGeneration};
use atelier::ids::{FileId, NodeId};
use atelier::node::{NodeBlueprint, XyPosition, INSTRUCTION_HANDLE};
use atelier::services::{
    FileService, GenerationRequest, GenerationServices, GenerationStream, ServiceError, StoredBlob,
    TextGenerationService, WebSearchService,
};
use atelier::source::{Source, TextContent};
use atelier::state::GraphState;
use atelier::store::GraphStore;

pub fn store() -> Arc<GraphStore> {
    Arc::new(GraphStore::new(GraphState::default()))
}

pub fn add_prompt(store: &GraphStore, name: &str) -> NodeId {
    add_from_blueprint(store, &NodeBlueprint::prompt(), name)
}

pub fn add_text_generator(store: &GraphStore, name: &str) -> NodeId {
    add_from_blueprint(store, &NodeBlueprint::text_generator(), name)
}

pub fn add_web_search(store: &GraphStore, name: &str) -> NodeId {
    add_from_blueprint(store, &NodeBlueprint::web_search(), name)
}

fn add_from_blueprint(store: &GraphStore, blueprint: &NodeBlueprint, name: &str) -> NodeId {
    let action = Action::add_node(blueprint, name, XyPosition::default(), None);
    let Action::AddNode { node } = &action else {
        unreachable!()
    };
    let id = node.id.clone();
    store.dispatch(action);
    id
}

pub fn connect_instruction(store: &GraphStore, source: &NodeId, target: &NodeId) {
    let state = store.state();
    let source_node = state.node(source).expect("source exists").clone();
    let target_node = state.node(target).expect("target exists").clone();
    store.dispatch(Action::add_connector(
        &source_node,
        &target_node,
        INSTRUCTION_HANDLE,
    ));
}

pub fn set_prompt_output(store: &GraphStore, node: &NodeId, output: &str) {
    store.dispatch(Action::SetNodeOutput {
        node: node.clone(),
        output: atelier::node::NodeOutput::Text(output.to_string()),
    });
}

pub fn text_source(title: &str, content: &str) -> Source {
    Source::TextContent(TextContent::new(title, content))
}

pub fn chunk(thinking: &str) -> PartialGeneration {
    PartialGeneration {
        thinking: Some(thinking.to_string()),
        ..Default::default()
    }
}

pub fn artifact_chunk(title: &str, content: &str) -> PartialGeneration {
    PartialGeneration {
        thinking: None,
        artifact: Some(PartialArtifact {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            completed: false,
        }),
        description: None,
    }
}

/// Text-generation mock yielding canned chunks and recording the request.
#[derive(Default)]
pub struct MockTextService {
    pub chunks: Vec<PartialGeneration>,
    pub last_request: Mutex<Option<GenerationRequest>>,
    /// Delay inserted before each chunk, for cancellation tests.
    pub chunk_delay: Duration,
    /// When set, the stream errors after the canned chunks.
    pub fail_with: Option<String>,
}

impl MockTextService {
    pub fn with_chunks(chunks: Vec<PartialGeneration>) -> Self {
        Self {
            chunks,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextGenerationService for MockTextService {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream, ServiceError> {
        *self.last_request.lock() = Some(request);
        let chunks = self.chunks.clone();
        let delay = self.chunk_delay;
        let fail_with = self.fail_with.clone();
        Ok(Box::pin(stream! {
            for chunk in chunks {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(chunk);
            }
            if let Some(message) = fail_with {
                yield Err(ServiceError::Stream { message });
            }
        }))
    }
}

/// Web-search mock with the same shape as the text mock.
#[derive(Default)]
pub struct MockSearchService {
    pub chunks: Vec<PartialGeneration>,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

#[async_trait]
impl WebSearchService for MockSearchService {
    async fn search(&self, request: GenerationRequest) -> Result<GenerationStream, ServiceError> {
        *self.last_request.lock() = Some(request);
        let chunks = self.chunks.clone();
        Ok(Box::pin(stream! {
            for chunk in chunks {
                yield Ok(chunk);
            }
        }))
    }
}

/// File mock: deterministic blob URLs and canned structured text.
///
/// `during_upload` runs inside the upload call, before it returns, so tests
/// can interleave store edits with the pipeline's first await.
#[derive(Default)]
pub struct MockFileService {
    pub structured_text: String,
    pub during_upload: Option<Box<dyn Fn() + Send + Sync>>,
}

#[async_trait]
impl FileService for MockFileService {
    async fn upload(
        &self,
        file: &FileId,
        _name: &str,
        _bytes: Vec<u8>,
    ) -> Result<StoredBlob, ServiceError> {
        if let Some(hook) = &self.during_upload {
            hook();
        }
        Ok(StoredBlob {
            url: format!("blob://{file}"),
        })
    }

    async fn parse(&self, blob_url: &str, _name: &str) -> Result<StoredBlob, ServiceError> {
        Ok(StoredBlob {
            url: format!("structured://{blob_url}"),
        })
    }

    async fn fetch_text(&self, _url: &str) -> Result<String, ServiceError> {
        Ok(self.structured_text.clone())
    }
}

pub fn services_with_text(text: Arc<MockTextService>) -> GenerationServices {
    GenerationServices {
        text,
        search: Arc::new(MockSearchService::default()),
        files: Arc::new(MockFileService::default()),
    }
}

pub fn services_with_search(search: Arc<MockSearchService>) -> GenerationServices {
    GenerationServices {
        text: Arc::new(MockTextService::default()),
        search,
        files: Arc::new(MockFileService::default()),
    }
}
