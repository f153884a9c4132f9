//! External collaborator seams: generation backends and file storage.
//!
//! The orchestrator and workflows depend only on these traits, so tests swap
//! in `async-stream` mocks and production wires real backends. A generation
//! backend returns a lazy, finite, non-restartable stream of partial
//! structured objects; it terminates naturally when generation completes and
//! any failure surfaces as an `Err` item or an erroring future.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

use crate::artifact::PartialGeneration;
use crate::ids::FileId;

/// Failure in an external collaborator.
#[derive(Debug, Error, Diagnostic)]
pub enum ServiceError {
    #[error("generation stream failed: {message}")]
    #[diagnostic(
        code(atelier::service::stream),
        help("The backend aborted mid-stream; the run cannot be resumed.")
    )]
    Stream { message: String },

    #[error("file upload failed for {file}: {message}")]
    #[diagnostic(code(atelier::service::upload))]
    Upload { file: FileId, message: String },

    #[error("file parse failed for {blob_url}: {message}")]
    #[diagnostic(code(atelier::service::parse))]
    Parse { blob_url: String, message: String },

    #[error("blob fetch failed for {url}: {message}")]
    #[diagnostic(code(atelier::service::fetch))]
    Fetch { url: String, message: String },
}

/// Inputs of one generation call.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub user_prompt: String,
    /// Omitted entirely when no source context exists.
    pub system_prompt: Option<String>,
}

/// Stream of partial structured objects produced by a generation backend.
pub type GenerationStream = BoxStream<'static, Result<PartialGeneration, ServiceError>>;

/// Text-generation backend.
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream, ServiceError>;
}

/// Web-search backend; same stream contract as text generation, different
/// backend and prompt discipline.
#[async_trait]
pub trait WebSearchService: Send + Sync {
    async fn search(&self, request: GenerationRequest) -> Result<GenerationStream, ServiceError>;
}

/// Address of a stored blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
}

/// File storage backend: upload raw bytes, parse a stored blob into
/// structured data, and fetch structured data back as text.
#[async_trait]
pub trait FileService: Send + Sync {
    async fn upload(
        &self,
        file: &FileId,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredBlob, ServiceError>;

    async fn parse(&self, blob_url: &str, name: &str) -> Result<StoredBlob, ServiceError>;

    async fn fetch_text(&self, url: &str) -> Result<String, ServiceError>;
}

/// Bundle of the collaborators a generation run may touch.
#[derive(Clone)]
pub struct GenerationServices {
    pub text: Arc<dyn TextGenerationService>,
    pub search: Arc<dyn WebSearchService>,
    pub files: Arc<dyn FileService>,
}
