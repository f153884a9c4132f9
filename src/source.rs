//! Generation context sources consumed by prompt nodes.
//!
//! A prompt node's `sources` property is an ordered list of references the
//! generation orchestrator resolves into textual context: embedded text,
//! pointers to live artifacts, and uploaded files. File sources carry their
//! own processing state machine (`uploading → processing → processed`), each
//! stage gated on the completion of the prior network step.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ArtifactId, FileId, SourceId};

/// A source reference stored on a prompt node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object")]
pub enum Source {
    /// Text embedded directly in the graph.
    #[serde(rename = "textContent")]
    TextContent(TextContent),
    /// Pointer to an [`Artifact`](crate::artifact::Artifact) by id.
    #[serde(rename = "artifact.reference")]
    ArtifactReference(ArtifactReference),
    /// Uploaded file going through the processing pipeline.
    #[serde(rename = "file")]
    File(FileSource),
}

impl Source {
    /// The raw identifier of the referenced entity, whatever its variant.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Source::TextContent(text) => text.id.as_str(),
            Source::ArtifactReference(reference) => reference.id.as_str(),
            Source::File(file) => file.id.as_str(),
        }
    }
}

/// Embedded text source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub id: SourceId,
    pub title: String,
    pub content: String,
}

impl TextContent {
    /// Create a fresh embedded text source.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: SourceId::fresh(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Pointer to an artifact by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub id: ArtifactId,
}

/// Uploaded file source with its processing status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSource {
    pub id: FileId,
    pub name: String,
    pub status: FileStatus,
    /// Stored-blob URL, present once the upload step completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_url: Option<String>,
    /// Structured-data blob URL, present once the parse step completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data_blob_url: Option<String>,
}

impl FileSource {
    /// A file that has just been selected and not yet uploaded.
    pub fn uploading(name: impl Into<String>) -> Self {
        Self {
            id: FileId::fresh(),
            name: name.into(),
            status: FileStatus::Uploading,
            blob_url: None,
            structured_data_blob_url: None,
        }
    }
}

/// Processing stage of an uploaded file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileStatus {
    Uploading,
    Processing,
    Processed,
}

/// A source resolved to plain text, ready for prompt assembly.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSource {
    pub id: String,
    pub title: String,
    pub content: String,
    pub kind: ResolvedSourceKind,
}

/// What a [`ResolvedSource`] was resolved from; rendered as the `type`
/// attribute of its prompt block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedSourceKind {
    TextContent,
    Artifact,
    File,
}

impl fmt::Display for ResolvedSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextContent => write!(f, "textContent"),
            Self::Artifact => write!(f, "artifact"),
            Self::File => write!(f, "file"),
        }
    }
}
