use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file handed to the ingestion entrypoints: its name plus raw PDF bytes.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Text of a single PDF page, kept for downstream attribution.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// One ingested source document. Immutable once produced by the extractor;
/// discarded after chunking.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source filename or storage key.
    pub source_id: String,
    /// Cleaned, concatenated text of all pages.
    pub text: String,
    pub pages: Vec<PageText>,
}

/// A bounded-length slice of a document's text plus inherited metadata.
/// Never mutated after creation; owned by the index once embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub source_id: String,
    pub page: Option<u32>,
    pub ordinal: u64,
    pub text: String,
}

/// A chunk returned from a vector search, paired with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f64,
}

/// Chunk sizing parameters: 100-char chunks with a 30-char overlap by
/// default.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            overlap: 30,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), crate::ConfigurationError> {
        if self.chunk_size == 0 {
            return Err(crate::ConfigurationError::InvalidChunking(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(crate::ConfigurationError::InvalidChunking(format!(
                "overlap {} must be smaller than chunk_size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Session lifecycle: `Empty` until an ingestion batch succeeds, `Ready`
/// while an index is active. Re-ingestion replaces the index and stays
/// `Ready`; only an explicit reset returns to `Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Empty,
    Ready,
}

/// A file that could not be extracted or stored, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

/// Outcome of a local ingestion batch. Partial failure is a normal result:
/// surviving files are indexed, failed files are listed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub ingested: Vec<String>,
    pub failed: Vec<FailedFile>,
    pub indexed_chunks: usize,
}

/// A file successfully stored under `documents/<filename>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    pub key: String,
}

/// Outcome of the upload entrypoint: what was stored, what failed, and the
/// extracted text of every file that could be read (an upload failure does
/// not discard the text).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedFile>,
    pub failed: Vec<FailedFile>,
    pub texts: Vec<String>,
}

/// Metadata for one stored object, as returned by `ObjectStore::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub filename: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}
