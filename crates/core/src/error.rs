use thiserror::Error;

/// Failure to turn raw PDF bytes into text. Carries the source identifier so
/// batch ingestion can report which file was skipped.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("pdf parse error in {source_id}: {details}")]
    PdfParse { source_id: String, details: String },

    #[error("pdf {source_id} has no readable text")]
    EmptyDocument { source_id: String },

    #[error("io error reading {source_id}: {details}")]
    Io { source_id: String, details: String },
}

impl ExtractionError {
    /// The identifier of the file that failed.
    pub fn source_id(&self) -> &str {
        match self {
            Self::PdfParse { source_id, .. }
            | Self::EmptyDocument { source_id }
            | Self::Io { source_id, .. } => source_id,
        }
    }
}

/// Object storage put/get/list failure. Reported per-operation, never fatal
/// to the session.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage request for key {key} returned {status}: {details}")]
    Request {
        key: String,
        status: u16,
        details: String,
    },

    #[error("invalid list response: {0}")]
    ListResponse(String),
}

/// Embedding or chat-completion call failure. Surfaced to the user as a chat
/// message; the session stays usable.
#[derive(Debug, Error)]
pub enum ModelInvocationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat model returned {status}: {details}")]
    Response { status: u16, details: String },

    #[error("chat model response had no content")]
    EmptyCompletion,

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Missing or invalid configuration. Raised at collaborator construction,
/// never mid-pipeline.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("invalid chunking config: {0}")]
    InvalidChunking(String),
}

/// Vector index backend failure (build, search, or clear).
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index request failed: {0}")]
    Request(String),
}

/// Errors a controller operation can surface to its caller. Per-file
/// extraction and storage failures are reported inside the batch reports
/// instead; only batch-level failures end up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T, E = ExtractionError> = std::result::Result<T, E>;
