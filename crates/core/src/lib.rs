pub mod chunking;
pub mod composer;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod retriever;
pub mod session;
pub mod storage;
pub mod stores;

pub use chunking::{build_chunks, split_text};
pub use composer::{
    answer, compose_prompt, ChatCompletionsClient, ChatModel, ChatModelConfig,
    NO_CONTEXT_FALLBACK,
};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    ConfigurationError, ExtractionError, IndexError, ModelInvocationError, PipelineError,
    StorageError,
};
pub use extractor::{clean_text, extract_document, LopdfExtractor, PdfExtractor};
pub use index::VectorIndex;
pub use ingest::{discover_pdf_files, read_pdf_batch};
pub use models::{
    ChatMessage, ChatRole, ChunkingConfig, Document, DocumentChunk, FailedFile, IngestionReport,
    ObjectInfo, PageText, RawFile, ScoredChunk, SessionState, UploadReport, UploadedFile,
};
pub use retriever::{Retriever, DEFAULT_TOP_K};
pub use session::{ChatPipeline, ChatSession, REFUSAL_MESSAGE, WELCOME_MESSAGE};
pub use storage::{
    document_key, FetchedObject, ObjectStore, S3Config, S3ObjectStore, DOCUMENT_PREFIX,
    PDF_CONTENT_TYPE,
};
pub use stores::{MemoryIndex, QdrantIndex};
