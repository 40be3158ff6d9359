use crate::chunking::build_chunks;
use crate::composer::{self, ChatModel};
use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::extractor::{extract_document, LopdfExtractor, PdfExtractor};
use crate::index::VectorIndex;
use crate::models::{
    ChatMessage, ChunkingConfig, DocumentChunk, FailedFile, IngestionReport, RawFile,
    SessionState, UploadReport, UploadedFile,
};
use crate::retriever::Retriever;
use crate::storage::{document_key, ObjectStore, DOCUMENT_PREFIX, PDF_CONTENT_TYPE};
use tracing::{info, warn};

/// First assistant message in every fresh session.
pub const WELCOME_MESSAGE: &str = "Hello! I'm your medical document assistant. Upload your PDF \
     reports and I'll help you find the information you need.";

/// Returned when a question arrives before any documents were processed.
pub const REFUSAL_MESSAGE: &str =
    "Please upload your documents first so I can answer your questions.";

/// One user's conversation: an append-only transcript plus the session
/// lifecycle state. Passed explicitly to every controller operation; there
/// is no ambient session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub messages: Vec<ChatMessage>,
    pub state: SessionState,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(WELCOME_MESSAGE)],
            state: SessionState::Empty,
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrates ingestion (extract → clean → chunk → index) and query
/// (retrieve → compose → answer), and owns the active index's lifecycle for
/// one session.
pub struct ChatPipeline<E: Embedder, M: ChatModel> {
    index: Box<dyn VectorIndex>,
    retriever: Retriever<E>,
    model: M,
    extractor: Box<dyn PdfExtractor + Send + Sync>,
    chunking: ChunkingConfig,
}

impl<E, M> ChatPipeline<E, M>
where
    E: Embedder + Send + Sync,
    M: ChatModel,
{
    pub fn new(index: Box<dyn VectorIndex>, embedder: E, model: M) -> Self {
        Self {
            index,
            retriever: Retriever::new(embedder),
            model,
            extractor: Box::new(LopdfExtractor),
            chunking: ChunkingConfig::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Ingest a batch of uploaded files and build one fresh index from every
    /// chunk that survived. The batch is best-effort: a file that fails
    /// extraction is reported and skipped, not fatal. On a successful
    /// rebuild the session becomes `Ready`; if the rebuild fails the
    /// previous index and state are retained.
    pub async fn ingest(
        &self,
        session: &mut ChatSession,
        files: &[RawFile],
    ) -> Result<IngestionReport, PipelineError> {
        self.chunking.validate()?;

        let mut chunks = Vec::new();
        let mut ingested = Vec::new();
        let mut failed = Vec::new();
        let mut cursor = 0u64;

        for file in files {
            match extract_document(self.extractor.as_ref(), file) {
                Ok(document) => {
                    let (file_chunks, next) = build_chunks(&document, self.chunking, cursor)?;
                    cursor = next;
                    chunks.extend(file_chunks);
                    ingested.push(file.name.clone());
                }
                Err(error) => {
                    warn!(file = %file.name, %error, "skipping file that failed extraction");
                    failed.push(FailedFile {
                        filename: file.name.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }

        self.rebuild_index(session, &chunks).await?;

        info!(
            files = files.len(),
            skipped = failed.len(),
            chunk_count = chunks.len(),
            "ingestion batch complete"
        );

        Ok(IngestionReport {
            ingested,
            failed,
            indexed_chunks: chunks.len(),
        })
    }

    /// Upload entrypoint: store each file's bytes under
    /// `documents/<filename>`, then index every text that could be
    /// extracted. A storage failure keeps the file out of `uploaded` but
    /// its text is still indexed; an extraction failure skips the file
    /// entirely.
    pub async fn ingest_with_storage(
        &self,
        session: &mut ChatSession,
        store: &dyn ObjectStore,
        files: &[RawFile],
    ) -> Result<UploadReport, PipelineError> {
        self.chunking.validate()?;

        let mut uploaded = Vec::new();
        let mut failed = Vec::new();
        let mut texts = Vec::new();
        let mut chunks = Vec::new();
        let mut cursor = 0u64;

        for file in files {
            let document = match extract_document(self.extractor.as_ref(), file) {
                Ok(document) => document,
                Err(error) => {
                    warn!(file = %file.name, %error, "skipping file that failed extraction");
                    failed.push(FailedFile {
                        filename: file.name.clone(),
                        error: error.to_string(),
                    });
                    continue;
                }
            };

            let key = document_key(&file.name);
            match store.put(&key, &file.bytes, PDF_CONTENT_TYPE).await {
                Ok(()) => uploaded.push(UploadedFile {
                    filename: file.name.clone(),
                    key,
                }),
                Err(error) => {
                    warn!(file = %file.name, %error, "upload failed, text still indexed");
                    failed.push(FailedFile {
                        filename: file.name.clone(),
                        error: error.to_string(),
                    });
                }
            }

            texts.push(document.text.clone());
            let (file_chunks, next) = build_chunks(&document, self.chunking, cursor)?;
            cursor = next;
            chunks.extend(file_chunks);
        }

        self.rebuild_index(session, &chunks).await?;

        Ok(UploadReport {
            uploaded,
            failed,
            texts,
        })
    }

    /// Rebuild the index from every document currently in object storage.
    /// Objects that fail to download are reported alongside the successes.
    pub async fn import_stored(
        &self,
        session: &mut ChatSession,
        store: &dyn ObjectStore,
    ) -> Result<IngestionReport, PipelineError> {
        let objects = store.list(DOCUMENT_PREFIX).await?;

        let mut files = Vec::new();
        let mut unfetched = Vec::new();
        for info in objects {
            match store.get(&info.key).await {
                Ok(object) => files.push(RawFile::new(object.filename, object.bytes)),
                Err(error) => {
                    warn!(key = %info.key, %error, "skipping stored object that failed to download");
                    unfetched.push(FailedFile {
                        filename: info.filename,
                        error: error.to_string(),
                    });
                }
            }
        }

        let mut report = self.ingest(session, &files).await?;
        report.failed.extend(unfetched);
        Ok(report)
    }

    /// Answer a question against the active index. Every user turn appends
    /// exactly one assistant turn, including on failure; errors become
    /// visible chat messages instead of corrupting the transcript.
    pub async fn query(&self, session: &mut ChatSession, text: &str) -> String {
        session.messages.push(ChatMessage::user(text));

        let response = match session.state {
            SessionState::Empty => REFUSAL_MESSAGE.to_string(),
            SessionState::Ready => self.answer_grounded(text).await,
        };

        session.messages.push(ChatMessage::assistant(&response));
        response
    }

    /// Clear the transcript and the index, reinsert the welcome message.
    pub async fn reset(&self, session: &mut ChatSession) -> Result<(), PipelineError> {
        session.messages.clear();
        session.messages.push(ChatMessage::assistant(WELCOME_MESSAGE));
        session.state = SessionState::Empty;
        self.index.clear().await?;
        Ok(())
    }

    async fn rebuild_index(
        &self,
        session: &mut ChatSession,
        chunks: &[DocumentChunk],
    ) -> Result<(), PipelineError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.retriever.embedder().embed_batch(&texts);

        self.index.rebuild(chunks, &embeddings).await?;
        session.state = SessionState::Ready;
        Ok(())
    }

    async fn answer_grounded(&self, text: &str) -> String {
        let retrieved = match self.retriever.retrieve(self.index.as_ref(), text).await {
            Ok(retrieved) => retrieved,
            Err(error) => {
                warn!(%error, "retrieval failed");
                return format!("I ran into a problem searching your documents: {error}");
            }
        };

        match composer::answer(&self.model, text, &retrieved).await {
            Ok(answer) => answer,
            Err(error) => {
                warn!(%error, "chat model call failed");
                format!("I couldn't get an answer from the chat model: {error}")
            }
        }
    }
}
