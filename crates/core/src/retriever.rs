use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::index::VectorIndex;

pub const DEFAULT_TOP_K: usize = 4;

/// Embeds a query with the same model used at ingestion and returns the
/// top-`k` chunk contents, most relevant first. An empty index yields an
/// empty sequence rather than an error.
pub struct Retriever<E: Embedder> {
    embedder: E,
    top_k: usize,
}

impl<E: Embedder> Retriever<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(embedder: E, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub async fn retrieve(
        &self,
        index: &dyn VectorIndex,
        query: &str,
    ) -> Result<Vec<String>, IndexError> {
        let query_vector = self.embedder.embed(query);
        let hits = index.search(&query_vector, self.top_k).await?;
        Ok(hits.into_iter().map(|hit| hit.chunk.text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::DocumentChunk;
    use crate::stores::MemoryIndex;

    fn chunk(ordinal: u64, text: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: format!("chunk-{ordinal}"),
            source_id: "report.pdf".to_string(),
            page: None,
            ordinal,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn retrieval_from_empty_index_is_empty() {
        let retriever = Retriever::new(CharacterNgramEmbedder::default());
        let index = MemoryIndex::new();

        let hits = retriever.retrieve(&index, "anything").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn retrieval_returns_at_most_top_k() {
        let embedder = CharacterNgramEmbedder::default();
        let chunks: Vec<DocumentChunk> = (0..10)
            .map(|i| chunk(i, &format!("medical note number {i}")))
            .collect();
        let embeddings: Vec<Vec<f32>> = chunks
            .iter()
            .map(|c| embedder.embed(&c.text))
            .collect();

        let index = MemoryIndex::new();
        index.rebuild(&chunks, &embeddings).await.unwrap();

        let retriever = Retriever::new(embedder);
        let hits = retriever.retrieve(&index, "medical note").await.unwrap();
        assert_eq!(hits.len(), DEFAULT_TOP_K);
    }

    #[tokio::test]
    async fn retrieval_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let chunks: Vec<DocumentChunk> = (0..6)
            .map(|i| chunk(i, &format!("note {i} about hypertension follow-up")))
            .collect();
        let embeddings: Vec<Vec<f32>> = chunks
            .iter()
            .map(|c| embedder.embed(&c.text))
            .collect();

        let index = MemoryIndex::new();
        index.rebuild(&chunks, &embeddings).await.unwrap();

        let retriever = Retriever::new(embedder);
        let first = retriever.retrieve(&index, "follow-up").await.unwrap();
        let second = retriever.retrieve(&index, "follow-up").await.unwrap();
        assert_eq!(first, second);
    }
}
