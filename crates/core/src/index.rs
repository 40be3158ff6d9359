use crate::error::IndexError;
use crate::models::{DocumentChunk, ScoredChunk};
use async_trait::async_trait;

/// A queryable collection of (chunk, vector) pairs. The session controller
/// depends only on this capability; the backing store may be ephemeral
/// ([`crate::MemoryIndex`]) or a persistent named collection
/// ([`crate::QdrantIndex`]).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace the entire index contents with this batch. Each ingestion
    /// builds a fresh index; prior contents are discarded, not merged. On
    /// failure the previous contents must remain intact.
    async fn rebuild(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError>;

    /// Top-`k` chunks by similarity, best first. An empty index returns an
    /// empty sequence; repeated calls with the same inputs return the same
    /// ordering.
    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Drop all indexed content.
    async fn clear(&self) -> Result<(), IndexError>;

    async fn is_empty(&self) -> Result<bool, IndexError>;
}
