use crate::error::IndexError;
use crate::index::VectorIndex;
use crate::models::{DocumentChunk, ScoredChunk};
use async_trait::async_trait;
use std::sync::RwLock;

struct Entry {
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

/// Ephemeral in-process index: brute-force cosine similarity over all stored
/// vectors. One build per session, discarded on reset. The lock exists only
/// so the index can be used through `&self`; sessions are not shared.
pub struct MemoryIndex {
    entries: RwLock<Vec<Entry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        (dot / (mag_a * mag_b)) as f64
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn rebuild(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::Request(format!(
                "embedding count {} does not match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        // Build the replacement outside the lock, then swap, so a failed
        // batch never leaves a half-built index behind.
        let replacement: Vec<Entry> = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, vector)| Entry {
                chunk: chunk.clone(),
                vector: vector.clone(),
            })
            .collect();

        let mut entries = self
            .entries
            .write()
            .map_err(|_| IndexError::Request("index lock poisoned".to_string()))?;
        *entries = replacement;
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| IndexError::Request("index lock poisoned".to_string()))?;

        let mut scored: Vec<ScoredChunk> = entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query_vector, &entry.vector),
            })
            .collect();

        // Tie-break on ordinal so repeated searches return a stable order.
        scored.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then(left.chunk.ordinal.cmp(&right.chunk.ordinal))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn clear(&self) -> Result<(), IndexError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| IndexError::Request("index lock poisoned".to_string()))?;
        entries.clear();
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool, IndexError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| IndexError::Request("index lock poisoned".to_string()))?;
        Ok(entries.is_empty())
    }
}
