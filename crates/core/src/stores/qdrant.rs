use crate::error::IndexError;
use crate::index::VectorIndex;
use crate::models::{DocumentChunk, ScoredChunk};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Persistent named-collection index backed by the Qdrant REST API. The
/// collection survives across ingestion calls within a session and can be
/// explicitly cleared.
pub struct QdrantIndex {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantIndex {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    async fn recreate_collection(&self) -> Result<(), IndexError> {
        // Drop-if-exists; a missing collection is fine.
        let _ = self
            .client
            .delete(format!("{}/collections/{}", self.endpoint, self.collection))
            .send()
            .await;

        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, self.collection))
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
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

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != self.vector_size {
                    return Err(IndexError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": chunk.ordinal,
                    "vector": embedding,
                    "payload": {
                        "chunk_id": chunk.chunk_id,
                        "source_id": chunk.source_id,
                        "page": chunk.page,
                        "ordinal": chunk.ordinal,
                        "text": chunk.text,
                    },
                }))
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        // Replace semantics: recreate the collection, then upsert the batch.
        self.recreate_collection().await?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query_vector.len() != self.vector_size {
            return Err(IndexError::Request(format!(
                "query vector dimension {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&json!({
                "vector": query_vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        // A collection that was never built behaves as an empty index.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut result = Vec::new();
        for hit in hits {
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            let payload_str = |path: &str| {
                hit.pointer(path)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            result.push(ScoredChunk {
                chunk: DocumentChunk {
                    chunk_id: payload_str("/payload/chunk_id"),
                    source_id: payload_str("/payload/source_id"),
                    page: hit
                        .pointer("/payload/page")
                        .and_then(Value::as_u64)
                        .map(|page| page as u32),
                    ordinal: hit
                        .pointer("/payload/ordinal")
                        .and_then(Value::as_u64)
                        .unwrap_or_default(),
                    text: payload_str("/payload/text"),
                },
                score,
            });
        }

        Ok(result)
    }

    async fn clear(&self) -> Result<(), IndexError> {
        self.recreate_collection().await
    }

    async fn is_empty(&self) -> Result<bool, IndexError> {
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/count",
                self.endpoint, self.collection
            ))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(true);
        }

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let count = parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(count == 0)
    }
}
