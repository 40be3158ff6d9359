const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Embeds text into a fixed-dimension vector. The same text must always
/// produce the same vector; query embedding and chunk embedding must use the
/// same implementation within one index.
pub trait Embedder {
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;

    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Hashed character-trigram embedder. Fully deterministic and dependency-free,
/// which keeps ingestion and retrieval reproducible in tests and offline use.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let bucket = (fnv1a(window) % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        // L2-normalize so cosine similarity reduces to a dot product.
        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

fn fnv1a(window: &[char]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for c in window {
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::{CharacterNgramEmbedder, Embedder};

    #[test]
    fn embedding_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Recommended follow-up in 3 months.");
        let second = embedder.embed("Recommended follow-up in 3 months.");
        assert_eq!(first, second);
    }

    #[test]
    fn embedding_has_configured_dimension() {
        let embedder = CharacterNgramEmbedder { dimensions: 64 };
        assert_eq!(embedder.embed("hypertension").len(), 64);
    }

    #[test]
    fn embedding_is_unit_length() {
        let embedder = CharacterNgramEmbedder::default();
        let vector = embedder.embed("stage 2 hypertension follow-up");
        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn batch_matches_single_embeddings() {
        let embedder = CharacterNgramEmbedder::default();
        let texts = vec!["first chunk".to_string(), "second chunk".to_string()];
        let batch = embedder.embed_batch(&texts);
        assert_eq!(batch[0], embedder.embed("first chunk"));
        assert_eq!(batch[1], embedder.embed("second chunk"));
    }
}
