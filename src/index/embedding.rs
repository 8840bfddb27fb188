//! Text embedding providers for the passage index.

use async_trait::async_trait;

use super::IndexError;

/// Computes vector representations of text. The same provider must be used
/// at index-build time and at query time; [`fingerprint`](EmbeddingProvider::fingerprint)
/// is recorded in the index artifact so a mismatch is caught at load.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;

    /// Stable identifier written into the index artifact.
    fn fingerprint(&self) -> String;
}

/// Local hashed bag-of-words embedding. Deterministic and self-contained:
/// identical text always produces identical vectors, which is what gives
/// the retriever its reproducible ranking.
pub struct HashedBowEmbedding {
    dimension: usize,
}

impl HashedBowEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashedBowEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedBowEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        if text.trim().is_empty() {
            return Err(IndexError::EmptyQuery);
        }

        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        if words.is_empty() {
            return Ok(vector);
        }

        let weight = 1.0 / words.len() as f32;
        for word in &words {
            // Three hash positions per word for better distribution
            let h1 = fnv1a(word.as_bytes(), 0) as usize;
            let h2 = fnv1a(word.as_bytes(), 1) as usize;
            let h3 = fnv1a(word.as_bytes(), 2) as usize;

            vector[h1 % self.dimension] += weight;
            vector[h2 % self.dimension] += weight * 0.7;
            vector[h3 % self.dimension] += weight * 0.5;
        }

        normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn fingerprint(&self) -> String {
        format!("hashed-bow-v1/{}", self.dimension)
    }
}

/// FNV-1a with a seed byte folded in first, so the three probe positions
/// per word are independent.
fn fnv1a(bytes: &[u8], seed: u8) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in std::iter::once(&seed).chain(bytes) {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Scale to unit length so cosine similarity reduces to a dot product.
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
