//! Semantic passage index over "The Innocents Abroad".
//!
//! The index is a prebuilt, immutable artifact produced offline by the
//! `build-index` binary (see [`build`]) and loaded read-only at startup.
//! Search is brute-force cosine similarity over unit-length vectors, which
//! is plenty for one book's worth of passages and keeps ranking fully
//! deterministic.

pub mod build;
mod embedding;

pub use embedding::{EmbeddingProvider, HashedBowEmbedding};

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Passages scoring below this are treated as noise and dropped.
const MIN_RELEVANCE: f32 = 0.05;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read index: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed index artifact: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("index was built with embedder '{found}' but '{expected}' is configured")]
    EmbedderMismatch { expected: String, found: String },

    #[error("cannot embed empty text")]
    EmptyQuery,
}

/// One indexed chunk of the book, with its precomputed embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageRecord {
    /// Position in corpus order; also the ranking tie-break
    pub id: usize,
    pub text: String,
    /// Roman-numeral chapter number, e.g. "XXXI"
    pub chapter_number: String,
    pub chapter_title: String,
    pub embedding: Vec<f32>,
}

/// On-disk index artifact format.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexFile {
    /// Fingerprint of the embedder that produced the vectors
    pub embedder: String,
    pub dimension: usize,
    pub passages: Vec<PassageRecord>,
}

/// A passage returned by a search, highest-relevance first.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub text: String,
    /// Display label, e.g. "Chapter XXXI - The Buried City of Pompeii"
    pub chapter_label: String,
    pub score: f32,
}

/// Read-only semantic index. Searches take `&self` and share no cursor
/// state, so concurrent queries cannot interfere.
pub struct PassageIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    passages: Vec<PassageRecord>,
}

impl PassageIndex {
    /// Load a prebuilt index artifact from disk.
    ///
    /// # Errors
    ///
    /// Fails if the file is unreadable, malformed, or was built with a
    /// different embedder than the one supplied.
    pub fn load(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path)?;
        let file: IndexFile = serde_json::from_str(&raw)?;

        if file.embedder != embedder.fingerprint() {
            return Err(IndexError::EmbedderMismatch {
                expected: embedder.fingerprint(),
                found: file.embedder,
            });
        }

        tracing::info!(
            passages = file.passages.len(),
            dimension = file.dimension,
            "Loaded passage index"
        );

        Ok(Self::from_records(file.passages, embedder))
    }

    /// Build an index directly from records (used by tests and the builder).
    pub fn from_records(
        passages: Vec<PassageRecord>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self { embedder, passages }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Return the `top_k` most relevant passages for `query`, descending by
    /// score. Equal scores keep corpus order. An empty result is not an
    /// error: it means nothing cleared the relevance threshold.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, IndexError> {
        let query_vec = self.embedder.embed(query).await?;

        let mut scored: Vec<(&PassageRecord, f32)> = self
            .passages
            .iter()
            .map(|p| (p, cosine_similarity(&query_vec, &p.embedding)))
            .filter(|(_, score)| *score >= MIN_RELEVANCE)
            .collect();

        // Total order: score descending, corpus position ascending.
        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);

        tracing::debug!(
            query = %crate::format::preview(query, 50),
            hits = scored.len(),
            "Passage search"
        );

        Ok(scored
            .into_iter()
            .map(|(p, score)| RetrievedPassage {
                text: p.text.clone(),
                chapter_label: chapter_label(&p.chapter_number, &p.chapter_title),
                score,
            })
            .collect())
    }
}

/// Human-readable chapter reference for a passage.
fn chapter_label(number: &str, title: &str) -> String {
    if title.is_empty() {
        format!("Chapter {}", number)
    } else {
        format!("Chapter {} - {}", number, title)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
