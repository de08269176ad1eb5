//! The embedding capability behind dense retrieval.
//!
//! The retrieval engine never talks to a concrete model: it goes through
//! the [`Embedder`] trait, so a learned transformer backend can be swapped
//! in without touching index construction or search. The built-in
//! [`HashEmbedder`] is a deterministic signed feature-hashing encoder
//! (word tokens plus character trigrams), which keeps builds and searches
//! fully offline and reproducible.
//!
//! Retrieval roles follow the E5 convention: corpus chunks are embedded
//! with a `"passage: "` prefix and queries with a `"query: "` prefix.
//! Build and search must agree on this, so all call sites go through
//! [`embed_passages`] and [`embed_query`].

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::error::{Error, Result};

/// Prefix applied to corpus chunks at index time.
pub const PASSAGE_PREFIX: &str = "passage: ";

/// Prefix applied to query text at search time.
pub const QUERY_PREFIX: &str = "query: ";

/// A black-box text embedding service.
pub trait Embedder {
    /// Name recorded in the build manifest.
    fn model_name(&self) -> &str;

    /// Output vector dimension.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts. Output vectors are not required to be
    /// normalized; normalization happens at index build and query time.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed corpus chunks with the passage prefix applied.
pub fn embed_passages<E: Embedder + ?Sized>(
    embedder: &E,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let prefixed: Vec<String> =
        texts.iter().map(|t| format!("{PASSAGE_PREFIX}{t}")).collect();
    embedder.embed_batch(&prefixed)
}

/// Embed a query with the query prefix applied and L2-normalize the
/// result, matching the normalization applied to indexed passages.
pub fn embed_query<E: Embedder + ?Sized>(
    embedder: &E,
    query: &str,
) -> Result<Vec<f32>> {
    let batch = embedder.embed_batch(&[format!("{QUERY_PREFIX}{query}")])?;
    let mut vector = batch.into_iter().next().ok_or_else(|| {
        Error::Embedding("embedder returned no vectors for query".to_string())
    })?;
    l2_normalize(&mut vector);
    Ok(vector)
}

/// Normalize a vector to unit length in place. Zero vectors are left
/// untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Deterministic signed feature-hashing embedder.
///
/// Each lowercased word token and each character trigram within it hashes
/// to a dimension with a +/-1 sign; trigram features are half-weighted.
/// Texts sharing vocabulary or word fragments land near each other, which
/// is enough signal for offline use and for exercising the retrieval
/// pipeline end to end.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    name: String,
}

/// Default dimension for [`HashEmbedder`].
pub const DEFAULT_HASH_DIMENSION: usize = 256;

const TOKEN_SEED: u64 = 0x5eed_0001;
const TRIGRAM_SEED: u64 = 0x5eed_0002;

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            name: format!("feature-hash-{dimension}"),
        }
    }

    fn accumulate(&self, vector: &mut [f32], seed: u64, feature: &str, weight: f32) {
        let mut hasher = XxHash64::with_seed(seed);
        hasher.write(feature.as_bytes());
        let hash = hasher.finish();

        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            self.accumulate(&mut vector, TOKEN_SEED, token, 1.0);

            let chars: Vec<char> = token.chars().collect();
            if chars.len() < 3 {
                continue;
            }
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, TRIGRAM_SEED, &trigram, 0.5);
            }
        }

        vector
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
