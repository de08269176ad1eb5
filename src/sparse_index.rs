//! BM25 lexical scoring over tokenized chunk text.
//!
//! The model follows BM25-Okapi as implemented by the `rank_bm25` family
//! of scorers: k1 = 1.5, b = 0.75, and negative IDF values floored at
//! `epsilon * average_idf` so very common terms still contribute a small
//! positive weight. Scores are produced for every chunk in chunk_id order;
//! a score of zero or below means no lexical match.

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// On-disk file name for the sparse model artifact.
pub const SPARSE_FILE: &str = "bm25.json";

const K1: f32 = 1.5;
const B: f32 = 0.75;
const EPSILON: f32 = 0.25;

/// Split text into lowercased word tokens.
///
/// A token is a run of alphanumeric characters plus `_ + # . -`, so
/// identifiers like `c++`, `c#` and `node.js` survive as single tokens.
/// Applied identically to corpus chunks at build time and to queries at
/// search time.
///
/// # Examples
///
/// ```
/// use chunkfuse::sparse_index::tokenize;
///
/// assert_eq!(tokenize("C++ and Node.js!"), vec!["c++", "and", "node.js"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| {
            !(c.is_alphanumeric() || matches!(c, '_' | '+' | '#' | '.' | '-'))
        })
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// A sparse search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseHit {
    pub chunk_id: u64,
    pub score: f32,
}

/// BM25-Okapi model over the whole corpus, positions aligned with chunk_id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Bm25Index {
    /// Per-chunk term frequencies, indexed by chunk_id.
    term_freqs: Vec<HashMap<String, u32>>,
    /// Per-chunk token counts, indexed by chunk_id.
    doc_lens: Vec<u32>,
    /// Average chunk length in tokens.
    avgdl: f32,
    /// Per-term inverse document frequency, epsilon-floored.
    idf: HashMap<String, f32>,
}

impl Bm25Index {
    /// Build the model from tokenized chunks, one token list per chunk in
    /// chunk_id order.
    pub fn build(tokenized_chunks: &[Vec<String>]) -> Self {
        let corpus_size = tokenized_chunks.len();

        let mut term_freqs = Vec::with_capacity(corpus_size);
        let mut doc_lens = Vec::with_capacity(corpus_size);
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for tokens in tokenized_chunks {
            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lens.push(tokens.len() as u32);
            term_freqs.push(freqs);
        }

        let total_len: u64 = doc_lens.iter().map(|&l| u64::from(l)).sum();
        let avgdl = if corpus_size == 0 {
            0.0
        } else {
            total_len as f32 / corpus_size as f32
        };

        // Raw IDF, collecting negatives for the epsilon floor.
        let mut idf: HashMap<String, f32> = HashMap::with_capacity(doc_freqs.len());
        let mut idf_sum = 0.0f32;
        let mut negative_terms: Vec<String> = Vec::new();
        for (term, df) in &doc_freqs {
            let value = ((corpus_size as f32 - *df as f32 + 0.5)
                / (*df as f32 + 0.5))
                .ln();
            idf_sum += value;
            if value < 0.0 {
                negative_terms.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }

        if !idf.is_empty() {
            let average_idf = idf_sum / idf.len() as f32;
            let floor = EPSILON * average_idf;
            for term in negative_terms {
                idf.insert(term, floor);
            }
        }

        Self {
            term_freqs,
            doc_lens,
            avgdl,
            idf,
        }
    }

    /// Number of chunks in the model.
    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// Score every chunk against the query tokens.
    ///
    /// Returns one score per chunk in chunk_id order. Terms absent from
    /// the corpus contribute nothing.
    pub fn score_all(&self, query_tokens: &[String]) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.len()];

        for token in query_tokens {
            let Some(&idf) = self.idf.get(token) else {
                continue;
            };
            for (chunk, score) in scores.iter_mut().enumerate() {
                let freq = self.term_freqs[chunk]
                    .get(token)
                    .copied()
                    .unwrap_or(0) as f32;
                if freq == 0.0 {
                    continue;
                }
                let dl = self.doc_lens[chunk] as f32;
                let denom = freq + K1 * (1.0 - B + B * dl / self.avgdl);
                *score += idf * freq * (K1 + 1.0) / denom;
            }
        }

        scores
    }

    /// Tokenize the query, score all chunks, and return the top `k` hits
    /// with strictly positive scores, ordered by descending score.
    pub fn search(&self, query: &str, k: usize) -> Vec<SparseHit> {
        let query_tokens = tokenize(query);
        let scores = self.score_all(&query_tokens);

        let mut hits: Vec<SparseHit> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .map(|(chunk_id, score)| SparseHit {
                chunk_id: chunk_id as u64,
                score,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }

    /// Serialize the model to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load a model previously written by [`Bm25Index::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
