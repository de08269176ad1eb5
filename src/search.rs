//! Query-time retrieval over a built index snapshot.
//!
//! An [`IndexSession`] loads the three snapshot artifacts once and serves
//! repeated queries without rebuilding. Hybrid search runs the dense and
//! sparse indexes independently over an enlarged candidate pool and merges
//! the two ranked lists with Reciprocal Rank Fusion.

use std::{collections::HashMap, path::Path};

use serde::Serialize;

use crate::{
    chunk_store::{self, ChunkRecord, CHUNKS_FILE},
    dense_index::{DenseIndex, DENSE_FILE},
    embedding::{embed_query, Embedder},
    error::{Error, Result},
    sparse_index::{Bm25Index, SPARSE_FILE},
};

/// Default number of results per query.
pub const DEFAULT_TOPK: usize = 5;

/// Default RRF constant. Higher values flatten the rank weighting,
/// lower values sharpen the preference for top ranks.
pub const DEFAULT_RRF_K: u32 = 60;

/// Which ranking(s) a search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Vector similarity only.
    Dense,
    /// BM25 only.
    Sparse,
    /// Both lists plus the fused ranking.
    Hybrid,
    /// Fused ranking only.
    Reranked,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchMode::Dense => "dense",
            SearchMode::Sparse => "sparse",
            SearchMode::Hybrid => "hybrid",
            SearchMode::Reranked => "reranked",
        };
        write!(f, "{name}")
    }
}

/// A retrieved chunk with its method-specific score: inner product for
/// dense hits, BM25 weight sum for sparse hits, RRF total for fused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub score: f32,
    #[serde(flatten)]
    pub chunk: ChunkRecord,
}

/// The full result of one search call.
///
/// `results` is the primary ordered output; the diagnostic lists are
/// populated only for hybrid/reranked modes. Like the chunk records, the
/// diagnostic lists serialize under the field names of the original
/// query interface (`faiss_results`, `bm25_results`) so consumers of the
/// JSON output keep working.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub mode: SearchMode,
    pub topk: usize,
    pub results: Vec<ScoredChunk>,
    #[serde(rename = "faiss_results")]
    pub dense_results: Option<Vec<ScoredChunk>>,
    #[serde(rename = "bm25_results")]
    pub sparse_results: Option<Vec<ScoredChunk>>,
    pub reranked: Option<Vec<ScoredChunk>>,
}

/// A loaded, immutable index snapshot.
///
/// Load once, search many times; nothing mutates after load, so a session
/// can be shared freely across threads.
pub struct IndexSession {
    pub chunks: Vec<ChunkRecord>,
    pub dense: DenseIndex,
    pub sparse: Bm25Index,
}

impl IndexSession {
    /// Read the chunk store, dense index, and sparse model from
    /// `index_dir`. Fails with [`Error::IndexNotFound`] naming the first
    /// missing artifact; a build must have run before searching.
    pub fn load(index_dir: &Path) -> Result<Self> {
        let dense_path = index_dir.join(DENSE_FILE);
        let chunks_path = index_dir.join(CHUNKS_FILE);
        let sparse_path = index_dir.join(SPARSE_FILE);
        for path in [&dense_path, &chunks_path, &sparse_path] {
            if !path.exists() {
                return Err(Error::IndexNotFound(path.clone()));
            }
        }

        Ok(Self {
            chunks: chunk_store::read_chunks(&chunks_path)?,
            dense: DenseIndex::load(&dense_path)?,
            sparse: Bm25Index::load(&sparse_path)?,
        })
    }

    fn hydrate(&self, chunk_id: u64, score: f32) -> Result<ScoredChunk> {
        let chunk = self.chunks.get(chunk_id as usize).ok_or_else(|| {
            Error::Config(format!(
                "chunk_id {chunk_id} out of range; index artifacts disagree"
            ))
        })?;
        Ok(ScoredChunk {
            score,
            chunk: chunk.clone(),
        })
    }

    fn search_dense<E: Embedder + ?Sized>(
        &self,
        embedder: &E,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vector = embed_query(embedder, query)?;
        self.dense
            .search(&query_vector, k)?
            .into_iter()
            .map(|hit| self.hydrate(hit.chunk_id, hit.score))
            .collect()
    }

    fn search_sparse(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        self.sparse
            .search(query, k)
            .into_iter()
            .map(|hit| self.hydrate(hit.chunk_id, hit.score))
            .collect()
    }
}

/// Merge two ranked lists by Reciprocal Rank Fusion.
///
/// Each list contributes `1 / (rrf_k + rank)` per chunk, rank 1-based;
/// a chunk absent from a list contributes nothing from it. Chunks are
/// deduplicated by `(document_id, chunk_index)` and the dense record
/// takes precedence when both lists carry the same chunk. Ordering is by
/// total RRF score descending; ties keep first-seen order (dense list
/// first), which the stable sort preserves.
pub fn fuse_rrf(
    dense: &[ScoredChunk],
    sparse: &[ScoredChunk],
    rrf_k: u32,
) -> Vec<ScoredChunk> {
    let mut scores: HashMap<(String, u64), f32> = HashMap::new();
    let mut records: HashMap<(String, u64), &ChunkRecord> = HashMap::new();
    let mut order: Vec<(String, u64)> = Vec::new();

    for list in [dense, sparse] {
        for (rank, result) in list.iter().enumerate() {
            let key = result.chunk.fusion_key();
            let contribution = 1.0 / (rrf_k as f32 + rank as f32 + 1.0);
            match scores.get_mut(&key) {
                Some(total) => *total += contribution,
                None => {
                    scores.insert(key.clone(), contribution);
                    order.push(key.clone());
                }
            }
            // Dense runs first, so an existing entry wins.
            records.entry(key).or_insert(&result.chunk);
        }
    }

    let mut fused: Vec<ScoredChunk> = order
        .into_iter()
        .map(|key| ScoredChunk {
            score: scores[&key],
            chunk: records[&key].clone(),
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}

/// Run one query against a loaded session.
///
/// Dense/sparse modes search their index with `k = topk`. Hybrid and
/// reranked modes retrieve a wider candidate pool of `max(topk * 4, 20)`
/// from each index before fusing, so a chunk strong in one ranking but
/// deep in the other is not missed. An empty result list is a valid
/// outcome, not an error.
pub fn run_search<E: Embedder + ?Sized>(
    session: &IndexSession,
    embedder: &E,
    query: &str,
    topk: usize,
    mode: SearchMode,
    rrf_k: u32,
) -> Result<SearchOutput> {
    let fusing = matches!(mode, SearchMode::Hybrid | SearchMode::Reranked);
    let candidate_k = if fusing { (topk * 4).max(20) } else { topk };

    let mut output = SearchOutput {
        query: query.to_string(),
        mode,
        topk,
        results: Vec::new(),
        dense_results: None,
        sparse_results: None,
        reranked: None,
    };

    match mode {
        SearchMode::Dense => {
            output.results = session.search_dense(embedder, query, candidate_k)?;
        }
        SearchMode::Sparse => {
            output.results = session.search_sparse(query, candidate_k)?;
        }
        SearchMode::Hybrid | SearchMode::Reranked => {
            let dense = session.search_dense(embedder, query, candidate_k)?;
            let sparse = session.search_sparse(query, candidate_k)?;

            let fused = fuse_rrf(&dense, &sparse, rrf_k);
            output.results = fused.iter().take(topk).cloned().collect();
            output.dense_results = Some(dense);
            output.sparse_results = Some(sparse);
            output.reranked = Some(fused);
        }
    }

    Ok(output)
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect::<String>().replace('\n', " ")
}

fn print_list(title: &str, results: &[ScoredChunk], topk: usize) {
    println!("--- {title} ---");
    for r in results.iter().take(topk) {
        println!(
            "  [{:.4}] cv_id={}  chunk={}",
            r.score, r.chunk.document_id, r.chunk.chunk_index
        );
        println!("  {}", preview(&r.chunk.text));
        println!();
    }
}

/// Format results for human-readable terminal output.
pub fn format_human(output: &SearchOutput) {
    println!(
        "\nQuery: \"{}\"  |  mode={}  |  topk={}\n",
        output.query, output.mode, output.topk
    );
    println!("{}", "=".repeat(70));

    match output.mode {
        SearchMode::Dense => {
            print_list("Dense (semantic)", &output.results, output.topk);
        }
        SearchMode::Sparse => {
            print_list("BM25 (keyword)", &output.results, output.topk);
        }
        SearchMode::Hybrid | SearchMode::Reranked => {
            if output.mode == SearchMode::Hybrid {
                if let Some(dense) = &output.dense_results {
                    print_list("Dense (semantic)", dense, output.topk);
                }
                if let Some(sparse) = &output.sparse_results {
                    print_list("BM25 (keyword)", sparse, output.topk);
                }
            }
            print_list("Reranked (RRF)", &output.results, output.topk);
        }
    }

    if output.results.is_empty() {
        println!("No results found.");
    }
    println!("{}", "=".repeat(70));
}

/// Format the full search output as a single JSON object.
pub fn format_json(output: &SearchOutput) -> Result<String> {
    Ok(serde_json::to_string_pretty(output)?)
}
