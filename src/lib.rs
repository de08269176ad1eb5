//! chunkfuse - a local hybrid search engine over plain-text documents.
//!
//! chunkfuse chunks a directory of markdown and text files, indexes the
//! chunks twice - a flat inner-product index over embeddings for semantic
//! matching and a BM25 model for keyword matching - and merges the two
//! rankings at query time with reciprocal rank fusion.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use chunkfuse::builder::{self, BuildParams};
//! use chunkfuse::embedding::HashEmbedder;
//! use chunkfuse::search::{self, IndexSession, SearchMode};
//!
//! let embedder = HashEmbedder::default();
//! builder::build_index(
//!     &BuildParams {
//!         source_dir: "./docs".into(),
//!         index_dir: "./index".into(),
//!         chunk_chars: 500,
//!         overlap_chars: 50,
//!         batch_size: 64,
//!         force: false,
//!     },
//!     &embedder,
//! )
//! .unwrap();
//!
//! let session = IndexSession::load(Path::new("./index")).unwrap();
//! let output = search::run_search(
//!     &session, &embedder, "rust programming", 5, SearchMode::Hybrid, 60,
//! )
//! .unwrap();
//! for r in &output.results {
//!     println!("{}:{} (score: {:.4})", r.chunk.document_id, r.chunk.chunk_index, r.score);
//! }
//! ```

pub mod builder;
pub mod chunk_store;
pub mod chunking;
pub mod cli;
pub mod dense_index;
pub mod embedding;
pub mod error;
pub mod search;
pub mod sparse_index;
pub mod walker;

pub use builder::{BuildManifest, BuildOutcome, BuildParams};
pub use chunk_store::ChunkRecord;
pub use dense_index::DenseIndex;
pub use embedding::{Embedder, HashEmbedder};
pub use error::{Error, Result};
pub use search::{IndexSession, ScoredChunk, SearchMode, SearchOutput};
pub use sparse_index::Bm25Index;
