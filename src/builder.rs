//! End-to-end index construction and persistence.
//!
//! The builder walks the source directory, chunks every document, builds
//! the sparse and dense indexes, and writes the snapshot artifacts under
//! the index directory. A fingerprint over the source files short-circuits
//! rebuilds when nothing changed. The manifest is written last, so a
//! failed build never leaves a manifest claiming success for artifacts
//! that were not written.

use std::{hash::Hasher, path::{Path, PathBuf}};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::{
    chunk_store::{self, ChunkRecord, CHUNKS_FILE},
    chunking::chunk_text,
    dense_index::{DenseIndex, DENSE_FILE},
    embedding::{embed_passages, Embedder},
    error::{Error, Result},
    sparse_index::{tokenize, Bm25Index, SPARSE_FILE},
    walker::{discover_documents, SourceDocument},
};

/// On-disk file name for the build manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata describing one built index snapshot.
///
/// Serialized field names match the reference snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Content hash over the sorted source file list; drives rebuild skips.
    pub fingerprint: String,
    #[serde(rename = "pdf_count")]
    pub document_count: usize,
    pub chunk_count: usize,
    pub embedding_model: String,
    pub dim: usize,
    pub chunk_chars: usize,
    pub overlap_chars: usize,
}

impl BuildManifest {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Parameters for one build run.
#[derive(Debug, Clone)]
pub struct BuildParams {
    pub source_dir: PathBuf,
    pub index_dir: PathBuf,
    pub chunk_chars: usize,
    pub overlap_chars: usize,
    pub batch_size: usize,
    /// Rebuild even when the fingerprint is unchanged.
    pub force: bool,
}

/// What a build run did.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// Source fingerprint matched the existing manifest; nothing was done.
    Unchanged,
    Built {
        document_count: usize,
        chunk_count: usize,
    },
}

/// Hash the sorted source file list into a stable fingerprint.
///
/// Covers (path, mtime, size) per file, so any added, removed, touched or
/// resized document changes the fingerprint and invalidates the snapshot.
pub fn fingerprint_documents(documents: &[SourceDocument]) -> String {
    let mut hasher = XxHash64::with_seed(0);
    for doc in documents {
        hasher.write(doc.absolute_path.to_string_lossy().as_bytes());
        hasher.write(&doc.mtime.to_le_bytes());
        hasher.write(&doc.size.to_le_bytes());
    }
    format!("{:016x}", hasher.finish())
}

/// Build (or skip) an index snapshot.
///
/// Fails with [`Error::EmptyCorpus`] when no source documents are found
/// and [`Error::EmptyIndex`] when extraction yields zero chunks. Any other
/// failure aborts the build and propagates; partial artifacts may remain
/// but the manifest is only written after all of them succeed.
pub fn build_index<E: Embedder + ?Sized>(
    params: &BuildParams,
    embedder: &E,
) -> Result<BuildOutcome> {
    let documents = discover_documents(&params.source_dir)?;
    if documents.is_empty() {
        return Err(Error::EmptyCorpus(params.source_dir.clone()));
    }

    let fingerprint = fingerprint_documents(&documents);
    let manifest_path = params.index_dir.join(MANIFEST_FILE);

    if !params.force
        && manifest_path.exists()
        && let Ok(existing) = BuildManifest::load(&manifest_path)
        && existing.fingerprint == fingerprint
    {
        eprintln!("No changes detected, skipping rebuild (use --force to rebuild).");
        return Ok(BuildOutcome::Unchanged);
    }

    std::fs::create_dir_all(&params.index_dir)?;

    eprintln!("Found {} documents, extracting and chunking...", documents.len());

    // Read and chunk in parallel; collect preserves document order.
    let per_document: Vec<(String, String, Vec<String>)> = documents
        .par_iter()
        .map(|doc| {
            let text = std::fs::read_to_string(&doc.absolute_path)?;
            let chunks =
                chunk_text(&text, params.chunk_chars, params.overlap_chars);
            Ok((
                doc.document_id(),
                doc.absolute_path.to_string_lossy().to_string(),
                chunks,
            ))
        })
        .collect::<Result<_>>()?;

    let mut records: Vec<ChunkRecord> = Vec::new();
    for (document_id, document_path, chunks) in per_document {
        for (chunk_index, text) in chunks.into_iter().enumerate() {
            records.push(ChunkRecord {
                chunk_id: records.len() as u64,
                document_id: document_id.clone(),
                document_path: document_path.clone(),
                chunk_index: chunk_index as u64,
                text,
            });
        }
    }

    if records.is_empty() {
        return Err(Error::EmptyIndex);
    }
    eprintln!("Total chunks: {}", records.len());

    eprintln!("Building BM25 model...");
    let tokenized: Vec<Vec<String>> =
        records.iter().map(|r| tokenize(&r.text)).collect();
    let sparse = Bm25Index::build(&tokenized);

    eprintln!(
        "Embedding chunks with {} (batch size {})...",
        embedder.model_name(),
        params.batch_size
    );
    let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
    let batch_size = params.batch_size.max(1);
    let mut rows: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size) {
        rows.extend(embed_passages(embedder, batch)?);
    }
    let dense = DenseIndex::from_vectors(embedder.dimension(), rows)?;

    dense.save(&params.index_dir.join(DENSE_FILE))?;
    chunk_store::write_chunks(&records, &params.index_dir.join(CHUNKS_FILE))?;
    sparse.save(&params.index_dir.join(SPARSE_FILE))?;

    let manifest = BuildManifest {
        fingerprint,
        document_count: documents.len(),
        chunk_count: records.len(),
        embedding_model: embedder.model_name().to_string(),
        dim: embedder.dimension(),
        chunk_chars: params.chunk_chars,
        overlap_chars: params.overlap_chars,
    };
    manifest.save(&manifest_path)?;

    eprintln!("Index written to {}", params.index_dir.display());
    Ok(BuildOutcome::Built {
        document_count: manifest.document_count,
        chunk_count: manifest.chunk_count,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::embedding::HashEmbedder;

    /// Wraps [`HashEmbedder`] and counts batch calls, to observe whether
    /// a build actually did embedding work.
    struct CountingEmbedder {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: HashEmbedder::new(32),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts)
        }
    }

    fn params(source: &Path, index: &Path) -> BuildParams {
        BuildParams {
            source_dir: source.to_path_buf(),
            index_dir: index.to_path_buf(),
            chunk_chars: 100,
            overlap_chars: 20,
            batch_size: 4,
            force: false,
        }
    }

    fn write_corpus(dir: &Path) {
        std::fs::write(
            dir.join("rust.md"),
            "Rust is a systems programming language focused on safety and performance.",
        )
        .unwrap();
        std::fs::write(
            dir.join("pasta.md"),
            "Boil water in a large pot, add salt, cook the pasta and drain.",
        )
        .unwrap();
    }

    #[test]
    fn build_writes_all_artifacts_with_manifest() {
        let src = tempfile::tempdir().unwrap();
        let idx = tempfile::tempdir().unwrap();
        write_corpus(src.path());

        let embedder = HashEmbedder::new(32);
        let outcome =
            build_index(&params(src.path(), idx.path()), &embedder).unwrap();

        assert!(matches!(outcome, BuildOutcome::Built { document_count: 2, .. }));
        for file in [DENSE_FILE, CHUNKS_FILE, SPARSE_FILE, MANIFEST_FILE] {
            assert!(idx.path().join(file).exists(), "missing artifact {file}");
        }

        let manifest =
            BuildManifest::load(&idx.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.document_count, 2);
        assert!(manifest.chunk_count >= 2);
        assert_eq!(manifest.dim, 32);
        assert_eq!(manifest.chunk_chars, 100);
    }

    #[test]
    fn chunk_ids_are_contiguous_in_document_order() {
        let src = tempfile::tempdir().unwrap();
        let idx = tempfile::tempdir().unwrap();
        // Long enough to produce several chunks per document.
        std::fs::write(src.path().join("a.md"), "alpha ".repeat(60)).unwrap();
        std::fs::write(src.path().join("b.md"), "beta ".repeat(60)).unwrap();

        let embedder = HashEmbedder::new(32);
        build_index(&params(src.path(), idx.path()), &embedder).unwrap();

        let chunks =
            chunk_store::read_chunks(&idx.path().join(CHUNKS_FILE)).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, i as u64);
        }
        // Document order is walker order (sorted by path): all of a's
        // chunks precede all of b's.
        let first_b = chunks
            .iter()
            .position(|c| c.document_id == "b")
            .expect("b should have chunks");
        assert!(chunks[..first_b].iter().all(|c| c.document_id == "a"));
        assert!(chunks[first_b..].iter().all(|c| c.document_id == "b"));
    }

    #[test]
    fn empty_source_dir_is_an_error() {
        let src = tempfile::tempdir().unwrap();
        let idx = tempfile::tempdir().unwrap();

        let embedder = HashEmbedder::new(32);
        let result = build_index(&params(src.path(), idx.path()), &embedder);
        assert!(matches!(result, Err(Error::EmptyCorpus(_))));
    }

    #[test]
    fn whitespace_only_corpus_is_an_error() {
        let src = tempfile::tempdir().unwrap();
        let idx = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("blank.md"), "   \n\t\n   ").unwrap();

        let embedder = HashEmbedder::new(32);
        let result = build_index(&params(src.path(), idx.path()), &embedder);
        assert!(matches!(result, Err(Error::EmptyIndex)));
    }

    #[test]
    fn unchanged_corpus_skips_rebuild() {
        let src = tempfile::tempdir().unwrap();
        let idx = tempfile::tempdir().unwrap();
        write_corpus(src.path());

        let embedder = CountingEmbedder::new();
        let p = params(src.path(), idx.path());

        let first = build_index(&p, &embedder).unwrap();
        assert!(matches!(first, BuildOutcome::Built { .. }));
        let calls_after_first = embedder.calls();
        assert!(calls_after_first > 0);

        let second = build_index(&p, &embedder).unwrap();
        assert_eq!(second, BuildOutcome::Unchanged);
        assert_eq!(embedder.calls(), calls_after_first, "no embedding on skip");
    }

    #[test]
    fn force_rebuilds_despite_unchanged_fingerprint() {
        let src = tempfile::tempdir().unwrap();
        let idx = tempfile::tempdir().unwrap();
        write_corpus(src.path());

        let embedder = CountingEmbedder::new();
        let mut p = params(src.path(), idx.path());
        build_index(&p, &embedder).unwrap();
        let calls_after_first = embedder.calls();

        p.force = true;
        let outcome = build_index(&p, &embedder).unwrap();
        assert!(matches!(outcome, BuildOutcome::Built { .. }));
        assert!(embedder.calls() > calls_after_first);
    }

    #[test]
    fn modified_document_triggers_full_rebuild() {
        let src = tempfile::tempdir().unwrap();
        let idx = tempfile::tempdir().unwrap();
        write_corpus(src.path());

        let embedder = CountingEmbedder::new();
        let p = params(src.path(), idx.path());
        build_index(&p, &embedder).unwrap();
        let first_manifest =
            BuildManifest::load(&idx.path().join(MANIFEST_FILE)).unwrap();
        let calls_after_first = embedder.calls();

        // Changing content changes the file size, which changes the
        // fingerprint regardless of mtime granularity.
        std::fs::write(
            src.path().join("rust.md"),
            "Rust is a systems programming language focused on safety and \
             performance, with fearless concurrency on top.",
        )
        .unwrap();

        let outcome = build_index(&p, &embedder).unwrap();
        assert!(matches!(outcome, BuildOutcome::Built { .. }));
        assert!(embedder.calls() > calls_after_first);

        let second_manifest =
            BuildManifest::load(&idx.path().join(MANIFEST_FILE)).unwrap();
        assert_ne!(first_manifest.fingerprint, second_manifest.fingerprint);
    }

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let src = tempfile::tempdir().unwrap();
        write_corpus(src.path());

        let docs = discover_documents(src.path()).unwrap();
        assert_eq!(fingerprint_documents(&docs), fingerprint_documents(&docs));
    }
}
