//! Flat exhaustive inner-product index over chunk embeddings.
//!
//! Every row is L2-normalized at build time, so inner product equals
//! cosine similarity. Search is a brute-force scan: corpora are small
//! (hundreds to low thousands of chunks), exactness keeps the fusion
//! step easy to reason about, and no approximate structure is justified.
//!
//! # On-disk layout (`dense.idx`)
//!
//! All integers little-endian:
//!
//! ```text
//! magic:   b"CFDI"      (4 bytes)
//! version: u16          (2 bytes)
//! dim:     u32          (4 bytes)
//! count:   u64          (8 bytes)
//! slab:    count * dim * 4 bytes of f32, row-major
//! ```
//!
//! Row position in the slab is the `chunk_id` of the corresponding
//! chunk record.

use std::{
    io::{BufWriter, Read, Write},
    path::Path,
};

use crate::{
    embedding::l2_normalize,
    error::{Error, Result},
};

/// On-disk file name for the dense index artifact.
pub const DENSE_FILE: &str = "dense.idx";

const MAGIC: &[u8; 4] = b"CFDI";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 4 + 2 + 4 + 8;

/// A dense search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseHit {
    pub chunk_id: u64,
    pub score: f32,
}

/// Flat inner-product index; rows are unit-length embedding vectors.
pub struct DenseIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

impl DenseIndex {
    /// Build an index from embedding rows, normalizing each to unit length.
    ///
    /// Row order must match chunk_id order. Fails if any row's length
    /// differs from `dimension`.
    pub fn from_vectors(dimension: usize, rows: Vec<Vec<f32>>) -> Result<Self> {
        let mut vectors = Vec::with_capacity(rows.len() * dimension);
        for (i, mut row) in rows.into_iter().enumerate() {
            if row.len() != dimension {
                return Err(Error::Embedding(format!(
                    "embedding row {i} has dimension {}, expected {dimension}",
                    row.len()
                )));
            }
            l2_normalize(&mut row);
            vectors.extend_from_slice(&row);
        }
        Ok(Self { dimension, vectors })
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Exhaustive nearest-neighbor search by inner product.
    ///
    /// The query must already be normalized via the shared query-embedding
    /// path. Returns up to `k` hits ordered by descending score; if the
    /// index holds fewer than `k` vectors, all of them are returned.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<DenseHit>> {
        if query.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }

        let mut hits: Vec<DenseHit> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| DenseHit {
                chunk_id: row as u64,
                score: dot(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Write the index to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        writer.write_all(bytemuck::cast_slice(&self.vectors))?;
        writer.flush()?;
        Ok(())
    }

    /// Read an index back from `path`, validating the header.
    pub fn load(path: &Path) -> Result<Self> {
        let mut bytes = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut bytes)?;

        let invalid = |reason: &str| Error::InvalidIndex {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if bytes.len() < HEADER_SIZE {
            return Err(invalid("file shorter than header"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(invalid("bad magic"));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(invalid(&format!("unsupported version {version}")));
        }

        let dimension =
            u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
        let count = u64::from_le_bytes(
            bytes[10..18].try_into().map_err(|_| invalid("truncated header"))?,
        ) as usize;

        let expected = HEADER_SIZE + count * dimension * 4;
        if bytes.len() != expected {
            return Err(invalid(&format!(
                "expected {expected} bytes, found {}",
                bytes.len()
            )));
        }

        // pod_collect_to_vec copies, so the slab needs no 4-byte alignment.
        let vectors: Vec<f32> =
            bytemuck::pod_collect_to_vec(&bytes[HEADER_SIZE..]);
        Ok(Self { dimension, vectors })
    }
}

impl std::fmt::Debug for DenseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseIndex")
            .field("dimension", &self.dimension)
            .field("len", &self.len())
            .finish()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> DenseIndex {
        DenseIndex::from_vectors(
            3,
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 2.0, 0.0], // normalized to [0, 1, 0]
                vec![1.0, 1.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rows_are_normalized() {
        let index = sample_index();
        let hits = index.search(&[0.0, 1.0, 0.0], 3).unwrap();
        // Row 1 was [0, 2, 0]; after normalization its self-similarity is 1.
        assert_eq!(hits[0].chunk_id, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_orders_by_descending_score() {
        let index = sample_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(hits[0].chunk_id, 0);
    }

    #[test]
    fn k_larger_than_corpus_returns_all() {
        let index = sample_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 100).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let index = sample_index();
        assert!(index.search(&[1.0, 0.0], 3).is_err());
        assert!(
            DenseIndex::from_vectors(3, vec![vec![1.0, 0.0]]).is_err()
        );
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DENSE_FILE);

        let index = sample_index();
        index.save(&path).unwrap();

        let restored = DenseIndex::load(&path).unwrap();
        assert_eq!(restored.dimension(), 3);
        assert_eq!(restored.len(), 3);

        let before = index.search(&[1.0, 1.0, 0.0], 3).unwrap();
        let after = restored.search(&[1.0, 1.0, 0.0], 3).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn load_rejects_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DENSE_FILE);
        std::fs::write(&path, b"not an index").unwrap();
        assert!(matches!(
            DenseIndex::load(&path),
            Err(Error::InvalidIndex { .. })
        ));
    }

    #[test]
    fn load_rejects_truncated_slab() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DENSE_FILE);

        sample_index().save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        assert!(matches!(
            DenseIndex::load(&path),
            Err(Error::InvalidIndex { .. })
        ));
    }

    #[test]
    fn empty_index_searches_empty() {
        let index = DenseIndex::from_vectors(4, vec![]).unwrap();
        assert!(index.is_empty());
        let hits = index.search(&[0.0, 0.0, 0.0, 0.0], 5).unwrap();
        assert!(hits.is_empty());
    }
}
