//! The persisted sequence of chunk records backing an index snapshot.
//!
//! Records are stored one JSON object per line (`chunks.jsonl`) so the file
//! can be streamed; the retriever loads them fully into memory and indexes
//! by `chunk_id`, which is also the row offset into the dense index.

use std::{
    io::{BufRead, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// On-disk file name for the chunk metadata artifact.
pub const CHUNKS_FILE: &str = "chunks.jsonl";

/// One indexed chunk of a source document. Immutable once written.
///
/// The serialized field names (`cv_id`, `pdf_path`) match the snapshot
/// format produced by the original indexer so existing snapshots stay
/// readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Sequential, corpus-wide unique ID; row offset into the dense index.
    pub chunk_id: u64,
    /// Identifier of the source document.
    #[serde(rename = "cv_id")]
    pub document_id: String,
    /// Original source location, for traceability.
    #[serde(rename = "pdf_path")]
    pub document_path: String,
    /// 0-based position of this chunk within its document.
    pub chunk_index: u64,
    /// The chunk's raw text content.
    pub text: String,
}

impl ChunkRecord {
    /// The dedup key used during rank fusion: two hits referencing the
    /// same `(document_id, chunk_index)` are the same logical chunk.
    pub fn fusion_key(&self) -> (String, u64) {
        (self.document_id.clone(), self.chunk_index)
    }
}

/// Write chunk records to `path`, one JSON object per line.
pub fn write_chunks(chunks: &[ChunkRecord], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    for chunk in chunks {
        serde_json::to_writer(&mut writer, chunk)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read chunk records back from `path`.
///
/// Blank lines are skipped; a malformed line is a fatal error since the
/// file is internally produced.
pub fn read_chunks(path: &Path) -> Result<Vec<ChunkRecord>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);

    let mut chunks = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        chunks.push(serde_json::from_str(trimmed)?);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks() -> Vec<ChunkRecord> {
        vec![
            ChunkRecord {
                chunk_id: 0,
                document_id: "alpha".to_string(),
                document_path: "/corpus/alpha.md".to_string(),
                chunk_index: 0,
                text: "first chunk".to_string(),
            },
            ChunkRecord {
                chunk_id: 1,
                document_id: "alpha".to_string(),
                document_path: "/corpus/alpha.md".to_string(),
                chunk_index: 1,
                text: "second chunk with \"quotes\" and\nnewlines".to_string(),
            },
            ChunkRecord {
                chunk_id: 2,
                document_id: "beta".to_string(),
                document_path: "/corpus/beta.txt".to_string(),
                chunk_index: 0,
                text: "unicode: caf\u{e9} \u{1f389}".to_string(),
            },
        ]
    }

    #[test]
    fn roundtrip_preserves_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CHUNKS_FILE);

        let chunks = sample_chunks();
        write_chunks(&chunks, &path).unwrap();
        let restored = read_chunks(&path).unwrap();

        assert_eq!(restored, chunks);
    }

    #[test]
    fn serialized_field_names_match_snapshot_format() {
        let json = serde_json::to_string(&sample_chunks()[0]).unwrap();
        assert!(json.contains("\"cv_id\":\"alpha\""));
        assert!(json.contains("\"pdf_path\":\"/corpus/alpha.md\""));
        assert!(json.contains("\"chunk_id\":0"));
        assert!(json.contains("\"chunk_index\":0"));
    }

    #[test]
    fn one_record_per_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CHUNKS_FILE);

        write_chunks(&sample_chunks(), &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CHUNKS_FILE);

        write_chunks(&sample_chunks()[..1], &path).unwrap();
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("\n\n");
        std::fs::write(&path, contents).unwrap();

        let restored = read_chunks(&path).unwrap();
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn malformed_line_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CHUNKS_FILE);
        std::fs::write(&path, "{not json}\n").unwrap();

        assert!(read_chunks(&path).is_err());
    }
}
