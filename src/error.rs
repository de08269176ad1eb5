use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no source documents found in {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("no chunks produced from the corpus; check document extraction")]
    EmptyIndex,

    #[error("missing index artifact: {}; run 'chunkfuse build' first", .0.display())]
    IndexNotFound(PathBuf),

    #[error("invalid index file {}: {reason}", .path.display())]
    InvalidIndex { path: PathBuf, reason: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("configuration error: {0}")]
    Config(String),
}
