use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// The pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Segmentation,
    Embedding,
    Indexing,
    Query,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extraction => "extraction",
            Stage::Segmentation => "segmentation",
            Stage::Embedding => "embedding",
            Stage::Indexing => "indexing",
            Stage::Query => "query",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("model error: {0}")]
    Model(#[from] pylate_rs::ColbertError),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("text extraction failed for {origin}: {cause}")]
    ExtractionFailed { origin: String, cause: String },

    #[error("no indexable units found in document")]
    NoUnitsFound,

    #[error(
        "dimension mismatch{}: expected {}, got {}",
        describe_position(.position),
        .expected,
        .actual
    )]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        /// Offending vector in a build; `None` for a query vector.
        position: Option<usize>,
    },

    #[error("non-finite component{}", describe_position(.position))]
    NonFiniteVector {
        /// Offending vector in a build; `None` for a query vector.
        position: Option<usize>,
    },

    #[error("cannot build a vector store from zero vectors")]
    EmptyBuild,

    #[error("cannot build a vector store from zero-length vectors")]
    ZeroDimension,

    #[error("vector store has not been built")]
    NotBuilt,

    #[error("no document has been ingested yet")]
    NotReady,

    #[error("query text is empty")]
    EmptyQuery,

    #[error("number of requested results must be positive")]
    InvalidCount,

    #[error("embedding failed for \"{text}\": {cause}")]
    EmbeddingFailed { text: String, cause: String },
}

fn describe_position(position: &Option<usize>) -> String {
    match position {
        Some(p) => format!(" at vector {p}"),
        None => " in query vector".to_string(),
    }
}

impl Error {
    /// The pipeline stage this error belongs to, for retrieval errors.
    ///
    /// Storage and configuration errors have no stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::ExtractionFailed { .. } => Some(Stage::Extraction),
            Error::NoUnitsFound => Some(Stage::Segmentation),
            Error::EmbeddingFailed { .. }
            | Error::Model(_)
            | Error::Tensor(_) => Some(Stage::Embedding),
            Error::DimensionMismatch {
                position: Some(_), ..
            }
            | Error::NonFiniteVector { position: Some(_) }
            | Error::EmptyBuild
            | Error::ZeroDimension => Some(Stage::Indexing),
            Error::DimensionMismatch { position: None, .. }
            | Error::NonFiniteVector { position: None }
            | Error::NotBuilt
            | Error::NotReady
            | Error::EmptyQuery
            | Error::InvalidCount => Some(Stage::Query),
            Error::Io(_)
            | Error::Redb(_)
            | Error::RedbStorage(_)
            | Error::RedbTransaction(_)
            | Error::RedbTable(_)
            | Error::RedbCommit(_)
            | Error::Config(_)
            | Error::Json(_)
            | Error::DataDir(_) => None,
        }
    }
}
