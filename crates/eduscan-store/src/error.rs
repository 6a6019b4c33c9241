use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("student id already exists: {0}")]
    DuplicateKey(String),
    #[error("student {id}: embedding has {actual} dimensions, stored students use {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },
    #[error("student {0}: stored face embedding is unreadable")]
    CorruptEmbedding(String),
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("unit not found: {0}")]
    UnitNotFound(i64),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("bad timestamp in attendance log: {0}")]
    BadTimestamp(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}
