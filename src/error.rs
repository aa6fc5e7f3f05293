use thiserror::Error;

/// Store failures callers are expected to match on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("catalog entry {id} not found")]
    NotFound { id: i64 },
}

/// Reasons a user query is refused before it reaches the matcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryRejection {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("expected `Name, Category, Region`")]
    BadFormat,
    #[error("category `{0}` is not supported yet")]
    UnsupportedCategory(String),
    #[error("region `{0}` is not supported yet")]
    UnsupportedRegion(String),
}
