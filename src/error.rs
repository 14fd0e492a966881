use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Reference corpus is empty")]
    EmptyReferenceCorpus,
}

pub type Result<T> = std::result::Result<T, SearchError>;
