use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading the offline artifacts. None of these are recoverable:
/// the process cannot serve a single request without all four artifacts.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("{name} artifact not found at {path}")]
    Missing { name: &'static str, path: PathBuf },

    #[error("could not read {name} artifact at {path}: {source}")]
    Io {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} artifact at {path} is corrupt: {source}")]
    Corrupt {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("item table at {path} is invalid: {source}")]
    ItemTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("sparse matrix structure is invalid: {0}")]
    InvalidMatrix(String),

    #[error("artifacts are inconsistent: {0}")]
    Inconsistent(String),
}

/// Per-request failures of a recommendation lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecommendError {
    #[error("unknown title: {0:?}")]
    UnknownTitle(String),

    #[error("external key {0:?} is not known to the encoder")]
    UnknownKey(String),

    #[error("the number of recommendations must be at least one")]
    InvalidCount,
}

impl RecommendError {
    /// The message shown to an end user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            RecommendError::UnknownTitle(_) => "Please select a valid book title.",
            RecommendError::UnknownKey(_) => NO_RECOMMENDATIONS,
            RecommendError::InvalidCount => "Please request at least one recommendation.",
        }
    }
}

pub const NO_RECOMMENDATIONS: &str = "No recommendations found.";
