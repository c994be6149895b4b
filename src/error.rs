use std::path::PathBuf;

use thiserror::Error;

use crate::ids::TraversalId;

/// Failures of the environment the storage lives in. Contract
/// violations by the caller are not represented here; they panic.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path_display(.path))]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {reason}", .path.display())]
    BadHeader { path: PathBuf, reason: String },

    #[error("could not start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn path_display(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "anonymous mapping".to_string(),
    }
}

impl StorageError {
    pub(crate) fn io(path: Option<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io { path, source }
    }
}

/// Inconsistencies found while reconstructing traversals from vertex
/// occurrences. These indicate corrupted input and abort the
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathGraphError {
    #[error("traversal {traversal} has no vertex at ordinal {ordinal}")]
    MissingOrdinal {
        traversal: TraversalId,
        ordinal: u64,
    },

    #[error(
        "traversal {traversal} visits two vertices at ordinal {ordinal}"
    )]
    DuplicateOrdinal {
        traversal: TraversalId,
        ordinal: u64,
    },
}
