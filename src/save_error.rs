use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading or writing save records.
///
/// "Record not found" is deliberately not in here: `SaveStore::load`
/// returns `Ok(None)` for that, and the caller picks a fallback.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse save file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize save record: {0}")]
    Serialize(#[from] ron::Error),
    #[error("invalid save name {0:?}")]
    InvalidName(String),
    #[error("no save number left after {0:?}")]
    NumbersExhausted(String),
}

impl SaveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SaveError::Io {
            path: path.into(),
            source,
        }
    }
}
