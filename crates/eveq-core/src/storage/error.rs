use crate::core::models::IdentityError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot store a null record")]
    NullRecord,

    #[error("Unsupported record type '{0}'")]
    UnsupportedRecordType(String),

    #[error("Records of type '{0}' require ancillary data")]
    MissingAncillaryData(&'static str),

    #[error("Ancillary data directory '{0}' does not exist")]
    AncillaryNotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Record has invalid physical conditions: {0}")]
    Identity(#[from] IdentityError),

    #[error("Malformed '{context}' record: {source}")]
    Malformed {
        context: String,
        source: serde_json::Error,
    },

    #[error("Store I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Index references missing record '{0}'")]
    MissingRecord(String),

    #[error("Cannot decide between records at key '{key}': {reason}")]
    UnresolvableMerge { key: String, reason: String },

    #[error("Could not allocate a unique key for '{0}' records")]
    KeyExhausted(&'static str),

    #[error("Store write lock is poisoned")]
    LockPoisoned,

    #[error("Timed out waiting for the store lock '{0}'; remove it if no other writer is running")]
    Locked(String),
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn malformed(path: &std::path::Path, source: serde_json::Error) -> Self {
        StoreError::Malformed {
            context: path.display().to_string(),
            source,
        }
    }
}
