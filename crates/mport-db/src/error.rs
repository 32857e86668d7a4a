//! Error kinds for the metadata store.

use thiserror::Error;

use mport_schema::MportError;

/// Leaf error type for `mport-db`; converts into [`MportError`] at crate
/// boundaries.
#[derive(Debug, Error)]
pub enum DbError {
    /// The underlying SQLite call failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No row exists for the named package.
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// An operation needed the stub database but none is attached.
    #[error("no stub database attached")]
    NoStubAttached,

    /// The store's on-disk state failed a consistency check.
    #[error("database corruption detected: {0}")]
    Corruption(String),
}

impl From<DbError> for MportError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::PackageNotFound(name) => MportError::Warn(format!("package not found: {name}")),
            DbError::Corruption(detail) => MportError::DbCorruption(detail),
            other => MportError::Fatal(other.to_string()),
        }
    }
}
