//! Error kinds for asset-list parsing and bundle reading.

use thiserror::Error;

use mport_schema::MportError;

/// Errors from reading a bundle archive or parsing its asset list.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The underlying IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive did not start with a recognized zstd or xz magic.
    #[error("unsupported bundle format: missing zstd/xz magic bytes")]
    UnsupportedFormat,

    /// An archive entry's path escaped the extraction root.
    #[error("unsafe path in archive: {0}")]
    UnsafePath(String),

    /// The archive's payload entries didn't line up with the asset list.
    #[error("archive entries out of sync with the asset list")]
    OutOfSync,

    /// An asset-list line didn't match any known directive grammar.
    #[error("malformed asset list directive: {0}")]
    MalformedDirective(String),

    /// The metadata store reported an error.
    #[error("metadata store error: {0}")]
    Db(#[from] mport_db::DbError),

    /// The attached stub database reported an error.
    #[error("stub database error: {0}")]
    Stub(#[from] rusqlite::Error),
}

impl From<BundleError> for MportError {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::OutOfSync => MportError::BundleOutOfSync,
            BundleError::Db(db_err) => db_err.into(),
            other => MportError::Fatal(other.to_string()),
        }
    }
}
