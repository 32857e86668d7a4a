//! Closed error taxonomy shared across all `mport` crates (§7 of the spec).
//!
//! Every public entry point returns one of these kinds (wrapped in a
//! leaf-crate-specific error that converts into it), never a process-wide
//! last-error string. `Warn` maps to exit code 1; everything else maps to
//! an exit code >= 2 at the CLI boundary.

use thiserror::Error;

/// Precheck failures never mutate state (§4.E).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrecheckError {
    /// Installing/upgrading would conflict with an already-installed package.
    #[error("conflicts with installed package {0}")]
    Conflict(String),

    /// A required dependency is missing or does not satisfy its version
    /// requirement.
    #[error("required dependency not satisfied: {0}")]
    DependMissing(String),

    /// The incoming version is not strictly newer than what is installed.
    #[error("{name} {installed} is not older than the incoming version {incoming}")]
    NotUpgradeable {
        /// The package name.
        name: String,
        /// The currently installed version.
        installed: String,
        /// The version that was offered in its place.
        incoming: String,
    },

    /// The package is locked and the caller did not force the operation.
    #[error("package {0} is locked")]
    Locked(String),
}

/// The closed set of error kinds from §7.
#[derive(Debug, Error)]
pub enum MportError {
    /// A non-fatal warning; maps to exit code 1.
    #[error("{0}")]
    Warn(String),

    /// An unrecoverable error; maps to exit code 2.
    #[error("{0}")]
    Fatal(String),

    /// An HTTP fetch exceeded its deadline.
    #[error("fetch timed out")]
    FetchTimeout,

    /// The bundle's archive entries didn't line up with its asset list.
    #[error("bundle archive entries out of sync with its asset list")]
    BundleOutOfSync,

    /// An install/delete precondition failed.
    #[error("precheck failed: {0}")]
    Precheck(#[from] PrecheckError),

    /// A version requirement string could not be parsed.
    #[error("malformed version requirement: {0}")]
    MalformedRequirement(String),

    /// An operation needed the cached index but none has been fetched yet.
    #[error("index not loaded; run an index refresh first")]
    IndexNotLoaded,

    /// The metadata store's on-disk state is inconsistent.
    #[error("database corruption detected: {0}")]
    DbCorruption(String),

    /// A hook script or side-effect command exited non-zero.
    #[error("hook exited non-zero: {0}")]
    HookNonZero(String),

    /// A recomputed checksum did not match the recorded one.
    #[error("checksum mismatch for {path}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        /// The path whose checksum mismatched.
        path: String,
        /// The checksum recorded at install time.
        expected: String,
        /// The checksum just recomputed.
        actual: String,
    },
}

impl MportError {
    /// The process exit code this error kind maps to (§7).
    pub fn exit_code(&self) -> i32 {
        match self {
            MportError::Warn(_) => 1,
            _ => 2,
        }
    }
}
