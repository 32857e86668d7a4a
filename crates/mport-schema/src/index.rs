//! Wire format served by the remote index mirror (§3 Index entry, §4.G).

use serde::{Deserialize, Serialize};

use crate::hash::Sha256Hash;
use crate::types::PackageName;
use crate::version::Version;

/// `(pkgname, version, comment, bundlefile, license, sha256-hash, type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// The package name as served by the index.
    pub pkgname: PackageName,
    /// The version this bundle installs.
    pub version: Version,
    /// A short human-readable summary.
    pub comment: String,
    /// The bundle file name, relative to the mirror root.
    pub bundlefile: String,
    /// The license identifier declared by the port.
    pub license: String,
    /// The bundle's expected SHA-256 checksum.
    pub sha256: Sha256Hash,
    /// `"application"` or `"system"`.
    pub type_: String,
    /// Origin (source-tree coordinate), used by the rename-reconciliation pass.
    pub origin: String,
}

/// A `moved` table row. Exactly one of `date`/`moved_to_pkgname` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovedEntry {
    /// The source-tree origin this row applies to.
    pub port: String,
    /// The new origin, when renamed.
    pub moved_to: String,
    /// The new package name, when renamed.
    pub moved_to_pkgname: String,
    /// The reason recorded for the move or expiration.
    pub why: String,
    /// The expiration date, when this is a retirement rather than a rename.
    pub date: String,
}

impl MovedEntry {
    /// The port expired on this calendar date rather than being renamed.
    pub fn is_expiration(&self) -> bool {
        !self.date.is_empty()
    }

    /// The port was renamed; installs of the old name redirect to the new one.
    pub fn is_rename(&self) -> bool {
        !self.moved_to_pkgname.is_empty()
    }
}

/// A `mirrors` table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorEntry {
    /// The two-letter (or region) country code.
    pub country: String,
    /// The mirror's base URL.
    pub url: String,
}

/// Result of `IndexClient::check` (§4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Installed version >= index version for the same name.
    NoUpdate,
    /// Installed name present in index with a strictly greater version.
    UpdateAvailable,
    /// Installed name absent from the index, but a different pkgname shares
    /// its origin — implies a rename.
    OriginMatch,
}
