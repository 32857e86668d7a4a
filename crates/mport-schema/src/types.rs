//! Core domain types: package names, package records, asset directives, and
//! dependency edges (§3 of the spec).

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::hash::Sha256Hash;
use crate::version::Version;

/// A normalized package name. Names are case-folded to lowercase so lookups
/// are insensitive to how the caller typed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    /// Builds a name, lowercasing it.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    /// The normalized (lowercase) name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.to_lowercase()
    }
}

/// Application vs system package (§3 `type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// An ordinary installable application.
    #[default]
    Application,
    /// A base-system package, subject to different removal rules.
    System,
}

/// Transient planner tag (§3: "action", not persisted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlannerAction {
    /// No change planned for this package.
    #[default]
    NoOp,
    /// Install a newer version in place.
    VersionUpgrade,
    /// Replace with a renamed successor package.
    OriginRename,
    /// Remove, since its origin has expired with no successor.
    Retire,
}

/// Explicit vs installed-as-dependency (§3 `automatic`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallReason {
    /// Installed by direct user request.
    Explicit,
    /// Installed to satisfy another package's dependency.
    Automatic,
}

/// A package record: identity `(name, version)` plus the attributes listed
/// in §3. `action` is deliberately excluded — it is the planner's transient
/// tag and is never persisted to the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    /// The package's normalized name.
    pub name: PackageName,
    /// The installed version.
    pub version: Version,
    /// Source-tree path this package was built from.
    pub origin: String,
    /// Install root, typically `/usr/local`.
    pub prefix: String,
    /// Declared runtime/implementation language.
    pub lang: String,
    /// Opaque build flags.
    pub options: String,
    /// Short human-readable summary.
    pub comment: String,
    /// Long-form description.
    pub desc: String,
    /// Classification tags (e.g. `"net"`, `"devel"`).
    pub categories: Vec<String>,
    /// Target OS release this bundle was built against.
    pub os_release: String,
    /// Common Platform Enumeration 2.3 string.
    pub cpe: String,
    /// Package URL, derived from the other fields.
    pub purl: String,
    /// Whether this package is protected from deletion/upgrade.
    pub locked: bool,
    /// Non-empty when the upstream origin has announced deprecation.
    pub deprecated: String,
    /// Epoch seconds; 0 = none.
    pub expiration_date: i64,
    /// Whether this package is exempt from shared-library dependents.
    pub no_provide_shlib: bool,
    /// Build flavor, when the origin supports more than one.
    pub flavor: String,
    /// Why this package is installed (explicit request vs. dependency).
    pub automatic: InstallReason,
    /// Epoch seconds this package was installed.
    pub install_date: i64,
    /// Application vs. system classification.
    pub kind: PackageKind,
    /// Sum of recorded file sizes at install time; advisory.
    pub flatsize: i64,
}

impl PackageRecord {
    /// Derives this record's Package URL from `origin`, `name`, and
    /// `version`: `pkg:port/<origin>@<version>` when an origin is recorded,
    /// else `pkg:generic/<name>@<version>`.
    pub fn derive_purl(&self) -> String {
        if self.origin.is_empty() {
            format!("pkg:generic/{}@{}", self.name, self.version)
        } else {
            format!("pkg:port/{}@{}", self.origin, self.version)
        }
    }

    /// Whether `expiration_date` names a real deadline (0 = none, per §3).
    pub fn has_expiration(&self) -> bool {
        self.expiration_date != 0
    }
}

/// One plist directive (§3 Asset entry). Order in the owning asset list is
/// semantically significant: `Cwd`/`Chmod`/`Chown`/`Chgrp` mutate the state
/// used to interpret subsequent `File*` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    /// Places a regular file.
    File,
    /// Places a file, preserving any pre-existing copy as `.sample`.
    SampleFile,
    /// Places a file and marks it executable via the shell.
    ShellFile,
    /// Places a GNU info page, registered post-install.
    InfoFile,
    /// Creates a directory, removed unconditionally on uninstall.
    Directory,
    /// Creates a directory, removed on uninstall only if it becomes empty.
    DirectoryRm,
    /// Like [`AssetKind::DirectoryRm`], but failure to remove is not an error.
    DirectoryRmTry,
    /// Sets the working directory used to resolve subsequent relative paths.
    Cwd,
    /// Sets the file mode applied to subsequent entries.
    Chmod,
    /// Sets the owning user applied to subsequent entries.
    Chown,
    /// Sets the owning group applied to subsequent entries.
    Chgrp,
    /// Runs a command during install.
    Exec,
    /// Runs a command before install begins.
    PreExec,
    /// Runs a command after install completes.
    PostExec,
    /// Runs a command during uninstall.
    UnExec,
    /// Runs a command before uninstall begins.
    PreUnExec,
    /// Runs a command after uninstall completes.
    PostUnExec,
    /// Triggers `ldconfig` over a directory.
    Ldconfig,
    /// Triggers the Linux-specific `ldconfig` cache update.
    LdconfigLinux,
    /// Triggers GSettings schema compilation.
    GlibSchemas,
    /// Triggers desktop/MIME database updates.
    DesktopFileUtils,
    /// Loads a kernel module.
    Kld,
    /// Registers a GNU info page.
    Info,
    /// Creates an empty marker file.
    Touch,
    /// Sets owner and mode together for subsequent `File` entries.
    FileOwnerMode,
    /// Sets owner and mode together for subsequent `Directory` entries.
    DirOwnerMode,
    /// Sets owner and mode together for subsequent `SampleFile` entries.
    SampleOwnerMode,
    /// A free-text annotation, ignored at install time.
    Comment,
    /// Marks a path as pre-existing and not owned by this package.
    Ignore,
    /// Records a build option, informational only.
    Option,
    /// Records the originating port, informational only.
    Origin,
    /// Records a dependency's origin, informational only.
    DepOrigin,
    /// Records the post-install message shown to the user.
    Display,
}

impl AssetKind {
    /// Entries consumed in installer phase 1 (pre-install): cwd tracking and
    /// buffered pre-exec commands.
    pub fn is_phase1(&self) -> bool {
        matches!(self, AssetKind::Cwd | AssetKind::PreExec)
    }

    /// Entries consumed in installer phase 2 (materialize): everything that
    /// places a file or directory, plus the state-mutating directives that
    /// govern how they're placed.
    pub fn is_phase2(&self) -> bool {
        matches!(
            self,
            AssetKind::Cwd
                | AssetKind::Chmod
                | AssetKind::Chown
                | AssetKind::Chgrp
                | AssetKind::Directory
                | AssetKind::DirectoryRm
                | AssetKind::DirectoryRmTry
                | AssetKind::File
                | AssetKind::SampleFile
                | AssetKind::ShellFile
                | AssetKind::InfoFile
                | AssetKind::Exec
        )
    }

    /// Entries consumed in installer phase 3 (post-install side effects).
    pub fn is_phase3(&self) -> bool {
        matches!(
            self,
            AssetKind::Cwd
                | AssetKind::PostExec
                | AssetKind::Ldconfig
                | AssetKind::LdconfigLinux
                | AssetKind::GlibSchemas
                | AssetKind::DesktopFileUtils
                | AssetKind::Kld
                | AssetKind::Info
                | AssetKind::Touch
        )
    }

    /// Whether this entry corresponds to one archive payload entry in the
    /// bundle (i.e. the bundle reader must advance in lockstep with it).
    pub fn is_materializable(&self) -> bool {
        matches!(
            self,
            AssetKind::File | AssetKind::SampleFile | AssetKind::ShellFile | AssetKind::InfoFile
        )
    }
}

/// One entry in a package's asset list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    /// The directive this entry represents.
    pub kind: AssetKind,
    /// Path, command, or argument payload (meaning depends on `kind`).
    pub data: String,
    /// Secondary payload for directives that carry two arguments (e.g.
    /// `@sample src dst`); `None` when the second argument was omitted.
    pub alt_data: Option<String>,
    /// Expected checksum, for materializable entries.
    pub checksum: Option<Sha256Hash>,
    /// Owning user to apply, when set by a preceding `Chown`/`*OwnerMode`.
    pub owner: Option<String>,
    /// Owning group to apply, when set by a preceding `Chgrp`/`*OwnerMode`.
    pub group: Option<String>,
    /// File mode to apply, when set by a preceding `Chmod`/`*OwnerMode`.
    pub mode: Option<u32>,
}

impl AssetEntry {
    /// Builds an entry with only `kind` and `data` set.
    pub fn new(kind: AssetKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
            alt_data: None,
            checksum: None,
            owner: None,
            group: None,
            mode: None,
        }
    }
}

/// `(pkg, depend_pkgname, depend_version_requirement, depend_origin)` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The dependent package.
    pub pkg: PackageName,
    /// The package depended on.
    pub depend_pkgname: PackageName,
    /// The version requirement the dependency must satisfy.
    pub depend_version_requirement: String,
    /// The dependency's recorded origin.
    pub depend_origin: String,
}

/// `(pkg, conflict_pkg, conflict_version)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEdge {
    /// The package declaring the conflict.
    pub pkg: PackageName,
    /// The package it conflicts with.
    pub conflict_pkg: PackageName,
    /// The version requirement that triggers the conflict.
    pub conflict_version_requirement: String,
}
