//! `mport` — package-manager CLI frontend.
//!
//! This crate is the only place in the workspace that reads environment
//! variables, prints directly to stdout, or owns a [`clap::Parser`]; the
//! engine itself (`mport-core`) takes every external dependency through a
//! trait seam (§4.J).

/// Subcommand implementations, one module per command family.
pub mod cmd;
/// Shared state threaded through every subcommand.
pub mod context;
/// `/etc/mport.conf` settings.
pub mod settings;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// `mport` — install, remove, and track packages.
#[derive(Debug, Parser)]
#[command(name = "mport", author, version, about = "mport package manager", disable_version_flag = true)]
pub struct Cli {
    /// Print the binary's version and exit.
    #[arg(short = 'v', long = "version", action = ArgAction::Version, global = true)]
    pub print_version: (),

    /// Chroot into `<dir>` before performing any operation.
    #[arg(short = 'c', long = "chroot", global = true)]
    pub chroot: Option<PathBuf>,

    /// Directory bundles are downloaded into.
    #[arg(short = 'o', long = "download-dir", global = true)]
    pub download_dir: Option<PathBuf>,

    /// Brief output.
    #[arg(short = 'b', global = true)]
    pub brief: bool,

    /// Quiet output.
    #[arg(short = 'q', global = true)]
    pub quiet: bool,

    /// Verbose output.
    #[arg(short = 'V', global = true)]
    pub verbose: bool,

    /// Force the operation past preconditions that would otherwise block it.
    #[arg(short = 'f', global = true)]
    pub force: bool,

    /// Skip the implicit index refresh.
    #[arg(short = 'U', global = true)]
    pub skip_refresh: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// The full subcommand surface (§6).
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install one or more packages from the configured mirror.
    Install {
        /// Mark as automatically installed (a dependency, not explicit).
        #[arg(short = 'A')]
        automatic: bool,
        /// Package names, optionally `name@version`.
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Install one or more already-downloaded bundle files.
    Add {
        /// Mark as automatically installed.
        #[arg(short = 'A')]
        automatic: bool,
        /// Bundle file paths.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove one or more installed packages.
    Delete {
        /// Package names.
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Remove every installed package.
    Deleteall,
    /// Refresh a package's bundle and reinstall in place.
    Update {
        /// Package names.
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Run the full upgrade planner and apply its plan.
    Upgrade,
    /// Remove automatically-installed packages no longer depended on.
    Autoremove,
    /// Remove cached downloads and stale index snapshots.
    Clean,
    /// Recompute checksums and report drift against the recorded values.
    Verify {
        /// Rewrite stored checksums to match what is found on disk.
        #[arg(short = 'r')]
        recompute: bool,
        /// Packages to verify (every installed package if empty).
        packages: Vec<String>,
    },
    /// Search the cached index by substring.
    Search {
        /// Search terms.
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// Show installed and/or indexed metadata for a package.
    Info {
        /// Package name.
        package: String,
    },
    /// List installed packages.
    List {
        /// `updates` lists packages with an index update available;
        /// `prime` lists only explicitly-installed packages.
        filter: Option<String>,
    },
    /// Report which installed package owns a filesystem path.
    Which {
        /// Print only the package name.
        #[arg(short = 'q')]
        quiet: bool,
        /// Print only the package's origin.
        #[arg(short = 'o')]
        origin_only: bool,
        /// The filesystem path to look up.
        path: PathBuf,
    },
    /// Print aggregate counts over the installed set.
    Stats,
    /// Refresh the local index cache from the configured mirror.
    Index,
    /// Mirror selection.
    Mirror {
        #[command(subcommand)]
        command: MirrorCommands,
    },
    /// Download bundles without installing them.
    Download {
        /// Also fetch transitive dependencies.
        #[arg(short = 'd')]
        with_depends: bool,
        /// Package names.
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Read or change `/etc/mport.conf` settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Fetch CVE advisories for installed packages with a recorded CPE.
    Audit {
        /// Also list reverse-dependency chains reaching a vulnerable package.
        #[arg(short = 'r')]
        depends_on: bool,
        /// Restrict to one package.
        package: Option<String>,
    },
    /// Prevent a package from being upgraded or removed without `-f`.
    Lock {
        /// Package name.
        package: String,
    },
    /// Clear a package's lock flag.
    Unlock {
        /// Package name.
        package: String,
    },
    /// List every locked package.
    Locks,
    /// Print a package's recorded CPE (every package if omitted).
    Cpe {
        /// Package name.
        package: Option<String>,
    },
    /// Print a package's recorded package URL (every package if omitted).
    Purl {
        /// Package name.
        package: Option<String>,
    },
    /// Restore the installed-package set from a JSON export.
    Import {
        /// Path to a file produced by `mport export`.
        file: PathBuf,
    },
    /// Dump the installed-package set to JSON.
    Export {
        /// Destination path.
        file: PathBuf,
    },
    /// Compare two version strings using the total order of §4.A.
    Version {
        /// Print `<`, `=`, or `>` instead of a sentence.
        #[arg(short = 't')]
        terse: bool,
        /// The first version string.
        v1: String,
        /// The second version string.
        v2: String,
    },
    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

/// `mport mirror` subcommands.
#[derive(Debug, Subcommand)]
pub enum MirrorCommands {
    /// List the configured mirrors.
    List,
    /// Select the mirror for `country`, persisting it to settings.
    Select {
        /// Country code as listed by `mirror list`.
        country: String,
    },
}

/// `mport config` subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print every recognized setting.
    List,
    /// Print one setting's value.
    Get {
        /// Setting key.
        key: String,
    },
    /// Set a setting's value (persisted to `/etc/mport.conf`).
    Set {
        /// Setting key.
        key: String,
        /// New value.
        value: String,
    },
}
