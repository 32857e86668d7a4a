//! Shared state threaded through every subcommand.

use std::path::PathBuf;

use mport_core::{AlwaysConfirmSink, FileLock, RealHttpFetcher, RealSystemCommand, StdoutMsgSink, SystemClock};
use mport_db::MetadataStore;

use crate::settings::Settings;

/// Groups the store, settings, and collaborator defaults every command
/// operates against; constructed once in `main` from the parsed global flags.
pub struct Context {
    /// The live metadata store, opened at `settings.db_path()` (or a
    /// `-c`-relocated root).
    pub store: MetadataStore,
    /// Parsed `/etc/mport.conf`.
    pub settings: Settings,
    /// `-f`: bypass precondition checks that would otherwise block the op.
    pub force: bool,
    /// `-U`: skip the implicit index refresh before commands that need it.
    pub skip_refresh: bool,
    /// `-q`/`-b`/`-V` verbosity level.
    pub verbosity: Verbosity,
    /// `-o`: overrides `settings.downloads_dir()` when set.
    pub download_dir: Option<PathBuf>,
}

/// Output verbosity selected by `-q`/`-b`/`-V`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// `-q`: suppress all non-error output.
    Quiet,
    /// Default: one line per completed action.
    #[default]
    Brief,
    /// `-V`: include per-step progress detail.
    Verbose,
}

impl Context {
    /// Opens the store at `root` (the `-c` chroot, or `settings.db_root`)
    /// and takes the advisory lock for the duration of the returned guard.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(
        root: Option<&PathBuf>,
        settings: Settings,
        force: bool,
        skip_refresh: bool,
        verbosity: Verbosity,
        download_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let db_path = root.map_or_else(|| settings.db_path(), |r| r.join("master.db"));
        let store = MetadataStore::open_at(&db_path)?;
        Ok(Self {
            store,
            settings,
            force,
            skip_refresh,
            verbosity,
            download_dir,
        })
    }

    /// The directory bundles are downloaded into: the `-o` override when
    /// present, else `settings.downloads_dir()`.
    pub fn downloads_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| self.settings.downloads_dir())
    }

    /// Acquires the advisory lock for a mutating operation.
    ///
    /// # Errors
    ///
    /// Returns [`mport_core::LockError`] if another process holds it.
    pub fn acquire_lock(&self) -> Result<FileLock, mport_core::LockError> {
        FileLock::acquire(&self.settings.db_path())
    }

    /// A default [`mport_core::HttpFetcher`] honoring the configured timeout.
    pub fn http_fetcher(&self) -> RealHttpFetcher {
        RealHttpFetcher::new(std::time::Duration::from_secs(self.settings.fetch_timeout))
    }

    /// A default [`mport_core::installer::InstallContext`]'s collaborators:
    /// message sink, confirm sink, and system-command runner.
    pub fn msg_sink(&self) -> StdoutMsgSink {
        StdoutMsgSink
    }

    /// Confirmation sink honoring `assume_always_yes`.
    pub fn confirm_sink(&self) -> AlwaysConfirmSink {
        AlwaysConfirmSink
    }

    /// Subprocess runner for hook scripts and side-effect commands.
    pub fn system_command(&self) -> RealSystemCommand {
        RealSystemCommand
    }

    /// Wall-clock source.
    pub fn clock(&self) -> SystemClock {
        SystemClock
    }
}
