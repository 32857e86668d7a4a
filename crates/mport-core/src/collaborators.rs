//! External-collaborator trait seams (§4.J).
//!
//! The core never reads environment variables, spawns subprocesses, or
//! performs HTTP directly outside these seams; callers (the CLI, or tests)
//! supply implementations. Default implementations are provided so a
//! minimal caller can get real behavior for free.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// A single line of human-facing output.
pub trait MsgSink: Send + Sync {
    /// Emits one line of output.
    fn emit(&self, line: &str);
}

/// Progress reporting for long-running operations (downloads, extraction).
pub trait ProgressSink: Send + Sync {
    /// Starts a new progress phase titled `title`.
    fn init(&self, title: &str);
    /// Reports `current` out of `total` (when known) for `label`.
    fn step(&self, current: u64, total: Option<u64>, label: &str);
    /// Ends the current phase.
    fn finish(&self);
}

/// Interactive yes/no confirmation.
pub trait ConfirmSink: Send + Sync {
    /// Asks `message`, returning the user's choice (or `default_yes` when
    /// non-interactive).
    fn ask(&self, message: &str, yes_label: &str, no_label: &str, default_yes: bool) -> bool;
}

/// The result of running an external command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Subprocess spawning, used for hook scripts and side-effect commands
/// (`ldconfig`, `desktop-file-utils`, service starts).
pub trait SystemCommand: Send + Sync {
    /// Runs `argv[0]` with the remaining entries as arguments, `env`
    /// appended to the child's environment, and `cwd` as its working
    /// directory.
    fn run(&self, argv: &[String], env: &[(String, String)], cwd: &Path) -> std::io::Result<CommandOutcome>;
}

/// HTTP fetch, used by the index client and the auditor.
pub trait HttpFetcher: Send + Sync {
    /// Fetches `url`'s body.
    ///
    /// # Errors
    ///
    /// Returns an error string on network failure, non-2xx status, or if
    /// the fetch exceeds its deadline.
    fn get(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// Wall-clock access, abstracted so tests can control it.
pub trait Clock: Send + Sync {
    /// The current UTC time.
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}

/// A [`MsgSink`] that writes to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutMsgSink;

impl MsgSink for StdoutMsgSink {
    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

/// A [`ProgressSink`] that discards everything (non-interactive contexts,
/// tests, dry runs).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn init(&self, _title: &str) {}
    fn step(&self, _current: u64, _total: Option<u64>, _label: &str) {}
    fn finish(&self) {}
}

/// A [`ConfirmSink`] that always answers `default_yes` (non-interactive /
/// `--yes` contexts).
#[derive(Debug, Clone, Copy)]
pub struct AlwaysConfirmSink;

impl ConfirmSink for AlwaysConfirmSink {
    fn ask(&self, _message: &str, _yes_label: &str, _no_label: &str, default_yes: bool) -> bool {
        default_yes
    }
}

/// A [`SystemCommand`] that shells out via [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RealSystemCommand;

impl SystemCommand for RealSystemCommand {
    fn run(&self, argv: &[String], env: &[(String, String)], cwd: &Path) -> std::io::Result<CommandOutcome> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(CommandOutcome {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            });
        };

        let output = Command::new(program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(cwd)
            .output()?;

        Ok(CommandOutcome {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A [`HttpFetcher`] backed by a blocking `reqwest` client with the
/// configured deadline (§5: HTTP fetches default to a 120-second deadline).
pub struct RealHttpFetcher {
    client: reqwest::blocking::Client,
}

impl RealHttpFetcher {
    /// # Panics
    ///
    /// Panics if the underlying TLS backend cannot be initialized.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mport/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for RealHttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl HttpFetcher for RealHttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| if e.is_timeout() { "fetch timed out".to_string() } else { e.to_string() })?;

        if !response.status().is_success() {
            return Err(format!("unexpected status {}", response.status()));
        }

        response.bytes().map(|b| b.to_vec()).map_err(|e| e.to_string())
    }
}

/// A [`Clock`] backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
