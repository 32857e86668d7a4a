//! Core engine for the mport package manager.
//!
//! This crate holds the install/delete/upgrade/verify logic described in
//! §4.E–§4.I: it owns no UI, reads no environment variables, and never
//! prints directly to stdout/stderr except through the collaborator seams
//! in [`collaborators`]. Higher-level frontends (the CLI) drive it.

/// External-collaborator trait seams (§4.J): message/progress/confirm
/// sinks, subprocess spawning, HTTP, and the clock.
pub mod collaborators;
/// Deletion engine: preconditions and reverse-order asset removal (§4.F).
pub mod deletion;
/// Remote index client and rename/moved-package lookups (§4.G).
pub mod index_client;
/// Three-phase transactional installer (§4.E).
pub mod installer;
/// Advisory filesystem lock over the metadata store (§5).
pub mod lock;
/// `/etc/shells` registration for `@shell` asset entries (§4.C/§4.E/§4.F).
mod shell_registry;
/// Upgrade planner: three-pass algorithm over the installed set (§4.H).
pub mod upgrade_planner;
/// Verifier and CVE auditor (§4.I).
pub mod verifier;

pub use collaborators::{
    AlwaysConfirmSink, Clock, CommandOutcome, ConfirmSink, HttpFetcher, MsgSink, NullProgressSink,
    ProgressSink, RealHttpFetcher, RealSystemCommand, StdoutMsgSink, SystemClock, SystemCommand,
};
pub use deletion::delete;
pub use index_client::IndexClient;
pub use installer::{install, InstallContext};
pub use lock::{FileLock, LockError};
pub use upgrade_planner::{plan, PlanAction};
pub use verifier::{audit, recompute_checksums, verify, AuditFinding, Mismatch};

/// User agent string sent with every HTTP request this crate makes.
pub const USER_AGENT: &str = concat!("mport-core/", env!("CARGO_PKG_VERSION"));
