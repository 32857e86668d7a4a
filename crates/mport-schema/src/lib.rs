//! Shared types, version algebra, and error taxonomy for the `mport` package
//! manager core.
//!
//! This crate has no I/O of its own: it defines the wire/database shapes
//! (`types`, `index`), the version algebra and requirement predicates
//! (`version`), typed checksum wrappers (`hash`), architecture detection
//! (`arch`), and the closed error taxonomy (`error`) that every other
//! `mport` crate converts its leaf errors into.

/// CPU architecture detection.
pub mod arch;
/// Closed error-kind taxonomy (§7 of the spec).
pub mod error;
/// Typed wrapper for SHA-256 checksums.
pub mod hash;
/// Remote index wire format (index entries, moved entries, mirrors).
pub mod index;
/// Core domain types: package names, records, asset directives, edges.
pub mod types;
/// Version parsing, comparison, and requirement matching.
pub mod version;

pub use arch::Arch;
pub use error::{MportError, PrecheckError};
pub use hash::Sha256Hash;
pub use index::{CheckOutcome, IndexEntry, MirrorEntry, MovedEntry};
pub use types::*;
pub use version::{ErrMalformedRequirement, Requirement, RequirementOutcome, Version};
