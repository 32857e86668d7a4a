//! SQLite-backed package metadata store (§4.B of the spec).
//!
//! The live store and every bundle's stub database share one schema
//! ([`schema::SCHEMA_SQL`]). [`store::MetadataStore`] is the single entry
//! point: it is called directly and synchronously by `mport-core`, with no
//! background thread or actor in front of it.

/// Leaf error type, convertible into [`mport_schema::MportError`].
pub mod error;
/// Shared SQL schema for the live store and stub databases.
pub mod schema;
/// The metadata store and its install/delete transaction types.
pub mod store;

pub use error::DbError;
pub use store::{InstallTxn, MetadataStore};
