//! Asset-list parsing and compressed bundle reading (§4.C, §4.D).

/// Plist asset-list parser.
pub mod asset_list;
/// Leaf error type, convertible into [`mport_schema::MportError`].
pub mod error;
/// Bundle reader: zstd/xz detection, metadata/payload split, lockstep
/// payload extraction.
pub mod reader;

pub use asset_list::AssetListParser;
pub use error::BundleError;
pub use reader::{BundleEntryHeader, BundleReader};
