//! One module per command family, grouped by the subsystem they drive.

/// `install`, `add`, `download`: acquiring and materializing bundles.
pub mod acquire;
/// `lock`, `unlock`, `locks`, `cpe`, `purl`, `config`, `import`, `export`, `version`.
pub mod admin;
/// `update`, `upgrade`, `autoremove`, `clean`, `verify`, `audit`.
pub mod maintenance;
/// `index`, `mirror list`, `mirror select`.
pub mod mirror;
/// `search`, `info`, `list`, `which`, `stats`.
pub mod query;
/// `delete`, `deleteall`.
pub mod remove;
