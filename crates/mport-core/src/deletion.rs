//! Deletion engine (§4.F).
//!
//! Precondition failures never mutate state. The asset walk runs in
//! reverse insertion order so files are removed before the directories
//! that contained them; the final multi-table row removal is one
//! transaction ([`MetadataStore::delete_package`]).

use std::fs;
use std::path::Path;

use mport_db::MetadataStore;
use mport_schema::{AssetKind, MportError, PackageName, PrecheckError, Sha256Hash};

use crate::collaborators::SystemCommand;
use crate::shell_registry;

/// Checks §4.F's preconditions: the package is not locked and nothing
/// depends on it, unless `force`.
///
/// # Errors
///
/// Returns [`PrecheckError::Locked`] or a conflict-shaped error naming the
/// first dependent package found.
pub fn precheck(store: &MetadataStore, name: &PackageName, force: bool) -> Result<(), PrecheckError> {
    if force {
        return Ok(());
    }

    let record = store
        .get(name)
        .map_err(|e| PrecheckError::DependMissing(e.to_string()))?
        .ok_or_else(|| PrecheckError::DependMissing(name.to_string()))?;

    if record.locked {
        return Err(PrecheckError::Locked(name.to_string()));
    }

    let up_depends = store
        .get_up_depends(name)
        .map_err(|e| PrecheckError::DependMissing(e.to_string()))?;
    if let Some(dependent) = up_depends.into_iter().next() {
        return Err(PrecheckError::Conflict(dependent.to_string()));
    }

    Ok(())
}

/// Deletes `name`: runs deinstall hooks, removes its files in reverse
/// insertion order, then removes its database rows inside one transaction.
///
/// # Errors
///
/// Propagates any IO or database error as [`MportError`].
pub fn delete(
    store: &mut MetadataStore,
    name: &PackageName,
    hooks_dir: &Path,
    system: &dyn SystemCommand,
) -> Result<(), MportError> {
    let prefix = store
        .get(name)
        .map_err(MportError::from)?
        .map(|r| r.prefix)
        .unwrap_or_else(|| "/usr/local".to_string());

    run_deinstall_hooks(hooks_dir, &prefix, system, "PRE-DEINSTALL");

    let assets = store.get_assets(name).map_err(MportError::from)?;
    for entry in assets.iter().rev() {
        match entry.kind {
            AssetKind::ShellFile => {
                shell_registry::unregister(&entry.data);
                remove_file_checked(&entry.data, entry.checksum.as_ref());
            }
            AssetKind::File | AssetKind::SampleFile | AssetKind::InfoFile => {
                remove_file_checked(&entry.data, entry.checksum.as_ref());
            }
            AssetKind::DirectoryRm => {
                let _ = fs::remove_dir(&entry.data);
            }
            AssetKind::DirectoryRmTry => {
                if let Err(err) = fs::remove_dir(&entry.data) {
                    if err.kind() != std::io::ErrorKind::Other && !is_not_empty(&err) {
                        tracing::warn!(path = %entry.data, %err, "dirrmtry failed");
                    }
                }
            }
            _ => {}
        }
    }

    run_deinstall_hooks(hooks_dir, &prefix, system, "POST-DEINSTALL");

    let version = store
        .get(name)
        .ok()
        .flatten()
        .map(|r| r.version)
        .unwrap_or_else(|| mport_schema::Version::parse("0"));

    store.delete_package(name).map_err(MportError::from)?;
    store.log_event(name, &version, "deleted").map_err(MportError::from)?;
    Ok(())
}

fn remove_file_checked(path: &str, expected: Option<&Sha256Hash>) {
    if let Some(expected) = expected {
        if let Ok(bytes) = fs::read(path) {
            let actual = Sha256Hash::compute(&bytes);
            if &actual != expected {
                tracing::warn!(%path, "checksum mismatch at delete time; removing anyway");
            }
        }
    }
    let _ = fs::remove_file(path);
}

fn is_not_empty(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOTEMPTY)
}

fn run_deinstall_hooks(hooks_dir: &Path, prefix: &str, system: &dyn SystemCommand, stage: &str) {
    let script = hooks_dir.join("pkg-deinstall");
    if !script.exists() {
        return;
    }
    let env = vec![("PKG_PREFIX".to_string(), prefix.to_string())];
    let _ = system.run(
        &[script.to_string_lossy().into_owned(), stage.to_string()],
        &env,
        Path::new(prefix),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use mport_schema::{InstallReason, PackageKind, PackageRecord, Version};

    fn sample_record(name: &str, locked: bool) -> PackageRecord {
        PackageRecord {
            name: PackageName::new(name),
            version: Version::parse("1.0.0"),
            origin: String::new(),
            prefix: "/usr/local".into(),
            lang: String::new(),
            options: String::new(),
            comment: String::new(),
            desc: String::new(),
            categories: vec![],
            os_release: String::new(),
            cpe: String::new(),
            purl: String::new(),
            locked,
            deprecated: String::new(),
            expiration_date: 0,
            no_provide_shlib: false,
            flavor: String::new(),
            automatic: InstallReason::Explicit,
            install_date: 0,
            kind: PackageKind::Application,
            flatsize: 0,
        }
    }

    #[test]
    fn precheck_rejects_locked() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample_record("jq", true)).unwrap();
            txn.commit().unwrap();
        }
        let err = precheck(&store, &PackageName::new("jq"), false).unwrap_err();
        assert!(matches!(err, PrecheckError::Locked(_)));
    }

    #[test]
    fn precheck_force_bypasses_lock() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample_record("jq", true)).unwrap();
            txn.commit().unwrap();
        }
        assert!(precheck(&store, &PackageName::new("jq"), true).is_ok());
    }
}
