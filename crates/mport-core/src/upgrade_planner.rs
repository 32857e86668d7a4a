//! Upgrade planner (§4.H): three passes over the installed set, producing
//! an ordered action sequence a caller executes against the installer and
//! deletion engine.
//!
//! Grounded on the dependency-layering shape of the original resolver (the
//! visited/visiting cycle guard and the depth-first "upgrade dependencies
//! before dependents" recursion), but matching predicates against the
//! package-manager's own `Version`/`Requirement` algebra rather than semver.

use std::collections::{HashMap, HashSet};

use mport_db::MetadataStore;
use mport_schema::{CheckOutcome, InstallReason, MportError, PackageName};

use crate::collaborators::ConfirmSink;
use crate::index_client::IndexClient;

/// One step of an upgrade plan, in the order it must execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    /// The named package's origin expired; delete it.
    DeleteExpired(PackageName),
    /// `from` was renamed to `to` in the index; delete `from`, install `to`.
    Rename { from: PackageName, to: PackageName },
    /// Upgrade `name` to the index's current version.
    Upgrade(PackageName),
    /// An automatic package with no remaining explicit ancestor; delete it.
    Autoremove(PackageName),
}

/// A data error: the dependency graph over the installed set contains a
/// cycle, which §4.H's ordering guarantee does not support.
#[derive(Debug, thiserror::Error)]
#[error("dependency cycle detected at {0}")]
pub struct CycleError(pub PackageName);

struct Caches {
    index_check: HashMap<PackageName, CheckOutcome>,
    moved_lookup: HashMap<String, Option<mport_schema::MovedEntry>>,
}

/// Builds the full upgrade plan for every installed package.
///
/// # Errors
///
/// Returns a database or index-client error, or [`CycleError`] (converted
/// to [`MportError::Fatal`]) if the down-depends graph is cyclic.
pub fn plan(store: &MetadataStore, index: &IndexClient, confirm: &dyn ConfirmSink) -> Result<Vec<PlanAction>, MportError> {
    let mut actions = Vec::new();
    let mut processed: HashSet<PackageName> = HashSet::new();
    let mut caches = Caches {
        index_check: HashMap::new(),
        moved_lookup: HashMap::new(),
    };

    let installed = store.list_all().map_err(MportError::from)?;

    moved_expired_pass(&installed, index, confirm, &mut processed, &mut actions, &mut caches)?;
    rename_reconciliation_pass(&installed, index, confirm, &mut processed, &mut actions, &mut caches)?;

    let mut visiting = HashSet::new();
    let mut visited = HashSet::new();
    for record in &installed {
        if processed.contains(&record.name) {
            continue;
        }
        update_down(
            &record.name,
            store,
            index,
            &mut processed,
            &mut actions,
            &mut caches,
            &mut visiting,
            &mut visited,
        )?;
    }

    actions.extend(autoremove(store)?.into_iter().map(PlanAction::Autoremove));

    Ok(actions)
}

fn moved_expired_pass(
    installed: &[mport_schema::PackageRecord],
    index: &IndexClient,
    confirm: &dyn ConfirmSink,
    processed: &mut HashSet<PackageName>,
    actions: &mut Vec<PlanAction>,
    caches: &mut Caches,
) -> Result<(), MportError> {
    for record in installed {
        let moved = moved_lookup_cached(index, &record.origin, caches)?;
        let Some(moved) = moved else { continue };

        if moved.is_expiration() {
            let prompt = format!("{} is expired ({}); remove it?", record.name, moved.why);
            if confirm.ask(&prompt, "remove", "keep", false) {
                actions.push(PlanAction::DeleteExpired(record.name.clone()));
            }
            processed.insert(record.name.clone());
        } else if moved.is_rename() {
            let to = PackageName::new(&moved.moved_to_pkgname);
            actions.push(PlanAction::Rename {
                from: record.name.clone(),
                to: to.clone(),
            });
            processed.insert(record.name.clone());
            processed.insert(to);
        }
    }
    Ok(())
}

fn rename_reconciliation_pass(
    installed: &[mport_schema::PackageRecord],
    index: &IndexClient,
    confirm: &dyn ConfirmSink,
    processed: &mut HashSet<PackageName>,
    actions: &mut Vec<PlanAction>,
    caches: &mut Caches,
) -> Result<(), MportError> {
    for record in installed {
        if processed.contains(&record.name) {
            continue;
        }
        let outcome = index_check_cached(index, &record.name, &record.version, &record.origin, caches)?;
        if outcome != CheckOutcome::OriginMatch {
            continue;
        }
        let prompt = format!("{} appears to have been renamed upstream; reconcile?", record.name);
        if confirm.ask(&prompt, "reconcile", "skip", true) {
            if let Some(new_entry) = find_origin_match(index, &record.origin, &record.name)? {
                actions.push(PlanAction::Rename {
                    from: record.name.clone(),
                    to: new_entry.clone(),
                });
                processed.insert(new_entry);
            }
        }
        processed.insert(record.name.clone());
    }
    Ok(())
}

fn find_origin_match(index: &IndexClient, origin: &str, exclude: &PackageName) -> Result<Option<PackageName>, MportError> {
    let candidates = index.search_term("")?;
    Ok(candidates
        .into_iter()
        .find(|e| e.origin == origin && e.pkgname != *exclude)
        .map(|e| e.pkgname))
}

#[allow(clippy::too_many_arguments)]
fn update_down(
    name: &PackageName,
    store: &MetadataStore,
    index: &IndexClient,
    processed: &mut HashSet<PackageName>,
    actions: &mut Vec<PlanAction>,
    caches: &mut Caches,
    visiting: &mut HashSet<PackageName>,
    visited: &mut HashSet<PackageName>,
) -> Result<(), MportError> {
    if visited.contains(name) || processed.contains(name) {
        return Ok(());
    }
    if !visiting.insert(name.clone()) {
        return Err(MportError::Fatal(CycleError(name.clone()).to_string()));
    }

    let down_depends = store.get_down_depends(name).map_err(MportError::from)?;
    for dep in &down_depends {
        update_down(dep, store, index, processed, actions, caches, visiting, visited)?;
    }

    if let Some(record) = store.get(name).map_err(MportError::from)? {
        let outcome = index_check_cached(index, name, &record.version, &record.origin, caches)?;
        if outcome == CheckOutcome::UpdateAvailable {
            actions.push(PlanAction::Upgrade(name.clone()));
        }
    }

    visiting.remove(name);
    visited.insert(name.clone());
    Ok(())
}

fn index_check_cached(
    index: &IndexClient,
    name: &PackageName,
    version: &mport_schema::Version,
    origin: &str,
    caches: &mut Caches,
) -> Result<CheckOutcome, MportError> {
    if let Some(cached) = caches.index_check.get(name) {
        return Ok(*cached);
    }
    let outcome = index.check(name, version, origin)?;
    caches.index_check.insert(name.clone(), outcome);
    Ok(outcome)
}

fn moved_lookup_cached(
    index: &IndexClient,
    origin: &str,
    caches: &mut Caches,
) -> Result<Option<mport_schema::MovedEntry>, MportError> {
    if let Some(cached) = caches.moved_lookup.get(origin) {
        return Ok(cached.clone());
    }
    let entry = index.moved_lookup(origin)?;
    caches.moved_lookup.insert(origin.to_string(), entry.clone());
    Ok(entry)
}

/// Packages installed as [`InstallReason::Automatic`] with no up-depends
/// edge reaching an explicit transitive ancestor.
///
/// # Errors
///
/// Returns a database error.
pub fn autoremove(store: &MetadataStore) -> Result<Vec<PackageName>, MportError> {
    let installed = store.list_all().map_err(MportError::from)?;
    let mut candidates = Vec::new();

    for record in &installed {
        if record.automatic != InstallReason::Automatic {
            continue;
        }
        if !has_explicit_ancestor(&record.name, store, &mut HashSet::new())? {
            candidates.push(record.name.clone());
        }
    }
    Ok(candidates)
}

fn has_explicit_ancestor(
    name: &PackageName,
    store: &MetadataStore,
    seen: &mut HashSet<PackageName>,
) -> Result<bool, MportError> {
    if !seen.insert(name.clone()) {
        return Ok(false);
    }
    for up in store.get_up_depends(name).map_err(MportError::from)? {
        let Some(record) = store.get(&up).map_err(MportError::from)? else {
            continue;
        };
        if record.automatic == InstallReason::Explicit {
            return Ok(true);
        }
        if has_explicit_ancestor(&up, store, seen)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mport_schema::{PackageKind, PackageRecord, Version};

    fn sample(name: &str, automatic: InstallReason) -> PackageRecord {
        PackageRecord {
            name: PackageName::new(name),
            version: Version::parse("1.0"),
            origin: format!("category/{name}"),
            prefix: "/usr/local".into(),
            lang: String::new(),
            options: String::new(),
            comment: String::new(),
            desc: String::new(),
            categories: vec![],
            os_release: String::new(),
            cpe: String::new(),
            purl: String::new(),
            locked: false,
            deprecated: String::new(),
            expiration_date: 0,
            no_provide_shlib: false,
            flavor: String::new(),
            automatic,
            install_date: 0,
            kind: PackageKind::Application,
            flatsize: 0,
        }
    }

    #[test]
    fn autoremove_finds_orphaned_automatic_package() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample("libfoo", InstallReason::Automatic)).unwrap();
            txn.commit().unwrap();
        }
        let orphans = autoremove(&store).unwrap();
        assert_eq!(orphans, vec![PackageName::new("libfoo")]);
    }

    #[test]
    fn autoremove_keeps_package_with_explicit_ancestor() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample("libfoo", InstallReason::Automatic)).unwrap();
            txn.insert_package_row(&sample("app", InstallReason::Explicit)).unwrap();
            txn.commit().unwrap();
        }
        store
            .record_dependency(&PackageName::new("app"), &PackageName::new("libfoo"), "", "")
            .unwrap();
        let orphans = autoremove(&store).unwrap();
        assert!(orphans.is_empty());
    }
}
