//! Three-phase transactional installer (§4.E).
//!
//! Pre-conditions are checked before phase 1 and never mutate state on
//! failure. Phase 2 is one SQL transaction; phases 1 and 3 run hook
//! subprocesses outside it and are never rolled back, matching §5's
//! ordering guarantees.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use mport_bundle::{AssetListParser, BundleReader};
use mport_db::MetadataStore;
use mport_schema::{
    AssetEntry, AssetKind, MportError, PackageName, PackageRecord, PrecheckError, Requirement, RequirementOutcome,
};

use crate::collaborators::{MsgSink, ProgressSink, SystemCommand};
use crate::shell_registry;

const PLIST_NAME: &str = "plist";
const PRE_INSTALL_SH: &str = "pkg-install";
const PRE_INSTALL_LUA: &str = "pre-install.lua";
const POST_INSTALL_LUA: &str = "post-install.lua";
const MESSAGE_FILE: &str = "message";

/// Checks §4.E's pre-conditions without mutating anything.
///
/// # Errors
///
/// Returns the first violated precondition: a conflict, a missing
/// dependency, or (unless `force`) a same-or-newer already-installed
/// version.
pub fn precheck(
    store: &MetadataStore,
    incoming: &PackageRecord,
    conflicts: &[(PackageName, String)],
    depends: &[(PackageName, String)],
    force: bool,
) -> Result<(), PrecheckError> {
    for (conflict_name, _requirement) in conflicts {
        if store
            .get(conflict_name)
            .map_err(|e| PrecheckError::Conflict(e.to_string()))?
            .is_some()
        {
            return Err(PrecheckError::Conflict(conflict_name.to_string()));
        }
    }

    for (dep_name, requirement) in depends {
        let installed = store
            .get(dep_name)
            .map_err(|e| PrecheckError::DependMissing(e.to_string()))?;
        let satisfied = match &installed {
            Some(_) if requirement.is_empty() => true,
            Some(dep_record) => Requirement::parse(requirement)
                .map(|req| req.evaluate(&dep_record.version) == RequirementOutcome::Satisfied)
                .unwrap_or(false),
            None => false,
        };
        if !satisfied {
            return Err(PrecheckError::DependMissing(dep_name.to_string()));
        }
    }

    if !force {
        if let Some(existing) = store
            .get(&incoming.name)
            .map_err(|e| PrecheckError::NotUpgradeable {
                name: incoming.name.to_string(),
                installed: String::new(),
                incoming: incoming.version.to_string(),
            })?
        {
            if existing.version >= incoming.version {
                return Err(PrecheckError::NotUpgradeable {
                    name: incoming.name.to_string(),
                    installed: existing.version.to_string(),
                    incoming: incoming.version.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Everything the installer needs from its caller besides the bundle
/// itself: where hook scripts permanently live, and the collaborator seams.
pub struct InstallContext<'a> {
    /// Permanent per-package hook-script directory under the install-infra root.
    pub hooks_dir: &'a Path,
    /// Sink for the post-install message file, if any.
    pub msg: &'a dyn MsgSink,
    /// Phase-boundary progress reporting.
    pub progress: &'a dyn ProgressSink,
    /// Runs hook subprocesses and `ldconfig`/`install-info`.
    pub system: &'a dyn SystemCommand,
}

/// Runs all three installer phases for one bundle already opened as
/// `reader`, which is consumed so its staged directories and attached stub
/// database are always released via [`BundleReader::finish`], on every exit
/// path including an error from any phase. `record` is the package row to
/// insert; its `prefix` is the install root asset paths are resolved against.
///
/// # Errors
///
/// Returns [`MportError::BundleOutOfSync`] if the archive payload and
/// asset list disagree on ordering, or any IO/db/hook failure converted to
/// [`MportError`].
pub fn install(
    store: &mut MetadataStore,
    mut reader: BundleReader,
    record: &PackageRecord,
    ctx: &InstallContext<'_>,
) -> Result<(), MportError> {
    let result = run_phases(store, &mut reader, record, ctx);
    let finish = reader.finish(store).map_err(MportError::from);
    result.and(finish)
}

fn run_phases(
    store: &mut MetadataStore,
    reader: &mut BundleReader,
    record: &PackageRecord,
    ctx: &InstallContext<'_>,
) -> Result<(), MportError> {
    phase1_pre_install(reader, record, ctx).map_err(anyhow_to_mport_error)?;

    phase2_materialize(store, reader, record).map_err(Into::into)?;

    phase3_post_install(store, reader, record, ctx).map_err(anyhow_to_mport_error)?;

    Ok(())
}

/// Preserves a typed [`MportError`] (e.g. [`MportError::HookNonZero`]) raised
/// from inside an `anyhow::Result` phase instead of flattening it to
/// [`MportError::Fatal`].
fn anyhow_to_mport_error(err: anyhow::Error) -> MportError {
    err.downcast::<MportError>().unwrap_or_else(|e| MportError::Fatal(e.to_string()))
}

fn phase1_pre_install(
    reader: &BundleReader,
    record: &PackageRecord,
    ctx: &InstallContext<'_>,
) -> anyhow::Result<()> {
    ctx.progress.init("pre-install");
    let metadata_dir = reader.prep_for_install()?;

    copy_hook_if_present(metadata_dir, ctx.hooks_dir, PRE_INSTALL_LUA)?;
    copy_hook_if_present(metadata_dir, ctx.hooks_dir, POST_INSTALL_LUA)?;
    copy_hook_if_present(metadata_dir, ctx.hooks_dir, PRE_INSTALL_SH)?;
    copy_hook_if_present(metadata_dir, ctx.hooks_dir, MESSAGE_FILE)?;

    run_lua_if_present(ctx.hooks_dir, PRE_INSTALL_LUA, ctx.system, &record.prefix)?;
    run_shell_hook_if_present(ctx.hooks_dir, PRE_INSTALL_SH, "PRE-INSTALL", ctx.system, &record.prefix)?;

    for entry in asset_entries(metadata_dir, &record.prefix)? {
        let entry = entry?;
        if matches!(entry.kind, AssetKind::PreExec) {
            run_exec(ctx.system, &entry.data, &record.prefix, "", "");
        }
    }

    ctx.progress.finish();
    Ok(())
}

fn phase2_materialize(
    store: &mut MetadataStore,
    reader: &mut BundleReader,
    record: &PackageRecord,
) -> Result<(), MportError> {
    reader.attach_stub_db(store).map_err(MportError::from)?;

    let metadata_dir = reader.prep_for_install().map_err(MportError::from)?.to_path_buf();
    let entries = asset_entries(&metadata_dir, &record.prefix)
        .map_err(|e| MportError::Fatal(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(MportError::from)?;

    let mut txn = store.begin_install().map_err(MportError::from)?;
    txn.insert_package_row(record).map_err(MportError::from)?;
    txn.copy_depends_from_stub(&record.name).map_err(MportError::from)?;
    txn.copy_conflicts_from_stub(&record.name).map_err(MportError::from)?;

    for mut entry in entries {
        if !entry.kind.is_phase2() {
            continue;
        }

        if entry.kind.is_materializable() {
            let header = reader.next_entry().ok_or(MportError::BundleOutOfSync)?;
            let target = PathBuf::from(&entry.data);
            let hash = reader
                .extract_current(&target)
                .map_err(MportError::from)?;
            entry.checksum = Some(hash);
            entry.mode = entry.mode.or(Some(header.mode));
        }

        match entry.kind {
            AssetKind::SampleFile => create_sample_active_copy(&entry)?,
            AssetKind::ShellFile => shell_registry::register(&entry.data),
            _ => {}
        }

        txn.insert_asset(&record.name, &entry).map_err(MportError::from)?;
    }

    txn.commit().map_err(MportError::from)
}

fn phase3_post_install(
    store: &MetadataStore,
    reader: &BundleReader,
    record: &PackageRecord,
    ctx: &InstallContext<'_>,
) -> anyhow::Result<()> {
    let metadata_dir = reader.prep_for_install()?;

    for entry in asset_entries(metadata_dir, &record.prefix)? {
        let entry = entry?;
        if !entry.kind.is_phase3() {
            continue;
        }
        match entry.kind {
            AssetKind::PostExec => run_exec(ctx.system, &entry.data, &record.prefix, "", ""),
            AssetKind::Ldconfig | AssetKind::LdconfigLinux => {
                let _ = ctx.system.run(&["ldconfig".into()], &[], Path::new(&record.prefix));
            }
            AssetKind::Info => {
                let _ = ctx.system.run(
                    &["install-info".into(), entry.data.clone()],
                    &[],
                    Path::new(&record.prefix),
                );
            }
            _ => {}
        }
    }

    if let Ok(message) = fs::read_to_string(metadata_dir.join(MESSAGE_FILE)) {
        ctx.msg.emit(&message);
    }

    run_lua_if_present(ctx.hooks_dir, POST_INSTALL_LUA, ctx.system, &record.prefix)?;
    run_shell_hook_if_present(ctx.hooks_dir, PRE_INSTALL_SH, "POST-INSTALL", ctx.system, &record.prefix)?;

    store.log_event(&record.name, &record.version, "installed")?;
    Ok(())
}

/// Creates the active config copy for a `@sample` entry, iff its target is
/// absent: `alt_data` when the directive gave an explicit destination, else
/// `data` with its `.sample` suffix stripped.
fn create_sample_active_copy(entry: &AssetEntry) -> Result<(), MportError> {
    let target = entry.alt_data.clone().unwrap_or_else(|| strip_sample_suffix(&entry.data));
    let target_path = Path::new(&target);
    if target_path.exists() {
        return Ok(());
    }
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| MportError::Fatal(e.to_string()))?;
    }
    fs::copy(&entry.data, target_path).map_err(|e| MportError::Fatal(e.to_string()))?;
    Ok(())
}

fn strip_sample_suffix(path: &str) -> String {
    path.strip_suffix(".sample").map_or_else(|| path.to_string(), ToString::to_string)
}

fn asset_entries(
    metadata_dir: &Path,
    prefix: &str,
) -> anyhow::Result<AssetListParser<BufReader<fs::File>>> {
    let file = fs::File::open(metadata_dir.join(PLIST_NAME))?;
    Ok(AssetListParser::new(BufReader::new(file), prefix))
}

fn copy_hook_if_present(metadata_dir: &Path, hooks_dir: &Path, name: &str) -> anyhow::Result<()> {
    let src = metadata_dir.join(name);
    if !src.exists() {
        return Ok(());
    }
    fs::create_dir_all(hooks_dir)?;
    fs::copy(src, hooks_dir.join(name))?;
    Ok(())
}

fn run_lua_if_present(hooks_dir: &Path, name: &str, system: &dyn SystemCommand, prefix: &str) -> anyhow::Result<()> {
    let script = hooks_dir.join(name);
    if !script.exists() {
        return Ok(());
    }
    let env = vec![("PKG_PREFIX".to_string(), prefix.to_string())];
    let outcome = system.run(&["lua".into(), script.to_string_lossy().into_owned()], &env, Path::new(prefix))?;
    if !outcome.success {
        return Err(MportError::HookNonZero(format!("{name}: {}", outcome.stderr.trim())).into());
    }
    Ok(())
}

fn run_shell_hook_if_present(
    hooks_dir: &Path,
    name: &str,
    stage_arg: &str,
    system: &dyn SystemCommand,
    prefix: &str,
) -> anyhow::Result<()> {
    let script = hooks_dir.join(name);
    if !script.exists() {
        return Ok(());
    }
    let env = vec![("PKG_PREFIX".to_string(), prefix.to_string())];
    let outcome = system.run(
        &[script.to_string_lossy().into_owned(), stage_arg.to_string()],
        &env,
        Path::new(prefix),
    )?;
    if !outcome.success {
        return Err(MportError::HookNonZero(format!("{name} {stage_arg}: {}", outcome.stderr.trim())).into());
    }
    Ok(())
}

/// Runs a buffered `@preexec`/`@postexec` command, substituting `%F`
/// (absolute file path), `%D` (current directory), `%B` (basename).
fn run_exec(system: &dyn SystemCommand, cmd: &str, cwd: &str, file: &str, basename: &str) {
    let substituted = cmd
        .replace("%F", file)
        .replace("%D", cwd)
        .replace("%B", basename);
    let _ = system.run(&["/bin/sh".into(), "-c".into(), substituted], &[], Path::new(cwd));
}

#[cfg(test)]
mod tests {
    use super::*;
    use mport_schema::{InstallReason, PackageKind, Version};

    fn sample_record() -> PackageRecord {
        PackageRecord {
            name: PackageName::new("jq"),
            version: Version::parse("1.7"),
            origin: "textproc/jq".into(),
            prefix: "/usr/local".into(),
            lang: String::new(),
            options: String::new(),
            comment: "a json processor".into(),
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
            automatic: InstallReason::Explicit,
            install_date: 0,
            kind: PackageKind::Application,
            flatsize: 0,
        }
    }

    #[test]
    fn precheck_rejects_non_upgrade_without_force() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample_record()).unwrap();
            txn.commit().unwrap();
        }

        let err = precheck(&store, &sample_record(), &[], &[], false).unwrap_err();
        assert!(matches!(err, PrecheckError::NotUpgradeable { .. }));
    }

    #[test]
    fn precheck_rejects_missing_dependency() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut record = sample_record();
        record.name = PackageName::new("needs-libfoo");
        let depends = vec![(PackageName::new("libfoo"), String::new())];
        let err = precheck(&store, &record, &[], &depends, false).unwrap_err();
        assert!(matches!(err, PrecheckError::DependMissing(_)));
    }

    #[test]
    fn precheck_passes_with_no_conflicts_or_deps() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut record = sample_record();
        record.name = PackageName::new("standalone");
        assert!(precheck(&store, &record, &[], &[], false).is_ok());
    }
}
