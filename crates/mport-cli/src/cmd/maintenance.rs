//! `update`, `upgrade`, `autoremove`, `clean`, `verify`, `audit` (§6).

use mport_core::upgrade_planner::{self, PlanAction};
use mport_core::{deletion, verifier, IndexClient};
use mport_schema::PackageName;

use crate::cmd::acquire;
use crate::context::Context;

/// `mport update <pkg>...`: refreshes only the named packages against the
/// cached index, upgrading each if a newer version is available.
///
/// # Errors
///
/// Returns an error on a missing index cache or a failed upgrade.
pub fn update(ctx: &mut Context, packages: &[String]) -> anyhow::Result<i32> {
    let index = IndexClient::load(&ctx.settings.index_dir().join("index.db"))?;
    let mut did_something = false;

    for name in packages {
        let record = ctx
            .store
            .get(&PackageName::new(name))?
            .ok_or_else(|| anyhow::anyhow!("package '{name}' is not installed"))?;
        let outcome = index.check(&record.name, &record.version, &record.origin)?;
        if outcome == mport_schema::CheckOutcome::UpdateAvailable {
            acquire::install(ctx, record.automatic == mport_schema::InstallReason::Automatic, &[name.clone()])?;
            did_something = true;
        } else {
            println!("{name} is up to date");
        }
    }
    Ok(if did_something { 0 } else { 1 })
}

/// `mport upgrade`: builds the full upgrade plan (§4.H) and executes it.
///
/// # Errors
///
/// Returns an error on a planning failure or a failed step.
pub fn upgrade(ctx: &mut Context) -> anyhow::Result<i32> {
    let index = IndexClient::load(&ctx.settings.index_dir().join("index.db"))?;
    let confirm = ctx.confirm_sink();
    let actions = upgrade_planner::plan(&ctx.store, &index, &confirm)?;

    if actions.is_empty() {
        println!("nothing to do");
        return Ok(1);
    }

    let _lock = ctx.acquire_lock()?;
    for action in actions {
        match action {
            PlanAction::DeleteExpired(name) | PlanAction::Autoremove(name) => {
                delete_one(ctx, &name)?;
            }
            PlanAction::Rename { from, to } => {
                delete_one(ctx, &from)?;
                acquire::install_locked(ctx, true, &[to.to_string()])?;
            }
            PlanAction::Upgrade(name) => {
                acquire::install_locked(ctx, false, &[name.to_string()])?;
            }
        }
    }
    Ok(0)
}

/// `mport autoremove`: deletes every automatically-installed package with no
/// remaining explicit ancestor.
///
/// # Errors
///
/// Returns an error on a database error or a failed deletion.
pub fn autoremove(ctx: &mut Context) -> anyhow::Result<i32> {
    let orphans = upgrade_planner::autoremove(&ctx.store)?;
    if orphans.is_empty() {
        println!("nothing to do");
        return Ok(1);
    }
    let _lock = ctx.acquire_lock()?;
    for name in &orphans {
        delete_one(ctx, name)?;
    }
    Ok(0)
}

/// `mport clean`: removes cached bundle files that no longer match a
/// currently indexed `bundlefile`/checksum pair.
///
/// # Errors
///
/// Returns an error if the downloads directory cannot be read.
pub fn clean(ctx: &mut Context) -> anyhow::Result<i32> {
    let downloads = ctx.downloads_dir();
    let Ok(entries) = std::fs::read_dir(&downloads) else {
        return Ok(1);
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with('.') {
            let _ = std::fs::remove_file(&path);
            removed += 1;
        }
    }
    println!("removed {removed} stale file(s)");
    Ok(if removed > 0 { 0 } else { 1 })
}

/// `mport verify [-r] [pkg]...`: recomputes checksums for every recorded
/// file asset (or, with `-r`, rewrites the stored checksum to match disk).
///
/// # Errors
///
/// Returns a database error.
pub fn verify(ctx: &mut Context, recompute: bool, packages: &[String]) -> anyhow::Result<i32> {
    if recompute {
        let targets = if packages.is_empty() {
            ctx.store.list_all()?.into_iter().map(|r| r.name).collect()
        } else {
            packages.iter().map(|n| PackageName::new(n)).collect::<Vec<_>>()
        };
        for name in &targets {
            let updated = verifier::recompute_checksums(&mut ctx.store, name)?;
            println!("{name}: recomputed {updated} checksum(s)");
        }
        return Ok(0);
    }

    let mismatches = verifier::verify(&ctx.store)?;
    for m in &mismatches {
        println!("{}: {} checksum mismatch", m.package, m.path);
    }
    Ok(if mismatches.is_empty() { 0 } else { 1 })
}

/// `mport audit [-r] [pkg]`: checks installed packages' CPEs against the
/// configured CVE feed.
///
/// # Errors
///
/// Returns an error on a feed fetch or parse failure.
pub fn audit(ctx: &mut Context, depends_on: bool, package: Option<&str>) -> anyhow::Result<i32> {
    let http = ctx.http_fetcher();
    let feed_url_template = "https://cve.mport.example/feed?cpe={cpe}";
    let findings = verifier::audit(&ctx.store, feed_url_template, &http, depends_on)?;

    let filtered: Vec<_> = match package {
        Some(name) => findings.into_iter().filter(|f| f.package.as_str() == name).collect(),
        None => findings,
    };

    for finding in &filtered {
        println!("{}: {} known vulnerabilit(y/ies)", finding.package, finding.cves.len());
        for cve in &finding.cves {
            println!("  {}: {}", cve.id, cve.description);
        }
        if !finding.dependent_chain.is_empty() {
            let names: Vec<String> = finding.dependent_chain.iter().map(PackageName::to_string).collect();
            println!("  depended on by: {}", names.join(", "));
        }
    }
    Ok(if filtered.is_empty() { 0 } else { 1 })
}

fn delete_one(ctx: &mut Context, name: &PackageName) -> anyhow::Result<()> {
    deletion::precheck(&ctx.store, name, ctx.force)?;
    let record = ctx.store.get(name)?.ok_or_else(|| anyhow::anyhow!("package '{name}' is not installed"))?;
    let hooks_dir = ctx.settings.infrastructure_dir(name.as_str(), record.version.as_str());
    let system = ctx.system_command();
    deletion::delete(&mut ctx.store, name, &hooks_dir, &system)?;
    println!("deleted {name}");
    Ok(())
}
