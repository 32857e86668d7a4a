//! `delete`, `deleteall` (§6).

use mport_core::deletion;
use mport_schema::PackageName;

use crate::context::Context;

/// `mport delete <pkg>...`.
///
/// # Errors
///
/// Returns an error if any named package fails its deletion precondition
/// check (locked, or still depended on, unless `-f`).
pub fn delete(ctx: &mut Context, packages: &[String]) -> anyhow::Result<i32> {
    let _lock = ctx.acquire_lock()?;
    let system = ctx.system_command();

    for name in packages {
        let name = PackageName::new(name);
        deletion::precheck(&ctx.store, &name, ctx.force)?;

        let record = ctx
            .store
            .get(&name)?
            .ok_or_else(|| anyhow::anyhow!("package '{name}' is not installed"))?;
        let hooks_dir = ctx.settings.infrastructure_dir(name.as_str(), record.version.as_str());

        deletion::delete(&mut ctx.store, &name, &hooks_dir, &system)?;
        println!("deleted {name}");
    }
    Ok(0)
}

/// `mport deleteall`: removes every installed package, in no particular
/// dependency order (each individual precondition still applies unless
/// `-f`).
///
/// # Errors
///
/// Returns an error on the first package that fails its precondition check.
pub fn deleteall(ctx: &mut Context) -> anyhow::Result<i32> {
    let names: Vec<String> = ctx.store.list_all()?.into_iter().map(|r| r.name.to_string()).collect();
    if names.is_empty() {
        println!("nothing to do");
        return Ok(1);
    }
    delete(ctx, &names)
}
