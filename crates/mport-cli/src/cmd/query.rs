//! `search`, `info`, `list`, `which`, `stats` (§6).

use comfy_table::{presets::UTF8_FULL, Table};

use mport_core::IndexClient;
use mport_schema::CheckOutcome;

use crate::context::Context;

/// `mport search <term>...`: queries the cached index by name/comment
/// substring.
///
/// # Errors
///
/// Returns an error if the index cache has not been loaded.
pub fn search(ctx: &Context, terms: &[String]) -> anyhow::Result<i32> {
    let index = IndexClient::load(&ctx.settings.index_dir().join("index.db"))?;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Name", "Version", "Comment"]);

    let mut found = false;
    for term in terms {
        for entry in index.search_term(term)? {
            table.add_row(vec![entry.pkgname.to_string(), entry.version.to_string(), entry.comment]);
            found = true;
        }
    }
    println!("{table}");
    Ok(if found { 0 } else { 1 })
}

/// `mport info <pkg>`: shows every recorded field for an installed package.
///
/// # Errors
///
/// Returns an error if the package is not installed.
pub fn info(ctx: &Context, package: &str) -> anyhow::Result<i32> {
    let name = mport_schema::PackageName::new(package);
    let Some(record) = ctx.store.get(&name)? else {
        println!("{package} is not installed");
        return Ok(1);
    };

    println!("Name       : {}", record.name);
    println!("Version    : {}", record.version);
    println!("Origin     : {}", record.origin);
    println!("Prefix     : {}", record.prefix);
    println!("Comment    : {}", record.comment);
    println!("Locked     : {}", record.locked);
    println!("Automatic  : {:?}", record.automatic);
    println!("Flat size  : {}", record.flatsize);
    println!("Installed  : {}", format_install_date(record.install_date));
    Ok(0)
}

/// Renders `install_date` (epoch seconds) as `YYYY-MM-DD HH:MM:SS UTC`.
fn format_install_date(install_date: i64) -> String {
    chrono::DateTime::from_timestamp(install_date, 0)
        .map_or_else(|| install_date.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// `mport list [updates|prime]`: lists installed packages, optionally
/// filtered to those with an available update or those installed explicitly
/// ("prime").
///
/// # Errors
///
/// Returns an error on a database or (for `updates`) index-client failure.
pub fn list(ctx: &Context, filter: Option<&str>) -> anyhow::Result<i32> {
    let installed = ctx.store.list_all()?;

    let index = if filter == Some("updates") {
        Some(IndexClient::load(&ctx.settings.index_dir().join("index.db"))?)
    } else {
        None
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Name", "Version", "Automatic"]);

    for record in &installed {
        match filter {
            Some("prime") if record.automatic != mport_schema::InstallReason::Explicit => continue,
            Some("updates") => {
                let Some(index) = index.as_ref() else { continue };
                let outcome = index.check(&record.name, &record.version, &record.origin)?;
                if outcome != CheckOutcome::UpdateAvailable {
                    continue;
                }
            }
            _ => {}
        }
        table.add_row(vec![record.name.to_string(), record.version.to_string(), format!("{:?}", record.automatic)]);
    }
    println!("{table}");
    Ok(0)
}

/// `mport which [-qo] <path>`: finds which installed package owns `path`.
///
/// # Errors
///
/// Returns an error on a database error.
pub fn which(ctx: &Context, quiet: bool, origin_only: bool, path: &std::path::Path) -> anyhow::Result<i32> {
    let path_str = path.to_string_lossy();
    let Some(owner) = ctx.store.find_owner(&path_str)? else {
        if !quiet {
            println!("{} is not owned by any installed package", path.display());
        }
        return Ok(1);
    };

    if origin_only {
        if let Some(record) = ctx.store.get(&owner)? {
            println!("{}", record.origin);
        }
    } else if quiet {
        println!("{owner}");
    } else {
        println!("{} was installed by package {owner}", path.display());
    }
    Ok(0)
}

/// `mport stats`: summary counts over the live database.
///
/// # Errors
///
/// Returns a database error.
pub fn stats(ctx: &Context) -> anyhow::Result<i32> {
    let installed = ctx.store.list_all()?;
    let explicit = installed.iter().filter(|r| r.automatic == mport_schema::InstallReason::Explicit).count();
    let automatic = installed.len() - explicit;
    let locked = ctx.store.list_locked()?.len();

    println!("Installed packages : {}", installed.len());
    println!("  explicit         : {explicit}");
    println!("  automatic        : {automatic}");
    println!("  locked           : {locked}");
    Ok(0)
}
