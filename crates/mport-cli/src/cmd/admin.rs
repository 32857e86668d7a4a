//! `lock`, `unlock`, `locks`, `cpe`, `purl`, `config`, `import`, `export`,
//! `version` (§6).

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use mport_schema::{PackageName, Version};

use crate::context::Context;

/// `mport lock <pkg>`: marks a package locked against deletion/upgrade.
///
/// # Errors
///
/// Returns an error if the package is not installed.
pub fn lock(ctx: &Context, package: &str) -> anyhow::Result<i32> {
    set_locked(ctx, package, true)
}

/// `mport unlock <pkg>`.
///
/// # Errors
///
/// Returns an error if the package is not installed.
pub fn unlock(ctx: &Context, package: &str) -> anyhow::Result<i32> {
    set_locked(ctx, package, false)
}

fn set_locked(ctx: &Context, package: &str, locked: bool) -> anyhow::Result<i32> {
    let name = PackageName::new(package);
    if ctx.store.get(&name)?.is_none() {
        anyhow::bail!("package '{package}' is not installed");
    }
    ctx.store.set_locked(&name, locked)?;
    println!("{package} {}", if locked { "locked" } else { "unlocked" });
    Ok(0)
}

/// `mport locks`: lists every locked package.
///
/// # Errors
///
/// Returns a database error.
pub fn locks(ctx: &Context) -> anyhow::Result<i32> {
    let locked = ctx.store.list_locked()?;
    if locked.is_empty() {
        println!("no locked packages");
        return Ok(1);
    }
    for name in locked {
        println!("{name}");
    }
    Ok(0)
}

/// `mport cpe [pkg]`: prints the CPE 2.3 string for one or every installed
/// package.
///
/// # Errors
///
/// Returns a database error.
pub fn cpe(ctx: &Context, package: Option<&str>) -> anyhow::Result<i32> {
    print_field(ctx, package, |r| r.cpe.clone())
}

/// `mport purl [pkg]`: prints the Package URL for one or every installed
/// package.
///
/// # Errors
///
/// Returns a database error.
pub fn purl(ctx: &Context, package: Option<&str>) -> anyhow::Result<i32> {
    print_field(ctx, package, |r| r.purl.clone())
}

fn print_field(ctx: &Context, package: Option<&str>, field: impl Fn(&mport_schema::PackageRecord) -> String) -> anyhow::Result<i32> {
    let records = match package {
        Some(name) => ctx.store.get(&PackageName::new(name))?.into_iter().collect(),
        None => ctx.store.list_all()?,
    };
    for record in &records {
        let value = field(record);
        if !value.is_empty() {
            println!("{}: {value}", record.name);
        }
    }
    Ok(0)
}

/// `mport config list|get|set`.
pub mod config {
    use super::{Context, Path};

    /// `mport config list`: prints every setting.
    pub fn list(ctx: &Context) {
        let toml = toml::to_string_pretty(&ctx.settings).unwrap_or_default();
        print!("{toml}");
    }

    /// `mport config get <key>`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not a recognized setting.
    pub fn get(ctx: &Context, key: &str) -> anyhow::Result<i32> {
        let value = match key {
            "mirror_region" => ctx.settings.mirror_region.clone(),
            "target_os" => ctx.settings.target_os.clone(),
            "fetch_timeout" => ctx.settings.fetch_timeout.to_string(),
            "assume_always_yes" => ctx.settings.assume_always_yes.to_string(),
            "db_root" => ctx.settings.db_root.clone(),
            "mirror_url" => ctx.settings.mirror_url.clone(),
            other => anyhow::bail!("unknown setting '{other}'"),
        };
        println!("{value}");
        Ok(0)
    }

    /// `mport config set <key> <value>`: since settings are read from
    /// `/etc/mport.conf` at startup, this writes the merged settings back
    /// to that file.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not recognized or `value` fails to
    /// parse for its field type, or the config file cannot be written.
    pub fn set(ctx: &mut Context, key: &str, value: &str, config_path: &Path) -> anyhow::Result<i32> {
        match key {
            "mirror_region" => ctx.settings.mirror_region = value.to_string(),
            "target_os" => ctx.settings.target_os = value.to_string(),
            "fetch_timeout" => ctx.settings.fetch_timeout = value.parse()?,
            "assume_always_yes" => ctx.settings.assume_always_yes = value.parse()?,
            "db_root" => ctx.settings.db_root = value.to_string(),
            "mirror_url" => ctx.settings.mirror_url = value.to_string(),
            other => anyhow::bail!("unknown setting '{other}'"),
        }
        let toml = toml::to_string_pretty(&ctx.settings)?;
        std::fs::write(config_path, toml)?;
        println!("{key} = {value}");
        Ok(0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportedPackage {
    name: String,
    version: String,
    origin: String,
    automatic: bool,
    locked: bool,
}

/// `mport export <file>`: snapshots `(name, version, origin, automatic,
/// locked)` for every installed package to a JSON file.
///
/// # Errors
///
/// Returns a database or IO error.
pub fn export(ctx: &Context, file: &Path) -> anyhow::Result<i32> {
    let snapshot: Vec<ExportedPackage> = ctx
        .store
        .list_all()?
        .into_iter()
        .map(|r| ExportedPackage {
            name: r.name.to_string(),
            version: r.version.to_string(),
            origin: r.origin.clone(),
            automatic: r.automatic == mport_schema::InstallReason::Automatic,
            locked: r.locked,
        })
        .collect();
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(file, json)?;
    println!("exported {} package(s) to {}", snapshot.len(), file.display());
    Ok(0)
}

/// `mport import <file>`: re-registers a previously exported snapshot into
/// the live database as bare rows (no assets, no dependency edges) — for
/// restoring `(name, version, automatic, locked)` after a fresh install.
///
/// # Errors
///
/// Returns a parse, database, or IO error.
pub fn import(ctx: &mut Context, file: &Path) -> anyhow::Result<i32> {
    let json = std::fs::read_to_string(file)?;
    let snapshot: Vec<ExportedPackage> = serde_json::from_str(&json)?;

    let mut txn = ctx.store.begin_install()?;
    for entry in &snapshot {
        let mut record = mport_schema::PackageRecord {
            name: PackageName::new(&entry.name),
            version: Version::parse(&entry.version),
            origin: entry.origin.clone(),
            prefix: "/usr/local".to_string(),
            lang: String::new(),
            options: String::new(),
            comment: String::new(),
            desc: String::new(),
            categories: Vec::new(),
            os_release: String::new(),
            cpe: String::new(),
            purl: String::new(),
            locked: entry.locked,
            deprecated: String::new(),
            expiration_date: 0,
            no_provide_shlib: false,
            flavor: String::new(),
            automatic: if entry.automatic {
                mport_schema::InstallReason::Automatic
            } else {
                mport_schema::InstallReason::Explicit
            },
            install_date: 0,
            kind: mport_schema::PackageKind::Application,
            flatsize: 0,
        };
        record.purl = record.derive_purl();
        txn.insert_package_row(&record)?;
    }
    txn.commit()?;
    println!("imported {} package(s)", snapshot.len());
    Ok(0)
}

/// `mport version -t <v1> <v2>`: compares two version strings per the
/// package-manager's own version algebra.
pub fn version_compare(terse: bool, v1: &str, v2: &str) -> i32 {
    let ordering = Version::parse(v1).cmp(&Version::parse(v2));
    if terse {
        println!(
            "{}",
            match ordering {
                Ordering::Less => "<",
                Ordering::Equal => "=",
                Ordering::Greater => ">",
            }
        );
    } else {
        println!(
            "{v1} is {} {v2}",
            match ordering {
                Ordering::Less => "older than",
                Ordering::Equal => "equal to",
                Ordering::Greater => "newer than",
            }
        );
    }
    0
}
