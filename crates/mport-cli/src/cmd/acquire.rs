//! `install`, `add`, `download` (§6): acquiring and materializing bundles.

use std::fs;
use std::path::{Path, PathBuf};

use mport_bundle::BundleReader;
use mport_core::installer::{self, InstallContext};
use mport_core::{Clock, HttpFetcher, IndexClient};
use mport_schema::{InstallReason, PackageKind, PackageName, PackageRecord, Version};

use crate::context::Context;

/// `mport install [-A] <pkg>...`: resolves each name against the cached
/// index, downloads its bundle, and installs it.
///
/// # Errors
///
/// Returns an error on a missing index entry, a failed download, or any
/// precheck/install failure.
pub fn install(ctx: &mut Context, automatic: bool, packages: &[String]) -> anyhow::Result<i32> {
    let _lock = ctx.acquire_lock()?;
    install_locked(ctx, automatic, packages)
}

/// Same as [`install`], but assumes the caller already holds the advisory
/// lock (e.g. `mport upgrade`, which takes it once for the whole plan
/// instead of re-acquiring it per action).
///
/// # Errors
///
/// Returns an error on a missing index entry, a failed download, or any
/// precheck/install failure.
pub fn install_locked(ctx: &mut Context, automatic: bool, packages: &[String]) -> anyhow::Result<i32> {
    let index = IndexClient::load(&ctx.settings.index_dir().join("index.db"))?;

    for spec in packages {
        let (name, _pin) = split_name_version(spec);
        let entry = index
            .lookup_by_name(&PackageName::new(&name))?
            .ok_or_else(|| anyhow::anyhow!("package '{name}' not found in index"))?;

        let bundle_path = download_bundle(ctx, &entry.bundlefile, &entry.sha256)?;
        install_bundle_file(ctx, &bundle_path, automatic, Some(&entry))?;
    }
    Ok(0)
}

/// `mport add [-A] <file>...`: installs already-downloaded bundle files
/// directly, sourcing package metadata from each bundle's own stub database.
///
/// # Errors
///
/// Returns an error on a malformed bundle or any precheck/install failure.
pub fn add(ctx: &mut Context, automatic: bool, files: &[PathBuf]) -> anyhow::Result<i32> {
    let _lock = ctx.acquire_lock()?;
    for file in files {
        install_bundle_file(ctx, file, automatic, None)?;
    }
    Ok(0)
}

/// `mport download [-d] <pkg>...`: fetches bundles (and optionally their
/// transitive dependencies) into the download cache without installing.
///
/// # Errors
///
/// Returns an error on a missing index entry or failed download.
pub fn download(ctx: &mut Context, with_depends: bool, packages: &[String]) -> anyhow::Result<i32> {
    let index = IndexClient::load(&ctx.settings.index_dir().join("index.db"))?;
    let mut queue: Vec<String> = packages.to_vec();
    let mut seen = std::collections::HashSet::new();

    while let Some(spec) = queue.pop() {
        let (name, _pin) = split_name_version(&spec);
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(entry) = index.lookup_by_name(&PackageName::new(&name))? else {
            println!("warning: '{name}' not found in index, skipping");
            continue;
        };
        download_bundle(ctx, &entry.bundlefile, &entry.sha256)?;
        if with_depends {
            queue.extend(index.depends_list(&entry.pkgname, entry.version.as_str())?.into_iter().map(|p| p.to_string()));
        }
    }
    Ok(0)
}

fn split_name_version(spec: &str) -> (String, Option<String>) {
    spec.split_once('@').map_or_else(
        || (spec.to_string(), None),
        |(name, version)| (name.to_string(), Some(version.to_string())),
    )
}

fn download_bundle(ctx: &Context, bundlefile: &str, expected_sha256: &mport_schema::Sha256Hash) -> anyhow::Result<PathBuf> {
    let downloads_dir = ctx.downloads_dir();
    fs::create_dir_all(&downloads_dir)?;
    let dest = downloads_dir.join(bundlefile);

    if dest.exists() {
        let bytes = fs::read(&dest)?;
        if &mport_schema::Sha256Hash::compute(&bytes) == expected_sha256 {
            return Ok(dest);
        }
    }

    let url = format!("{}/{bundlefile}", ctx.settings.mirror_url);
    let http = ctx.http_fetcher();
    let bytes = http.get(&url).map_err(|e| anyhow::anyhow!(e))?;

    let actual = mport_schema::Sha256Hash::compute(&bytes);
    if &actual != expected_sha256 {
        anyhow::bail!("checksum mismatch for {bundlefile}: expected {expected_sha256}, got {actual}");
    }

    let tmp = downloads_dir.join(format!(".{bundlefile}.tmp"));
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, &dest)?;
    Ok(dest)
}

fn install_bundle_file(
    ctx: &mut Context,
    bundle_path: &Path,
    automatic: bool,
    index_entry: Option<&mport_schema::IndexEntry>,
) -> anyhow::Result<()> {
    let reader = BundleReader::open(bundle_path)?;
    let mut record = reader.stub_package_record().unwrap_or_else(|_| blank_record());

    if let Some(entry) = index_entry {
        record.name = entry.pkgname.clone();
        record.version = entry.version.clone();
        record.origin = entry.origin.clone();
        record.comment = entry.comment.clone();
    }
    if record.prefix.is_empty() {
        record.prefix = "/usr/local".to_string();
    }
    record.automatic = if automatic { InstallReason::Automatic } else { InstallReason::Explicit };
    record.install_date = ctx.clock().now().timestamp();
    record.purl = record.derive_purl();

    let depends = reader.stub_depends()?;
    let conflicts = reader.stub_conflicts()?;

    installer::precheck(&ctx.store, &record, &conflicts, &depends, ctx.force)?;

    let hooks_dir = ctx.settings.infrastructure_dir(record.name.as_str(), record.version.as_str());
    let msg = ctx.msg_sink();
    let progress = mport_core::NullProgressSink;
    let system = ctx.system_command();
    let install_ctx = InstallContext {
        hooks_dir: &hooks_dir,
        msg: &msg,
        progress: &progress,
        system: &system,
    };

    installer::install(&mut ctx.store, reader, &record, &install_ctx)?;
    println!("installed {} {}", record.name, record.version);
    Ok(())
}

fn blank_record() -> PackageRecord {
    PackageRecord {
        name: PackageName::new(""),
        version: Version::parse("0"),
        origin: String::new(),
        prefix: String::new(),
        lang: String::new(),
        options: String::new(),
        comment: String::new(),
        desc: String::new(),
        categories: Vec::new(),
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
