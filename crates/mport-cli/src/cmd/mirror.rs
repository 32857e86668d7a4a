//! `index`, `mirror list`, `mirror select` (§6).

use mport_core::IndexClient;
use mport_schema::{Arch, Sha256Hash};

use crate::context::Context;

/// `mport index`: refreshes the cached index from the configured mirror.
///
/// # Errors
///
/// Returns an error if the fetch, checksum verification, or cache swap
/// fails.
pub fn refresh(ctx: &Context) -> anyhow::Result<i32> {
    let cache_path = ctx.settings.index_dir().join("index.db");
    let arch = Arch::current();
    let base = format!("{}/{}/{arch}", ctx.settings.mirror_url, ctx.settings.target_os);

    let http = ctx.http_fetcher();
    let digest_bytes = http.get(&format!("{base}/index.sha256")).map_err(|e| anyhow::anyhow!(e))?;
    let digest = String::from_utf8_lossy(&digest_bytes).trim().to_string();
    let expected = Sha256Hash::new(digest);

    IndexClient::get(&cache_path, &format!("{base}/index.db"), &expected, &http)?;
    println!("index refreshed");
    Ok(0)
}

/// `mport mirror list`: shows the mirrors recorded in the cached index.
///
/// # Errors
///
/// Returns an error if the index cache has not been loaded yet.
pub fn mirror_list(ctx: &Context) -> anyhow::Result<i32> {
    let index = IndexClient::load(&ctx.settings.index_dir().join("index.db"))?;
    for entry in index.mirror_list()? {
        let marker = if entry.country == ctx.settings.mirror_region { "*" } else { " " };
        println!("{marker} {} {}", entry.country, entry.url);
    }
    Ok(0)
}

/// `mport mirror select <country>`: picks the active mirror by recording its
/// `mirror_region` back into settings (persisted by the caller, which owns
/// the settings file path).
///
/// # Errors
///
/// Returns an error if `country` does not match any mirror in the cached
/// index.
pub fn mirror_select(ctx: &Context, country: &str) -> anyhow::Result<i32> {
    let index = IndexClient::load(&ctx.settings.index_dir().join("index.db"))?;
    let mirrors = index.mirror_list()?;
    let Some(entry) = mirrors.iter().find(|m| m.country == country) else {
        anyhow::bail!("no mirror for country '{country}'");
    };
    println!("selected {} ({})", entry.country, entry.url);
    println!("note: edit mirror_region = \"{country}\" in {} to persist this", crate::settings::DEFAULT_CONFIG_PATH);
    Ok(0)
}
