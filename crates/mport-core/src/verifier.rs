//! Verifier / auditor (§4.I).
//!
//! `verify` never repairs anything it finds wrong; `recompute_checksums` is
//! the explicit operator override for when on-disk drift is expected and
//! accepted. `audit` is the only component besides the index client that
//! performs HTTP, and goes through the same [`HttpFetcher`] seam.

use std::collections::HashMap;
use std::fs;

use mport_db::MetadataStore;
use mport_schema::{AssetKind, MportError, PackageName, Sha256Hash};
use serde::Deserialize;

use crate::collaborators::HttpFetcher;

/// One asset whose on-disk checksum no longer matches what was recorded at
/// install time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// The package that recorded this asset.
    pub package: PackageName,
    /// The asset's path on disk.
    pub path: String,
    /// The checksum recorded at install time.
    pub expected: Sha256Hash,
    /// The checksum found on disk, or `None` if the file is missing.
    pub actual: Option<Sha256Hash>,
}

/// Recomputes the SHA-256 of every recorded `File` asset across every
/// installed package and reports mismatches. Never writes anything.
///
/// # Errors
///
/// Returns a database error.
pub fn verify(store: &MetadataStore) -> Result<Vec<Mismatch>, MportError> {
    let mut mismatches = Vec::new();
    for record in store.list_all().map_err(MportError::from)? {
        for entry in store.get_assets(&record.name).map_err(MportError::from)? {
            if entry.kind != AssetKind::File {
                continue;
            }
            let Some(expected) = &entry.checksum else { continue };
            let actual = fs::read(&entry.data).ok().map(|bytes| Sha256Hash::compute(&bytes));
            if actual.as_ref() != Some(expected) {
                mismatches.push(Mismatch {
                    package: record.name.clone(),
                    path: entry.data.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
    }
    Ok(mismatches)
}

/// Rewrites the stored checksum for every `File` asset of `name` to its
/// current on-disk value (operator override; files that no longer exist
/// are left untouched).
///
/// # Errors
///
/// Returns a database error.
pub fn recompute_checksums(store: &mut MetadataStore, name: &PackageName) -> Result<usize, MportError> {
    let assets = store.get_assets(name).map_err(MportError::from)?;
    let mut updated = 0;
    for entry in &assets {
        if entry.kind != AssetKind::File {
            continue;
        }
        let Ok(bytes) = fs::read(&entry.data) else { continue };
        let fresh = Sha256Hash::compute(&bytes);
        store.update_asset_checksum(name, &entry.data, &fresh).map_err(MportError::from)?;
        updated += 1;
    }
    Ok(updated)
}

#[derive(Debug, Deserialize)]
struct CveFeedResponse {
    #[serde(default)]
    vulnerabilities: Vec<CveEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CveEntry {
    /// The CVE identifier, e.g. `CVE-2024-1234`.
    pub id: String,
    /// A short human-readable description of the vulnerability.
    pub description: String,
}

/// A vulnerable package plus (when `depends_on` reporting is requested) the
/// chain of packages depending on it.
#[derive(Debug, Clone)]
pub struct AuditFinding {
    /// The vulnerable package.
    pub package: PackageName,
    /// The CVEs reported for this package's CPE.
    pub cves: Vec<CveEntry>,
    /// Packages that transitively depend on `package`, when requested.
    pub dependent_chain: Vec<PackageName>,
}

/// Looks up every installed package with a non-empty CPE against
/// `feed_url_template` (a URL containing one `{cpe}` placeholder),
/// optionally including reverse-dependency chains.
///
/// # Errors
///
/// Returns [`MportError::Fatal`] if a fetch or response fails to parse.
pub fn audit(
    store: &MetadataStore,
    feed_url_template: &str,
    http: &dyn HttpFetcher,
    depends_on: bool,
) -> Result<Vec<AuditFinding>, MportError> {
    let installed = store.list_all().map_err(MportError::from)?;
    let mut findings = Vec::new();

    for record in &installed {
        if record.cpe.is_empty() {
            continue;
        }
        let url = feed_url_template.replace("{cpe}", &record.cpe);
        let body = http.get(&url).map_err(|e| {
            if e == "fetch timed out" {
                MportError::FetchTimeout
            } else {
                MportError::Fatal(e)
            }
        })?;
        let parsed: CveFeedResponse = serde_json::from_slice(&body).map_err(|e| MportError::Fatal(e.to_string()))?;
        if parsed.vulnerabilities.is_empty() {
            continue;
        }

        let dependent_chain = if depends_on {
            reverse_dependency_chain(store, &record.name)?
        } else {
            Vec::new()
        };

        findings.push(AuditFinding {
            package: record.name.clone(),
            cves: parsed.vulnerabilities,
            dependent_chain,
        });
    }

    Ok(findings)
}

fn reverse_dependency_chain(store: &MetadataStore, name: &PackageName) -> Result<Vec<PackageName>, MportError> {
    let mut chain = Vec::new();
    let mut seen: HashMap<PackageName, ()> = HashMap::new();
    let mut frontier = vec![name.clone()];

    while let Some(current) = frontier.pop() {
        for up in store.get_up_depends(&current).map_err(MportError::from)? {
            if seen.insert(up.clone(), ()).is_none() {
                chain.push(up.clone());
                frontier.push(up);
            }
        }
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mport_schema::{InstallReason, PackageKind, PackageRecord, Version};

    fn sample_record(name: &str) -> PackageRecord {
        PackageRecord {
            name: PackageName::new(name),
            version: Version::parse("1.0"),
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
    fn verify_flags_missing_file_as_mismatch() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample_record("jq")).unwrap();
            let mut entry = mport_schema::AssetEntry::new(AssetKind::File, "/nonexistent/bin/jq");
            entry.checksum = Some(Sha256Hash::compute(b"anything"));
            txn.insert_asset(&PackageName::new("jq"), &entry).unwrap();
            txn.commit().unwrap();
        }

        let mismatches = verify(&store).unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].actual, None);
    }

    #[test]
    fn verify_passes_when_no_checksum_recorded() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample_record("jq")).unwrap();
            let entry = mport_schema::AssetEntry::new(AssetKind::Directory, "/usr/local/share/jq");
            txn.insert_asset(&PackageName::new("jq"), &entry).unwrap();
            txn.commit().unwrap();
        }
        assert!(verify(&store).unwrap().is_empty());
    }
}
