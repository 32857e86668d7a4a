//! `/etc/mport.conf` settings (§6).
//!
//! Parsed as TOML; every key is optional and falls back to a documented
//! default, mirroring the original's permissive `pkg.conf`-style config.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The default path this binary reads its configuration from.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mport.conf";

/// Parsed `/etc/mport.conf` contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mirror region code (e.g. `"us"`), used to pick a default mirror.
    pub mirror_region: String,
    /// Target OS release string embedded in index/bundle paths.
    pub target_os: String,
    /// HTTP fetch deadline, in seconds (§5 default: 120).
    pub fetch_timeout: u64,
    /// When true, every confirmation prompt defaults to yes non-interactively.
    pub assume_always_yes: bool,
    /// Root the live database and caches are stored under.
    pub db_root: String,
    /// Base URL of the configured package mirror.
    pub mirror_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mirror_region: "us".to_string(),
            target_os: "linux".to_string(),
            fetch_timeout: 120,
            assume_always_yes: false,
            db_root: "/var/db/mport".to_string(),
            mirror_url: "https://pkg.mport.example/mport".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, falling back to defaults for any key
    /// the file omits and for the file being entirely absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed as TOML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Ok(Self::default());
        };
        let settings = toml::from_str(&contents)?;
        Ok(settings)
    }

    /// The live database path under `db_root`.
    pub fn db_path(&self) -> std::path::PathBuf {
        Path::new(&self.db_root).join("master.db")
    }

    /// The bundle download cache directory under `db_root`.
    pub fn downloads_dir(&self) -> std::path::PathBuf {
        Path::new(&self.db_root).join("downloads")
    }

    /// The cached index directory under `db_root`.
    pub fn index_dir(&self) -> std::path::PathBuf {
        Path::new(&self.db_root).join("index")
    }

    /// The per-package hook-script directory under `db_root`.
    pub fn infrastructure_dir(&self, name: &str, version: &str) -> std::path::PathBuf {
        Path::new(&self.db_root).join("infrastructure").join(format!("{name}-{version}"))
    }
}
