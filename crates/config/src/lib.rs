//! Layered configuration for unipkg.
//!
//! Values are merged, later layers winning:
//!
//! 1. built-in defaults;
//! 2. a configuration file: either an explicit path (TOML, YAML or JSON,
//!    chosen by extension) or `unipkg.toml` in the platform configuration
//!    directory, if it exists;
//! 3. environment variables prefixed with `UNIPKG_`, nested keys separated by
//!    `__` (`UNIPKG_EXTRACT__LIMITS__MAX_ASSET_COUNT=1000`).
//!
//! Extraction limits are normalized on load: non-positive values fall back to
//! their defaults and oversized values are clamped.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use unipkg_extract::{ExtractOptions, ExtractionLimits};
use unipkg_scan::{DEFAULT_CACHE_TTL, DEFAULT_MAX_SCAN_BYTES, ScanCache, ScanOptions};

pub const ENV_PREFIX: &str = "UNIPKG_";
pub const FILE_NAME: &str = "unipkg.toml";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extract: ExtractConfig,
    pub scan: ScanConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Sort assets into category folders instead of their package paths.
    pub organize_by_category: bool,
    /// Where temporary component files go; the system temp directory if unset.
    pub temp_dir: Option<PathBuf>,
    pub limits: ExtractionLimits,
}

impl ExtractConfig {
    pub fn options(&self) -> ExtractOptions {
        let options = ExtractOptions::default().organize_by_category(self.organize_by_category).limits(self.limits);
        match &self.temp_dir {
            Some(dir) => options.temp_dir(dir),
            None => options,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub cache_ttl_secs: u64,
    pub max_scan_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(), max_scan_bytes: DEFAULT_MAX_SCAN_BYTES }
    }
}

impl ScanConfig {
    pub fn options(&self) -> ScanOptions {
        ScanOptions::default().max_scan_bytes(self.max_scan_bytes)
    }

    pub fn cache(&self) -> ScanCache {
        ScanCache::new(self.options(), Duration::from_secs(self.cache_ttl_secs))
    }
}

/// `unipkg.toml` in the platform configuration directory.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "unipkg").map(|dirs| dirs.config_dir().join(FILE_NAME))
}

impl Config {
    /// Load configuration, reading `file` if given or the default file if it
    /// exists.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::figment(file)?.extract().or_raise(|| ErrorKind::Invalid)
    }

    /// The merged configuration sources, before extraction.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                merge_file(figment, path)?
            },
            None => match default_path() {
                Some(path) if path.is_file() => merge_file(figment, &path)?,
                _ => figment,
            },
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    tracing::debug!(path = %path.display(), "Reading configuration file");
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default().to_ascii_lowercase();
    Ok(match extension.as_str() {
        "toml" => figment.merge(Toml::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        "json" => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(extension)),
    })
}
