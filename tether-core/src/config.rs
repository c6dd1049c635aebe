//! Project configuration (`tether.yaml`).
//!
//! # Layout
//!
//! ```text
//! <project>/
//!   tether.yaml           (this file)
//!   .tether/cache/        (per-type content-hash caches, owned by tether-sync)
//! ```
//!
//! ```yaml
//! solution_id: abc123
//! remote:
//!   url: https://api.example.com/solution/abc123
//!   page_size: 100
//! types:
//!   endpoints:
//!     location: routes
//!     include: ["**/*.lua"]
//!     exclude: ["**/*_test.lua"]
//! ```
//!
//! Every function takes an explicit project root; nothing here reads the
//! working directory on its own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// File name of the project config.
pub const CONFIG_FILE: &str = "tether.yaml";

/// Environment variable overriding `remote.url`.
pub const ENV_REMOTE_URL: &str = "TETHER_REMOTE_URL";

const DEFAULT_PAGE_SIZE: usize = 100;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Root of `tether.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_id: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Per-type overrides keyed by type name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, TypeConfig>,
}

/// Where the remote service lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Scan overrides for one type. Unset fields fall back to the type's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TypeConfig {
    /// Directory or file, relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl ProjectConfig {
    /// The solution identifier; required for any sync.
    pub fn solution_id(&self) -> Result<&str, ConfigError> {
        match self.solution_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(ConfigError::Missing {
                field: "solution_id",
            }),
        }
    }

    /// The remote URL; required for any sync.
    pub fn remote_url(&self) -> Result<&str, ConfigError> {
        match self.remote.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(ConfigError::Missing { field: "remote.url" }),
        }
    }

    pub fn type_config(&self, name: &str) -> Option<&TypeConfig> {
        self.types.get(name)
    }

    /// Check every setting a sync run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.solution_id()?;
        self.remote_url()?;
        if self.remote.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "remote.page_size",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_REMOTE_URL).filter(|u| !u.is_empty()) {
            self.remote.url = Some(url);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<root>/tether.yaml`: pure, no I/O.
pub fn config_path_at(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Walk up from `start` to the first directory holding `tether.yaml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut dir = Some(start);
    while let Some(candidate) = dir {
        if config_path_at(candidate).is_file() {
            return Ok(candidate.to_path_buf());
        }
        dir = candidate.parent();
    }
    Err(ConfigError::NotFound {
        path: config_path_at(start),
    })
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load `<root>/tether.yaml`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = config_path_at(root);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Atomically save `<root>/tether.yaml`.
///
/// Write flow: serialize → `tether.yaml.tmp` sibling → `rename`.
pub fn save_at(root: &Path, config: &ProjectConfig) -> Result<(), ConfigError> {
    let path = config_path_at(root);
    std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
    let tmp = path.with_file_name(format!("{CONFIG_FILE}.tmp"));

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
