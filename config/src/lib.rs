//! Relay configuration: `~/.relay/config.toml`, or the file named by `RELAY_CONFIG`.
//!
//! ```toml
//! [limits]
//! max_depth = 3
//! max_tokens = 20000
//! timeout_seconds = 120
//!
//! [adapter]
//! kind = "scripted"
//! script = "${HOME}/scripts/cards.json"
//!
//! [logging]
//! filter = "relay=debug"
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_types::Limits;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "RELAY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Missing { path }
            | ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub limits: Option<LimitsConfig>,
    pub adapter: Option<AdapterConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_depth: Option<u32>,
    pub max_tokens: Option<u64>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Interactive,
    Scripted,
    Automated,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterConfig {
    pub kind: Option<AdapterKind>,
    /// Script file for the scripted adapter. `${VAR}` references are expanded.
    pub script: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive string.
    pub filter: Option<String>,
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + len];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 3 + len..];
    }

    out.push_str(rest);
    out
}

impl RelayConfig {
    /// Load from the default location. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::read(path).map(Some)
    }

    /// Load a file named explicitly by the user, where a missing file is an error.
    pub fn load_required(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        Self::read(path)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// `RELAY_CONFIG` if set, else `~/.relay/config.toml`.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        dirs::home_dir().map(|home| home.join(".relay").join("config.toml"))
    }

    /// Default limits for the runner.
    #[must_use]
    pub fn limits(&self) -> Limits {
        let Some(limits) = &self.limits else {
            return Limits::unbounded();
        };
        Limits {
            max_depth: limits.max_depth,
            max_tokens: limits.max_tokens,
            timeout: limits.timeout_seconds.map(Duration::from_secs),
        }
    }

    #[must_use]
    pub fn adapter_kind(&self) -> Option<AdapterKind> {
        self.adapter.as_ref().and_then(|a| a.kind)
    }

    #[must_use]
    pub fn script_path(&self) -> Option<PathBuf> {
        self.adapter
            .as_ref()
            .and_then(|a| a.script.as_deref())
            .map(|raw| PathBuf::from(expand_env_vars(raw)))
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.filter.as_deref())
    }
}
