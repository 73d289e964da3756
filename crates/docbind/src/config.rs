use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::references::ResolverSettings;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "DOCBIND_CONFIG";

/// Top-level configuration, read from YAML:
///
/// ```yaml
/// bindings:
///   resolve_references: true
///   read_timeout_ms: 5000
/// logging:
///   filter: "docbind=debug"
///   ansi: false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocbindConfig {
    pub bindings: BindingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Replace reference fields with their targets before publishing
    pub resolve_references: bool,
    /// Upper bound for one reference point read
    pub read_timeout_ms: Option<u64>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            resolve_references: true,
            read_timeout_ms: None,
        }
    }
}

impl BindingConfig {
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            enabled: self.resolve_references,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence
    pub filter: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

impl DocbindConfig {
    /// Load from `explicit`, else `$DOCBIND_CONFIG`, else
    /// `~/.config/docbind/config.yaml`, else defaults.
    ///
    /// An explicitly named file (argument or variable) must exist; the default
    /// location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from_file(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e)
        })?;

        Self::from_yaml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML {}: {}", path.display(), e))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file is a valid, all-default config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            let mut path = PathBuf::from(home);
            path.push(".config");
            path.push("docbind");
            path.push("config.yaml");
            path
        })
    }
}
