//! Tool configuration.
//!
//! Configuration is optional: when the default file is absent the built-in
//! defaults apply and an info line says so. An explicitly requested file
//! must exist and parse.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::msr::DEFAULT_DEVICE_ROOT;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/zenctl/config.toml";

/// Runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZenctlConfig {
    /// Root of the per-CPU msr device tree.
    pub device_root: PathBuf,

    /// Refuse write operations when the CPU vendor is not AuthenticAMD.
    pub require_amd: bool,
}

impl Default for ZenctlConfig {
    fn default() -> Self {
        Self {
            device_root: PathBuf::from(DEFAULT_DEVICE_ROOT),
            require_amd: true,
        }
    }
}

/// Config error types
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read configuration {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid configuration {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl ZenctlConfig {
    /// Loads the configuration from `path`, or from [`DEFAULT_CONFIG_PATH`]
    /// when none is given. A missing default file yields the defaults; a
    /// missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) if source.kind() == io::ErrorKind::NotFound && !explicit => {
                log::info!("no configuration at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        log::info!("configuration loaded from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("zenctl-config-{name}-{}.toml", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_point_at_dev_cpu() {
        let config = ZenctlConfig::default();
        assert_eq!(config.device_root, Path::new("/dev/cpu"));
        assert!(config.require_amd);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = scratch_file("partial", "device_root = \"/tmp/fake-cpu\"\n");
        let config = ZenctlConfig::load(Some(&path)).unwrap();
        assert_eq!(config.device_root, Path::new("/tmp/fake-cpu"));
        assert!(config.require_amd);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn explicitly_requested_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("zenctl-config-definitely-missing.toml");
        assert!(matches!(
            ZenctlConfig::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let path = scratch_file("malformed", "device_root = [\n");
        assert!(matches!(
            ZenctlConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let path = scratch_file("unknown", "device_rot = \"/dev/cpu\"\n");
        assert!(matches!(
            ZenctlConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
        let _ = fs::remove_file(&path);
    }
}
