//! Configuration loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `<platform config dir>/vgal/config.toml`
//! 4. Built-in defaults (fallback)
//!
//! The TOML file is a bootstrap file only: it is read once at startup.

use crate::params::GalleryParams;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VGAL_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resource manager tunables (`[capacity]`, `[retry]`, `[cleanup]`, `[visibility]`)
    #[serde(flatten)]
    pub params: GalleryParams,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    BuiltInDefaults,
}

/// Resolve the config file to read, following the priority order above
///
/// Explicit choices (CLI argument, environment variable) are returned even
/// when the file does not exist so the caller can report it; the platform
/// default location is only returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    default_config_path().filter(|path| path.exists())
}

/// Platform default config file location (`~/.config/vgal/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vgal").join("config.toml"))
}

/// Parse and validate a config file
pub fn load_config_file(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Err(Error::NotFound(format!("config file {}", path.display())));
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Parse and validate TOML config text
pub fn parse_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig = toml::from_str(content)?;
    config.params.validate()?;
    Ok(config)
}

/// Load configuration following the resolution priority
///
/// Falls back to built-in defaults when no file is found at any location.
pub fn load_config(cli_arg: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
        Some(path) => {
            let config = load_config_file(&path)?;
            info!("Using config file {}", path.display());
            Ok((config, ConfigSource::File(path)))
        }
        None => {
            info!("No config file found, using built-in defaults");
            Ok((TomlConfig::default(), ConfigSource::BuiltInDefaults))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CapacityMode;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.params, GalleryParams::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
            [logging]
            level = "debug"

            [capacity]
            mode = "generous"

            [cleanup]
            throttle_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.params.capacity.mode, CapacityMode::Generous);
        assert_eq!(config.params.cleanup.throttle_ms, 500);
        assert_eq!(config.params.retry.max_attempts, 3);
        assert_eq!(config.params.capacity.generous.len(), 4);
    }

    #[test]
    fn test_custom_tiers() {
        let config = parse_config(
            r#"
            [[capacity.constrained]]
            max_items = 10
            max_loaded = 5
            max_concurrent_loading = 1

            [[capacity.constrained]]
            max_loaded = 3
            max_concurrent_loading = 1
            "#,
        )
        .unwrap();

        let tiers = config.params.capacity.tiers(CapacityMode::Constrained);
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[1].max_items, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_config("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = parse_config("[retry\nmax_attempts = 2").unwrap_err();
        assert!(matches!(err, Error::TomlParse(_)));
    }

    #[test]
    fn test_load_config_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[visibility]\nprefetch_margin = 2").unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.params.visibility.prefetch_margin, 2);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    #[serial]
    fn test_cli_argument_beats_environment() {
        std::env::set_var("VGAL_TEST_CONFIG_A", "/from/env.toml");
        let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")), "VGAL_TEST_CONFIG_A");
        std::env::remove_var("VGAL_TEST_CONFIG_A");
        assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));
    }

    #[test]
    #[serial]
    fn test_environment_used_without_cli_argument() {
        std::env::set_var("VGAL_TEST_CONFIG_B", "/from/env.toml");
        let resolved = resolve_config_path(None, "VGAL_TEST_CONFIG_B");
        std::env::remove_var("VGAL_TEST_CONFIG_B");
        assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));
    }
}
