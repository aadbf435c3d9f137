//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use gwas_library::DatabaseOptions;
use serde::Deserialize;

/// Database file used when nothing else is configured.
pub const DEFAULT_DATABASE_PATH: &str = "gwas_library.db";

/// Environment variable overriding the database path.
pub const ENV_DATABASE_PATH: &str = "GWAS_LIBRARY_DB";
/// Environment variable overriding the manifest path.
pub const ENV_MANIFEST_PATH: &str = "GWAS_MANIFEST_PATH";
/// Environment variable overriding the phenotype catalog path.
pub const ENV_CATALOG_PATH: &str = "PHENOTYPE_CATALOG_PATH";

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// `SQLite` database file.
    pub database_path: Option<PathBuf>,
    /// GWAS manifest seeded at startup.
    pub manifest_path: Option<PathBuf>,
    /// Phenotype catalog JSON seeded at startup.
    pub catalog_path: Option<PathBuf>,
    /// Optional database pool max connections (1..=20).
    pub db_max_connections: Option<u32>,
    /// Optional database busy timeout in milliseconds.
    pub db_busy_timeout_ms: Option<u32>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(value) = self.db_max_connections
            && !(1..=20).contains(&value)
        {
            bail!("Invalid config value for `db_max_connections`: {value}. Expected range: 1..=20");
        }
        if let Some(value) = self.db_busy_timeout_ms
            && value > 120_000
        {
            bail!(
                "Invalid config value for `db_busy_timeout_ms`: {value}. Expected range: 0..=120000"
            );
        }
        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Config path that was consulted, if any.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/gwas-library/config.toml`
/// 2. `$HOME/.config/gwas-library/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("gwas-library")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("gwas-library")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn env_var_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Values supplied on the command line; these win over everything else.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database_path: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
}

/// Effective runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub database: DatabaseOptions,
}

impl Settings {
    /// Merges config file, environment and CLI values.
    ///
    /// Priority: CLI > environment > config file > defaults.
    #[must_use]
    pub fn resolve(file: Option<&FileConfig>, cli: CliOverrides) -> Self {
        Self::resolve_with_env(file, cli, env_var_non_empty)
    }

    fn resolve_with_env(
        file: Option<&FileConfig>,
        cli: CliOverrides,
        env_lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let file = file.cloned().unwrap_or_default();
        let pick = |cli_value: Option<PathBuf>, env_name: &str, file_value: Option<PathBuf>| {
            cli_value
                .or_else(|| env_lookup(env_name).map(PathBuf::from))
                .or(file_value)
        };

        let database_path = pick(cli.database_path, ENV_DATABASE_PATH, file.database_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));
        let manifest_path = pick(cli.manifest_path, ENV_MANIFEST_PATH, file.manifest_path);
        let catalog_path = pick(cli.catalog_path, ENV_CATALOG_PATH, file.catalog_path);

        let defaults = DatabaseOptions::default();
        let database = DatabaseOptions {
            max_connections: file.db_max_connections.unwrap_or(defaults.max_connections),
            busy_timeout_ms: file.db_busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
        };

        Self {
            database_path,
            manifest_path,
            catalog_path,
            database,
        }
    }
}
