//! Layered settings: defaults, config files, `CACHETOOL_` environment,
//! command-line flags (highest).

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;

use cachetool_core::application::constants::{DEFAULT_PHP_BINARY, DEFAULT_TIMEOUT};
use cachetool_core::CacheToolError;

pub const SYSTEM_CONFIG_FILE: &str = "/etc/cachetool.yml";
pub const USER_CONFIG_FILE: &str = "cachetool.yml";
pub const LOCAL_CONFIG_FILE: &str = ".cachetool.yml";
pub const ENV_PREFIX: &str = "CACHETOOL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// `cli` or `fastcgi`
    pub adapter: String,
    /// FastCGI connection string; empty or missing means discovery
    pub fastcgi: Option<String>,
    pub timeout_secs: u64,
    pub keep_alive: bool,
    /// Cross-process sockets are unsupported; setting this only logs a warning
    pub persistent: bool,
    pub php_binary: String,
    pub temp_dir: Option<String>,
}

/// Values taken from command-line flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub adapter: Option<String>,
    pub fastcgi: Option<String>,
    pub temp_dir: Option<String>,
    pub php_binary: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Load from the standard file locations relative to `cwd`
    pub fn load(overrides: &Overrides, cwd: &Path) -> Result<Self, CacheToolError> {
        Self::layered(&config_files(cwd), overrides)
    }

    /// Load from an explicit list of files, lowest precedence first.
    /// Missing files are skipped.
    pub fn layered(files: &[PathBuf], overrides: &Overrides) -> Result<Self, CacheToolError> {
        build(files, overrides).map_err(|e| CacheToolError::Configuration(e.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connection string with `~` expanded, `None` when discovery applies
    pub fn fastcgi_endpoint(&self) -> Option<String> {
        self.fastcgi
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| shellexpand::tilde(s).into_owned())
    }

    pub fn temp_dir(&self) -> Option<PathBuf> {
        self.temp_dir
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| PathBuf::from(shellexpand::tilde(s).into_owned()))
    }

    pub fn php_binary(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.php_binary).into_owned())
    }
}

fn build(files: &[PathBuf], overrides: &Overrides) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .set_default("adapter", "fastcgi")?
        .set_default("timeout_secs", DEFAULT_TIMEOUT.as_secs() as i64)?
        .set_default("keep_alive", true)?
        .set_default("persistent", false)?
        .set_default("php_binary", DEFAULT_PHP_BINARY)?;

    for file in files {
        builder = builder.add_source(File::from(file.as_path()).required(false));
    }

    builder
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .set_override_option("adapter", overrides.adapter.clone())?
        .set_override_option("fastcgi", overrides.fastcgi.clone())?
        .set_override_option("temp_dir", overrides.temp_dir.clone())?
        .set_override_option("php_binary", overrides.php_binary.clone())?
        .set_override_option("timeout_secs", overrides.timeout_secs.map(|t| t as i64))?
        .build()?
        .try_deserialize()
}

/// System file, per-user file, then the nearest `.cachetool.yml` at or above `cwd`
pub fn config_files(cwd: &Path) -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(SYSTEM_CONFIG_FILE)];
    if let Some(dirs) = ProjectDirs::from("", "", "cachetool") {
        files.push(dirs.config_dir().join(USER_CONFIG_FILE));
    }
    if let Some(local) = find_upwards(cwd, LOCAL_CONFIG_FILE) {
        files.push(local);
    }
    files
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
