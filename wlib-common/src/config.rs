//! Configuration loading and resolution
//!
//! Settings resolve in priority order: command-line argument, then
//! environment variable, then TOML config file, then compiled default.
//! The service starts with zero configuration on a fresh machine.

use crate::registry::VerifyPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:5780";

/// Display names that bypass phone verification (library-owned accounts
/// lending house wheels). Matching is trimmed and case-insensitive;
/// their derived lender/member ids stay empty.
#[derive(Debug, Clone)]
pub struct SystemAccounts(Vec<String>);

impl SystemAccounts {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, display_name: &str) -> bool {
        let name = display_name.trim();
        self.0.iter().any(|a| a.trim().eq_ignore_ascii_case(name))
    }
}

impl Default for SystemAccounts {
    fn default() -> Self {
        Self::new(["SFF Admin", "SFF Library"])
    }
}

/// On-disk TOML layout (`<config dir>/wlib/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub bind: Option<String>,
    pub database_path: Option<String>,
    pub system_accounts: Option<Vec<String>>,
    /// "allow" (default) or "deny"
    pub verification_policy: Option<String>,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub database_path: PathBuf,
    pub system_accounts: SystemAccounts,
    pub verify_policy: VerifyPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            database_path: default_database_path(),
            system_accounts: SystemAccounts::default(),
            verify_policy: VerifyPolicy::default(),
        }
    }
}

/// Command-line values that outrank every other source
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub database_path: Option<PathBuf>,
}

/// Resolve the full configuration from CLI > ENV > TOML > defaults.
pub fn resolve(overrides: &ConfigOverrides) -> Result<Config> {
    let file = load_toml_config()?;
    let file = file.unwrap_or_default();

    let bind = overrides
        .bind
        .clone()
        .or_else(|| std::env::var("WLIB_BIND").ok())
        .or(file.bind)
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    let database_path = overrides
        .database_path
        .clone()
        .or_else(|| std::env::var("WLIB_DATABASE_PATH").ok().map(PathBuf::from))
        .or_else(|| file.database_path.map(PathBuf::from))
        .unwrap_or_else(default_database_path);

    let system_accounts = std::env::var("WLIB_SYSTEM_ACCOUNTS")
        .ok()
        .map(|v| {
            SystemAccounts::new(
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            )
        })
        .or_else(|| file.system_accounts.map(SystemAccounts::new))
        .unwrap_or_default();

    let verify_policy = std::env::var("WLIB_VERIFY_POLICY")
        .ok()
        .or(file.verification_policy)
        .map(|v| parse_policy(&v))
        .unwrap_or_default();

    Ok(Config {
        bind,
        database_path,
        system_accounts,
        verify_policy,
    })
}

fn parse_policy(value: &str) -> VerifyPolicy {
    match value.trim().to_ascii_lowercase().as_str() {
        "deny" => VerifyPolicy::deny(),
        "allow" => VerifyPolicy::allow(),
        other => {
            warn!("Unknown verification policy {:?}, using allow", other);
            VerifyPolicy::allow()
        }
    }
}

/// Read the TOML config file if one exists. A missing file is fine; a
/// malformed one is a configuration error.
fn load_toml_config() -> Result<Option<TomlConfig>> {
    let Some(path) = config_file_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    Ok(Some(config))
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wlib").join("config.toml"))
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("wlib"))
        .unwrap_or_else(|| PathBuf::from("./wlib_data"))
        .join("wlib.db")
}
