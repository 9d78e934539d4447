// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{Result, SyncError};
use crate::repository::RetryPolicy;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";
const HOME_ENV_VAR: &str = "VERSYNC_HOME";
const ENV_PREFIX: &str = "VERSYNC";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NEGATIVE_TTL_MINUTES: u64 = 60;
const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    #[serde(skip)]
    home: PathBuf,

    #[serde(default)]
    pub repositories: RepositorySettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub refresh: RefreshSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepositorySettings {
    /// Directories holding repository definition files. Defaults to
    /// `$VERSYNC_HOME/repositories` when empty.
    #[serde(default)]
    pub config_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// TTL applied to "package not found" API responses.
    #[serde(default = "default_negative_ttl_minutes")]
    pub negative_ttl_minutes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            negative_ttl_minutes: DEFAULT_NEGATIVE_TTL_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Upper bound on concurrent package lookups within one file.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub file_timeout_secs: Option<u64>,

    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    #[serde(default = "default_true")]
    pub backup: bool,

    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Keep backup files after a successful, validated write.
    #[serde(default)]
    pub keep_backups: bool,

    /// Report close (case-insensitive or prefix) matches from bulk indexes.
    #[serde(default)]
    pub inexact_fallback: bool,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            file_timeout_secs: None,
            run_timeout_secs: None,
            backup: true,
            backup_dir: None,
            keep_backups: false,
            inexact_fallback: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_negative_ttl_minutes() -> u64 {
    DEFAULT_NEGATIVE_TTL_MINUTES
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl SyncConfig {
    /// Load configuration layered as defaults < `config.toml` < `VERSYNC_*` environment.
    pub fn new(home: PathBuf) -> Result<Self> {
        let config_path = home.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            log::debug!("Loading config from {config_path:?}");
        } else {
            log::debug!("Config file not found at {config_path:?}, using defaults");
        }

        let settings = Config::builder()
            .add_source(
                File::from(config_path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SyncError::ConfigFile(format!("Failed to load {CONFIG_FILE_NAME}: {e}")))?;

        let mut config: SyncConfig = settings
            .try_deserialize()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        config.home = home;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.refresh.concurrency == 0 {
            return Err(SyncError::InvalidConfig(
                "refresh.concurrency must be at least 1".to_string(),
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        Ok(())
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .directory
            .clone()
            .unwrap_or_else(|| self.home.join("cache"))
    }

    pub fn repository_dirs(&self) -> Vec<PathBuf> {
        if self.repositories.config_dirs.is_empty() {
            vec![self.home.join("repositories")]
        } else {
            self.repositories.config_dirs.clone()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.home.join(CONFIG_FILE_NAME);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| SyncError::ConfigFile(format!("Failed to serialize config: {e}")))?;

        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {config_path:?}");
        Ok(())
    }
}

/// Resolve the versync home directory and load the configuration from it.
pub fn new_sync_config() -> Result<SyncConfig> {
    let home = match std::env::var_os(HOME_ENV_VAR) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => dirs::home_dir()
            .ok_or_else(|| {
                SyncError::InvalidConfig("Could not determine home directory".to_string())
            })?
            .join(".versync"),
    };
    SyncConfig::new(home)
}
