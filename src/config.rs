use crate::controller;
use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::{OnceLock, RwLock},
    time::Duration,
};

/// Globally accessible dashboard configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_refresh_interval_secs_value")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs_value")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cuisine_limit_value")]
    pub cuisine_limit: usize,
    #[serde(default = "default_sustainability_limit_value")]
    pub sustainability_limit: usize,
}

impl AppConfig {
    fn normalize(&mut self) {
        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        self.api_base_url = if trimmed.is_empty() {
            default_api_base_url()
        } else {
            trimmed.to_string()
        };
        if self.refresh_interval_secs == 0 {
            self.refresh_interval_secs = DEFAULT_REFRESH_INTERVAL_SECS;
        }
        self.refresh_interval_secs = self.refresh_interval_secs.min(MAX_REFRESH_INTERVAL_SECS);
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        if self.cuisine_limit == 0 {
            self.cuisine_limit = DEFAULT_CUISINE_LIMIT;
        }
        if self.sustainability_limit == 0 {
            self.sustainability_limit = DEFAULT_SUSTAINABILITY_LIMIT;
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    fn apply_api_url_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|url| !url.trim().is_empty()) {
            self.api_base_url = url;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cuisine_limit: DEFAULT_CUISINE_LIMIT,
            sustainability_limit: DEFAULT_SUSTAINABILITY_LIMIT,
        }
    }
}

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = controller::DEFAULT_REFRESH_INTERVAL.as_secs();
const MAX_REFRESH_INTERVAL_SECS: u64 = controller::MAX_REFRESH_INTERVAL.as_secs();
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CUISINE_LIMIT: usize = 20;
const DEFAULT_SUSTAINABILITY_LIMIT: usize = 10;
const API_URL_ENV: &str = "FORKSTAR_API_URL";
const CONFIG_FILE_PATH: &str = "config/dashboard.toml";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

static APP_CONFIG: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn config_lock() -> &'static RwLock<AppConfig> {
    APP_CONFIG.get_or_init(|| RwLock::new(AppConfig::default()))
}

/// Attempt to load configuration from disk. If loading fails, the in-memory config will be reset to defaults
/// and the error will be returned for the caller to surface if desired.
pub fn initialize() -> Result<()> {
    let (config, outcome) = resolve_config(&config_file_path(), env::var(API_URL_ENV).ok());
    let mut guard = config_lock()
        .write()
        .map_err(|_| eyre!("configuration lock poisoned"))?;
    *guard = config;
    outcome
}

/// Retrieve a clone of the current configuration.
pub fn current() -> AppConfig {
    match config_lock().read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Path to the configuration file, relative to the working directory.
pub fn config_file_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_PATH)
}

pub(crate) fn load_config_from_path(path: &Path) -> Result<AppConfig> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let mut config: AppConfig = toml::from_str(&contents)
                .wrap_err_with(|| format!("failed to parse configuration at {}", path.display()))?;
            config.normalize();
            Ok(config)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(err) => Err(eyre!(
            "failed to read configuration at {}: {}",
            path.display(),
            err
        )),
    }
}

/// Config file layered with the `FORKSTAR_API_URL` value. A load failure still
/// yields a usable config alongside the error.
fn resolve_config(path: &Path, api_url_override: Option<String>) -> (AppConfig, Result<()>) {
    let (mut config, outcome) = match load_config_from_path(path) {
        Ok(config) => (config, Ok(())),
        Err(err) => (AppConfig::default(), Err(err)),
    };
    config.apply_api_url_override(api_url_override);
    config.normalize();
    (config, outcome)
}

const fn default_refresh_interval_secs_value() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

const fn default_request_timeout_secs_value() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_cuisine_limit_value() -> usize {
    DEFAULT_CUISINE_LIMIT
}

const fn default_sustainability_limit_value() -> usize {
    DEFAULT_SUSTAINABILITY_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn temp_config(name: &str, contents: &str) -> (PathBuf, PathBuf) {
        let mut dir = std::env::temp_dir();
        let unique = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("forkstar-config-{name}-{unique}"));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dashboard.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("forkstar-config-does-not-exist/dashboard.toml");

        let config = load_config_from_path(&path).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.refresh_interval(), Duration::from_millis(300_000));
    }

    #[test]
    fn partial_file_fills_defaults_and_normalizes() {
        let (dir, path) = temp_config(
            "partial",
            "api_base_url = \"https://api.forkandstar.test/\"\nrefresh_interval_secs = 0\ncuisine_limit = 5\n",
        );

        let config = load_config_from_path(&path).unwrap();

        assert_eq!(config.api_base_url, "https://api.forkandstar.test");
        assert_eq!(config.refresh_interval_secs, 300);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.cuisine_limit, 5);
        assert_eq!(config.sustainability_limit, 10);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (dir, path) = temp_config("malformed", "refresh_interval_secs = \"soon\"");

        let err = load_config_from_path(&path).unwrap_err();

        assert!(err.to_string().contains("failed to parse configuration"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn oversized_refresh_interval_is_capped() {
        let (dir, path) = temp_config("oversized", "refresh_interval_secs = 9223372036854775807\n");

        let config = load_config_from_path(&path).unwrap();

        assert_eq!(config.refresh_interval_secs, 86_400);
        assert_eq!(config.refresh_interval(), controller::MAX_REFRESH_INTERVAL);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_file_still_resolves_to_defaults() {
        let (dir, path) = temp_config("fallback", "cuisine_limit = [");

        let (config, outcome) = resolve_config(&path, None);

        assert!(outcome.is_err());
        assert_eq!(config, AppConfig::default());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn api_url_override_replaces_file_value() {
        let (dir, path) = temp_config("override", "api_base_url = \"http://from-file:8000\"\n");

        let (config, outcome) =
            resolve_config(&path, Some("https://analytics.forkandstar.test/".to_string()));
        assert!(outcome.is_ok());
        assert_eq!(config.api_base_url, "https://analytics.forkandstar.test");

        let (config, _) = resolve_config(&path, Some("   ".to_string()));
        assert_eq!(config.api_base_url, "http://from-file:8000");

        fs::remove_dir_all(&dir).unwrap();
    }
}
