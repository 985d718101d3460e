use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DeleteBinding;

pub const DEFAULT_API_BASE_URL: &str = "https://nestjs-chatbot-backeb-api.desarrollo-software.xyz";
const DEFAULT_CONFIG_FILE: &str = "datadesk";
const ENV_PREFIX: &str = "DATADESK";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub ui: UiConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Transport-level timeout. The manager itself never times out calls.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    pub delete_binding: DeleteBinding,
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Keep the credential on disk between runs.
    pub remember: bool,
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("datadesk")
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
}

impl UiConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub filter: String,
    /// Where the TUI writes its log files.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl LogConfig {
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("datadesk")
                .join("logs")
        })
    }
}

impl Config {
    /// Load `.env`, then defaults < config file < `DATADESK_*` variables.
    ///
    /// The file is `datadesk.toml` in the working directory unless
    /// `DATADESK_CONFIG` names another one.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = env::var(format!("{}_CONFIG", ENV_PREFIX)).ok().map(PathBuf::from);
        Self::load(file.as_deref())
    }

    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::assemble(file, true)
    }

    /// Defaults and `file` only; the process environment is not consulted.
    #[cfg(test)]
    pub(crate) fn load_isolated(file: &Path) -> Result<Self> {
        Self::assemble(Some(file), false)
    }

    fn assemble(file: Option<&Path>, with_env: bool) -> Result<Self> {
        let file_source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = config::Config::builder()
            .set_default("api.base_url", DEFAULT_API_BASE_URL)?
            .set_default("api.delete_binding", "post")?
            .set_default("session.remember", true)?
            .set_default("ui.tick_rate_ms", 100)?
            .set_default("log.filter", "datadesk=info")?
            .add_source(file_source);
        if with_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let settings = builder
            .build()
            .context("Failed to assemble configuration")?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.api.base_url = cfg.api.base_url.trim_end_matches('/').to_string();
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[api]\nbase_url = \"http://localhost:4000/\"\ntimeout_secs = 15\ndelete_binding = \"delete\"\n\n[session]\nremember = false"
        )
        .unwrap();

        let cfg = Config::load_isolated(file.path()).unwrap();
        assert_eq!(cfg.api.base_url, "http://localhost:4000");
        assert_eq!(cfg.api.timeout(), Some(Duration::from_secs(15)));
        assert_eq!(cfg.api.delete_binding, DeleteBinding::DeleteWithBody);
        assert!(!cfg.session.remember);
        assert_eq!(cfg.ui.tick_rate_ms, 100);
        assert_eq!(cfg.log.filter, "datadesk=info");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/datadesk.toml"))).is_err());
    }
}
