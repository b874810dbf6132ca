// src/core/config_manager.rs
//! Unified configuration: defaults, optional config.yaml, then environment overrides

use crate::render::devtools::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_DEVTOOLS_URL};
use crate::render::{
    RenderError, RenderJob, DEFAULT_READY_SELECTOR, DEFAULT_READY_TIMEOUT, DEFAULT_USER_AGENT,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_DATASET_PATH: &str = "data.json";
pub const DEFAULT_OUTPUT_PATH: &str = "prescription.pdf";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub browser: BrowserConfig,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    pub dataset_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserConfig {
    pub devtools_url: String,
    pub user_agent: String,
    pub ready_selector: String,
    pub ready_timeout: Duration,
    pub command_timeout: Duration,
}

impl BrowserConfig {
    /// Render job for `target` carrying the configured readiness gate and identity.
    pub fn job_for(&self, target: &str) -> Result<RenderJob, RenderError> {
        Ok(RenderJob::new(target)?
            .with_selector(self.ready_selector.clone())
            .with_ready_timeout(self.ready_timeout)
            .with_user_agent(self.user_agent.clone()))
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            devtools_url: DEFAULT_DEVTOOLS_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ready_selector: DEFAULT_READY_SELECTOR.to_string(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// One environment section of config.yaml. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileSettings {
    port: Option<u16>,
    dataset_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    devtools_url: Option<String>,
    user_agent: Option<String>,
    ready_selector: Option<String>,
    ready_timeout_secs: Option<u64>,
    command_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    local: FileSettings,
    #[serde(default)]
    production: FileSettings,
}

impl ConfigManager {
    /// Load all configuration for the current process
    pub fn load() -> Result<Self> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string());
        info!("Loading configuration for environment: {}", environment);

        let base_dir = std::env::current_dir().context("Failed to get current directory")?;
        let settings = Self::load_file(&base_dir.join(CONFIG_FILE), &environment)?;

        Self::build(settings, |key| std::env::var(key).ok(), &base_dir)
    }

    fn load_file(path: &Path, environment: &str) -> Result<FileSettings> {
        if !path.exists() {
            return Ok(FileSettings::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        info!("Using configuration file {}", path.display());
        Ok(match environment {
            "production" => file.production,
            _ => file.local,
        })
    }

    fn build(
        settings: FileSettings,
        env: impl Fn(&str) -> Option<String>,
        base_dir: &Path,
    ) -> Result<Self> {
        let port = match env("ROCKET_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("ROCKET_PORT must be a valid port number"))?,
            None => settings.port.unwrap_or(DEFAULT_PORT),
        };

        let dataset_path = env("DATASET_PATH")
            .map(PathBuf::from)
            .or(settings.dataset_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH));
        let output_path = env("RENDER_OUTPUT_PATH")
            .map(PathBuf::from)
            .or(settings.output_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));

        let ready_timeout = match env("READY_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("READY_TIMEOUT_SECS must be a number of seconds"))?,
            ),
            None => settings
                .ready_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_READY_TIMEOUT),
        };
        if ready_timeout.is_zero() {
            anyhow::bail!("Readiness timeout must be greater than zero");
        }

        let defaults = BrowserConfig::default();
        let browser = BrowserConfig {
            devtools_url: env("DEVTOOLS_URL")
                .or(settings.devtools_url)
                .unwrap_or(defaults.devtools_url),
            user_agent: env("RENDER_USER_AGENT")
                .or(settings.user_agent)
                .unwrap_or(defaults.user_agent),
            ready_selector: env("READY_SELECTOR")
                .or(settings.ready_selector)
                .unwrap_or(defaults.ready_selector),
            ready_timeout,
            command_timeout: settings
                .command_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.command_timeout),
        };

        Ok(Self {
            environment: EnvironmentConfig {
                dataset_path: resolve_path(base_dir, dataset_path),
                output_path: resolve_path(base_dir, output_path),
            },
            browser,
            port,
        })
    }
}

fn resolve_path(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn build_with(settings: FileSettings, vars: &[(&str, &str)]) -> Result<ConfigManager> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigManager::build(settings, |key| vars.get(key).cloned(), Path::new("/srv/app"))
    }

    #[test]
    fn test_defaults() {
        let config = build_with(FileSettings::default(), &[]).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.environment.dataset_path, PathBuf::from("/srv/app/data.json"));
        assert_eq!(
            config.environment.output_path,
            PathBuf::from("/srv/app/prescription.pdf")
        );
        assert_eq!(config.browser, BrowserConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let settings = FileSettings {
            port: Some(8000),
            dataset_path: Some(PathBuf::from("/data/jobs.json")),
            ready_selector: Some("main".to_string()),
            ready_timeout_secs: Some(4),
            ..FileSettings::default()
        };
        let config = build_with(
            settings,
            &[("ROCKET_PORT", "9191"), ("READY_SELECTOR", "footer")],
        )
        .unwrap();

        assert_eq!(config.port, 9191);
        assert_eq!(config.environment.dataset_path, PathBuf::from("/data/jobs.json"));
        assert_eq!(config.browser.ready_selector, "footer");
        assert_eq!(config.browser.ready_timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(build_with(FileSettings::default(), &[("ROCKET_PORT", "http")]).is_err());
        assert!(build_with(FileSettings::default(), &[("READY_TIMEOUT_SECS", "soon")]).is_err());
        assert!(build_with(FileSettings::default(), &[("READY_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn test_yaml_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "local:\n  port: 7000\nproduction:\n  port: 80\n  devtools_url: http://chrome:9222\n",
        )
        .unwrap();

        assert_eq!(ConfigManager::load_file(&path, "local").unwrap().port, Some(7000));
        let production = ConfigManager::load_file(&path, "production").unwrap();
        assert_eq!(production.port, Some(80));
        assert_eq!(production.devtools_url.as_deref(), Some("http://chrome:9222"));

        let missing = ConfigManager::load_file(&dir.path().join("absent.yaml"), "local").unwrap();
        assert!(missing.port.is_none());
    }

    #[test]
    fn test_job_for_applies_browser_settings() {
        let browser = BrowserConfig {
            ready_selector: "#content".to_string(),
            ready_timeout: Duration::from_secs(2),
            ..BrowserConfig::default()
        };
        let job = browser.job_for("https://www.wikipedia.org").unwrap();
        assert_eq!(job.selector, "#content");
        assert_eq!(job.ready_timeout, Duration::from_secs(2));
        assert!(browser.job_for("ftp://example.com").is_err());
    }
}
