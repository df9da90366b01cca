//! Configuration file support for Helmit
//!
//! Loads client configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.helmitrc.json` in project root
//! 3. `helmit.config.json` in project root
//! 4. `"helmit"` key in `package.json`
//!
//! All fields are optional. The `HELMIT_BASE_URL` environment variable and CLI
//! flags take precedence over config file values.

use crate::classify::LabelSelection;
use crate::client::{ClientOptions, EndpointLayout, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::labels::{LABEL_THRESHOLD, TOP_LABELS};
use crate::risk::RiskThresholds;
use crate::session::{SessionSettings, DEFAULT_FORECAST_DAYS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `base_url`
pub const BASE_URL_ENV: &str = "HELMIT_BASE_URL";

/// Upper bound on requested forecast days
const MAX_FORECAST_DAYS: u32 = 30;

/// Helmit configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HelmitConfig {
    /// Backend base URL (default: http://localhost:8000)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Route family exposed by the backend (default: api)
    #[serde(default)]
    pub layout: Option<EndpointLayout>,

    /// Per-request timeout in seconds (default: 10)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Days requested from the forecast endpoint (default: 3)
    #[serde(default)]
    pub forecast_days: Option<u32>,

    /// Minimum label probability reported in chat (default: 0.10)
    #[serde(default)]
    pub label_threshold: Option<f64>,

    /// Maximum labels reported per message (default: 3)
    #[serde(default)]
    pub top_labels: Option<usize>,

    /// Custom tier thresholds (percentages)
    #[serde(default)]
    pub thresholds: Option<ThresholdConfig>,
}

/// Custom tier thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Percentages above this are at least medium (default: 40)
    pub medium: Option<f64>,
    /// Percentages above this are high (default: 70)
    pub high: Option<f64>,
}

/// Resolved configuration with every default applied
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub layout: EndpointLayout,
    pub timeout: Duration,
    pub forecast_days: u32,
    pub label_threshold: f64,
    pub top_labels: usize,
    pub thresholds: RiskThresholds,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl HelmitConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref url) = self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("base_url must start with http:// or https:// (got {})", url);
            }
        }

        if let Some(timeout) = self.timeout_secs {
            if timeout == 0 {
                anyhow::bail!("timeout_secs must be positive (got {})", timeout);
            }
        }

        if let Some(days) = self.forecast_days {
            if days == 0 || days > MAX_FORECAST_DAYS {
                anyhow::bail!(
                    "forecast_days must be between 1 and {} (got {})",
                    MAX_FORECAST_DAYS,
                    days
                );
            }
        }

        if let Some(threshold) = self.label_threshold {
            if !(0.0..1.0).contains(&threshold) {
                anyhow::bail!(
                    "label_threshold must be in [0, 1) (got {})",
                    threshold
                );
            }
        }

        if let Some(top) = self.top_labels {
            if top == 0 {
                anyhow::bail!("top_labels must be at least 1 (got {})", top);
            }
        }

        // Validate thresholds are in range and ordered
        if let Some(ref t) = self.thresholds {
            let defaults = RiskThresholds::default();
            let medium = t.medium.unwrap_or(defaults.medium);
            let high = t.high.unwrap_or(defaults.high);

            for (name, val) in [("medium", medium), ("high", high)] {
                if !(0.0..=100.0).contains(&val) {
                    anyhow::bail!("thresholds.{} must be in [0, 100] (got {})", name, val);
                }
            }
            if medium >= high {
                anyhow::bail!(
                    "thresholds.medium ({}) must be less than thresholds.high ({})",
                    medium,
                    high
                );
            }
        }

        Ok(())
    }

    /// Resolve config, applying defaults
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let defaults = RiskThresholds::default();
        let thresholds = match &self.thresholds {
            Some(t) => RiskThresholds {
                medium: t.medium.unwrap_or(defaults.medium),
                high: t.high.unwrap_or(defaults.high),
            },
            None => defaults,
        };

        Ok(ResolvedConfig {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            layout: self.layout.unwrap_or_default(),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            forecast_days: self.forecast_days.unwrap_or(DEFAULT_FORECAST_DAYS),
            label_threshold: self.label_threshold.unwrap_or(LABEL_THRESHOLD),
            top_labels: self.top_labels.unwrap_or(TOP_LABELS),
            thresholds,
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        HelmitConfig::default().resolve()
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            layout: self.layout,
            timeout: self.timeout,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            thresholds: self.thresholds,
            labels: LabelSelection {
                threshold: self.label_threshold,
                top: self.top_labels,
            },
            forecast_days: self.forecast_days,
        }
    }

    /// Apply a base URL override (environment or CLI flag)
    pub fn with_base_url(mut self, base_url: Option<String>) -> Result<Self> {
        if let Some(url) = base_url {
            HelmitConfig {
                base_url: Some(url.clone()),
                ..Default::default()
            }
            .validate()
            .context("invalid base URL override")?;
            self.base_url = url;
        }
        Ok(self)
    }
}

/// Discover and load a config file from the project root
///
/// Search order:
/// 1. `.helmitrc.json`
/// 2. `helmit.config.json`
/// 3. `"helmit"` key in `package.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(HelmitConfig, PathBuf)>> {
    // 1. .helmitrc.json
    let rc_path = project_root.join(".helmitrc.json");
    if rc_path.exists() {
        let config = load_config_file(&rc_path)?;
        return Ok(Some((config, rc_path)));
    }

    // 2. helmit.config.json
    let config_path = project_root.join("helmit.config.json");
    if config_path.exists() {
        let config = load_config_file(&config_path)?;
        return Ok(Some((config, config_path)));
    }

    // 3. package.json "helmit" key
    let pkg_path = project_root.join("package.json");
    if pkg_path.exists() {
        if let Some(config) = load_from_package_json(&pkg_path)? {
            return Ok(Some((config, pkg_path)));
        }
    }

    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<HelmitConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: HelmitConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load helmit config from the "helmit" key in package.json
fn load_from_package_json(path: &Path) -> Result<Option<HelmitConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let pkg: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    match pkg.get("helmit") {
        Some(helmit_value) => {
            let config: HelmitConfig = serde_json::from_value(helmit_value.clone())
                .with_context(|| format!("invalid helmit config in {}", path.display()))?;
            config
                .validate()
                .with_context(|| format!("invalid helmit config in {}", path.display()))?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

/// Load and resolve config for a project
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from the project root.
/// Returns default config if nothing is found.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(project_root)? {
            Some((config, path)) => (config, Some(path)),
            None => (HelmitConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}
