// THEORY:
// Configuration for the dashboard server: a single TOML file, every section
// optional. The server runs with zero config, a missing file yields the
// built-in defaults.
//
// Config file location, in priority order:
// 1.  `--config <path>` on the command line
// 2.  `$HOME_DASHBOARD_CONFIG`
// 3.  `./dashboard.toml`

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use home_dashboard::core_modules::dispatcher::DispatchConfig;
use home_dashboard::{Conversion, DitherAlgorithm, RefreshPolicy, SchedulerConfig, Slot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "HOME_DASHBOARD_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub server: ServerSection,
    pub refresh: SchedulerConfig,
    pub dispatch: DispatchConfig,
    pub browser: BrowserConfig,
    pub slots: Vec<SlotConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            refresh: SchedulerConfig::default(),
            dispatch: DispatchConfig::default(),
            browser: BrowserConfig::default(),
            slots: default_slots(),
        }
    }
}

impl DashboardConfig {
    /// Loads from the first location in the priority order that applies.
    pub fn load(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path(cli_path))
    }

    /// Loads from `path`, or returns the defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config file found at {}, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        log::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_path {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));

        let refresh = &self.refresh;
        for (name, secs) in [
            ("refresh.interval_secs", refresh.interval_secs),
            ("refresh.fetch_timeout_secs", refresh.fetch_timeout_secs),
            ("refresh.rasterize_timeout_secs", refresh.rasterize_timeout_secs),
        ] {
            if secs == 0 {
                return invalid(format!("{name} must be greater than zero"));
            }
        }

        if !refresh.hybrid.is_valid() {
            return invalid(format!(
                "refresh.hybrid.low ({}) must be below refresh.hybrid.high ({})",
                refresh.hybrid.low, refresh.hybrid.high
            ));
        }

        let dispatch = &self.dispatch;
        if !dispatch.window().is_valid() {
            return invalid(format!(
                "dispatch.priority_from ({}) must be before dispatch.priority_to ({})",
                dispatch.priority_from, dispatch.priority_to
            ));
        }
        if dispatch.rotation.is_empty() {
            return invalid("dispatch.rotation must name at least one slot".to_string());
        }
        if dispatch.rotation.contains(&dispatch.priority_slot) {
            return invalid(format!(
                "dispatch.rotation must not contain the priority slot `{}`",
                dispatch.priority_slot
            ));
        }

        if self.browser.width == 0 || self.browser.height == 0 {
            return invalid(format!(
                "browser size must be non-zero, got {}x{}",
                self.browser.width, self.browser.height
            ));
        }

        let mut seen = HashSet::new();
        for slot in &self.slots {
            if !seen.insert(slot.slot) {
                return invalid(format!("slot `{}` is configured twice", slot.slot));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// The headless browser used to rasterize HTML slots. Its window size is also
/// the panel size that photos and charts are rendered at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    pub command: String,
    pub width: u32,
    pub height: u32,
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            command: "chromium".to_string(),
            width: 800,
            height: 480,
            extra_args: vec!["--no-sandbox".to_string()],
        }
    }
}

/// Where a slot's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A pre-rendered HTML document, rasterized by the browser.
    Html { path: PathBuf },
    /// A still photo, cropped and scaled to the panel.
    Photo { path: PathBuf },
    /// A JSON array of prices, drawn as a line chart.
    Chart { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotConfig {
    pub slot: Slot,
    pub source: SourceConfig,
    #[serde(default)]
    pub conversion: Conversion,
    #[serde(default)]
    pub policy: RefreshPolicy,
}

fn html_slot(slot: Slot) -> SlotConfig {
    SlotConfig {
        slot,
        source: SourceConfig::Html {
            path: PathBuf::from(format!("templates/{slot}.html")),
        },
        conversion: Conversion::default(),
        policy: RefreshPolicy::EveryTick,
    }
}

pub fn default_slots() -> Vec<SlotConfig> {
    vec![
        html_slot(Slot::Transport),
        html_slot(Slot::Weather),
        html_slot(Slot::Quote),
        html_slot(Slot::Calendar),
        SlotConfig {
            slot: Slot::Photo,
            source: SourceConfig::Photo {
                path: PathBuf::from("assets/photo.jpg"),
            },
            conversion: Conversion::Dither {
                algorithm: DitherAlgorithm::FloydSteinberg,
                invert: true,
            },
            policy: RefreshPolicy::UntilPopulated,
        },
        SlotConfig {
            slot: Slot::Stocks,
            source: SourceConfig::Chart {
                path: PathBuf::from("data/stocks.json"),
            },
            conversion: Conversion::Direct,
            policy: RefreshPolicy::EveryTick,
        },
    ]
}
