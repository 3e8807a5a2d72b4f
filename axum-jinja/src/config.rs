//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: AXUM_JINJA_, nested keys separated by `__`)
//! 2. Config file: ./axum-jinja.toml, or the path given to [`Config::load_from`]
//! 3. Default values
//!
//! ```toml
//! [templates]
//! template_dir = "templates"
//! static_root_url = "/static"
//!
//! [logging]
//! level = "debug"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "axum-jinja.toml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "AXUM_JINJA_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Template environment configuration
    #[serde(default)]
    pub templates: TemplateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Template environment configuration
///
/// Mirrors the knobs of [`Setup`](crate::Setup); see
/// [`Setup::from_config`](crate::Setup::from_config).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory templates are loaded from
    #[serde(default)]
    pub template_dir: Option<PathBuf>,

    /// HTML-escape every template
    #[serde(default = "default_true")]
    pub autoescape: bool,

    /// Render on the blocking pool
    #[serde(default = "default_true")]
    pub enable_async: bool,

    /// Register the `url` and `static` helpers
    #[serde(default = "default_true")]
    pub default_helpers: bool,

    #[serde(default)]
    pub trim_blocks: bool,

    #[serde(default)]
    pub lstrip_blocks: bool,

    #[serde(default)]
    pub keep_trailing_newline: bool,

    /// Root URL for the `static()` helper
    #[serde(default)]
    pub static_root_url: Option<String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            autoescape: true,
            enable_async: true,
            default_helpers: true,
            trim_blocks: false,
            lstrip_blocks: false,
            keep_trailing_newline: false,
            static_root_url: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (trace, debug, info, warn, error, or a full filter directive)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from ./axum-jinja.toml and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file is not an error; defaults and environment variables
    /// still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading configuration from: {}", path.display());

        let config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Load from config file (if exists)
            .merge(Toml::file(path))
            // Override with environment variables
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
