//! Configuration for the studio gateway.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use studio_common::{TaskKind, TaskModule};

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upstream provider connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible provider.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Gateway-provisioned API key used for shared-lane tasks. Empty means
    /// callers must bring their own credential.
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout for upstream HTTP calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub models: ModelsConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout(),
            models: ModelsConfig::default(),
        }
    }
}

/// Upstream model names per work shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_analysis_model")]
    pub analysis: String,
    #[serde(default = "default_analysis_fast_model")]
    pub analysis_fast: String,
    #[serde(default = "default_image_model")]
    pub image: String,
    #[serde(default = "default_video_model")]
    pub video: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            analysis: default_analysis_model(),
            analysis_fast: default_analysis_fast_model(),
            image: default_image_model(),
            video: default_video_model(),
        }
    }
}

/// Dispatcher tuning: lane caps, module caps and per-kind timeouts.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DispatchConfig {
    #[serde(default)]
    pub lanes: LanesConfig,
    #[serde(default)]
    pub modules: ModuleCapsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

/// Concurrency caps for the two credential lanes.
#[derive(Debug, Clone, Deserialize)]
pub struct LanesConfig {
    /// Tasks running on the gateway-provisioned credential. Conservative,
    /// since every owner shares this upstream rate limit.
    #[serde(default = "default_shared_lane")]
    pub shared: usize,
    /// Tasks running on a caller-supplied credential.
    #[serde(default = "default_private_lane")]
    pub private: usize,
}

impl Default for LanesConfig {
    fn default() -> Self {
        Self {
            shared: default_shared_lane(),
            private: default_private_lane(),
        }
    }
}

/// Per-module concurrency caps, applied to shared-lane tasks only.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleCapsConfig {
    #[serde(default = "default_script_cap")]
    pub script: usize,
    #[serde(default = "default_module_cap")]
    pub storyboard: usize,
    #[serde(default = "default_module_cap")]
    pub assets: usize,
    #[serde(default = "default_module_cap")]
    pub system: usize,
}

impl Default for ModuleCapsConfig {
    fn default() -> Self {
        Self {
            script: default_script_cap(),
            storyboard: default_module_cap(),
            assets: default_module_cap(),
            system: default_module_cap(),
        }
    }
}

impl ModuleCapsConfig {
    pub fn cap(&self, module: TaskModule) -> usize {
        match module {
            TaskModule::Script => self.script,
            TaskModule::Storyboard => self.storyboard,
            TaskModule::Assets => self.assets,
            TaskModule::System => self.system,
        }
    }
}

/// Execution timeouts per task kind, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_long_timeout")]
    pub analysis_ms: u64,
    #[serde(default = "default_long_timeout")]
    pub rendering_ms: u64,
    #[serde(default = "default_short_timeout")]
    pub reasoning_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            analysis_ms: default_long_timeout(),
            rendering_ms: default_long_timeout(),
            reasoning_ms: default_short_timeout(),
        }
    }
}

impl TimeoutsConfig {
    pub fn for_kind(&self, kind: TaskKind) -> Duration {
        let ms = match kind {
            TaskKind::Analysis => self.analysis_ms,
            TaskKind::Rendering => self.rendering_ms,
            TaskKind::Reasoning => self.reasoning_ms,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_request_timeout() -> u64 {
    300
}
fn default_analysis_model() -> String {
    "gemini-3-pro-preview".to_string()
}
fn default_analysis_fast_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_image_model() -> String {
    "nano-banana-2".to_string()
}
fn default_video_model() -> String {
    "sora-2".to_string()
}
fn default_shared_lane() -> usize {
    3
}
fn default_private_lane() -> usize {
    10
}
fn default_script_cap() -> usize {
    1
}
fn default_module_cap() -> usize {
    2
}
fn default_long_timeout() -> u64 {
    900_000
}
fn default_short_timeout() -> u64 {
    300_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (GATEWAY__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
