//! Configuration management for PaperScout services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Search phrases for the voice-agent / speech-AI paper scan
pub const DEFAULT_KEYWORDS: &[&str] = &[
    // Core voice agent
    "voice agent",
    "conversational AI",
    "speech dialogue",
    "full-duplex speech",
    "speech-to-speech",
    "voice assistant LLM",
    // ASR/TTS benchmarks
    "ASR benchmark",
    "speech recognition evaluation",
    "TTS evaluation",
    "speech synthesis quality",
    // Multimodal audio
    "multimodal LLM audio",
    "audio language model",
    "streaming speech generation",
    "real-time voice interaction",
    // Specific projects & companies
    "PersonaPlex",
    "NVIDIA voice",
    "GPT-4o voice",
    "Gemini voice",
    "voice cloning",
    "speaker adaptation",
    "zero-shot TTS",
    "end-to-end speech model",
    "neural codec",
    "audio codec",
];

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Discovery store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Primary source (arXiv) configuration
    #[serde(default)]
    pub arxiv: ArxivConfig,

    /// Secondary source (Google Scholar subprocess) configuration
    #[serde(default)]
    pub scholar: ScholarConfig,

    /// Scan orchestration configuration
    #[serde(default)]
    pub scan: ScanConfig,

    /// Trigger authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Backend: file, redis, memory
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Redis URL for the redis backend
    pub redis_url: Option<String>,

    /// Optional namespace prepended to every store key
    pub key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArxivConfig {
    /// Query endpoint
    #[serde(default = "default_arxiv_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_arxiv_timeout")]
    pub request_timeout_secs: u64,

    /// Provider cap on results per request
    #[serde(default = "default_max_results_cap")]
    pub max_results_cap: u32,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScholarConfig {
    /// Enable the secondary scan
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Interpreter or executable to spawn
    #[serde(default = "default_scholar_program")]
    pub program: String,

    /// Script passed as the first argument
    #[serde(default = "default_scholar_script")]
    pub script_path: PathBuf,

    /// Oldest publication year to keep
    #[serde(default = "default_year_from")]
    pub year_from: i32,

    /// Wall-clock budget for one run, in seconds
    #[serde(default = "default_scholar_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Ordered search phrases
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Fixed delay between consecutive provider requests, in milliseconds
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Window used by a primary scan when no dates are given
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: u32,

    /// Results requested per keyword when the caller does not say
    #[serde(default = "default_max_results_per_keyword")]
    pub max_results_per_keyword: u32,

    /// Number of new titles echoed in the scan summary
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Shared secret required as `Authorization: Bearer <secret>` on scan triggers
    pub trigger_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or EnvFilter directive (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Prometheus exporter port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name attached to the startup log
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Trigger requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_arxiv_base_url() -> String { "http://export.arxiv.org/api/query".to_string() }
fn default_arxiv_timeout() -> u64 { 30 }
fn default_max_results_cap() -> u32 { 100 }
fn default_user_agent() -> String { format!("paperscout/{}", crate::VERSION) }
fn default_scholar_program() -> String { "python3".to_string() }
fn default_scholar_script() -> PathBuf { PathBuf::from("scripts/search_scholar.py") }
fn default_year_from() -> i32 { 2024 }
fn default_scholar_timeout() -> u64 { 600 }
fn default_keywords() -> Vec<String> { DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect() }
fn default_request_delay() -> u64 { 1000 }
fn default_lookback_days() -> u32 { 7 }
fn default_max_results_per_keyword() -> u32 { 50 }
fn default_sample_size() -> usize { crate::DEFAULT_SAMPLE_SIZE }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "paperscout".to_string() }
fn default_rate_limit() -> u32 { 1 }
fn default_burst() -> u32 { 5 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
            redis_url: None,
            key_prefix: None,
        }
    }
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: default_arxiv_base_url(),
            request_timeout_secs: default_arxiv_timeout(),
            max_results_cap: default_max_results_cap(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            program: default_scholar_program(),
            script_path: default_scholar_script(),
            year_from: default_year_from(),
            timeout_secs: default_scholar_timeout(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            request_delay_ms: default_request_delay(),
            default_lookback_days: default_lookback_days(),
            max_results_per_keyword: default_max_results_per_keyword(),
            sample_size: default_sample_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081, APP__SCAN__KEYWORDS="voice agent,speech dialogue"
            .add_source(Self::environment())

            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_legacy_env();
        config.normalize_keywords();
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_legacy_env();
        config.normalize_keywords();
        Ok(config)
    }

    fn environment() -> Environment {
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("scan.keywords")
    }

    /// `CRON_SECRET` is what schedulers already send; honor it when no
    /// explicit trigger secret is configured.
    fn apply_legacy_env(&mut self) {
        if self.auth.trigger_secret.is_none() {
            self.auth.trigger_secret = std::env::var("CRON_SECRET").ok().filter(|s| !s.is_empty());
        }
    }

    /// Trim keywords and drop blanks left by `a,,b` or trailing commas
    fn normalize_keywords(&mut self) {
        self.scan.keywords = self
            .scan
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
    }

    /// Get the inter-request delay as Duration
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.scan.request_delay_ms)
    }
}

impl ArxivConfig {
    /// Per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ScholarConfig {
    /// Wall-clock budget for one run as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
