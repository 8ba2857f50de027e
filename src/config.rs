use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Generation and embedding service configuration
    pub llm: LlmConfig,

    /// Document store configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());

        let loaded: Self = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: ORACLE_)
            .add_source(
                config::Environment::with_prefix("ORACLE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values that would break scoring invariants
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        for (name, boost) in [
            ("search.keyword_boost", self.search.keyword_boost),
            ("search.vector_boost", self.search.vector_boost),
        ] {
            if boost.is_nan() || boost < 0.0 {
                return Err(config::ConfigError::Message(format!(
                    "{name} must be non-negative, got {boost}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            pipeline: PipelineConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins; empty means permissive
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
            cors_origins: Vec::new(),
        }
    }
}

/// OpenAI-compatible generation/embedding endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model used for extraction, planning and synthesis
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for query embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    pub max_tokens: Option<u32>,

    /// Per-call timeout (seconds)
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Expected embedding length; vectors of any other length are rejected
    pub embedding_dimensions: Option<usize>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            api_key_env: Some("ORACLE_LLM_API_KEY".to_string()),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_llm_timeout(),
            embedding_dimensions: Some(default_embedding_dimensions()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of top retrieved incidents passed to synthesis
    #[serde(default = "default_evidence_limit")]
    pub evidence_limit: usize,

    /// Resolution narratives are cut to this many characters in the prompt
    #[serde(default = "default_resolution_excerpt_chars")]
    pub resolution_excerpt_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            evidence_limit: default_evidence_limit(),
            resolution_excerpt_chars: default_resolution_excerpt_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    180
}

fn default_llm_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_chat_model() -> String {
    "llama3.1".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_embedding_dimensions() -> usize {
    768
}

fn default_evidence_limit() -> usize {
    5
}

fn default_resolution_excerpt_chars() -> usize {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "incident-oracle".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 8000);
        assert_eq!(default_evidence_limit(), 5);
        assert_eq!(default_embedding_dimensions(), 768);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.search.keyword_boost, 1.0);
        assert_eq!(config.search.vector_boost, 2.0);
        assert_eq!(config.pipeline.evidence_limit, 5);
        assert_eq!(config.llm.embedding_dimensions, Some(768));
    }

    #[test]
    fn test_negative_boost_is_rejected() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.search.vector_boost = -0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("search.vector_boost"));

        config.search.vector_boost = 2.0;
        config.search.keyword_boost = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_boost_is_allowed() {
        let mut config = Config::default();
        config.search.keyword_boost = 0.0;

        assert!(config.validate().is_ok());
    }
}
