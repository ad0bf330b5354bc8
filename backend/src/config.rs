use crate::llama::DEFAULT_BASE_URL;
use serde::Deserialize;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Live data settings
    pub llama_config: LlamaConfig,

    /// Simulated feed tick period (milliseconds)
    pub feed_interval_ms: u64,

    /// Seed for the shared generator; entropy when unset
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlamaConfig {
    /// DeFiLlama API base URL
    pub base_url: String,

    /// Request timeout (seconds)
    pub timeout_secs: u64,

    /// How long a live response is reused (seconds)
    pub cache_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Config {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            llama_config: LlamaConfig {
                base_url: std::env::var("LLAMA_API_URL")
                    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
                timeout_secs: std::env::var("LLAMA_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                cache_ttl_secs: std::env::var("LIVE_DATA_TTL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
            },
            feed_interval_ms: std::env::var("FEED_INTERVAL_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            rng_seed: std::env::var("RNG_SEED")
                .ok()
                .map(|seed| seed.parse::<u64>())
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, inside a running task
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feed_interval_ms == 0 {
            anyhow::bail!("FEED_INTERVAL_MS must be greater than zero");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn feed_period(&self) -> Duration {
        Duration::from_millis(self.feed_interval_ms)
    }
}

impl LlamaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            llama_config: LlamaConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout_secs: 10,
                cache_ttl_secs: 60,
            },
            feed_interval_ms: 5000,
            rng_seed: None,
        }
    }
}
