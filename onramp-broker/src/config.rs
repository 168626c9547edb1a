//! Broker configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// SQLite database path; in-memory stores are used when absent
    pub database: Option<String>,

    /// Provider API endpoint and credentials
    pub provider: ProviderSettings,

    /// Identity-verification polling parameters
    pub verification: VerificationSettings,

    /// Access-token cache parameters
    pub tokens: TokenCacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    /// Provider name used in token cache keys
    pub name: String,
    /// Provider environment (e.g. "sandbox", "production")
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSettings {
    /// Delay between status reads while waiting for the provider to make
    /// progress. The provider creates verifications asynchronously, so a
    /// freshly created resource is routinely not ready on the first read.
    pub poll_interval_ms: u64,

    /// Poll budget per start/resume call. Exhausting it is retryable: the
    /// next call resumes the same resource.
    pub max_poll_attempts: u32,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_poll_attempts: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenCacheSettings {
    /// A cached token is refreshed once it is within this many seconds of
    /// its expiry, so callers never hold a token that dies mid-request.
    pub refresh_buffer_secs: u64,

    /// Interval of the background sweep that evicts expired entries.
    pub sweep_interval_secs: u64,
}

impl Default for TokenCacheSettings {
    fn default() -> Self {
        Self {
            refresh_buffer_secs: 120,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database: None,
            provider: ProviderSettings {
                base_url: "https://api.sandbox.example.com".to_string(),
                client_id: String::new(),
                client_secret: String::new(),
                scopes: vec![
                    "customers:execute".to_string(),
                    "accounts:execute".to_string(),
                    "identity_verifications:execute".to_string(),
                ],
                name: "cybrid".to_string(),
                environment: "sandbox".to_string(),
            },
            verification: VerificationSettings::default(),
            tokens: TokenCacheSettings::default(),
        }
    }
}

impl Config {
    /// Build a config from `ONRAMP_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Some(port) = env_var("ONRAMP_PORT").and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        config.database = env_var("ONRAMP_DATABASE");

        if let Some(url) = env_var("ONRAMP_PROVIDER_URL") {
            config.provider.base_url = url;
        }
        if let Some(id) = env_var("ONRAMP_CLIENT_ID") {
            config.provider.client_id = id;
        }
        if let Some(secret) = env_var("ONRAMP_CLIENT_SECRET") {
            config.provider.client_secret = secret;
        }
        if let Some(scopes) = env_var("ONRAMP_SCOPES") {
            config.provider.scopes = scopes.split_whitespace().map(str::to_string).collect();
        }
        if let Some(environment) = env_var("ONRAMP_ENVIRONMENT") {
            config.provider.environment = environment;
        }

        if let Some(ms) = env_var("ONRAMP_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            config.verification.poll_interval_ms = ms;
        }
        if let Some(n) = env_var("ONRAMP_MAX_POLL_ATTEMPTS").and_then(|v| v.parse().ok()) {
            config.verification.max_poll_attempts = n;
        }
        if let Some(secs) = env_var("ONRAMP_TOKEN_BUFFER_SECS").and_then(|v| v.parse().ok()) {
            config.tokens.refresh_buffer_secs = secs;
        }
        if let Some(secs) = env_var("ONRAMP_SWEEP_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            config.tokens.sweep_interval_secs = secs;
        }

        config
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_parameters() {
        let config = Config::default();
        assert_eq!(config.verification.poll_interval_ms, 2_000);
        assert_eq!(config.verification.max_poll_attempts, 30);
        assert_eq!(config.tokens.refresh_buffer_secs, 120);
    }

    #[test]
    fn test_from_env_overrides_polling() {
        std::env::set_var("ONRAMP_POLL_INTERVAL_MS", "50");
        std::env::set_var("ONRAMP_MAX_POLL_ATTEMPTS", "3");

        let config = Config::from_env();
        assert_eq!(config.verification.poll_interval_ms, 50);
        assert_eq!(config.verification.max_poll_attempts, 3);

        std::env::remove_var("ONRAMP_POLL_INTERVAL_MS");
        std::env::remove_var("ONRAMP_MAX_POLL_ATTEMPTS");
    }
}
