use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which platform implementation gets injected into the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformBackend {
    Memory,
    Hosted,
}

impl PlatformBackend {
    pub fn name(&self) -> &'static str {
        match self {
            PlatformBackend::Memory => "memory",
            PlatformBackend::Hosted => "hosted",
        }
    }
}

/// Connection settings for the hosted platform (Redis + S3 + Anthropic).
#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub redis_url: String,
    pub kv_namespace: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if variables required by the selected backend are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: PlatformBackend,
    pub hosted: Option<HostedConfig>,
    pub platform_user: String,
    pub attach_delay_ms: u64,
    pub probe_interval_ms: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let backend = parse_backend(&optional_env("PLATFORM_BACKEND", "memory"))?;
        let hosted = match backend {
            PlatformBackend::Memory => None,
            PlatformBackend::Hosted => Some(HostedConfig {
                redis_url: require_env("REDIS_URL")?,
                kv_namespace: optional_env("KV_NAMESPACE", "resumind"),
                s3_bucket: require_env("S3_BUCKET")?,
                s3_endpoint: require_env("S3_ENDPOINT")?,
                aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
                anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            }),
        };

        Ok(Config {
            backend,
            hosted,
            platform_user: optional_env("PLATFORM_USER", "guest"),
            attach_delay_ms: optional_env("PLATFORM_ATTACH_DELAY_MS", "0")
                .parse::<u64>()
                .context("PLATFORM_ATTACH_DELAY_MS must be a number of milliseconds")?,
            probe_interval_ms: optional_env("PROBE_INTERVAL_MS", "100")
                .parse::<u64>()
                .context("PROBE_INTERVAL_MS must be a number of milliseconds")?,
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms.max(1))
    }

    pub fn attach_delay(&self) -> Duration {
        Duration::from_millis(self.attach_delay_ms)
    }
}

fn parse_backend(value: &str) -> Result<PlatformBackend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(PlatformBackend::Memory),
        "hosted" => Ok(PlatformBackend::Hosted),
        other => bail!("PLATFORM_BACKEND must be 'memory' or 'hosted', got '{other}'"),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_accepts_known_values() {
        assert_eq!(parse_backend("memory").unwrap(), PlatformBackend::Memory);
        assert_eq!(parse_backend(" Hosted ").unwrap(), PlatformBackend::Hosted);
    }

    #[test]
    fn test_parse_backend_rejects_unknown() {
        let err = parse_backend("puter").unwrap_err();
        assert!(err.to_string().contains("puter"));
    }
}
