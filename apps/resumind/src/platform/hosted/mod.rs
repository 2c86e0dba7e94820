//! Hosted platform: Redis for key-value, S3/MinIO for blobs, Claude for
//! inference, and a configured local identity.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{Config, HostedConfig};
use crate::llm_client::{self, LlmClient};
use crate::platform::{AiApi, AuthApi, FsApi, KvApi, Platform};

pub mod auth;
pub mod llm_ai;
pub mod redis_kv;
pub mod s3_fs;

pub use auth::LocalAuth;
pub use llm_ai::LlmAi;
pub use redis_kv::RedisKv;
pub use s3_fs::S3Fs;

pub struct HostedPlatform {
    auth: LocalAuth,
    fs: Arc<S3Fs>,
    ai: LlmAi,
    kv: RedisKv,
}

impl HostedPlatform {
    /// Builds every client up front; nothing connects until the first call.
    pub async fn connect(config: &Config, hosted: &HostedConfig) -> Result<Self> {
        let kv = RedisKv::open(&hosted.redis_url, &hosted.kv_namespace)?;
        info!("Redis client initialized (namespace: {})", hosted.kv_namespace);

        let fs = Arc::new(S3Fs::connect(hosted).await);
        info!("S3 client initialized (bucket: {})", hosted.s3_bucket);

        let llm = LlmClient::new(hosted.anthropic_api_key.clone())
            .context("Failed to build LLM HTTP client")?;
        info!("LLM client initialized (model: {})", llm_client::MODEL);

        Ok(Self {
            auth: LocalAuth::new(&config.platform_user),
            ai: LlmAi::new(llm, fs.clone()),
            fs,
            kv,
        })
    }
}

impl Platform for HostedPlatform {
    fn auth(&self) -> &dyn AuthApi {
        &self.auth
    }

    fn fs(&self) -> &dyn FsApi {
        self.fs.as_ref()
    }

    fn ai(&self) -> &dyn AiApi {
        &self.ai
    }

    fn kv(&self) -> &dyn KvApi {
        &self.kv
    }
}
