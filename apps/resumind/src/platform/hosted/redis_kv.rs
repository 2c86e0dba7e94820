use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::platform::{KvApi, KvDeleteMethod, KvItem, PlatformError, PlatformResult};

/// Redis-backed KV store. Every key is stored as `<namespace>:<key>` so that
/// `flush` only clears this app's keys.
pub struct RedisKv {
    client: redis::Client,
    namespace: String,
}

fn kv_err(e: redis::RedisError) -> PlatformError {
    PlatformError::Kv(e.to_string())
}

impl RedisKv {
    pub fn open(redis_url: &str, namespace: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            namespace: namespace.to_string(),
        })
    }

    async fn connection(&self) -> PlatformResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(kv_err)
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn strip_namespace<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(&self.namespace)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(key)
    }

    async fn remove(&self, key: &str) -> PlatformResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(self.namespaced(key)).await.map_err(kv_err)?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl KvApi for RedisKv {
    async fn get(&self, key: &str) -> PlatformResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(self.namespaced(key)).await.map_err(kv_err)
    }

    async fn set(&self, key: &str, value: &str) -> PlatformResult<bool> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(self.namespaced(key), value)
            .await
            .map_err(kv_err)?;
        Ok(true)
    }

    fn delete_methods(&self) -> Vec<KvDeleteMethod> {
        vec![KvDeleteMethod::Delete, KvDeleteMethod::Del]
    }

    async fn delete(&self, key: &str) -> PlatformResult<bool> {
        self.remove(key).await
    }

    async fn del(&self, key: &str) -> PlatformResult<bool> {
        self.remove(key).await
    }

    async fn list(&self, pattern: &str, include_values: bool) -> PlatformResult<Vec<KvItem>> {
        let mut conn = self.connection().await?;
        let mut keys: Vec<String> = conn.keys(self.namespaced(pattern)).await.map_err(kv_err)?;
        keys.sort();

        if !include_values || keys.is_empty() {
            return Ok(keys
                .iter()
                .map(|k| KvItem {
                    key: self.strip_namespace(k).to_string(),
                    value: None,
                })
                .collect());
        }

        // Explicit MGET so a single key still comes back as an array.
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(kv_err)?;

        Ok(keys
            .iter()
            .zip(values)
            // A key that expired between KEYS and MGET is skipped.
            .filter_map(|(k, v)| {
                v.map(|value| KvItem {
                    key: self.strip_namespace(k).to_string(),
                    value: Some(value),
                })
            })
            .collect())
    }

    async fn flush(&self) -> PlatformResult<bool> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(self.namespaced("*")).await.map_err(kv_err)?;
        if !keys.is_empty() {
            conn.del::<_, ()>(&keys).await.map_err(kv_err)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespacing_round_trip() {
        let kv = RedisKv::open("redis://127.0.0.1/", "resumind").unwrap();
        let stored = kv.namespaced("resume:42");
        assert_eq!(stored, "resumind:resume:42");
        assert_eq!(kv.strip_namespace(&stored), "resume:42");
    }

    #[test]
    fn test_strip_namespace_leaves_foreign_keys() {
        let kv = RedisKv::open("redis://127.0.0.1/", "resumind").unwrap();
        assert_eq!(kv.strip_namespace("other:key"), "other:key");
    }
}
