use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::HostedConfig;
use crate::platform::{
    file_name, normalize_path, FsApi, FsItem, PlatformError, PlatformResult, UploadFile,
};

/// Blob storage on an S3-compatible bucket. Paths map to object keys without
/// the leading slash; directories are key prefixes.
pub struct S3Fs {
    client: Client,
    bucket: String,
}

/// Objects and common prefixes found under one listing prefix.
#[derive(Default)]
struct Listing {
    objects: Vec<FsItem>,
    prefixes: Vec<String>,
}

fn storage_err(e: impl std::fmt::Display) -> PlatformError {
    PlatformError::Storage(e.to_string())
}

fn object_key(path: &str) -> String {
    normalize_path(path).trim_start_matches('/').to_string()
}

fn to_chrono(ts: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    ts.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

fn item_for_key(key: &str, size: u64, modified: DateTime<Utc>, is_dir: bool) -> FsItem {
    let path = normalize_path(key);
    FsItem {
        id: path.clone(),
        name: file_name(&path).to_string(),
        path,
        is_dir,
        size,
        modified,
    }
}

impl S3Fs {
    /// Constructs an S3 client configured for MinIO (local) or AWS (production).
    pub async fn connect(config: &HostedConfig) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "resumind-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .load()
            .await;

        // MinIO needs path-style addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
        }
    }

    async fn put(&self, path: &str, data: Bytes) -> PlatformResult<FsItem> {
        let key = object_key(path);
        if key.is_empty() {
            return Err(PlatformError::Storage("cannot write to the root".to_string()));
        }
        let size = data.len() as u64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(storage_err)?;
        debug!("Wrote s3://{}/{} ({size} bytes)", self.bucket, key);
        Ok(item_for_key(&key, size, Utc::now(), false))
    }

    /// Pages through every object under `prefix`. With a delimiter, nested
    /// keys are folded into `prefixes` instead.
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> PlatformResult<Listing> {
        let mut listing = Listing::default();
        let mut token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_delimiter(delimiter.map(str::to_string))
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(storage_err)?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    let size = object.size().unwrap_or(0).max(0) as u64;
                    listing.objects.push(item_for_key(
                        key,
                        size,
                        to_chrono(object.last_modified()),
                        false,
                    ));
                }
            }
            for common in response.common_prefixes() {
                if let Some(p) = common.prefix() {
                    listing.prefixes.push(p.trim_end_matches('/').to_string());
                }
            }

            match response.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }

        Ok(listing)
    }

    async fn delete_key(&self, key: &str) -> PlatformResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl FsApi for S3Fs {
    async fn write(&self, path: &str, data: Bytes) -> PlatformResult<FsItem> {
        self.put(path, data).await
    }

    async fn read(&self, path: &str) -> PlatformResult<Bytes> {
        let key = object_key(path);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    PlatformError::NotFound(normalize_path(path))
                } else {
                    storage_err(service_error)
                }
            })?;

        let body = response.body.collect().await.map_err(storage_err)?;
        Ok(body.into_bytes())
    }

    async fn upload(&self, files: Vec<UploadFile>) -> PlatformResult<FsItem> {
        let mut last = None;
        for file in files {
            last = Some(self.put(&file.name, file.data).await?);
        }
        last.ok_or_else(|| PlatformError::Storage("no files to upload".to_string()))
    }

    async fn delete(&self, path: &str) -> PlatformResult<()> {
        let key = object_key(path);
        if key.is_empty() {
            return Err(PlatformError::Storage("refusing to delete the root".to_string()));
        }
        let nested = self.list(&format!("{key}/"), None).await?;
        for item in &nested.objects {
            self.delete_key(&object_key(&item.path)).await?;
        }
        self.delete_key(&key).await
    }

    async fn readdir(&self, path: &str) -> PlatformResult<Vec<FsItem>> {
        let key = object_key(path);
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };
        let listing = self.list(&prefix, Some("/")).await?;

        let mut items: Vec<FsItem> = listing
            .prefixes
            .iter()
            .map(|p| item_for_key(p, 0, Utc::now(), true))
            .collect();
        items.extend(listing.objects);
        items.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_strips_leading_slash() {
        assert_eq!(object_key("/abc-resume.pdf"), "abc-resume.pdf");
        assert_eq!(object_key("./"), "");
    }

    #[test]
    fn test_item_for_key_uses_normalized_path() {
        let item = item_for_key("dir/file.png", 3, Utc::now(), false);
        assert_eq!(item.path, "/dir/file.png");
        assert_eq!(item.name, "file.png");
        assert_eq!(item.id, item.path);
    }
}
