//! External platform contract.
//!
//! The platform bundles four capability groups (identity, blob storage, AI
//! inference, key-value storage) behind one object that is attached to the
//! [`environment::Environment`] at some point after startup. Nothing in this
//! module knows about resumes; the facade and the resume store sit on top.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod environment;
pub mod hosted;
pub mod memory;

pub use environment::Environment;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform not available")]
    Unavailable,

    #[error("Method not supported by this platform version: {0}")]
    Unsupported(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("KV error: {0}")]
    Kv(String),

    #[error("AI error: {0}")]
    Ai(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// User descriptor returned by the identity provider. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uuid: String,
    pub username: String,
}

/// An entry in blob storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsItem {
    pub id: String,
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Reference to a blob by path. Content is fetched on demand, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file handed to [`FsApi::upload`]. Lands at the storage root under `name`.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub data: Bytes,
}

/// A key-value pair. `value` is `None` when listed without values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvItem {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One part of a chat message. A `File` part references a blob by path and is
/// resolved by the inference provider, not by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    File { path: String },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub text: String,
}

/// The two names the KV store has exposed for deletion across its versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvDeleteMethod {
    Delete,
    Del,
}

impl KvDeleteMethod {
    pub fn name(&self) -> &'static str {
        match self {
            KvDeleteMethod::Delete => "kv.delete",
            KvDeleteMethod::Del => "kv.del",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Capability traits
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn get_user(&self) -> PlatformResult<Identity>;
    async fn is_signed_in(&self) -> PlatformResult<bool>;
    /// Interactive sign-in. Resolves once the user completes or aborts the flow.
    async fn sign_in(&self) -> PlatformResult<()>;
    async fn sign_out(&self) -> PlatformResult<()>;
}

#[async_trait]
pub trait FsApi: Send + Sync {
    async fn write(&self, path: &str, data: Bytes) -> PlatformResult<FsItem>;
    async fn read(&self, path: &str) -> PlatformResult<Bytes>;
    /// Uploads every file and returns the item for the last one.
    async fn upload(&self, files: Vec<UploadFile>) -> PlatformResult<FsItem>;
    /// Removes a file, or a directory and everything below it.
    async fn delete(&self, path: &str) -> PlatformResult<()>;
    async fn readdir(&self, path: &str) -> PlatformResult<Vec<FsItem>>;
}

#[async_trait]
pub trait AiApi: Send + Sync {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> PlatformResult<ChatResponse>;
    async fn img2txt(&self, image: Bytes) -> PlatformResult<String>;
}

/// Key-value store. Deletion is version-dependent: a given store exposes
/// `delete`, `del`, both or neither, as reported by [`KvApi::delete_methods`].
/// Calling a method that is not exposed yields [`PlatformError::Unsupported`].
#[async_trait]
pub trait KvApi: Send + Sync {
    async fn get(&self, key: &str) -> PlatformResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> PlatformResult<bool>;

    fn delete_methods(&self) -> Vec<KvDeleteMethod>;

    async fn delete(&self, _key: &str) -> PlatformResult<bool> {
        Err(PlatformError::Unsupported(KvDeleteMethod::Delete.name()))
    }

    async fn del(&self, _key: &str) -> PlatformResult<bool> {
        Err(PlatformError::Unsupported(KvDeleteMethod::Del.name()))
    }

    /// Lists keys matching a glob `pattern` (`*` wildcard).
    async fn list(&self, pattern: &str, include_values: bool) -> PlatformResult<Vec<KvItem>>;
    /// Clears every key in this app's namespace.
    async fn flush(&self) -> PlatformResult<bool>;
}

/// The external service object.
pub trait Platform: Send + Sync {
    fn auth(&self) -> &dyn AuthApi;
    fn fs(&self) -> &dyn FsApi;
    fn ai(&self) -> &dyn AiApi;
    fn kv(&self) -> &dyn KvApi;
}

/// Normalizes a blob path to a leading-slash form without trailing slash.
/// `"./"`, `""` and `"/"` all map to the root `"/"`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches("./").trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Final path segment, used as the display name of an item.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_root_forms() {
        assert_eq!(normalize_path("./"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_normalize_path_relative_and_trailing() {
        assert_eq!(normalize_path("./abc/resume.pdf"), "/abc/resume.pdf");
        assert_eq!(normalize_path("dir/"), "/dir");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/a/b/resume.pdf"), "resume.pdf");
        assert_eq!(file_name("/"), "/");
    }

    #[test]
    fn test_content_part_wire_format() {
        let part = ContentPart::File {
            path: "/x.pdf".to_string(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["path"], "/x.pdf");
    }
}
