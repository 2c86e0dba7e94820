//! In-process platform. Backs the `memory` backend and the test suite.
//!
//! Every capability group keeps its data behind a `parking_lot::Mutex` and
//! exposes a few knobs (failing calls, which KV delete name is present) so
//! callers can reproduce the behaviours of the hosted service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::platform::{
    file_name, normalize_path, AiApi, AuthApi, ChatMessage, ChatOptions, ChatResponse, FsApi,
    FsItem, Identity, KvApi, KvDeleteMethod, KvItem, Platform, PlatformError, PlatformResult,
    UploadFile,
};

/// Reply used by [`MemoryAi`] until another one is configured.
pub const DEFAULT_FEEDBACK_REPLY: &str = r#"{
  "overallScore": 78,
  "ATS": { "score": 82, "tips": [{ "type": "good", "tip": "Clear section headings" }] },
  "toneAndStyle": { "score": 75, "tips": [{ "type": "improve", "tip": "Use stronger verbs", "explanation": "Lead bullets with action verbs." }] },
  "content": { "score": 74, "tips": [] },
  "structure": { "score": 80, "tips": [] },
  "skills": { "score": 79, "tips": [] }
}"#;

pub struct MemoryPlatform {
    auth: MemoryAuth,
    fs: MemoryFs,
    ai: MemoryAi,
    kv: MemoryKv,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    /// A signed-out platform for user `guest` whose KV store exposes both
    /// delete names.
    pub fn new() -> Self {
        Self {
            auth: MemoryAuth::new("guest"),
            fs: MemoryFs::default(),
            ai: MemoryAi::default(),
            kv: MemoryKv::new(vec![KvDeleteMethod::Delete, KvDeleteMethod::Del]),
        }
    }

    pub fn with_user(mut self, username: &str) -> Self {
        self.auth = MemoryAuth::new(username);
        self
    }

    pub fn signed_in(self) -> Self {
        self.auth.set_signed_in(true);
        self
    }

    pub fn with_kv_delete_methods(mut self, methods: Vec<KvDeleteMethod>) -> Self {
        self.kv.delete_methods = methods;
        self
    }

    pub fn memory_auth(&self) -> &MemoryAuth {
        &self.auth
    }

    pub fn memory_fs(&self) -> &MemoryFs {
        &self.fs
    }

    pub fn memory_ai(&self) -> &MemoryAi {
        &self.ai
    }

    pub fn memory_kv(&self) -> &MemoryKv {
        &self.kv
    }
}

impl Platform for MemoryPlatform {
    fn auth(&self) -> &dyn AuthApi {
        &self.auth
    }

    fn fs(&self) -> &dyn FsApi {
        &self.fs
    }

    fn ai(&self) -> &dyn AiApi {
        &self.ai
    }

    fn kv(&self) -> &dyn KvApi {
        &self.kv
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Identity
// ────────────────────────────────────────────────────────────────────────────

pub struct MemoryAuth {
    user: Identity,
    signed_in: AtomicBool,
    abort_sign_in: AtomicBool,
    fail_status: AtomicBool,
    fail_sign_out: AtomicBool,
    status_checks: AtomicUsize,
}

impl MemoryAuth {
    fn new(username: &str) -> Self {
        Self {
            user: Identity {
                uuid: Uuid::new_v4().to_string(),
                username: username.to_string(),
            },
            signed_in: AtomicBool::new(false),
            abort_sign_in: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            status_checks: AtomicUsize::new(0),
        }
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        self.signed_in.store(signed_in, Ordering::SeqCst);
    }

    /// Makes the interactive sign-in flow end without signing the user in.
    pub fn abort_sign_in(&self, abort: bool) {
        self.abort_sign_in.store(abort, Ordering::SeqCst);
    }

    pub fn fail_status_checks(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Makes `sign_out` error out while leaving the remote session intact.
    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for MemoryAuth {
    async fn get_user(&self) -> PlatformResult<Identity> {
        if !self.signed_in.load(Ordering::SeqCst) {
            return Err(PlatformError::Auth("not signed in".to_string()));
        }
        Ok(self.user.clone())
    }

    async fn is_signed_in(&self) -> PlatformResult<bool> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(PlatformError::Auth("status check failed".to_string()));
        }
        Ok(self.signed_in.load(Ordering::SeqCst))
    }

    async fn sign_in(&self) -> PlatformResult<()> {
        if !self.abort_sign_in.load(Ordering::SeqCst) {
            self.signed_in.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn sign_out(&self) -> PlatformResult<()> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(PlatformError::Auth("sign-out rejected".to_string()));
        }
        self.signed_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Blob storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct StoredBlob {
    data: Bytes,
    modified: DateTime<Utc>,
}

/// Flat map of normalized paths; directories are implied by path prefixes.
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<String, StoredBlob>>,
}

impl MemoryFs {
    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().contains_key(&normalize_path(path))
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    fn store(&self, path: &str, data: Bytes) -> PlatformResult<FsItem> {
        let path = normalize_path(path);
        if path == "/" {
            return Err(PlatformError::Storage("cannot write to the root".to_string()));
        }
        let blob = StoredBlob {
            data,
            modified: Utc::now(),
        };
        let item = file_item(&path, &blob);
        self.files.lock().insert(path, blob);
        Ok(item)
    }
}

fn file_item(path: &str, blob: &StoredBlob) -> FsItem {
    FsItem {
        id: path.to_string(),
        name: file_name(path).to_string(),
        path: path.to_string(),
        is_dir: false,
        size: blob.data.len() as u64,
        modified: blob.modified,
    }
}

fn dir_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        format!("{path}/")
    }
}

#[async_trait]
impl FsApi for MemoryFs {
    async fn write(&self, path: &str, data: Bytes) -> PlatformResult<FsItem> {
        self.store(path, data)
    }

    async fn read(&self, path: &str) -> PlatformResult<Bytes> {
        let path = normalize_path(path);
        self.files
            .lock()
            .get(&path)
            .map(|blob| blob.data.clone())
            .ok_or(PlatformError::NotFound(path))
    }

    async fn upload(&self, files: Vec<UploadFile>) -> PlatformResult<FsItem> {
        let mut last = None;
        for file in files {
            last = Some(self.store(&file.name, file.data)?);
        }
        last.ok_or_else(|| PlatformError::Storage("no files to upload".to_string()))
    }

    async fn delete(&self, path: &str) -> PlatformResult<()> {
        let path = normalize_path(path);
        if path == "/" {
            return Err(PlatformError::Storage("refusing to delete the root".to_string()));
        }
        let prefix = dir_prefix(&path);
        let mut files = self.files.lock();
        let before = files.len();
        files.retain(|key, _| key != &path && !key.starts_with(&prefix));
        if files.len() == before {
            return Err(PlatformError::NotFound(path));
        }
        Ok(())
    }

    async fn readdir(&self, path: &str) -> PlatformResult<Vec<FsItem>> {
        let prefix = dir_prefix(&normalize_path(path));
        let files = self.files.lock();
        let mut entries: BTreeMap<String, FsItem> = BTreeMap::new();

        for (key, blob) in files.iter().filter(|(k, _)| k.starts_with(&prefix)) {
            let rest = &key[prefix.len()..];
            match rest.split_once('/') {
                Some((dir, _)) => {
                    let dir_path = format!("{prefix}{dir}");
                    let entry = entries.entry(dir_path.clone()).or_insert_with(|| FsItem {
                        id: dir_path.clone(),
                        name: dir.to_string(),
                        path: dir_path,
                        is_dir: true,
                        size: 0,
                        modified: blob.modified,
                    });
                    entry.modified = entry.modified.max(blob.modified);
                }
                None => {
                    entries.insert(key.clone(), file_item(key, blob));
                }
            }
        }

        Ok(entries.into_values().collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AI inference
// ────────────────────────────────────────────────────────────────────────────

pub struct MemoryAi {
    reply: Mutex<Result<String, String>>,
    requests: Mutex<Vec<(Vec<ChatMessage>, ChatOptions)>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for MemoryAi {
    fn default() -> Self {
        Self {
            reply: Mutex::new(Ok(DEFAULT_FEEDBACK_REPLY.to_string())),
            requests: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }
}

impl MemoryAi {
    pub fn set_reply(&self, text: &str) {
        *self.reply.lock() = Ok(text.to_string());
    }

    pub fn fail_with(&self, message: &str) {
        *self.reply.lock() = Err(message.to_string());
    }

    /// Holds every later `chat` call until the returned gate is notified.
    pub fn hold_replies(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Every chat request received so far, in order.
    pub fn requests(&self) -> Vec<(Vec<ChatMessage>, ChatOptions)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AiApi for MemoryAi {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> PlatformResult<ChatResponse> {
        let model = options.model.clone();
        self.requests.lock().push((messages, options));
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match &*self.reply.lock() {
            Ok(text) => Ok(ChatResponse {
                model,
                text: text.clone(),
            }),
            Err(message) => Err(PlatformError::Ai(message.clone())),
        }
    }

    /// Echoes textual image content (SVG previews carry their text inline).
    /// Fails along with `chat` after [`MemoryAi::fail_with`].
    async fn img2txt(&self, image: Bytes) -> PlatformResult<String> {
        if let Err(message) = &*self.reply.lock() {
            return Err(PlatformError::Ai(message.clone()));
        }
        Ok(String::from_utf8_lossy(&image).trim().to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Key-value storage
// ────────────────────────────────────────────────────────────────────────────

pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, String>>,
    delete_methods: Vec<KvDeleteMethod>,
    delete_calls: Mutex<Vec<KvDeleteMethod>>,
    fail_gets: AtomicBool,
}

impl MemoryKv {
    fn new(delete_methods: Vec<KvDeleteMethod>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            delete_methods,
            delete_calls: Mutex::new(Vec::new()),
            fail_gets: AtomicBool::new(false),
        }
    }

    /// Makes single-key reads time out. Listing keeps working.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Which delete method names were invoked, in order.
    pub fn delete_calls(&self) -> Vec<KvDeleteMethod> {
        self.delete_calls.lock().clone()
    }

    fn remove(&self, method: KvDeleteMethod, key: &str) -> PlatformResult<bool> {
        if !self.delete_methods.contains(&method) {
            return Err(PlatformError::Unsupported(method.name()));
        }
        self.delete_calls.lock().push(method);
        Ok(self.entries.lock().remove(key).is_some())
    }
}

#[async_trait]
impl KvApi for MemoryKv {
    async fn get(&self, key: &str) -> PlatformResult<Option<String>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(PlatformError::Kv("timeout".to_string()));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PlatformResult<bool> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn delete_methods(&self) -> Vec<KvDeleteMethod> {
        self.delete_methods.clone()
    }

    async fn delete(&self, key: &str) -> PlatformResult<bool> {
        self.remove(KvDeleteMethod::Delete, key)
    }

    async fn del(&self, key: &str) -> PlatformResult<bool> {
        self.remove(KvDeleteMethod::Del, key)
    }

    async fn list(&self, pattern: &str, include_values: bool) -> PlatformResult<Vec<KvItem>> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| PlatformError::Kv(e.to_string()))?;
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|(key, _)| matcher.matches(key))
            .map(|(key, value)| KvItem {
                key: key.clone(),
                value: include_values.then(|| value.clone()),
            })
            .collect())
    }

    async fn flush(&self) -> PlatformResult<bool> {
        self.entries.lock().clear();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readdir_lists_direct_children() {
        let fs = MemoryFs::default();
        fs.write("/a.pdf", Bytes::from_static(b"a")).await.unwrap();
        fs.write("/dir/b.png", Bytes::from_static(b"bb")).await.unwrap();
        fs.write("/dir/c.png", Bytes::from_static(b"c")).await.unwrap();

        let root = fs.readdir("./").await.unwrap();
        let names: Vec<_> = root.iter().map(|i| (i.name.as_str(), i.is_dir)).collect();
        assert_eq!(names, vec![("a.pdf", false), ("dir", true)]);

        let dir = fs.readdir("/dir").await.unwrap();
        assert_eq!(dir.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_directory_is_recursive() {
        let fs = MemoryFs::default();
        fs.write("/dir/b.png", Bytes::from_static(b"b")).await.unwrap();
        fs.write("/dir/sub/c.png", Bytes::from_static(b"c")).await.unwrap();
        fs.write("/keep.pdf", Bytes::from_static(b"k")).await.unwrap();

        fs.delete("/dir").await.unwrap();
        assert_eq!(fs.file_count(), 1);
        assert!(fs.contains("/keep.pdf"));
    }

    #[tokio::test]
    async fn test_delete_missing_path_is_not_found() {
        let fs = MemoryFs::default();
        assert!(matches!(
            fs.delete("/nope").await,
            Err(PlatformError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_kv_list_matches_glob() {
        let kv = MemoryKv::new(vec![KvDeleteMethod::Delete]);
        kv.set("resume:1", "one").await.unwrap();
        kv.set("resume:2", "two").await.unwrap();
        kv.set("intent:3", "three").await.unwrap();

        let items = kv.list("resume:*", true).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value.as_deref(), Some("one"));

        let keys = kv.list("resume:*", false).await.unwrap();
        assert!(keys.iter().all(|i| i.value.is_none()));
    }

    #[tokio::test]
    async fn test_kv_unexposed_delete_name_is_unsupported() {
        let kv = MemoryKv::new(vec![KvDeleteMethod::Del]);
        kv.set("k", "v").await.unwrap();
        assert!(matches!(
            kv.delete("k").await,
            Err(PlatformError::Unsupported("kv.delete"))
        ));
        assert!(kv.del("k").await.unwrap());
        assert_eq!(kv.delete_calls(), vec![KvDeleteMethod::Del]);
    }
}
