//! Resume store: domain operations over the capability facade.
//!
//! Records live in the KV store under `resume:<id>`; the original document and
//! its preview image live in blob storage. `create` is a multi-step sequence
//! without rollback. A write-ahead intent under `intent:<id>` marks it in
//! flight until the record lands, so [`ResumeStore::recover`] can remove the
//! blobs an interrupted upload left behind. Intents are stamped with the run
//! that wrote them; recovery only touches intents from earlier runs, since
//! this run's may belong to uploads still in progress.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::facade::CapabilityFacade;
use crate::models::resume::{
    intent_key, record_key, CreateIntent, ResumeMetadata, ResumeRecord, INTENT_PATTERN,
    RECORD_PATTERN,
};
use crate::platform::{file_name, normalize_path, BlobRef, UploadFile};
use crate::resume::preview::{
    content_type_for, placeholder, PreviewHandle, PreviewRenderer, PreviewScope, RenderedPreview,
};
use crate::resume::prompts::build_feedback_prompt;

/// Root of the blob namespace, as the platform spells it.
const BLOB_ROOT: &str = "./";

/// A document as received from the uploader.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WipeReport {
    pub blobs_removed: usize,
    pub blobs_failed: usize,
    pub kv_flushed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub intents_resolved: usize,
    pub blobs_removed: usize,
    /// Left for a later pass because the record lookup got no answer.
    pub intents_deferred: usize,
}

#[derive(Clone)]
pub struct ResumeStore {
    facade: CapabilityFacade,
    renderer: Arc<dyn PreviewRenderer>,
    run_id: Arc<str>,
}

impl ResumeStore {
    /// Every store built here starts a new run; clones share it.
    pub fn new(facade: CapabilityFacade, renderer: Arc<dyn PreviewRenderer>) -> Self {
        Self {
            facade,
            renderer,
            run_id: Uuid::new_v4().to_string().into(),
        }
    }

    /// Every stored record. Entries that fail to deserialize are skipped.
    pub async fn list(&self) -> Vec<ResumeRecord> {
        let items = self
            .facade
            .kv()
            .list(RECORD_PATTERN, true)
            .await
            .unwrap_or_default();

        items
            .into_iter()
            .filter_map(|item| {
                let Some(value) = item.value else {
                    warn!("Listed {} without a value; skipping", item.key);
                    return None;
                };
                match serde_json::from_str::<ResumeRecord>(&value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping corrupt record {}: {e}", item.key);
                        None
                    }
                }
            })
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<ResumeRecord> {
        let key = record_key(id);
        let value = self.facade.kv().get(&key).await?;
        match serde_json::from_str(&value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Record {key} is corrupt: {e}");
                None
            }
        }
    }

    /// Stores the document and its preview, runs AI feedback on the document
    /// and persists the assembled record.
    ///
    /// Order: intent, document blob, preview blob, inference, record, intent
    /// removal. A failure stops the sequence where it is; nothing is undone.
    pub async fn create(
        &self,
        upload: ResumeUpload,
        metadata: ResumeMetadata,
    ) -> Result<ResumeRecord, AppError> {
        if !self.facade.is_available() {
            return Err(AppError::PlatformUnavailable);
        }
        if upload.data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        let metadata = metadata.normalized();
        let original_name = file_name(upload.file_name.trim()).to_string();
        if original_name == "/" {
            return Err(AppError::Validation("File name is required".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let preview = self.render_preview(&original_name, upload.data.clone()).await;
        let resume_name = format!("{id}-{original_name}");
        let preview_name = format!("{id}-preview.{}", preview.extension);

        let intent = CreateIntent {
            id: id.clone(),
            run_id: self.run_id.to_string(),
            resume_path: BlobRef::new(normalize_path(&resume_name)),
            image_path: BlobRef::new(normalize_path(&preview_name)),
        };
        // An intent that can never be deleted would outlive its upload.
        let tracked = self.facade.kv_delete_method().is_some();
        if tracked {
            self.put_json(&intent_key(&id), &intent).await?;
        } else {
            debug!("No KV delete method; uploading {id} without an intent");
        }

        let fs = self.facade.fs();
        let resume_path = fs
            .upload_batch(vec![UploadFile {
                name: resume_name,
                data: upload.data,
            }])
            .await
            .ok_or_else(|| AppError::Storage(format!("failed to upload {original_name}")))?;
        let image_path = fs
            .write(intent.image_path.path(), preview.bytes)
            .await
            .ok_or_else(|| AppError::Storage(format!("failed to store preview for {id}")))?;

        let prompt = build_feedback_prompt(
            metadata.company_name.as_deref(),
            metadata.job_title.as_deref(),
            metadata.job_description.as_deref(),
        );
        let feedback = self
            .facade
            .ai()
            .infer(&resume_path, &prompt)
            .await
            .ok_or(AppError::Inference)?;

        let record = ResumeRecord {
            id: id.clone(),
            company_name: metadata.company_name,
            job_title: metadata.job_title,
            image_path,
            resume_path,
            feedback,
        };
        self.put_json(&record.key(), &record).await?;

        if tracked && self.facade.kv().delete(&intent_key(&id)).await.is_none() {
            warn!("Intent for {id} was not cleared; recovery will resolve it");
        }

        info!(
            "Resume {id} stored (score {:.0})",
            record.feedback.overall_score
        );
        Ok(record)
    }

    /// Soft delete: removes the record only. Its blobs stay until the next wipe.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = self.facade.kv().delete(&record_key(id)).await == Some(true);
        debug!("Soft delete of {id}: removed={removed}");
        removed
    }

    /// Hard reset: deletes every blob at the storage root, then flushes the
    /// KV namespace. Each blob deletion is independent.
    pub async fn wipe(&self) -> WipeReport {
        let fs = self.facade.fs();
        let items = fs.read_dir(BLOB_ROOT).await.unwrap_or_default();

        let mut report = WipeReport::default();
        for item in items {
            if fs.delete(&item.path).await {
                report.blobs_removed += 1;
            } else {
                warn!("Wipe could not delete {}", item.path);
                report.blobs_failed += 1;
            }
        }
        report.kv_flushed = self.facade.kv().flush().await == Some(true);

        info!(
            "Wipe finished: {} blob(s) removed, {} failed, kv flushed: {}",
            report.blobs_removed, report.blobs_failed, report.kv_flushed
        );
        report
    }

    /// Resolves intents left by earlier runs. An intent whose record exists
    /// only needs clearing. When the record is confirmed missing the upload
    /// never finished and its blobs are removed. When the lookup fails the
    /// intent is kept for the next pass.
    pub async fn recover(&self) -> RecoveryReport {
        let kv = self.facade.kv();
        let items = kv.list(INTENT_PATTERN, true).await.unwrap_or_default();

        let mut report = RecoveryReport::default();
        for item in items {
            let intent = match item
                .value
                .as_deref()
                .map(serde_json::from_str::<CreateIntent>)
            {
                Some(Ok(intent)) => intent,
                Some(Err(e)) => {
                    warn!("Skipping corrupt intent {}: {e}", item.key);
                    continue;
                }
                None => continue,
            };
            if intent.run_id.as_str() == &*self.run_id {
                continue;
            }

            match kv.lookup(&record_key(&intent.id)).await {
                Some(Some(_)) => {}
                Some(None) => {
                    let fs = self.facade.fs();
                    for path in [&intent.resume_path, &intent.image_path] {
                        if fs.delete(path.path()).await {
                            report.blobs_removed += 1;
                        }
                    }
                    info!("Removed blobs of interrupted upload {}", intent.id);
                }
                None => {
                    warn!("Could not check the record for {}; keeping its intent", intent.id);
                    report.intents_deferred += 1;
                    continue;
                }
            }

            if kv.delete(&item.key).await == Some(true) {
                report.intents_resolved += 1;
            }
        }
        report
    }

    /// Fetches the preview image and issues a handle for it in `scope`.
    pub async fn resolve_preview(
        &self,
        record: &ResumeRecord,
        scope: &PreviewScope,
    ) -> Option<PreviewHandle> {
        let path = record.image_path.path();
        let bytes = self.facade.fs().read(path).await?;
        Some(scope.issue(bytes, content_type_for(path)))
    }

    async fn render_preview(&self, file_name: &str, document: Bytes) -> RenderedPreview {
        let renderer = self.renderer.clone();
        let name = file_name.to_string();
        match tokio::task::spawn_blocking(move || renderer.render(&name, &document)).await {
            Ok(preview) => preview,
            Err(e) => {
                warn!("Preview rendering failed for {file_name}: {e}");
                placeholder(file_name)
            }
        }
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let json = serde_json::to_string(value).map_err(|e| AppError::Internal(e.into()))?;
        match self.facade.kv().set(key, &json).await {
            Some(true) => Ok(()),
            _ => Err(AppError::Kv(format!("failed to write {key}"))),
        }
    }
}
