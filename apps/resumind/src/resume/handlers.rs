use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::errors::AppError;
use crate::models::resume::{ResumeMetadata, ResumeRecord};
use crate::resume::store::WipeReport;
use crate::resume::{PreviewScope, ResumeUpload};
use crate::routes::session::require_auth;
use crate::state::AppState;

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResumeRecord>>, AppError> {
    require_auth(&state)?;
    Ok(Json(state.resumes.list().await))
}

/// POST /api/v1/resumes
/// Multipart fields: `file` (required), `companyName`, `jobTitle`, `jobDescription`.
pub async fn handle_create_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeRecord>), AppError> {
    require_auth(&state)?;

    let mut upload: Option<ResumeUpload> = None;
    let mut metadata = ResumeMetadata::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                upload = Some(ResumeUpload { file_name, data });
            }
            "companyName" => metadata.company_name = Some(read_text(field).await?),
            "jobTitle" => metadata.job_title = Some(read_text(field).await?),
            "jobDescription" => metadata.job_description = Some(read_text(field).await?),
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    let record = state.resumes.create(upload, metadata).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResumeRecord>, AppError> {
    require_auth(&state)?;
    let record = state
        .resumes
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    Ok(Json(record))
}

/// DELETE /api/v1/resumes/:id
/// Removes the record only; its blobs are left for the next wipe.
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_auth(&state)?;
    if state.resumes.get(&id).await.is_none() {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    if !state.resumes.delete(&id).await {
        return Err(AppError::Kv(format!("failed to delete resume {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/resumes/:id/preview
/// The handle's scope is this request; it is revoked once the bytes are sent.
pub async fn handle_get_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_auth(&state)?;
    let record = state
        .resumes
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let scope = PreviewScope::new();
    let handle = state
        .resumes
        .resolve_preview(&record, &scope)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Preview for resume {id} not found")))?;

    Ok(([(header::CONTENT_TYPE, handle.content_type)], handle.bytes))
}

/// POST /api/v1/wipe
pub async fn handle_wipe(State(state): State<AppState>) -> Result<Json<WipeReport>, AppError> {
    require_auth(&state)?;
    Ok(Json(state.resumes.wipe().await))
}
