use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{AchievementSummary, AchievementView, AttachmentUpload};
use crate::models::{AchievementAttachment, AchievementContent};
use crate::state::AppState;

pub async fn create_achievement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AchievementContent>,
) -> AppResult<(StatusCode, Json<AchievementView>)> {
    let principal = user.principal()?;
    let view = state.coordinator.create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_achievements(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<AchievementSummary>>> {
    let principal = user.principal()?;
    let summaries = state.coordinator.list_for_principal(&principal).await?;
    Ok(Json(summaries))
}

pub async fn get_achievement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
) -> AppResult<Json<AchievementView>> {
    let principal = user.principal()?;
    let view = state.coordinator.get(&principal, &content_id).await?;
    Ok(Json(view))
}

pub async fn update_achievement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
    Json(payload): Json<AchievementContent>,
) -> AppResult<Json<AchievementView>> {
    let principal = user.principal()?;
    state
        .coordinator
        .update(&principal, &content_id, payload)
        .await?;
    let view = state.coordinator.get(&principal, &content_id).await?;
    Ok(Json(view))
}

pub async fn delete_achievement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
) -> AppResult<StatusCode> {
    let principal = user.principal()?;
    state.coordinator.delete(&principal, &content_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_attachment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<AchievementAttachment>)> {
    let principal = user.principal()?;

    let mut upload: Option<AttachmentUpload> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(|value| value.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("failed to read file: {err}")))?
            .to_vec();
        upload = Some(AttachmentUpload {
            file_name,
            content_type,
            bytes,
        });
    }

    let upload = upload.ok_or_else(|| AppError::bad_request("file is required"))?;
    let attachment = state
        .coordinator
        .add_attachment(&principal, &content_id, upload)
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn submit_achievement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
) -> AppResult<StatusCode> {
    let principal = user.principal()?;
    state.coordinator.submit(&principal, &content_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn verify_achievement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
) -> AppResult<StatusCode> {
    let principal = user.principal()?;
    state.coordinator.verify(&principal, &content_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub note: String,
}

pub async fn reject_achievement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> AppResult<StatusCode> {
    let principal = user.principal()?;
    state
        .coordinator
        .reject(&principal, &content_id, &payload.note)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
