use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{parse_bucket, parse_folder};
use crate::{
    adapters::inbound::http::{
        dto::{
            api_error, ApiError, ErrorResponseDto, SuccessResponseDto, UploadListDto,
            UploadQuery, UploadTaskDto,
        },
        router::AppState,
    },
    domain::{errors::BrowserError, models::UploadSource, value_objects::UploadId},
};

/// Handle a multipart upload; every file field becomes one upload task
pub async fn upload_objects(
    State(app_state): State<AppState>,
    Path(bucket): Path<String>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadListDto>), ApiError> {
    let bucket = parse_bucket(bucket)?;
    let folder = parse_folder(query.folder)?;

    let mut sources = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponseDto::bad_request(&format!(
                "Invalid multipart body: {}",
                e
            ))),
        )
    })? {
        // Plain form fields carry no file
        let Some(name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let content_type = field.content_type().map(|s| s.to_string());

        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponseDto::bad_request(&format!(
                    "Failed to read file '{}': {}",
                    name, e
                ))),
            )
        })?;

        let mut source = UploadSource::new(name, data);
        if let Some(content_type) = content_type {
            source = source.with_content_type(content_type);
        }
        sources.push(source);
    }

    if sources.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponseDto::bad_request("No files in upload form")),
        ));
    }

    let ids = app_state
        .uploads
        .submit(&bucket, &folder, sources)
        .map_err(api_error)?;

    let uploads = ids
        .into_iter()
        .map(|id| upload_dto(&app_state, id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((StatusCode::ACCEPTED, Json(UploadListDto { uploads })))
}

/// List active (queued and uploading) tasks
pub async fn list_uploads(State(app_state): State<AppState>) -> Json<UploadListDto> {
    let uploads = app_state
        .uploads
        .snapshot()
        .into_iter()
        .map(UploadTaskDto::from)
        .collect();

    Json(UploadListDto { uploads })
}

/// Report one task, whether still active or finished
pub async fn get_upload(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UploadTaskDto>, ApiError> {
    let id = parse_upload_id(&id)?;
    upload_dto(&app_state, id).map(Json)
}

/// Cancel a queued or uploading task
pub async fn cancel_upload(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponseDto>, ApiError> {
    let id = parse_upload_id(&id)?;
    app_state.uploads.cancel(id).map_err(api_error)?;

    Ok(Json(SuccessResponseDto::new("Upload cancelled")))
}

/// Resubmit a failed task as a new one
pub async fn retry_upload(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<UploadTaskDto>), ApiError> {
    let id = parse_upload_id(&id)?;
    let retried = app_state.uploads.resubmit(id).map_err(api_error)?;

    Ok((StatusCode::ACCEPTED, Json(upload_dto(&app_state, retried)?)))
}

fn parse_upload_id(id: &str) -> Result<UploadId, ApiError> {
    UploadId::parse(id).map_err(|e| api_error(e.into()))
}

fn upload_dto(app_state: &AppState, id: UploadId) -> Result<UploadTaskDto, ApiError> {
    if let Some(task) = app_state.uploads.task(id) {
        return Ok(task.into());
    }

    app_state
        .uploads
        .outcome(id)
        .map(|outcome| UploadTaskDto::from_outcome(id.to_string(), outcome))
        .ok_or_else(|| api_error(BrowserError::UploadNotFound { id }))
}
