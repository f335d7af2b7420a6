use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use super::{parse_bucket, parse_folder};
use crate::{
    adapters::inbound::http::{
        dto::{
            api_error, ApiError, BucketDetailDto, CreateFolderDto, ErrorResponseDto,
            SuccessResponseDto,
        },
        router::AppState,
    },
    domain::models::{format_size, BucketDescriptor},
};

/// Liveness check
pub async fn health(State(app_state): State<AppState>) -> Json<SuccessResponseDto> {
    Json(SuccessResponseDto::with_data(
        "Service healthy",
        json!({
            "buckets": app_state.catalog.buckets().len(),
            "uploading": app_state.uploads.uploading_count(),
            "queued": app_state.uploads.queued_count(),
        }),
    ))
}

/// List every configured bucket
pub async fn list_buckets(State(app_state): State<AppState>) -> Json<Vec<BucketDescriptor>> {
    Json(app_state.catalog.buckets().to_vec())
}

/// Describe one bucket together with the type families it accepts
pub async fn get_bucket(
    State(app_state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<Json<BucketDetailDto>, ApiError> {
    let bucket = parse_bucket(bucket)?;
    let catalog = &app_state.catalog;

    let descriptor = catalog.resolve(&bucket).map_err(api_error)?;
    let type_families = catalog
        .type_families_for(&bucket)
        .map_err(api_error)?
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(BucketDetailDto {
        max_object_size_label: format_size(descriptor.max_object_size),
        bucket: descriptor.clone(),
        type_families,
    }))
}

/// Create an empty folder (and any missing ancestors)
pub async fn create_folder(
    State(app_state): State<AppState>,
    Path(bucket): Path<String>,
    Json(request): Json<CreateFolderDto>,
) -> Result<(StatusCode, Json<SuccessResponseDto>), ApiError> {
    let bucket = parse_bucket(bucket)?;
    let path = parse_folder(Some(request.path))?;

    if path.is_root() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponseDto::bad_request("Folder path must not be empty")),
        ));
    }

    app_state
        .store
        .create_folder(&bucket, &path)
        .await
        .map_err(api_error)?;

    tracing::info!(bucket = %bucket, folder = %path, "Folder created");

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponseDto::with_data(
            "Folder created successfully",
            json!({ "path": path.as_str() }),
        )),
    ))
}
