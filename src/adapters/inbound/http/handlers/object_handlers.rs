use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::collections::BTreeSet;

use super::{parse_bucket, parse_folder};
use crate::{
    adapters::inbound::http::{
        dto::{
            api_error, ApiError, BulkDeleteDto, BulkDeleteResponseDto, ListObjectsQuery,
            ListObjectsResponseDto,
        },
        router::AppState,
    },
    domain::{
        errors::{BrowserError, ErrorKind},
        models::{ObjectFilter, ObjectView},
        value_objects::{BucketId, FolderPath, ObjectId, TypeFamilyId},
    },
    services::SelectionManager,
};

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Handle folder listing with filter, sort and paging
pub async fn list_objects(
    State(app_state): State<AppState>,
    Path(bucket): Path<String>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Json<ListObjectsResponseDto>, ApiError> {
    let bucket = parse_bucket(bucket)?;
    let folder = parse_folder(query.folder)?;

    let mut filter = ObjectFilter::new();
    if let Some(search) = query.search {
        filter = filter.with_search(search);
    }
    if let Some(family) = query.type_family {
        let family = TypeFamilyId::new(family).map_err(|e| api_error(e.into()))?;
        filter = filter.with_type_family(family);
    }

    let view = current_view(&app_state, &bucket, &folder)
        .await
        .map_err(api_error)?
        .filter(&filter)
        .sort_by(query.sort.unwrap_or_default(), query.order.unwrap_or_default());

    let page = view.page(
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    Ok(Json(ListObjectsResponseDto::new(
        bucket.to_string(),
        folder.to_string(),
        view.folders,
        page,
    )))
}

/// Handle bulk deletion of objects selected in one folder
pub async fn delete_objects(
    State(app_state): State<AppState>,
    Path(bucket): Path<String>,
    Json(request): Json<BulkDeleteDto>,
) -> Result<Json<BulkDeleteResponseDto>, ApiError> {
    let bucket = parse_bucket(bucket)?;
    let folder = parse_folder(request.folder)?;

    let ids = request
        .ids
        .iter()
        .map(|id| ObjectId::parse(id))
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|e| api_error(e.into()))?;

    let view = current_view(&app_state, &bucket, &folder)
        .await
        .map_err(api_error)?;

    let mut selection =
        SelectionManager::new(app_state.store.clone(), app_state.backend.clone(), view)
            .with_threshold(app_state.delete_confirmation_threshold);
    for id in ids {
        selection.toggle(id).await.map_err(api_error)?;
    }

    let removed = selection
        .bulk_delete(request.confirm)
        .await
        .map_err(api_error)?;

    Ok(Json(BulkDeleteResponseDto { removed }))
}

/// Refresh from the backend, serving the cached listing when the backend is unreachable
async fn current_view(
    app_state: &AppState,
    bucket: &BucketId,
    folder: &FolderPath,
) -> Result<ObjectView, BrowserError> {
    match app_state
        .store
        .refresh(app_state.backend.as_ref(), bucket, folder)
        .await
    {
        Ok(view) => Ok(view),
        Err(e) if e.kind() == ErrorKind::TransportFailure => {
            tracing::warn!(bucket = %bucket, folder = %folder, error = %e, "Backend listing failed, serving cached view");
            app_state.store.list(bucket, folder).await
        }
        Err(e) => Err(e),
    }
}
