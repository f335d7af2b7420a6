use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{
    // Upload handlers
    cancel_upload,
    // Bucket handlers
    create_export,
    create_folder,
    delete_objects,
    get_bucket,
    get_upload,
    health,
    list_buckets,
    // Export handlers
    list_formats,
    // Object handlers
    list_objects,
    list_sections,
    list_uploads,
    retry_upload,
    upload_objects,
};
use crate::{
    ports::StorageBackend,
    services::{BucketCatalog, ExportPipeline, ObjectStore, UploadCoordinator},
};

/// Largest accepted request body; bucket policies enforce their own ceilings per object
pub const MAX_REQUEST_BODY_BYTES: usize = 512 * 1024 * 1024;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<BucketCatalog>,
    pub store: ObjectStore,
    pub backend: Arc<dyn StorageBackend>,
    pub uploads: UploadCoordinator,
    pub exports: ExportPipeline,
    pub delete_confirmation_threshold: usize,
}

/// Create the main application router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Buckets and folders
        .route("/buckets", get(list_buckets))
        .route("/buckets/{bucket}", get(get_bucket))
        .route("/buckets/{bucket}/folders", post(create_folder))
        // Objects
        .route("/buckets/{bucket}/objects", get(list_objects))
        .route("/buckets/{bucket}/objects/delete", post(delete_objects))
        // Uploads
        .route("/buckets/{bucket}/uploads", post(upload_objects))
        .route("/uploads", get(list_uploads))
        .route("/uploads/{id}", get(get_upload).delete(cancel_upload))
        .route("/uploads/{id}/retry", post(retry_upload))
        // Exports
        .route("/exports", post(create_export))
        .route("/exports/formats", get(list_formats))
        .route("/exports/sections", get(list_sections))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
