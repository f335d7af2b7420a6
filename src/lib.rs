pub mod adapters;
pub mod app;
pub mod domain;
pub mod ports;
pub mod services;

// Re-export key types for convenience

// Domain types - core business entities and value objects
pub use domain::{
    // Value objects
    BucketId,
    // Models
    BucketDescriptor,
    // Errors
    BrowserError,
    BrowserResult,
    ErrorKind,
    ExportArtifact,
    ExportRequest,
    ExportRoute,
    FileObject,
    FolderDescriptor,
    FolderPath,
    ObjectFilter,
    ObjectId,
    ObjectView,
    PolicyViolation,
    SortField,
    SortOrder,
    TypeFamilyId,
    UploadEvent,
    UploadId,
    UploadOutcome,
    UploadSource,
    UploadState,
    UploadTask,
    ValidationError,
};

// Port types - interfaces for external systems
pub use ports::{BackendListing, RemoteExportService, StorageBackend};

// Service implementations - business logic
pub use services::{
    BucketCatalog, ExportPipeline, FormatRegistry, ObjectStore, SectionRegistry,
    SelectionManager, UploadConfig, UploadCoordinator,
};

// Application factory and configuration
pub use app::{
    create_app_from_env, create_in_memory_app, create_local_app, AppBuilder, AppConfig,
    AppDependencies, AppError, AppServices, ExportConfig, StorageBackendConfig,
};

// Adapter types - infrastructure implementations
pub use adapters::outbound::{
    export::{HttpExportClient, OfflineExportService},
    storage::ObjectStoreBackend,
};

// Public facade for easy construction
pub mod prelude {
    pub use crate::{
        create_app_from_env, create_in_memory_app, AppBuilder, AppServices, BrowserError,
        BucketId, ExportRequest, FolderPath, ObjectStore, SelectionManager, StorageBackend,
        UploadCoordinator, UploadSource,
    };
}
