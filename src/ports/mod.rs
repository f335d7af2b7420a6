pub mod services;
pub mod storage;

// Re-export all port traits for convenience
pub use services::RemoteExportService;
pub use storage::{BackendListing, StorageBackend};

#[cfg(test)]
pub use services::MockRemoteExportService;
#[cfg(test)]
pub use storage::MockStorageBackend;
