mod storage_backend;

#[cfg(test)]
pub use storage_backend::MockStorageBackend;
pub use storage_backend::{BackendListing, StorageBackend};
