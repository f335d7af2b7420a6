use async_trait::async_trait;
use std::collections::BTreeSet;

#[cfg(test)]
use mockall::automock;

use crate::domain::{
    errors::BrowserResult,
    models::{FileObject, UploadObjectRequest},
    value_objects::{BucketId, FolderPath, ObjectId},
};

/// Contents of one folder as reported by the backing service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendListing {
    /// Immediate subfolders, including empty ones
    pub folders: Vec<FolderPath>,
    /// Files stored directly in the folder
    pub files: Vec<FileObject>,
}

/// Port for the backing storage service.
/// Transport details (HTTP, S3, local disk) live in the adapters.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// List the folders and files directly under `folder`
    async fn list_objects(
        &self,
        bucket: &BucketId,
        folder: &FolderPath,
    ) -> BrowserResult<BackendListing>;

    /// Store the bytes and return the object as the backend recorded it
    async fn upload_object(&self, request: UploadObjectRequest) -> BrowserResult<FileObject>;

    /// Delete every id or none of them; returns the number removed
    async fn delete_objects(
        &self,
        bucket: &BucketId,
        ids: &BTreeSet<ObjectId>,
    ) -> BrowserResult<usize>;
}
