use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::future::try_join_all;
use object_store::{
    local::LocalFileSystem, memory::InMemory, path::Path as ObjectPath,
    ObjectStore as ApacheObjectStore, PutPayload,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

use crate::{
    adapters::outbound::storage::error::StoreError,
    domain::{
        errors::{BrowserError, BrowserResult},
        models::{FileObject, UploadObjectRequest},
        value_objects::{BucketId, FolderPath, ObjectId},
    },
    ports::{BackendListing, StorageBackend},
    services::BucketCatalog,
};

pub const ETAG_METADATA_KEY: &str = "etag";
pub const CONTENT_TYPE_METADATA_KEY: &str = "content-type";

/// StorageBackend over Apache `object_store`.
///
/// Bytes live at `{bucket}/{folder}/{name}`. Ids, type families and custom metadata
/// are kept in an index next to the store; files found in the store without an
/// index entry are adopted on the next listing, unless an upload to that location is
/// still in flight.
pub struct ObjectStoreBackend {
    inner: Arc<dyn ApacheObjectStore>,
    catalog: Arc<BucketCatalog>,
    index: RwLock<HashMap<BucketId, BTreeMap<ObjectId, IndexEntry>>>,
    /// Locations being written, with the number of concurrent writers
    uploading: Mutex<HashMap<ObjectPath, usize>>,
}

#[derive(Clone)]
struct IndexEntry {
    folder: FolderPath,
    location: ObjectPath,
    object: FileObject,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ApacheObjectStore>, catalog: Arc<BucketCatalog>) -> Self {
        Self {
            inner: store,
            catalog,
            index: RwLock::new(HashMap::new()),
            uploading: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory(catalog: Arc<BucketCatalog>) -> Self {
        Self::new(Arc::new(InMemory::new()), catalog)
    }

    /// Files under `root`, which is created when missing
    pub fn local(root: impl AsRef<Path>, catalog: Arc<BucketCatalog>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root.as_ref())?;
        let store = LocalFileSystem::new_with_prefix(root.as_ref())?;
        Ok(Self::new(Arc::new(store), catalog))
    }

    fn folder_prefix(bucket: &BucketId, folder: &FolderPath) -> ObjectPath {
        if folder.is_root() {
            ObjectPath::from(bucket.as_str())
        } else {
            ObjectPath::from(format!("{}/{}", bucket, folder))
        }
    }

    fn location(bucket: &BucketId, folder: &FolderPath, name: &str) -> ObjectPath {
        Self::folder_prefix(bucket, folder).child(name)
    }

    fn calculate_etag(data: &[u8]) -> String {
        format!("{:x}", md5::compute(data))
    }

    /// Folder path of a listed prefix relative to its bucket
    fn relative_folder(bucket: &BucketId, prefix: &ObjectPath) -> Result<FolderPath, StoreError> {
        let raw = prefix.as_ref();
        let relative = raw
            .strip_prefix(bucket.as_str())
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| StoreError::InvalidPath(raw.to_string()))?;
        FolderPath::parse(relative).map_err(|e| StoreError::InvalidPath(e.to_string()))
    }

    fn begin_upload(&self, location: &ObjectPath) {
        let mut uploading = self.uploading.lock().unwrap_or_else(PoisonError::into_inner);
        *uploading.entry(location.clone()).or_insert(0) += 1;
    }

    fn end_upload(&self, location: &ObjectPath) {
        let mut uploading = self.uploading.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = uploading.get_mut(location) {
            *count -= 1;
            if *count == 0 {
                uploading.remove(location);
            }
        }
    }

    fn is_uploading(&self, location: &ObjectPath) -> bool {
        self.uploading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(location)
    }

    async fn stage_for_rollback(&self, entries: &[IndexEntry]) -> Result<Vec<(ObjectPath, Bytes)>, StoreError> {
        let fetches = entries.iter().map(|entry| async move {
            let bytes = self.inner.get(&entry.location).await?.bytes().await?;
            Ok::<_, StoreError>((entry.location.clone(), bytes))
        });
        try_join_all(fetches).await
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn list_objects(
        &self,
        bucket: &BucketId,
        folder: &FolderPath,
    ) -> BrowserResult<BackendListing> {
        let prefix = Self::folder_prefix(bucket, folder);
        let listing = self
            .inner
            .list_with_delimiter(Some(&prefix))
            .await
            .map_err(|e| StoreError::from(e).into_browser_error("list_objects"))?;

        let mut folders = Vec::with_capacity(listing.common_prefixes.len());
        for common in &listing.common_prefixes {
            match Self::relative_folder(bucket, common) {
                Ok(path) => folders.push(path),
                Err(e) => tracing::warn!(bucket = %bucket, error = %e, "Skipping unreadable folder"),
            }
        }

        let mut index = self.index.write().await;
        let entries = index.entry(bucket.clone()).or_default();
        let by_location: HashMap<ObjectPath, ObjectId> = entries
            .values()
            .map(|entry| (entry.location.clone(), entry.object.id))
            .collect();

        let mut files = Vec::with_capacity(listing.objects.len());
        for meta in listing.objects {
            if let Some(entry) = by_location.get(&meta.location).and_then(|id| entries.get(id)) {
                files.push(entry.object.clone());
                continue;
            }

            if self.is_uploading(&meta.location) {
                tracing::debug!(bucket = %bucket, location = %meta.location, "Skipping file with upload in flight");
                continue;
            }
            let Some(name) = meta.location.filename().map(str::to_string) else {
                continue;
            };
            let family = match self.catalog.family_for_name(bucket, &name)? {
                Some(family) => family.id.clone(),
                None => {
                    tracing::debug!(bucket = %bucket, name = %name, "Ignoring file outside bucket policy");
                    continue;
                }
            };

            let mut metadata = BTreeMap::new();
            if let Some(etag) = &meta.e_tag {
                metadata.insert(ETAG_METADATA_KEY.to_string(), etag.clone());
            }
            let object = FileObject {
                id: ObjectId::generate(),
                name,
                size_bytes: meta.size,
                type_family: family,
                last_modified: meta.last_modified,
                metadata,
            };
            entries.insert(
                object.id,
                IndexEntry {
                    folder: folder.clone(),
                    location: meta.location,
                    object: object.clone(),
                },
            );
            files.push(object);
        }

        Ok(BackendListing { folders, files })
    }

    async fn upload_object(&self, request: UploadObjectRequest) -> BrowserResult<FileObject> {
        let location = Self::location(&request.bucket, &request.folder, &request.name);
        let etag = Self::calculate_etag(&request.data);
        let size_bytes = request.data.len() as u64;

        self.begin_upload(&location);
        if let Err(e) = self
            .inner
            .put(&location, PutPayload::from(request.data.clone()))
            .await
        {
            self.end_upload(&location);
            return Err(StoreError::from(e).into_browser_error("upload_object"));
        }

        let mut metadata = request.metadata;
        metadata.insert(ETAG_METADATA_KEY.to_string(), etag);
        if let Some(content_type) = request.content_type {
            metadata.insert(CONTENT_TYPE_METADATA_KEY.to_string(), content_type);
        }

        let object = FileObject {
            id: ObjectId::generate(),
            name: request.name,
            size_bytes,
            type_family: request.type_family,
            last_modified: Utc::now(),
            metadata,
        };

        let mut index = self.index.write().await;
        let entries = index.entry(request.bucket.clone()).or_default();
        // Same key overwrites the previous object
        entries.retain(|_, entry| entry.location != location);
        entries.insert(
            object.id,
            IndexEntry {
                folder: request.folder,
                location: location.clone(),
                object: object.clone(),
            },
        );
        // Indexed before the location stops counting as in flight
        self.end_upload(&location);

        tracing::debug!(bucket = %request.bucket, object_id = %object.id, size = size_bytes, "Object stored");
        Ok(object)
    }

    async fn delete_objects(
        &self,
        bucket: &BucketId,
        ids: &BTreeSet<ObjectId>,
    ) -> BrowserResult<usize> {
        let mut index = self.index.write().await;
        let Some(entries) = index.get_mut(bucket) else {
            return match ids.iter().next() {
                Some(id) => Err(BrowserError::ObjectNotFound { id: *id }),
                None => Ok(0),
            };
        };

        if let Some(missing) = ids.iter().find(|id| !entries.contains_key(id)) {
            return Err(BrowserError::ObjectNotFound { id: *missing });
        }

        let targets: Vec<IndexEntry> = ids
            .iter()
            .filter_map(|id| entries.get(id).cloned())
            .collect();
        let staged = self
            .stage_for_rollback(&targets)
            .await
            .map_err(|e| e.into_browser_error("delete_objects"))?;

        for (position, entry) in targets.iter().enumerate() {
            if let Err(e) = self.inner.delete(&entry.location).await {
                tracing::error!(bucket = %bucket, error = %e, "Delete failed, restoring removed objects");
                for (location, bytes) in staged.iter().take(position) {
                    if let Err(restore) = self.inner.put(location, PutPayload::from(bytes.clone())).await {
                        tracing::error!(location = %location, error = %restore, "Failed to restore object");
                    }
                }
                return Err(StoreError::from(e).into_browser_error("delete_objects"));
            }
        }

        for id in ids {
            entries.remove(id);
        }
        Ok(targets.len())
    }
}
