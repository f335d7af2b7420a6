use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::{
    domain::{
        errors::BrowserResult,
        models::{FileObject, FolderDescriptor, ObjectView},
        value_objects::{BucketId, FolderPath, ObjectId},
    },
    ports::StorageBackend,
    services::BucketCatalog,
};

/// The in-memory picture of every bucket's folders and files.
///
/// All mutations take the write lock for their whole duration, so readers only ever
/// see complete objects. Each mutation bumps a revision published on a watch channel.
#[derive(Clone)]
pub struct ObjectStore {
    catalog: Arc<BucketCatalog>,
    data: Arc<RwLock<StoreData>>,
    revision: Arc<watch::Sender<u64>>,
}

#[derive(Default)]
struct StoreData {
    buckets: HashMap<BucketId, BucketContents>,
}

#[derive(Default)]
struct BucketContents {
    objects: BTreeMap<ObjectId, StoredObject>,
    /// Folders created explicitly; folders holding objects are implied
    folders: BTreeSet<FolderPath>,
}

struct StoredObject {
    folder: FolderPath,
    object: FileObject,
}

impl BucketContents {
    fn add_folder(&mut self, path: &FolderPath) {
        let mut current = Some(path.clone());
        while let Some(folder) = current {
            if folder.is_root() {
                break;
            }
            current = folder.parent();
            self.folders.insert(folder);
        }
    }

    fn child_folders(&self, parent: &FolderPath) -> Vec<FolderDescriptor> {
        let mut children: BTreeMap<String, FolderDescriptor> = BTreeMap::new();

        let mut ensure = |name: &str| -> BrowserResult<()> {
            if !children.contains_key(name) {
                let path = parent.join(name)?;
                children.insert(
                    name.to_string(),
                    FolderDescriptor {
                        name: name.to_string(),
                        path,
                        file_count: 0,
                        total_size: 0,
                        last_modified: None,
                    },
                );
            }
            Ok(())
        };

        for folder in &self.folders {
            if let Some(name) = folder.child_of(parent) {
                // Stored paths are already valid, so joining one of their segments cannot fail
                let _ = ensure(name);
            }
        }
        for stored in self.objects.values() {
            if let Some(name) = stored.folder.child_of(parent) {
                let _ = ensure(name);
            }
        }

        for stored in self.objects.values() {
            let Some(name) = stored.folder.child_of(parent) else {
                continue;
            };
            if let Some(folder) = children.get_mut(name) {
                folder.file_count += 1;
                folder.total_size += stored.object.size_bytes;
                folder.last_modified = Some(match folder.last_modified {
                    Some(current) => current.max(stored.object.last_modified),
                    None => stored.object.last_modified,
                });
            }
        }

        children.into_values().collect()
    }
}

impl ObjectStore {
    pub fn new(catalog: Arc<BucketCatalog>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            catalog,
            data: Arc::new(RwLock::new(StoreData::default())),
            revision: Arc::new(revision),
        }
    }

    pub fn catalog(&self) -> &Arc<BucketCatalog> {
        &self.catalog
    }

    /// Current revision; increases by one per mutation
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Snapshot of one folder: its direct subfolders with aggregates, and the files it holds.
    /// An empty or never-touched bucket yields an empty view.
    pub async fn list(&self, bucket: &BucketId, folder: &FolderPath) -> BrowserResult<ObjectView> {
        self.catalog.resolve(bucket)?;
        let data = self.data.read().await;

        let Some(contents) = data.buckets.get(bucket) else {
            return Ok(ObjectView::new(bucket.clone(), folder.clone(), vec![], vec![]));
        };

        let mut files: Vec<FileObject> = contents
            .objects
            .values()
            .filter(|stored| &stored.folder == folder)
            .map(|stored| stored.object.clone())
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ObjectView::new(
            bucket.clone(),
            folder.clone(),
            contents.child_folders(folder),
            files,
        ))
    }

    /// Insert or replace an object. An object with the same name in the same folder is
    /// replaced, since the backend keys bytes by location. Objects whose type family the
    /// bucket does not accept are rejected.
    pub async fn insert(
        &self,
        bucket: &BucketId,
        folder: &FolderPath,
        object: FileObject,
    ) -> BrowserResult<()> {
        self.catalog.validate_object(bucket, &object)?;

        {
            let mut data = self.data.write().await;
            let contents = data.buckets.entry(bucket.clone()).or_default();
            contents.add_folder(folder);
            contents.objects.retain(|id, stored| {
                *id == object.id || &stored.folder != folder || stored.object.name != object.name
            });
            contents.objects.insert(
                object.id,
                StoredObject {
                    folder: folder.clone(),
                    object,
                },
            );
        }

        self.bump();
        Ok(())
    }

    /// Remove objects by id and return how many were present. Absent ids are ignored.
    pub async fn remove(&self, bucket: &BucketId, ids: &BTreeSet<ObjectId>) -> BrowserResult<usize> {
        self.catalog.resolve(bucket)?;

        let removed = {
            let mut data = self.data.write().await;
            match data.buckets.get_mut(bucket) {
                Some(contents) => ids
                    .iter()
                    .filter(|id| contents.objects.remove(id).is_some())
                    .count(),
                None => 0,
            }
        };

        if removed > 0 {
            self.bump();
        }
        Ok(removed)
    }

    /// Remove whatever object is cached under `name` in `folder`
    pub async fn remove_named(
        &self,
        bucket: &BucketId,
        folder: &FolderPath,
        name: &str,
    ) -> BrowserResult<usize> {
        self.catalog.resolve(bucket)?;

        let removed = {
            let mut data = self.data.write().await;
            match data.buckets.get_mut(bucket) {
                Some(contents) => {
                    let before = contents.objects.len();
                    contents
                        .objects
                        .retain(|_, stored| &stored.folder != folder || stored.object.name != name);
                    before - contents.objects.len()
                }
                None => 0,
            }
        };

        if removed > 0 {
            self.bump();
        }
        Ok(removed)
    }

    pub async fn get(&self, bucket: &BucketId, id: &ObjectId) -> Option<FileObject> {
        let data = self.data.read().await;
        data.buckets
            .get(bucket)
            .and_then(|contents| contents.objects.get(id))
            .map(|stored| stored.object.clone())
    }

    /// Which of `ids` are still present in the bucket
    pub async fn existing(&self, bucket: &BucketId, ids: &BTreeSet<ObjectId>) -> BTreeSet<ObjectId> {
        let data = self.data.read().await;
        match data.buckets.get(bucket) {
            Some(contents) => ids
                .iter()
                .filter(|id| contents.objects.contains_key(id))
                .copied()
                .collect(),
            None => BTreeSet::new(),
        }
    }

    pub async fn create_folder(&self, bucket: &BucketId, path: &FolderPath) -> BrowserResult<()> {
        self.catalog.resolve(bucket)?;
        {
            let mut data = self.data.write().await;
            data.buckets.entry(bucket.clone()).or_default().add_folder(path);
        }
        self.bump();
        Ok(())
    }

    /// Replace the cached contents of one folder with what the backend reports
    pub async fn refresh(
        &self,
        backend: &dyn StorageBackend,
        bucket: &BucketId,
        folder: &FolderPath,
    ) -> BrowserResult<ObjectView> {
        self.catalog.resolve(bucket)?;
        let listing = backend.list_objects(bucket, folder).await?;

        let mut accepted = Vec::with_capacity(listing.files.len());
        for object in listing.files {
            match self.catalog.validate_object(bucket, &object) {
                Ok(()) => accepted.push(object),
                Err(e) => tracing::warn!(
                    bucket = %bucket,
                    object = %object.name,
                    error = %e,
                    "Skipping listed object rejected by bucket policy"
                ),
            }
        }

        {
            let mut data = self.data.write().await;
            let contents = data.buckets.entry(bucket.clone()).or_default();
            contents.objects.retain(|_, stored| &stored.folder != folder);
            contents.add_folder(folder);
            for path in &listing.folders {
                contents.add_folder(path);
            }
            for object in accepted {
                contents.objects.insert(
                    object.id,
                    StoredObject {
                        folder: folder.clone(),
                        object,
                    },
                );
            }
        }

        self.bump();
        self.list(bucket, folder).await
    }

    /// Objects past their bucket's retention period. Deleting them is up to the caller.
    pub async fn expired(&self, bucket: &BucketId, now: DateTime<Utc>) -> BrowserResult<Vec<FileObject>> {
        let descriptor = self.catalog.resolve(bucket)?;
        let data = self.data.read().await;
        Ok(data
            .buckets
            .get(bucket)
            .map(|contents| {
                contents
                    .objects
                    .values()
                    .filter(|stored| descriptor.is_expired(&stored.object, now))
                    .map(|stored| stored.object.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
