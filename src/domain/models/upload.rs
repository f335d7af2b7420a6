use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::errors::{BrowserError, ErrorKind};
use crate::domain::models::FileObject;
use crate::domain::value_objects::{BucketId, FolderPath, ObjectId, TypeFamilyId, UploadId};

/// A file handed to the coordinator by a caller
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSource {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub metadata: BTreeMap<String, String>,
}

impl UploadSource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Upload progress state machine: `Queued -> Uploading -> {Completed | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Queued,
    Uploading,
    Completed,
    Failed,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Failed)
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UploadState::Queued => "queued",
            UploadState::Uploading => "uploading",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single upload owned by the coordinator
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: UploadId,
    pub source: UploadSource,
    pub target_bucket: BucketId,
    pub target_folder: FolderPath,
    /// Resolved at acceptance; `None` only when the type check itself failed
    pub type_family: Option<TypeFamilyId>,
    pub state: UploadState,
    /// 0..=100, never decreases
    pub progress: u8,
    pub error: Option<BrowserError>,
    pub submitted_at: DateTime<Utc>,
}

impl UploadTask {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(BrowserError::kind)
    }
}

/// What became of a task after it left the active set
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Completed { object: FileObject },
    /// Keeps the failed task so it can be explicitly resubmitted
    Failed { task: UploadTask },
    Cancelled,
}

impl UploadOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            UploadOutcome::Completed { .. } => "completed",
            UploadOutcome::Failed { .. } => "failed",
            UploadOutcome::Cancelled => "cancelled",
        }
    }
}

/// Notifications published by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Queued { id: UploadId },
    Started { id: UploadId },
    Progress { id: UploadId, progress: u8 },
    Completed { id: UploadId, object_id: ObjectId },
    Failed { id: UploadId, kind: ErrorKind, message: String },
    Cancelled { id: UploadId },
}

impl UploadEvent {
    pub fn upload_id(&self) -> UploadId {
        match self {
            UploadEvent::Queued { id }
            | UploadEvent::Started { id }
            | UploadEvent::Progress { id, .. }
            | UploadEvent::Completed { id, .. }
            | UploadEvent::Failed { id, .. }
            | UploadEvent::Cancelled { id } => *id,
        }
    }
}

/// Request handed to the storage backend once a task is admitted
#[derive(Debug, Clone)]
pub struct UploadObjectRequest {
    pub bucket: BucketId,
    pub folder: FolderPath,
    pub name: String,
    pub type_family: TypeFamilyId,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub metadata: BTreeMap<String, String>,
}
