use axum::{http::StatusCode, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::{
    domain::{
        errors::{BrowserError, ErrorKind},
        models::{
            format_size, BucketDescriptor, ExportSectionDescriptor, FileObject, FolderDescriptor,
            Page, Record, SortField, SortOrder, TypeFamilyDescriptor, UploadOutcome, UploadState,
            UploadTask,
        },
    },
    services::ExportFormatDescriptor,
};

/// DTO for a file object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileObjectDto {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub size: String,
    pub type_family: String,
    pub last_modified: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl From<FileObject> for FileObjectDto {
    fn from(object: FileObject) -> Self {
        Self {
            id: object.id.to_string(),
            size: object.display_size(),
            name: object.name,
            size_bytes: object.size_bytes,
            type_family: object.type_family.to_string(),
            last_modified: object.last_modified,
            metadata: object.metadata,
        }
    }
}

/// DTO for a folder with its aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderDto {
    pub name: String,
    pub path: String,
    pub file_count: usize,
    pub total_size: u64,
    pub size: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<FolderDescriptor> for FolderDto {
    fn from(folder: FolderDescriptor) -> Self {
        Self {
            name: folder.name,
            path: folder.path.to_string(),
            file_count: folder.file_count,
            size: format_size(folder.total_size),
            total_size: folder.total_size,
            last_modified: folder.last_modified,
        }
    }
}

/// DTO for one bucket with its type families
#[derive(Debug, Clone, Serialize)]
pub struct BucketDetailDto {
    #[serde(flatten)]
    pub bucket: BucketDescriptor,
    pub max_object_size_label: String,
    pub type_families: Vec<TypeFamilyDescriptor>,
}

/// Query string for listing objects
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListObjectsQuery {
    pub folder: Option<String>,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub type_family: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// DTO for a folder listing; `files` holds one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListObjectsResponseDto {
    pub bucket: String,
    pub folder: String,
    pub folders: Vec<FolderDto>,
    pub files: Vec<FileObjectDto>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl ListObjectsResponseDto {
    pub fn new(
        bucket: String,
        folder: String,
        folders: Vec<FolderDescriptor>,
        page: Page<FileObject>,
    ) -> Self {
        Self {
            bucket,
            folder,
            folders: folders.into_iter().map(FolderDto::from).collect(),
            files: page.items.into_iter().map(FileObjectDto::from).collect(),
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages: page.total_pages,
        }
    }
}

/// DTO for creating a folder
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFolderDto {
    pub path: String,
}

/// Query string for uploads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadQuery {
    pub folder: Option<String>,
}

/// Error attached to a failed upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadErrorDto {
    pub kind: ErrorKind,
    pub message: String,
}

/// DTO for an upload task, active or finished
#[derive(Debug, Clone, Serialize)]
pub struct UploadTaskDto {
    pub id: String,
    pub name: String,
    pub bucket: String,
    pub folder: String,
    pub size_bytes: u64,
    /// queued | uploading | completed | failed | cancelled
    pub state: String,
    pub progress: u8,
    pub error: Option<UploadErrorDto>,
    pub object: Option<FileObjectDto>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<UploadTask> for UploadTaskDto {
    fn from(task: UploadTask) -> Self {
        Self {
            id: task.id.to_string(),
            size_bytes: task.source.size(),
            name: task.source.name,
            bucket: task.target_bucket.to_string(),
            folder: task.target_folder.to_string(),
            state: task.state.to_string(),
            progress: task.progress,
            error: task.error.map(|e| UploadErrorDto {
                kind: e.kind(),
                message: e.to_string(),
            }),
            object: None,
            submitted_at: Some(task.submitted_at),
        }
    }
}

impl UploadTaskDto {
    pub fn from_outcome(id: String, outcome: UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Failed { task } => task.into(),
            UploadOutcome::Completed { object } => Self {
                id,
                name: object.name.clone(),
                bucket: String::new(),
                folder: String::new(),
                size_bytes: object.size_bytes,
                state: UploadState::Completed.to_string(),
                progress: 100,
                error: None,
                object: Some(object.into()),
                submitted_at: None,
            },
            cancelled @ UploadOutcome::Cancelled => Self {
                id,
                name: String::new(),
                bucket: String::new(),
                folder: String::new(),
                size_bytes: 0,
                state: cancelled.label().to_string(),
                progress: 0,
                error: None,
                object: None,
                submitted_at: None,
            },
        }
    }
}

/// DTO for upload submission response
#[derive(Debug, Clone, Serialize)]
pub struct UploadListDto {
    pub uploads: Vec<UploadTaskDto>,
}

/// DTO for bulk delete
#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeleteDto {
    pub ids: Vec<String>,
    #[serde(default)]
    pub confirm: bool,
    pub folder: Option<String>,
}

/// DTO for bulk delete response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteResponseDto {
    pub removed: usize,
}

/// DTO for an export request
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequestDto {
    pub subject_id: String,
    pub section: String,
    pub format: String,
    #[serde(default)]
    pub records: Vec<Record>,
    pub date: Option<NaiveDate>,
}

/// DTO describing an export format
#[derive(Debug, Clone, Serialize)]
pub struct ExportFormatDto {
    pub key: String,
    pub label: String,
    pub mime_type: String,
    pub extension: String,
    pub local_mime_type: String,
    pub local_extension: String,
}

impl From<&ExportFormatDescriptor> for ExportFormatDto {
    fn from(format: &ExportFormatDescriptor) -> Self {
        let local = format.local_rendition();
        Self {
            key: format.key.to_string(),
            label: format.label.to_string(),
            mime_type: format.mime_type().to_string(),
            extension: format.extension().to_string(),
            local_mime_type: local.mime_type.to_string(),
            local_extension: local.extension.to_string(),
        }
    }
}

/// DTO for export sections
#[derive(Debug, Clone, Serialize)]
pub struct ExportSectionListDto {
    pub sections: Vec<ExportSectionDescriptor>,
}

/// DTO for error responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponseDto {
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<HashMap<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

/// DTO for success responses
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponseDto {
    pub message: String,
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

pub type ApiError = (StatusCode, Json<ErrorResponseDto>);

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PolicyViolation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ConfirmationRequired | ErrorKind::AlreadyTerminal => StatusCode::CONFLICT,
        ErrorKind::TransportFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::ExportFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
    }
}

/// Map a domain error to its HTTP response
pub fn api_error(error: BrowserError) -> ApiError {
    (
        status_for(error.kind()),
        Json(ErrorResponseDto::from_browser_error(&error)),
    )
}

// Error response helpers

impl ErrorResponseDto {
    pub fn from_browser_error(error: &BrowserError) -> Self {
        let mut details = HashMap::new();

        match error {
            BrowserError::BucketNotFound { bucket } => {
                details.insert("bucket".to_string(), Value::String(bucket.to_string()));
            }
            BrowserError::ObjectNotFound { id } => {
                details.insert("id".to_string(), Value::String(id.to_string()));
            }
            BrowserError::UploadNotFound { id } => {
                details.insert("id".to_string(), Value::String(id.to_string()));
            }
            BrowserError::UnknownFormat { key } | BrowserError::UnknownSection { key } => {
                details.insert("key".to_string(), Value::String(key.clone()));
            }
            BrowserError::PolicyViolation {
                bucket,
                name,
                violation,
            } => {
                details.insert("bucket".to_string(), Value::String(bucket.to_string()));
                details.insert("name".to_string(), Value::String(name.clone()));
                details.insert("violation".to_string(), Value::String(violation.to_string()));
            }
            BrowserError::AlreadyTerminal { id, state } => {
                details.insert("id".to_string(), Value::String(id.to_string()));
                details.insert("state".to_string(), Value::String(state.clone()));
            }
            BrowserError::ConfirmationRequired { count, threshold } => {
                details.insert("count".to_string(), Value::Number((*count).into()));
                details.insert("threshold".to_string(), Value::Number((*threshold).into()));
            }
            _ => {}
        }

        ErrorResponseDto {
            error: error_title(error.kind()).to_string(),
            kind: error.kind(),
            message: error.to_string(),
            details: if details.is_empty() {
                None
            } else {
                Some(details)
            },
            timestamp: Utc::now(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        ErrorResponseDto {
            error: "BadRequest".to_string(),
            kind: ErrorKind::InvalidInput,
            message: message.to_string(),
            details: None,
            timestamp: Utc::now(),
        }
    }
}

fn error_title(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "NotFound",
        ErrorKind::PolicyViolation => "PolicyViolation",
        ErrorKind::TransportFailure => "TransportFailure",
        ErrorKind::ExportFailed => "ExportFailed",
        ErrorKind::AlreadyTerminal => "AlreadyTerminal",
        ErrorKind::ConfirmationRequired => "ConfirmationRequired",
        ErrorKind::InvalidInput => "BadRequest",
    }
}

impl SuccessResponseDto {
    pub fn new(message: &str) -> Self {
        SuccessResponseDto {
            message: message.to_string(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(message: &str, data: Value) -> Self {
        SuccessResponseDto {
            message: message.to_string(),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }
}
