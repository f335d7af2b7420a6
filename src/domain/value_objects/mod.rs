mod bucket_id;
mod folder_path;
mod identifiers;

pub use bucket_id::BucketId;
pub use folder_path::FolderPath;
pub use identifiers::{ObjectId, TypeFamilyId, UploadId};
