pub mod bucket_handlers;
pub mod export_handlers;
pub mod object_handlers;
pub mod upload_handlers;

pub use bucket_handlers::*;
pub use export_handlers::*;
pub use object_handlers::*;
pub use upload_handlers::*;

use crate::{
    adapters::inbound::http::dto::{api_error, ApiError},
    domain::value_objects::{BucketId, FolderPath},
};

fn parse_bucket(bucket: String) -> Result<BucketId, ApiError> {
    BucketId::new(bucket).map_err(|e| api_error(e.into()))
}

/// A missing folder parameter means the bucket root
fn parse_folder(folder: Option<String>) -> Result<FolderPath, ApiError> {
    match folder {
        Some(folder) => FolderPath::parse(folder).map_err(|e| api_error(e.into())),
        None => Ok(FolderPath::root()),
    }
}
