use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    domain::{
        errors::{BrowserError, BrowserResult},
        models::ExportPayload,
    },
    ports::RemoteExportService,
};

/// Remote export stand-in that always fails, so every export is rendered locally
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineExportService;

#[async_trait]
impl RemoteExportService for OfflineExportService {
    async fn export_report(&self, format_key: &str, _payload: &ExportPayload) -> BrowserResult<Bytes> {
        Err(BrowserError::transport(
            "export_report",
            format!("export service offline, cannot render '{}'", format_key),
        ))
    }
}
