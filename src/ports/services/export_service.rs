use async_trait::async_trait;
use bytes::Bytes;

#[cfg(test)]
use mockall::automock;

use crate::domain::{errors::BrowserResult, models::ExportPayload};

/// Port for the remote transform service that renders export artifacts.
///
/// Any error is treated as a transport failure by the pipeline, which then
/// serializes the payload locally.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteExportService: Send + Sync + 'static {
    /// Render `payload` in the format identified by `format_key`
    async fn export_report(&self, format_key: &str, payload: &ExportPayload)
        -> BrowserResult<Bytes>;
}
