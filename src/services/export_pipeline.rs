use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    domain::{
        errors::{BrowserError, BrowserResult},
        models::{
            artifact_filename, ExportArtifact, ExportPayload, ExportRequest, ExportRoute,
        },
    },
    ports::RemoteExportService,
    services::{
        format_registry::{ExportFormatDescriptor, FormatRegistry},
        SectionRegistry,
    },
};

pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns a result set into a downloadable artifact.
///
/// The remote service is tried first; any failure there, including an empty body or a
/// timeout, falls back to the local serializer. Only a failing local serializer is
/// reported to the caller.
#[derive(Clone)]
pub struct ExportPipeline {
    formats: Arc<FormatRegistry>,
    sections: Arc<SectionRegistry>,
    remote: Option<Arc<dyn RemoteExportService>>,
    offline: bool,
    timeout: Duration,
}

impl ExportPipeline {
    pub fn builder() -> ExportPipelineBuilder {
        ExportPipelineBuilder::new()
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn sections(&self) -> &SectionRegistry {
        &self.sections
    }

    /// True when every export is generated locally
    pub fn is_offline(&self) -> bool {
        self.offline || self.remote.is_none()
    }

    pub async fn export(&self, request: &ExportRequest) -> BrowserResult<ExportArtifact> {
        request.validate()?;
        let section = self.sections.get(&request.section_key)?;
        let payload = ExportPayload::project(&request.subject_id, section, &request.records);
        let format = self.formats.get(&request.format_key)?;
        let date = request.date.unwrap_or_else(|| Utc::now().date_naive());

        if let Some(bytes) = self.try_remote(format, &payload).await {
            tracing::info!(
                format = format.key,
                section = %payload.section_key,
                bytes = bytes.len(),
                "Export rendered remotely"
            );
            return Ok(ExportArtifact {
                filename: artifact_filename(
                    &payload.subject_id,
                    &payload.section_label,
                    date,
                    format.extension(),
                ),
                mime_type: format.mime_type().to_string(),
                bytes,
                route: ExportRoute::Remote,
            });
        }

        let bytes = (format.serialize)(&payload).map_err(|e| BrowserError::ExportFailed {
            reason: format!("local {} serialization failed: {}", format.key, e),
        })?;
        if bytes.is_empty() {
            return Err(BrowserError::ExportFailed {
                reason: format!("local {} serialization produced no output", format.key),
            });
        }

        let rendition = format.local_rendition();
        tracing::info!(
            format = format.key,
            section = %payload.section_key,
            bytes = bytes.len(),
            "Export rendered locally"
        );
        Ok(ExportArtifact {
            filename: artifact_filename(
                &payload.subject_id,
                &payload.section_label,
                date,
                rendition.extension,
            ),
            mime_type: rendition.mime_type.to_string(),
            bytes: bytes.into(),
            route: ExportRoute::Local,
        })
    }

    async fn try_remote(
        &self,
        format: &ExportFormatDescriptor,
        payload: &ExportPayload,
    ) -> Option<bytes::Bytes> {
        if self.offline {
            tracing::debug!(format = format.key, "Offline mode, skipping remote export");
            return None;
        }
        let remote = self.remote.as_ref()?;

        match tokio::time::timeout(self.timeout, remote.export_report(format.key, payload)).await {
            Ok(Ok(bytes)) if !bytes.is_empty() => Some(bytes),
            Ok(Ok(_)) => {
                tracing::warn!(format = format.key, "Remote export returned an empty body, falling back");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(format = format.key, error = %e, "Remote export failed, falling back");
                None
            }
            Err(_) => {
                tracing::warn!(
                    format = format.key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Remote export timed out, falling back"
                );
                None
            }
        }
    }
}

/// Builder for ExportPipeline
pub struct ExportPipelineBuilder {
    formats: Option<Arc<FormatRegistry>>,
    sections: Option<Arc<SectionRegistry>>,
    remote: Option<Arc<dyn RemoteExportService>>,
    offline: bool,
    timeout: Duration,
}

impl ExportPipelineBuilder {
    pub fn new() -> Self {
        Self {
            formats: None,
            sections: None,
            remote: None,
            offline: false,
            timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }

    pub fn formats(mut self, formats: Arc<FormatRegistry>) -> Self {
        self.formats = Some(formats);
        self
    }

    pub fn sections(mut self, sections: Arc<SectionRegistry>) -> Self {
        self.sections = Some(sections);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteExportService>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> ExportPipeline {
        ExportPipeline {
            formats: self
                .formats
                .unwrap_or_else(|| Arc::new(FormatRegistry::builtin())),
            sections: self
                .sections
                .unwrap_or_else(|| Arc::new(SectionRegistry::builtin())),
            remote: self.remote,
            offline: self.offline,
            timeout: self.timeout,
        }
    }
}

impl Default for ExportPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
