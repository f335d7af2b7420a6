use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;

use crate::{
    adapters::outbound::storage::StoreError,
    domain::{errors::BrowserResult, models::ExportPayload},
    ports::RemoteExportService,
};

/// Client for the remote transform service: `POST {base_url}/exports/{format_key}`
/// with the projected payload as JSON, artifact bytes in the response body.
#[derive(Debug, Clone)]
pub struct HttpExportClient {
    client: Client,
    base_url: String,
}

impl HttpExportClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, format_key: &str, payload: &ExportPayload) -> Result<Bytes, StoreError> {
        let url = format!("{}/exports/{}", self.base_url, format_key);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| StoreError::Other(format!("Failed to reach export service: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Http {
                status: http::StatusCode::from_u16(status.as_u16())
                    .unwrap_or(http::StatusCode::BAD_GATEWAY),
                message,
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| StoreError::Other(format!("Failed to read export response: {}", e)))
    }
}

#[async_trait]
impl RemoteExportService for HttpExportClient {
    async fn export_report(&self, format_key: &str, payload: &ExportPayload) -> BrowserResult<Bytes> {
        self.request(format_key, payload)
            .await
            .map_err(|e| e.into_browser_error("export_report"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use crate::domain::models::ExportSectionDescriptor;
    use axum::{extract::Path, http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}", addr)
    }

    fn payload() -> ExportPayload {
        let section = ExportSectionDescriptor::new("risk_summary", "Risk Summary", &["condition"]);
        ExportPayload::project("P-1", &section, &[])
    }

    #[tokio::test]
    async fn test_posts_payload_and_returns_body() {
        let router = Router::new().route(
            "/exports/{format}",
            post(|Path(format): Path<String>, Json(body): Json<Value>| async move {
                format!("{}:{}", format, body["section_key"].as_str().unwrap_or_default())
            }),
        );
        let base = serve(router).await;

        let client = HttpExportClient::new(&format!("{}/", base), Duration::from_secs(5));
        let bytes = client.export_report("pdf-text", &payload()).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"pdf-text:risk_summary"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_failure() {
        let router = Router::new().route(
            "/exports/{format}",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let base = serve(router).await;

        let err = HttpExportClient::new(&base, Duration::from_secs(5))
            .export_report("csv", &payload())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(err.to_string().contains("maintenance"));
    }
}
