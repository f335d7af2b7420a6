pub mod http_export_client;
pub mod offline_export_service;

pub use http_export_client::HttpExportClient;
pub use offline_export_service::OfflineExportService;
