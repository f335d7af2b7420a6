mod export_service;

#[cfg(test)]
pub use export_service::MockRemoteExportService;
pub use export_service::RemoteExportService;
