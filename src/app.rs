use axum::Router;
use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use crate::{
    adapters::{
        inbound::http::{create_router, AppState},
        outbound::{
            export::{HttpExportClient, OfflineExportService},
            storage::ObjectStoreBackend,
        },
    },
    ports::{RemoteExportService, StorageBackend},
    services::{
        BucketCatalog, ExportPipeline, ObjectStore, UploadConfig, UploadCoordinator,
        DEFAULT_CONFIRMATION_THRESHOLD, DEFAULT_EXPORT_TIMEOUT,
    },
};

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_backend: StorageBackendConfig,
    /// JSON bucket catalog; the built-in catalog when absent
    pub catalog_path: Option<PathBuf>,
    pub uploads: UploadConfig,
    pub delete_confirmation_threshold: usize,
    pub export: ExportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackendConfig::InMemory,
            catalog_path: None,
            uploads: UploadConfig::default(),
            delete_confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
            export: ExportConfig::default(),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackendConfig {
    InMemory,
    Local { root: PathBuf },
}

/// Export service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Base URL of the remote transform service
    pub remote_url: Option<String>,
    /// Skip the remote service even when one is configured
    pub offline: bool,
    pub timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            offline: false,
            timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Build a configuration from environment-style variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognised keys: `STORAGE_BACKEND` (`memory` | `local`), `STORAGE_ROOT`,
    /// `CATALOG_PATH`, `MAX_CONCURRENT_UPLOADS`, `UPLOAD_TIMEOUT_SECS`,
    /// `PROGRESS_INTERVAL_MS`, `RETAINED_UPLOAD_OUTCOMES`, `DELETE_CONFIRMATION_THRESHOLD`,
    /// `EXPORT_REMOTE_URL`, `EXPORT_OFFLINE`, `EXPORT_TIMEOUT_SECS`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = AppConfig::default();

        config.storage_backend = match var("STORAGE_BACKEND").as_deref() {
            Some("local") => {
                let root = var("STORAGE_ROOT").ok_or_else(|| AppError::Configuration {
                    message: "STORAGE_ROOT environment variable required".to_string(),
                })?;
                StorageBackendConfig::Local { root: root.into() }
            }
            Some("memory") | None => StorageBackendConfig::InMemory,
            Some(other) => {
                return Err(AppError::Configuration {
                    message: format!("Unknown STORAGE_BACKEND '{}'", other),
                })
            }
        };
        config.catalog_path = var("CATALOG_PATH").map(PathBuf::from);

        if let Some(max) = parse_var::<usize>(&var, "MAX_CONCURRENT_UPLOADS")? {
            config.uploads.max_concurrent_uploads = max;
        }
        if let Some(secs) = parse_var::<u64>(&var, "UPLOAD_TIMEOUT_SECS")? {
            config.uploads.upload_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&var, "PROGRESS_INTERVAL_MS")? {
            config.uploads.progress_interval = Duration::from_millis(ms);
        }
        if let Some(retained) = parse_var::<usize>(&var, "RETAINED_UPLOAD_OUTCOMES")? {
            config.uploads.retained_outcomes = retained;
        }
        if let Some(threshold) = parse_var::<usize>(&var, "DELETE_CONFIRMATION_THRESHOLD")? {
            config.delete_confirmation_threshold = threshold;
        }

        config.export.remote_url = var("EXPORT_REMOTE_URL").filter(|url| !url.trim().is_empty());
        config.export.offline = var("EXPORT_OFFLINE")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);
        if let Some(secs) = parse_var::<u64>(&var, "EXPORT_TIMEOUT_SECS")? {
            config.export.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.uploads.max_concurrent_uploads == 0 {
            return Err(AppError::Configuration {
                message: "max_concurrent_uploads must be at least 1".to_string(),
            });
        }
        if self.uploads.retained_outcomes == 0 {
            return Err(AppError::Configuration {
                message: "retained_outcomes must be at least 1".to_string(),
            });
        }
        if self.uploads.progress_interval.is_zero() {
            return Err(AppError::Configuration {
                message: "progress_interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, AppError> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Configuration {
                message: format!("{} must be a non-negative integer, got '{}'", name, raw),
            }),
        None => Ok(None),
    }
}

/// Application dependencies container
pub struct AppDependencies {
    pub catalog: Arc<BucketCatalog>,
    pub backend: Arc<dyn StorageBackend>,
    pub remote_export: Arc<dyn RemoteExportService>,
}

/// Application services container
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<BucketCatalog>,
    pub store: ObjectStore,
    pub backend: Arc<dyn StorageBackend>,
    pub uploads: UploadCoordinator,
    pub exports: ExportPipeline,
    pub delete_confirmation_threshold: usize,
}

impl AppServices {
    pub fn app_state(&self) -> AppState {
        AppState {
            catalog: self.catalog.clone(),
            store: self.store.clone(),
            backend: self.backend.clone(),
            uploads: self.uploads.clone(),
            exports: self.exports.clone(),
            delete_confirmation_threshold: self.delete_confirmation_threshold,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.app_state())
    }
}

/// Application builder for dependency injection
pub struct AppBuilder {
    config: AppConfig,
}

impl AppBuilder {
    /// Create a new application builder
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// Configure the application with custom settings
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_storage_backend(mut self, backend: StorageBackendConfig) -> Self {
        self.config.storage_backend = backend;
        self
    }

    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.catalog_path = Some(path.into());
        self
    }

    pub fn with_upload_config(mut self, uploads: UploadConfig) -> Self {
        self.config.uploads = uploads;
        self
    }

    pub fn with_delete_confirmation_threshold(mut self, threshold: usize) -> Self {
        self.config.delete_confirmation_threshold = threshold;
        self
    }

    pub fn with_export_config(mut self, export: ExportConfig) -> Self {
        self.config.export = export;
        self
    }

    /// Build the application dependencies
    pub async fn build_dependencies(&self) -> Result<AppDependencies, AppError> {
        let catalog = Arc::new(self.load_catalog()?);
        let backend = self.create_storage_backend(catalog.clone())?;
        let remote_export = self.create_remote_export();

        Ok(AppDependencies {
            catalog,
            backend,
            remote_export,
        })
    }

    /// Build the complete application with services
    pub async fn build(self) -> Result<AppServices, AppError> {
        self.config.validate()?;
        let deps = self.build_dependencies().await?;

        let store = ObjectStore::new(deps.catalog.clone());
        let uploads = UploadCoordinator::new(
            store.clone(),
            deps.backend.clone(),
            self.config.uploads.clone(),
        );
        // Without a remote URL every export is rendered locally
        let offline = self.config.export.offline || self.config.export.remote_url.is_none();
        let exports = ExportPipeline::builder()
            .remote(deps.remote_export)
            .offline(offline)
            .timeout(self.config.export.timeout)
            .build();

        tracing::info!(
            buckets = deps.catalog.buckets().len(),
            max_concurrent_uploads = self.config.uploads.max_concurrent_uploads,
            export_offline = exports.is_offline(),
            "Application services built"
        );

        Ok(AppServices {
            catalog: deps.catalog,
            store,
            backend: deps.backend,
            uploads,
            exports,
            delete_confirmation_threshold: self.config.delete_confirmation_threshold,
        })
    }

    fn load_catalog(&self) -> Result<BucketCatalog, AppError> {
        let catalog = match &self.config.catalog_path {
            Some(path) => BucketCatalog::load(path)?,
            None => BucketCatalog::builtin()?,
        };
        Ok(catalog)
    }

    fn create_storage_backend(
        &self,
        catalog: Arc<BucketCatalog>,
    ) -> Result<Arc<dyn StorageBackend>, AppError> {
        match &self.config.storage_backend {
            StorageBackendConfig::InMemory => Ok(Arc::new(ObjectStoreBackend::in_memory(catalog))),
            StorageBackendConfig::Local { root } => {
                let backend =
                    ObjectStoreBackend::local(root, catalog).map_err(|e| AppError::StorageInit {
                        message: format!("{}: {}", root.display(), e),
                    })?;
                Ok(Arc::new(backend))
            }
        }
    }

    /// No configured URL means every export is rendered locally
    fn create_remote_export(&self) -> Arc<dyn RemoteExportService> {
        match &self.config.export.remote_url {
            Some(url) => Arc::new(HttpExportClient::new(url, self.config.export.timeout)),
            None => Arc::new(OfflineExportService),
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage initialization error: {message}")]
    StorageInit { message: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] crate::domain::errors::BrowserError),
}

/// Convenience functions for common configurations
///
/// Create an in-memory application for testing and development
pub async fn create_in_memory_app() -> Result<AppServices, AppError> {
    AppBuilder::new()
        .with_storage_backend(StorageBackendConfig::InMemory)
        .build()
        .await
}

/// Create an application persisting object bytes under `root`
pub async fn create_local_app(root: impl Into<PathBuf>) -> Result<AppServices, AppError> {
    AppBuilder::new()
        .with_storage_backend(StorageBackendConfig::Local { root: root.into() })
        .build()
        .await
}

/// Create application from environment variables
pub async fn create_app_from_env() -> Result<AppServices, AppError> {
    let config = AppConfig::from_vars(|name| std::env::var(name).ok())?;
    AppBuilder::new().with_config(config).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn test_create_in_memory_app() {
        let app = create_in_memory_app().await.unwrap();

        assert_eq!(app.catalog.buckets().len(), 5);
        assert_eq!(app.delete_confirmation_threshold, 1);
        assert_eq!(app.uploads.config().max_concurrent_uploads, 3);
        assert!(app.exports.is_offline());
    }

    #[tokio::test]
    async fn test_remote_url_enables_remote_exports() {
        let app = AppBuilder::new()
            .with_export_config(ExportConfig {
                remote_url: Some("http://127.0.0.1:9".to_string()),
                ..ExportConfig::default()
            })
            .build()
            .await
            .unwrap();
        assert!(!app.exports.is_offline());
    }

    #[tokio::test]
    async fn test_create_local_app() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_local_app(dir.path().join("objects")).await.unwrap();

        assert!(dir.path().join("objects").is_dir());
        assert_eq!(app.catalog.buckets().len(), 5);
    }

    #[test]
    fn test_config_defaults_from_empty_environment() {
        let config = AppConfig::from_vars(vars(&[])).unwrap();

        assert_eq!(config.storage_backend, StorageBackendConfig::InMemory);
        assert_eq!(config.uploads.max_concurrent_uploads, 3);
        assert_eq!(config.uploads.upload_timeout, Duration::from_secs(60));
        assert_eq!(config.uploads.progress_interval, Duration::from_millis(200));
        assert_eq!(config.delete_confirmation_threshold, 1);
        assert_eq!(config.export, ExportConfig::default());
        assert_eq!(config.export.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_from_environment() {
        let config = AppConfig::from_vars(vars(&[
            ("STORAGE_BACKEND", "local"),
            ("STORAGE_ROOT", "/var/lib/objects"),
            ("MAX_CONCURRENT_UPLOADS", "5"),
            ("RETAINED_UPLOAD_OUTCOMES", "32"),
            ("DELETE_CONFIRMATION_THRESHOLD", "10"),
            ("EXPORT_REMOTE_URL", "http://exports.internal"),
            ("EXPORT_OFFLINE", "TRUE"),
            ("EXPORT_TIMEOUT_SECS", "4"),
        ]))
        .unwrap();

        assert_eq!(
            config.storage_backend,
            StorageBackendConfig::Local {
                root: PathBuf::from("/var/lib/objects")
            }
        );
        assert_eq!(config.uploads.max_concurrent_uploads, 5);
        assert_eq!(config.uploads.retained_outcomes, 32);
        assert_eq!(config.delete_confirmation_threshold, 10);
        assert_eq!(
            config.export.remote_url.as_deref(),
            Some("http://exports.internal")
        );
        assert!(config.export.offline);
        assert_eq!(config.export.timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_vars(vars(&[("STORAGE_BACKEND", "local")])),
            Err(AppError::Configuration { .. })
        ));
        assert!(matches!(
            AppConfig::from_vars(vars(&[("STORAGE_BACKEND", "tape")])),
            Err(AppError::Configuration { .. })
        ));
        assert!(matches!(
            AppConfig::from_vars(vars(&[("MAX_CONCURRENT_UPLOADS", "many")])),
            Err(AppError::Configuration { .. })
        ));
        assert!(matches!(
            AppConfig::from_vars(vars(&[("MAX_CONCURRENT_UPLOADS", "0")])),
            Err(AppError::Configuration { .. })
        ));
        assert!(matches!(
            AppConfig::from_vars(vars(&[("RETAINED_UPLOAD_OUTCOMES", "0")])),
            Err(AppError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_catalog_file_fails_build() {
        let result = AppBuilder::new()
            .with_catalog_path("/definitely/not/here/catalog.json")
            .build()
            .await;

        assert!(matches!(result, Err(AppError::Catalog(_))));
    }
}
