use anyhow::{Context, Result};
use clap::Parser;
use object_browser::{
    app::{AppBuilder, AppConfig, ExportConfig, StorageBackendConfig},
    services::UploadConfig,
};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "object-browser-server")]
#[command(about = "Bucket-scoped object browser with uploads, bulk delete and report exports", long_about = None)]
struct Cli {
    /// Server port to listen on
    #[arg(short, long, env = "SERVER_PORT", default_value = "3000")]
    port: u16,

    /// Server host to bind to
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Storage backend type (memory | local)
    #[arg(long, env = "STORAGE_BACKEND", default_value = "memory")]
    storage_backend: String,

    /// Root directory for the local backend
    #[arg(long, env = "STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// JSON bucket catalog; built-in buckets when omitted
    #[arg(long, env = "CATALOG_PATH")]
    catalog_path: Option<PathBuf>,

    /// Uploads transferred at the same time
    #[arg(long, env = "MAX_CONCURRENT_UPLOADS", default_value = "3")]
    max_concurrent_uploads: usize,

    /// Per-upload timeout in seconds
    #[arg(long, env = "UPLOAD_TIMEOUT_SECS", default_value = "60")]
    upload_timeout_secs: u64,

    /// Simulated progress tick in milliseconds
    #[arg(long, env = "PROGRESS_INTERVAL_MS", default_value = "200")]
    progress_interval_ms: u64,

    /// Finished upload outcomes kept for lookup and retry
    #[arg(long, env = "RETAINED_UPLOAD_OUTCOMES", default_value = "256")]
    retained_upload_outcomes: usize,

    /// Bulk deletes above this many objects need explicit confirmation
    #[arg(long, env = "DELETE_CONFIRMATION_THRESHOLD", default_value = "1")]
    delete_confirmation_threshold: usize,

    /// Base URL of the remote export service
    #[arg(long, env = "EXPORT_REMOTE_URL")]
    export_remote_url: Option<String>,

    /// Render every export locally
    #[arg(long, env = "EXPORT_OFFLINE", default_value = "false")]
    export_offline: bool,

    /// Remote export timeout in seconds
    #[arg(long, env = "EXPORT_TIMEOUT_SECS", default_value = "30")]
    export_timeout_secs: u64,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn to_app_config(&self) -> Result<AppConfig> {
        let storage_backend = match self.storage_backend.as_str() {
            "memory" => StorageBackendConfig::InMemory,
            "local" => {
                let root = self
                    .storage_root
                    .clone()
                    .context("STORAGE_ROOT is required for local backend")?;
                StorageBackendConfig::Local { root }
            }
            _ => anyhow::bail!("Unknown storage backend: {}", self.storage_backend),
        };

        let config = AppConfig {
            storage_backend,
            catalog_path: self.catalog_path.clone(),
            uploads: UploadConfig {
                max_concurrent_uploads: self.max_concurrent_uploads,
                upload_timeout: Duration::from_secs(self.upload_timeout_secs),
                progress_interval: Duration::from_millis(self.progress_interval_ms),
                retained_outcomes: self.retained_upload_outcomes,
            },
            delete_confirmation_threshold: self.delete_confirmation_threshold,
            export: ExportConfig {
                remote_url: self.export_remote_url.clone(),
                offline: self.export_offline,
                timeout: Duration::from_secs(self.export_timeout_secs),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn init_logging(&self) -> Result<()> {
        let level = match self.log_level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        };
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=debug", level)));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to install tracing subscriber")?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    cli.init_logging()?;

    info!("Starting Object Browser Server");
    info!("Storage backend: {}", cli.storage_backend);

    let config = cli.to_app_config()?;
    let app_services = AppBuilder::new()
        .with_config(config)
        .build()
        .await
        .context("Failed to build application")?;

    let router = app_services.router();

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .context("Invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    // Let in-flight uploads settle before exiting
    app_services.uploads.wait_idle().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "object-browser-server",
            "--port",
            "8080",
            "--storage-backend",
            "local",
            "--storage-root",
            "/tmp/objects",
            "--max-concurrent-uploads",
            "5",
        ]);

        assert_eq!(cli.port, 8080);
        assert_eq!(cli.storage_backend, "local");
        assert_eq!(cli.storage_root, Some(PathBuf::from("/tmp/objects")));

        let config = cli.to_app_config().unwrap();
        assert_eq!(config.uploads.max_concurrent_uploads, 5);
        assert_eq!(
            config.storage_backend,
            StorageBackendConfig::Local {
                root: PathBuf::from("/tmp/objects")
            }
        );
    }

    #[test]
    fn test_local_backend_requires_root() {
        let cli = Cli::parse_from(["object-browser-server", "--storage-backend", "local"]);
        if cli.storage_root.is_none() {
            assert!(cli.to_app_config().is_err());
        }
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let cli = Cli::parse_from(["object-browser-server", "--storage-backend", "s3"]);
        assert!(cli.to_app_config().is_err());
    }
}
