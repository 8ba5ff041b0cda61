use anyhow::{Context, Result};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod test_utils;

#[tokio::main]
async fn main() -> Result<()> {
    // --- .env file, if any ---
    dotenv::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!(config = ?cfg, "starting image-store");

    // --- Ensure storage directory exists and is writable ---
    let storage = services::storage_service::StorageService::new(
        cfg.upload_dir.clone(),
        cfg.max_upload_bytes,
    );
    storage.ensure_directory().await.with_context(|| {
        format!(
            "preparing storage directory {}",
            cfg.upload_dir.display()
        )
    })?;
    tracing::info!("Storing images in {}", cfg.upload_dir.display());

    // --- Build router ---
    let app = routes::routes::app(storage);

    // --- Start server ---
    let listener = bind_listener(&cfg).await?;

    tracing::info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Bind the configured address. A wildcard host that the process may not
/// bind is retried on loopback with the same port.
async fn bind_listener(cfg: &config::AppConfig) -> Result<TcpListener> {
    let addr = cfg.addr();
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let loopback = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(%addr, %loopback, error = %err, "bind refused, retrying on loopback");
            TcpListener::bind(&loopback)
                .await
                .with_context(|| format!("binding {}", loopback))
        }
        Err(err) => Err(err).with_context(|| format!("binding {}", addr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(host: &str, port: u16) -> config::AppConfig {
        config::AppConfig {
            host: host.into(),
            port,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn binds_requested_address() {
        let listener = bind_listener(&config("127.0.0.1", 0)).await.unwrap();
        let local = listener.local_addr().unwrap();
        assert!(local.ip().is_loopback());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn address_in_use_is_not_retried() {
        let taken = bind_listener(&config("127.0.0.1", 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind_listener(&config("127.0.0.1", port)).await.unwrap_err();
        assert!(err.to_string().contains(&format!("127.0.0.1:{}", port)));
    }
}
