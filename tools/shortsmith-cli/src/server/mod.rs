//! HTTP export API.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use shortsmith_common::config::AppConfig;
use shortsmith_render_engine::style::StyleResolver;

pub mod handlers;
pub mod response;
pub mod upload;

/// Immutable state shared by every request.
#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub style: StyleResolver,
}

impl AppState {
    /// Build the state, scanning font directories once.
    pub fn new(config: AppConfig) -> Self {
        let style = StyleResolver::from_config(&config.style);
        Self { config, style }
    }
}

/// Route path serving rendered files.
fn downloads_route(public_path: &str) -> String {
    let prefix = public_path.trim_end_matches('/');
    format!("{prefix}/:file")
}

pub fn router(state: Arc<AppState>) -> Router {
    let downloads = downloads_route(&state.config.server.public_downloads_path);
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/export/ranking", post(handlers::export_ranking))
        .route("/api/export/splitscreen", post(handlers::export_split_screen))
        .route(&downloads, get(handlers::download))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.server.upload_dir).await?;
    tokio::fs::create_dir_all(&config.server.downloads_dir).await?;

    let bind = config.server.bind;
    let state = Arc::new(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(
        bind = %bind,
        downloads = %state.config.server.downloads_dir.display(),
        engine = %state.config.engine.ffmpeg_path.display(),
        "Export server listening"
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downloads_route() {
        assert_eq!(downloads_route("/downloads"), "/downloads/:file");
        assert_eq!(downloads_route("/media/out/"), "/media/out/:file");
    }

    #[test]
    fn test_router_builds() {
        let _router = router(Arc::new(AppState::new(AppConfig::default())));
    }
}
