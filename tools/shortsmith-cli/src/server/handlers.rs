//! Route handlers.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use shortsmith_render_engine::export::{export_scene, ExportReport};
use shortsmith_render_engine::job::{RenderJob, TempFiles};
use shortsmith_scene_model::{
    MediaFile, RankingRequest, RenderMode, SceneDescription, SplitScreenRequest,
};

use super::response::{ApiError, ApiResult, ExportResponse};
use super::upload::{self, UploadForm};
use super::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/export/ranking`: `config`, repeated `clips`, optional `music`.
pub async fn export_ranking(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<ExportResponse>> {
    let form = upload::receive(multipart, &state.config.server.upload_dir).await?;
    let request: RankingRequest = parse_config(&form)?;
    let clips = form
        .files("clips")
        .iter()
        .map(MediaFile::new)
        .collect::<Vec<_>>();
    let scene = SceneDescription::ranking(request, clips, form.file("music"))?;
    tracing::info!(clips = scene.clips().len(), "Ranking export requested");
    run_export(&state, scene, form.temp).await
}

/// `POST /api/export/splitscreen`: `config`, `main`, `background`, optional `music`.
pub async fn export_split_screen(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<ExportResponse>> {
    let form = upload::receive(multipart, &state.config.server.upload_dir).await?;
    let request: SplitScreenRequest = parse_config(&form)?;
    let main = MediaFile::new(form.require_file("main")?);
    let background = MediaFile::new(form.require_file("background")?);
    let scene = SceneDescription::split_screen(request, main, background, form.file("music"))?;
    tracing::info!("Split-screen export requested");
    run_export(&state, scene, form.temp).await
}

fn parse_config<T: serde::de::DeserializeOwned>(form: &UploadForm) -> ApiResult<T> {
    serde_json::from_str(form.config()?)
        .map_err(|e| ApiError::bad_request(format!("Invalid config: {e}")))
}

async fn run_export(
    state: &AppState,
    scene: SceneDescription,
    temp: TempFiles,
) -> ApiResult<Json<ExportResponse>> {
    let server = &state.config.server;
    let mut job = RenderJob::in_dir(
        &server.downloads_dir,
        scene.mode(),
        temp,
        state.config.engine.diagnostics_tail_chars,
    );
    let report = export_scene(&mut job, &scene, &state.config.engine, &state.style, None).await?;
    Ok(Json(export_response(&server.public_downloads_path, &report)))
}

fn export_response(public_path: &str, report: &ExportReport) -> ExportResponse {
    let url_for = |path: &FsPath| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| format!("{}/{name}", public_path.trim_end_matches('/')))
    };
    ExportResponse {
        url: url_for(&report.output_path).unwrap_or_default(),
        size: report.size_bytes,
        duration: report.duration_secs,
        subtitles: report.subtitles_path.as_deref().and_then(url_for),
    }
}

/// Whether `name` is a plain file name safe to look up in the downloads dir.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Content type of a file the downloads route serves. Only rendered videos
/// and subtitle sidecars are public.
fn content_type(name: &str) -> Option<&'static str> {
    match FsPath::new(name).extension().and_then(|e| e.to_str()) {
        Some("mp4") => Some("video/mp4"),
        Some("srt") => Some("application/x-subrip"),
        _ => None,
    }
}

const DOWNLOAD_CHUNK_BYTES: usize = 64 * 1024;

async fn next_chunk(mut file: File) -> std::io::Result<Option<(Vec<u8>, File)>> {
    let mut buf = vec![0u8; DOWNLOAD_CHUNK_BYTES];
    let n = file.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some((buf, file)))
}

/// `GET /downloads/{file}`.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    if !is_safe_file_name(&file) {
        return Err(ApiError::bad_request("Invalid file name"));
    }
    let Some(content_type) = content_type(&file) else {
        return Err(ApiError::not_found("File not found"));
    };
    let path = state.config.server.downloads_dir.join(&file);
    let handle = match File::open(&path).await {
        Ok(handle) => handle,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"))
        }
        Err(e) => return Err(ApiError::internal("Failed to read file", e.to_string())),
    };
    let meta = handle
        .metadata()
        .await
        .map_err(|e| ApiError::internal("Failed to read file", e.to_string()))?;
    if !meta.is_file() {
        return Err(ApiError::not_found("File not found"));
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, meta.len())
        .body(Body::from_stream(futures::stream::try_unfold(handle, next_chunk)))
        .map_err(|e| ApiError::internal("Failed to build response", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::upload::tests::{multipart, Part};
    use shortsmith_common::config::AppConfig;
    use shortsmith_render_engine::supervisor::SupervisorState;
    use std::path::PathBuf;

    fn state(root: &FsPath) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.server.upload_dir = root.join("uploads");
        config.server.downloads_dir = root.join("downloads");
        config.engine.ffmpeg_path = PathBuf::from("/nonexistent/shortsmith-ffmpeg");
        config.engine.ffprobe_path = PathBuf::from("/nonexistent/shortsmith-ffprobe");
        Arc::new(AppState::new(config))
    }

    fn uploads_left(root: &FsPath) -> usize {
        std::fs::read_dir(root.join("uploads"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[test]
    fn test_safe_file_names() {
        assert!(is_safe_file_name("ranking_Ab12Cd34Ef56Gh78.mp4"));
        assert!(is_safe_file_name("splitscreen_x.srt"));
        assert!(!is_safe_file_name("../secret"));
        assert!(!is_safe_file_name(".hidden"));
        assert!(!is_safe_file_name("a/b.mp4"));
        assert!(!is_safe_file_name("a b.mp4"));
        assert!(!is_safe_file_name(""));
    }

    #[test]
    fn test_export_response_urls() {
        let report = ExportReport {
            output_path: PathBuf::from("/srv/out/ranking_abc.mp4"),
            size_bytes: 42,
            duration_secs: 15.0,
            state: SupervisorState::CleanedUp,
            subtitles_path: Some(PathBuf::from("/srv/out/ranking_abc.srt")),
            diagnostics_tail: String::new(),
            started_at: "2026-01-01T00:00:00+00:00".to_string(),
            elapsed_secs: 1.0,
        };
        let response = export_response("/downloads/", &report);
        assert_eq!(response.url, "/downloads/ranking_abc.mp4");
        assert_eq!(response.subtitles.as_deref(), Some("/downloads/ranking_abc.srt"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "url": "/downloads/ranking_abc.mp4",
                "size": 42,
                "duration": 15.0,
                "subtitles": "/downloads/ranking_abc.srt"
            })
        );
    }

    #[tokio::test]
    async fn test_ranking_without_clips_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let parts: &[Part<'_>] = &[("config", None, b"{}".as_slice())];
        let err = export_ranking(State(state), multipart(parts).await)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_config_removes_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let parts: &[Part<'_>] = &[
            ("config", None, br#"{"fps": 0}"#.as_slice()),
            ("clips", Some("a.mp4"), b"clip".as_slice()),
        ];
        let err = export_ranking(State(state), multipart(parts).await)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(uploads_left(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_split_screen_requires_background() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let parts: &[Part<'_>] = &[
            ("config", None, b"{}".as_slice()),
            ("main", Some("main.mp4"), b"main".as_slice()),
        ];
        let err = export_split_screen(State(state), multipart(parts).await)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::bad_request("Missing background file"));
        assert_eq!(uploads_left(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_engine_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let parts: &[Part<'_>] = &[
            ("config", None, br#"{"title": {"text": "Top 3"}}"#.as_slice()),
            ("clips", Some("a.mp4"), b"one".as_slice()),
            ("clips", Some("b.mp4"), b"two".as_slice()),
        ];
        let err = export_ranking(State(state), multipart(parts).await)
            .await
            .unwrap_err();
        match err {
            ApiError::Internal { error, details } => {
                assert_eq!(error, "Video engine is unavailable");
                assert!(details.contains("not found"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(uploads_left(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_download_serves_rendered_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        std::fs::create_dir_all(&state.config.server.downloads_dir).unwrap();
        std::fs::write(state.config.server.downloads_dir.join("ranking_abc.mp4"), b"video").unwrap();

        let response = download(State(Arc::clone(&state)), Path("ranking_abc.mp4".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"video");

        let missing = download(State(Arc::clone(&state)), Path("ranking_zzz.mp4".to_string()))
            .await
            .unwrap_err();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let traversal = download(State(state), Path("..".to_string())).await.unwrap_err();
        assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_streams_large_files_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        std::fs::create_dir_all(&state.config.server.downloads_dir).unwrap();
        let video: Vec<u8> = (0..DOWNLOAD_CHUNK_BYTES * 2 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(state.config.server.downloads_dir.join("ranking_big.mp4"), &video).unwrap();

        let response = download(State(state), Path("ranking_big.mp4".to_string()))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.len(), video.len());
        assert_eq!(&body[..], video.as_slice());
    }

    #[tokio::test]
    async fn test_debug_reports_are_not_served() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        std::fs::create_dir_all(&state.config.server.downloads_dir).unwrap();
        std::fs::write(
            state.config.server.downloads_dir.join("ranking_abc.ffmpeg-debug.txt"),
            b"[command]\nffmpeg -i /uploads/a.mp4",
        )
        .unwrap();

        let err = download(State(state), Path("ranking_abc.ffmpeg-debug.txt".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(content_type("ranking_abc.srt"), Some("application/x-subrip"));
        assert_eq!(content_type("notes.txt"), None);
    }
}
