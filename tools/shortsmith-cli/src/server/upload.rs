//! Multipart intake: the `config` text field plus uploaded files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;

use shortsmith_render_engine::job::{random_id, TempFiles};

use super::response::{ApiError, ApiResult};

/// Field carrying the scene config JSON.
pub const CONFIG_FIELD: &str = "config";

/// Fields and files received for one request.
///
/// Every written file is owned by `temp` and removed when the form (or the
/// job it is handed to) is done with it.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub config: Option<String>,
    files: HashMap<String, Vec<PathBuf>>,
    pub temp: TempFiles,
}

impl UploadForm {
    /// The config JSON, required for every export.
    pub fn config(&self) -> ApiResult<&str> {
        match self.config.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ApiError::bad_request("Missing config field")),
        }
    }

    /// Files uploaded under `field`, in upload order.
    pub fn files(&self, field: &str) -> &[PathBuf] {
        self.files.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The single file uploaded under `field`, if any.
    pub fn file(&self, field: &str) -> Option<PathBuf> {
        self.files(field).first().cloned()
    }

    /// The single file uploaded under `field`, or a 400.
    pub fn require_file(&self, field: &str) -> ApiResult<PathBuf> {
        self.file(field)
            .ok_or_else(|| ApiError::bad_request(format!("Missing {field} file")))
    }
}

/// Read every multipart field, streaming files into `upload_dir`.
pub async fn receive(mut multipart: Multipart, upload_dir: &Path) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::internal("Upload directory unavailable", e.to_string()))?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == CONFIG_FIELD && field.file_name().is_none() {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Unreadable config field: {e}")))?;
            form.config = Some(text);
            continue;
        }

        let extension = upload_extension(field.file_name());
        let path = upload_dir.join(format!("{}.{extension}", random_id()));
        form.temp.register(&path);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ApiError::internal("Failed to store upload", e.to_string()))?;
        let mut written: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request(format!("Upload interrupted: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal("Failed to store upload", e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::internal("Failed to store upload", e.to_string()))?;

        tracing::debug!(field = %name, path = %path.display(), bytes = written, "Stored upload");
        form.files.entry(name).or_default().push(path);
    }

    Ok(form)
}

/// Extension kept from the client file name, `bin` when absent or unusual.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::{FromRequest, Request};
    use axum::http::header::CONTENT_TYPE;

    const BOUNDARY: &str = "shortsmith-test-boundary";

    /// A multipart part: field name, optional file name, contents.
    pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

    pub async fn multipart(parts: &[Part<'_>]) -> Multipart {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[test]
    fn test_upload_extension() {
        assert_eq!(upload_extension(Some("Clip One.MP4")), "mp4");
        assert_eq!(upload_extension(Some("song.mp3")), "mp3");
        assert_eq!(upload_extension(Some("noext")), "bin");
        assert_eq!(upload_extension(Some("weird.ext$")), "bin");
        assert_eq!(upload_extension(None), "bin");
    }

    #[tokio::test]
    async fn test_receive_groups_files_by_field() {
        let dir = tempfile::tempdir().unwrap();
        let parts: &[Part<'_>] = &[
            ("config", None, br#"{"quality":"low"}"#.as_slice()),
            ("clips", Some("a.mp4"), b"first".as_slice()),
            ("clips", Some("b.mov"), b"second".as_slice()),
            ("music", Some("song.mp3"), b"music".as_slice()),
        ];
        let form = receive(multipart(parts).await, dir.path()).await.unwrap();

        assert_eq!(form.config().unwrap(), r#"{"quality":"low"}"#);
        let clips = form.files("clips");
        assert_eq!(clips.len(), 2);
        assert_eq!(std::fs::read(&clips[0]).unwrap(), b"first");
        assert_eq!(std::fs::read(&clips[1]).unwrap(), b"second");
        assert!(clips[1].to_string_lossy().ends_with(".mov"));
        assert!(form.file("music").is_some());
        assert!(form.file("main").is_none());
        assert_eq!(form.temp.paths().len(), 3);

        let written = clips.to_vec();
        drop(form);
        assert!(written.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_missing_config_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let form = receive(multipart(&[("clips", Some("a.mp4"), b"x".as_slice())]).await, dir.path())
            .await
            .unwrap();
        assert_eq!(form.config().unwrap_err(), ApiError::bad_request("Missing config field"));
        assert_eq!(
            form.require_file("main").unwrap_err(),
            ApiError::bad_request("Missing main file")
        );
    }
}
