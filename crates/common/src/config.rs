//! Application configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// External engine (ffmpeg) settings.
    pub engine: EngineConfig,

    /// Style resolution settings.
    pub style: StyleConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the server binds to.
    pub bind: SocketAddr,

    /// Directory where multipart uploads are written for the lifetime of a request.
    pub upload_dir: PathBuf,

    /// Directory rendered outputs are written to.
    pub downloads_dir: PathBuf,

    /// URL path prefix under which `downloads_dir` is served.
    pub public_downloads_path: String,

    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
}

/// External engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine binary (resolved through PATH when relative).
    pub ffmpeg_path: PathBuf,

    /// Probe binary used for best-effort media inspection.
    pub ffprobe_path: PathBuf,

    /// Write an `.ffmpeg-debug.txt` report next to every output.
    pub debug_report: bool,

    /// Number of trailing diagnostic characters returned on failure.
    pub diagnostics_tail_chars: usize,
}

/// Engine color literal layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    /// `0xBBGGRRAA`: red and blue swapped, alpha byte appended.
    #[default]
    PackedBgra,
    /// `0xRRGGBBAA`: plain hex substitution.
    Hex,
}

/// Style resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Color literal strategy.
    pub color_format: ColorFormat,

    /// Extra font directories searched before the OS defaults.
    pub font_dirs: Vec<PathBuf>,

    /// Family used when a requested family has no usable file.
    pub default_font_family: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shortsmith=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            upload_dir: data.join("uploads"),
            downloads_dir: data.join("downloads"),
            public_downloads_path: "/downloads".to_string(),
            max_upload_bytes: 500 * 1024 * 1024,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            debug_report: false,
            diagnostics_tail_chars: 1000,
        }
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            color_format: ColorFormat::PackedBgra,
            font_dirs: Vec::new(),
            default_font_family: "DejaVuSans".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the given location.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shortsmith").join("config.json")
}

/// Default data directory for uploads and downloads.
fn data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("shortsmith")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.engine.debug_report = true;
        config.style.color_format = ColorFormat::Hex;
        config.logging.level = "debug".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert!(loaded.engine.debug_report);
        assert_eq!(loaded.style.color_format, ColorFormat::Hex);
        assert_eq!(loaded.logging.level, "debug");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"engine":{"ffmpeg_path":"/opt/ffmpeg/bin/ffmpeg"}}"#).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.engine.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(loaded.engine.diagnostics_tail_chars, 1000);
        assert_eq!(loaded.server.public_downloads_path, "/downloads");
    }

    #[test]
    fn test_unparseable_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.style.color_format, ColorFormat::PackedBgra);
    }

    #[test]
    fn test_color_format_serde_names() {
        assert_eq!(
            serde_json::to_string(&ColorFormat::PackedBgra).unwrap(),
            "\"packed_bgra\""
        );
        assert_eq!(
            serde_json::from_str::<ColorFormat>("\"hex\"").unwrap(),
            ColorFormat::Hex
        );
    }
}
