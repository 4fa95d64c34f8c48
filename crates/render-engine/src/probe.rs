//! Best-effort media inspection through the probe binary.
//!
//! Every function here degrades to `None` when the probe is missing or
//! its output cannot be parsed; callers keep their defaults in that case.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use shortsmith_scene_model::{SceneDescription, SceneLayout};

/// Whether `binary` resolves through the shell's PATH lookup.
pub async fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .stdin(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// First line of `<engine> -version`.
pub async fn engine_version(engine: &Path) -> Option<String> {
    let output = Command::new(engine)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8(output.stdout).ok()?;
    raw.lines().next().map(|line| line.trim().to_string())
}

async fn probe_lines(ffprobe: &Path, args: &[&str], path: &Path) -> Option<String> {
    let output = Command::new(ffprobe)
        .args(["-v", "error"])
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// Container duration in seconds.
pub async fn probe_duration(ffprobe: &Path, path: &Path) -> Option<f64> {
    let raw = probe_lines(
        ffprobe,
        &["-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"],
        path,
    )
    .await?;
    parse_duration(&raw)
}

/// Whether the file has at least one audio stream.
pub async fn probe_has_audio(ffprobe: &Path, path: &Path) -> Option<bool> {
    let raw = probe_lines(
        ffprobe,
        &["-select_streams", "a", "-show_entries", "stream=index", "-of", "csv=p=0"],
        path,
    )
    .await?;
    Some(raw.lines().any(|line| !line.trim().is_empty()))
}

fn parse_duration(raw: &str) -> Option<f64> {
    let value = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Refine what the scene assumes about its inputs.
///
/// Clips and the split-screen main file get their real audio presence, and
/// a split-screen scene without an explicit duration takes the main file's.
pub async fn refine_scene(scene: &SceneDescription, ffprobe: &Path) -> SceneDescription {
    let mut scene = scene.clone();
    match &mut scene.layout {
        SceneLayout::Ranking { clips } => {
            for clip in clips.iter_mut() {
                if let Some(has_audio) = probe_has_audio(ffprobe, &clip.path).await {
                    clip.has_audio = has_audio;
                }
            }
        }
        SceneLayout::SplitScreen(split) => {
            if let Some(has_audio) = probe_has_audio(ffprobe, &split.main.path).await {
                split.main.has_audio = has_audio;
            }
            if split.duration.is_none() {
                split.duration = probe_duration(ffprobe, &split.main.path).await;
                if split.duration.is_none() {
                    tracing::warn!(
                        path = %split.main.path.display(),
                        "Main clip duration unknown, progress will not be reported"
                    );
                }
            }
        }
    }
    scene
}
