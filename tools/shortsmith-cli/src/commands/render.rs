//! Render a scene from local files.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;

use shortsmith_common::config::AppConfig;
use shortsmith_common::error::ShortsmithError;
use shortsmith_render_engine::command::assemble;
use shortsmith_render_engine::compiler::compile_scene;
use shortsmith_render_engine::export::export_scene;
use shortsmith_render_engine::job::{output_file_name, random_id, RenderJob, TempFiles};
use shortsmith_render_engine::probe;
use shortsmith_render_engine::style::StyleResolver;
use shortsmith_render_engine::supervisor::{EngineProgress, ProgressCallback};
use shortsmith_scene_model::{MediaFile, RenderMode, SceneDescription};

pub struct RenderArgs {
    pub mode: RenderMode,
    pub scene: Option<PathBuf>,
    pub clips: Vec<PathBuf>,
    pub main: Option<PathBuf>,
    pub background: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
}

pub async fn run(config: AppConfig, args: RenderArgs) -> anyhow::Result<()> {
    let scene = build_scene(&args)?;
    let style = StyleResolver::from_config(&config.style);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(output_file_name(args.mode, &random_id())));

    if args.dry_run {
        let scene = probe::refine_scene(&scene, &config.engine.ffprobe_path).await;
        let compiled = compile_scene(&scene, &style)?;
        let command = assemble(&config.engine.ffmpeg_path, &compiled, &output)?;
        println!("{command}");
        return Ok(());
    }

    println!("Rendering {} scene", args.mode.file_prefix());
    println!("  Inputs: {}", scene.input_files().len());
    println!("  Output: {}", output.display());

    // Local inputs belong to the user: the job owns no files.
    let mut job = RenderJob::new(&output, TempFiles::new(), config.engine.diagnostics_tail_chars);
    let progress: ProgressCallback = Box::new(|p: EngineProgress| {
        print!(
            "\r  Progress: {:>3}% ({:.1}s rendered, {:.0}s elapsed)  ",
            p.percent, p.position_secs, p.elapsed_secs
        );
        std::io::stdout().flush().ok();
    });

    match export_scene(&mut job, &scene, &config.engine, &style, Some(progress)).await {
        Ok(report) => {
            println!("\nExport complete: {}", report.output_path.display());
            println!("  Size: {} bytes", report.size_bytes);
            println!("  Duration: {:.2}s", report.duration_secs);
            if let Some(srt) = &report.subtitles_path {
                println!("  Subtitles: {}", srt.display());
            }
            Ok(())
        }
        Err(e) => {
            println!();
            if let ShortsmithError::Render { details, .. } = &e {
                eprintln!("{details}");
            }
            Err(anyhow::anyhow!("Export failed: {e}"))
        }
    }
}

fn build_scene(args: &RenderArgs) -> anyhow::Result<SceneDescription> {
    let scene = match args.mode {
        RenderMode::Ranking => {
            if args.clips.is_empty() {
                anyhow::bail!("ranking mode needs at least one --clip");
            }
            SceneDescription::ranking(
                read_request(args.scene.as_deref())?,
                args.clips.iter().map(MediaFile::new).collect(),
                args.music.clone(),
            )?
        }
        RenderMode::SplitScreen => {
            let main = args
                .main
                .as_ref()
                .context("splitscreen mode needs --main")?;
            let background = args
                .background
                .as_ref()
                .context("splitscreen mode needs --background")?;
            SceneDescription::split_screen(
                read_request(args.scene.as_deref())?,
                MediaFile::new(main),
                MediaFile::new(background),
                args.music.clone(),
            )?
        }
    };
    for input in scene.input_files() {
        if !input.exists() {
            return Err(ShortsmithError::FileNotFound {
                path: input.to_path_buf(),
            }
            .into());
        }
    }
    Ok(scene)
}

/// Parse a scene config file, or use defaults when none is given.
fn read_request<T: DeserializeOwned + Default>(path: Option<&Path>) -> anyhow::Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scene config {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid scene config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortsmith_scene_model::{QualityTier, RankingRequest};

    fn args(mode: RenderMode) -> RenderArgs {
        RenderArgs {
            mode,
            scene: None,
            clips: Vec::new(),
            main: None,
            background: None,
            music: None,
            output: None,
            dry_run: true,
        }
    }

    #[test]
    fn test_read_request() {
        let request: RankingRequest = read_request(None).unwrap();
        assert!(request.clips.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(&path, r#"{"quality": "high", "fps": 24}"#).unwrap();
        let request: RankingRequest = read_request(Some(&path)).unwrap();
        assert_eq!(request.quality, QualityTier::High);
        assert_eq!(request.fps, Some(24));

        std::fs::write(&path, "{").unwrap();
        assert!(read_request::<RankingRequest>(Some(&path)).is_err());
    }

    #[test]
    fn test_build_scene_checks_inputs() {
        let err = build_scene(&args(RenderMode::Ranking)).unwrap_err();
        assert!(err.to_string().contains("--clip"));

        let err = build_scene(&args(RenderMode::SplitScreen)).unwrap_err();
        assert!(err.to_string().contains("--main"));

        let mut missing = args(RenderMode::Ranking);
        missing.clips = vec![PathBuf::from("/nonexistent/clip.mp4")];
        let err = build_scene(&missing).unwrap_err();
        assert!(err.to_string().contains("File not found"));

        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"x").unwrap();
        let mut ok = args(RenderMode::Ranking);
        ok.clips = vec![clip.clone()];
        let scene = build_scene(&ok).unwrap();
        assert_eq!(scene.clips().len(), 1);
        assert!(clip.exists());
    }
}
