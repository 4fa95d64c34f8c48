//! Export pipeline: probe, compile, assemble, run, clean up.

use std::path::{Path, PathBuf};

use serde::Serialize;

use shortsmith_common::config::EngineConfig;
use shortsmith_common::error::{ShortsmithError, ShortsmithResult};
use shortsmith_scene_model::SceneDescription;

use crate::command::{assemble, EngineCommand};
use crate::compiler::{compile_scene, fmt_secs, CompiledScene};
use crate::job::{remove_quietly, RenderJob};
use crate::probe;
use crate::style::StyleResolver;
use crate::subtitles::to_srt;
use crate::supervisor::{ProgressCallback, SupervisorState};

/// Summary of a finished export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub output_path: PathBuf,
    pub size_bytes: u64,
    /// Output length in seconds, `0.0` when it could not be determined.
    pub duration_secs: f64,
    pub state: SupervisorState,
    /// SRT sidecar written next to the output when the scene has subtitles.
    pub subtitles_path: Option<PathBuf>,
    /// Last engine diagnostics, kept for logs and debugging.
    pub diagnostics_tail: String,
    /// Wall-clock job start, RFC 3339.
    pub started_at: String,
    pub elapsed_secs: f64,
}

/// Render a scene into `job.output_path`.
///
/// Job files are deleted on every path out of this function. A partial
/// output left behind by a failed engine run is deleted too.
pub async fn export_scene(
    job: &mut RenderJob,
    scene: &SceneDescription,
    engine: &EngineConfig,
    style: &StyleResolver,
    progress: Option<ProgressCallback>,
) -> ShortsmithResult<ExportReport> {
    tracing::info!(
        job = %job.id,
        mode = ?scene.mode(),
        output = %job.output_path.display(),
        started_at = %job.clock.epoch_wall(),
        "Starting export"
    );

    let result = run_export(job, scene, engine, style, progress.as_ref()).await;
    if result.is_err() {
        remove_quietly(&job.output_path);
    }

    let state = match job.finish() {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(job = %job.id, error = %e, "Supervisor rejected cleanup");
            job.state()
        }
    };

    match result {
        Ok(mut report) => {
            report.state = state;
            report.elapsed_secs = job.clock.elapsed_secs();
            tracing::info!(
                job = %job.id,
                size_bytes = report.size_bytes,
                duration_secs = report.duration_secs,
                elapsed_secs = report.elapsed_secs,
                "Export finished"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(job = %job.id, error = %e, "Export failed");
            Err(e)
        }
    }
}

async fn run_export(
    job: &mut RenderJob,
    scene: &SceneDescription,
    engine: &EngineConfig,
    style: &StyleResolver,
    progress: Option<&ProgressCallback>,
) -> ShortsmithResult<ExportReport> {
    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let scene = probe::refine_scene(scene, &engine.ffprobe_path).await;
    let compiled = compile_scene(&scene, style)?;
    let command = assemble(&engine.ffmpeg_path, &compiled, &job.output_path)?;
    tracing::info!(
        statements = compiled.program.statements.len(),
        inputs = compiled.inputs.len(),
        total_secs = compiled.total_secs(),
        subtitle_cards = compiled.subtitle_cards.len(),
        "Export plan built"
    );

    if engine.debug_report {
        let debug_path = debug_report_path(&job.output_path);
        match tokio::fs::write(&debug_path, debug_report(&compiled, &command)).await {
            Ok(()) => tracing::info!(path = %debug_path.display(), "Wrote ffmpeg debug report"),
            Err(e) => {
                tracing::warn!(error = %e, path = %debug_path.display(), "Failed to write ffmpeg debug report")
            }
        }
    }

    let outcome = job
        .supervisor_mut()
        .run(&command, compiled.total_secs(), progress)
        .await?;
    if let Some(err) = outcome.error() {
        return Err(err);
    }

    let size_bytes = match tokio::fs::metadata(&job.output_path).await {
        Ok(meta) => meta.len(),
        Err(_) => {
            return Err(ShortsmithError::render(
                "engine reported success but wrote no output",
                outcome.diagnostics_tail.clone(),
            ))
        }
    };

    let subtitles_path = if compiled.subtitle_cards.is_empty() {
        None
    } else {
        let path = job.output_path.with_extension("srt");
        match tokio::fs::write(&path, to_srt(&compiled.subtitle_cards)).await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to write subtitle sidecar");
                None
            }
        }
    };

    let duration_secs = if compiled.total_secs() > 0.0 {
        compiled.total_secs()
    } else {
        probe::probe_duration(&engine.ffprobe_path, &job.output_path)
            .await
            .unwrap_or(0.0)
    };

    Ok(ExportReport {
        output_path: job.output_path.clone(),
        size_bytes,
        duration_secs,
        state: outcome.state,
        subtitles_path,
        diagnostics_tail: outcome.diagnostics_tail,
        started_at: job.clock.epoch_wall().to_string(),
        elapsed_secs: 0.0,
    })
}

/// Path of the debug report written next to `output`.
pub fn debug_report_path(output: &Path) -> PathBuf {
    output.with_extension("ffmpeg-debug.txt")
}

/// Plain-text report of a compiled scene: timing, then one filter
/// statement per line, then the full command.
pub fn debug_report(compiled: &CompiledScene, command: &EngineCommand) -> String {
    let mut report = format!(
        "total_secs={}\ntransition_secs={}\nclip_starts={}\nwidth={}\nheight={}\nfps={}\ninputs={}\nstatements={}\nsubtitle_cards={}\n",
        fmt_secs(compiled.timeline.total_secs),
        fmt_secs(compiled.timeline.transition_secs),
        compiled
            .timeline
            .clip_starts
            .iter()
            .map(|s| fmt_secs(*s))
            .collect::<Vec<_>>()
            .join(","),
        compiled.profile.width,
        compiled.profile.height,
        compiled.fps,
        compiled.inputs.len(),
        compiled.program.statements.len(),
        compiled.subtitle_cards.len(),
    );
    report.push_str("\n[filter_complex]\n");
    for statement in &compiled.program.statements {
        report.push_str(&statement.to_string());
        report.push('\n');
    }
    report.push_str("\n[command]\n");
    report.push_str(&command.to_string());
    report.push('\n');
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TempFiles;
    use crate::style::{FontResolver, OsFamily};
    use shortsmith_common::config::ColorFormat;
    use shortsmith_scene_model::{MediaFile, RankingRequest};

    fn resolver() -> StyleResolver {
        StyleResolver {
            color_format: ColorFormat::PackedBgra,
            fonts: FontResolver::with_dirs(OsFamily::Linux, "DejaVuSans", &[]),
        }
    }

    fn engine(ffmpeg: &str) -> EngineConfig {
        EngineConfig {
            ffmpeg_path: PathBuf::from(ffmpeg),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            debug_report: true,
            diagnostics_tail_chars: 1000,
        }
    }

    #[test]
    fn test_debug_report_lists_statements() {
        let scene = SceneDescription::ranking(
            RankingRequest::default(),
            vec![MediaFile::new("/in/a.mp4"), MediaFile::new("/in/b.mp4")],
            None,
        )
        .unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let command = assemble(Path::new("ffmpeg"), &compiled, Path::new("/out/x.mp4")).unwrap();
        let report = debug_report(&compiled, &command);

        assert!(report.starts_with("total_secs=10\n"));
        assert!(report.contains("clip_starts=0,5\n"));
        assert!(report.contains("[filter_complex]\n"));
        assert!(report.contains("ffmpeg -hide_banner"));
        assert_eq!(
            debug_report_path(Path::new("/out/x.mp4")),
            PathBuf::from("/out/x.ffmpeg-debug.txt")
        );
    }

    #[tokio::test]
    async fn test_missing_engine_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"not a video").unwrap();
        let mut files = TempFiles::new();
        files.register(&clip);

        let scene = SceneDescription::ranking(
            RankingRequest::default(),
            vec![MediaFile::new(&clip)],
            None,
        )
        .unwrap();
        let mut job = RenderJob::new(dir.path().join("out").join("x.mp4"), files, 1000);
        let err = export_scene(
            &mut job,
            &scene,
            &engine("/nonexistent/shortsmith-ffmpeg"),
            &resolver(),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ShortsmithError::EngineUnavailable { .. }));
        assert!(!clip.exists());
        assert_eq!(job.state(), SupervisorState::CleanedUp);
        assert_eq!(
            job.supervisor().history(),
            [
                SupervisorState::Spawned,
                SupervisorState::SpawnFailed,
                SupervisorState::CleanedUp
            ]
        );
        assert!(dir.path().join("out").join("x.ffmpeg-debug.txt").exists());
    }
}
