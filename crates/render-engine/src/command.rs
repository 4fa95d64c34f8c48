//! Engine command assembly.

use std::fmt;
use std::path::{Path, PathBuf};

use shortsmith_common::error::{ShortsmithError, ShortsmithResult};

use crate::compiler::CompiledScene;
use crate::graph::unmapped_outputs;
use crate::quality::QualityProfile;

/// One `-i` input declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub path: PathBuf,
    /// Loop the input indefinitely (`-stream_loop -1`).
    pub loop_forever: bool,
}

impl InputSpec {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            loop_forever: false,
        }
    }

    pub fn looped(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            loop_forever: true,
        }
    }
}

/// A fully assembled engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for EngineCommand {
    /// Shell-quoted rendering for logs and dry runs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:+=,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Assemble the engine arguments for a compiled scene.
///
/// The program is linted first, and every mapped label must be one of its
/// dangling outputs.
pub fn assemble(
    engine: &Path,
    compiled: &CompiledScene,
    output: &Path,
) -> ShortsmithResult<EngineCommand> {
    let report = compiled
        .program
        .lint(compiled.inputs.len())
        .map_err(|e| ShortsmithError::compile(format!("invalid filter program: {e}")))?;

    let mut mapped = vec![compiled.video_out.name.as_str()];
    if let Some(audio) = &compiled.audio_out {
        mapped.push(audio.name.as_str());
    }
    let missing = unmapped_outputs(&report, mapped.iter().copied());
    if !missing.is_empty() {
        return Err(ShortsmithError::compile(format!(
            "mapped outputs not produced: {}",
            missing.join(", ")
        )));
    }
    let unused: Vec<&String> = report
        .dangling
        .iter()
        .filter(|d| !mapped.contains(&d.as_str()))
        .collect();
    if !unused.is_empty() {
        return Err(ShortsmithError::compile(format!(
            "filter outputs never consumed: {unused:?}"
        )));
    }

    let mut args = vec!["-hide_banner".to_string()];

    for input in &compiled.inputs {
        if input.loop_forever {
            args.extend(["-stream_loop".to_string(), "-1".to_string()]);
        }
        args.push("-i".to_string());
        args.push(input.path.to_string_lossy().into_owned());
    }

    args.push("-filter_complex".to_string());
    args.push(compiled.program.text());

    args.push("-map".to_string());
    args.push(compiled.video_out.map_arg());
    if let Some(audio) = &compiled.audio_out {
        args.push("-map".to_string());
        args.push(audio.map_arg());
        args.extend(audio_codec_args());
    }

    args.extend(video_codec_args(&compiled.profile, compiled.fps));
    args.push("-y".to_string());
    args.push(output.to_string_lossy().into_owned());

    Ok(EngineCommand {
        program: engine.to_path_buf(),
        args,
    })
}

fn audio_codec_args() -> Vec<String> {
    ["-c:a", "aac", "-b:a", "192k"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn video_codec_args(profile: &QualityProfile, fps: u32) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        profile.preset.to_string(),
        "-crf".to_string(),
        profile.crf.to_string(),
        "-maxrate".to_string(),
        profile.max_bitrate.to_string(),
        "-bufsize".to_string(),
        profile.bufsize(),
        "-r".to_string(),
        fps.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}
