//! Render jobs and scoped cleanup of request files.

use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;

use shortsmith_common::clock::JobClock;
use shortsmith_scene_model::RenderMode;

use crate::supervisor::{ProcessSupervisor, SupervisorEvent, SupervisorState, TransitionError};

/// Length of the random part of output file names.
pub const OUTPUT_ID_LEN: usize = 16;

/// Random alphanumeric job id.
pub fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OUTPUT_ID_LEN)
        .map(char::from)
        .collect()
}

/// Output file name: mode prefix, random id, `.mp4`.
pub fn output_file_name(mode: RenderMode, id: &str) -> String {
    format!("{}_{id}.mp4", mode.file_prefix())
}

/// Files owned by one request, deleted when the guard is cleaned or dropped.
///
/// Register each file as soon as it is written so early returns and panics
/// still remove it.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Delete every registered file. Missing files are ignored and other
    /// failures are logged. Returns the number of files removed.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in self.paths.drain(..) {
            if remove_quietly(&path) {
                removed += 1;
            }
        }
        removed
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        if !self.paths.is_empty() {
            let removed = self.cleanup();
            tracing::debug!(removed, "Temp files removed on drop");
        }
    }
}

/// Remove a file, returning whether it existed. Never fails.
pub fn remove_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete file");
            false
        }
    }
}

/// One render request: its output path, the files it owns, its clock and
/// its supervisor.
#[derive(Debug)]
pub struct RenderJob {
    pub id: String,
    pub output_path: PathBuf,
    pub temp_files: TempFiles,
    pub clock: JobClock,
    supervisor: ProcessSupervisor,
}

impl RenderJob {
    pub fn new(output_path: impl Into<PathBuf>, temp_files: TempFiles, tail_chars: usize) -> Self {
        let clock = JobClock::start();
        Self {
            id: random_id(),
            output_path: output_path.into(),
            temp_files,
            supervisor: ProcessSupervisor::new(clock.clone(), tail_chars),
            clock,
        }
    }

    /// A job writing a randomly named output into `dir`.
    pub fn in_dir(dir: &Path, mode: RenderMode, temp_files: TempFiles, tail_chars: usize) -> Self {
        let mut job = Self::new(PathBuf::new(), temp_files, tail_chars);
        job.output_path = dir.join(output_file_name(mode, &job.id));
        job
    }

    pub fn output_file_name(&self) -> Option<&str> {
        self.output_path.file_name().and_then(|n| n.to_str())
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut ProcessSupervisor {
        &mut self.supervisor
    }

    pub fn state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    /// Delete every job file and, once the engine has stopped, move the
    /// supervisor to `CleanedUp`.
    pub fn finish(&mut self) -> Result<SupervisorState, TransitionError> {
        let removed = self.temp_files.cleanup();
        tracing::debug!(job = %self.id, removed, "Job files cleaned");
        if self.supervisor.state().is_terminal() {
            self.supervisor.handle(SupervisorEvent::Cleaned)
        } else {
            Ok(self.supervisor.state())
        }
    }
}
