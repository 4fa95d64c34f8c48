//! Engine process supervision.
//!
//! The supervisor runs one engine process, tracks its lifecycle as an
//! explicit state machine, turns its stderr into progress reports and keeps
//! a bounded tail of diagnostics for error responses.
//!
//! ```text
//! Spawned ──Started──▶ Running ──Exited(ok)──▶ Completed ───────┐
//!    │                  │  ▲                                      ├─Cleaned─▶ CleanedUp
//!    │                  └──┘ Diagnostic      Exited(err)──▶ RenderingFailed
//!    └──SpawnError──▶ SpawnFailed ──────────────────────────────┘
//! ```

use std::fmt;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use shortsmith_common::clock::{parse_timecode, JobClock};
use shortsmith_common::error::ShortsmithError;

use crate::command::EngineCommand;

const STDERR_CHUNK_BYTES: usize = 8192;

/// Lifecycle state of a supervised engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Spawned,
    Running,
    Completed,
    SpawnFailed,
    RenderingFailed,
    CleanedUp,
}

impl SupervisorState {
    /// Whether the engine has stopped (successfully or not).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SupervisorState::Completed | SupervisorState::SpawnFailed | SupervisorState::RenderingFailed
        )
    }

    /// Apply an event, returning the next state.
    pub fn apply(self, event: &SupervisorEvent) -> Result<Self, TransitionError> {
        use SupervisorEvent as E;
        use SupervisorState as S;

        let next = match (self, event) {
            (S::Spawned, E::Started { .. }) => S::Running,
            (S::Spawned, E::SpawnError { .. }) => S::SpawnFailed,
            (S::Running, E::Diagnostic(_)) => S::Running,
            (S::Running, E::Exited { success: true, .. }) => S::Completed,
            (S::Running, E::Exited { success: false, .. }) => S::RenderingFailed,
            (from, E::Cleaned) if from.is_terminal() => S::CleanedUp,
            (from, event) => {
                return Err(TransitionError {
                    from,
                    event: event.name(),
                })
            }
        };
        Ok(next)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Spawned => "spawned",
            SupervisorState::Running => "running",
            SupervisorState::Completed => "completed",
            SupervisorState::SpawnFailed => "spawn_failed",
            SupervisorState::RenderingFailed => "rendering_failed",
            SupervisorState::CleanedUp => "cleaned_up",
        };
        f.write_str(name)
    }
}

/// Structured events that drive [`SupervisorState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Started { pid: Option<u32> },
    /// A chunk of engine stderr.
    Diagnostic(String),
    Exited { code: Option<i32>, success: bool },
    SpawnError { message: String },
    Cleaned,
}

impl SupervisorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorEvent::Started { .. } => "started",
            SupervisorEvent::Diagnostic(_) => "diagnostic",
            SupervisorEvent::Exited { .. } => "exited",
            SupervisorEvent::SpawnError { .. } => "spawn_error",
            SupervisorEvent::Cleaned => "cleaned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal supervisor transition: {event} in state {from}")]
pub struct TransitionError {
    pub from: SupervisorState,
    pub event: &'static str,
}

impl From<TransitionError> for ShortsmithError {
    fn from(err: TransitionError) -> Self {
        ShortsmithError::Other(anyhow::Error::new(err))
    }
}

/// Progress report emitted while the engine runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineProgress {
    /// Whole percent in `[0, 100]`.
    pub percent: u32,
    /// Position in the output, in seconds.
    pub position_secs: f64,
    /// Wall time since the job started.
    pub elapsed_secs: f64,
}

/// Progress callback for engine runs.
pub type ProgressCallback = Box<dyn Fn(EngineProgress) + Send + Sync>;

/// Extracts `time=` positions and reports strictly increasing percentages.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_secs: f64,
    last_percent: Option<u32>,
    /// Incomplete trailing line from the previous chunk.
    pending: String,
}

impl ProgressTracker {
    /// `total_secs <= 0` disables progress reporting.
    pub fn new(total_secs: f64) -> Self {
        Self {
            total_secs,
            last_percent: None,
            pending: String::new(),
        }
    }

    /// Feed a stderr chunk. Returns `(percent, position_secs)` for every
    /// complete status line that raised the whole-percent value.
    pub fn observe(&mut self, chunk: &str) -> Vec<(u32, f64)> {
        self.pending.push_str(chunk);
        let Some(split) = self.pending.rfind(['\r', '\n']) else {
            return Vec::new();
        };
        let complete: String = self.pending.drain(..=split).collect();

        complete
            .split(['\r', '\n'])
            .filter_map(extract_time)
            .filter_map(|position| self.advance(position))
            .collect()
    }

    fn advance(&mut self, position_secs: f64) -> Option<(u32, f64)> {
        if self.total_secs <= 0.0 {
            return None;
        }
        let percent = (position_secs / self.total_secs * 100.0).clamp(0.0, 100.0).floor() as u32;
        match self.last_percent {
            Some(last) if percent <= last => None,
            _ => {
                self.last_percent = Some(percent);
                Some((percent, position_secs))
            }
        }
    }

    pub fn last_percent(&self) -> Option<u32> {
        self.last_percent
    }
}

/// Parse the `time=HH:MM:SS.ss` field of an engine status line.
pub fn extract_time(line: &str) -> Option<f64> {
    let start = line.rfind("time=")? + "time=".len();
    let rest = line[start..].trim_start();
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    parse_timecode(&rest[..end])
}

/// Keeps the last `max_chars` characters of diagnostic output.
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    buf: String,
    max_chars: usize,
}

impl DiagnosticTail {
    pub fn new(max_chars: usize) -> Self {
        Self {
            buf: String::new(),
            max_chars,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.buf.push_str(chunk);
        let excess = self.buf.chars().count().saturating_sub(self.max_chars);
        if excess > 0 {
            let cut = self
                .buf
                .char_indices()
                .nth(excess)
                .map(|(i, _)| i)
                .unwrap_or(self.buf.len());
            self.buf.drain(..cut);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

/// Decodes stderr chunks as UTF-8, holding back a character split across
/// two reads until its remaining bytes arrive.
#[derive(Debug, Default)]
pub struct StderrDecoder {
    pending: Vec<u8>,
}

impl StderrDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let keep = incomplete_suffix_len(&self.pending);
        let ready = self.pending.len() - keep;
        let text = String::from_utf8_lossy(&self.pending[..ready]).into_owned();
        self.pending.drain(..ready);
        text
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of an unfinished multi-byte sequence at the end of `bytes`.
fn incomplete_suffix_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let b = bytes[bytes.len() - back];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let needed = match b {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Result of one supervised run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: SupervisorState,
    pub exit_code: Option<i32>,
    pub diagnostics_tail: String,
    pub spawn_error: Option<String>,
}

impl RunOutcome {
    /// Map a failed run to an error. Successful runs map to `None`.
    pub fn error(&self) -> Option<ShortsmithError> {
        match self.state {
            SupervisorState::SpawnFailed => Some(ShortsmithError::engine_unavailable(
                self.spawn_error
                    .clone()
                    .unwrap_or_else(|| "engine could not be started".to_string()),
            )),
            SupervisorState::RenderingFailed => Some(ShortsmithError::render(
                match self.exit_code {
                    Some(code) => format!("engine exited with status {code}"),
                    None => "engine terminated by signal".to_string(),
                },
                self.diagnostics_tail.clone(),
            )),
            _ => None,
        }
    }
}

/// Owns the lifecycle of one engine process.
#[derive(Debug)]
pub struct ProcessSupervisor {
    state: SupervisorState,
    history: Vec<SupervisorState>,
    tail: DiagnosticTail,
    clock: JobClock,
}

impl ProcessSupervisor {
    pub fn new(clock: JobClock, tail_chars: usize) -> Self {
        Self {
            state: SupervisorState::Spawned,
            history: vec![SupervisorState::Spawned],
            tail: DiagnosticTail::new(tail_chars),
            clock,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[SupervisorState] {
        &self.history
    }

    pub fn diagnostics_tail(&self) -> &str {
        self.tail.as_str()
    }

    /// Apply an event to the state machine.
    pub fn handle(&mut self, event: SupervisorEvent) -> Result<SupervisorState, TransitionError> {
        let next = self.state.apply(&event)?;
        if let SupervisorEvent::Diagnostic(chunk) = &event {
            self.tail.push(chunk);
        }
        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, event = event.name(), "Supervisor transition");
            self.history.push(next);
        }
        self.state = next;
        Ok(next)
    }

    /// Run the engine to completion.
    ///
    /// Never blocks the runtime thread: stderr is read asynchronously in
    /// chunks while the process runs. The child is killed if this future
    /// is dropped.
    pub async fn run(
        &mut self,
        command: &EngineCommand,
        total_secs: f64,
        progress: Option<&ProgressCallback>,
    ) -> Result<RunOutcome, TransitionError> {
        tracing::debug!(command = %command, "Running engine");

        let spawned = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let message = if e.kind() == std::io::ErrorKind::NotFound {
                    format!("{} not found", command.program.display())
                } else {
                    format!("failed to start {}: {e}", command.program.display())
                };
                tracing::error!(program = %command.program.display(), error = %e, "Engine spawn failed");
                self.handle(SupervisorEvent::SpawnError {
                    message: message.clone(),
                })?;
                return Ok(self.outcome(None, Some(message)));
            }
        };

        self.handle(SupervisorEvent::Started { pid: child.id() })?;
        tracing::info!(
            pid = child.id(),
            args_len = command.args.len(),
            total_secs,
            "Engine process started"
        );

        let mut tracker = ProgressTracker::new(total_secs);
        if let Some(mut stderr) = child.stderr.take() {
            let mut buf = vec![0u8; STDERR_CHUNK_BYTES];
            let mut decoder = StderrDecoder::new();
            loop {
                let read = match stderr.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed reading engine stderr");
                        break;
                    }
                };
                let chunk = decoder.decode(&buf[..read]);
                if chunk.is_empty() {
                    continue;
                }
                for (percent, position_secs) in tracker.observe(&chunk) {
                    let report = EngineProgress {
                        percent,
                        position_secs,
                        elapsed_secs: self.clock.elapsed_secs(),
                    };
                    tracing::debug!(percent, position_secs, "Engine progress");
                    if let Some(cb) = progress {
                        cb(report);
                    }
                }
                self.handle(SupervisorEvent::Diagnostic(chunk))?;
            }
            let rest = decoder.finish();
            if !rest.is_empty() {
                self.handle(SupervisorEvent::Diagnostic(rest))?;
            }
        }

        let (code, success) = match child.wait().await {
            Ok(status) => (status.code(), status.success()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to wait on engine process");
                (None, false)
            }
        };
        self.handle(SupervisorEvent::Exited { code, success })?;

        if success {
            tracing::info!(elapsed_ms = self.clock.elapsed_ms() as u64, "Engine finished");
        } else {
            tracing::error!(code = ?code, "Engine failed");
        }
        Ok(self.outcome(code, None))
    }

    fn outcome(&self, exit_code: Option<i32>, spawn_error: Option<String>) -> RunOutcome {
        RunOutcome {
            state: self.state,
            exit_code,
            diagnostics_tail: self.tail.as_str().to_string(),
            spawn_error,
        }
    }
}
