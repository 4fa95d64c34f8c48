//! Clock and timecode utilities.
//!
//! Every render job is anchored to a monotonic clock started when the job is
//! created. This module provides utilities for:
//! - Capturing the job start (monotonic and wall-clock)
//! - Parsing engine timecodes (`HH:MM:SS.ss`) into seconds
//! - Formatting seconds as subtitle timestamps

use std::time::Instant;

/// A job clock that provides monotonic elapsed time relative to job start.
#[derive(Debug, Clone)]
pub struct JobClock {
    /// The instant the job started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl JobClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the job started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Milliseconds elapsed since the job started.
    pub fn elapsed_ms(&self) -> u128 {
        self.epoch.elapsed().as_millis()
    }

    /// Wall-clock time at job start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Parse an engine timecode like `00:01:02.05` into seconds.
///
/// Negative timecodes (emitted by the engine before the first frame) are
/// rejected.
pub fn parse_timecode(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.starts_with('-') {
        return None;
    }
    let mut parts = s.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let mins: f64 = parts.next()?.parse().ok()?;
    let secs: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours < 0.0 || mins < 0.0 || secs < 0.0 {
        return None;
    }
    let total = hours * 3600.0 + mins * 60.0 + secs;
    total.is_finite().then_some(total)
}

/// Format seconds as an SRT timestamp: `HH:MM:SS,mmm`.
pub fn format_srt_time(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}
