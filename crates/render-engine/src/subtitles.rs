//! Scripted subtitle cards.
//!
//! A script is split into short cards that are paced at a fixed reading
//! speed and shown back to back from the start of the video.

use std::fmt::Write as _;

use serde::Serialize;
use shortsmith_common::clock::format_srt_time;

/// One subtitle card and its display window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleCard {
    pub text: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl SubtitleCard {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Group a script into cards of at most `max_words` words.
///
/// Each card lasts `words / words_per_second` seconds.
pub fn schedule_cards(script: &str, words_per_second: f64, max_words: usize) -> Vec<SubtitleCard> {
    if words_per_second <= 0.0 || max_words == 0 {
        return Vec::new();
    }

    let words: Vec<&str> = script.split_whitespace().collect();
    let mut cards = Vec::with_capacity(words.len().div_ceil(max_words));
    let mut cursor = 0.0;
    for chunk in words.chunks(max_words) {
        let duration = chunk.len() as f64 / words_per_second;
        cards.push(SubtitleCard {
            text: chunk.join(" "),
            start_secs: cursor,
            end_secs: cursor + duration,
        });
        cursor += duration;
    }
    cards
}

/// Render cards as an SRT document.
pub fn to_srt(cards: &[SubtitleCard]) -> String {
    let mut out = String::new();
    for (i, card) in cards.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_srt_time(card.start_secs),
            format_srt_time(card.end_secs)
        );
        let _ = writeln!(out, "{}", card.text);
        out.push('\n');
    }
    out
}
