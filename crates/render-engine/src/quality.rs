//! Quality tier presets: output resolution and encoder rate control.

use shortsmith_scene_model::QualityTier;

use crate::layout::FrameSize;

/// Encoder settings for one quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub width: u32,
    pub height: u32,
    pub crf: &'static str,
    pub preset: &'static str,
    /// Peak bitrate, e.g. `8M`.
    pub max_bitrate: &'static str,
}

impl QualityProfile {
    pub fn for_tier(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Low => Self {
                width: 720,
                height: 1280,
                crf: "23",
                preset: "fast",
                max_bitrate: "3M",
            },
            QualityTier::Standard => Self {
                width: 1080,
                height: 1920,
                crf: "18",
                preset: "medium",
                max_bitrate: "8M",
            },
            QualityTier::High => Self {
                width: 2160,
                height: 3840,
                crf: "15",
                preset: "slow",
                max_bitrate: "20M",
            },
        }
    }

    pub fn frame(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Rate-control buffer: twice the peak bitrate, same unit suffix.
    pub fn bufsize(&self) -> String {
        let split = self
            .max_bitrate
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.max_bitrate.len());
        let (digits, unit) = self.max_bitrate.split_at(split);
        match digits.parse::<u64>() {
            Ok(value) => format!("{}{unit}", value * 2),
            Err(_) => self.max_bitrate.to_string(),
        }
    }
}
