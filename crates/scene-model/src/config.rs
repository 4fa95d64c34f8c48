//! Request configs: the JSON `config` field of an export request.
//!
//! These types mirror what the editor sends. Every field is optional or
//! defaulted; [`crate::scene::SceneDescription`] performs validation.

use serde::{Deserialize, Serialize};

use crate::color::RgbColor;
use crate::quality::QualityTier;

/// Config for a ranking-list export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingRequest {
    /// Per-clip trim settings, in upload order.
    pub clips: Vec<ClipSettings>,

    pub quality: QualityTier,

    pub fps: Option<u32>,

    /// Share of the frame height occupied by the video area, in percent.
    pub video_area_height: Option<f64>,

    pub background_color: Option<RgbColor>,

    pub title: Option<TitleSettings>,

    pub ranking: Option<RankingSettings>,

    pub transition: Option<TransitionSettings>,

    pub music: Option<MusicSettings>,

    pub subtitles: Option<SubtitleSettings>,
}

/// Config for a split-screen (reaction) export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplitScreenRequest {
    pub quality: QualityTier,

    pub fps: Option<u32>,

    pub split_axis: SplitAxis,

    /// Share of the frame given to the main clip, in `(0, 1)`.
    pub split_ratio: Option<f64>,

    /// Whether the main clip occupies the top (or left) region.
    pub main_first: Option<bool>,

    /// Output duration in seconds; probed from the main clip when absent.
    pub duration: Option<f64>,

    pub background_color: Option<RgbColor>,

    pub music: Option<MusicSettings>,

    pub subtitles: Option<SubtitleSettings>,
}

/// Trim settings for one uploaded clip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClipSettings {
    pub trim_start: Option<f64>,
    pub duration: Option<f64>,
}

/// A percentage position inside the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentPosition {
    pub x: f64,
    pub y: f64,
}

impl Default for PercentPosition {
    fn default() -> Self {
        Self { x: 50.0, y: 15.0 }
    }
}

/// Title text overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TitleSettings {
    pub text: String,
    pub position: PercentPosition,
    pub style: TextStyle,
}

/// Text styling as exposed by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextStyle {
    pub font_family: String,
    /// Font size in editor pixels at the 1080px reference width.
    pub font_size: f64,
    pub bold: bool,
    pub italic: bool,
    pub color: RgbColor,
    pub stroke_color: RgbColor,
    pub stroke_width: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 72.0,
            bold: true,
            italic: false,
            color: RgbColor::WHITE,
            stroke_color: RgbColor::BLACK,
            stroke_width: 4.0,
        }
    }
}

/// Ranking badge overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingSettings {
    /// Style token (`number`, `badge`, `medal`, `trophy`, `custom`).
    pub style: String,
    pub position: BadgePosition,
    /// Badge edge length in pixels at the 1080px reference width.
    pub size: f64,
    /// Fill color for the `custom` style.
    pub custom_color: Option<RgbColor>,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            style: "number".to_string(),
            position: BadgePosition::TopLeft,
            size: 120.0,
            custom_color: None,
        }
    }
}

/// Badge anchor inside the top band of the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadgePosition {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

/// Transition between consecutive clips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransitionSettings {
    /// Editor-facing transition token (`fade`, `wipe-left`, `none`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: f64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            kind: "none".to_string(),
            duration: 0.5,
        }
    }
}

/// Background music mixing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MusicSettings {
    /// Music volume in percent (100 = unchanged).
    pub volume: f64,
    pub fade_in: bool,
    pub fade_out: bool,
    pub ducking: bool,
    /// Ducking strength in percent (`0..=100`).
    pub ducking_amount: f64,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            volume: 30.0,
            fade_in: true,
            fade_out: true,
            ducking: false,
            ducking_amount: 50.0,
        }
    }
}

/// Split direction for split-screen exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitAxis {
    /// Regions stacked top and bottom.
    #[default]
    Vertical,
    /// Regions side by side.
    Horizontal,
}

/// Scripted subtitle cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubtitleSettings {
    pub script: String,
    pub words_per_second: f64,
    pub max_words_per_card: usize,
    pub position: SubtitlePosition,
    pub template: SubtitleTemplate,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            script: String::new(),
            words_per_second: 2.5,
            max_words_per_card: 3,
            position: SubtitlePosition::Bottom,
            template: SubtitleTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitlePosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Visual template applied to every subtitle card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubtitleTemplate {
    pub color: RgbColor,
    /// Card background; no box is drawn when absent.
    pub bg_color: Option<RgbColor>,
    pub stroke_color: RgbColor,
    pub stroke_width: f64,
    pub transform: TextTransform,
    pub font_family: String,
    pub font_size: f64,
    pub bold: bool,
}

impl Default for SubtitleTemplate {
    fn default() -> Self {
        Self {
            color: RgbColor::WHITE,
            bg_color: None,
            stroke_color: RgbColor::BLACK,
            stroke_width: 3.0,
            transform: TextTransform::None,
            font_family: "Arial".to_string(),
            font_size: 64.0,
            bold: true,
        }
    }
}

/// Case transform applied to subtitle text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    Lowercase,
    Capitalize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_request_from_editor_json() {
        let json = r##"{
            "clips": [{"trimStart": 1.5, "duration": 4}, {}],
            "quality": "high",
            "fps": 60,
            "videoAreaHeight": 70,
            "backgroundColor": "#101010",
            "title": {"text": "Top 3", "position": {"x": 50, "y": 12}, "style": {"fontSize": 80, "italic": true}},
            "ranking": {"style": "medal", "position": "bottom-right", "size": 140},
            "transition": {"type": "wipe-left", "duration": 0.75},
            "music": {"volume": 40, "ducking": true, "duckingAmount": 75}
        }"##;

        let req: RankingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.clips.len(), 2);
        assert_eq!(req.clips[0].trim_start, Some(1.5));
        assert_eq!(req.clips[1].duration, None);
        assert_eq!(req.quality, QualityTier::High);
        assert_eq!(req.background_color, Some(RgbColor::new(0x10, 0x10, 0x10)));

        let title = req.title.unwrap();
        assert!(title.style.italic);
        assert!(title.style.bold, "unspecified style fields keep defaults");
        assert_eq!(title.style.font_family, "Arial");

        let ranking = req.ranking.unwrap();
        assert_eq!(ranking.position, BadgePosition::BottomRight);

        let transition = req.transition.unwrap();
        assert_eq!(transition.kind, "wipe-left");

        let music = req.music.unwrap();
        assert!(music.ducking);
        assert!(music.fade_in);
        assert_eq!(music.ducking_amount, 75.0);
    }

    #[test]
    fn test_empty_object_is_a_valid_request() {
        let req: RankingRequest = serde_json::from_str("{}").unwrap();
        assert!(req.clips.is_empty());
        assert_eq!(req.quality, QualityTier::Standard);
        assert!(req.title.is_none());

        let split: SplitScreenRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(split.split_axis, SplitAxis::Vertical);
    }

    #[test]
    fn test_invalid_color_is_a_parse_error() {
        let json = r#"{"backgroundColor": "blue"}"#;
        assert!(serde_json::from_str::<RankingRequest>(json).is_err());
    }

    #[test]
    fn test_split_screen_request() {
        let json = r##"{
            "splitAxis": "horizontal",
            "splitRatio": 0.65,
            "mainFirst": false,
            "subtitles": {"script": "hello there world", "position": "center",
                          "template": {"transform": "uppercase", "bgColor": "#000"}}
        }"##;
        let req: SplitScreenRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.split_axis, SplitAxis::Horizontal);
        assert_eq!(req.main_first, Some(false));
        let subs = req.subtitles.unwrap();
        assert_eq!(subs.position, SubtitlePosition::Center);
        assert_eq!(subs.template.transform, TextTransform::Uppercase);
        assert_eq!(subs.template.bg_color, Some(RgbColor::BLACK));
        assert_eq!(subs.max_words_per_card, 3);
    }
}
