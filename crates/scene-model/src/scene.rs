//! The validated scene description.
//!
//! A [`SceneDescription`] is built once per request from a request config and
//! the uploaded files, then read by the compiler without modification.

use std::path::{Path, PathBuf};

use shortsmith_common::error::{ShortsmithError, ShortsmithResult};

use crate::color::RgbColor;
use crate::config::{
    BadgePosition, MusicSettings, PercentPosition, RankingRequest, SplitAxis, SplitScreenRequest,
    SubtitleSettings, SubtitlePosition, SubtitleTemplate, TextStyle,
};
use crate::quality::QualityTier;

/// Trim start used when a clip's settings omit it.
pub const DEFAULT_TRIM_START_SECS: f64 = 0.0;
/// Clip duration used when a clip's settings omit it.
pub const DEFAULT_CLIP_DURATION_SECS: f64 = 5.0;
pub const DEFAULT_FPS: u32 = 30;
pub const MAX_FPS: u32 = 120;
pub const DEFAULT_VIDEO_AREA_PERCENT: f64 = 70.0;
pub const MIN_VIDEO_AREA_PERCENT: f64 = 10.0;
pub const MIN_SPLIT_RATIO: f64 = 0.1;
pub const MAX_SPLIT_RATIO: f64 = 0.9;

/// An uploaded media file and what is known about its streams.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Whether the file carries an audio stream. Assumed until probed.
    pub has_audio: bool,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            has_audio: true,
        }
    }

    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.has_audio = has_audio;
        self
    }
}

/// Immutable description of one render.
#[derive(Debug, Clone)]
pub struct SceneDescription {
    pub output: OutputSpec,
    pub layout: SceneLayout,
    pub title: Option<Title>,
    pub ranking: Option<RankingGraphic>,
    pub transition: Option<Transition>,
    pub music: Option<BackgroundMusic>,
    pub subtitles: Option<Subtitles>,
}

/// Exactly one of the two render modes.
#[derive(Debug, Clone)]
pub enum SceneLayout {
    Ranking { clips: Vec<Clip> },
    SplitScreen(SplitScreen),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    Ranking,
    SplitScreen,
}

impl RenderMode {
    /// Prefix used for output file names.
    pub fn file_prefix(self) -> &'static str {
        match self {
            RenderMode::Ranking => "ranking",
            RenderMode::SplitScreen => "splitscreen",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub quality: QualityTier,
    pub fps: u32,
    /// Lower share of the frame occupied by clips, in percent.
    pub video_area_percent: f64,
    pub background_color: RgbColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub path: PathBuf,
    pub trim_start: f64,
    pub duration: f64,
    pub has_audio: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Title {
    pub text: String,
    pub position: PercentPosition,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingGraphic {
    pub style_token: String,
    pub position: BadgePosition,
    pub size_at_reference: f64,
    pub custom_color: Option<RgbColor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub type_token: String,
    /// Requested duration; the compiler caps it.
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundMusic {
    pub path: PathBuf,
    pub volume_percent: f64,
    pub fade_in: bool,
    pub fade_out: bool,
    /// Ducking amount in percent when ducking is enabled.
    pub ducking_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitScreen {
    pub main: MediaFile,
    pub background: MediaFile,
    pub axis: SplitAxis,
    /// Main clip share, clamped to `[0.1, 0.9]`.
    pub ratio: f64,
    pub main_first: bool,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subtitles {
    pub script: String,
    pub words_per_second: f64,
    pub max_words_per_card: usize,
    pub position: SubtitlePosition,
    pub template: SubtitleTemplate,
}

impl SceneDescription {
    /// Build a ranking-mode scene from its config and the uploaded files.
    pub fn ranking(
        request: RankingRequest,
        clip_files: Vec<MediaFile>,
        music_file: Option<PathBuf>,
    ) -> ShortsmithResult<Self> {
        if clip_files.is_empty() {
            return Err(ShortsmithError::validation("No clip files uploaded"));
        }
        if request.clips.len() > clip_files.len() {
            return Err(ShortsmithError::validation(format!(
                "Config describes {} clips but only {} files were uploaded",
                request.clips.len(),
                clip_files.len()
            )));
        }

        let clips = clip_files
            .into_iter()
            .enumerate()
            .map(|(index, file)| {
                let settings = request.clips.get(index).cloned().unwrap_or_default();
                let trim_start = settings.trim_start.unwrap_or(DEFAULT_TRIM_START_SECS);
                if !trim_start.is_finite() || trim_start < 0.0 {
                    return Err(ShortsmithError::validation(format!(
                        "Clip {}: trimStart must be >= 0, got {trim_start}",
                        index + 1
                    )));
                }
                let duration = settings.duration.unwrap_or(DEFAULT_CLIP_DURATION_SECS);
                if !duration.is_finite() || duration <= 0.0 {
                    return Err(ShortsmithError::validation(format!(
                        "Clip {}: duration must be > 0, got {duration}",
                        index + 1
                    )));
                }
                Ok(Clip {
                    path: file.path,
                    trim_start,
                    duration,
                    has_audio: file.has_audio,
                })
            })
            .collect::<ShortsmithResult<Vec<_>>>()?;

        let output = OutputSpec {
            quality: request.quality,
            fps: validate_fps(request.fps)?,
            video_area_percent: validate_video_area(request.video_area_height)?,
            background_color: request.background_color.unwrap_or(RgbColor::BLACK),
        };

        let title = match request.title {
            Some(title) if !title.text.trim().is_empty() => {
                validate_text_style(&title.style, "title")?;
                Some(Title {
                    text: title.text.trim().to_string(),
                    position: clamp_position(title.position),
                    style: title.style,
                })
            }
            _ => None,
        };

        let ranking = match request.ranking {
            Some(ranking) => {
                if !ranking.size.is_finite() || ranking.size <= 0.0 {
                    return Err(ShortsmithError::validation(format!(
                        "ranking.size must be > 0, got {}",
                        ranking.size
                    )));
                }
                Some(RankingGraphic {
                    style_token: ranking.style,
                    position: ranking.position,
                    size_at_reference: ranking.size,
                    custom_color: ranking.custom_color,
                })
            }
            None => None,
        };

        // A non-positive duration means a hard cut, same as "none".
        let transition = request.transition.and_then(|t| {
            let kind = t.kind.trim().to_ascii_lowercase();
            let usable = !kind.is_empty() && kind != "none" && t.duration.is_finite() && t.duration > 0.0;
            usable.then_some(Transition {
                type_token: kind,
                duration: t.duration,
            })
        });

        Ok(Self {
            output,
            layout: SceneLayout::Ranking { clips },
            title,
            ranking,
            transition,
            music: build_music(request.music, music_file)?,
            subtitles: build_subtitles(request.subtitles)?,
        })
    }

    /// Build a split-screen scene from its config and the uploaded files.
    pub fn split_screen(
        request: SplitScreenRequest,
        main: MediaFile,
        background: MediaFile,
        music_file: Option<PathBuf>,
    ) -> ShortsmithResult<Self> {
        let ratio = request.split_ratio.unwrap_or(0.5);
        if !ratio.is_finite() {
            return Err(ShortsmithError::validation("splitRatio must be a number"));
        }
        let duration = match request.duration {
            Some(d) if !d.is_finite() || d <= 0.0 => {
                return Err(ShortsmithError::validation(format!(
                    "duration must be > 0, got {d}"
                )))
            }
            other => other,
        };

        let output = OutputSpec {
            quality: request.quality,
            fps: validate_fps(request.fps)?,
            video_area_percent: 100.0,
            background_color: request.background_color.unwrap_or(RgbColor::BLACK),
        };

        Ok(Self {
            output,
            layout: SceneLayout::SplitScreen(SplitScreen {
                main,
                background,
                axis: request.split_axis,
                ratio: ratio.clamp(MIN_SPLIT_RATIO, MAX_SPLIT_RATIO),
                main_first: request.main_first.unwrap_or(true),
                duration,
            }),
            title: None,
            ranking: None,
            transition: None,
            music: build_music(request.music, music_file)?,
            subtitles: build_subtitles(request.subtitles)?,
        })
    }

    pub fn mode(&self) -> RenderMode {
        match self.layout {
            SceneLayout::Ranking { .. } => RenderMode::Ranking,
            SceneLayout::SplitScreen(_) => RenderMode::SplitScreen,
        }
    }

    /// Ranking clips in render order (empty for split-screen scenes).
    pub fn clips(&self) -> &[Clip] {
        match &self.layout {
            SceneLayout::Ranking { clips } => clips,
            SceneLayout::SplitScreen(_) => &[],
        }
    }

    /// Every input file the scene reads, in engine input order.
    pub fn input_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = match &self.layout {
            SceneLayout::Ranking { clips } => clips.iter().map(|c| c.path.as_path()).collect(),
            SceneLayout::SplitScreen(split) => {
                vec![split.main.path.as_path(), split.background.path.as_path()]
            }
        };
        if let Some(music) = &self.music {
            files.push(music.path.as_path());
        }
        files
    }
}

fn validate_fps(fps: Option<u32>) -> ShortsmithResult<u32> {
    let fps = fps.unwrap_or(DEFAULT_FPS);
    if fps == 0 || fps > MAX_FPS {
        return Err(ShortsmithError::validation(format!(
            "fps must be within 1..={MAX_FPS}, got {fps}"
        )));
    }
    Ok(fps)
}

fn validate_video_area(percent: Option<f64>) -> ShortsmithResult<f64> {
    let percent = percent.unwrap_or(DEFAULT_VIDEO_AREA_PERCENT);
    if !percent.is_finite() {
        return Err(ShortsmithError::validation("videoAreaHeight must be a number"));
    }
    Ok(percent.clamp(MIN_VIDEO_AREA_PERCENT, 100.0))
}

fn validate_text_style(style: &TextStyle, field: &str) -> ShortsmithResult<()> {
    if !style.font_size.is_finite() || style.font_size <= 0.0 {
        return Err(ShortsmithError::validation(format!(
            "{field}.style.fontSize must be > 0, got {}",
            style.font_size
        )));
    }
    if !style.stroke_width.is_finite() || style.stroke_width < 0.0 {
        return Err(ShortsmithError::validation(format!(
            "{field}.style.strokeWidth must be >= 0, got {}",
            style.stroke_width
        )));
    }
    Ok(())
}

fn clamp_position(position: PercentPosition) -> PercentPosition {
    let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, 100.0) } else { 50.0 };
    PercentPosition {
        x: clamp(position.x),
        y: clamp(position.y),
    }
}

fn build_music(
    settings: Option<MusicSettings>,
    music_file: Option<PathBuf>,
) -> ShortsmithResult<Option<BackgroundMusic>> {
    let Some(path) = music_file else {
        if settings.is_some() {
            tracing::warn!("Music settings provided without a music file; ignoring");
        }
        return Ok(None);
    };
    let settings = settings.unwrap_or_default();
    if !settings.volume.is_finite() || settings.volume < 0.0 {
        return Err(ShortsmithError::validation(format!(
            "music.volume must be >= 0, got {}",
            settings.volume
        )));
    }
    let ducking_percent = if settings.ducking {
        if !settings.ducking_amount.is_finite() {
            return Err(ShortsmithError::validation("music.duckingAmount must be a number"));
        }
        Some(settings.ducking_amount.clamp(0.0, 100.0))
    } else {
        None
    };
    Ok(Some(BackgroundMusic {
        path,
        volume_percent: settings.volume.min(200.0),
        fade_in: settings.fade_in,
        fade_out: settings.fade_out,
        ducking_percent,
    }))
}

fn build_subtitles(settings: Option<SubtitleSettings>) -> ShortsmithResult<Option<Subtitles>> {
    let Some(settings) = settings else {
        return Ok(None);
    };
    if settings.script.trim().is_empty() {
        return Ok(None);
    }
    if !settings.words_per_second.is_finite() || settings.words_per_second <= 0.0 {
        return Err(ShortsmithError::validation(format!(
            "subtitles.wordsPerSecond must be > 0, got {}",
            settings.words_per_second
        )));
    }
    if settings.max_words_per_card == 0 {
        return Err(ShortsmithError::validation(
            "subtitles.maxWordsPerCard must be at least 1",
        ));
    }
    if !settings.template.font_size.is_finite() || settings.template.font_size <= 0.0 {
        return Err(ShortsmithError::validation(
            "subtitles.template.fontSize must be > 0",
        ));
    }
    Ok(Some(Subtitles {
        script: settings.script,
        words_per_second: settings.words_per_second,
        max_words_per_card: settings.max_words_per_card,
        position: settings.position,
        template: settings.template,
    }))
}
