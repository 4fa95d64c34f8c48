//! Scene compiler: turns a [`SceneDescription`] into a filter program.
//!
//! # Ranking mode
//!
//! ```text
//! clip 0 ── normalize ── canvas overlay ──┐
//! clip 1 ── normalize ── canvas overlay ──┼── xfade chain | concat
//! clip N ── normalize ── canvas overlay ──┘         │
//!                                                   ├── title drawtext
//!                                                   ├── badge drawbox + drawtext
//!                                                   ├── subtitle cards
//!                                                   ▼
//!                                          format=yuv420p [vout]
//!
//! clip audio | silence ── concat | acrossfade ──┐
//! music ── volume, fades ───────────────────────┴── amix | sidechain duck [aout]
//! ```
//!
//! # Split-screen mode
//!
//! Main and background clips are fill-scaled into their regions and stacked;
//! the background input is looped so the main clip sets the length.

use shortsmith_common::error::{ShortsmithError, ShortsmithResult};
use shortsmith_scene_model::{
    BackgroundMusic, Clip, RgbColor, SceneDescription, SceneLayout, SplitAxis, SplitScreen,
    SubtitlePosition, Subtitles,
};

use crate::command::InputSpec;
use crate::graph::{FilterProgram, GraphBuilder, OutputLabel, Pad, Stream, StreamKind};
use crate::layout::{self, FrameSize, Rect, TextAnchor};
use crate::quality::QualityProfile;
use crate::style::{self, StyleResolver};
use crate::subtitles::{schedule_cards, SubtitleCard};

/// Longest transition the compiler will emit.
pub const MAX_TRANSITION_SECS: f64 = 2.0;

/// Music fade length.
pub const MUSIC_FADE_SECS: f64 = 2.0;

const AUDIO_FORMAT: &str = "aformat=sample_rates=44100:channel_layouts=stereo";
const SILENCE_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=44100";

/// Output of the compiler, ready for command assembly.
#[derive(Debug, Clone)]
pub struct CompiledScene {
    pub program: FilterProgram,
    /// Engine inputs in declaration order.
    pub inputs: Vec<InputSpec>,
    pub video_out: OutputLabel,
    pub audio_out: Option<OutputLabel>,
    pub profile: QualityProfile,
    pub fps: u32,
    pub timeline: Timeline,
    pub subtitle_cards: Vec<SubtitleCard>,
}

impl CompiledScene {
    /// Expected output length in seconds, `0.0` when unknown.
    pub fn total_secs(&self) -> f64 {
        self.timeline.total_secs
    }
}

/// Clip placement on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    /// Start time of each clip in the joined stream.
    pub clip_starts: Vec<f64>,
    pub total_secs: f64,
    /// Effective transition length, `0.0` for hard cuts.
    pub transition_secs: f64,
}

/// The window during which a rank badge is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadgeWindow {
    pub rank: usize,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl Timeline {
    /// Lay out clips back to back, overlapping by the transition length.
    pub fn sequence(durations: &[f64], requested_transition: Option<f64>) -> Self {
        let transition_secs = requested_transition
            .map(|t| effective_transition(t, durations))
            .unwrap_or(0.0);

        let mut clip_starts = Vec::with_capacity(durations.len());
        let mut joined = 0.0;
        for (i, d) in durations.iter().enumerate() {
            let start = if i == 0 { 0.0 } else { joined - transition_secs };
            clip_starts.push(start);
            joined = start + d;
        }

        Self {
            clip_starts,
            total_secs: joined,
            transition_secs,
        }
    }

    /// A single stream of known (or unknown, `0.0`) length.
    pub fn single(total_secs: f64) -> Self {
        Self {
            clip_starts: vec![0.0],
            total_secs,
            transition_secs: 0.0,
        }
    }

    /// `xfade` offsets: the joined length so far minus the transition.
    pub fn crossfade_offsets(&self) -> Vec<f64> {
        self.clip_starts.iter().skip(1).copied().collect()
    }

    /// Contiguous, non-overlapping `[start_i, start_i+1)` windows.
    pub fn badge_windows(&self) -> Vec<BadgeWindow> {
        self.clip_starts
            .iter()
            .enumerate()
            .map(|(i, &start)| BadgeWindow {
                rank: i + 1,
                start_secs: start,
                end_secs: self
                    .clip_starts
                    .get(i + 1)
                    .copied()
                    .unwrap_or(self.total_secs),
            })
            .collect()
    }
}

/// Cap a requested transition at 2s and at half the shortest clip.
/// Returns `0.0` when fewer than two clips are joined.
pub fn effective_transition(requested: f64, durations: &[f64]) -> f64 {
    if durations.len() < 2 || !requested.is_finite() || requested <= 0.0 {
        return 0.0;
    }
    let shortest = durations.iter().copied().fold(f64::INFINITY, f64::min);
    requested.min(MAX_TRANSITION_SECS).min(shortest / 2.0)
}

/// Compile a scene into a filter program and its engine inputs.
pub fn compile_scene(scene: &SceneDescription, style: &StyleResolver) -> ShortsmithResult<CompiledScene> {
    let profile = QualityProfile::for_tier(scene.output.quality);
    let compiled = match &scene.layout {
        SceneLayout::Ranking { clips } => compile_ranking(scene, clips, style, profile)?,
        SceneLayout::SplitScreen(split) => compile_split_screen(scene, split, style, profile)?,
    };
    tracing::debug!(
        mode = ?scene.mode(),
        statements = compiled.program.statements.len(),
        inputs = compiled.inputs.len(),
        total_secs = compiled.timeline.total_secs,
        "Compiled scene"
    );
    Ok(compiled)
}

fn compile_ranking(
    scene: &SceneDescription,
    clips: &[Clip],
    style: &StyleResolver,
    profile: QualityProfile,
) -> ShortsmithResult<CompiledScene> {
    if clips.is_empty() {
        return Err(ShortsmithError::compile("ranking scene has no clips"));
    }

    let frame = profile.frame();
    let fps = scene.output.fps;
    let area = layout::video_area(frame, scene.output.video_area_percent);
    let background = style.color(scene.output.background_color);

    let durations: Vec<f64> = clips.iter().map(|c| c.duration).collect();
    let timeline = Timeline::sequence(&durations, scene.transition.as_ref().map(|t| t.duration));
    let transition_name = (timeline.transition_secs > 0.0)
        .then(|| scene.transition.as_ref().map(|t| style::resolve_transition(&t.type_token)))
        .flatten();

    let mut g = GraphBuilder::new();

    // 1. Normalize each clip into the video area and composite it on a canvas.
    let composited: Vec<Stream> = clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            let normalized = g.chain(
                [Pad::input(i, StreamKind::Video)],
                [
                    format!(
                        "trim=start={}:duration={}",
                        fmt_secs(clip.trim_start),
                        fmt_secs(clip.duration)
                    ),
                    "setpts=PTS-STARTPTS".to_string(),
                    format!(
                        "scale={}:{}:force_original_aspect_ratio=decrease:flags=lanczos",
                        area.width, area.height
                    ),
                    format!(
                        "pad={}:{}:(ow-iw)/2:(oh-ih)/2:color={background}",
                        area.width, area.height
                    ),
                    "setsar=1".to_string(),
                    format!("fps={fps}"),
                ],
                StreamKind::Video,
                "norm",
            );
            let canvas = g.source(
                [format!(
                    "color=c={background}:s={}x{}:r={fps}:d={}",
                    frame.width,
                    frame.height,
                    fmt_secs(clip.duration)
                )],
                StreamKind::Video,
                "canvas",
            );
            g.chain(
                [Pad::from(canvas), Pad::from(normalized)],
                [format!("overlay=0:{}", area.y)],
                StreamKind::Video,
                "clip",
            )
        })
        .collect();

    // 2. Join.
    let mut video = join_video(&mut g, composited, &timeline, transition_name);

    // 3. Title.
    if let Some(title) = &scene.title {
        let anchor = layout::map_text_position(title.position, frame);
        let filter = drawtext(
            style,
            &DrawText {
                text: &title.text,
                family: &title.style.font_family,
                bold: title.style.bold,
                italic: title.style.italic,
                size: title.style.font_size,
                color: style.color(title.style.color),
                stroke_width: title.style.stroke_width,
                stroke_color: style.color(title.style.stroke_color),
                x: anchor.x_expr(),
                y: anchor.y_expr(),
                box_color: None,
                enable: None,
            },
            frame,
        );
        video = g.chain([Pad::from(video)], [filter], StreamKind::Video, "title");
    }

    // 4. Ranking badges.
    if let Some(ranking) = &scene.ranking {
        let rect = layout::badge_rect(ranking.position, ranking.size_at_reference, frame);
        let fill = style.color(style::badge_color(&ranking.style_token, ranking.custom_color));
        let font = style.font_file(style.fonts.default_family(), true, false);
        let number_size = ((rect.width as f64) * 0.5).round().max(1.0) as u32;
        let filters: Vec<String> = timeline
            .badge_windows()
            .iter()
            .flat_map(|window| badge_filters(window, rect, &fill, &font, number_size, style))
            .collect();
        video = g.chain([Pad::from(video)], filters, StreamKind::Video, "badges");
    }

    // 5. Subtitles.
    let subtitle_cards = scene
        .subtitles
        .as_ref()
        .map(|s| schedule_cards(&s.script, s.words_per_second, s.max_words_per_card))
        .unwrap_or_default();
    if let Some(subtitles) = &scene.subtitles {
        let center_y = subtitle_center_y(subtitles.position, frame, None);
        video = draw_subtitles(&mut g, video, subtitles, &subtitle_cards, style, frame, center_y);
    }

    // 6. Audio.
    let mut inputs: Vec<InputSpec> = clips.iter().map(|c| InputSpec::file(&c.path)).collect();
    let needs_audio = clips.iter().any(|c| c.has_audio) || scene.music.is_some();
    let audio = if needs_audio {
        let per_clip: Vec<Stream> = clips
            .iter()
            .enumerate()
            .map(|(i, clip)| clip_audio(&mut g, i, clip))
            .collect();
        let voice = join_audio(&mut g, per_clip, &timeline);
        let mixed = match &scene.music {
            Some(music) => {
                let index = inputs.len();
                inputs.push(InputSpec::file(&music.path));
                mix_music(&mut g, Some(voice), music, index, timeline.total_secs)
            }
            None => voice,
        };
        Some(g.output(mixed, Vec::new(), "aout"))
    } else {
        None
    };

    // 7. Final pixel format.
    let video_out = g.output(video, ["format=yuv420p".to_string()], "vout");

    Ok(CompiledScene {
        program: g.finish(),
        inputs,
        video_out,
        audio_out: audio,
        profile,
        fps,
        timeline,
        subtitle_cards,
    })
}

fn compile_split_screen(
    scene: &SceneDescription,
    split: &SplitScreen,
    style: &StyleResolver,
    profile: QualityProfile,
) -> ShortsmithResult<CompiledScene> {
    let frame = profile.frame();
    let fps = scene.output.fps;
    let regions = layout::split_regions(split.axis, split.ratio, frame, split.main_first);
    let timeline = Timeline::single(split.duration.unwrap_or(0.0));

    let mut g = GraphBuilder::new();

    let main = fill_region(&mut g, 0, regions.main, fps, split.duration);
    let background = fill_region(&mut g, 1, regions.background, fps, None);
    let (first, second) = if split.main_first {
        (main, background)
    } else {
        (background, main)
    };
    let stack = match split.axis {
        SplitAxis::Vertical => "vstack=inputs=2:shortest=1",
        SplitAxis::Horizontal => "hstack=inputs=2:shortest=1",
    };
    let mut video = g.chain(
        [Pad::from(first), Pad::from(second)],
        [stack.to_string()],
        StreamKind::Video,
        "stack",
    );

    let subtitle_cards = scene
        .subtitles
        .as_ref()
        .map(|s| schedule_cards(&s.script, s.words_per_second, s.max_words_per_card))
        .unwrap_or_default();
    if let Some(subtitles) = &scene.subtitles {
        let seam = match split.axis {
            SplitAxis::Vertical => Some(regions.ordered(split.main_first).0.height),
            SplitAxis::Horizontal => None,
        };
        let center_y = subtitle_center_y(subtitles.position, frame, seam);
        video = draw_subtitles(&mut g, video, subtitles, &subtitle_cards, style, frame, center_y);
    }

    let mut inputs = vec![
        InputSpec::file(&split.main.path),
        InputSpec::looped(&split.background.path),
    ];

    let voice = split.main.has_audio.then(|| {
        let mut filters = Vec::new();
        if let Some(d) = split.duration {
            filters.push(format!("atrim=duration={}", fmt_secs(d)));
            filters.push("asetpts=PTS-STARTPTS".to_string());
        }
        filters.push(AUDIO_FORMAT.to_string());
        g.chain([Pad::input(0, StreamKind::Audio)], filters, StreamKind::Audio, "voice")
    });
    let audio = match (&scene.music, voice) {
        (Some(music), voice) => {
            let index = inputs.len();
            inputs.push(InputSpec::file(&music.path));
            let mixed = mix_music(&mut g, voice, music, index, timeline.total_secs);
            Some(g.output(mixed, Vec::new(), "aout"))
        }
        (None, Some(voice)) => Some(g.output(voice, Vec::new(), "aout")),
        (None, None) => None,
    };

    let video_out = g.output(video, ["format=yuv420p".to_string()], "vout");

    Ok(CompiledScene {
        program: g.finish(),
        inputs,
        video_out,
        audio_out: audio,
        profile,
        fps,
        timeline,
        subtitle_cards,
    })
}

fn join_video(
    g: &mut GraphBuilder,
    clips: Vec<Stream>,
    timeline: &Timeline,
    transition: Option<&'static str>,
) -> Stream {
    let count = clips.len();
    let mut clips = clips.into_iter();
    let Some(first) = clips.next() else {
        return g.source(["nullsrc".to_string()], StreamKind::Video, "empty");
    };
    if count == 1 {
        return first;
    }

    match transition {
        Some(name) => {
            let duration = fmt_secs(timeline.transition_secs);
            clips
                .zip(timeline.crossfade_offsets())
                .fold(first, |joined, (next, offset)| {
                    g.chain(
                        [Pad::from(joined), Pad::from(next)],
                        [format!(
                            "xfade=transition={name}:duration={duration}:offset={}",
                            fmt_secs(offset)
                        )],
                        StreamKind::Video,
                        "xfade",
                    )
                })
        }
        None => {
            let pads: Vec<Pad> = std::iter::once(first).chain(clips).map(Pad::from).collect();
            g.chain(pads, [format!("concat=n={count}:v=1:a=0")], StreamKind::Video, "joined")
        }
    }
}

fn clip_audio(g: &mut GraphBuilder, index: usize, clip: &Clip) -> Stream {
    if clip.has_audio {
        g.chain(
            [Pad::input(index, StreamKind::Audio)],
            [
                format!(
                    "atrim=start={}:duration={}",
                    fmt_secs(clip.trim_start),
                    fmt_secs(clip.duration)
                ),
                "asetpts=PTS-STARTPTS".to_string(),
                AUDIO_FORMAT.to_string(),
            ],
            StreamKind::Audio,
            "aclip",
        )
    } else {
        g.source(
            [
                SILENCE_SOURCE.to_string(),
                format!("atrim=duration={}", fmt_secs(clip.duration)),
            ],
            StreamKind::Audio,
            "silence",
        )
    }
}

fn join_audio(g: &mut GraphBuilder, clips: Vec<Stream>, timeline: &Timeline) -> Stream {
    let count = clips.len();
    let mut clips = clips.into_iter();
    let Some(first) = clips.next() else {
        return g.source([SILENCE_SOURCE.to_string()], StreamKind::Audio, "silence");
    };
    if count == 1 {
        return first;
    }

    if timeline.transition_secs > 0.0 {
        let duration = fmt_secs(timeline.transition_secs);
        clips.fold(first, |joined, next| {
            g.chain(
                [Pad::from(joined), Pad::from(next)],
                [format!("acrossfade=d={duration}")],
                StreamKind::Audio,
                "acf",
            )
        })
    } else {
        let pads: Vec<Pad> = std::iter::once(first).chain(clips).map(Pad::from).collect();
        g.chain(pads, [format!("concat=n={count}:v=0:a=1")], StreamKind::Audio, "voice")
    }
}

/// Shape the music track and mix it under `voice`.
fn mix_music(
    g: &mut GraphBuilder,
    voice: Option<Stream>,
    music: &BackgroundMusic,
    input_index: usize,
    total_secs: f64,
) -> Stream {
    let mut filters = vec![AUDIO_FORMAT.to_string()];
    if total_secs > 0.0 {
        filters.push(format!("atrim=duration={}", fmt_secs(total_secs)));
    }
    filters.push(format!("volume={}", fmt_secs(music.volume_percent / 100.0)));
    if music.fade_in {
        filters.push(format!("afade=t=in:st=0:d={}", fmt_secs(MUSIC_FADE_SECS)));
    }
    if music.fade_out && total_secs > MUSIC_FADE_SECS {
        filters.push(format!(
            "afade=t=out:st={}:d={}",
            fmt_secs(total_secs - MUSIC_FADE_SECS),
            fmt_secs(MUSIC_FADE_SECS)
        ));
    }
    let shaped = g.chain(
        [Pad::input(input_index, StreamKind::Audio)],
        filters,
        StreamKind::Audio,
        "music",
    );

    let Some(voice) = voice else {
        return shaped;
    };

    let mix = "amix=inputs=2:duration=first".to_string();
    match music.ducking_percent {
        Some(amount) => {
            let ratio = 2.0 + amount.clamp(0.0, 100.0) / 100.0 * 8.0;
            let mut parts = g
                .split([Pad::from(voice)], ["asplit=2".to_string()], StreamKind::Audio, "vsplit", 2)
                .into_iter();
            // split() returns exactly the requested number of streams.
            let (Some(voice_main), Some(voice_key)) = (parts.next(), parts.next()) else {
                return shaped;
            };
            let ducked = g.chain(
                [Pad::from(shaped), Pad::from(voice_key)],
                [format!(
                    "sidechaincompress=threshold=0.05:ratio={}:attack=20:release=300",
                    fmt_secs(ratio)
                )],
                StreamKind::Audio,
                "ducked",
            );
            g.chain([Pad::from(voice_main), Pad::from(ducked)], [mix], StreamKind::Audio, "mix")
        }
        None => g.chain([Pad::from(voice), Pad::from(shaped)], [mix], StreamKind::Audio, "mix"),
    }
}

/// Fill-scale an input into a region.
fn fill_region(g: &mut GraphBuilder, index: usize, region: Rect, fps: u32, duration: Option<f64>) -> Stream {
    let mut filters = Vec::new();
    if let Some(d) = duration {
        filters.push(format!("trim=duration={}", fmt_secs(d)));
        filters.push("setpts=PTS-STARTPTS".to_string());
    }
    filters.extend([
        format!(
            "scale={}:{}:force_original_aspect_ratio=increase:flags=lanczos",
            region.width, region.height
        ),
        format!("crop={}:{}", region.width, region.height),
        "setsar=1".to_string(),
        format!("fps={fps}"),
    ]);
    g.chain([Pad::input(index, StreamKind::Video)], filters, StreamKind::Video, "region")
}

fn badge_filters(
    window: &BadgeWindow,
    rect: Rect,
    fill: &str,
    font: &str,
    number_size: u32,
    style: &StyleResolver,
) -> [String; 2] {
    let enable = format!(
        "enable='between(t,{},{})'",
        fmt_secs(window.start_secs),
        fmt_secs(window.end_secs)
    );
    let white = style.color(RgbColor::WHITE);
    [
        format!(
            "drawbox=x={}:y={}:w={}:h={}:color={fill}:t=fill:{enable}",
            rect.x, rect.y, rect.width, rect.height
        ),
        format!(
            "drawtext=text='{}':fontfile='{font}':fontsize={number_size}:fontcolor={white}:x={}+({}-text_w)/2:y={}+({}-text_h)/2:{enable}",
            style::escape_text(&window.rank.to_string()),
            rect.x,
            rect.width,
            rect.y,
            rect.height
        ),
    ]
}

/// Vertical center of subtitle cards. `seam` is the split boundary, if any.
fn subtitle_center_y(position: SubtitlePosition, frame: FrameSize, seam: Option<u32>) -> f64 {
    let h = frame.height as f64;
    match position {
        SubtitlePosition::Top => h * 0.15,
        SubtitlePosition::Center => seam.map(f64::from).unwrap_or(h / 2.0),
        SubtitlePosition::Bottom => h * 0.85,
    }
}

fn draw_subtitles(
    g: &mut GraphBuilder,
    video: Stream,
    subtitles: &Subtitles,
    cards: &[SubtitleCard],
    style: &StyleResolver,
    frame: FrameSize,
    center_y: f64,
) -> Stream {
    if cards.is_empty() {
        return video;
    }
    let template = &subtitles.template;
    let anchor = TextAnchor {
        center_x: frame.width as f64 / 2.0,
        center_y,
    };
    let box_color = template.bg_color.map(|c| style.color_with_alpha(c, 0.8));
    let filters: Vec<String> = cards
        .iter()
        .map(|card| {
            let text = style::apply_transform(&card.text, template.transform);
            drawtext(
                style,
                &DrawText {
                    text: &text,
                    family: &template.font_family,
                    bold: template.bold,
                    italic: false,
                    size: template.font_size,
                    color: style.color(template.color),
                    stroke_width: template.stroke_width,
                    stroke_color: style.color(template.stroke_color),
                    x: anchor.x_expr(),
                    y: anchor.y_expr(),
                    box_color: box_color.clone(),
                    enable: Some((card.start_secs, card.end_secs)),
                },
                frame,
            )
        })
        .collect();
    g.chain([Pad::from(video)], filters, StreamKind::Video, "subs")
}

struct DrawText<'a> {
    text: &'a str,
    family: &'a str,
    bold: bool,
    italic: bool,
    /// Editor font size at the reference width.
    size: f64,
    color: String,
    /// Editor stroke width at the reference width.
    stroke_width: f64,
    stroke_color: String,
    x: String,
    y: String,
    box_color: Option<String>,
    enable: Option<(f64, f64)>,
}

fn drawtext(style: &StyleResolver, text: &DrawText<'_>, frame: FrameSize) -> String {
    let font_size = layout::scaled_font_size(text.size, frame.width);
    let border = layout::scale_length(text.stroke_width, frame.width).round().max(0.0) as u32;
    let mut filter = format!(
        "drawtext=text='{}':fontfile='{}':fontsize={font_size}:fontcolor={}:x={}:y={}:borderw={border}:bordercolor={}",
        style::escape_text(text.text),
        style.font_file(text.family, text.bold, text.italic),
        text.color,
        text.x,
        text.y,
        text.stroke_color,
    );
    if let Some(box_color) = &text.box_color {
        let pad = (font_size / 4).max(1);
        filter.push_str(&format!(":box=1:boxcolor={box_color}:boxborderw={pad}"));
    }
    if let Some((start, end)) = text.enable {
        filter.push_str(&format!(
            ":enable='between(t,{},{})'",
            fmt_secs(start),
            fmt_secs(end)
        ));
    }
    filter
}

/// Format seconds without trailing zeros: `5`, `4.5`, `0.333`.
pub fn fmt_secs(value: f64) -> String {
    let text = format!("{:.3}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortsmith_common::config::ColorFormat;
    use shortsmith_scene_model::{
        MediaFile, MusicSettings, RankingRequest, RankingSettings, SplitScreenRequest,
        SubtitleSettings, TitleSettings, TransitionSettings,
    };
    use std::path::PathBuf;

    use crate::style::{FontResolver, OsFamily};

    fn resolver() -> StyleResolver {
        StyleResolver {
            color_format: ColorFormat::PackedBgra,
            fonts: FontResolver::with_dirs(OsFamily::Linux, "DejaVuSans", &[]),
        }
    }

    fn files(n: usize) -> Vec<MediaFile> {
        (0..n).map(|i| MediaFile::new(format!("/in/clip{i}.mp4"))).collect()
    }

    fn durations(ds: &[f64]) -> RankingRequest {
        RankingRequest {
            clips: ds
                .iter()
                .map(|&d| shortsmith_scene_model::ClipSettings {
                    trim_start: Some(0.0),
                    duration: Some(d),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fmt_secs() {
        assert_eq!(fmt_secs(5.0), "5");
        assert_eq!(fmt_secs(4.5), "4.5");
        assert_eq!(fmt_secs(1.0 / 3.0), "0.333");
        assert_eq!(fmt_secs(0.0), "0");
        assert_eq!(fmt_secs(-0.0001), "0");
    }

    #[test]
    fn test_badge_windows_for_equal_clips() {
        let timeline = Timeline::sequence(&[5.0, 5.0, 5.0], None);
        let windows: Vec<(f64, f64)> = timeline
            .badge_windows()
            .iter()
            .map(|w| (w.start_secs, w.end_secs))
            .collect();
        assert_eq!(windows, vec![(0.0, 5.0), (5.0, 10.0), (10.0, 15.0)]);
        assert_eq!(timeline.total_secs, 15.0);
    }

    #[test]
    fn test_crossfade_offset() {
        let timeline = Timeline::sequence(&[6.0, 6.0], Some(1.5));
        assert_eq!(timeline.crossfade_offsets(), vec![4.5]);
        assert_eq!(timeline.total_secs, 10.5);
    }

    #[test]
    fn test_crossfade_offsets_accumulate() {
        let timeline = Timeline::sequence(&[6.0, 4.0, 5.0], Some(1.0));
        assert_eq!(timeline.crossfade_offsets(), vec![5.0, 8.0]);
        assert_eq!(timeline.total_secs, 13.0);
    }

    #[test]
    fn test_transition_is_capped() {
        assert_eq!(effective_transition(5.0, &[10.0, 10.0]), MAX_TRANSITION_SECS);
        assert_eq!(effective_transition(1.5, &[2.0, 10.0]), 1.0);
        assert_eq!(effective_transition(1.0, &[10.0]), 0.0);
    }

    #[test]
    fn test_ranking_with_transition_uses_xfade() {
        let mut request = durations(&[6.0, 6.0]);
        request.transition = Some(TransitionSettings {
            kind: "wipe-left".to_string(),
            duration: 1.5,
        });
        let scene = SceneDescription::ranking(request, files(2), None).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();

        assert!(text.contains("xfade=transition=wipeleft:duration=1.5:offset=4.5"));
        assert!(text.contains("acrossfade=d=1.5"));
        assert_eq!(compiled.program.count_filter("concat"), 0);
        assert_eq!(compiled.total_secs(), 10.5);
        compiled.program.lint(compiled.inputs.len()).unwrap();
    }

    #[test]
    fn test_ranking_badges_share_enable_windows() {
        let mut request = durations(&[5.0, 5.0, 5.0]);
        request.ranking = Some(RankingSettings::default());
        let scene = SceneDescription::ranking(request, files(3), None).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();

        assert_eq!(compiled.program.count_filter("drawbox"), 3);
        assert!(text.contains(
            "drawbox=x=40:y=40:w=120:h=120:color=0xF6823BFF:t=fill:enable='between(t,5,10)'"
        ));
        assert!(text.contains("drawtext=text='3'"));
        assert_eq!(text.matches("enable='between(t,10,15)'").count(), 2);
    }

    #[test]
    fn test_clip_without_audio_gets_silence() {
        let mut clips = files(2);
        clips[1] = clips[1].clone().with_audio(false);
        let scene = SceneDescription::ranking(durations(&[3.0, 4.0]), clips, None).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();

        assert!(text.contains("[0:a]atrim=start=0:duration=3"));
        assert!(!text.contains("[1:a]"));
        assert!(text.contains("anullsrc=channel_layout=stereo:sample_rate=44100,atrim=duration=4"));
        assert!(text.contains("concat=n=2:v=0:a=1"));
        assert_eq!(compiled.audio_out.as_ref().map(|o| o.name.as_str()), Some("aout"));
    }

    #[test]
    fn test_silent_scene_has_no_audio_output() {
        let clips = files(1).into_iter().map(|f| f.with_audio(false)).collect();
        let scene = SceneDescription::ranking(RankingRequest::default(), clips, None).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        assert!(compiled.audio_out.is_none());
        let report = compiled.program.lint(1).unwrap();
        assert_eq!(report.dangling, vec!["vout".to_string()]);
    }

    #[test]
    fn test_music_mix_and_fades() {
        let mut request = durations(&[5.0, 5.0]);
        request.music = Some(MusicSettings::default());
        let scene =
            SceneDescription::ranking(request, files(2), Some(PathBuf::from("/in/music.mp3"))).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();

        assert_eq!(compiled.inputs.len(), 3);
        assert!(text.contains("[2:a]"));
        assert!(text.contains("volume=0.3"));
        assert!(text.contains("afade=t=in:st=0:d=2"));
        assert!(text.contains("afade=t=out:st=8:d=2"));
        assert!(text.contains("amix=inputs=2:duration=first"));
        assert!(!text.contains("sidechaincompress"));
        compiled.program.lint(3).unwrap();
    }

    #[test]
    fn test_music_ducking() {
        let mut request = durations(&[5.0]);
        request.music = Some(MusicSettings {
            ducking: true,
            ducking_amount: 50.0,
            ..Default::default()
        });
        let scene =
            SceneDescription::ranking(request, files(1), Some(PathBuf::from("/in/music.mp3"))).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();

        assert!(text.contains("asplit=2"));
        assert!(text.contains("sidechaincompress=threshold=0.05:ratio=6:attack=20:release=300"));
        assert_eq!(compiled.program.count_filter("amix"), 1);
        compiled.program.lint(2).unwrap();
    }

    #[test]
    fn test_title_text_is_escaped() {
        let mut request = durations(&[5.0]);
        request.title = Some(TitleSettings {
            text: "Rock'n'Roll: the best".to_string(),
            ..Default::default()
        });
        let scene = SceneDescription::ranking(request, files(1), None).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();
        assert!(text.contains("text='Rock'\\''n'\\''Roll\\: the best'"));
        compiled.program.lint(1).unwrap();
    }

    #[test]
    fn test_title_ending_in_backslash_assembles() {
        let mut request = durations(&[5.0]);
        request.title = Some(TitleSettings {
            text: "C:\\".to_string(),
            ..Default::default()
        });
        let scene = SceneDescription::ranking(request, files(1), None).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        assert!(compiled.program.text().contains("text='C\\:\\\\'"));
        crate::command::assemble(
            std::path::Path::new("ffmpeg"),
            &compiled,
            std::path::Path::new("/out/ranking.mp4"),
        )
        .unwrap();
    }

    #[test]
    fn test_clip_canvas_runs_at_scene_fps() {
        let mut request = durations(&[5.0, 5.0]);
        request.fps = Some(60);
        let scene = SceneDescription::ranking(request, files(2), None).unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();
        let canvases: Vec<&str> = text
            .split(';')
            .filter(|statement| statement.contains("color=c="))
            .collect();
        assert_eq!(canvases.len(), 2);
        for canvas in canvases {
            assert!(canvas.contains(":r=60:"), "canvas without scene rate: {canvas}");
        }
        assert!(text.contains("fps=60"));
    }

    #[test]
    fn test_split_screen_stacks_regions() {
        let request = SplitScreenRequest {
            split_ratio: Some(0.5),
            duration: Some(12.0),
            subtitles: Some(SubtitleSettings {
                script: "watch this one".to_string(),
                position: SubtitlePosition::Center,
                ..Default::default()
            }),
            ..Default::default()
        };
        let scene = SceneDescription::split_screen(
            request,
            MediaFile::new("/in/main.mp4"),
            MediaFile::new("/in/bg.mp4"),
            None,
        )
        .unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();

        assert!(compiled.inputs[1].loop_forever);
        assert!(text.contains("scale=1080:960:force_original_aspect_ratio=increase:flags=lanczos,crop=1080:960"));
        assert!(text.contains("vstack=inputs=2:shortest=1"));
        // Center cards sit on the seam.
        assert!(text.contains("y=960-text_h/2"));
        assert!(text.contains("[0:a]atrim=duration=12"));
        assert!(!text.contains("[1:a]"));
        assert_eq!(compiled.total_secs(), 12.0);
        compiled.program.lint(2).unwrap();
    }

    #[test]
    fn test_split_screen_horizontal_without_main_audio_uses_music_only() {
        let request = SplitScreenRequest {
            split_axis: SplitAxis::Horizontal,
            main_first: Some(false),
            duration: Some(10.0),
            ..Default::default()
        };
        let scene = SceneDescription::split_screen(
            request,
            MediaFile::new("/in/main.mp4").with_audio(false),
            MediaFile::new("/in/bg.mp4"),
            Some(PathBuf::from("/in/music.mp3")),
        )
        .unwrap();
        let compiled = compile_scene(&scene, &resolver()).unwrap();
        let text = compiled.program.text();

        assert!(text.contains("hstack=inputs=2:shortest=1"));
        assert!(!text.contains("amix"));
        assert!(text.contains("[2:a]"));
        assert!(compiled.audio_out.is_some());
        compiled.program.lint(3).unwrap();
    }
}
