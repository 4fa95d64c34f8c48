//! Coordinate mapping from editor units to output pixels.
//!
//! The editor positions everything in percentages of a 1080px-wide vertical
//! frame. These functions convert those values into pixel geometry for any
//! output resolution. All functions are pure.

use shortsmith_scene_model::{BadgePosition, PercentPosition, SplitAxis};

/// Editor reference width in pixels.
pub const REFERENCE_WIDTH: f64 = 1080.0;

/// Font sizes are authored larger than they render.
pub const FONT_SCALE_FACTOR: f64 = 0.6;

/// Badges are confined to the top 30% of the frame.
pub const BADGE_ZONE_FRACTION: f64 = 0.3;

/// Badge corner margin at the reference width.
pub const BADGE_MARGIN_AT_REFERENCE: f64 = 40.0;

/// Output frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }
}

/// The center point of a text element. Text is drawn centered on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextAnchor {
    pub center_x: f64,
    pub center_y: f64,
}

impl TextAnchor {
    /// `drawtext` x expression centering the rendered text on the anchor.
    pub fn x_expr(&self) -> String {
        format!("{}-text_w/2", self.center_x.round() as i64)
    }

    /// `drawtext` y expression centering the rendered text on the anchor.
    pub fn y_expr(&self) -> String {
        format!("{}-text_h/2", self.center_y.round() as i64)
    }
}

/// Map a percentage position onto the frame.
pub fn map_text_position(position: PercentPosition, frame: FrameSize) -> TextAnchor {
    TextAnchor {
        center_x: position.x / 100.0 * frame.width as f64,
        center_y: position.y / 100.0 * frame.height as f64,
    }
}

pub fn font_scale(width: u32) -> f64 {
    width as f64 / REFERENCE_WIDTH * FONT_SCALE_FACTOR
}

/// Font size in output pixels for an editor font size. Never below 1.
pub fn scaled_font_size(size: f64, width: u32) -> u32 {
    ((size * font_scale(width)).round() as i64).max(1) as u32
}

/// Scale a reference-width length (margins, strokes) to the output width.
pub fn scale_length(length_at_reference: f64, width: u32) -> f64 {
    length_at_reference * width as f64 / REFERENCE_WIDTH
}

/// Height of the top band in which badges may be placed.
pub fn badge_zone_height(frame: FrameSize) -> u32 {
    (frame.height as f64 * BADGE_ZONE_FRACTION).floor() as u32
}

/// Square badge geometry for a ranking badge.
///
/// The badge always fits inside the top band: `y + size <= 0.3 * height`.
pub fn badge_rect(position: BadgePosition, size_at_reference: f64, frame: FrameSize) -> Rect {
    let zone = badge_zone_height(frame);
    let size = (scale_length(size_at_reference, frame.width).round() as i64)
        .clamp(1, zone.max(1) as i64) as u32;
    let margin = scale_length(BADGE_MARGIN_AT_REFERENCE, frame.width).round() as u32;
    let max_y = zone.saturating_sub(size);
    let max_x = frame.width.saturating_sub(size);

    let left = margin.min(max_x);
    let right = frame.width.saturating_sub(size + margin).min(max_x);
    let top = margin.min(max_y);
    let bottom = (zone as f64 - 1.5 * size as f64).clamp(0.0, max_y as f64) as u32;

    let (x, y) = match position {
        BadgePosition::TopLeft => (left, top),
        BadgePosition::TopRight => (right, top),
        BadgePosition::BottomLeft => (left, bottom),
        BadgePosition::BottomRight => (right, bottom),
        BadgePosition::Center => (max_x / 2, max_y / 2),
    };

    Rect {
        x,
        y,
        width: size,
        height: size,
    }
}

/// The lower band occupied by clips, anchored to the bottom edge.
pub fn video_area(frame: FrameSize, percent: f64) -> Rect {
    let percent = percent.clamp(0.0, 100.0);
    let height = even_floor(frame.height as f64 * percent / 100.0).min(even_floor(frame.height as f64));
    Rect {
        x: 0,
        y: frame.height - height,
        width: frame.width,
        height,
    }
}

/// Regions for the main and background clips of a split-screen scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRegions {
    pub main: Rect,
    pub background: Rect,
}

impl SplitRegions {
    /// Regions in stacking order (top/left first).
    pub fn ordered(&self, main_first: bool) -> (Rect, Rect) {
        if main_first {
            (self.main, self.background)
        } else {
            (self.background, self.main)
        }
    }
}

pub fn split_regions(axis: SplitAxis, ratio: f64, frame: FrameSize, main_first: bool) -> SplitRegions {
    let ratio = ratio.clamp(0.0, 1.0);
    let span = match axis {
        SplitAxis::Vertical => frame.height,
        SplitAxis::Horizontal => frame.width,
    };
    let main_span = even_floor(span as f64 * ratio).clamp(2, span.saturating_sub(2).max(2));
    let background_span = span.saturating_sub(main_span);
    let (main_offset, background_offset) = if main_first {
        (0, main_span)
    } else {
        (background_span, 0)
    };

    let rect = |offset: u32, len: u32| match axis {
        SplitAxis::Vertical => Rect {
            x: 0,
            y: offset,
            width: frame.width,
            height: len,
        },
        SplitAxis::Horizontal => Rect {
            x: offset,
            y: 0,
            width: len,
            height: frame.height,
        },
    };

    SplitRegions {
        main: rect(main_offset, main_span),
        background: rect(background_offset, background_span),
    }
}

/// Round down to an even pixel count (encoders require even dimensions).
fn even_floor(value: f64) -> u32 {
    let v = value.max(0.0).floor() as u32;
    (v - v % 2).max(2)
}
