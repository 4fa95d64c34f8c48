//! Style resolution: colors, text escaping, fonts, transitions and badges.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use shortsmith_common::config::{ColorFormat, StyleConfig};
use shortsmith_common::error::{ShortsmithError, ShortsmithResult};
use shortsmith_scene_model::{RgbColor, TextTransform};

/// Resolves editor style tokens into engine literals.
#[derive(Debug, Clone)]
pub struct StyleResolver {
    pub color_format: ColorFormat,
    pub fonts: FontResolver,
}

impl StyleResolver {
    pub fn from_config(config: &StyleConfig) -> Self {
        Self {
            color_format: config.color_format,
            fonts: FontResolver::scan(config),
        }
    }

    /// Engine color literal for an opaque color.
    pub fn color(&self, color: RgbColor) -> String {
        color_literal(color, 1.0, self.color_format)
    }

    pub fn color_with_alpha(&self, color: RgbColor, alpha: f64) -> String {
        color_literal(color, alpha, self.color_format)
    }

    /// Escaped font path for a `fontfile=` option.
    pub fn font_file(&self, family: &str, bold: bool, italic: bool) -> String {
        escape_text(&self.fonts.resolve(family, bold, italic).to_string_lossy())
    }
}

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// Build an engine color literal from a color and an alpha in `[0, 1]`.
pub fn color_literal(color: RgbColor, alpha: f64, format: ColorFormat) -> String {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    match format {
        ColorFormat::PackedBgra => {
            format!("0x{:02X}{:02X}{:02X}{:02X}", color.b, color.g, color.r, a)
        }
        ColorFormat::Hex => format!("0x{:02X}{:02X}{:02X}{:02X}", color.r, color.g, color.b, a),
    }
}

/// Parse an editor color string and build its engine literal.
pub fn resolve_color(hex: &str, alpha: f64, format: ColorFormat) -> ShortsmithResult<String> {
    let color: RgbColor = hex
        .parse()
        .map_err(|e| ShortsmithError::validation(format!("{e}")))?;
    Ok(color_literal(color, alpha, format))
}

/// Recover the color and alpha byte from an engine literal.
pub fn decode_color(literal: &str, format: ColorFormat) -> Option<(RgbColor, u8)> {
    let digits = literal
        .strip_prefix("0x")
        .or_else(|| literal.strip_prefix("0X"))?;
    if digits.len() != 8 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    let [b0, b1, b2, alpha] = value.to_be_bytes();
    let color = match format {
        ColorFormat::PackedBgra => RgbColor::new(b2, b1, b0),
        ColorFormat::Hex => RgbColor::new(b0, b1, b2),
    };
    Some((color, alpha))
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Escape a literal for embedding in a quoted filter option.
///
/// Apostrophes close the quote, emit an escaped apostrophe and reopen it.
/// Backslashes and filter metacharacters are backslash-escaped.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\'' => out.push_str("'\\''"),
            '\\' | ':' | '[' | ']' | ',' | ';' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

pub fn apply_transform(text: &str, transform: TextTransform) -> String {
    match transform {
        TextTransform::None => text.to_string(),
        TextTransform::Uppercase => text.to_uppercase(),
        TextTransform::Lowercase => text.to_lowercase(),
        TextTransform::Capitalize => {
            let mut out = String::with_capacity(text.len());
            let mut at_word_start = true;
            for ch in text.chars() {
                if at_word_start && ch.is_alphabetic() {
                    out.extend(ch.to_uppercase());
                    at_word_start = false;
                } else {
                    out.push(ch);
                    at_word_start = ch.is_whitespace();
                }
            }
            out
        }
    }
}

// ---------------------------------------------------------------------------
// Fonts
// ---------------------------------------------------------------------------

/// Host OS family, used to pick default font directories and file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    MacOs,
    Windows,
}

impl OsFamily {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => OsFamily::MacOs,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Linux,
        }
    }

    pub fn default_font_dirs(self) -> Vec<PathBuf> {
        let home = std::env::var("HOME").map(PathBuf::from).ok();
        match self {
            OsFamily::Linux => {
                let mut dirs = vec![
                    PathBuf::from("/usr/share/fonts"),
                    PathBuf::from("/usr/local/share/fonts"),
                ];
                if let Some(home) = home {
                    dirs.push(home.join(".local/share/fonts"));
                    dirs.push(home.join(".fonts"));
                }
                dirs
            }
            OsFamily::MacOs => {
                let mut dirs = vec![
                    PathBuf::from("/System/Library/Fonts"),
                    PathBuf::from("/System/Library/Fonts/Supplemental"),
                    PathBuf::from("/Library/Fonts"),
                ];
                if let Some(home) = home {
                    dirs.push(home.join("Library/Fonts"));
                }
                dirs
            }
            OsFamily::Windows => {
                let root = std::env::var("WINDIR").unwrap_or_else(|_| "C:\\Windows".to_string());
                vec![PathBuf::from(root).join("Fonts")]
            }
        }
    }

    /// Path used when nothing else resolves.
    pub fn fallback_font(self) -> PathBuf {
        match self {
            OsFamily::Linux => PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            OsFamily::MacOs => PathBuf::from("/System/Library/Fonts/Helvetica.ttc"),
            OsFamily::Windows => PathBuf::from("C:\\Windows\\Fonts\\arial.ttf"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FontVariant {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontVariant {
    fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => FontVariant::BoldItalic,
            (true, false) => FontVariant::Bold,
            (false, true) => FontVariant::Italic,
            (false, false) => FontVariant::Regular,
        }
    }

    /// This variant followed by its fallbacks.
    fn chain(self) -> &'static [FontVariant] {
        match self {
            FontVariant::BoldItalic => &[FontVariant::BoldItalic, FontVariant::Bold, FontVariant::Regular],
            FontVariant::Bold => &[FontVariant::Bold, FontVariant::Regular],
            FontVariant::Italic => &[FontVariant::Italic, FontVariant::Regular],
            FontVariant::Regular => &[FontVariant::Regular],
        }
    }

    /// Candidate file stems for a family. Covers `Family-Bold` (Linux),
    /// `Family Bold` (macOS) and `familybd` (Windows) conventions.
    fn file_stems(self, family: &str) -> Vec<String> {
        let compact: String = family.chars().filter(|c| !c.is_whitespace()).collect();
        let short = compact.to_lowercase();
        let (dash, spaced, win): (&[&str], &[&str], &str) = match self {
            FontVariant::Regular => (&["", "-Regular", "-Book"], &["", " Regular"], ""),
            FontVariant::Bold => (&["-Bold"], &[" Bold"], "bd"),
            FontVariant::Italic => (&["-Italic", "-Oblique"], &[" Italic"], "i"),
            FontVariant::BoldItalic => (&["-BoldItalic", "-BoldOblique"], &[" Bold Italic"], "bi"),
        };
        let mut stems = Vec::new();
        for suffix in dash {
            stems.push(format!("{compact}{suffix}"));
        }
        for suffix in spaced {
            stems.push(format!("{family}{suffix}"));
        }
        stems.push(format!("{short}{win}"));
        stems
    }
}

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];
const MAX_SCAN_DEPTH: usize = 4;

/// Maps `(family, bold, italic)` to a font file on disk.
///
/// Font directories are indexed once at construction. Resolution never
/// fails: it falls back through weaker variants, then the default family,
/// then a fixed per-OS path.
#[derive(Debug, Clone)]
pub struct FontResolver {
    os: OsFamily,
    default_family: String,
    /// Lowercase file name -> first path seen with that name.
    index: HashMap<String, PathBuf>,
}

impl FontResolver {
    pub fn scan(config: &StyleConfig) -> Self {
        let os = OsFamily::current();
        let mut dirs = config.font_dirs.clone();
        dirs.extend(os.default_font_dirs());
        Self::with_dirs(os, &config.default_font_family, &dirs)
    }

    pub fn with_dirs(os: OsFamily, default_family: &str, dirs: &[PathBuf]) -> Self {
        let mut index = HashMap::new();
        for dir in dirs {
            index_dir(dir, 0, &mut index);
        }
        tracing::debug!(fonts = index.len(), os = ?os, "Indexed font directories");
        Self {
            os,
            default_family: default_family.to_string(),
            index,
        }
    }

    pub fn default_family(&self) -> &str {
        &self.default_family
    }

    pub fn resolve(&self, family: &str, bold: bool, italic: bool) -> PathBuf {
        let variant = FontVariant::from_flags(bold, italic);
        if let Some(path) = self.lookup(family, variant) {
            return path;
        }
        if !family.eq_ignore_ascii_case(&self.default_family) {
            if let Some(path) = self.lookup(&self.default_family, variant) {
                tracing::debug!(family, fallback = %self.default_family, "Font family not found, using default");
                return path;
            }
        }
        tracing::warn!(family, bold, italic, "No font file found, using OS fallback");
        self.os.fallback_font()
    }

    fn lookup(&self, family: &str, variant: FontVariant) -> Option<PathBuf> {
        variant.chain().iter().find_map(|v| {
            v.file_stems(family).iter().find_map(|stem| {
                FONT_EXTENSIONS.iter().find_map(|ext| {
                    self.index
                        .get(&format!("{stem}.{ext}").to_lowercase())
                        .cloned()
                })
            })
        })
    }
}

fn index_dir(dir: &Path, depth: usize, index: &mut HashMap<String, PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            if depth < MAX_SCAN_DEPTH {
                index_dir(&path, depth + 1, index);
            }
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FONT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if !is_font {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            index.entry(name.to_lowercase()).or_insert(path.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions and badges
// ---------------------------------------------------------------------------

/// Map an editor transition token to the engine's `xfade` transition name.
///
/// Tokens without an engine equivalent render as `fade`.
pub fn resolve_transition(token: &str) -> &'static str {
    match token.trim().to_ascii_lowercase().as_str() {
        "fade" => "fade",
        "fadeblack" | "fade-black" => "fadeblack",
        "fadewhite" | "fade-white" => "fadewhite",
        "dissolve" => "dissolve",
        "wipe-left" | "wipeleft" => "wipeleft",
        "wipe-right" | "wiperight" => "wiperight",
        "wipe-up" | "wipeup" => "wipeup",
        "wipe-down" | "wipedown" => "wipedown",
        "slide-left" | "slideleft" => "slideleft",
        "slide-right" | "slideright" => "slideright",
        "slide-up" | "slideup" => "slideup",
        "slide-down" | "slidedown" => "slidedown",
        "circle-open" | "circleopen" => "circleopen",
        "circle-close" | "circleclose" => "circleclose",
        other => {
            tracing::warn!(transition = other, "Unsupported transition, rendering as fade");
            "fade"
        }
    }
}

pub const BADGE_NUMBER_COLOR: RgbColor = RgbColor::new(0x3B, 0x82, 0xF6);
pub const BADGE_BADGE_COLOR: RgbColor = RgbColor::new(0xEF, 0x44, 0x44);
pub const BADGE_MEDAL_COLOR: RgbColor = RgbColor::new(0xF5, 0x9E, 0x0B);
pub const BADGE_TROPHY_COLOR: RgbColor = RgbColor::new(0xEA, 0xB3, 0x08);
pub const BADGE_CUSTOM_COLOR: RgbColor = RgbColor::new(0x8B, 0x5C, 0xF6);

/// Fill color for a ranking style token.
pub fn badge_color(style_token: &str, custom: Option<RgbColor>) -> RgbColor {
    match style_token.trim().to_ascii_lowercase().as_str() {
        "number" => BADGE_NUMBER_COLOR,
        "badge" => BADGE_BADGE_COLOR,
        "medal" => BADGE_MEDAL_COLOR,
        "trophy" => BADGE_TROPHY_COLOR,
        "custom" => custom.unwrap_or(BADGE_CUSTOM_COLOR),
        other => {
            tracing::warn!(style = other, "Unknown ranking style, using number color");
            BADGE_NUMBER_COLOR
        }
    }
}
