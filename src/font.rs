//! Font programs available to a composition.
//!
//! Loaded fonts are embedded as Identity-H composite fonts, so text set in
//! them is written and measured glyph by glyph straight from the font's own
//! cmap. Text set in a font that is not loaded falls back to the base-14
//! metrics at the bottom of this file.

use crate::types::Pt;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ttf_parser::GlyphId;

#[derive(Debug)]
pub struct LoadedFont {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
}

/// A character mapped to the font's glyph, with its advance in 1/1000 em.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Glyph {
    pub(crate) ch: char,
    pub(crate) id: u16,
    pub(crate) advance: u16,
}

impl LoadedFont {
    /// PostScript name (or the best available substitute).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Family and full names the font also answers to.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub(crate) fn from_bytes(data: Vec<u8>, path: &Path) -> Result<LoadedFont, String> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|err| err.to_string())?;
        if face.tables().glyf.is_none() {
            return Err("font has no TrueType outlines".to_string());
        }
        let (name, aliases) = font_names(&face, path);
        let metrics = FontMetrics::from_face(&face);
        Ok(LoadedFont {
            name,
            aliases,
            data,
            metrics,
        })
    }

    /// Maps every character of `text` to a glyph. Characters the font has no
    /// glyph for map to glyph 0 (`.notdef`) at the missing width.
    pub(crate) fn glyphs(&self, text: &str) -> Vec<Glyph> {
        let face = ttf_parser::Face::parse(&self.data, 0).ok();
        text.chars()
            .map(|ch| {
                let mapped = face.as_ref().and_then(|face| {
                    let id = face.glyph_index(ch)?;
                    let advance = face.glyph_hor_advance(id).unwrap_or(0);
                    Some((id.0, scale_advance(advance, face.units_per_em())))
                });
                match mapped {
                    Some((id, advance)) => Glyph { ch, id, advance },
                    None => Glyph {
                        ch,
                        id: 0,
                        advance: self.metrics.missing_width,
                    },
                }
            })
            .collect()
    }

    pub(crate) fn measure_text_width(&self, font_size: Pt, text: &str) -> Pt {
        let total_units: i32 = self
            .glyphs(text)
            .iter()
            .map(|glyph| glyph.advance as i32)
            .sum();
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) line_gap: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
    pub(crate) is_bold: bool,
    pub(crate) is_italic: bool,
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let space = face.glyph_index(' ').unwrap_or(GlyphId(0));
        let missing_width = face
            .glyph_hor_advance(space)
            .map(|advance| scale_advance(advance, units_per_em))
            .unwrap_or(0);
        let ascent = scale_i16(face.ascender(), scale);
        let bbox = face.global_bounding_box();
        Self {
            ascent,
            descent: scale_i16(face.descender(), scale),
            line_gap: scale_i16(face.line_gap(), scale),
            cap_height: face
                .capital_height()
                .map(|value| scale_i16(value, scale))
                .unwrap_or(ascent),
            italic_angle: face
                .italic_angle()
                .map(|value| value.round() as i16)
                .unwrap_or(0),
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
            is_bold: face.is_bold(),
            is_italic: face.is_italic(),
        }
    }

    fn line_height(&self, font_size: Pt) -> Pt {
        let height_1000 = self.ascent as i32 - self.descent as i32 + self.line_gap as i32;
        if height_1000 <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(height_1000, 1000)
    }
}

/// The usable fonts of a composition, looked up case-insensitively by any of
/// their names.
#[derive(Debug, Clone, Default)]
pub struct FontSet {
    fonts: Vec<Arc<LoadedFont>>,
    lookup: HashMap<String, usize>,
}

impl FontSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LoadedFont>> {
        self.fonts.iter()
    }

    pub fn add(&mut self, font: LoadedFont) -> &str {
        let index = self.fonts.len();
        let names: Vec<String> = std::iter::once(font.name.clone())
            .chain(font.aliases.iter().cloned())
            .collect();
        for alias in names {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        self.fonts.push(Arc::new(font));
        &self.fonts[index].name
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<LoadedFont>> {
        self.lookup
            .get(&normalize_name(name))
            .and_then(|index| self.fonts.get(*index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn measure_text_width(&self, name: &str, font_size: Pt, text: &str) -> Pt {
        match self.resolve(name) {
            Some(font) => font.measure_text_width(font_size, text),
            None => BuiltinFont::for_name(name).measure_text_width(font_size, text),
        }
    }

    /// Natural line height of the font at `font_size`, never below `fallback`.
    pub fn line_height(&self, name: &str, font_size: Pt, fallback: Pt) -> Pt {
        match self.resolve(name) {
            Some(font) => font.metrics.line_height(font_size).max(fallback),
            None => fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for FontFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Fonts loaded from a list of paths. A path that cannot be read or parsed is
/// recorded as a failure and skipped; building never fails.
#[derive(Debug, Clone, Default)]
pub struct FontCatalog {
    fonts: FontSet,
    failures: Vec<FontFailure>,
}

impl FontCatalog {
    pub fn build<I, P>(paths: I) -> FontCatalog
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut catalog = FontCatalog::default();
        for path in paths {
            let path = path.as_ref();
            match fs::read(path)
                .map_err(|err| err.to_string())
                .and_then(|data| LoadedFont::from_bytes(data, path))
            {
                Ok(font) => {
                    let name = catalog.fonts.add(font);
                    log::debug!("loaded font {name} from {}", path.display());
                }
                Err(reason) => {
                    log::warn!("skipping font {}: {reason}", path.display());
                    catalog.failures.push(FontFailure {
                        path: path.to_path_buf(),
                        reason,
                    });
                }
            }
        }
        catalog
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    pub fn into_fonts(self) -> FontSet {
        self.fonts
    }

    pub fn failures(&self) -> &[FontFailure] {
        &self.failures
    }
}

fn scale_advance(advance: u16, units_per_em: u16) -> u16 {
    let units = units_per_em.max(1) as u32;
    let scaled = (advance as u32 * 1000 + units / 2) / units;
    scaled.min(u16::MAX as u32) as u16
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        let slot = match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => &mut family,
            name_id::FULL_NAME => &mut full,
            name_id::POST_SCRIPT_NAME => &mut post,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(name);
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());

    let mut aliases = Vec::new();
    for candidate in [family, full, post, stem].into_iter().flatten() {
        if candidate != primary && !aliases.contains(&candidate) {
            aliases.push(candidate);
        }
    }
    (primary, aliases)
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

/// Byte a character encodes to under WinAnsiEncoding (cp1252).
pub(crate) fn winansi_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Base-14 fonts with metrics good enough for line breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFont {
    Helvetica,
    HelveticaBold,
    Courier,
}

impl BuiltinFont {
    /// Picks the metrics closest to a base-14 font name. Anything that is not
    /// Courier or a bold face measures as Helvetica.
    pub fn for_name(name: &str) -> BuiltinFont {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("courier") {
            BuiltinFont::Courier
        } else if lower.contains("bold") {
            BuiltinFont::HelveticaBold
        } else {
            BuiltinFont::Helvetica
        }
    }

    pub fn base_name(self) -> &'static str {
        match self {
            BuiltinFont::Helvetica => "Helvetica",
            BuiltinFont::HelveticaBold => "Helvetica-Bold",
            BuiltinFont::Courier => "Courier",
        }
    }

    /// Ascender height in thousandths of the font size.
    pub fn ascent(self) -> i32 {
        match self {
            BuiltinFont::Helvetica | BuiltinFont::HelveticaBold => 718,
            BuiltinFont::Courier => 629,
        }
    }

    pub fn char_width(self, ch: char) -> u16 {
        let table = match self {
            BuiltinFont::Helvetica => &HELVETICA_WIDTHS,
            BuiltinFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
            BuiltinFont::Courier => return 600,
        };
        let code = ch as u32;
        if (32..=126).contains(&code) {
            table[(code - 32) as usize]
        } else {
            table[(b'n' - 32) as usize]
        }
    }

    pub fn measure_text_width(self, font_size: Pt, text: &str) -> Pt {
        let total: i32 = text.chars().map(|ch| self.char_width(ch) as i32).sum();
        font_size.mul_ratio(total, 1000)
    }
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];
