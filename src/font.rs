use crate::error::{ReportError, Result};
use crate::pdf::{encode_winansi_bytes, winansi_char};
use crate::types::Length;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Points per millimetre; the default user unit is the millimetre.
pub const POINTS_PER_MM: f32 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontVariant {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontVariant {
    pub fn is_bold(self) -> bool {
        matches!(self, FontVariant::Bold | FontVariant::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, FontVariant::Italic | FontVariant::BoldItalic)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontStyle {
    pub family: Arc<str>,
    pub variant: FontVariant,
    pub size_pt: f32,
}

impl FontStyle {
    pub fn new(family: impl Into<Arc<str>>, variant: FontVariant, size_pt: f32) -> Self {
        Self {
            family: family.into(),
            variant,
            size_pt,
        }
    }

    pub fn helvetica(variant: FontVariant, size_pt: f32) -> Self {
        Self::new("Helvetica", variant, size_pt)
    }

    /// Font size expressed in user units.
    pub fn size_in_units(&self, unit_scale: f32) -> Length {
        if unit_scale <= 0.0 {
            return Length::ZERO;
        }
        Length::from_f32(self.size_pt / unit_scale)
    }
}

/// Measures the rendered width of a string. Implementations must be
/// deterministic and never return a width smaller than that of any single
/// character of the same string.
pub trait TextMeasurer: Send + Sync {
    fn measure(&self, text: &str, font: &FontStyle) -> Result<Length>;
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

const MISSING_WIDTH: u16 = 600;

/// Advance widths of the standard PDF Helvetica family, in 1/1000 em.
/// Arial and any unknown family are measured as Helvetica; oblique faces share
/// the upright advances.
#[derive(Debug, Clone, Copy)]
pub struct CoreFontMetrics {
    unit_scale: f32,
}

impl CoreFontMetrics {
    pub fn new(unit_scale: f32) -> Self {
        Self { unit_scale }
    }

    pub fn millimetres() -> Self {
        Self::new(POINTS_PER_MM)
    }

    pub fn unit_scale(&self) -> f32 {
        self.unit_scale
    }

    fn advance(ch: char, bold: bool) -> u32 {
        let table = if bold {
            &HELVETICA_BOLD_WIDTHS
        } else {
            &HELVETICA_WIDTHS
        };
        if let Some(width) = ascii_advance(table, ch) {
            return width;
        }
        match ch {
            'í' | 'ì' | 'î' | 'ï' => return 278,
            '¿' => return 611,
            '¡' => return 333,
            '°' => return 400,
            'º' => return 365,
            'ª' => return 370,
            '\u{00A0}' => return 278,
            _ => {}
        }
        // Everything else is drawn with its ASCII transliteration.
        match deunicode::deunicode_char(ch) {
            Some(folded) if !folded.is_empty() => folded
                .chars()
                .map(|c| ascii_advance(table, c).unwrap_or(MISSING_WIDTH as u32))
                .sum(),
            _ => MISSING_WIDTH as u32,
        }
    }

    fn width_milli_em(text: &str, bold: bool) -> u64 {
        text.chars().map(|ch| Self::advance(ch, bold) as u64).sum()
    }
}

fn ascii_advance(table: &[u16; 95], ch: char) -> Option<u32> {
    let code = ch as u32;
    if (32..=126).contains(&code) {
        Some(table[(code - 32) as usize] as u32)
    } else {
        None
    }
}

fn check_font(font: &FontStyle, unit_scale: f32) -> Result<()> {
    if !font.size_pt.is_finite() || font.size_pt <= 0.0 {
        return Err(ReportError::RenderBackend(format!(
            "font size must be positive (got {} for {})",
            font.size_pt, font.family
        )));
    }
    if !unit_scale.is_finite() || unit_scale <= 0.0 {
        return Err(ReportError::RenderBackend(format!(
            "unit scale must be positive (got {unit_scale})"
        )));
    }
    Ok(())
}

fn scale_width(milli_em: u64, font: &FontStyle, unit_scale: f32) -> Length {
    let points = milli_em as f64 * font.size_pt as f64 / 1000.0;
    Length::from_f32((points / unit_scale as f64) as f32)
}

impl TextMeasurer for CoreFontMetrics {
    fn measure(&self, text: &str, font: &FontStyle) -> Result<Length> {
        check_font(font, self.unit_scale)?;
        let milli_em = Self::width_milli_em(text, font.variant.is_bold());
        Ok(scale_width(milli_em, font, self.unit_scale))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgram {
    TrueType,
    OpenTypeCff,
}

/// First and last single-byte codes a registered face is written with.
pub(crate) const FIRST_CODE: u8 = 0x20;
pub(crate) const LAST_CODE: u8 = 0xFF;

/// A parsed face plus everything the PDF writer needs to embed it.
#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Arc<[u8]>,
    pub(crate) program: FontProgram,
    // Advances for WinAnsi codes FIRST_CODE..=LAST_CODE, in 1/1000 em.
    pub(crate) widths: Vec<u16>,
    pub(crate) missing_width: u16,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: [i16; 4],
    pub(crate) fixed_pitch: bool,
}

impl RegisteredFont {
    fn from_bytes(data: &[u8], fallback_name: &str) -> Result<Self> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|err| ReportError::Font(format!("invalid font data for {fallback_name}: {err}")))?;
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let missing_width = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .map(|advance| scale_u16(advance, scale))
            .unwrap_or(0);
        let widths = (FIRST_CODE..=LAST_CODE)
            .map(|code| {
                winansi_char(code)
                    .and_then(|ch| face.glyph_index(ch))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|advance| scale_u16(advance, scale))
                    .unwrap_or(missing_width)
            })
            .collect();
        let ascent = scale_i16(face.ascender(), scale);
        let bbox = face.global_bounding_box();
        let program = if face.tables().cff.is_some() {
            FontProgram::OpenTypeCff
        } else {
            FontProgram::TrueType
        };
        Ok(Self {
            name: postscript_name(&face).unwrap_or_else(|| fallback_name.to_string()),
            data: Arc::from(data),
            program,
            widths,
            missing_width,
            ascent,
            descent: scale_i16(face.descender(), scale),
            cap_height: face
                .capital_height()
                .map(|value| scale_i16(value, scale))
                .unwrap_or(ascent),
            italic_angle: face.italic_angle().map(|v| v.round() as i16).unwrap_or(0),
            bbox: [
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ],
            fixed_pitch: face.is_monospaced(),
        })
    }

    fn code_width(&self, code: u8) -> u16 {
        if code < FIRST_CODE {
            return self.missing_width;
        }
        self.widths
            .get((code - FIRST_CODE) as usize)
            .copied()
            .unwrap_or(self.missing_width)
    }

    /// Width of `text` as the PDF writer draws it: the same WinAnsi bytes,
    /// folded and replaced the same way.
    fn width_milli_em(&self, text: &str) -> u64 {
        let (bytes, _) = encode_winansi_bytes(text);
        bytes.iter().map(|code| self.code_width(*code) as u64).sum()
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn scale_u16(value: u16, scale: f32) -> u16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(0, u16::MAX as i32) as u16
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    face.names()
        .into_iter()
        .filter(|entry| entry.name_id == name_id::POST_SCRIPT_NAME)
        .find_map(|entry| entry.to_string())
        .or_else(|| family_name(face))
}

fn family_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    face.names()
        .into_iter()
        .filter(|entry| {
            entry.name_id == name_id::TYPOGRAPHIC_FAMILY || entry.name_id == name_id::FAMILY
        })
        .find_map(|entry| entry.to_string())
}

/// TrueType/OpenType faces registered by family and variant. Families that
/// were never registered are measured with [`CoreFontMetrics`].
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<(String, FontVariant), usize>,
    core: CoreFontMetrics,
}

impl FontRegistry {
    pub fn new(unit_scale: f32) -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            core: CoreFontMetrics::new(unit_scale),
        }
    }

    pub fn unit_scale(&self) -> f32 {
        self.core.unit_scale()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Registers a face under `family` and returns its PostScript name.
    pub fn register_bytes(
        &mut self,
        family: &str,
        variant: FontVariant,
        data: &[u8],
    ) -> Result<String> {
        let font = RegisteredFont::from_bytes(data, family)?;
        let name = font.name.clone();
        let index = self.fonts.len();
        self.fonts.push(font);
        self.lookup.insert((normalize_name(family), variant), index);
        tracing::debug!(family, ?variant, face = %name, "registered font face");
        Ok(name)
    }

    pub fn register_file(
        &mut self,
        family: &str,
        variant: FontVariant,
        path: impl AsRef<Path>,
    ) -> Result<String> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|v| v.to_str())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();
        if ext != "ttf" && ext != "otf" {
            return Err(ReportError::Font(format!(
                "unsupported font file {}",
                path.display()
            )));
        }
        let data = fs::read(path)?;
        self.register_bytes(family, variant, &data)
    }

    /// Index of the registered face that draws `font`. A missing variant
    /// falls back to the family's regular face.
    pub(crate) fn face_index(&self, font: &FontStyle) -> Option<usize> {
        let family = normalize_name(&font.family);
        self.lookup
            .get(&(family.clone(), font.variant))
            .or_else(|| self.lookup.get(&(family, FontVariant::Regular)))
            .copied()
    }

    pub(crate) fn face(&self, index: usize) -> Option<&RegisteredFont> {
        self.fonts.get(index)
    }

    /// PostScript name of the face that draws `font`, if one is registered.
    pub fn face_name(&self, font: &FontStyle) -> Option<&str> {
        self.face_index(font)
            .and_then(|index| self.face(index))
            .map(|face| face.name.as_str())
    }
}

impl TextMeasurer for FontRegistry {
    fn measure(&self, text: &str, font: &FontStyle) -> Result<Length> {
        let Some(face) = self.face_index(font).and_then(|index| self.face(index)) else {
            return self.core.measure(text, font);
        };
        check_font(font, self.core.unit_scale())?;
        let milli_em = face.width_milli_em(text);
        Ok(scale_width(milli_em, font, self.core.unit_scale()))
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Every character is exactly one unit wide, whatever the font.
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct MonoMeasurer;

    impl TextMeasurer for MonoMeasurer {
        fn measure(&self, text: &str, _font: &FontStyle) -> Result<Length> {
            Ok(Length::from_i32(text.chars().count() as i32))
        }
    }

    pub(crate) const DEJAVU_SANS_MONO: &[u8] =
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/DejaVuSansMono.ttf"));

    fn body() -> FontStyle {
        FontStyle::helvetica(FontVariant::Regular, 10.0)
    }

    #[test]
    fn helvetica_width_matches_afm_advances() {
        // "Hola" = 722 + 556 + 222 + 556 = 2056 milli-em; at 10pt in points = 20.56.
        let metrics = CoreFontMetrics::new(1.0);
        let width = metrics.measure("Hola", &body()).expect("measure");
        assert_eq!(width.to_milli_i64(), 20_560);
    }

    #[test]
    fn bold_is_wider_than_regular() {
        let metrics = CoreFontMetrics::millimetres();
        let regular = metrics.measure("Horas pendientes", &body()).expect("regular");
        let bold = metrics
            .measure(
                "Horas pendientes",
                &FontStyle::helvetica(FontVariant::Bold, 10.0),
            )
            .expect("bold");
        assert!(bold > regular);
    }

    #[test]
    fn millimetre_scale_converts_from_points() {
        let metrics = CoreFontMetrics::millimetres();
        // 1000 milli-em of 'W'-free text: "mm" is 833*2 = 1666 -> 16.66pt -> 5.877mm.
        let width = metrics.measure("mm", &body()).expect("measure");
        assert_eq!(width.to_milli_i64(), 5_877);
    }

    #[test]
    fn accented_letters_use_their_base_advance() {
        let metrics = CoreFontMetrics::new(1.0);
        let plain = metrics.measure("Descripcion", &body()).expect("plain");
        let accented = metrics.measure("Descripción", &body()).expect("accented");
        assert_eq!(plain, accented);
        let i_acute = metrics.measure("í", &body()).expect("i acute");
        assert_eq!(i_acute.to_milli_i64(), 2_780);
    }

    #[test]
    fn empty_string_measures_zero() {
        let metrics = CoreFontMetrics::millimetres();
        assert_eq!(metrics.measure("", &body()).expect("measure"), Length::ZERO);
    }

    #[test]
    fn measurement_is_monotonic_over_characters() {
        let metrics = CoreFontMetrics::millimetres();
        let text = "Apoyo administrativo en farmacia";
        let whole = metrics.measure(text, &body()).expect("whole");
        for ch in text.chars() {
            let single = metrics.measure(&ch.to_string(), &body()).expect("char");
            assert!(single <= whole);
        }
    }

    #[test]
    fn non_positive_font_size_is_a_backend_error() {
        let metrics = CoreFontMetrics::millimetres();
        let err = metrics
            .measure("x", &FontStyle::helvetica(FontVariant::Regular, 0.0))
            .expect_err("zero size");
        assert!(matches!(err, ReportError::RenderBackend(_)));
    }

    #[test]
    fn registry_falls_back_to_core_metrics() {
        let registry = FontRegistry::new(POINTS_PER_MM);
        assert!(registry.is_empty());
        let core = CoreFontMetrics::millimetres();
        let font = FontStyle::new("Arial", FontVariant::Bold, 11.0);
        assert_eq!(
            registry.measure("Siglas", &font).expect("registry"),
            core.measure("Siglas", &font).expect("core")
        );
    }

    #[test]
    fn registry_rejects_garbage_font_data() {
        let mut registry = FontRegistry::new(POINTS_PER_MM);
        let err = registry
            .register_bytes("Broken", FontVariant::Regular, b"not a font")
            .expect_err("invalid font");
        assert!(matches!(err, ReportError::Font(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_rejects_unknown_extensions() {
        let mut registry = FontRegistry::new(POINTS_PER_MM);
        let err = registry
            .register_file("Broken", FontVariant::Regular, "font.woff2")
            .expect_err("unsupported");
        assert!(matches!(err, ReportError::Font(_)));
    }

    #[test]
    fn registered_face_measures_what_it_draws() {
        let mut registry = FontRegistry::new(1.0);
        let name = registry
            .register_bytes("Mono", FontVariant::Regular, DEJAVU_SANS_MONO)
            .expect("register");
        assert!(name.starts_with("DejaVuSansMono"));

        // No bold face is registered, so bold resolves to the regular one.
        let font = FontStyle::new("Mono", FontVariant::Bold, 10.0);
        assert_eq!(registry.face_name(&font), Some(name.as_str()));
        let one = registry.measure("M", &font).expect("one");
        let line = registry
            .measure("Taller de laboratorio clinico", &font)
            .expect("line");
        assert_eq!(line, one * 29);
        assert_eq!(registry.measure("Reunión", &font).expect("accented"), one * 7);

        let helvetica = CoreFontMetrics::new(1.0)
            .measure("Taller de laboratorio clinico", &font)
            .expect("core");
        assert!(line > helvetica);
    }
}
