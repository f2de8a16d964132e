use crate::canvas::{Command, Document, Page, RectStyle};
use crate::error::{ReportError, Result};
use crate::font::{FIRST_CODE, FontProgram, FontRegistry, FontStyle, LAST_CODE, RegisteredFont};
use crate::types::{Color, Length, format_milli};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream, dictionary};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub pdf_version: String,
    pub document_title: Option<String>,
    pub author: Option<String>,
    /// Flate-compress page content streams.
    pub compress: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            pdf_version: "1.7".to_string(),
            document_title: None,
            author: None,
            compress: true,
        }
    }
}

/// Serializes a finished document with the standard Type1 Helvetica faces.
/// Families without a standard face are written as Helvetica.
pub fn document_to_pdf(document: &Document, options: &PdfOptions) -> Result<Vec<u8>> {
    document_to_pdf_with_registry(document, options, None)
}

/// Serializes a finished document. Fonts that resolve to a face in
/// `registry` are embedded; every other font is written as standard
/// Helvetica. All text is WinAnsi encoded.
#[tracing::instrument(level = "debug", skip_all, fields(pages = document.pages.len()))]
pub fn document_to_pdf_with_registry(
    document: &Document,
    options: &PdfOptions,
    registry: Option<&FontRegistry>,
) -> Result<Vec<u8>> {
    if document.pages.is_empty() {
        return Err(ReportError::Pdf("document has no pages".to_string()));
    }
    if !(document.unit_scale.is_finite() && document.unit_scale > 0.0) {
        return Err(ReportError::Pdf(format!(
            "invalid unit scale {}",
            document.unit_scale
        )));
    }

    let mut pdf = LoDocument::with_version(options.pdf_version.as_str());
    let pages_id = pdf.new_object_id();

    let fonts = FontResources::collect(&document.pages, registry);
    let mut font_dict = lopdf::Dictionary::new();
    for (key, resource) in &fonts.by_key {
        let font_id = match key {
            FontKey::Core(base) => pdf.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => *base,
                "Encoding" => "WinAnsiEncoding",
            }),
            FontKey::Embedded(index) => {
                let face = fonts
                    .registry
                    .and_then(|registry| registry.face(*index))
                    .ok_or_else(|| ReportError::Pdf(format!("font face {index} is not registered")))?;
                tracing::debug!(face = %face.name, "embedding font face");
                embed_font(&mut pdf, face)
            }
        };
        font_dict.set(resource.as_bytes().to_vec(), LoObject::Reference(font_id));
    }
    let resources_id = pdf.add_object(dictionary! {
        "Font" => LoObject::Dictionary(font_dict),
    });

    let k = document.unit_scale;
    let width_pt = document.page_size.width.to_f32() * k;
    let height_pt = document.page_size.height.to_f32() * k;
    let mut kids: Vec<LoObject> = Vec::with_capacity(document.pages.len());
    let mut lossy = 0usize;
    for page in &document.pages {
        let writer = ContentWriter {
            page_height: document.page_size.height,
            unit_scale: k,
            fonts: &fonts,
        };
        let (content, replaced) = writer.write(page);
        lossy += replaced;
        let content_id = pdf.add_object(LoStream::new(dictionary! {}, content.into_bytes()));
        let media_box: Vec<LoObject> = vec![0.into(), 0.into(), width_pt.into(), height_pt.into()];
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box,
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    if lossy > 0 {
        tracing::warn!(characters = lossy, "characters outside WinAnsi written as '?'");
    }

    let page_count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);
    let info_id = info_dictionary(&mut pdf, options);
    pdf.trailer.set("Info", info_id);

    if options.compress {
        pdf.compress();
    }
    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    tracing::debug!(bytes = out.len(), "pdf written");
    Ok(out)
}

fn info_dictionary(pdf: &mut LoDocument, options: &PdfOptions) -> LoObjectId {
    let mut info = dictionary! {
        "Producer" => LoObject::string_literal(concat!("attendance-report ", env!("CARGO_PKG_VERSION"))),
    };
    if let Some(title) = &options.document_title {
        info.set("Title", LoObject::string_literal(encode_winansi_bytes(title).0));
    }
    if let Some(author) = &options.author {
        info.set("Author", LoObject::string_literal(encode_winansi_bytes(author).0));
    }
    pdf.add_object(info)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FontKey {
    Core(&'static str),
    Embedded(usize),
}

struct FontResources<'a> {
    registry: Option<&'a FontRegistry>,
    by_key: BTreeMap<FontKey, String>,
}

impl<'a> FontResources<'a> {
    fn collect(pages: &[Page], registry: Option<&'a FontRegistry>) -> Self {
        let mut fonts = Self {
            registry,
            by_key: BTreeMap::new(),
        };
        for page in pages {
            for cmd in &page.commands {
                if let Command::SetFont(font) = cmd {
                    let key = fonts.key(font);
                    let next = fonts.by_key.len() + 1;
                    fonts.by_key.entry(key).or_insert_with(|| format!("F{next}"));
                }
            }
        }
        fonts
    }

    fn key(&self, font: &FontStyle) -> FontKey {
        match self.registry.and_then(|registry| registry.face_index(font)) {
            Some(index) => FontKey::Embedded(index),
            None => FontKey::Core(base_font(font)),
        }
    }

    fn resource(&self, font: &FontStyle) -> &str {
        self.by_key
            .get(&self.key(font))
            .map(String::as_str)
            .unwrap_or("F1")
    }
}

/// Writes the face program, its descriptor and a simple WinAnsi font whose
/// widths are the ones the layout measured with.
fn embed_font(pdf: &mut LoDocument, face: &RegisteredFont) -> LoObjectId {
    let base = sanitize_font_name(&face.name);
    let (file_key, file_dict, subtype) = match face.program {
        FontProgram::TrueType => (
            "FontFile2",
            dictionary! { "Length1" => face.data.len() as i64 },
            "TrueType",
        ),
        FontProgram::OpenTypeCff => ("FontFile3", dictionary! { "Subtype" => "OpenType" }, "Type1"),
    };
    let file_id = pdf.add_object(LoStream::new(file_dict, face.data.to_vec()));

    let mut flags: i64 = 32;
    if face.fixed_pitch {
        flags |= 1;
    }
    let bbox: Vec<LoObject> = face.bbox.iter().map(|v| LoObject::Integer(*v as i64)).collect();
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => LoObject::Name(base.clone().into_bytes()),
        "Flags" => flags,
        "FontBBox" => bbox,
        "ItalicAngle" => face.italic_angle as i64,
        "Ascent" => face.ascent as i64,
        "Descent" => face.descent as i64,
        "CapHeight" => face.cap_height as i64,
        "StemV" => 80_i64,
        "MissingWidth" => face.missing_width as i64,
    };
    descriptor.set(file_key, LoObject::Reference(file_id));
    let descriptor_id = pdf.add_object(descriptor);

    let widths: Vec<LoObject> = face.widths.iter().map(|w| LoObject::Integer(*w as i64)).collect();
    pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => subtype,
        "BaseFont" => LoObject::Name(base.into_bytes()),
        "FirstChar" => FIRST_CODE as i64,
        "LastChar" => LAST_CODE as i64,
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
        "Encoding" => "WinAnsiEncoding",
    })
}

fn sanitize_font_name(name: &str) -> String {
    let out: String = name
        .chars()
        .filter_map(|ch| match ch {
            ch if ch.is_ascii_alphanumeric() || ch == '-' => Some(ch),
            ' ' => Some('-'),
            _ => None,
        })
        .collect();
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

fn base_font(font: &FontStyle) -> &'static str {
    match (font.variant.is_bold(), font.variant.is_italic()) {
        (false, false) => "Helvetica",
        (true, false) => "Helvetica-Bold",
        (false, true) => "Helvetica-Oblique",
        (true, true) => "Helvetica-BoldOblique",
    }
}

struct ContentWriter<'a> {
    page_height: Length,
    unit_scale: f32,
    fonts: &'a FontResources<'a>,
}

impl ContentWriter<'_> {
    fn pt(&self, value: Length) -> String {
        format_milli((value * self.unit_scale).to_milli_i64())
    }

    /// Flips a top-down y into PDF's bottom-up space.
    fn flip(&self, y: Length) -> String {
        self.pt(self.page_height - y)
    }

    fn write(&self, page: &Page) -> (String, usize) {
        let mut out = String::new();
        let mut font: Option<&FontStyle> = None;
        let mut replaced = 0usize;
        for cmd in &page.commands {
            match cmd {
                Command::Meta { .. } => {}
                Command::SetFillColor(color) => {
                    out.push_str(&format!("{} rg\n", color_operands(*color)));
                }
                Command::SetStrokeColor(color) => {
                    out.push_str(&format!("{} RG\n", color_operands(*color)));
                }
                Command::SetLineWidth(width) => {
                    out.push_str(&format!("{} w\n", self.pt(*width)));
                }
                Command::SetFont(style) => font = Some(style),
                Command::DrawRect {
                    x,
                    y,
                    width,
                    height,
                    style,
                } => {
                    let op = match style {
                        RectStyle::Stroke => "S",
                        RectStyle::Fill => "f",
                    };
                    out.push_str(&format!(
                        "{} {} {} {} re {}\n",
                        self.pt(*x),
                        self.flip(*y + *height),
                        self.pt(*width),
                        self.pt(*height),
                        op
                    ));
                }
                Command::DrawString { x, y, text } => {
                    let Some(style) = font else {
                        tracing::debug!(text = %text, "text drawn before any font was set; skipped");
                        continue;
                    };
                    let encoded = encode_winansi_pdf_string(text);
                    replaced += encoded.replaced;
                    out.push_str("BT\n");
                    out.push_str(&format!(
                        "/{} {} Tf\n",
                        self.fonts.resource(style),
                        format_milli(Length::from_f32(style.size_pt).to_milli_i64())
                    ));
                    out.push_str(&format!("{} {} Td\n", self.pt(*x), self.flip(*y)));
                    out.push_str(&format!("({}) Tj\nET\n", encoded.text));
                }
            }
        }
        (out, replaced)
    }
}

fn color_operands(color: Color) -> String {
    let channel = |v: f32| format_milli(Length::from_f32(v.clamp(0.0, 1.0)).to_milli_i64());
    format!("{} {} {}", channel(color.r), channel(color.g), channel(color.b))
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

/// WinAnsi codes 0x80..=0x9F that differ from Latin-1.
const WINANSI_HIGH: [(char, u8); 27] = [
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

/// WinAnsi code for `ch`, if it has one.
fn winansi_byte(ch: char) -> Option<u8> {
    match ch {
        '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => Some(ch as u8),
        _ => WINANSI_HIGH
            .iter()
            .find(|(high, _)| *high == ch)
            .map(|(_, byte)| *byte),
    }
}

/// Character drawn for a WinAnsi code; unassigned codes have none.
pub(crate) fn winansi_char(byte: u8) -> Option<char> {
    match byte {
        0x00..=0x7F | 0xA0..=0xFF => Some(byte as char),
        _ => WINANSI_HIGH
            .iter()
            .find(|(_, code)| *code == byte)
            .map(|(ch, _)| *ch),
    }
}

/// Raw WinAnsi bytes. Characters without a code are folded to ASCII first,
/// then replaced by `?`.
pub(crate) fn encode_winansi_bytes(input: &str) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(input.len());
    let mut replaced = 0usize;
    for ch in input.chars() {
        if let Some(byte) = winansi_byte(ch) {
            out.push(byte);
            continue;
        }
        match deunicode::deunicode_char(ch) {
            Some(folded) if !folded.is_empty() && folded.is_ascii() => {
                out.extend_from_slice(folded.as_bytes())
            }
            _ => {
                replaced += 1;
                out.push(b'?');
            }
        }
    }
    (out, replaced)
}

/// WinAnsi bytes escaped for a literal string in a content stream.
fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let (bytes, replaced) = encode_winansi_bytes(input);
    let mut text = String::with_capacity(bytes.len());
    for byte in bytes {
        match byte {
            b'\\' => text.push_str("\\\\"),
            b'(' => text.push_str("\\("),
            b')' => text.push_str("\\)"),
            b'\n' => text.push_str("\\n"),
            b'\r' => text.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => text.push_str(&format!("\\{:03o}", b)),
            b => text.push(b as char),
        }
    }
    WinAnsiEncoded { text, replaced }
}
