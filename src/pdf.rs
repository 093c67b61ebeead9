//! Serializes a laid-out [`Document`] into PDF bytes.
//!
//! Objects are written as text with stream data ASCIIHex-encoded, so the
//! output stays 7-bit clean apart from the binary marker comment. Base-14
//! fonts take WinAnsi literal strings; loaded fonts are Type0 fonts whose
//! strings are two-byte glyph ids.

use crate::canvas::{Command, Document, Page};
use crate::font::{normalize_name, winansi_byte, FontSet, Glyph, LoadedFont};
use crate::resource::ImageData;
use crate::types::{Color, Pt, Size};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

const STANDARD_FONTS: [&str; 14] = [
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Symbol",
    "ZapfDingbats",
];

const DEFAULT_FONT: &str = "Helvetica";

/// How a font name used on the canvas is written to the file.
enum FontSource {
    Standard(&'static str),
    Embedded(Arc<LoadedFont>),
}

struct FontResource {
    resource: String,
    source: FontSource,
    /// Glyphs drawn with an embedded font, keyed by glyph id.
    used: BTreeMap<u16, Glyph>,
}

/// Objects in file order; object ids are 1-based indices.
#[derive(Default)]
struct ObjectTable {
    bodies: Vec<String>,
}

impl ObjectTable {
    fn reserve(&mut self) -> usize {
        self.bodies.push(String::new());
        self.bodies.len()
    }

    fn set(&mut self, id: usize, body: String) {
        if let Some(slot) = self.bodies.get_mut(id - 1) {
            *slot = body;
        }
    }

    fn push(&mut self, body: String) -> usize {
        self.bodies.push(body);
        self.bodies.len()
    }
}

pub fn document_to_pdf(document: &Document, fonts: &FontSet) -> io::Result<Vec<u8>> {
    let font_map = collect_fonts(document, fonts);
    let mut objects = ObjectTable::default();
    let catalog_id = objects.reserve();
    let pages_id = objects.reserve();
    let resources_id = objects.reserve();

    let mut font_entries = Vec::new();
    for font in font_map.values() {
        let font_id = match &font.source {
            FontSource::Standard(base) => objects.push(standard_font_object(base)),
            FontSource::Embedded(loaded) => {
                let file_id = objects.push(font_file_object(&loaded.data));
                let descriptor_id = objects.push(font_descriptor_object(loaded, file_id));
                let cid_font_id = objects.push(cid_font_object(loaded, descriptor_id, &font.used));
                let to_unicode_id = objects.push(stream_object(&to_unicode_cmap(&font.used)));
                objects.push(type0_font_object(loaded, cid_font_id, to_unicode_id))
            }
        };
        font_entries.push((font.resource.clone(), font_id));
    }

    let mut image_names = BTreeMap::new();
    let mut image_entries = Vec::new();
    for (index, (key, image)) in document.images.iter().enumerate() {
        let smask_id = image
            .alpha
            .as_deref()
            .map(|alpha| objects.push(smask_object(image, alpha)));
        let image_id = objects.push(image_object(image, smask_id));
        let resource = format!("Im{}", index + 1);
        image_entries.push((resource.clone(), image_id));
        image_names.insert(key.clone(), resource);
    }

    objects.set(
        resources_id,
        format!(
            "<< /ProcSet [/PDF /Text /ImageB /ImageC] /Font {} /XObject {} >>",
            resource_dict(&font_entries),
            resource_dict(&image_entries)
        ),
    );

    let mut kids = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page, document.page_size, &font_map, &image_names);
        let content_id = objects.push(stream_object(&content));
        let page_id = objects.push(format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
            pages_id,
            fmt_pt(document.page_size.width),
            fmt_pt(document.page_size.height),
            resources_id,
            content_id
        ));
        kids.push(format!("{} 0 R", page_id));
    }
    objects.set(
        pages_id,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            kids.len()
        ),
    );
    objects.set(
        catalog_id,
        format!("<< /Type /Catalog /Pages {} 0 R >>", pages_id),
    );
    let info_id = objects.push(format!(
        "<< /Producer (folio {}) >>",
        env!("CARGO_PKG_VERSION")
    ));

    let mut out = Vec::new();
    write_pdf(&mut out, &objects, catalog_id, info_id)?;
    Ok(out)
}

/// Assigns a resource name to every font a page draws text with and records
/// which glyphs each embedded font needs.
fn collect_fonts(document: &Document, fonts: &FontSet) -> BTreeMap<String, FontResource> {
    let mut map: BTreeMap<String, FontResource> = BTreeMap::new();
    for page in &document.pages {
        let mut current = DEFAULT_FONT.to_string();
        let mut saved = Vec::new();
        for cmd in &page.commands {
            match cmd {
                Command::SaveState => saved.push(current.clone()),
                Command::RestoreState => {
                    if let Some(name) = saved.pop() {
                        current = name;
                    }
                }
                Command::SetFontName(name) => current = name.clone(),
                Command::DrawString { text, .. } => {
                    let next = map.len() + 1;
                    let font = map.entry(current.clone()).or_insert_with(|| {
                        let source = match fonts.resolve(&current) {
                            Some(loaded) => FontSource::Embedded(loaded.clone()),
                            None => FontSource::Standard(standard_font(&current)),
                        };
                        FontResource {
                            resource: format!("F{next}"),
                            source,
                            used: BTreeMap::new(),
                        }
                    });
                    if let FontSource::Embedded(loaded) = &font.source {
                        for glyph in loaded.glyphs(text) {
                            font.used.entry(glyph.id).or_insert(glyph);
                        }
                    }
                }
                _ => {}
            }
        }
    }
    map
}

fn standard_font(name: &str) -> &'static str {
    let wanted = normalize_name(name);
    match STANDARD_FONTS
        .iter()
        .find(|candidate| candidate.to_ascii_lowercase() == wanted)
    {
        Some(found) => *found,
        None => {
            log::debug!("font {name:?} is not loaded; writing it as {DEFAULT_FONT}");
            DEFAULT_FONT
        }
    }
}

fn render_page(
    page: &Page,
    page_size: Size,
    font_map: &BTreeMap<String, FontResource>,
    image_names: &BTreeMap<String, String>,
) -> String {
    let page_height = page_size.height;
    let mut out = String::new();
    let mut font_name = DEFAULT_FONT.to_string();
    let mut font_size = Pt::from_f32(12.0);
    let mut font_stack: Vec<(String, Pt)> = Vec::new();

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                font_stack.push((font_name.clone(), font_size));
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some((name, size)) = font_stack.pop() {
                    font_name = name;
                    font_size = size;
                }
                out.push_str("Q\n");
            }
            Command::SetFillColor(color) => {
                out.push_str(&format!("{} rg\n", fmt_color(*color)));
            }
            Command::SetStrokeColor(color) => {
                out.push_str(&format!("{} RG\n", fmt_color(*color)));
            }
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => font_name = name.clone(),
            Command::SetFontSize(size) => font_size = *size,
            Command::ClipRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re W n\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::Stroke => out.push_str("S\n"),
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re f\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawString { x, y, text } => {
                let Some(font) = font_map.get(&font_name) else {
                    continue;
                };
                let string = match &font.source {
                    FontSource::Standard(_) => format!("({})", encode_winansi(text)),
                    FontSource::Embedded(loaded) => format!("<{}>", encode_glyph_ids(loaded, text)),
                };
                out.push_str(&format!(
                    "BT /{} {} Tf {} {} Td {} Tj ET\n",
                    font.resource,
                    fmt_pt(font_size),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - font_size),
                    string
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let Some(resource) = image_names.get(resource_id) else {
                    log::warn!("image {resource_id} has no resource; skipped");
                    continue;
                };
                out.push_str(&format!(
                    "q {} 0 0 {} {} {} cm /{} Do Q\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    resource
                ));
            }
        }
    }
    out
}

fn standard_font_object(base: &str) -> String {
    if base == "Symbol" || base == "ZapfDingbats" {
        return format!("<< /Type /Font /Subtype /Type1 /BaseFont /{} >>", base);
    }
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        base
    )
}

fn type0_font_object(font: &LoadedFont, cid_font_id: usize, to_unicode_id: usize) -> String {
    format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
        sanitize_font_name(font.name()),
        cid_font_id,
        to_unicode_id
    )
}

fn cid_font_object(font: &LoadedFont, descriptor_id: usize, used: &BTreeMap<u16, Glyph>) -> String {
    let widths = used
        .values()
        .map(|glyph| format!("{} [{}]", glyph.id, glyph.advance))
        .collect::<Vec<_>>();
    let w_array = if widths.is_empty() {
        String::new()
    } else {
        format!(" /W [{}]", widths.join(" "))
    };
    format!(
        "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> /FontDescriptor {} 0 R /DW {}{} /CIDToGIDMap /Identity >>",
        sanitize_font_name(font.name()),
        descriptor_id,
        font.metrics.missing_width,
        w_array
    )
}

/// Maps glyph ids back to text so drawn strings stay searchable and
/// copyable. Glyph 0 has no meaningful text and is left out.
fn to_unicode_cmap(used: &BTreeMap<u16, Glyph>) -> String {
    let entries: Vec<&Glyph> = used.values().filter(|glyph| glyph.id != 0).collect();
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for glyph in chunk {
            let mut units = [0u16; 2];
            let utf16 = glyph
                .ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{unit:04X}"))
                .collect::<String>();
            out.push_str(&format!("<{:04X}> <{}>\n", glyph.id, utf16));
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}

fn font_descriptor_object(font: &LoadedFont, font_file_id: usize) -> String {
    let metrics = &font.metrics;
    // Nonsymbolic, plus FixedPitch and Italic where they apply.
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    if metrics.is_italic {
        flags |= 64;
    }
    let stem_v = if metrics.is_bold { 120 } else { 80 };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV {} /MissingWidth {} /FontFile2 {} 0 R >>",
        sanitize_font_name(font.name()),
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        stem_v,
        metrics.missing_width,
        font_file_id
    )
}

fn font_file_object(data: &[u8]) -> String {
    let stream_data = encode_stream_data(data);
    format!(
        "<< /Length {} /Length1 {} /Filter /ASCIIHexDecode >>\nstream\n{}\nendstream",
        stream_data.len(),
        data.len(),
        stream_data
    )
}

fn image_object(image: &ImageData, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        Some(filter) => format!("[/ASCIIHexDecode {}]", filter),
        None => "/ASCIIHexDecode".to_string(),
    };
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent {} /Length {} /Filter {}{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        image.bits_per_component,
        stream_data.len(),
        filters,
        smask,
        stream_data
    )
}

fn smask_object(image: &ImageData, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter /ASCIIHexDecode >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        stream_data.len(),
        stream_data
    )
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn resource_dict(entries: &[(String, usize)]) -> String {
    let entries = entries
        .iter()
        .map(|(resource, id)| format!("/{} {} 0 R", resource, id))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn write_pdf<W: Write>(
    writer: &mut W,
    objects: &ObjectTable,
    catalog_id: usize,
    info_id: usize,
) -> io::Result<()> {
    let mut offset = 0usize;
    write_bytes(writer, b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n", &mut offset)?;

    let mut offsets = Vec::with_capacity(objects.bodies.len());
    for (index, body) in objects.bodies.iter().enumerate() {
        offsets.push(offset);
        write_str(writer, &format!("{} 0 obj\n", index + 1), &mut offset)?;
        write_str(writer, body, &mut offset)?;
        write_bytes(writer, b"\nendobj\n", &mut offset)?;
    }

    let xref_start = offset;
    let size = objects.bodies.len() + 1;
    write_str(writer, &format!("xref\n0 {}\n", size), &mut offset)?;
    write_bytes(writer, b"0000000000 65535 f \n", &mut offset)?;
    for entry in offsets {
        write_str(writer, &format!("{:010} 00000 n \n", entry), &mut offset)?;
    }
    write_str(
        writer,
        &format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, catalog_id, info_id, xref_start
        ),
        &mut offset,
    )
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32 + 1);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out.push('>');
    out
}

/// Encodes text as the body of a hex string of big-endian glyph ids.
fn encode_glyph_ids(font: &LoadedFont, text: &str) -> String {
    font.glyphs(text)
        .iter()
        .map(|glyph| format!("{:04X}", glyph.id))
        .collect()
}

/// Encodes text as the body of a literal string under WinAnsiEncoding.
/// Characters outside cp1252 become `?`.
pub(crate) fn encode_winansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let byte = winansi_byte(ch).unwrap_or(b'?');
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        DEFAULT_FONT.to_string()
    } else {
        out
    }
}

fn fmt_color(color: Color) -> String {
    format!(
        "{} {} {}",
        fmt(color.r.clamp(0.0, 1.0)),
        fmt(color.g.clamp(0.0, 1.0)),
        fmt(color.b.clamp(0.0, 1.0))
    )
}

fn fmt(value: f32) -> String {
    fmt_pt(Pt::from_f32(value))
}

pub(crate) fn fmt_pt(value: Pt) -> String {
    let milli = value.to_milli();
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
    while s.ends_with('0') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::font::FontCatalog;
    use crate::resource::tests::tiny_png;
    use std::path::PathBuf;

    fn page_content(doc: &lopdf::Document, page_number: u32) -> String {
        let pages = doc.get_pages();
        let id = pages[&page_number];
        String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned()
    }

    #[test]
    fn formats_numbers_without_trailing_zeros() {
        assert_eq!(fmt_pt(Pt::from_f32(12.0)), "12");
        assert_eq!(fmt_pt(Pt::from_f32(0.5)), "0.5");
        assert_eq!(fmt_pt(Pt::from_f32(-3.125)), "-3.125");
        assert_eq!(fmt_pt(Pt::ZERO), "0");
    }

    #[test]
    fn escapes_literal_strings() {
        assert_eq!(encode_winansi("a(b)\\c"), "a\\(b\\)\\\\c");
        assert_eq!(encode_winansi("caf\u{e9}"), "caf\\351");
        assert_eq!(encode_winansi("\u{20ac}"), "\\200");
        assert_eq!(encode_winansi("\u{4e2d}"), "?");
    }

    #[test]
    fn writes_pages_with_flipped_text_positions() {
        let mut canvas = Canvas::new(Size::new(200.0, 300.0));
        canvas.draw_string(Pt::from_f32(10.0), Pt::from_f32(20.0), "Hello");
        canvas.show_page();
        canvas.set_font_name("Courier-Bold");
        canvas.set_font_size(Pt::from_f32(8.0));
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "Second");
        let document = canvas.finish();

        let bytes = document_to_pdf(&document, &FontSet::new()).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        let first = page_content(&doc, 1);
        assert!(first.contains("/F1 12 Tf 10 268 Td (Hello) Tj"), "{first}");
        let second = page_content(&doc, 2);
        assert!(second.contains("/F2 8 Tf 0 292 Td (Second) Tj"), "{second}");

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/BaseFont /Helvetica /Encoding /WinAnsiEncoding"));
        assert!(text.contains("/BaseFont /Courier-Bold /Encoding /WinAnsiEncoding"));
    }

    #[test]
    fn unknown_unloaded_fonts_fall_back_to_helvetica() {
        assert_eq!(standard_font("Comic Sans"), "Helvetica");
        assert_eq!(standard_font("times-roman"), "Times-Roman");
    }

    #[test]
    fn images_get_an_soft_mask_for_alpha() {
        let image = Arc::new(ImageData::decode(&tiny_png(), None).unwrap());
        let mut canvas = Canvas::new(Size::new(100.0, 100.0));
        canvas.draw_image(
            Pt::from_f32(5.0),
            Pt::from_f32(10.0),
            Pt::from_f32(20.0),
            Pt::from_f32(10.0),
            &image,
        );
        let document = canvas.finish();
        let bytes = document_to_pdf(&document, &FontSet::new()).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();

        let content = page_content(&doc, 1);
        assert!(content.contains("20 0 0 10 5 80 cm /Im1 Do"), "{content}");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/SMask"));
        assert!(text.contains("/ColorSpace /DeviceGray"));
    }

    fn dejavu() -> FontSet {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("DejaVuSans.ttf");
        FontCatalog::build([path]).into_fonts()
    }

    #[test]
    fn loaded_fonts_are_embedded_as_identity_h_type0() {
        let fonts = dejavu();
        let font = fonts.iter().next().unwrap().clone();

        let mut canvas = Canvas::new(Size::new(100.0, 100.0));
        canvas.set_font_name(font.name());
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "Embedded");
        let bytes = document_to_pdf(&canvas.finish(), &fonts).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Subtype /Type0"));
        assert!(text.contains("/Encoding /Identity-H"));
        assert!(text.contains("/Subtype /CIDFontType2"));
        assert!(text.contains("/CIDToGIDMap /Identity"));
        assert!(text.contains("/FontFile2"));
        assert!(!text.contains("/Subtype /TrueType"));

        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let content = page_content(&doc, 1);
        let expected = format!("<{}> Tj", encode_glyph_ids(&font, "Embedded"));
        assert!(content.contains(&expected), "{content}");
    }

    #[test]
    fn non_latin_text_keeps_its_glyphs_and_unicode_mapping() {
        let fonts = dejavu();
        let font = fonts.iter().next().unwrap().clone();
        let sample = "Привет ΑΒΓ";

        let mut canvas = Canvas::new(Size::new(200.0, 100.0));
        canvas.set_font_name(font.name());
        canvas.draw_string(Pt::ZERO, Pt::ZERO, sample);
        let bytes = document_to_pdf(&canvas.finish(), &fonts).unwrap();

        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let content = page_content(&doc, 1);
        assert!(!content.contains('?'), "{content}");
        let glyphs = font.glyphs(sample);
        assert!(glyphs.iter().all(|glyph| glyph.id != 0));

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/ToUnicode"));
        let used: BTreeMap<u16, Glyph> = glyphs.iter().map(|glyph| (glyph.id, *glyph)).collect();
        let cmap = to_unicode_cmap(&used);
        let pe = glyphs[0];
        assert!(cmap.contains(&format!("<{:04X}> <041F>", pe.id)), "{cmap}");
        let gamma = glyphs[9];
        assert!(cmap.contains(&format!("<{:04X}> <0393>", gamma.id)), "{cmap}");
    }

    #[test]
    fn unicode_cmap_writes_surrogate_pairs_and_skips_notdef() {
        let used: BTreeMap<u16, Glyph> = [
            Glyph { ch: '\u{1F600}', id: 7, advance: 1000 },
            Glyph { ch: '?', id: 0, advance: 500 },
        ]
        .into_iter()
        .map(|glyph| (glyph.id, glyph))
        .collect();
        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("1 beginbfchar\n<0007> <D83DDE00>\n"), "{cmap}");
        assert!(!cmap.contains("<0000> <"));
    }
}
