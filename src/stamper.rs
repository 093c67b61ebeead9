//! Second pass: page-number labels stamped into a finished PDF.

use crate::error::{FolioError, Result};
use crate::font::BuiltinFont;
use crate::geometry::number_rect;
use crate::pdf::{encode_winansi, fmt_pt};
use crate::properties::DocumentProperties;
use crate::types::Pt;
use lopdf::{dictionary, Dictionary, Document as LoDocument, Object as LoObject, ObjectId, Stream};

/// Parent links followed when looking up inherited page attributes.
const MAX_INHERIT_DEPTH: usize = 32;

/// Label for page `page` of `total`: the number alone when `separator` is
/// empty, otherwise `"<page> <separator> <total>"`.
pub fn label_for(page: usize, total: usize, separator: &str) -> String {
    if separator.is_empty() {
        page.to_string()
    } else {
        format!("{page} {separator} {total}")
    }
}

/// Reopens `bytes` and adds one centred page-number overlay to every page.
/// Existing content streams are kept untouched and wrapped in `q`/`Q`.
pub fn stamp_page_numbers(bytes: &[u8], props: &DocumentProperties) -> Result<Vec<u8>> {
    let mut doc = LoDocument::load_mem(bytes)?;
    if doc.is_encrypted() {
        return Err(FolioError::InvalidDocument(
            "encrypted documents cannot be stamped".to_string(),
        ));
    }
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    if page_ids.is_empty() {
        return Err(FolioError::InvalidDocument("document has no pages".to_string()));
    }
    let total = page_ids.len();
    let font_size = Pt::from_i32(props.number_page_size as i32);
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    for (index, page_id) in page_ids.iter().copied().enumerate() {
        let page = doc
            .get_object(page_id)
            .and_then(LoObject::as_dict)?
            .clone();
        let (width, height) = media_box_size(&doc, &page)
            .ok_or_else(|| FolioError::InvalidDocument(format!("page {} has no MediaBox", index + 1)))?;

        let mut resources = inherited(&doc, &page, b"Resources")
            .and_then(|obj| resolve(&doc, obj).as_dict().ok().cloned())
            .unwrap_or_default();
        let mut fonts = resources
            .get(b"Font")
            .ok()
            .and_then(|obj| resolve(&doc, obj).as_dict().ok().cloned())
            .unwrap_or_default();
        let font_name = fresh_name(&fonts, "FolioNum");
        fonts.set(font_name.as_bytes().to_vec(), LoObject::Reference(font_id));
        resources.set("Font", LoObject::Dictionary(fonts));

        let label = label_for(index + 1, total, &props.number_page_of);
        let overlay = overlay_content(&label, &font_name, font_size, props, width, height);
        let contents = existing_contents(&doc, &page);

        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec()));
        let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay.into_bytes()));
        let mut wrapped = Vec::with_capacity(contents.len() + 3);
        wrapped.push(LoObject::Reference(save_id));
        wrapped.extend(contents);
        wrapped.push(LoObject::Reference(restore_id));
        wrapped.push(LoObject::Reference(overlay_id));

        let page_mut = doc
            .get_object_mut(page_id)
            .and_then(LoObject::as_dict_mut)?;
        page_mut.set("Resources", LoObject::Dictionary(resources));
        page_mut.set("Contents", LoObject::Array(wrapped));
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    log::debug!("stamped page numbers on {total} page(s)");
    Ok(out)
}

fn overlay_content(
    label: &str,
    font_name: &str,
    font_size: Pt,
    props: &DocumentProperties,
    page_width: Pt,
    page_height: Pt,
) -> String {
    let rect = number_rect(props, page_width, page_height);
    let font = BuiltinFont::Helvetica;
    let text_width = font.measure_text_width(font_size, label);
    let x = rect.x + (rect.width - text_width).mul_ratio(1, 2);
    // Top of the glyphs sits on the rectangle's top edge.
    let baseline = rect.y + rect.height - font_size.mul_ratio(font.ascent(), 1000);
    format!(
        "q 0 g BT /{} {} Tf {} {} Td ({}) Tj ET Q\n",
        font_name,
        fmt_pt(font_size),
        fmt_pt(x),
        fmt_pt(baseline),
        encode_winansi(label)
    )
}

fn resolve<'a>(doc: &'a LoDocument, obj: &'a LoObject) -> &'a LoObject {
    match obj {
        LoObject::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Looks `key` up on the page, then on its ancestors in the page tree.
fn inherited<'a>(doc: &'a LoDocument, page: &'a Dictionary, key: &[u8]) -> Option<&'a LoObject> {
    let mut node = page;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).and_then(LoObject::as_dict).ok()?;
    }
    None
}

fn media_box_size(doc: &LoDocument, page: &Dictionary) -> Option<(Pt, Pt)> {
    let media_box = resolve(doc, inherited(doc, page, b"MediaBox")?)
        .as_array()
        .ok()?;
    let values = media_box
        .iter()
        .map(|value| resolve(doc, value).as_float().ok())
        .collect::<Option<Vec<f32>>>()?;
    match values.as_slice() {
        [llx, lly, urx, ury] => Some((
            Pt::from_f32((urx - llx).abs()),
            Pt::from_f32((ury - lly).abs()),
        )),
        _ => None,
    }
}

fn existing_contents(doc: &LoDocument, page: &Dictionary) -> Vec<LoObject> {
    match page.get(b"Contents") {
        Ok(LoObject::Array(items)) => items.clone(),
        Ok(LoObject::Reference(id)) => match doc.get_object(*id) {
            Ok(LoObject::Array(items)) => items.clone(),
            _ => vec![LoObject::Reference(*id)],
        },
        _ => Vec::new(),
    }
}

fn fresh_name(existing: &Dictionary, base: &str) -> String {
    let mut name = base.to_string();
    let mut counter = 1;
    while existing.has(name.as_bytes()) {
        name = format!("{base}{counter}");
        counter += 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::font::FontSet;
    use crate::pdf::document_to_pdf;
    use crate::types::Size;

    fn three_page_pdf() -> Vec<u8> {
        let mut canvas = Canvas::new(Size::new(612.0, 792.0));
        for n in 0..3 {
            canvas.draw_string(Pt::from_f32(72.0), Pt::from_f32(72.0), format!("Body {n}"));
            canvas.show_page();
        }
        document_to_pdf(&canvas.finish(), &FontSet::new()).unwrap()
    }

    fn content_of(doc: &LoDocument, page: u32) -> String {
        let id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned()
    }

    #[test]
    fn labels_number_alone_or_with_total() {
        assert_eq!(label_for(2, 5, ""), "2");
        assert_eq!(label_for(2, 5, "of"), "2 of 5");
        assert_eq!(label_for(1, 1, "/"), "1 / 1");
    }

    #[test]
    fn stamps_every_page_once_and_keeps_original_content() {
        let props = DocumentProperties {
            number_page: true,
            number_page_of: "of".to_string(),
            ..DocumentProperties::default()
        };
        let original = three_page_pdf();
        let stamped = stamp_page_numbers(&original, &props).unwrap();
        let doc = LoDocument::load_mem(&stamped).unwrap();
        assert_eq!(doc.get_pages().len(), 3);

        for page in 1..=3u32 {
            let content = content_of(&doc, page);
            assert!(content.starts_with("q\n"), "{content}");
            assert!(content.contains(&format!("(Body {}) Tj", page - 1)));
            let label = format!("({page} of 3) Tj");
            assert_eq!(content.matches(&label).count(), 1, "{content}");
            assert_eq!(content.matches("/FolioNum ").count(), 1);
            let body = content.find("(Body").unwrap();
            let restore = content.rfind("Q\nq 0 g BT").unwrap();
            assert!(body < restore);
        }
    }

    #[test]
    fn overlay_is_centred_under_the_rect_top() {
        let props = DocumentProperties {
            number_page_size: 10,
            number_page_v_pos: 20,
            ..DocumentProperties::default()
        };
        let content = overlay_content(
            "1",
            "FolioNum",
            Pt::from_i32(10),
            &props,
            Pt::from_i32(612),
            Pt::from_i32(792),
        );
        // Rect is (37, 30, 538, 10); "1" is 5.56pt wide at 10pt.
        assert!(content.contains("/FolioNum 10 Tf 303.22 32.82 Td (1) Tj"), "{content}");
    }

    #[test]
    fn existing_font_names_are_not_reused() {
        let mut fonts = Dictionary::new();
        fonts.set("FolioNum", LoObject::Null);
        assert_eq!(fresh_name(&fonts, "FolioNum"), "FolioNum1");
    }

    #[test]
    fn garbage_input_is_an_error() {
        let err = stamp_page_numbers(b"not a pdf", &DocumentProperties::default()).unwrap_err();
        assert!(matches!(err, FolioError::Stamp(_)));
    }
}
