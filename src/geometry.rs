//! Header, footer and page-number bands of a page.
//!
//! Rectangles returned here are in PDF user space: origin at the bottom-left
//! corner, `y` growing upwards. The layout engine works top-down, so callers
//! placing flowables convert with [`to_top_down`].

use crate::properties::{DocumentProperties, PageType};
use crate::types::{Pt, Rect, Size};

/// Resolves a page-type tag to its size. Unknown tags give A4.
pub fn page_size(tag: &str) -> Size {
    PageType::from_tag(tag).size()
}

fn content_width(props: &DocumentProperties, page_width: Pt) -> Pt {
    page_width - Pt::from_f32(props.left_margin) - Pt::from_f32(props.right_margin)
}

/// Band at the top of the page, directly above the main content.
pub fn header_rect(props: &DocumentProperties, page_width: Pt, page_height: Pt) -> Rect {
    Rect {
        x: Pt::from_f32(props.left_margin),
        y: page_height - Pt::from_f32(props.effective_top_margin(true)),
        width: content_width(props, page_width),
        height: Pt::from_f32(props.header_height),
    }
}

/// Band resting on the bottom edge of the page.
pub fn footer_rect(props: &DocumentProperties, page_width: Pt, _page_height: Pt) -> Rect {
    Rect {
        x: Pt::from_f32(props.left_margin),
        y: Pt::ZERO,
        width: content_width(props, page_width),
        height: Pt::from_f32(props.footer_height),
    }
}

/// Band that receives the page-number label.
pub fn number_rect(props: &DocumentProperties, page_width: Pt, _page_height: Pt) -> Rect {
    let size = i32::try_from(props.number_page_size).unwrap_or(i32::MAX);
    Rect {
        x: Pt::from_f32(props.left_margin),
        y: Pt::from_i32(props.number_page_v_pos.saturating_add(size)),
        width: content_width(props, page_width),
        height: Pt::from_i32(size),
    }
}

/// Converts a PDF-space rectangle into the top-left-origin space used by the
/// canvas and frames.
pub fn to_top_down(rect: Rect, page_height: Pt) -> Rect {
    Rect {
        x: rect.x,
        y: page_height - rect.y - rect.height,
        width: rect.width,
        height: rect.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> (Pt, Pt) {
        let size = page_size("LETTER");
        (size.width, size.height)
    }

    #[test]
    fn header_band_sits_under_the_top_edge() {
        let props = DocumentProperties {
            header_height: 50.0,
            ..DocumentProperties::default()
        };
        let (w, h) = letter();
        assert_eq!(header_rect(&props, w, h), Rect::new(37.0, 742.0, 538.0, 50.0));
    }

    #[test]
    fn footer_band_rests_on_the_bottom_edge() {
        let props = DocumentProperties {
            footer_height: 40.0,
            left_margin: 20.0,
            right_margin: 10.0,
            ..DocumentProperties::default()
        };
        let (w, h) = letter();
        assert_eq!(footer_rect(&props, w, h), Rect::new(20.0, 0.0, 582.0, 40.0));
    }

    #[test]
    fn number_rect_is_pure() {
        let props = DocumentProperties {
            number_page_size: 10,
            number_page_v_pos: 20,
            ..DocumentProperties::default()
        };
        let (w, h) = letter();
        let first = number_rect(&props, w, h);
        let second = number_rect(&props, w, h);
        assert_eq!(first, second);
        assert_eq!(first, Rect::new(37.0, 30.0, 538.0, 10.0));
    }

    #[test]
    fn number_rect_saturates_on_extreme_offsets() {
        let props = DocumentProperties {
            number_page_size: u32::MAX,
            number_page_v_pos: i32::MAX - 3,
            ..DocumentProperties::default()
        };
        let (w, h) = letter();
        let rect = number_rect(&props, w, h);
        assert_eq!(rect.y, Pt::from_i32(i32::MAX));
        assert_eq!(rect.height, Pt::from_i32(i32::MAX));

        let props = DocumentProperties {
            number_page_v_pos: i32::MIN,
            ..props
        };
        assert_eq!(number_rect(&props, w, h).y, Pt::from_i32(-1));
    }

    #[test]
    fn top_down_conversion_flips_the_y_axis() {
        let rect = Rect::new(37.0, 742.0, 538.0, 50.0);
        let flipped = to_top_down(rect, Pt::from_f32(792.0));
        assert_eq!(flipped, Rect::new(37.0, 0.0, 538.0, 50.0));
        assert_eq!(to_top_down(flipped, Pt::from_f32(792.0)), rect);
    }

    #[test]
    fn unknown_tag_gives_a4() {
        assert_eq!(page_size("nope"), page_size("a4"));
    }
}
