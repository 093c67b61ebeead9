use crate::types::{Margins, Pt, Size};
use serde::Deserialize;

/// Named page formats accepted in `pageType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageType {
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
    A5,
    A6,
    A7,
    A8,
    A9,
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
    B8,
    Letter,
    Legal,
    Ledger,
    Tabloid,
    Executive,
}

impl PageType {
    pub const ALL: [PageType; 24] = [
        PageType::A0,
        PageType::A1,
        PageType::A2,
        PageType::A3,
        PageType::A4,
        PageType::A5,
        PageType::A6,
        PageType::A7,
        PageType::A8,
        PageType::A9,
        PageType::B0,
        PageType::B1,
        PageType::B2,
        PageType::B3,
        PageType::B4,
        PageType::B5,
        PageType::B6,
        PageType::B7,
        PageType::B8,
        PageType::Letter,
        PageType::Legal,
        PageType::Ledger,
        PageType::Tabloid,
        PageType::Executive,
    ];

    /// Case-insensitive lookup. Returns `None` for unknown tags.
    pub fn parse(tag: &str) -> Option<PageType> {
        let tag = tag.trim();
        PageType::ALL
            .into_iter()
            .find(|page_type| page_type.name().eq_ignore_ascii_case(tag))
    }

    /// Like [`PageType::parse`], but unknown tags resolve to A4.
    pub fn from_tag(tag: &str) -> PageType {
        match PageType::parse(tag) {
            Some(page_type) => page_type,
            None => {
                if !tag.trim().is_empty() {
                    log::warn!("unknown page type '{tag}', using A4");
                }
                PageType::A4
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PageType::A0 => "A0",
            PageType::A1 => "A1",
            PageType::A2 => "A2",
            PageType::A3 => "A3",
            PageType::A4 => "A4",
            PageType::A5 => "A5",
            PageType::A6 => "A6",
            PageType::A7 => "A7",
            PageType::A8 => "A8",
            PageType::A9 => "A9",
            PageType::B0 => "B0",
            PageType::B1 => "B1",
            PageType::B2 => "B2",
            PageType::B3 => "B3",
            PageType::B4 => "B4",
            PageType::B5 => "B5",
            PageType::B6 => "B6",
            PageType::B7 => "B7",
            PageType::B8 => "B8",
            PageType::Letter => "LETTER",
            PageType::Legal => "LEGAL",
            PageType::Ledger => "LEDGER",
            PageType::Tabloid => "TABLOID",
            PageType::Executive => "EXECUTIVE",
        }
    }

    /// Portrait page size in points.
    pub fn size(self) -> Size {
        let (width, height) = match self {
            PageType::A0 => (2384.0, 3370.0),
            PageType::A1 => (1684.0, 2384.0),
            PageType::A2 => (1191.0, 1684.0),
            PageType::A3 => (842.0, 1191.0),
            PageType::A4 => (595.0, 842.0),
            PageType::A5 => (420.0, 595.0),
            PageType::A6 => (297.0, 420.0),
            PageType::A7 => (210.0, 297.0),
            PageType::A8 => (148.0, 210.0),
            PageType::A9 => (105.0, 148.0),
            PageType::B0 => (2834.0, 4008.0),
            PageType::B1 => (2004.0, 2834.0),
            PageType::B2 => (1417.0, 2004.0),
            PageType::B3 => (1000.0, 1417.0),
            PageType::B4 => (708.0, 1000.0),
            PageType::B5 => (498.0, 708.0),
            PageType::B6 => (354.0, 498.0),
            PageType::B7 => (249.0, 354.0),
            PageType::B8 => (175.0, 249.0),
            PageType::Letter => (612.0, 792.0),
            PageType::Legal => (612.0, 1008.0),
            PageType::Ledger => (1224.0, 792.0),
            PageType::Tabloid => (792.0, 1224.0),
            PageType::Executive => (522.0, 756.0),
        };
        Size::new(width, height)
    }
}

impl<'de> Deserialize<'de> for PageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(tag.as_deref().map(PageType::from_tag).unwrap_or_default())
    }
}

/// Page geometry, margins and page-numbering policy for one composition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawDocumentProperties")]
pub struct DocumentProperties {
    pub top_margin: f32,
    pub bottom_margin: f32,
    pub left_margin: f32,
    pub right_margin: f32,
    /// Height reserved for the header band; 0 or less means no header.
    pub header_height: f32,
    /// Height reserved for the footer band; 0 or less means no footer.
    pub footer_height: f32,
    pub page_type: PageType,
    pub number_page: bool,
    pub number_page_size: u32,
    /// Text placed between the page number and the total. Empty prints the
    /// page number alone.
    pub number_page_of: String,
    /// Distance of the number band from the bottom edge of the page.
    pub number_page_v_pos: i32,
}

impl Default for DocumentProperties {
    fn default() -> Self {
        Self {
            top_margin: 30.0,
            bottom_margin: 30.0,
            left_margin: 37.0,
            right_margin: 37.0,
            header_height: 0.0,
            footer_height: 0.0,
            page_type: PageType::A4,
            number_page: false,
            number_page_size: 8,
            number_page_of: String::new(),
            number_page_v_pos: 30,
        }
    }
}

impl DocumentProperties {
    pub fn page_size(&self) -> Size {
        self.page_type.size()
    }

    /// Whether a header band is reserved on every page.
    pub fn has_header(&self) -> bool {
        self.header_height > 0.0
    }

    pub fn has_footer(&self) -> bool {
        self.footer_height > 0.0
    }

    pub fn effective_top_margin(&self, header_present: bool) -> f32 {
        if header_present && self.has_header() {
            self.header_height
        } else {
            self.top_margin
        }
    }

    pub fn effective_bottom_margin(&self, footer_present: bool) -> f32 {
        if footer_present && self.has_footer() {
            self.footer_height
        } else {
            self.bottom_margin
        }
    }

    /// Margins the main content flows inside. A header or footer band that is
    /// actually drawn replaces the corresponding margin with its own height.
    pub fn effective_margins(&self, header_present: bool, footer_present: bool) -> Margins {
        Margins {
            top: Pt::from_f32(self.effective_top_margin(header_present)),
            right: Pt::from_f32(self.right_margin),
            bottom: Pt::from_f32(self.effective_bottom_margin(footer_present)),
            left: Pt::from_f32(self.left_margin),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl Lenient {
    fn to_f32(&self) -> Option<f32> {
        match self {
            Lenient::Number(value) => Some(*value as f32),
            Lenient::Text(text) => text.trim().parse::<f32>().ok(),
            Lenient::Flag(_) => None,
        }
        .filter(|value| value.is_finite())
    }

    fn to_bool(&self) -> Option<bool> {
        match self {
            Lenient::Flag(value) => Some(*value),
            Lenient::Number(value) => Some(*value != 0.0),
            Lenient::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
        }
    }
}

// Wire form: the payload carries numbers either as JSON numbers or as
// numeric strings, and may send nulls.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDocumentProperties {
    top_margin: Option<Lenient>,
    bottom_margin: Option<Lenient>,
    left_margin: Option<Lenient>,
    right_margin: Option<Lenient>,
    header_height: Option<Lenient>,
    footer_height: Option<Lenient>,
    page_type: PageType,
    number_page: Option<Lenient>,
    number_page_size: Option<Lenient>,
    number_page_of: Option<String>,
    number_page_v_pos: Option<Lenient>,
}

impl From<RawDocumentProperties> for DocumentProperties {
    fn from(raw: RawDocumentProperties) -> Self {
        let defaults = DocumentProperties::default();
        let number = |value: &Option<Lenient>, fallback: f32| {
            value.as_ref().and_then(Lenient::to_f32).unwrap_or(fallback)
        };
        // Zero means "not supplied" for both number settings.
        let number_size = number(&raw.number_page_size, 0.0).max(0.0).round() as u32;
        let number_v_pos = number(&raw.number_page_v_pos, 0.0).round() as i32;
        Self {
            top_margin: number(&raw.top_margin, defaults.top_margin),
            bottom_margin: number(&raw.bottom_margin, defaults.bottom_margin),
            left_margin: number(&raw.left_margin, defaults.left_margin),
            right_margin: number(&raw.right_margin, defaults.right_margin),
            header_height: number(&raw.header_height, defaults.header_height),
            footer_height: number(&raw.footer_height, defaults.footer_height),
            page_type: raw.page_type,
            number_page: raw
                .number_page
                .as_ref()
                .and_then(Lenient::to_bool)
                .unwrap_or(defaults.number_page),
            number_page_size: match number_size {
                0 => defaults.number_page_size,
                size => size,
            },
            number_page_of: raw
                .number_page_of
                .filter(|separator| !separator.trim().is_empty())
                .unwrap_or(defaults.number_page_of),
            number_page_v_pos: match number_v_pos {
                0 => defaults.number_page_v_pos,
                v_pos => v_pos,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_page_types_fall_back_to_a4() {
        for tag in ["", "A10", "letterish", "C5"] {
            assert_eq!(PageType::from_tag(tag), PageType::A4);
        }
        assert_eq!(PageType::from_tag("letter"), PageType::Letter);
        assert_eq!(PageType::from_tag(" b5 "), PageType::B5);
    }

    #[test]
    fn named_sizes_are_in_points() {
        assert_eq!(PageType::Letter.size(), Size::new(612.0, 792.0));
        assert_eq!(PageType::Ledger.size(), Size::new(1224.0, 792.0));
        assert_eq!(PageType::A4.size(), Size::new(595.0, 842.0));
    }

    #[test]
    fn header_height_overrides_top_margin_only_when_drawn() {
        let props = DocumentProperties {
            header_height: 50.0,
            footer_height: 40.0,
            ..DocumentProperties::default()
        };
        let margins = props.effective_margins(true, true);
        assert_eq!(margins.top, Pt::from_f32(50.0));
        assert_eq!(margins.bottom, Pt::from_f32(40.0));
        assert_eq!(margins.left, Pt::from_f32(37.0));

        let margins = props.effective_margins(false, false);
        assert_eq!(margins.top, Pt::from_f32(30.0));
        assert_eq!(margins.bottom, Pt::from_f32(30.0));
    }

    #[test]
    fn deserializes_wire_form_with_string_margins() {
        let json = r#"{
            "topMargin": "12.5",
            "leftMargin": 20,
            "rightMargin": "",
            "headerHeight": 50,
            "pageType": "legal",
            "numberPage": true,
            "numberPageOf": "of",
            "numberPageVPos": null
        }"#;
        let props: DocumentProperties = serde_json::from_str(json).unwrap();
        assert_eq!(props.top_margin, 12.5);
        assert_eq!(props.left_margin, 20.0);
        assert_eq!(props.right_margin, 37.0);
        assert_eq!(props.bottom_margin, 30.0);
        assert_eq!(props.header_height, 50.0);
        assert_eq!(props.page_type, PageType::Legal);
        assert!(props.number_page);
        assert_eq!(props.number_page_size, 8);
        assert_eq!(props.number_page_of, "of");
        assert_eq!(props.number_page_v_pos, 30);
    }

    #[test]
    fn zero_number_settings_and_blank_separator_keep_defaults() {
        let json = r#"{
            "numberPage": true,
            "numberPageSize": 0,
            "numberPageVPos": "0",
            "numberPageOf": "   "
        }"#;
        let props: DocumentProperties = serde_json::from_str(json).unwrap();
        assert!(props.number_page);
        assert_eq!(props.number_page_size, 8);
        assert_eq!(props.number_page_v_pos, 30);
        assert_eq!(props.number_page_of, "");

        let props: DocumentProperties = serde_json::from_str(
            r#"{"numberPageSize": 11, "numberPageVPos": -5, "numberPageOf": " de "}"#,
        )
        .unwrap();
        assert_eq!(props.number_page_size, 11);
        assert_eq!(props.number_page_v_pos, -5);
        assert_eq!(props.number_page_of, " de ");
    }

    #[test]
    fn empty_object_yields_defaults() {
        let props: DocumentProperties = serde_json::from_str("{}").unwrap();
        assert_eq!(props, DocumentProperties::default());
    }
}
