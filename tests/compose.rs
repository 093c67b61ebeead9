use folio::{
    DocumentProperties, FontCatalog, PageType, Pt, compose, label_for, number_rect, page_size,
};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn letter() -> DocumentProperties {
    DocumentProperties {
        page_type: PageType::Letter,
        ..DocumentProperties::default()
    }
}

fn long_body(paragraphs: usize) -> String {
    (1..=paragraphs)
        .map(|n| format!("<p>Paragraph {n}</p>"))
        .collect()
}

fn load(bytes: &[u8]) -> lopdf::Document {
    lopdf::Document::load_mem(bytes).expect("composed output is a valid pdf")
}

fn page_contents(doc: &lopdf::Document) -> Vec<String> {
    doc.get_pages()
        .values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
        .collect()
}

fn media_box(doc: &lopdf::Document, page: u32) -> Vec<f32> {
    let id = doc.get_pages()[&page];
    let dict = doc.get_object(id).unwrap().as_dict().unwrap();
    dict.get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_float().unwrap())
        .collect()
}

#[test]
fn unknown_page_type_resolves_to_a4() {
    assert_eq!(page_size("not-a-size"), PageType::A4.size());
    let props: DocumentProperties = serde_json::from_str(r#"{"pageType": "Z9"}"#).unwrap();
    assert_eq!(props.page_type, PageType::A4);

    let bytes = compose("<p>x</p>", None, None, &props, "", None, &[])
        .unwrap()
        .unwrap();
    assert_eq!(media_box(&load(&bytes), 1), vec![0.0, 0.0, 595.0, 842.0]);
}

#[test]
fn header_and_footer_heights_override_margins() {
    let props = DocumentProperties {
        top_margin: 10.0,
        bottom_margin: 10.0,
        header_height: 50.0,
        footer_height: 40.0,
        ..letter()
    };
    let margins = props.effective_margins(true, true);
    assert_eq!(margins.top, Pt::from_f32(50.0));
    assert_eq!(margins.bottom, Pt::from_f32(40.0));

    let bytes = compose(
        "<p>Body</p>",
        Some("<div>H</div>"),
        Some("<div>F</div>"),
        &props,
        "",
        None,
        &[],
    )
    .unwrap()
    .unwrap();
    let contents = page_contents(&load(&bytes));
    // First line box starts at the 50pt header edge: 792 - 50 - 12.
    assert!(contents[0].contains("37 730 Td (Body) Tj"), "{}", contents[0]);
}

#[test]
fn stamping_keeps_page_count_and_adds_one_label_per_page() {
    let body = long_body(80);
    let plain = compose(&body, None, None, &letter(), "", None, &[])
        .unwrap()
        .unwrap();
    let plain_pages = load(&plain).get_pages().len();
    assert!(plain_pages > 1);

    let props = DocumentProperties {
        number_page: true,
        number_page_of: "of".to_string(),
        ..letter()
    };
    let stamped = compose(&body, None, None, &props, "", None, &[])
        .unwrap()
        .unwrap();
    let doc = load(&stamped);
    assert_eq!(doc.get_pages().len(), plain_pages);
    for (index, content) in page_contents(&doc).iter().enumerate() {
        let label = format!("({} of {}) Tj", index + 1, plain_pages);
        assert_eq!(content.matches(&label).count(), 1, "{content}");
        assert_eq!(content.matches("/FolioNum").count(), 1);
    }
}

#[test]
fn labels_are_formatted_with_and_without_separator() {
    assert_eq!(label_for(2, 5, ""), "2");
    assert_eq!(label_for(2, 5, "of"), "2 of 5");
}

#[test]
fn number_rect_depends_only_on_its_inputs() {
    let props = DocumentProperties {
        number_page_size: 12,
        number_page_v_pos: 25,
        ..letter()
    };
    let size = props.page_size();
    let a = number_rect(&props, size.width, size.height);
    let b = number_rect(&props, size.width, size.height);
    assert_eq!(a, b);
    assert_eq!(a.y, Pt::from_i32(37));
    assert_eq!(a.height, Pt::from_i32(12));
}

#[test]
fn single_paragraph_on_letter_is_one_undecorated_page() {
    let bytes = compose("<p>Hello</p>", None, None, &letter(), "", None, &[])
        .unwrap()
        .unwrap();
    let doc = load(&bytes);
    assert_eq!(doc.get_pages().len(), 1);
    assert_eq!(media_box(&doc, 1), vec![0.0, 0.0, 612.0, 792.0]);
    let content = &page_contents(&doc)[0];
    assert!(content.contains("(Hello) Tj"));
    assert!(!content.contains("re W n"), "no header or footer clip: {content}");
}

#[test]
fn header_is_drawn_in_its_band_on_every_page() {
    let props = DocumentProperties {
        header_height: 50.0,
        ..letter()
    };
    let bytes = compose(
        &long_body(80),
        Some("<div>H</div>"),
        None,
        &props,
        "",
        None,
        &[],
    )
    .unwrap()
    .unwrap();
    let doc = load(&bytes);
    let contents = page_contents(&doc);
    assert!(contents.len() > 1);
    for content in &contents {
        assert_eq!(content.matches("37 742 538 50 re W n").count(), 1, "{content}");
        assert_eq!(content.matches("(H) Tj").count(), 1);
    }
}

#[test]
fn invalid_font_paths_do_not_stop_composition() {
    let paths = vec![fixture("DejaVuSans.ttf"), fixture("no-such-font.ttf")];
    let catalog = FontCatalog::build(&paths);
    assert_eq!(catalog.fonts().len(), 1);
    assert_eq!(catalog.failures().len(), 1);
    assert_eq!(catalog.failures()[0].path, paths[1]);

    let bytes = compose(
        "<p>Embedded text</p>",
        None,
        None,
        &letter(),
        "body { font-family: 'DejaVu Sans'; }",
        None,
        &paths,
    )
    .unwrap()
    .unwrap();
    let raw = String::from_utf8_lossy(&bytes);
    assert!(raw.contains("/Subtype /Type0"));
    assert!(raw.contains("/FontFile2"));
    assert_eq!(load(&bytes).get_pages().len(), 1);
}

#[test]
fn non_latin_text_in_a_loaded_font_survives_composition() {
    let path = fixture("DejaVuSans.ttf");
    let bytes = compose(
        "<p>Привет ΑΒΓ</p>",
        None,
        None,
        &letter(),
        "body { font-family: 'DejaVu Sans'; }",
        None,
        std::slice::from_ref(&path),
    )
    .unwrap()
    .unwrap();

    let data = std::fs::read(&path).unwrap();
    let face = ttf_parser::Face::parse(&data, 0).unwrap();
    let gid = |ch: char| face.glyph_index(ch).unwrap().0;
    let word: String = "Привет".chars().map(|ch| format!("{:04X}", gid(ch))).collect();

    let content = &page_contents(&load(&bytes))[0];
    assert!(content.contains(&word), "{content}");
    assert!(!content.contains('?'), "{content}");

    let raw = String::from_utf8_lossy(&bytes);
    assert!(raw.contains("/Encoding /Identity-H"));
    assert!(raw.contains(&format!("<{:04X}> <041F>", gid('П'))));
    assert!(raw.contains(&format!("<{:04X}> <0393>", gid('Γ'))));
}

fn a6() -> DocumentProperties {
    DocumentProperties {
        page_type: PageType::A6,
        ..DocumentProperties::default()
    }
}

#[test]
fn table_cell_taller_than_a_page_continues_on_later_pages() {
    let lines: Vec<String> = (1..=60).map(|n| format!("L{n}")).collect();
    let html = format!("<table><tr><td>{}</td></tr></table>", lines.join("<br>"));
    let bytes = compose(&html, None, None, &a6(), "", None, &[])
        .unwrap()
        .unwrap();
    let contents = page_contents(&load(&bytes));
    assert!(contents.len() >= 3, "{} pages", contents.len());
    for line in &lines {
        let drawn = format!("({line}) Tj");
        let count: usize = contents.iter().map(|c| c.matches(&drawn).count()).sum();
        assert_eq!(count, 1, "{line}");
    }
    assert!(contents.iter().all(|c| !c.contains("re W n")));
}

#[test]
fn image_taller_than_a_page_is_scaled_to_the_frame() {
    let mut png = std::io::Cursor::new(Vec::new());
    image::RgbImage::new(2, 8)
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();
    let src = format!(
        "data:image/png;base64,{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, png.into_inner())
    );
    let html = format!(r#"<img src="{src}" width="200" height="800">"#);
    let bytes = compose(&html, None, None, &a6(), "", None, &[])
        .unwrap()
        .unwrap();
    let contents = page_contents(&load(&bytes));
    // 150x600pt scaled into the 360pt frame keeps its 1:4 aspect.
    let drawn: usize = contents
        .iter()
        .map(|c| c.matches("90 0 0 360 37 30 cm").count())
        .sum();
    assert_eq!(drawn, 1, "{contents:?}");
    assert!(contents.iter().all(|c| !c.contains("re W n")));
}
