//! First pass: markup, header and footer composed into a paginated PDF.

use crate::decorator::PageDecorator;
use crate::doc_context::PageEventHandler;
use crate::error::Result;
use crate::font::FontCatalog;
use crate::markup::{ConverterOptions, HtmlRenderer, MarkupRenderer};
use crate::properties::DocumentProperties;
use crate::stamper::stamp_page_numbers;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Composes with the built-in [`HtmlRenderer`]. See [`compose_with`].
pub fn compose(
    main: &str,
    header: Option<&str>,
    footer: Option<&str>,
    props: &DocumentProperties,
    css: &str,
    base_url: Option<&str>,
    font_paths: &[PathBuf],
) -> Result<Option<Vec<u8>>> {
    compose_with(
        &HtmlRenderer,
        main,
        header,
        footer,
        props,
        css,
        base_url,
        font_paths,
    )
}

/// Lays out `main` on pages of `props.page_type`, overlays the header and
/// footer on every page and stamps page numbers when `props.number_page` is
/// set. Blank main content gives `Ok(None)`.
///
/// A header (footer) is drawn only when its markup is non-blank and its
/// height is positive; only then does its height replace the top (bottom)
/// margin of the main content.
#[allow(clippy::too_many_arguments)]
pub fn compose_with(
    renderer: &dyn MarkupRenderer,
    main: &str,
    header: Option<&str>,
    footer: Option<&str>,
    props: &DocumentProperties,
    css: &str,
    base_url: Option<&str>,
    font_paths: &[PathBuf],
) -> Result<Option<Vec<u8>>> {
    if main.trim().is_empty() {
        log::debug!("main content is blank; nothing to compose");
        return Ok(None);
    }
    let t_start = Instant::now();

    let header = header.filter(|markup| !markup.trim().is_empty() && props.has_header());
    let footer = footer.filter(|markup| !markup.trim().is_empty() && props.has_footer());
    let margins = props.effective_margins(header.is_some(), footer.is_some());
    let content = format!(
        "<style>\n@page{{margin-top: {}pt;margin-bottom: {}pt;margin-left: {}pt;margin-right: {}pt;}}\n{}</style>\n{}",
        margins.top.to_f32(),
        margins.bottom.to_f32(),
        margins.left.to_f32(),
        margins.right.to_f32(),
        css,
        main
    );

    let catalog = FontCatalog::build(font_paths);
    let failed_fonts = catalog.failures().len();
    let fonts = if catalog.fonts().is_empty() {
        None
    } else {
        Some(Arc::new(catalog.into_fonts()))
    };
    let options = ConverterOptions {
        base_url: base_url.map(str::to_string),
        fonts,
        css: None,
        default_page_size: props.page_size(),
    };

    let mut decorator = if header.is_some() || footer.is_some() {
        let wrap = |markup: &str| format!("<style>\n{}</style>\n{}", css, markup);
        let header = header.map(wrap);
        let footer = footer.map(wrap);
        Some(PageDecorator::new(
            header.as_deref(),
            footer.as_deref(),
            renderer,
            &options,
            props,
        )?)
    } else {
        None
    };
    let t_render = Instant::now();
    let handler = decorator
        .as_mut()
        .map(|decorator| decorator as &mut dyn PageEventHandler);
    let bytes = renderer.convert(&content, handler, &options)?;
    let render_ms = t_render.elapsed().as_secs_f64() * 1000.0;

    let t_stamp = Instant::now();
    let bytes = if props.number_page {
        stamp_page_numbers(&bytes, props)?
    } else {
        bytes
    };
    log::info!(
        "Timing: render {:.2}ms stamp {:.2}ms total {:.2}ms ({} bytes, page {}, {} font(s) failed)",
        render_ms,
        t_stamp.elapsed().as_secs_f64() * 1000.0,
        t_start.elapsed().as_secs_f64() * 1000.0,
        bytes.len(),
        props.page_type.name(),
        failed_fonts
    );
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Element;
    use crate::types::Size;
    use std::cell::RefCell;

    /// Records what it is asked to convert and returns a fixed payload.
    #[derive(Default)]
    struct RecordingRenderer {
        converted: RefCell<Vec<String>>,
        fragments: RefCell<Vec<String>>,
        page_sizes: RefCell<Vec<Size>>,
        had_handler: RefCell<bool>,
    }

    impl MarkupRenderer for RecordingRenderer {
        fn convert(
            &self,
            markup: &str,
            handler: Option<&mut dyn PageEventHandler>,
            options: &ConverterOptions,
        ) -> Result<Vec<u8>> {
            self.converted.borrow_mut().push(markup.to_string());
            self.page_sizes.borrow_mut().push(options.default_page_size);
            *self.had_handler.borrow_mut() = handler.is_some();
            Ok(b"%PDF-stub".to_vec())
        }

        fn convert_to_elements(
            &self,
            markup: &str,
            _options: &ConverterOptions,
        ) -> Result<Vec<Element>> {
            self.fragments.borrow_mut().push(markup.to_string());
            Ok(Vec::new())
        }
    }

    fn run(
        renderer: &RecordingRenderer,
        header: Option<&str>,
        footer: Option<&str>,
        props: &DocumentProperties,
    ) -> Option<Vec<u8>> {
        compose_with(renderer, "<p>Body</p>", header, footer, props, "p{color:red}", None, &[])
            .unwrap()
    }

    #[test]
    fn blank_main_content_composes_nothing() {
        let renderer = RecordingRenderer::default();
        let props = DocumentProperties::default();
        let out = compose_with(&renderer, " \n\t", None, None, &props, "", None, &[]).unwrap();
        assert!(out.is_none());
        assert!(renderer.converted.borrow().is_empty());
    }

    #[test]
    fn header_height_replaces_top_margin() {
        let renderer = RecordingRenderer::default();
        let props = DocumentProperties {
            header_height: 50.0,
            footer_height: 40.0,
            ..DocumentProperties::default()
        };
        let out = run(&renderer, Some("<div>H</div>"), Some("<div>F</div>"), &props);
        assert_eq!(out.as_deref(), Some(&b"%PDF-stub"[..]));

        let converted = renderer.converted.borrow();
        assert!(converted[0].starts_with(
            "<style>\n@page{margin-top: 50pt;margin-bottom: 40pt;margin-left: 37pt;margin-right: 37pt;}\np{color:red}</style>\n<p>Body</p>"
        ));
        assert!(*renderer.had_handler.borrow());
        assert_eq!(
            *renderer.fragments.borrow(),
            vec![
                "<style>\np{color:red}</style>\n<div>H</div>".to_string(),
                "<style>\np{color:red}</style>\n<div>F</div>".to_string(),
            ]
        );
    }

    #[test]
    fn height_without_markup_keeps_the_margin() {
        let renderer = RecordingRenderer::default();
        let props = DocumentProperties {
            header_height: 50.0,
            ..DocumentProperties::default()
        };
        run(&renderer, Some("   "), None, &props);
        assert!(renderer.converted.borrow()[0].contains("@page{margin-top: 30pt;"));
        assert!(!*renderer.had_handler.borrow());
        assert!(renderer.fragments.borrow().is_empty());
    }

    #[test]
    fn markup_without_height_is_ignored() {
        let renderer = RecordingRenderer::default();
        run(
            &renderer,
            Some("<div>H</div>"),
            None,
            &DocumentProperties::default(),
        );
        assert!(!*renderer.had_handler.borrow());
    }

    #[test]
    fn page_type_becomes_the_default_page_size() {
        let renderer = RecordingRenderer::default();
        let props = DocumentProperties {
            page_type: crate::properties::PageType::Letter,
            ..DocumentProperties::default()
        };
        run(&renderer, None, None, &props);
        assert_eq!(renderer.page_sizes.borrow()[0], Size::new(612.0, 792.0));
    }
}
