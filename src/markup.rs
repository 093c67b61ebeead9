//! HTML to block elements, and the renderer that lays them out into a PDF.

use crate::doc_context::PageEventHandler;
use crate::doc_template::DocTemplate;
use crate::error::{FolioError, Result};
use crate::flowable::{
    Flowable, ImageBlock, ListItem, PageBreak, Paragraph, Rule, Spacer, Stack, TableRow, TextAlign,
    TextRun,
};
use crate::font::FontSet;
use crate::page_template::PageTemplate;
use crate::properties::PageType;
use crate::resource::load_image;
use crate::style::{ComputedStyle, Display, ElementInfo, PageSetup, StyleResolver};
use crate::types::{Color, Margins, Pt, Rect, Size};
use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;
use std::sync::Arc;
use std::time::Instant;

/// One top-level piece of converted markup.
#[derive(Debug, Clone)]
pub enum Element {
    /// Block-level content, placeable into any rectangle.
    Block(Box<dyn Flowable>),
    /// Text that sat directly in the body, outside any block element.
    Inline(Paragraph),
}

impl Element {
    pub fn is_block(&self) -> bool {
        matches!(self, Element::Block(_))
    }

    pub fn into_block(self) -> Box<dyn Flowable> {
        match self {
            Element::Block(block) => block,
            Element::Inline(paragraph) => Box::new(paragraph),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConverterOptions {
    /// Directory (plain path or `file://` URL) relative image sources
    /// resolve against.
    pub base_url: Option<String>,
    /// Fonts beyond the base-14 set. `None` means base-14 only.
    pub fonts: Option<Arc<FontSet>>,
    /// Stylesheet applied before any `<style>` element of the markup.
    pub css: Option<String>,
    /// Page size unless the markup's `@page { size }` says otherwise.
    pub default_page_size: Size,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            fonts: None,
            css: None,
            default_page_size: PageType::A4.size(),
        }
    }
}

/// Turns markup into block elements or into finished PDF bytes.
pub trait MarkupRenderer {
    /// Lays the markup out page by page. `handler` sees every page before it
    /// is committed.
    fn convert(
        &self,
        markup: &str,
        handler: Option<&mut dyn PageEventHandler>,
        options: &ConverterOptions,
    ) -> Result<Vec<u8>>;

    fn convert_to_elements(&self, markup: &str, options: &ConverterOptions)
    -> Result<Vec<Element>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl MarkupRenderer for HtmlRenderer {
    fn convert(
        &self,
        markup: &str,
        handler: Option<&mut dyn PageEventHandler>,
        options: &ConverterOptions,
    ) -> Result<Vec<u8>> {
        let t_start = Instant::now();
        let parsed = parse_markup(markup, options)?;
        let page_size = parsed.page.size.unwrap_or(options.default_page_size);
        let margins = parsed.page.resolve_margins(Margins::zero());
        let content = Rect {
            x: margins.left,
            y: margins.top,
            width: page_size.width - margins.left - margins.right,
            height: page_size.height - margins.top - margins.bottom,
        };
        if content.width <= Pt::ZERO || content.height <= Pt::ZERO {
            return Err(FolioError::Markup(format!(
                "page margins leave no room for content on a {}x{}pt page",
                page_size.width.to_f32(),
                page_size.height.to_f32()
            )));
        }

        let template = PageTemplate::new("content", page_size).with_frame(content);
        let mut doc = DocTemplate::new(vec![template]).with_handler(handler);
        for element in parsed.elements {
            doc.add_flowable(element.into_block());
        }
        let t_layout = Instant::now();
        let document = doc.build()?;
        let layout_ms = t_layout.elapsed().as_secs_f64() * 1000.0;

        let t_pdf = Instant::now();
        let bytes = crate::pdf::document_to_pdf(&document, &parsed.fonts)?;
        log::debug!(
            "Timing: markup {:.2}ms layout {:.2}ms pdf {:.2}ms ({} pages, {} bytes)",
            (t_layout - t_start).as_secs_f64() * 1000.0,
            layout_ms,
            t_pdf.elapsed().as_secs_f64() * 1000.0,
            document.pages.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn convert_to_elements(
        &self,
        markup: &str,
        options: &ConverterOptions,
    ) -> Result<Vec<Element>> {
        Ok(parse_markup(markup, options)?.elements)
    }
}

struct ParsedMarkup {
    elements: Vec<Element>,
    page: PageSetup,
    fonts: Arc<FontSet>,
}

fn parse_markup(markup: &str, options: &ConverterOptions) -> Result<ParsedMarkup> {
    let document = kuchiki::parse_html().one(markup);

    let mut sheets: Vec<String> = options.css.iter().cloned().collect();
    for node in document.descendants() {
        let is_style = node
            .as_element()
            .map(|el| el.name.local.as_ref() == "style")
            .unwrap_or(false);
        if is_style {
            sheets.push(node.text_contents());
        }
    }
    let resolver = StyleResolver::new(sheets.iter().map(String::as_str));
    let fonts = options.fonts.clone().unwrap_or_default();
    let converter = Converter {
        resolver: &resolver,
        fonts: fonts.clone(),
        base_url: options.base_url.as_deref(),
    };

    let mut ancestors: Vec<ElementInfo> = Vec::new();
    let mut style = ComputedStyle::default();
    if let Ok(html) = document.select_first("html") {
        if let Some((info, computed)) = converter.style_of(html.as_node(), &ancestors, &style) {
            style = computed;
            ancestors.push(info);
        }
    }
    let elements = match document.select_first("body") {
        Ok(body) => {
            let body_node = body.as_node();
            if let Some((info, computed)) = converter.style_of(body_node, &ancestors, &style) {
                style = computed;
                ancestors.push(info);
            }
            converter.container(body_node, &style, &mut ancestors)?
        }
        Err(()) => converter.container(&document, &style, &mut ancestors)?,
    };

    Ok(ParsedMarkup {
        elements,
        page: resolver.page_setup(),
        fonts,
    })
}

enum InlineItem {
    Run(TextRun),
    Image(ImageBlock),
}

struct Converter<'a> {
    resolver: &'a StyleResolver,
    fonts: Arc<FontSet>,
    base_url: Option<&'a str>,
}

impl Converter<'_> {
    fn style_of(
        &self,
        node: &NodeRef,
        ancestors: &[ElementInfo],
        parent: &ComputedStyle,
    ) -> Option<(ElementInfo, ComputedStyle)> {
        let element = node.as_element()?;
        let attrs = element.attributes.borrow();
        let info = ElementInfo::new(
            element.name.local.as_ref(),
            attrs.get("id"),
            attrs.get("class"),
        );
        let mut style = self
            .resolver
            .compute(&info, ancestors, parent, attrs.get("style"));
        // Presentational attributes sit below every stylesheet rule; only
        // honour them where the sheets left the inherited value alone.
        if let Some(align) = attrs.get("align") {
            if style.text_align == parent.text_align {
                style.text_align = match align.trim().to_ascii_lowercase().as_str() {
                    "center" => TextAlign::Center,
                    "right" => TextAlign::Right,
                    _ => TextAlign::Left,
                };
            }
        }
        if let Some(color) = attrs.get("bgcolor").and_then(crate::style::parse_color) {
            style.background.get_or_insert(color);
        }
        Some((info, style))
    }

    /// Converts the children of a block container. Runs of inline content
    /// between block children become paragraphs.
    fn container(
        &self,
        node: &NodeRef,
        style: &ComputedStyle,
        ancestors: &mut Vec<ElementInfo>,
    ) -> Result<Vec<Element>> {
        let mut out = Vec::new();
        let mut pending: Vec<InlineItem> = Vec::new();
        let mut list_index = list_start(node);
        for child in node.children() {
            if let Some(text) = child.as_text() {
                self.push_text(&text.borrow(), style, &mut pending);
                continue;
            }
            let Some((info, child_style)) = self.style_of(&child, ancestors, style) else {
                continue;
            };
            match child_style.display {
                Display::None => {}
                Display::Inline => {
                    ancestors.push(info);
                    let result = self.inline(&child, &child_style, ancestors, &mut pending);
                    ancestors.pop();
                    result?;
                }
                display => {
                    self.flush(&mut pending, style, &mut out);
                    if display == Display::ListItem {
                        list_index += 1;
                    }
                    ancestors.push(info);
                    let result = self.block(&child, &child_style, list_index, ancestors);
                    ancestors.pop();
                    out.extend(result?.into_iter().map(Element::Block));
                }
            }
        }
        self.flush(&mut pending, style, &mut out);
        Ok(out)
    }

    fn blocks_of(
        &self,
        node: &NodeRef,
        style: &ComputedStyle,
        ancestors: &mut Vec<ElementInfo>,
    ) -> Result<Vec<Box<dyn Flowable>>> {
        Ok(self
            .container(node, style, ancestors)?
            .into_iter()
            .map(Element::into_block)
            .collect())
    }

    fn push_text(&self, text: &str, style: &ComputedStyle, pending: &mut Vec<InlineItem>) {
        if text.is_empty() {
            return;
        }
        let text = if style.preserve_whitespace {
            text.to_string()
        } else {
            collapse_whitespace(text)
        };
        pending.push(InlineItem::Run(TextRun::new(text, style.text_style(&self.fonts))));
    }

    fn inline(
        &self,
        node: &NodeRef,
        style: &ComputedStyle,
        ancestors: &mut Vec<ElementInfo>,
        pending: &mut Vec<InlineItem>,
    ) -> Result<()> {
        let tag = node
            .as_element()
            .map(|el| el.name.local.as_ref().to_string())
            .unwrap_or_default();
        match tag.as_str() {
            "br" => {
                pending.push(InlineItem::Run(TextRun::new("\n", style.text_style(&self.fonts))));
                return Ok(());
            }
            "img" => {
                pending.push(InlineItem::Image(self.image(node, style)?));
                return Ok(());
            }
            _ => {}
        }
        for child in node.children() {
            if let Some(text) = child.as_text() {
                self.push_text(&text.borrow(), style, pending);
                continue;
            }
            let Some((info, child_style)) = self.style_of(&child, ancestors, style) else {
                continue;
            };
            if child_style.display == Display::None {
                continue;
            }
            ancestors.push(info);
            let result = self.inline(&child, &child_style, ancestors, pending);
            ancestors.pop();
            result?;
        }
        Ok(())
    }

    fn flush(&self, pending: &mut Vec<InlineItem>, style: &ComputedStyle, out: &mut Vec<Element>) {
        let mut runs: Vec<TextRun> = Vec::new();
        for item in pending.drain(..) {
            match item {
                InlineItem::Run(run) => runs.push(run),
                InlineItem::Image(image) => {
                    if let Some(paragraph) = self.paragraph(std::mem::take(&mut runs), style) {
                        out.push(Element::Inline(paragraph));
                    }
                    out.push(Element::Block(Box::new(image)));
                }
            }
        }
        if let Some(paragraph) = self.paragraph(runs, style) {
            out.push(Element::Inline(paragraph));
        }
    }

    fn paragraph(&self, runs: Vec<TextRun>, style: &ComputedStyle) -> Option<Paragraph> {
        let paragraph = Paragraph::new(runs, style.text_style(&self.fonts), self.fonts.clone())
            .with_align(style.text_align)
            .with_preserved_whitespace(style.preserve_whitespace);
        (!paragraph.is_blank()).then_some(paragraph)
    }

    fn block(
        &self,
        node: &NodeRef,
        style: &ComputedStyle,
        list_index: usize,
        ancestors: &mut Vec<ElementInfo>,
    ) -> Result<Vec<Box<dyn Flowable>>> {
        let tag = node
            .as_element()
            .map(|el| el.name.local.as_ref().to_string())
            .unwrap_or_default();
        let mut body: Vec<Box<dyn Flowable>> = match (tag.as_str(), style.display) {
            ("hr", _) => vec![Box::new(Rule::new(
                Pt::from_f32(0.75),
                Color::from_rgb8(128, 128, 128),
                Pt::ZERO,
            ))],
            ("img", _) => vec![Box::new(self.image(node, style)?)],
            (_, Display::Table) => self.table(node, style, ancestors)?,
            (_, Display::ListItem) => vec![self.list_item(node, style, list_index, ancestors)?],
            _ => self.blocks_of(node, style, ancestors)?,
        };
        if style.padding_left > Pt::ZERO || style.background.is_some() {
            body = vec![Box::new(
                Stack::new(body)
                    .with_indent(style.padding_left)
                    .with_background(style.background),
            )];
        }

        let mut out: Vec<Box<dyn Flowable>> = Vec::new();
        if style.break_before {
            out.push(Box::new(PageBreak::before()));
        }
        if style.margin_top > Pt::ZERO {
            out.push(Box::new(Spacer::new(style.margin_top)));
        }
        out.extend(body);
        if style.margin_bottom > Pt::ZERO {
            out.push(Box::new(Spacer::new(style.margin_bottom)));
        }
        if style.break_after {
            out.push(Box::new(PageBreak::after()));
        }
        Ok(out)
    }

    fn list_item(
        &self,
        node: &NodeRef,
        style: &ComputedStyle,
        index: usize,
        ancestors: &mut Vec<ElementInfo>,
    ) -> Result<Box<dyn Flowable>> {
        let body = Stack::new(self.blocks_of(node, style, ancestors)?);
        let label_width = style.font_size.mul_ratio(3, 2);
        let gap = style.font_size.mul_ratio(1, 2);
        Ok(match style.list_style.marker(index) {
            Some(marker) => {
                let label = Paragraph::plain(marker, style.text_style(&self.fonts), self.fonts.clone())
                    .with_align(TextAlign::Right);
                Box::new(ListItem::new(label, body, label_width, gap))
            }
            None => Box::new(body.with_indent(label_width + gap)),
        })
    }

    fn table(
        &self,
        node: &NodeRef,
        style: &ComputedStyle,
        ancestors: &mut Vec<ElementInfo>,
    ) -> Result<Vec<Box<dyn Flowable>>> {
        let (border, cellpadding) = match node.as_element() {
            Some(element) => {
                let attrs = element.attributes.borrow();
                (
                    attrs.get("border").map(str::to_string),
                    attrs.get("cellpadding").map(str::to_string),
                )
            }
            None => (None, None),
        };
        let border = border
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|v| *v > 0.0)
            .map(|_| Color::from_rgb8(128, 128, 128));
        let padding = cellpadding
            .and_then(|v| parse_dimension(&v))
            .unwrap_or(Pt::from_f32(2.0));

        let mut captions = Vec::new();
        let mut rows: Vec<(Vec<Stack>, Option<Color>)> = Vec::new();
        self.table_rows(node, style, ancestors, &mut rows, &mut captions)?;
        let columns = rows.iter().map(|(cells, _)| cells.len()).max().unwrap_or(0);

        let mut out = captions;
        for (cells, background) in rows {
            let row = TableRow::new(cells, columns)
                .with_border(border)
                .with_padding(padding)
                .with_background(background);
            out.push(Box::new(row));
        }
        Ok(out)
    }

    fn table_rows(
        &self,
        node: &NodeRef,
        style: &ComputedStyle,
        ancestors: &mut Vec<ElementInfo>,
        rows: &mut Vec<(Vec<Stack>, Option<Color>)>,
        captions: &mut Vec<Box<dyn Flowable>>,
    ) -> Result<()> {
        for child in node.children() {
            let Some((info, child_style)) = self.style_of(&child, ancestors, style) else {
                continue;
            };
            if child_style.display == Display::None {
                continue;
            }
            let tag = info.tag.clone();
            ancestors.push(info);
            let result = match tag.as_str() {
                "tr" => self.table_row(&child, &child_style, ancestors).map(|row| rows.push(row)),
                "thead" | "tbody" | "tfoot" => {
                    self.table_rows(&child, &child_style, ancestors, rows, captions)
                }
                "caption" => self
                    .blocks_of(&child, &child_style, ancestors)
                    .map(|blocks| captions.extend(blocks)),
                _ => Ok(()),
            };
            ancestors.pop();
            result?;
        }
        Ok(())
    }

    fn table_row(
        &self,
        node: &NodeRef,
        style: &ComputedStyle,
        ancestors: &mut Vec<ElementInfo>,
    ) -> Result<(Vec<Stack>, Option<Color>)> {
        let mut cells = Vec::new();
        for child in node.children() {
            let Some((info, cell_style)) = self.style_of(&child, ancestors, style) else {
                continue;
            };
            if !matches!(info.tag.as_str(), "td" | "th") || cell_style.display == Display::None {
                continue;
            }
            ancestors.push(info);
            let result = self.blocks_of(&child, &cell_style, ancestors);
            ancestors.pop();
            cells.push(Stack::new(result?).with_background(cell_style.background));
        }
        Ok((cells, style.background))
    }

    fn image(&self, node: &NodeRef, style: &ComputedStyle) -> Result<ImageBlock> {
        let (src, width, height) = match node.as_element() {
            Some(element) => {
                let attrs = element.attributes.borrow();
                (
                    attrs.get("src").unwrap_or_default().to_string(),
                    attrs.get("width").and_then(parse_dimension),
                    attrs.get("height").and_then(parse_dimension),
                )
            }
            None => (String::new(), None, None),
        };
        let image = load_image(&src, self.base_url)?;
        Ok(ImageBlock::new(image, width, height).with_align(style.text_align))
    }
}

fn list_start(node: &NodeRef) -> usize {
    node.as_element()
        .filter(|el| el.name.local.as_ref() == "ol")
        .and_then(|el| {
            el.attributes
                .borrow()
                .get("start")
                .and_then(|v| v.trim().parse::<usize>().ok())
        })
        .map(|start| start.saturating_sub(1))
        .unwrap_or(0)
}

/// Collapses whitespace runs to one space, keeping a single leading or
/// trailing space so adjacent inline runs stay separated.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// HTML dimension attribute: bare numbers are CSS pixels.
fn parse_dimension(value: &str) -> Option<Pt> {
    let value = value.trim();
    if value.ends_with('%') {
        return None;
    }
    match value.parse::<f32>() {
        Ok(px) if px > 0.0 => Some(Pt::from_f32(px * 0.75)),
        Ok(_) => None,
        Err(_) => crate::style::parse_length(value, Pt::from_f32(12.0)).filter(|v| *v > Pt::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::doc_context::PageEvent;

    fn elements(html: &str) -> Vec<Element> {
        HtmlRenderer
            .convert_to_elements(html, &ConverterOptions::default())
            .unwrap()
    }

    fn texts(elements: &[Element]) -> Vec<String> {
        elements
            .iter()
            .filter_map(|element| match element {
                Element::Inline(p) => Some(p.text()),
                Element::Block(_) => None,
            })
            .collect()
    }

    #[test]
    fn top_level_text_is_inline_and_blocks_are_blocks() {
        let out = elements("<body>loose <b>text</b><div>H</div></body>");
        assert_eq!(out.len(), 2);
        assert!(!out[0].is_block());
        assert_eq!(texts(&out), vec!["loose text"]);
        assert!(out[1].is_block());
    }

    #[test]
    fn paragraph_margins_become_spacers() {
        let out = elements("<p>Hello</p>");
        // Paragraph plus its 8pt bottom margin.
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(Element::is_block));
        let spacer = out[1].clone().into_block();
        assert_eq!(
            spacer.wrap(Pt::from_f32(100.0), Pt::from_f32(100.0)).height,
            Pt::from_f32(8.0)
        );
    }

    #[test]
    fn hidden_elements_are_skipped() {
        let out = elements("<div style=\"display:none\">x</div><script>var a;</script>");
        assert!(out.is_empty());
    }

    #[test]
    fn page_breaks_become_markers() {
        let out = elements("<div style=\"page-break-before: always\">a</div>");
        let first = out[0].clone().into_block();
        assert_eq!(
            first.pagination().break_before,
            crate::flowable::BreakBefore::Page
        );
    }

    #[test]
    fn missing_images_are_fatal() {
        let err = HtmlRenderer
            .convert_to_elements("<img src=\"nope/missing.png\">", &ConverterOptions::default())
            .unwrap_err();
        assert!(matches!(err, FolioError::Resource { .. }));
    }

    #[test]
    fn data_uri_images_convert() {
        let html = format!(
            "<div><img src=\"{}\" width=\"40\"></div>",
            crate::resource::tests::tiny_png_data_uri()
        );
        let out = elements(&html);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn convert_raises_one_event_per_page() {
        let body: String = (0..120).map(|n| format!("<p>line {n}</p>")).collect();
        let html = format!("<style>@page {{ size: A5; margin: 20pt }}</style>{body}");
        let mut pages = Vec::new();
        let mut handler = |event: &mut PageEvent<'_>| {
            pages.push(event.page_number());
            event.canvas().draw_string(Pt::ZERO, Pt::ZERO, "x");
        };
        let bytes = HtmlRenderer
            .convert(&html, Some(&mut handler), &ConverterOptions::default())
            .unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(pages.len() > 1);
        assert_eq!(pages, (1..=pages.len()).collect::<Vec<_>>());
    }

    #[test]
    fn list_items_draw_markers() {
        let out = elements("<ol start=\"3\"><li>a</li><li>b</li></ol>");
        let mut canvas = crate::canvas::Canvas::new(Size::new(300.0, 300.0));
        let mut y = Pt::ZERO;
        for element in out {
            let block = element.into_block();
            let h = block.wrap(Pt::from_f32(200.0), Pt::from_f32(300.0)).height;
            block.draw(&mut canvas, Pt::ZERO, y, Pt::from_f32(200.0), Pt::from_f32(300.0));
            y += h;
        }
        let strings: Vec<String> = canvas
            .current_commands()
            .iter()
            .filter_map(|c| match c {
                Command::DrawString { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(strings, vec!["3.", "a", "4.", "b"]);
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(collapse_whitespace("  a \n\t b "), " a b ");
        assert_eq!(parse_dimension("100"), Some(Pt::from_f32(75.0)));
        assert_eq!(parse_dimension("50%"), None);
    }
}
