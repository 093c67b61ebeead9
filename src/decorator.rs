//! Header and footer overlay drawn onto every finished page.

use crate::canvas::Canvas;
use crate::doc_context::{PageEvent, PageEventHandler};
use crate::error::Result;
use crate::flowable::Flowable;
use crate::frame::Frame;
use crate::geometry::{footer_rect, header_rect, to_top_down};
use crate::markup::{ConverterOptions, Element, MarkupRenderer};
use crate::properties::DocumentProperties;
use crate::types::Rect;

/// Lays pre-converted header and footer blocks into their bands each time a
/// page is finalized. Content that does not fit its band is clipped.
#[derive(Debug)]
pub struct PageDecorator {
    header: Vec<Box<dyn Flowable>>,
    footer: Vec<Box<dyn Flowable>>,
    props: DocumentProperties,
}

impl PageDecorator {
    /// Converts the header and footer markup once. Only block-level elements
    /// are kept; bare top-level text is skipped.
    pub fn new(
        header: Option<&str>,
        footer: Option<&str>,
        renderer: &dyn MarkupRenderer,
        options: &ConverterOptions,
        props: &DocumentProperties,
    ) -> Result<Self> {
        let convert = |markup: Option<&str>, region: &str| -> Result<Vec<Box<dyn Flowable>>> {
            let Some(markup) = markup else {
                return Ok(Vec::new());
            };
            let elements = renderer.convert_to_elements(markup, options)?;
            let total = elements.len();
            let blocks: Vec<_> = elements
                .into_iter()
                .filter_map(|element| match element {
                    Element::Block(block) => Some(block),
                    Element::Inline(_) => None,
                })
                .collect();
            if blocks.len() != total {
                log::debug!(
                    "{region}: skipped {} non-block element(s)",
                    total - blocks.len()
                );
            }
            Ok(blocks)
        };
        Ok(Self {
            header: convert(header, "header")?,
            footer: convert(footer, "footer")?,
            props: props.clone(),
        })
    }

    pub fn has_header(&self) -> bool {
        !self.header.is_empty()
    }

    pub fn has_footer(&self) -> bool {
        !self.footer.is_empty()
    }
}

impl PageEventHandler for PageDecorator {
    fn on_end_page(&mut self, event: &mut PageEvent<'_>) {
        let page_number = event.page_number();
        let size = event.page_size();
        if !self.header.is_empty() {
            let rect = header_rect(&self.props, size.width, size.height);
            let placed = place_clipped(
                &self.header,
                event.canvas(),
                to_top_down(rect, size.height),
            );
            log::debug!("page {page_number}: header placed {placed} block(s)");
        }
        if !self.footer.is_empty() {
            let rect = footer_rect(&self.props, size.width, size.height);
            let placed = place_clipped(
                &self.footer,
                event.canvas(),
                to_top_down(rect, size.height),
            );
            log::debug!("page {page_number}: footer placed {placed} block(s)");
        }
    }
}

/// Draws `blocks` top-down inside `rect` with the rectangle as clip path.
/// Returns how many blocks were drawn.
fn place_clipped(blocks: &[Box<dyn Flowable>], canvas: &mut Canvas, rect: Rect) -> usize {
    if rect.is_empty() {
        return 0;
    }
    canvas.save_state();
    canvas.clip_rect(rect.x, rect.y, rect.width, rect.height);
    let mut frame = Frame::new(rect);
    let mut placed = 0;
    for block in blocks {
        if !frame.place_unchecked(block.as_ref(), canvas) {
            log::debug!(
                "{} block(s) below the region edge dropped, starting with {}",
                blocks.len() - placed,
                block.debug_name()
            );
            break;
        }
        placed += 1;
    }
    canvas.restore_state();
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::markup::HtmlRenderer;
    use crate::properties::PageType;
    use crate::types::Pt;

    fn props() -> DocumentProperties {
        DocumentProperties {
            header_height: 50.0,
            footer_height: 20.0,
            page_type: PageType::Letter,
            ..DocumentProperties::default()
        }
    }

    fn decorate(decorator: &mut PageDecorator) -> Vec<Command> {
        let size = PageType::Letter.size();
        let mut canvas = Canvas::new(size);
        let mut event = PageEvent::new(1, size, &mut canvas);
        decorator.on_end_page(&mut event);
        canvas.current_commands().to_vec()
    }

    fn texts(commands: &[Command]) -> Vec<(Pt, Pt, String)> {
        commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { x, y, text } => Some((*x, *y, text.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn header_and_footer_are_clipped_to_their_bands() {
        let mut decorator = PageDecorator::new(
            Some("<div>H</div>"),
            Some("<div>F</div>"),
            &HtmlRenderer,
            &ConverterOptions::default(),
            &props(),
        )
        .unwrap();
        let commands = decorate(&mut decorator);

        let clips: Vec<_> = commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::ClipRect {
                    x,
                    y,
                    width,
                    height,
                } => Some(Rect {
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                }),
                _ => None,
            })
            .collect();
        assert_eq!(
            clips,
            vec![
                Rect::new(37.0, 0.0, 538.0, 50.0),
                Rect::new(37.0, 772.0, 538.0, 20.0),
            ]
        );

        let drawn = texts(&commands);
        assert_eq!(drawn.len(), 2);
        assert_eq!(drawn[0].2, "H");
        assert_eq!(drawn[0].0, Pt::from_f32(37.0));
        assert_eq!(drawn[1].2, "F");
        assert!(drawn[1].1 >= Pt::from_f32(772.0));

        let saves = commands.iter().filter(|c| **c == Command::SaveState).count();
        let restores = commands.iter().filter(|c| **c == Command::RestoreState).count();
        assert_eq!((saves, restores), (2, 2));
    }

    #[test]
    fn bare_text_is_not_a_block_and_is_skipped() {
        let mut decorator = PageDecorator::new(
            Some("just text"),
            None,
            &HtmlRenderer,
            &ConverterOptions::default(),
            &props(),
        )
        .unwrap();
        assert!(!decorator.has_header());
        assert!(!decorator.has_footer());
        assert!(decorate(&mut decorator).is_empty());
    }

    #[test]
    fn blocks_past_the_band_are_dropped() {
        let markup = "<p>one</p><p>two</p><p>three</p><p>four</p><p>five</p>";
        let props = DocumentProperties {
            header_height: 20.0,
            ..props()
        };
        let mut decorator = PageDecorator::new(
            Some(markup),
            None,
            &HtmlRenderer,
            &ConverterOptions::default(),
            &props,
        )
        .unwrap();
        let drawn = texts(&decorate(&mut decorator));
        assert!(!drawn.is_empty());
        assert!(drawn.len() < 5);
        assert_eq!(drawn[0].2, "one");
    }
}
