use crate::canvas::{Canvas, Document};
use crate::doc_context::{PageEvent, PageEventHandler};
use crate::error::{FolioError, Result};
use crate::flowable::{BreakAfter, BreakBefore, Flowable};
use crate::frame::{AddResult, Frame};
use crate::page_template::PageTemplate;
use std::collections::VecDeque;

/// Flows a story of blocks through page templates, raising the page-end
/// event once per completed page.
pub struct DocTemplate<'h> {
    page_templates: Vec<PageTemplate>,
    story: Vec<Box<dyn Flowable>>,
    handler: Option<&'h mut dyn PageEventHandler>,
}

fn select_template(page_templates: &[PageTemplate], page_number: usize) -> &PageTemplate {
    // Page n uses template n; the last template repeats.
    let idx = page_number
        .saturating_sub(1)
        .min(page_templates.len().saturating_sub(1));
    &page_templates[idx]
}

/// Last resort for a block that neither fits nor splits in an empty frame.
/// A shrinkable block is scaled into the frame; anything else is drawn
/// clipped to it.
fn place_oversized(
    frame: &mut Frame,
    flowable: Box<dyn Flowable>,
    canvas: &mut Canvas,
    details: &str,
) {
    let rect = frame.rect();
    if let Some(fitted) = flowable.shrink_to_fit(rect.width, rect.height) {
        if fitted.wrap(rect.width, rect.height).height <= rect.height {
            log::debug!("{details}; scaled down to the frame");
            frame.place_unchecked(fitted.as_ref(), canvas);
            return;
        }
    }
    log::warn!("{details}; drawing it clipped to the frame");
    canvas.save_state();
    canvas.clip_rect(rect.x, rect.y, rect.width, rect.height);
    frame.place_unchecked(flowable.as_ref(), canvas);
    canvas.restore_state();
}

impl<'h> DocTemplate<'h> {
    pub fn new(page_templates: Vec<PageTemplate>) -> Self {
        Self {
            page_templates,
            story: Vec::new(),
            handler: None,
        }
    }

    pub fn with_handler(mut self, handler: Option<&'h mut dyn PageEventHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn add_flowable(&mut self, flowable: Box<dyn Flowable>) {
        self.story.push(flowable);
    }

    pub fn build(self) -> Result<Document> {
        let DocTemplate {
            page_templates,
            story,
            mut handler,
        } = self;
        if page_templates.is_empty() {
            return Err(FolioError::Layout("no page template".to_string()));
        }

        let mut page_number = 1usize;
        let template = select_template(&page_templates, page_number);
        let mut canvas = Canvas::new(template.page_size);
        let mut frames = template.instantiate_frames();
        let mut frame_index = 0usize;
        let mut placed_on_page = false;

        let mut finish_page = |canvas: &mut Canvas, page_number: usize| {
            if let Some(handler) = handler.as_deref_mut() {
                let page_size = canvas.page_size();
                let mut event = PageEvent::new(page_number, page_size, canvas);
                handler.on_end_page(&mut event);
            }
            log::debug!(
                "page {page_number} finished with {} commands",
                canvas.current_commands().len()
            );
            canvas.show_page();
        };

        let next_page = |page_number: &mut usize,
                         frames: &mut Vec<Frame>,
                         frame_index: &mut usize,
                         placed_on_page: &mut bool| {
            *page_number += 1;
            *frames = select_template(&page_templates, *page_number).instantiate_frames();
            *frame_index = 0;
            *placed_on_page = false;
        };

        let mut story: VecDeque<Box<dyn Flowable>> = story.into_iter().collect();
        while let Some(flowable) = story.pop_front() {
            let mut current = flowable;
            let mut suppress_break_before = false;
            loop {
                let pagination = current.pagination();
                if !suppress_break_before
                    && pagination.break_before == BreakBefore::Page
                    && (placed_on_page || frame_index > 0)
                {
                    finish_page(&mut canvas, page_number);
                    next_page(&mut page_number, &mut frames, &mut frame_index, &mut placed_on_page);
                }

                if frame_index >= frames.len() {
                    finish_page(&mut canvas, page_number);
                    next_page(&mut page_number, &mut frames, &mut frame_index, &mut placed_on_page);
                }
                if frames.is_empty() {
                    return Err(FolioError::Layout("page template has no frames".to_string()));
                }

                let is_last_frame = frame_index + 1 >= frames.len();
                let frame_rect = frames[frame_index].rect();
                let unplaceable = (!placed_on_page && is_last_frame).then(|| {
                    let size = current.wrap(frame_rect.width, frame_rect.height);
                    format!(
                        "{} needs {}x{}pt, frame is {}x{}pt",
                        current.debug_name(),
                        size.width.to_f32(),
                        size.height.to_f32(),
                        frame_rect.width.to_f32(),
                        frame_rect.height.to_f32(),
                    )
                });

                let result = match (frames[frame_index].add(current, &mut canvas), unplaceable) {
                    (AddResult::Overflow(remaining), Some(details)) => {
                        place_oversized(&mut frames[frame_index], remaining, &mut canvas, &details);
                        AddResult::Placed
                    }
                    (other, _) => other,
                };
                match result {
                    AddResult::Placed => {
                        placed_on_page = true;
                        if pagination.break_after == BreakAfter::Page {
                            finish_page(&mut canvas, page_number);
                            next_page(
                                &mut page_number,
                                &mut frames,
                                &mut frame_index,
                                &mut placed_on_page,
                            );
                        }
                        break;
                    }
                    AddResult::Split(remaining) => {
                        placed_on_page = true;
                        suppress_break_before = true;
                        current = remaining;
                        frame_index += 1;
                    }
                    AddResult::Overflow(remaining) => {
                        current = remaining;
                        frame_index += 1;
                    }
                }
            }
        }

        if placed_on_page || !canvas.is_current_empty() || canvas.page_number() == 1 {
            finish_page(&mut canvas, page_number);
        }
        Ok(canvas.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::flowable::{ImageBlock, PageBreak, Spacer};
    use crate::resource::tests::tiny_png;
    use crate::resource::ImageData;
    use crate::types::{Pt, Rect, Size};
    use std::sync::Arc;

    fn template() -> PageTemplate {
        PageTemplate::new("body", Size::new(100.0, 100.0))
            .with_frame(Rect::new(10.0, 10.0, 80.0, 80.0))
    }

    fn spacer(height: f32) -> Box<dyn Flowable> {
        Box::new(Spacer::new(Pt::from_f32(height)))
    }

    #[test]
    fn page_end_fires_once_per_page_in_order() {
        let mut seen = Vec::new();
        let mut handler = |event: &mut PageEvent<'_>| seen.push(event.page_number());
        let mut doc = DocTemplate::new(vec![template()]).with_handler(Some(&mut handler));
        for _ in 0..5 {
            doc.add_flowable(spacer(30.0));
        }
        let document = doc.build().unwrap();
        assert_eq!(document.pages.len(), 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn empty_story_still_produces_one_page() {
        let mut count = 0;
        let mut handler = |_: &mut PageEvent<'_>| count += 1;
        let doc = DocTemplate::new(vec![template()]).with_handler(Some(&mut handler));
        assert_eq!(doc.build().unwrap().pages.len(), 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn forced_breaks_do_not_leave_trailing_pages() {
        let mut doc = DocTemplate::new(vec![template()]);
        doc.add_flowable(Box::new(PageBreak::before()));
        doc.add_flowable(spacer(10.0));
        doc.add_flowable(Box::new(PageBreak::before()));
        doc.add_flowable(spacer(10.0));
        doc.add_flowable(Box::new(PageBreak::after()));
        assert_eq!(doc.build().unwrap().pages.len(), 2);
    }

    #[test]
    fn blocks_taller_than_a_page_are_drawn_clipped_on_their_own_page() {
        let mut doc = DocTemplate::new(vec![template()]);
        doc.add_flowable(spacer(10.0));
        doc.add_flowable(spacer(500.0));
        doc.add_flowable(spacer(10.0));
        let document = doc.build().unwrap();
        assert_eq!(document.pages.len(), 3);
        let clip = Command::ClipRect {
            x: Pt::from_f32(10.0),
            y: Pt::from_f32(10.0),
            width: Pt::from_f32(80.0),
            height: Pt::from_f32(80.0),
        };
        assert!(!document.pages[0].commands.contains(&clip));
        assert_eq!(
            document.pages[1].commands,
            vec![Command::SaveState, clip, Command::RestoreState]
        );
    }

    #[test]
    fn tall_images_shrink_into_an_empty_frame() {
        let image = Arc::new(ImageData::decode(&tiny_png(), None).unwrap());
        let mut doc = DocTemplate::new(vec![template()]);
        doc.add_flowable(spacer(10.0));
        doc.add_flowable(Box::new(ImageBlock::new(
            image,
            Some(Pt::from_f32(40.0)),
            Some(Pt::from_f32(160.0)),
        )));
        let document = doc.build().unwrap();
        assert_eq!(document.pages.len(), 2);
        let drawn = document.pages[1].commands.iter().find_map(|cmd| match cmd {
            Command::DrawImage { width, height, .. } => Some((*width, *height)),
            _ => None,
        });
        assert_eq!(drawn, Some((Pt::from_f32(20.0), Pt::from_f32(80.0))));
        assert!(!document.pages[1]
            .commands
            .iter()
            .any(|cmd| matches!(cmd, Command::ClipRect { .. })));
    }
}
