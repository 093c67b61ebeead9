use crate::canvas::Canvas;
use crate::types::Size;

/// A page whose main content is complete and that is about to be committed.
///
/// Anything drawn through [`PageEvent::canvas`] lands on that page, after the
/// main content.
pub struct PageEvent<'a> {
    page_number: usize,
    page_size: Size,
    canvas: &'a mut Canvas,
}

impl<'a> PageEvent<'a> {
    pub fn new(page_number: usize, page_size: Size, canvas: &'a mut Canvas) -> Self {
        Self {
            page_number,
            page_size,
            canvas,
        }
    }

    /// 1-based.
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn canvas(&mut self) -> &mut Canvas {
        self.canvas
    }
}

/// Receives one `on_end_page` call per completed page, in page order.
pub trait PageEventHandler {
    fn on_end_page(&mut self, event: &mut PageEvent<'_>);
}

impl<F> PageEventHandler for F
where
    F: FnMut(&mut PageEvent<'_>),
{
    fn on_end_page(&mut self, event: &mut PageEvent<'_>) {
        self(event)
    }
}
