use crate::canvas::Canvas;
use crate::flowable::{BreakInside, Flowable};
use crate::types::{Pt, Rect};

pub enum AddResult {
    Placed,
    Split(Box<dyn Flowable>),
    Overflow(Box<dyn Flowable>),
}

/// A rectangle (top-down coordinates) filled from the top with a cursor.
pub struct Frame {
    rect: Rect,
    cursor_y: Pt,
}

impl Frame {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            cursor_y: Pt::ZERO,
        }
    }

    pub fn remaining_height(&self) -> Pt {
        (self.rect.height - self.cursor_y).max(Pt::ZERO)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.cursor_y <= Pt::ZERO
    }

    pub fn add(&mut self, flowable: Box<dyn Flowable>, canvas: &mut Canvas) -> AddResult {
        let avail_width = self.rect.width;
        let avail_height = self.remaining_height();
        let size = flowable.wrap(avail_width, avail_height);

        if size.height <= avail_height {
            self.draw_at_cursor(flowable.as_ref(), canvas, size.height);
            return AddResult::Placed;
        }
        if avail_height <= Pt::ZERO {
            return AddResult::Overflow(flowable);
        }

        // Move unbreakable blocks that would fit on a fresh frame.
        if flowable.pagination().break_inside == BreakInside::Avoid
            && size.height <= self.rect.height
            && !self.is_empty()
        {
            return AddResult::Overflow(flowable);
        }

        if let Some((first, second)) = flowable.split(avail_width, avail_height) {
            let first_height = first.wrap(avail_width, avail_height).height;
            if first_height > Pt::ZERO && first_height <= avail_height {
                self.draw_at_cursor(first.as_ref(), canvas, first_height);
                return AddResult::Split(second);
            }
        }

        AddResult::Overflow(flowable)
    }

    /// Draws the block at the cursor whatever its height, leaving clipping to
    /// the caller. Returns `false` without drawing once the cursor has reached
    /// the bottom edge.
    pub fn place_unchecked(&mut self, flowable: &dyn Flowable, canvas: &mut Canvas) -> bool {
        let avail_height = self.remaining_height();
        if avail_height <= Pt::ZERO {
            return false;
        }
        let height = flowable.wrap(self.rect.width, avail_height).height;
        self.draw_at_cursor(flowable, canvas, height);
        true
    }

    fn draw_at_cursor(&mut self, flowable: &dyn Flowable, canvas: &mut Canvas, height: Pt) {
        flowable.draw(
            canvas,
            self.rect.x,
            self.rect.y + self.cursor_y,
            self.rect.width,
            self.remaining_height(),
        );
        self.cursor_y += height;
    }
}
