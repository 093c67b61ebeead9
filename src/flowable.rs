use crate::canvas::Canvas;
use crate::font::FontSet;
use crate::resource::ImageData;
use crate::types::{Color, Pt, Size};
use std::sync::Arc;

fn huge_pt() -> Pt {
    Pt::from_i32(1_000_000)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakBefore {
    Auto,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAfter {
    Auto,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakInside {
    Auto,
    Avoid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    pub break_before: BreakBefore,
    pub break_after: BreakAfter,
    pub break_inside: BreakInside,
    pub orphans: usize,
    pub widows: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            break_before: BreakBefore::Auto,
            break_after: BreakAfter::Auto,
            break_inside: BreakInside::Auto,
            orphans: 2,
            widows: 2,
        }
    }
}

/// A block that can be measured, split across frames and drawn.
///
/// `x`/`y` passed to `draw` are the top-left corner of the block in the
/// canvas' top-down coordinate space.
pub trait Flowable: FlowableClone + Send + Sync {
    fn wrap(&self, avail_width: Pt, avail_height: Pt) -> Size;
    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)>;
    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, avail_height: Pt);

    fn pagination(&self) -> Pagination {
        Pagination::default()
    }

    /// A copy scaled down to fit `avail_width` x `avail_height`, for blocks
    /// that can neither split nor fit an empty frame.
    fn shrink_to_fit(&self, _avail_width: Pt, _avail_height: Pt) -> Option<Box<dyn Flowable>> {
        None
    }

    fn debug_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub trait FlowableClone {
    fn clone_box(&self) -> Box<dyn Flowable>;
}

impl<T> FlowableClone for T
where
    T: 'static + Flowable + Clone,
{
    fn clone_box(&self) -> Box<dyn Flowable> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Flowable> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl std::fmt::Debug for dyn Flowable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.debug_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Concrete face: a loaded font's name or a base-14 name.
    pub font_name: Arc<str>,
    pub font_size: Pt,
    /// `None` means the font's natural line height.
    pub line_height: Option<Pt>,
    pub color: Color,
    pub underline: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_name: Arc::<str>::from("Helvetica"),
            font_size: Pt::from_f32(12.0),
            line_height: None,
            color: Color::BLACK,
            underline: false,
        }
    }
}

impl TextStyle {
    fn resolved_line_height(&self, fonts: &FontSet) -> Pt {
        match self.line_height {
            Some(value) => value,
            None => fonts.line_height(
                &self.font_name,
                self.font_size,
                self.font_size.mul_ratio(6, 5),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: TextStyle,
}

impl TextRun {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    run: usize,
    width: Pt,
}

#[derive(Debug, Clone, Default)]
struct Line {
    fragments: Vec<Fragment>,
    width: Pt,
}

impl Line {
    fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn push(&mut self, fragment: Fragment) {
        self.width += fragment.width;
        if let Some(last) = self.fragments.last_mut() {
            if last.run == fragment.run {
                last.text.push_str(&fragment.text);
                last.width += fragment.width;
                return;
            }
        }
        self.fragments.push(fragment);
    }
}

enum Token<'a> {
    Word(&'a str, usize),
    Space(usize),
    Break,
}

/// Rich text: a sequence of styled runs broken into lines.
#[derive(Debug, Clone)]
pub struct Paragraph {
    runs: Vec<TextRun>,
    base: TextStyle,
    align: TextAlign,
    pagination: Pagination,
    preserve_whitespace: bool,
    indent: Pt,
    background: Option<Color>,
    fonts: Arc<FontSet>,
}

impl Paragraph {
    pub fn new(runs: Vec<TextRun>, base: TextStyle, fonts: Arc<FontSet>) -> Self {
        Self {
            runs,
            base,
            align: TextAlign::Left,
            pagination: Pagination::default(),
            preserve_whitespace: false,
            indent: Pt::ZERO,
            background: None,
            fonts,
        }
    }

    pub fn plain(text: impl Into<String>, style: TextStyle, fonts: Arc<FontSet>) -> Self {
        let run = TextRun::new(text, style.clone());
        Self::new(vec![run], style, fonts)
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Keeps spaces and line breaks as written and never wraps.
    pub fn with_preserved_whitespace(mut self, preserve: bool) -> Self {
        self.preserve_whitespace = preserve;
        self
    }

    pub fn with_indent(mut self, indent: Pt) -> Self {
        self.indent = indent.max(Pt::ZERO);
        self
    }

    pub fn with_background(mut self, background: Option<Color>) -> Self {
        self.background = background;
        self
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Text of all runs concatenated.
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn is_blank(&self) -> bool {
        self.runs.iter().all(|run| run.text.trim().is_empty())
    }

    /// Width of the widest line when nothing wraps.
    pub fn natural_width(&self) -> Pt {
        self.layout_lines(huge_pt())
            .iter()
            .fold(Pt::ZERO, |acc, line| acc.max(line.width))
            + self.indent
    }

    fn measure(&self, run: usize, text: &str) -> Pt {
        let style = &self.runs[run].style;
        self.fonts
            .measure_text_width(&style.font_name, style.font_size, text)
    }

    fn tokens(&self) -> Vec<Token<'_>> {
        let mut tokens = Vec::new();
        for (index, run) in self.runs.iter().enumerate() {
            if self.preserve_whitespace {
                for (n, segment) in run.text.split('\n').enumerate() {
                    if n > 0 {
                        tokens.push(Token::Break);
                    }
                    if !segment.is_empty() {
                        tokens.push(Token::Word(segment, index));
                    }
                }
                continue;
            }
            let text = run.text.as_str();
            let mut start = None;
            for (pos, ch) in text.char_indices() {
                if ch.is_whitespace() {
                    if let Some(begin) = start.take() {
                        tokens.push(Token::Word(&text[begin..pos], index));
                    }
                    tokens.push(if ch == '\n' {
                        Token::Break
                    } else {
                        Token::Space(index)
                    });
                } else if start.is_none() {
                    start = Some(pos);
                }
            }
            if let Some(begin) = start {
                tokens.push(Token::Word(&text[begin..], index));
            }
        }
        tokens
    }

    fn layout_lines(&self, avail_width: Pt) -> Vec<Line> {
        let max_width = (avail_width - self.indent).max(Pt::from_f32(1.0));
        let mut lines = Vec::new();
        let mut line = Line::default();
        let mut group: Vec<(&str, usize)> = Vec::new();
        let mut pending_space: Option<usize> = None;

        for token in self.tokens() {
            match token {
                Token::Word(text, run) => group.push((text, run)),
                Token::Space(run) => {
                    self.place_group(&mut lines, &mut line, &mut group, &mut pending_space, max_width);
                    if !line.is_empty() && pending_space.is_none() {
                        pending_space = Some(run);
                    }
                }
                Token::Break => {
                    self.place_group(&mut lines, &mut line, &mut group, &mut pending_space, max_width);
                    lines.push(std::mem::take(&mut line));
                    pending_space = None;
                }
            }
        }
        self.place_group(&mut lines, &mut line, &mut group, &mut pending_space, max_width);
        if !line.is_empty() || lines.is_empty() {
            lines.push(line);
        }
        lines
    }

    // Places a run of glued words (no breaking space between them) on the
    // current line, wrapping before it when it does not fit.
    fn place_group(
        &self,
        lines: &mut Vec<Line>,
        line: &mut Line,
        group: &mut Vec<(&str, usize)>,
        pending_space: &mut Option<usize>,
        max_width: Pt,
    ) {
        if group.is_empty() {
            return;
        }
        let parts: Vec<Fragment> = group
            .drain(..)
            .map(|(text, run)| Fragment {
                text: text.to_string(),
                run,
                width: self.measure(run, text),
            })
            .collect();
        let group_width: Pt = parts.iter().map(|part| part.width).sum();
        let space = pending_space.take().map(|run| Fragment {
            text: " ".to_string(),
            run,
            width: self.measure(run, " "),
        });
        let space_width = space.as_ref().map(|s| s.width).unwrap_or(Pt::ZERO);

        let wraps = !self.preserve_whitespace;
        if wraps && !line.is_empty() && line.width + space_width + group_width > max_width {
            lines.push(std::mem::take(line));
        } else if let Some(space) = space {
            if !line.is_empty() {
                line.push(space);
            }
        }

        if wraps && group_width > max_width {
            for part in parts {
                for ch in part.text.chars() {
                    let mut buf = [0u8; 4];
                    let text = ch.encode_utf8(&mut buf);
                    let width = self.measure(part.run, text);
                    if !line.is_empty() && line.width + width > max_width {
                        lines.push(std::mem::take(line));
                    }
                    line.push(Fragment {
                        text: text.to_string(),
                        run: part.run,
                        width,
                    });
                }
            }
        } else {
            for part in parts {
                line.push(part);
            }
        }
    }

    fn line_metrics(&self, line: &Line) -> (Pt, Pt) {
        if line.is_empty() {
            return (
                self.base.resolved_line_height(&self.fonts),
                self.base.font_size,
            );
        }
        line.fragments.iter().fold((Pt::ZERO, Pt::ZERO), |(lh, size), fragment| {
            let style = &self.runs[fragment.run].style;
            (
                lh.max(style.resolved_line_height(&self.fonts)),
                size.max(style.font_size),
            )
        })
    }

    fn from_lines(&self, lines: &[Line], pagination: Pagination) -> Paragraph {
        let mut runs: Vec<TextRun> = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                let style = runs
                    .last()
                    .map(|run| run.style.clone())
                    .unwrap_or_else(|| self.base.clone());
                runs.push(TextRun::new("\n", style));
            }
            for fragment in &line.fragments {
                runs.push(TextRun::new(
                    fragment.text.clone(),
                    self.runs[fragment.run].style.clone(),
                ));
            }
        }
        Paragraph {
            runs,
            pagination,
            ..self.clone()
        }
    }
}

impl Flowable for Paragraph {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let height = self
            .layout_lines(avail_width)
            .iter()
            .map(|line| self.line_metrics(line).0)
            .sum();
        Size {
            width: avail_width,
            height,
        }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        if self.pagination.break_inside == BreakInside::Avoid {
            return None;
        }
        let lines = self.layout_lines(avail_width);
        let total = lines.len();
        let mut used = Pt::ZERO;
        let mut max_lines = 0usize;
        for line in &lines {
            let (line_height, _) = self.line_metrics(line);
            if used + line_height > avail_height {
                break;
            }
            used += line_height;
            max_lines += 1;
        }
        if max_lines == 0 || max_lines >= total {
            return None;
        }

        let orphans = self.pagination.orphans.max(1);
        let widows = self.pagination.widows.max(1);
        let mut split_at = max_lines;
        if total - split_at < widows {
            split_at = total.saturating_sub(widows);
        }
        if split_at < orphans {
            // Keeping both ends intact is impossible here; break at the
            // frame edge rather than stall.
            split_at = max_lines.min(total - 1);
        }

        let first = self.from_lines(
            &lines[..split_at],
            Pagination {
                break_after: BreakAfter::Auto,
                ..self.pagination
            },
        );
        let second = self.from_lines(
            &lines[split_at..],
            Pagination {
                break_before: BreakBefore::Auto,
                ..self.pagination
            },
        );
        Some((Box::new(first), Box::new(second)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let lines = self.layout_lines(avail_width);
        if let Some(background) = self.background {
            let height: Pt = lines.iter().map(|line| self.line_metrics(line).0).sum();
            canvas.set_fill_color(background);
            canvas.draw_rect(x, y, avail_width, height);
        }

        let text_width = (avail_width - self.indent).max(Pt::ZERO);
        let mut cursor_y = y;
        for line in &lines {
            let (line_height, max_size) = self.line_metrics(line);
            let offset = match self.align {
                TextAlign::Left => Pt::ZERO,
                TextAlign::Center => (text_width - line.width).max(Pt::ZERO).mul_ratio(1, 2),
                TextAlign::Right => (text_width - line.width).max(Pt::ZERO),
            };
            let mut cursor_x = x + self.indent + offset;
            for fragment in &line.fragments {
                let style = &self.runs[fragment.run].style;
                if !fragment.text.trim().is_empty() {
                    let top = cursor_y + max_size - style.font_size;
                    canvas.set_fill_color(style.color);
                    canvas.set_font_name(&style.font_name);
                    canvas.set_font_size(style.font_size);
                    canvas.draw_string(cursor_x, top, fragment.text.clone());
                }
                if style.underline {
                    let baseline = cursor_y + max_size + style.font_size.mul_ratio(1, 8);
                    canvas.set_stroke_color(style.color);
                    canvas.set_line_width(style.font_size.mul_ratio(1, 16));
                    canvas.move_to(cursor_x, baseline);
                    canvas.line_to(cursor_x + fragment.width, baseline);
                    canvas.stroke();
                }
                cursor_x += fragment.width;
            }
            cursor_y += line_height;
        }
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }
}

/// Blocks stacked vertically; the body of list items, table cells and
/// indented or shaded block containers.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    children: Vec<Box<dyn Flowable>>,
    indent: Pt,
    background: Option<Color>,
    pagination: Pagination,
}

impl Stack {
    pub fn new(children: Vec<Box<dyn Flowable>>) -> Self {
        Self {
            children,
            indent: Pt::ZERO,
            background: None,
            pagination: Pagination::default(),
        }
    }

    pub fn with_indent(mut self, indent: Pt) -> Self {
        self.indent = indent.max(Pt::ZERO);
        self
    }

    pub fn with_background(mut self, background: Option<Color>) -> Self {
        self.background = background;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn inner_width(&self, avail_width: Pt) -> Pt {
        (avail_width - self.indent).max(Pt::from_f32(1.0))
    }

    fn with_children(&self, children: Vec<Box<dyn Flowable>>, pagination: Pagination) -> Stack {
        Stack {
            children,
            indent: self.indent,
            background: self.background,
            pagination,
        }
    }
}

impl Flowable for Stack {
    fn wrap(&self, avail_width: Pt, avail_height: Pt) -> Size {
        let inner = self.inner_width(avail_width);
        let height = self
            .children
            .iter()
            .map(|child| child.wrap(inner, avail_height).height)
            .sum();
        Size {
            width: avail_width,
            height,
        }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        if self.pagination.break_inside == BreakInside::Avoid {
            return None;
        }
        let inner = self.inner_width(avail_width);
        let mut used = Pt::ZERO;
        for (index, child) in self.children.iter().enumerate() {
            let height = child.wrap(inner, avail_height - used).height;
            if used + height <= avail_height {
                used += height;
                continue;
            }
            let mut head: Vec<Box<dyn Flowable>> = self.children[..index].to_vec();
            let mut tail: Vec<Box<dyn Flowable>> = Vec::new();
            match child.split(inner, avail_height - used) {
                Some((first, second)) => {
                    head.push(first);
                    tail.push(second);
                }
                None => tail.push(child.clone()),
            }
            if head.is_empty() {
                return None;
            }
            tail.extend(self.children[index + 1..].iter().cloned());
            let first = self.with_children(
                head,
                Pagination {
                    break_after: BreakAfter::Auto,
                    ..self.pagination
                },
            );
            let second = self.with_children(
                tail,
                Pagination {
                    break_before: BreakBefore::Auto,
                    ..self.pagination
                },
            );
            return Some((Box::new(first), Box::new(second)));
        }
        None
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, avail_height: Pt) {
        let inner = self.inner_width(avail_width);
        if let Some(background) = self.background {
            let height = self.wrap(avail_width, avail_height).height;
            canvas.set_fill_color(background);
            canvas.draw_rect(x, y, avail_width, height);
        }
        let mut cursor_y = y;
        for child in &self.children {
            let remaining = (avail_height - (cursor_y - y)).max(Pt::ZERO);
            let size = child.wrap(inner, remaining);
            child.draw(canvas, x + self.indent, cursor_y, inner, remaining);
            cursor_y += size.height;
        }
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }
}

/// A marker (bullet or number) beside a body.
#[derive(Debug, Clone)]
pub struct ListItem {
    label: Option<Paragraph>,
    body: Stack,
    label_width: Pt,
    gap: Pt,
    pagination: Pagination,
}

impl ListItem {
    pub fn new(label: Paragraph, body: Stack, label_width: Pt, gap: Pt) -> Self {
        let label_width = label_width.max(label.natural_width());
        Self {
            label: Some(label),
            body,
            label_width,
            gap,
            pagination: Pagination::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    fn body_width(&self, avail_width: Pt) -> Pt {
        (avail_width - self.label_width - self.gap).max(Pt::from_f32(1.0))
    }
}

impl Flowable for ListItem {
    fn wrap(&self, avail_width: Pt, avail_height: Pt) -> Size {
        let label_height = self
            .label
            .as_ref()
            .map(|label| label.wrap(self.label_width, huge_pt()).height)
            .unwrap_or(Pt::ZERO);
        let body = self.body.wrap(self.body_width(avail_width), avail_height);
        Size {
            width: avail_width,
            height: label_height.max(body.height),
        }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let (first, second) = self.body.split(self.body_width(avail_width), avail_height)?;
        let head = ListItem {
            label: self.label.clone(),
            body: Stack::new(vec![first]),
            pagination: Pagination {
                break_after: BreakAfter::Auto,
                ..self.pagination
            },
            ..self.clone()
        };
        let tail = ListItem {
            label: None,
            body: Stack::new(vec![second]),
            pagination: Pagination {
                break_before: BreakBefore::Auto,
                ..self.pagination
            },
            ..self.clone()
        };
        Some((Box::new(head), Box::new(tail)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, avail_height: Pt) {
        if let Some(label) = &self.label {
            label.draw(canvas, x, y, self.label_width, avail_height);
        }
        self.body.draw(
            canvas,
            x + self.label_width + self.gap,
            y,
            self.body_width(avail_width),
            avail_height,
        );
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }
}

/// One table row with equal-width cells. A row moves whole to the next frame
/// when it fits there; a row taller than a frame splits every cell at the
/// same height.
#[derive(Debug, Clone)]
pub struct TableRow {
    cells: Vec<Stack>,
    columns: usize,
    padding: Pt,
    border: Option<Color>,
    background: Option<Color>,
    pagination: Pagination,
}

impl TableRow {
    pub fn new(cells: Vec<Stack>, columns: usize) -> Self {
        let columns = columns.max(cells.len()).max(1);
        Self {
            cells,
            columns,
            padding: Pt::from_f32(2.0),
            border: None,
            background: None,
            pagination: Pagination {
                break_inside: BreakInside::Avoid,
                ..Pagination::default()
            },
        }
    }

    pub fn with_border(mut self, border: Option<Color>) -> Self {
        self.border = border;
        self
    }

    pub fn with_background(mut self, background: Option<Color>) -> Self {
        self.background = background;
        self
    }

    pub fn with_padding(mut self, padding: Pt) -> Self {
        self.padding = padding.max(Pt::ZERO);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Pagination {
            break_inside: BreakInside::Avoid,
            ..pagination
        };
        self
    }

    fn column_width(&self, avail_width: Pt) -> Pt {
        avail_width.mul_ratio(1, self.columns as i32)
    }

    fn inner_width(&self, avail_width: Pt) -> Pt {
        (self.column_width(avail_width) - self.padding * 2).max(Pt::from_f32(1.0))
    }
}

impl Flowable for TableRow {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let inner = self.inner_width(avail_width);
        let content = self
            .cells
            .iter()
            .map(|cell| cell.wrap(inner, huge_pt()).height)
            .fold(Pt::ZERO, Pt::max);
        Size {
            width: avail_width,
            height: content + self.padding * 2,
        }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let inner = self.inner_width(avail_width);
        let cell_height = avail_height - self.padding * 2;
        if cell_height <= Pt::ZERO {
            return None;
        }
        let mut head = Vec::with_capacity(self.cells.len());
        let mut tail = Vec::with_capacity(self.cells.len());
        let mut progressed = false;
        for cell in &self.cells {
            if cell.wrap(inner, huge_pt()).height <= cell_height {
                progressed |= !cell.is_empty();
                head.push(cell.clone());
                tail.push(cell.with_children(Vec::new(), cell.pagination));
                continue;
            }
            match cell.split(inner, cell_height) {
                Some((first, second)) => {
                    progressed = true;
                    head.push(Stack::new(vec![first]));
                    tail.push(Stack::new(vec![second]));
                }
                None => {
                    head.push(cell.with_children(Vec::new(), cell.pagination));
                    tail.push(cell.clone());
                }
            }
        }
        if !progressed {
            return None;
        }
        let first = TableRow {
            cells: head,
            pagination: Pagination {
                break_after: BreakAfter::Auto,
                ..self.pagination
            },
            ..self.clone()
        };
        let second = TableRow {
            cells: tail,
            pagination: Pagination {
                break_before: BreakBefore::Auto,
                ..self.pagination
            },
            ..self.clone()
        };
        Some((Box::new(first), Box::new(second)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let height = self.wrap(avail_width, huge_pt()).height;
        let column = self.column_width(avail_width);
        let inner = self.inner_width(avail_width);
        if let Some(background) = self.background {
            canvas.set_fill_color(background);
            canvas.draw_rect(x, y, avail_width, height);
        }
        for (index, cell) in self.cells.iter().enumerate() {
            let cell_x = x + column * index as i32;
            cell.draw(
                canvas,
                cell_x + self.padding,
                y + self.padding,
                inner,
                height - self.padding * 2,
            );
        }
        if let Some(border) = self.border {
            canvas.set_stroke_color(border);
            canvas.set_line_width(Pt::from_f32(0.5));
            canvas.move_to(x, y);
            canvas.line_to(x + avail_width, y);
            canvas.line_to(x + avail_width, y + height);
            canvas.line_to(x, y + height);
            canvas.line_to(x, y);
            for index in 1..self.columns {
                let line_x = x + column * index as i32;
                canvas.move_to(line_x, y);
                canvas.line_to(line_x, y + height);
            }
            canvas.stroke();
        }
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }
}

/// Horizontal rule across the full width.
#[derive(Debug, Clone)]
pub struct Rule {
    thickness: Pt,
    color: Color,
    spacing: Pt,
    pagination: Pagination,
}

impl Rule {
    pub fn new(thickness: Pt, color: Color, spacing: Pt) -> Self {
        Self {
            thickness,
            color,
            spacing,
            pagination: Pagination::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

impl Flowable for Rule {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: avail_width,
            height: self.spacing * 2 + self.thickness,
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        canvas.set_fill_color(self.color);
        canvas.draw_rect(x, y + self.spacing, avail_width, self.thickness);
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }
}

#[derive(Debug, Clone)]
pub struct Spacer {
    height: Pt,
    pagination: Pagination,
}

impl Spacer {
    pub fn new(height: Pt) -> Self {
        Self {
            height,
            pagination: Pagination::default(),
        }
    }
}

impl Flowable for Spacer {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: avail_width,
            height: self.height.max(Pt::ZERO),
        }
    }

    // A spacer that does not fit is simply dropped at the frame edge.
    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, _canvas: &mut Canvas, _x: Pt, _y: Pt, _avail_width: Pt, _avail_height: Pt) {}

    fn pagination(&self) -> Pagination {
        self.pagination
    }
}

/// Zero-height marker carrying a forced page break.
#[derive(Debug, Clone)]
pub struct PageBreak {
    pagination: Pagination,
}

impl PageBreak {
    pub fn before() -> Self {
        Self {
            pagination: Pagination {
                break_before: BreakBefore::Page,
                ..Pagination::default()
            },
        }
    }

    pub fn after() -> Self {
        Self {
            pagination: Pagination {
                break_after: BreakAfter::Page,
                ..Pagination::default()
            },
        }
    }
}

impl Flowable for PageBreak {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: avail_width,
            height: Pt::ZERO,
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, _canvas: &mut Canvas, _x: Pt, _y: Pt, _avail_width: Pt, _avail_height: Pt) {}

    fn pagination(&self) -> Pagination {
        self.pagination
    }
}

/// A raster image, scaled down to the available width when wider. An image
/// taller than an empty frame is shrunk to the frame height instead.
#[derive(Debug, Clone)]
pub struct ImageBlock {
    image: Arc<ImageData>,
    width: Pt,
    height: Pt,
    align: TextAlign,
    pagination: Pagination,
}

impl ImageBlock {
    /// Missing dimensions come from the pixel size (one CSS pixel is 0.75pt)
    /// or keep the aspect ratio when only one is given.
    pub fn new(image: Arc<ImageData>, width: Option<Pt>, height: Option<Pt>) -> Self {
        let natural_w = Pt::from_f32(image.width as f32 * 0.75);
        let natural_h = Pt::from_f32(image.height as f32 * 0.75);
        let ratio = |value: Pt, num: u32, denom: u32| {
            if denom == 0 {
                value
            } else {
                value.mul_ratio(num as i32, denom as i32)
            }
        };
        let (width, height) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, ratio(w, image.height, image.width)),
            (None, Some(h)) => (ratio(h, image.width, image.height), h),
            (None, None) => (natural_w, natural_h),
        };
        Self {
            image,
            width,
            height,
            align: TextAlign::Left,
            pagination: Pagination::default(),
        }
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    fn fitted(&self, avail_width: Pt) -> Size {
        if self.width <= avail_width || self.width <= Pt::ZERO {
            return Size {
                width: self.width,
                height: self.height,
            };
        }
        let scale_milli = (avail_width.to_milli() * 1000 / self.width.to_milli().max(1)) as i32;
        Size {
            width: avail_width,
            height: self.height.mul_ratio(scale_milli, 1000),
        }
    }
}

impl Flowable for ImageBlock {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: avail_width,
            height: self.fitted(avail_width).height,
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let size = self.fitted(avail_width);
        let offset = match self.align {
            TextAlign::Left => Pt::ZERO,
            TextAlign::Center => (avail_width - size.width).max(Pt::ZERO).mul_ratio(1, 2),
            TextAlign::Right => (avail_width - size.width).max(Pt::ZERO),
        };
        canvas.draw_image(x + offset, y, size.width, size.height, &self.image);
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }

    fn shrink_to_fit(&self, avail_width: Pt, avail_height: Pt) -> Option<Box<dyn Flowable>> {
        let size = self.fitted(avail_width);
        if size.height <= avail_height || avail_height <= Pt::ZERO {
            return None;
        }
        let scale_milli = (avail_height.to_milli() * 1000 / size.height.to_milli().max(1)) as i32;
        Some(Box::new(ImageBlock {
            width: size.width.mul_ratio(scale_milli, 1000).min(avail_width),
            height: avail_height,
            ..self.clone()
        }))
    }
}
