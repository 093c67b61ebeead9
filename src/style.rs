//! Stylesheet parsing and a small cascade.
//!
//! `lightningcss` does the tokenising and parsing; declarations are then read
//! back by property name and printed value, so shorthands and properties the
//! parser does not model (`size`, `page-break-*`) go through one path.
//! Selectors are limited to compound type/class/id selectors joined by the
//! descendant or child combinator; rules using anything else are skipped.

use crate::flowable::{TextAlign, TextStyle};
use crate::font::FontSet;
use crate::types::{Color, Margins, Pt, Size};
use lightningcss::declaration::DeclarationBlock;
use lightningcss::properties::Property;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleAttribute, StyleSheet};
use lightningcss::traits::ToCss;
use std::sync::Arc;

const DEFAULT_UA_CSS: &str = r#"
head, script, style, title, meta, link, template { display: none; }
html, body, div, p, section, article, header, footer, main, nav, aside,
h1, h2, h3, h4, h5, h6, blockquote, pre, ul, ol, address, figure, form { display: block; }
li { display: list-item; }
table { display: table; }
tr { display: table-row; }
td, th { display: table-cell; }
hr { display: block; margin-top: 6pt; margin-bottom: 6pt; }
img { display: inline; }
p { margin-top: 0; margin-bottom: 8pt; }
h1 { font-size: 2em; font-weight: bold; margin-top: 10pt; margin-bottom: 8pt; }
h2 { font-size: 1.5em; font-weight: bold; margin-top: 9pt; margin-bottom: 7pt; }
h3 { font-size: 1.17em; font-weight: bold; margin-top: 8pt; margin-bottom: 6pt; }
h4 { font-size: 1em; font-weight: bold; margin-top: 8pt; margin-bottom: 6pt; }
h5 { font-size: 0.83em; font-weight: bold; margin-top: 8pt; margin-bottom: 6pt; }
h6 { font-size: 0.67em; font-weight: bold; margin-top: 8pt; margin-bottom: 6pt; }
b, strong, th { font-weight: bold; }
i, em, cite, var { font-style: italic; }
u, ins, a { text-decoration: underline; }
a { color: #0000ee; }
small { font-size: smaller; }
big { font-size: larger; }
pre, code, kbd, samp, tt { font-family: monospace; }
pre { white-space: pre; margin-top: 0; margin-bottom: 8pt; }
blockquote { padding-left: 24pt; margin-top: 6pt; margin-bottom: 6pt; }
ul, ol { margin-top: 0; margin-bottom: 8pt; }
ul { list-style-type: disc; }
ol { list-style-type: decimal; }
center { text-align: center; }
"#;

const ROOT_FONT_SIZE: f32 = 12.0;

#[derive(Debug, Clone, PartialEq)]
struct Declaration {
    name: String,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Specificity(u16, u16, u16);

#[derive(Debug, Clone, Default)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl SimpleSelector {
    fn matches(&self, element: &ElementInfo) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && tag != &element.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|class| element.classes.iter().any(|c| c == class))
    }

    fn specificity(&self) -> Specificity {
        let tag = self
            .tag
            .as_ref()
            .filter(|tag| tag.as_str() != "*")
            .map(|_| 1)
            .unwrap_or(0);
        Specificity(
            u16::from(self.id.is_some()),
            self.classes.len() as u16,
            tag,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone)]
struct SelectorPattern {
    parts: Vec<SimpleSelector>,
    combinators: Vec<Combinator>,
}

impl SelectorPattern {
    /// `ancestors` run from the root down to the element's parent.
    fn matches(&self, element: &ElementInfo, ancestors: &[ElementInfo]) -> bool {
        let Some((last, rest)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(element) {
            return false;
        }
        let mut remaining = ancestors;
        for (part, combinator) in rest.iter().rev().zip(self.combinators.iter().rev()) {
            match combinator {
                Combinator::Child => {
                    let Some((parent, above)) = remaining.split_last() else {
                        return false;
                    };
                    if !part.matches(parent) {
                        return false;
                    }
                    remaining = above;
                }
                Combinator::Descendant => {
                    let Some(index) = remaining.iter().rposition(|a| part.matches(a)) else {
                        return false;
                    };
                    remaining = &remaining[..index];
                }
            }
        }
        true
    }

    fn specificity(&self) -> Specificity {
        self.parts
            .iter()
            .map(SimpleSelector::specificity)
            .fold(Specificity(0, 0, 0), |acc, s| {
                Specificity(acc.0 + s.0, acc.1 + s.1, acc.2 + s.2)
            })
    }
}

#[derive(Debug, Clone)]
struct RuleEntry {
    selector: SelectorPattern,
    specificity: Specificity,
    order: usize,
    declarations: Arc<Vec<Declaration>>,
}

/// What selectors can see of an element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl ElementInfo {
    pub fn new(tag: &str, id: Option<&str>, class_attr: Option<&str>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            id: id.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string),
            classes: class_attr
                .map(|value| value.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Inline,
    Block,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStyle {
    #[default]
    Disc,
    Circle,
    Square,
    Decimal,
    LowerAlpha,
    UpperAlpha,
    None,
}

impl ListStyle {
    /// Marker text for the `index`-th (1-based) item.
    pub fn marker(self, index: usize) -> Option<String> {
        let letter = |base: u8| {
            let offset = ((index.max(1) - 1) % 26) as u8;
            format!("{}.", (base + offset) as char)
        };
        match self {
            ListStyle::Disc => Some("\u{2022}".to_string()),
            ListStyle::Circle => Some("o".to_string()),
            ListStyle::Square => Some("-".to_string()),
            ListStyle::Decimal => Some(format!("{index}.")),
            ListStyle::LowerAlpha => Some(letter(b'a')),
            ListStyle::UpperAlpha => Some(letter(b'A')),
            ListStyle::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LineHeight {
    #[default]
    Normal,
    Factor(f32),
    Absolute(Pt),
}

/// Resolved style of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub font_family: Vec<String>,
    pub font_size: Pt,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: LineHeight,
    pub underline: bool,
    pub preserve_whitespace: bool,
    pub list_style: ListStyle,
    pub display: Display,
    pub background: Option<Color>,
    pub margin_top: Pt,
    pub margin_bottom: Pt,
    pub padding_left: Pt,
    pub break_before: bool,
    pub break_after: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            font_family: Vec::new(),
            font_size: Pt::from_f32(ROOT_FONT_SIZE),
            bold: false,
            italic: false,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: LineHeight::Normal,
            underline: false,
            preserve_whitespace: false,
            list_style: ListStyle::Disc,
            display: Display::Block,
            background: None,
            margin_top: Pt::ZERO,
            margin_bottom: Pt::ZERO,
            padding_left: Pt::ZERO,
            break_before: false,
            break_after: false,
        }
    }
}

impl ComputedStyle {
    /// Starting point for a child: inherited properties kept, the rest reset.
    fn inherit(&self) -> ComputedStyle {
        ComputedStyle {
            display: Display::Inline,
            background: None,
            margin_top: Pt::ZERO,
            margin_bottom: Pt::ZERO,
            padding_left: Pt::ZERO,
            break_before: false,
            break_after: false,
            ..self.clone()
        }
    }

    pub fn resolved_line_height(&self) -> Option<Pt> {
        match self.line_height {
            LineHeight::Normal => None,
            LineHeight::Factor(factor) => Some(self.font_size * factor),
            LineHeight::Absolute(value) => Some(value),
        }
    }

    pub fn text_style(&self, fonts: &FontSet) -> TextStyle {
        TextStyle {
            font_name: resolve_font(&self.font_family, self.bold, self.italic, fonts),
            font_size: self.font_size,
            line_height: self.resolved_line_height(),
            color: self.color,
            underline: self.underline,
        }
    }

    fn apply_font_size(&mut self, value: &str, parent_size: Pt) {
        if let Some(size) = parse_font_size(value, parent_size) {
            self.font_size = size;
        }
    }

    fn apply(&mut self, decl: &Declaration) {
        let value = decl.value.as_str();
        let lower = value.to_ascii_lowercase();
        match decl.name.as_str() {
            "font-weight" => {
                self.bold = match lower.as_str() {
                    "bold" | "bolder" => true,
                    "normal" | "lighter" => false,
                    other => other.parse::<u32>().map(|w| w >= 600).unwrap_or(self.bold),
                }
            }
            "font-style" => self.italic = lower.starts_with("italic") || lower.starts_with("oblique"),
            "font-family" => {
                let families: Vec<String> = value
                    .split(',')
                    .map(|family| family.trim().trim_matches('"').trim_matches('\'').to_string())
                    .filter(|family| !family.is_empty())
                    .collect();
                if !families.is_empty() {
                    self.font_family = families;
                }
            }
            "color" => {
                if let Some(color) = parse_color(&lower) {
                    self.color = color;
                }
            }
            "background-color" | "background" => {
                if lower == "transparent" || lower == "none" {
                    self.background = None;
                } else if let Some(color) = lower.split_whitespace().find_map(parse_color) {
                    self.background = Some(color);
                } else if let Some(color) = parse_color(&lower) {
                    self.background = Some(color);
                }
            }
            "text-align" => {
                self.text_align = match lower.as_str() {
                    "center" => TextAlign::Center,
                    "right" | "end" => TextAlign::Right,
                    _ => TextAlign::Left,
                }
            }
            "line-height" => {
                if lower == "normal" {
                    self.line_height = LineHeight::Normal;
                } else if let Ok(factor) = lower.parse::<f32>() {
                    self.line_height = LineHeight::Factor(factor);
                } else if let Some(percent) = lower.strip_suffix('%') {
                    if let Ok(percent) = percent.trim().parse::<f32>() {
                        self.line_height = LineHeight::Factor(percent / 100.0);
                    }
                } else if let Some(length) = parse_length(&lower, self.font_size) {
                    self.line_height = LineHeight::Absolute(length);
                }
            }
            "margin-top" => {
                if let Some(v) = parse_length(&lower, self.font_size) {
                    self.margin_top = v;
                }
            }
            "margin-bottom" => {
                if let Some(v) = parse_length(&lower, self.font_size) {
                    self.margin_bottom = v;
                }
            }
            "margin" => {
                let values = parse_box_shorthand(&lower, self.font_size);
                if let Some(edges) = values {
                    self.margin_top = edges.top;
                    self.margin_bottom = edges.bottom;
                }
            }
            "padding-left" => {
                if let Some(v) = parse_length(&lower, self.font_size) {
                    self.padding_left = v;
                }
            }
            "padding" => {
                if let Some(edges) = parse_box_shorthand(&lower, self.font_size) {
                    self.padding_left = edges.left;
                }
            }
            "text-decoration" | "text-decoration-line" => {
                if lower.contains("underline") {
                    self.underline = true;
                } else if lower.contains("none") {
                    self.underline = false;
                }
            }
            "page-break-before" | "break-before" => self.break_before = is_forced_break(&lower),
            "page-break-after" | "break-after" => self.break_after = is_forced_break(&lower),
            "display" => {
                self.display = match lower.as_str() {
                    "none" => Display::None,
                    "block" | "flex" | "grid" | "flow-root" => Display::Block,
                    "list-item" => Display::ListItem,
                    "table" => Display::Table,
                    "table-row" => Display::TableRow,
                    "table-cell" => Display::TableCell,
                    _ => Display::Inline,
                }
            }
            "white-space" => {
                self.preserve_whitespace = matches!(lower.as_str(), "pre" | "pre-wrap" | "pre-line")
            }
            "list-style-type" | "list-style" => {
                for token in lower.split_whitespace() {
                    let style = match token {
                        "disc" => ListStyle::Disc,
                        "circle" => ListStyle::Circle,
                        "square" => ListStyle::Square,
                        "decimal" => ListStyle::Decimal,
                        "lower-alpha" | "lower-latin" => ListStyle::LowerAlpha,
                        "upper-alpha" | "upper-latin" => ListStyle::UpperAlpha,
                        "none" => ListStyle::None,
                        _ => continue,
                    };
                    self.list_style = style;
                }
            }
            _ => {}
        }
    }
}

fn is_forced_break(value: &str) -> bool {
    matches!(value, "always" | "page" | "left" | "right" | "recto" | "verso")
}

/// `@page` size and margins gathered from the stylesheets.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageSetup {
    pub size: Option<Size>,
    pub margin_top: Option<Pt>,
    pub margin_right: Option<Pt>,
    pub margin_bottom: Option<Pt>,
    pub margin_left: Option<Pt>,
}

impl PageSetup {
    pub fn resolve_margins(&self, base: Margins) -> Margins {
        Margins {
            top: self.margin_top.unwrap_or(base.top),
            right: self.margin_right.unwrap_or(base.right),
            bottom: self.margin_bottom.unwrap_or(base.bottom),
            left: self.margin_left.unwrap_or(base.left),
        }
    }

    fn apply(&mut self, decl: &Declaration) {
        let value = decl.value.to_ascii_lowercase();
        let root = Pt::from_f32(ROOT_FONT_SIZE);
        match decl.name.as_str() {
            "size" => {
                if let Some(size) = parse_page_size(&value) {
                    self.size = Some(size);
                }
            }
            "margin" => {
                if let Some(edges) = parse_box_shorthand(&value, root) {
                    self.margin_top = Some(edges.top);
                    self.margin_right = Some(edges.right);
                    self.margin_bottom = Some(edges.bottom);
                    self.margin_left = Some(edges.left);
                }
            }
            "margin-top" => self.margin_top = parse_length(&value, root),
            "margin-right" => self.margin_right = parse_length(&value, root),
            "margin-bottom" => self.margin_bottom = parse_length(&value, root),
            "margin-left" => self.margin_left = parse_length(&value, root),
            _ => {}
        }
    }
}

/// Rules from the built-in sheet and any author sheets, in cascade order.
pub struct StyleResolver {
    ua_rules: Vec<RuleEntry>,
    normal_rules: Vec<RuleEntry>,
    important_rules: Vec<RuleEntry>,
    page: PageSetup,
}

impl StyleResolver {
    pub fn new<'a, I>(sheets: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolver = StyleResolver {
            ua_rules: Vec::new(),
            normal_rules: Vec::new(),
            important_rules: Vec::new(),
            page: PageSetup::default(),
        };
        let mut order = 0usize;
        let mut ignored = Vec::new();
        let mut ua_page = PageSetup::default();
        if let Ok(sheet) = StyleSheet::parse(DEFAULT_UA_CSS, ParserOptions::default()) {
            collect_rules(
                &sheet.rules,
                &mut resolver.ua_rules,
                &mut ignored,
                &mut ua_page,
                &mut order,
            );
        }
        for css in sheets {
            if css.trim().is_empty() {
                continue;
            }
            match StyleSheet::parse(css, ParserOptions::default()) {
                Ok(sheet) => collect_rules(
                    &sheet.rules,
                    &mut resolver.normal_rules,
                    &mut resolver.important_rules,
                    &mut resolver.page,
                    &mut order,
                ),
                Err(err) => log::warn!("stylesheet ignored: {err}"),
            }
        }
        let sort = |rules: &mut Vec<RuleEntry>| {
            rules.sort_by(|a, b| (a.specificity, a.order).cmp(&(b.specificity, b.order)))
        };
        sort(&mut resolver.ua_rules);
        sort(&mut resolver.normal_rules);
        sort(&mut resolver.important_rules);
        resolver
    }

    pub fn page_setup(&self) -> PageSetup {
        self.page
    }

    pub fn compute(
        &self,
        element: &ElementInfo,
        ancestors: &[ElementInfo],
        parent: &ComputedStyle,
        inline_style: Option<&str>,
    ) -> ComputedStyle {
        let (inline_normal, inline_important) = inline_style
            .and_then(|inline| StyleAttribute::parse(inline, ParserOptions::default()).ok())
            .map(|attr| declarations_from_block(&attr.declarations))
            .unwrap_or_default();

        let matching = |rules: &[RuleEntry]| -> Vec<Arc<Vec<Declaration>>> {
            rules
                .iter()
                .filter(|rule| rule.selector.matches(element, ancestors))
                .map(|rule| rule.declarations.clone())
                .collect()
        };
        let ua = matching(&self.ua_rules);
        let normal = matching(&self.normal_rules);
        let important = matching(&self.important_rules);

        let ordered: Vec<&Declaration> = ua
            .iter()
            .chain(normal.iter())
            .flat_map(|decls| decls.iter())
            .chain(inline_normal.iter())
            .chain(important.iter().flat_map(|decls| decls.iter()))
            .chain(inline_important.iter())
            .collect();

        let mut computed = parent.inherit();
        for decl in ordered.iter().filter(|d| d.name == "font-size") {
            computed.apply_font_size(&decl.value, parent.font_size);
        }
        for decl in ordered.iter().filter(|d| d.name != "font-size") {
            computed.apply(decl);
        }
        computed
    }
}

fn collect_rules(
    rules: &CssRuleList,
    normal: &mut Vec<RuleEntry>,
    important: &mut Vec<RuleEntry>,
    page: &mut PageSetup,
    order: &mut usize,
) {
    for rule in &rules.0 {
        match rule {
            CssRule::Style(style) => {
                let (normal_decls, important_decls) = declarations_from_block(&style.declarations);
                let selectors = style
                    .selectors
                    .to_css_string(PrinterOptions::default())
                    .unwrap_or_default();
                let normal_decls = Arc::new(normal_decls);
                let important_decls = Arc::new(important_decls);
                for selector in selectors.split(',') {
                    let Some(pattern) = parse_selector_pattern(selector) else {
                        log::debug!("unsupported selector skipped: {}", selector.trim());
                        continue;
                    };
                    *order += 1;
                    if !normal_decls.is_empty() {
                        normal.push(RuleEntry {
                            specificity: pattern.specificity(),
                            selector: pattern.clone(),
                            order: *order,
                            declarations: normal_decls.clone(),
                        });
                    }
                    if !important_decls.is_empty() {
                        important.push(RuleEntry {
                            specificity: pattern.specificity(),
                            selector: pattern,
                            order: *order,
                            declarations: important_decls.clone(),
                        });
                    }
                }
            }
            CssRule::Media(media) => {
                let query = media
                    .query
                    .to_css_string(PrinterOptions::default())
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if query.trim().is_empty() || query.contains("print") || query.contains("all") {
                    collect_rules(&media.rules, normal, important, page, order);
                }
            }
            CssRule::Page(page_rule) => {
                let targets_default = page_rule.selectors.is_empty()
                    || page_rule
                        .selectors
                        .iter()
                        .any(|s| s.name.is_none() && s.pseudo_classes.is_empty());
                if !targets_default {
                    continue;
                }
                let (normal_decls, important_decls) =
                    declarations_from_block(&page_rule.declarations);
                for decl in normal_decls.iter().chain(important_decls.iter()) {
                    page.apply(decl);
                }
            }
            _ => {}
        }
    }
}

fn declarations_from_block(block: &DeclarationBlock<'_>) -> (Vec<Declaration>, Vec<Declaration>) {
    let collect = |properties: &[Property<'_>]| {
        properties
            .iter()
            .filter_map(declaration_from_property)
            .collect::<Vec<_>>()
    };
    (
        collect(&block.declarations),
        collect(&block.important_declarations),
    )
}

fn declaration_from_property(property: &Property<'_>) -> Option<Declaration> {
    let name = property.property_id().name().to_ascii_lowercase();
    let value = property
        .value_to_css_string(PrinterOptions::default())
        .ok()?;
    Some(Declaration {
        name,
        value: value.trim().to_string(),
    })
}

fn parse_selector_pattern(selector: &str) -> Option<SelectorPattern> {
    let selector = selector.trim();
    if selector.is_empty() || selector.contains([':', '[', '+', '~']) {
        return None;
    }
    let mut parts = Vec::new();
    let mut combinators = Vec::new();
    let mut pending = None;
    for token in selector.replace('>', " > ").split_whitespace() {
        if token == ">" {
            pending = Some(Combinator::Child);
            continue;
        }
        let simple = parse_simple_selector(token)?;
        if !parts.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        } else if pending.is_some() {
            return None;
        }
        parts.push(simple);
    }
    if parts.is_empty() || pending.is_some() {
        return None;
    }
    Some(SelectorPattern { parts, combinators })
}

fn parse_simple_selector(token: &str) -> Option<SimpleSelector> {
    let mut selector = SimpleSelector::default();
    let mut buffer = String::new();
    let mut mode = '\0';
    let flush = |mode: char, buffer: &mut String, selector: &mut SimpleSelector| -> Option<()> {
        if buffer.is_empty() {
            return if mode == '\0' { Some(()) } else { None };
        }
        let value = std::mem::take(buffer);
        match mode {
            '#' => selector.id = Some(value),
            '.' => selector.classes.push(value),
            _ => selector.tag = Some(value.to_ascii_lowercase()),
        }
        Some(())
    };
    for ch in token.chars() {
        if ch == '#' || ch == '.' {
            flush(mode, &mut buffer, &mut selector)?;
            mode = ch;
        } else {
            buffer.push(ch);
        }
    }
    flush(mode, &mut buffer, &mut selector)?;
    if selector.tag.is_none() && selector.id.is_none() && selector.classes.is_empty() {
        return None;
    }
    Some(selector)
}

/// Picks the face for a family list: a loaded font when one matches
/// (preferring its bold/italic variant), else the closest base-14 font.
pub fn resolve_font(families: &[String], bold: bool, italic: bool, fonts: &FontSet) -> Arc<str> {
    for family in families {
        if let Some(name) = loaded_face(family, bold, italic, fonts) {
            return name;
        }
        match family.to_ascii_lowercase().as_str() {
            "monospace" | "courier" | "courier new" => return builtin_face("Courier", bold, italic),
            "sans-serif" | "serif" | "helvetica" | "arial" | "system-ui" => {
                return builtin_face("Helvetica", bold, italic);
            }
            _ => {}
        }
    }
    builtin_face("Helvetica", bold, italic)
}

fn loaded_face(family: &str, bold: bool, italic: bool, fonts: &FontSet) -> Option<Arc<str>> {
    let suffixes: &[&str] = match (bold, italic) {
        (true, true) => &["Bold Italic", "BoldItalic", "Bold Oblique", "BoldOblique"],
        (true, false) => &["Bold"],
        (false, true) => &["Italic", "Oblique"],
        (false, false) => &[],
    };
    for suffix in suffixes {
        for separator in [" ", "-"] {
            if let Some(font) = fonts.resolve(&format!("{family}{separator}{suffix}")) {
                return Some(Arc::from(font.name()));
            }
        }
    }
    fonts.resolve(family).map(|font| Arc::from(font.name()))
}

fn builtin_face(base: &str, bold: bool, italic: bool) -> Arc<str> {
    let suffix = match (bold, italic) {
        (true, true) => "-BoldOblique",
        (true, false) => "-Bold",
        (false, true) => "-Oblique",
        (false, false) => "",
    };
    Arc::from(format!("{base}{suffix}"))
}

/// CSS length in points. `em` is relative to `font_size`; percentages are
/// not lengths here.
pub fn parse_length(value: &str, font_size: Pt) -> Option<Pt> {
    let value = value.trim();
    if value == "0" || value == "auto" {
        return Some(Pt::ZERO);
    }
    let split = value
        .find(|c: char| c.is_ascii_alphabetic() || c == '%')
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f32 = number.trim().parse().ok()?;
    let points = match unit.trim() {
        "pt" => number,
        "px" => number * 0.75,
        "in" => number * 72.0,
        "cm" => number * 72.0 / 2.54,
        "mm" => number * 72.0 / 25.4,
        "pc" => number * 12.0,
        "q" => number * 72.0 / 101.6,
        "em" => return Some(font_size * number),
        "rem" => number * ROOT_FONT_SIZE,
        "" if number == 0.0 => 0.0,
        _ => return None,
    };
    Some(Pt::from_f32(points))
}

fn parse_font_size(value: &str, parent: Pt) -> Option<Pt> {
    let value = value.trim().to_ascii_lowercase();
    let px = |v: f32| Some(Pt::from_f32(v * 0.75));
    match value.as_str() {
        "xx-small" => px(9.0),
        "x-small" => px(10.0),
        "small" => px(13.0),
        "medium" => px(16.0),
        "large" => px(18.0),
        "x-large" => px(24.0),
        "xx-large" => px(32.0),
        "smaller" => Some(parent.mul_ratio(5, 6)),
        "larger" => Some(parent.mul_ratio(6, 5)),
        other => match other.strip_suffix('%') {
            Some(percent) => percent
                .trim()
                .parse::<f32>()
                .ok()
                .map(|p| parent * (p / 100.0)),
            None => parse_length(other, parent),
        },
    }
}

/// Expands a 1-4 value box shorthand (`margin`, `padding`).
fn parse_box_shorthand(value: &str, font_size: Pt) -> Option<Margins> {
    let values: Vec<Pt> = value
        .split_whitespace()
        .map(|part| parse_length(part, font_size))
        .collect::<Option<Vec<_>>>()?;
    let (top, right, bottom, left) = match values.as_slice() {
        [all] => (*all, *all, *all, *all),
        [v, h] => (*v, *h, *v, *h),
        [t, h, b] => (*t, *h, *b, *h),
        [t, r, b, l, ..] => (*t, *r, *b, *l),
        [] => return None,
    };
    Some(Margins {
        top,
        right,
        bottom,
        left,
    })
}

fn parse_page_size(value: &str) -> Option<Size> {
    let mut orientation = None;
    let mut parts = Vec::new();
    for token in value.replace(',', " ").split_whitespace() {
        match token {
            "landscape" | "portrait" => orientation = Some(token.to_string()),
            _ => parts.push(token.to_string()),
        }
    }
    let size = match parts.as_slice() {
        [] => crate::properties::PageType::A4.size(),
        [name] if name == "auto" => return None,
        [name] => crate::properties::PageType::parse(name)
            .map(|page| page.size())
            .or_else(|| {
                let side = parse_length(name, Pt::from_f32(ROOT_FONT_SIZE))?;
                Some(Size {
                    width: side,
                    height: side,
                })
            })?,
        [width, height] => Size {
            width: parse_length(width, Pt::from_f32(ROOT_FONT_SIZE))?,
            height: parse_length(height, Pt::from_f32(ROOT_FONT_SIZE))?,
        },
        _ => return None,
    };
    Some(match orientation.as_deref() {
        Some("landscape") if size.width < size.height => size.landscape(),
        Some("portrait") if size.width > size.height => size.landscape(),
        _ => size,
    })
}

/// Hex, `rgb()`/`rgba()` and the basic named colors.
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        return match digits.len() {
            3 | 4 => Some(Color::from_rgb8(
                digits[0] * 17,
                digits[1] * 17,
                digits[2] * 17,
            )),
            6 | 8 => Some(Color::from_rgb8(
                digits[0] * 16 + digits[1],
                digits[2] * 16 + digits[3],
                digits[4] * 16 + digits[5],
            )),
            _ => None,
        };
    }
    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let channels: Vec<u8> = args
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .take(3)
            .map(|part| match part.strip_suffix('%') {
                Some(percent) => percent
                    .parse::<f32>()
                    .ok()
                    .map(|p| (p * 2.55).round().clamp(0.0, 255.0) as u8),
                None => part
                    .parse::<f32>()
                    .ok()
                    .map(|v| v.round().clamp(0.0, 255.0) as u8),
            })
            .collect::<Option<_>>()?;
        if channels.len() == 3 {
            return Some(Color::from_rgb8(channels[0], channels[1], channels[2]));
        }
        return None;
    }
    let (r, g, b) = match value.as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "navy" => (0, 0, 128),
        "gray" | "grey" => (128, 128, 128),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "silver" => (192, 192, 192),
        "maroon" => (128, 0, 0),
        "purple" => (128, 0, 128),
        "fuchsia" | "magenta" => (255, 0, 255),
        "teal" => (0, 128, 128),
        "aqua" | "cyan" => (0, 255, 255),
        "olive" => (128, 128, 0),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        _ => return None,
    };
    Some(Color::from_rgb8(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, class: Option<&str>) -> ElementInfo {
        ElementInfo::new(tag, None, class)
    }

    fn compute(resolver: &StyleResolver, chain: &[ElementInfo]) -> ComputedStyle {
        let mut style = ComputedStyle::default();
        for (index, el) in chain.iter().enumerate() {
            style = resolver.compute(el, &chain[..index], &style, None);
        }
        style
    }

    #[test]
    fn ua_sheet_styles_headings() {
        let resolver = StyleResolver::new([""]);
        let h1 = compute(&resolver, &[element("body", None), element("h1", None)]);
        assert!(h1.bold);
        assert_eq!(h1.font_size, Pt::from_f32(24.0));
        assert_eq!(h1.display, Display::Block);
    }

    #[test]
    fn specificity_beats_source_order() {
        let resolver = StyleResolver::new(["p.note { color: #00ff00 } p { color: red }"]);
        let p = compute(&resolver, &[element("p", Some("note"))]);
        assert_eq!(p.color, Color::from_rgb8(0, 255, 0));
    }

    #[test]
    fn descendant_and_child_combinators() {
        let resolver = StyleResolver::new([
            ".box span { font-size: 20pt } .box > b { text-decoration: underline }",
        ]);
        let chain = [
            element("div", Some("box")),
            element("p", None),
            element("span", None),
        ];
        assert_eq!(compute(&resolver, &chain).font_size, Pt::from_f32(20.0));
        let nested_b = [element("div", Some("box")), element("p", None), element("b", None)];
        assert!(!compute(&resolver, &nested_b).underline);
        let direct_b = [element("div", Some("box")), element("b", None)];
        assert!(compute(&resolver, &direct_b).underline);
    }

    #[test]
    fn inline_style_and_inheritance() {
        let resolver = StyleResolver::new(["body { font-family: 'DejaVu Sans', sans-serif }"]);
        let body = resolver.compute(
            &element("body", None),
            &[],
            &ComputedStyle::default(),
            Some("font-size: 10pt; line-height: 1.5"),
        );
        let span = resolver.compute(&element("span", None), &[element("body", None)], &body, None);
        assert_eq!(span.font_family, vec!["DejaVu Sans", "sans-serif"]);
        assert_eq!(span.resolved_line_height(), Some(Pt::from_f32(15.0)));
        assert_eq!(span.display, Display::Inline);
    }

    #[test]
    fn page_rule_sets_size_and_margins() {
        let resolver = StyleResolver::new([
            "@page { size: letter landscape; margin: 10pt 20pt; } @page :first { margin-top: 99pt }",
        ]);
        let setup = resolver.page_setup();
        assert_eq!(setup.size, Some(Size::new(792.0, 612.0)));
        let margins = setup.resolve_margins(Margins::zero());
        assert_eq!(margins.top, Pt::from_f32(10.0));
        assert_eq!(margins.left, Pt::from_f32(20.0));
    }

    #[test]
    fn page_break_properties() {
        let resolver = StyleResolver::new([".pb { page-break-before: always } .pa { break-after: page }"]);
        assert!(compute(&resolver, &[element("div", Some("pb"))]).break_before);
        assert!(compute(&resolver, &[element("div", Some("pa"))]).break_after);
    }

    #[test]
    fn colors_and_lengths() {
        assert_eq!(parse_color("#f00"), Some(Color::from_rgb8(255, 0, 0)));
        assert_eq!(parse_color("rgb(0, 128, 255)"), Some(Color::from_rgb8(0, 128, 255)));
        assert_eq!(parse_color("navy"), Some(Color::from_rgb8(0, 0, 128)));
        assert_eq!(parse_length("16px", Pt::ZERO), Some(Pt::from_f32(12.0)));
        assert_eq!(parse_length("1in", Pt::ZERO), Some(Pt::from_f32(72.0)));
        assert_eq!(parse_length("2em", Pt::from_f32(10.0)), Some(Pt::from_f32(20.0)));
        assert_eq!(parse_length("wide", Pt::ZERO), None);
    }

    #[test]
    fn builtin_faces_follow_weight_and_style() {
        let fonts = FontSet::new();
        let mono = vec!["monospace".to_string()];
        assert_eq!(&*resolve_font(&mono, true, false, &fonts), "Courier-Bold");
        assert_eq!(&*resolve_font(&[], false, true, &fonts), "Helvetica-Oblique");
    }
}
