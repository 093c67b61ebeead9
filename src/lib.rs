//! Paginated HTML/CSS to PDF composition.
//!
//! [`compose`] lays main markup out on pages of a configured size, overlays
//! independently laid-out header and footer markup on every page through a
//! page-end event, and optionally stamps `n of total` labels in a second pass
//! over the finished PDF.

mod canvas;
mod composer;
mod decorator;
mod doc_context;
mod doc_template;
mod error;
mod flowable;
mod font;
mod frame;
mod geometry;
mod markup;
mod page_template;
mod pdf;
mod properties;
mod request;
mod resource;
mod stamper;
mod style;
mod types;

pub use canvas::{Canvas, Command, Document, Page};
pub use composer::{compose, compose_with};
pub use decorator::PageDecorator;
pub use doc_context::{PageEvent, PageEventHandler};
pub use doc_template::DocTemplate;
pub use error::{FolioError, Result};
pub use flowable::{
    BreakAfter, BreakBefore, BreakInside, Flowable, FlowableClone, ImageBlock, ListItem,
    PageBreak, Pagination, Paragraph, Rule, Spacer, Stack, TableRow, TextAlign, TextRun,
    TextStyle,
};
pub use font::{BuiltinFont, FontCatalog, FontFailure, FontSet, LoadedFont};
pub use frame::{AddResult, Frame};
pub use geometry::{footer_rect, header_rect, number_rect, page_size, to_top_down};
pub use markup::{ConverterOptions, Element, HtmlRenderer, MarkupRenderer};
pub use page_template::{FrameSpec, PageTemplate};
pub use pdf::document_to_pdf;
pub use properties::{DocumentProperties, PageType};
pub use request::CompositionRequest;
pub use resource::{ImageData, load_image};
pub use stamper::{label_for, stamp_page_numbers};
pub use style::{ComputedStyle, Display, ElementInfo, PageSetup, StyleResolver};
pub use types::{Color, Margins, Pt, Rect, Size};
