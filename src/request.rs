//! JSON composition request, as posted by document-generation clients.

use crate::composer::compose;
use crate::error::Result;
use crate::properties::DocumentProperties;
use serde::Deserialize;
use std::path::PathBuf;

/// One composition job. Unknown fields (storage targets, download flags,
/// remote CSS URLs) are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositionRequest {
    pub file_name: Option<String>,
    /// Directory relative image sources resolve against.
    pub site_url: Option<String>,
    pub content_html: String,
    pub header_html: Option<String>,
    pub footer_html: Option<String>,
    pub css: String,
    /// Font file paths separated by `|` (or `;`).
    pub path_fonts: String,
    #[serde(flatten)]
    pub properties: DocumentProperties,
}

impl CompositionRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn font_paths(&self) -> Vec<PathBuf> {
        self.path_fonts
            .split(['|', ';'])
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Composes the request; `Ok(None)` when `contentHtml` is blank.
    pub fn compose(&self) -> Result<Option<Vec<u8>>> {
        compose(
            &self.content_html,
            self.header_html.as_deref(),
            self.footer_html.as_deref(),
            &self.properties,
            &self.css,
            self.site_url.as_deref().filter(|url| !url.trim().is_empty()),
            &self.font_paths(),
        )
    }
}
