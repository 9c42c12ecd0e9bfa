//! Positioned-text model shared by the highlighting engine and its callers.
//!
//! A [`Document`] is an ordered list of [`Page`]s. Each page owns its flat text and a flat
//! arena of [`Run`]s grouped into visual [`Line`]s. Everything here is immutable once built;
//! the extraction step constructs it and the viewer only reads it.

mod parse_result;

pub use parse_result::{ParseBlock, ParseBlocks, ParseMetadata, ParseResult};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("block {id} has unsupported type {block_type} (expected Page)")]
    UnsupportedBlock { id: String, block_type: String },
    #[error("block {id} has invalid page number {page} (page numbers are 1-based)")]
    InvalidPageNumber { id: String, page: u32 },
    #[error("page id {0} appears more than once")]
    DuplicatePageId(PageId),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Box of a run in page-relative coordinates (fractions of page width/height, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPosition {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_title: bool,
}

impl TextPosition {
    pub fn new(top: f32, left: f32, width: f32, height: f32) -> Self {
        Self { top, left, width, height, is_title: false }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn is_zero_width(&self) -> bool {
        self.width <= 0.0
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &TextPosition) -> TextPosition {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        TextPosition {
            top,
            left,
            width: right - left,
            height: bottom - top,
            is_title: self.is_title && other.is_title,
        }
    }
}

/// Smallest positioned unit of extracted text.
///
/// `start_index..end_index` is a half-open range of char offsets into the owning page's text.
/// Runs with `start_index == end_index` are anchors: valid offset targets without glyphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub text: String,
    pub position: TextPosition,
    pub start_index: usize,
    pub end_index: usize,
}

impl Run {
    pub fn new(text: impl Into<String>, position: TextPosition, start_index: usize) -> Self {
        let text = text.into();
        let end_index = start_index + text.chars().count();
        Self { text, position, start_index, end_index }
    }

    pub fn anchor(offset: usize, position: TextPosition) -> Self {
        Self {
            text: String::new(),
            position: TextPosition { width: 0.0, ..position },
            start_index: offset,
            end_index: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_anchor(&self) -> bool {
        self.is_empty()
    }

    /// Blank and zero-width runs carry no visible glyphs.
    pub fn is_visible(&self) -> bool {
        !self.text.trim().is_empty() && !self.position.is_zero_width()
    }

    pub fn span(&self) -> Span {
        Span { start: self.start_index, end: self.end_index }
    }
}

/// One visual line: a contiguous slice of the page's run arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    runs: Range<usize>,
    bounds: Option<TextPosition>,
}

impl Line {
    pub fn runs(&self) -> Range<usize> {
        self.runs.clone()
    }

    /// Union box of the line's visible runs, `None` for lines made only of anchors or blanks.
    pub fn bounding_box(&self) -> Option<TextPosition> {
        self.bounds
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PageRecord {
    id: PageId,
    index: u32,
    text: String,
    lines: Vec<Vec<Run>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PageRecord", into = "PageRecord")]
pub struct Page {
    id: PageId,
    index: u32,
    text: String,
    char_len: usize,
    runs: Vec<Run>,
    run_lines: Vec<usize>,
    lines: Vec<Line>,
}

impl Page {
    pub fn new(
        id: impl Into<PageId>,
        index: u32,
        text: impl Into<String>,
        lines: Vec<Vec<Run>>,
    ) -> Self {
        let text = text.into();
        let char_len = text.chars().count();
        let run_count = lines.iter().map(Vec::len).sum();

        let mut runs = Vec::with_capacity(run_count);
        let mut run_lines = Vec::with_capacity(run_count);
        let mut built_lines = Vec::with_capacity(lines.len());

        for (line_index, line_runs) in lines.into_iter().enumerate() {
            let first = runs.len();
            let bounds = line_runs
                .iter()
                .filter(|run| run.is_visible())
                .map(|run| run.position)
                .reduce(|acc, position| acc.union(&position));

            for run in line_runs {
                runs.push(run);
                run_lines.push(line_index);
            }

            built_lines.push(Line { runs: first..runs.len(), bounds });
        }

        Self { id: id.into(), index, text, char_len, runs, run_lines, lines: built_lines }
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    /// Zero-based ordinal of the page in its document.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Page length in chars, the upper bound of every offset on this page.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn run(&self, run_index: usize) -> Option<&Run> {
        self.runs.get(run_index)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, line_index: usize) -> Option<&Line> {
        self.lines.get(line_index)
    }

    pub fn line_of_run(&self, run_index: usize) -> Option<usize> {
        self.run_lines.get(run_index).copied()
    }

    pub fn line_runs(&self, line_index: usize) -> &[Run] {
        match self.lines.get(line_index) {
            Some(line) => &self.runs[line.runs()],
            None => &[],
        }
    }

    /// End offsets of the last non-empty run of every line, ascending.
    pub fn line_end_offsets(&self) -> Vec<usize> {
        let mut ends: Vec<usize> = self
            .lines
            .iter()
            .filter_map(|line| {
                let last = self.runs[line.runs()].iter().rev().find(|run| !run.is_empty());
                last.map(|run| run.end_index)
            })
            .collect();
        ends.sort_unstable();
        ends
    }

    /// Text between two char offsets, clamped to the page.
    pub fn slice(&self, span: Span) -> String {
        let end = span.end.min(self.char_len);
        let start = span.start.min(end);
        self.text.chars().skip(start).take(end - start).collect()
    }
}

impl From<PageRecord> for Page {
    fn from(record: PageRecord) -> Self {
        Page::new(record.id, record.index, record.text, record.lines)
    }
}

impl From<Page> for PageRecord {
    fn from(page: Page) -> Self {
        let lines = page.lines.iter().map(|line| page.runs[line.runs()].to_vec()).collect();
        PageRecord { id: page.id, index: page.index, text: page.text, lines }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Like [`Document::new`] but rejects page ids that appear more than once.
    pub fn try_new(pages: Vec<Page>) -> Result<Self, ModelError> {
        let mut seen = HashSet::with_capacity(pages.len());
        if let Some(page) = pages.iter().find(|page| !seen.insert(page.id())) {
            return Err(ModelError::DuplicatePageId(page.id().clone()));
        }

        Ok(Self { pages })
    }

    /// Accepts either the native document shape or the extractor's `ParseResult` shape.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;

        if value.get("blocks").is_some() {
            let result: ParseResult = serde_json::from_value(value)?;
            return Self::from_parse_result(result);
        }

        let document: Document = serde_json::from_value(value)?;
        Self::try_new(document.pages)
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, id: &PageId) -> Option<&Page> {
        self.position(id).map(|position| &self.pages[position])
    }

    /// Position of the first page with `id` in document order.
    pub fn position(&self, id: &PageId) -> Option<usize> {
        self.pages.iter().position(|page| page.id() == id)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn run_count(&self) -> usize {
        self.pages.iter().map(|page| page.runs().len()).sum()
    }
}

/// Half-open char offset range `[start, end)` on a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn at(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self { start: range.start, end: range.end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageSpan {
    pub page: PageId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PagePosition {
    pub page: PageId,
    pub offset: usize,
}

/// Drawable region produced by the engine, in the same normalized space as [`TextPosition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rectangle {
    pub page_index: u32,
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
    /// Zero-width marker (anchor run or empty span); renderers usually skip these.
    #[serde(default)]
    pub anchor: bool,
}

impl Rectangle {
    pub fn from_position(page_index: u32, position: &TextPosition) -> Self {
        Self {
            page_index,
            top: position.top,
            left: position.left,
            width: position.width,
            height: position.height,
            anchor: position.is_zero_width(),
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn is_drawable(&self) -> bool {
        !self.anchor && self.area() > 0.0
    }

    pub fn to_pdf_highlight(&self, color_rgba: Option<&str>) -> PdfHighlight {
        PdfHighlight {
            page: self.page_index + 1,
            rect: HighlightRect {
                top: self.top,
                left: self.left,
                width: self.width,
                height: self.height,
            },
            highlight_color_rgba: color_rgba.map(ToOwned::to_owned),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightRect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

/// Highlight shape consumed by the PDF viewer overlay. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfHighlight {
    pub page: u32,
    pub rect: HighlightRect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_color_rgba: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(left: f32, width: f32) -> TextPosition {
        TextPosition::new(0.2, left, width, 0.01)
    }

    fn sample_page() -> Page {
        Page::new(
            "page_1",
            0,
            "Hello world again",
            vec![
                vec![
                    Run::anchor(0, position(0.1, 0.0)),
                    Run::new("Hello", position(0.1, 0.05), 0),
                    Run::new("world", position(0.16, 0.05), 6),
                ],
                vec![Run::new("again", TextPosition::new(0.22, 0.1, 0.05, 0.012), 12)],
            ],
        )
    }

    #[test]
    fn run_new_derives_end_from_char_count() {
        let run = Run::new("naïve", position(0.0, 0.1), 10);
        assert_eq!(run.end_index, 15);
        assert_eq!(run.len(), 5);
        assert!(!run.is_anchor());
    }

    #[test]
    fn anchors_are_zero_width_and_invisible() {
        let run = Run::anchor(7, position(0.3, 0.2));
        assert!(run.is_anchor());
        assert_eq!(run.position.width, 0.0);
        assert!(!run.is_visible());
    }

    #[test]
    fn page_flattens_lines_into_run_arena() {
        let page = sample_page();

        assert_eq!(page.runs().len(), 4);
        assert_eq!(page.lines().len(), 2);
        assert_eq!(page.lines()[0].runs(), 0..3);
        assert_eq!(page.lines()[1].runs(), 3..4);
        assert_eq!(page.line_of_run(2), Some(0));
        assert_eq!(page.line_of_run(3), Some(1));
        assert_eq!(page.line_runs(1)[0].text, "again");
        assert_eq!(page.char_len(), 17);
    }

    #[test]
    fn line_box_ignores_anchor_runs() {
        let page = sample_page();
        let bounds = page.lines()[0].bounding_box().expect("line should have a box");

        assert!((bounds.left - 0.1).abs() < 1e-6);
        assert!((bounds.right() - 0.21).abs() < 1e-6);
    }

    #[test]
    fn line_end_offsets_skip_trailing_anchors() {
        let page = Page::new(
            "p",
            0,
            "ab cd",
            vec![
                vec![Run::new("ab", position(0.1, 0.02), 0), Run::anchor(2, position(0.12, 0.0))],
                vec![Run::new("cd", position(0.1, 0.02), 3)],
            ],
        );

        assert_eq!(page.line_end_offsets(), vec![2, 5]);
    }

    #[test]
    fn line_end_offsets_are_sorted_when_lines_are_out_of_order() {
        let page = Page::new(
            "p",
            0,
            "ab cd",
            vec![
                vec![Run::new("cd", position(0.1, 0.02), 3)],
                vec![Run::new("ab", position(0.1, 0.02), 0)],
            ],
        );

        assert_eq!(page.line_end_offsets(), vec![2, 5]);
    }

    #[test]
    fn page_serde_keeps_nested_line_shape() {
        let page = sample_page();
        let json = serde_json::to_value(&page).expect("page should serialize");

        assert_eq!(json["lines"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["lines"][0][1]["startIndex"], 0);
        assert_eq!(json["lines"][0][1]["endIndex"], 5);

        let back: Page = serde_json::from_value(json).expect("page should deserialize");
        assert_eq!(back, page);
    }

    #[test]
    fn document_accepts_native_json() {
        let json = r#"{
            "pages": [{
                "id": "p1",
                "index": 0,
                "text": "912",
                "lines": [[{
                    "text": "912",
                    "position": { "top": 0.9, "left": 0.5, "width": 0.02, "height": 0.01 },
                    "startIndex": 0,
                    "endIndex": 3
                }]]
            }]
        }"#;

        let document = Document::from_json_slice(json.as_bytes()).expect("document should parse");
        assert_eq!(document.page_count(), 1);
        assert_eq!(document.page(&PageId::from("p1")).map(Page::char_len), Some(3));
    }

    #[test]
    fn duplicate_page_ids_are_rejected() {
        let json = r#"{
            "pages": [
                { "id": "p1", "index": 0, "text": "", "lines": [] },
                { "id": "p1", "index": 1, "text": "", "lines": [] }
            ]
        }"#;

        let error =
            Document::from_json_slice(json.as_bytes()).expect_err("should reject duplicate");
        assert!(matches!(error, ModelError::DuplicatePageId(id) if id.as_str() == "p1"));
    }

    #[test]
    fn position_follows_document_order() {
        let document = Document::try_new(vec![
            Page::new("a", 0, "", Vec::new()),
            Page::new("b", 1, "", Vec::new()),
        ])
        .expect("ids should be unique");

        assert_eq!(document.position(&PageId::from("b")), Some(1));
        assert_eq!(document.position(&PageId::from("z")), None);
    }

    #[test]
    fn slice_clamps_to_page_bounds() {
        let page = sample_page();
        assert_eq!(page.slice(Span::new(6, 11)), "world");
        assert_eq!(page.slice(Span::new(12, 99)), "again");
    }

    #[test]
    fn pdf_highlight_uses_one_based_pages() {
        let rect = Rectangle::from_position(2, &position(0.1, 0.3));
        let highlight = rect.to_pdf_highlight(Some("rgba(255, 255, 0, 0.3)"));

        assert_eq!(highlight.page, 3);
        assert_eq!(highlight.rect.width, 0.3);

        let json = serde_json::to_value(&highlight).expect("highlight should serialize");
        assert_eq!(json["highlightColorRgba"], "rgba(255, 255, 0, 0.3)");
    }

    #[test]
    fn zero_width_rectangles_are_flagged() {
        let rect = Rectangle::from_position(0, &position(0.4, 0.0));
        assert!(rect.anchor);
        assert!(!rect.is_drawable());
    }
}
