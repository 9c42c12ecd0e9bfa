//! Document-level entry point used by the viewer.
//!
//! The highlighter owns a read-only document and lazily builds one [`PageLayout`] (offset index
//! plus normalized text) per page on first use, keyed by the page's position in the document.
//! Layouts are never invalidated; reloading a document means building a new highlighter. All
//! queries take `&self` and may run from many threads at once.

use crate::error::HighlightError;
use crate::locate::{find_in, normalize_page, TextMatch};
use crate::normalize::NormalizedText;
use crate::offset_index::OffsetIndex;
use crate::resolve::resolve_span;
use crate::settings::MatchSettings;
use doc_model::{Document, Page, PageId, PagePosition, PageSpan, Rectangle, Span};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// What the caller wants highlighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Citation {
    /// A known offset range on one page.
    Offsets { page: PageId, span: Span },
    /// A citation already split per page; every part is resolved on its own.
    Spans { spans: Vec<PageSpan> },
    /// Two positions that must lie on the same page.
    Between { start: PagePosition, end: PagePosition },
    /// Literal text, tried on `pages` in order (all pages when empty).
    Text {
        text: String,
        #[serde(default)]
        pages: Vec<PageId>,
    },
}

/// Cached per-page lookup structures.
#[derive(Debug)]
pub struct PageLayout {
    index: OffsetIndex,
    normalized: NormalizedText,
}

impl PageLayout {
    pub fn build(page: &Page, settings: &MatchSettings) -> Result<Self, HighlightError> {
        let index = OffsetIndex::build(page)?;
        let normalized = normalize_page(page, settings);
        Ok(Self { index, normalized })
    }

    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }

    pub fn normalized(&self) -> &NormalizedText {
        &self.normalized
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Located {
    #[serde(rename = "match")]
    pub matched: TextMatch,
    pub rectangles: Vec<Rectangle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub page: PageId,
    pub page_index: u32,
    #[serde(flatten)]
    pub located: Located,
}

pub struct Highlighter {
    document: Arc<Document>,
    settings: MatchSettings,
    layouts: RwLock<HashMap<usize, Arc<PageLayout>>>,
}

impl Highlighter {
    pub fn new(document: impl Into<Arc<Document>>, settings: MatchSettings) -> Self {
        Self { document: document.into(), settings, layouts: RwLock::new(HashMap::new()) }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn page(&self, id: &PageId) -> Result<&Page, HighlightError> {
        self.position(id).map(|position| &self.document.pages()[position])
    }

    fn position(&self, id: &PageId) -> Result<usize, HighlightError> {
        self.document.position(id).ok_or_else(|| HighlightError::UnknownPage(id.clone()))
    }

    /// Layout of the page at `position` in the document, built and cached on first request.
    pub fn layout(&self, position: usize) -> Result<Arc<PageLayout>, HighlightError> {
        {
            let layouts = self.layouts.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(layout) = layouts.get(&position) {
                return Ok(Arc::clone(layout));
            }
        }

        let page = self.document.pages().get(position).ok_or(HighlightError::OutOfRange {
            offset: position,
            len: self.document.page_count(),
        })?;
        let built = Arc::new(PageLayout::build(page, &self.settings)?);

        let mut layouts = self.layouts.write().unwrap_or_else(PoisonError::into_inner);
        let layout = layouts.entry(position).or_insert(built);
        Ok(Arc::clone(layout))
    }

    /// Builds every page layout up front. Returns the pages that failed.
    pub fn warm(&self) -> Vec<(PageId, HighlightError)> {
        self.document
            .pages()
            .iter()
            .enumerate()
            .filter_map(|(position, page)| {
                self.layout(position).err().map(|error| (page.id().clone(), error))
            })
            .collect()
    }

    pub fn cached_pages(&self) -> usize {
        self.layouts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Rectangles for chars `start..end` of a page.
    pub fn resolve(
        &self,
        page: &PageId,
        start: usize,
        end: usize,
    ) -> Result<Vec<Rectangle>, HighlightError> {
        let position = self.position(page)?;
        let layout = self.layout(position)?;
        resolve_span(&self.document.pages()[position], layout.index(), Span::new(start, end))
    }

    /// Rectangles for `text` located on a page, or `NotFound`.
    pub fn locate(&self, page: &PageId, text: &str) -> Result<Vec<Rectangle>, HighlightError> {
        self.locate_match(page, text).map(|located| located.rectangles)
    }

    /// Like [`Self::locate`] but also reports how the text matched.
    pub fn locate_match(&self, page: &PageId, text: &str) -> Result<Located, HighlightError> {
        self.locate_on(self.position(page)?, text)
    }

    pub fn highlight(&self, citation: &Citation) -> Result<Vec<Rectangle>, HighlightError> {
        match citation {
            Citation::Offsets { page, span } => self.resolve(page, span.start, span.end),
            Citation::Spans { spans } => {
                let mut rectangles = Vec::new();
                for part in spans {
                    rectangles.extend(self.resolve(&part.page, part.span.start, part.span.end)?);
                }
                Ok(rectangles)
            }
            Citation::Between { start, end } => {
                if start.page != end.page {
                    return Err(HighlightError::CrossPageSpanUnsupported {
                        start_page: start.page.clone(),
                        end_page: end.page.clone(),
                    });
                }
                self.resolve(&start.page, start.offset, end.offset)
            }
            Citation::Text { text, pages } => self.highlight_text(text, pages),
        }
    }

    /// Locates `query` on every page and returns the hits, best first.
    ///
    /// Pages whose layout is corrupt are skipped.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .document
            .pages()
            .iter()
            .enumerate()
            .filter_map(|(position, page)| match self.locate_on(position, query) {
                Ok(located) => {
                    Some(SearchHit { page: page.id().clone(), page_index: page.index(), located })
                }
                Err(HighlightError::NotFound) => None,
                Err(error) => {
                    warn!(page = %page.id(), %error, "skipping page during search");
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| b.located.matched.score.total_cmp(&a.located.matched.score));
        hits.truncate(limit);
        hits
    }

    fn highlight_text(
        &self,
        text: &str,
        pages: &[PageId],
    ) -> Result<Vec<Rectangle>, HighlightError> {
        let candidates: Vec<usize> = if pages.is_empty() {
            (0..self.document.page_count()).collect()
        } else {
            pages.iter().map(|id| self.position(id)).collect::<Result<_, _>>()?
        };

        let mut corrupt = None;

        for position in candidates {
            match self.locate_on(position, text) {
                Ok(located) => return Ok(located.rectangles),
                Err(HighlightError::NotFound) => {}
                Err(error @ HighlightError::CorruptLayout { .. }) => {
                    warn!(position, %error, "cannot highlight on page");
                    corrupt.get_or_insert(error);
                }
                Err(error) => return Err(error),
            }
        }

        Err(corrupt.unwrap_or(HighlightError::NotFound))
    }

    fn locate_on(&self, position: usize, text: &str) -> Result<Located, HighlightError> {
        let layout = self.layout(position)?;
        let page = &self.document.pages()[position];

        let Some(matched) = find_in(page, layout.normalized(), text, &self.settings) else {
            debug!(page = %page.id(), "citation text not found");
            return Err(HighlightError::NotFound);
        };

        let rectangles = resolve_span(page, layout.index(), matched.span)?;
        Ok(Located { matched, rectangles })
    }
}
