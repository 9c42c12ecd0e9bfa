use doc_model::PageId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HighlightError {
    #[error("offset {offset} out of range (page length {len})")]
    OutOfRange { offset: usize, len: usize },
    #[error("invalid span {start}..{end}: start is after end")]
    InvalidSpan { start: usize, end: usize },
    #[error("corrupt layout on page {page}: {reason}")]
    CorruptLayout { page: PageId, reason: String },
    #[error("no run backs offset {offset}")]
    EmptySpanOnInvalidOffset { offset: usize },
    #[error("text not found")]
    NotFound,
    #[error("span crosses from page {start_page} to page {end_page}; split it per page")]
    CrossPageSpanUnsupported { start_page: PageId, end_page: PageId },
    #[error("unknown page {0}")]
    UnknownPage(PageId),
}

impl HighlightError {
    /// Whether the caller should simply show no highlight.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub(crate) fn corrupt(page: &PageId, reason: impl Into<String>) -> Self {
        Self::CorruptLayout { page: page.clone(), reason: reason.into() }
    }
}
