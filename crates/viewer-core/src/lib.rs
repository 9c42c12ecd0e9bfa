//! Maps character offsets in extracted page text to drawable rectangles.
//!
//! [`Highlighter`] is the entry point: give it a [`Document`](doc_model::Document) and it answers
//! span, text and citation queries with rectangles in normalized page space. The lower-level
//! pieces ([`OffsetIndex`], [`resolve_span`], [`find`]) work on one page at a time.

mod error;
mod geometry;
mod highlighter;
mod locate;
mod normalize;
mod offset_index;
mod resolve;
mod settings;

pub use error::HighlightError;
pub use geometry::{merge_line, slice_rect};
pub use highlighter::{Citation, Highlighter, Located, PageLayout, SearchHit};
pub use locate::{find, find_in, normalize_page, TextMatch};
pub use normalize::{normalize, NormalizeOptions, NormalizedText};
pub use offset_index::{OffsetIndex, RunRef};
pub use resolve::resolve_span;
pub use settings::{
    MatchSettings, SettingsError, ENV_CASE_INSENSITIVE, ENV_LENGTH_BAND, ENV_MAX_QUERY,
    ENV_THRESHOLD,
};
