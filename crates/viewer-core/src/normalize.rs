//! Lossy text normalization with an exact path back to original offsets.
//!
//! Every normalized char records the original char offset it came from, so a match found in
//! normalized text can be translated back to a span of the page text.

use crate::settings::MatchSettings;
use doc_model::Span;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub case_insensitive: bool,
    pub fold_compatibility: bool,
    pub join_line_break_hyphens: bool,
    /// Drop whitespace before the first and after the last visible char.
    pub trim_edges: bool,
}

impl NormalizeOptions {
    /// Keeps leading and trailing whitespace as a single space each.
    pub fn keep_edges(self) -> Self {
        Self { trim_edges: false, ..self }
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self::from(&MatchSettings::default())
    }
}

impl From<&MatchSettings> for NormalizeOptions {
    fn from(settings: &MatchSettings) -> Self {
        Self {
            case_insensitive: settings.case_insensitive,
            fold_compatibility: settings.fold_compatibility,
            join_line_break_hyphens: settings.join_line_break_hyphens,
            trim_edges: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedText {
    text: String,
    chars: Vec<char>,
    origins: Vec<usize>,
    byte_starts: Vec<usize>,
    source_len: usize,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Original char offset the normalized char at `index` derives from.
    pub fn origin(&self, index: usize) -> Option<usize> {
        self.origins.get(index).copied()
    }

    /// Char index of the normalized char starting at byte `byte` of [`Self::as_str`].
    pub fn char_at_byte(&self, byte: usize) -> usize {
        self.byte_starts.partition_point(|&start| start < byte)
    }

    /// Translates normalized `[start, end)` back to a span of the original text.
    ///
    /// The end maps past the original char the last normalized char came from, so a match
    /// ending inside an expanded ligature still covers the whole ligature.
    pub fn to_original(&self, start: usize, end: usize) -> Span {
        if start >= end || start >= self.origins.len() {
            let offset = self.origins.get(start).copied().unwrap_or(self.source_len);
            return Span::at(offset);
        }

        let end = end.min(self.origins.len());
        Span::new(self.origins[start], self.origins[end - 1] + 1)
    }

    fn push(&mut self, c: char, origin: usize) {
        self.byte_starts.push(self.text.len());
        self.text.push(c);
        self.chars.push(c);
        self.origins.push(origin);
    }
}

/// Normalizes `text` for matching.
///
/// Whitespace runs collapse to one space (dropped at either end unless
/// [`NormalizeOptions::keep_edges`] is set), soft hyphens vanish, typographic quotes and dashes
/// become ASCII, compatibility characters are NFKC-folded and case is folded when enabled.
/// `line_ends` holds sorted char offsets where visual lines end; a `-` right before one, between
/// letters, is dropped together with the break.
pub fn normalize(text: &str, line_ends: &[usize], options: NormalizeOptions) -> NormalizedText {
    let source: Vec<char> = text.chars().collect();
    let mut out = NormalizedText { source_len: source.len(), ..NormalizedText::default() };
    out.text.reserve(text.len());

    let mut pending_space: Option<usize> = None;
    let mut swallow_break = false;
    let trim = options.trim_edges;

    for (offset, &c) in source.iter().enumerate() {
        if c == '\u{00AD}' {
            continue;
        }

        if c.is_whitespace() {
            if !swallow_break && (!trim || !out.is_empty()) && pending_space.is_none() {
                pending_space = Some(offset);
            }
            continue;
        }

        let joins_break = options.join_line_break_hyphens
            && is_line_break_hyphen(&source, offset, line_ends, &out);
        if joins_break {
            swallow_break = true;
            continue;
        }
        swallow_break = false;

        let emit = |folded: char, out: &mut NormalizedText, pending: &mut Option<usize>| {
            if folded.is_whitespace() {
                if (!trim || !out.is_empty()) && pending.is_none() {
                    *pending = Some(offset);
                }
                return;
            }

            if let Some(space_origin) = pending.take() {
                out.push(' ', space_origin);
            }

            if options.case_insensitive {
                for lower in folded.to_lowercase() {
                    out.push(lower, offset);
                }
            } else {
                out.push(folded, offset);
            }
        };

        let c = fold_punctuation(c);

        if options.fold_compatibility && !c.is_ascii() {
            for folded in std::iter::once(c).nfkc() {
                emit(fold_punctuation(folded), &mut out, &mut pending_space);
            }
        } else {
            emit(c, &mut out, &mut pending_space);
        }
    }

    if let Some(space_origin) = pending_space.filter(|_| !trim) {
        out.push(' ', space_origin);
    }

    out
}

fn is_line_break_hyphen(
    source: &[char],
    offset: usize,
    line_ends: &[usize],
    out: &NormalizedText,
) -> bool {
    if !matches!(source[offset], '-' | '\u{2010}') {
        return false;
    }

    if line_ends.binary_search(&(offset + 1)).is_err() {
        return false;
    }

    let before = out.chars.last().is_some_and(|c| c.is_alphabetic());
    let after =
        source[offset + 1..].iter().find(|c| !c.is_whitespace()).is_some_and(|c| c.is_lowercase());

    before && after
}

fn fold_punctuation(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{00B4}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
        | '\u{00BB}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => '-',
        '\u{2026}' => '.',
        _ => c,
    }
}
