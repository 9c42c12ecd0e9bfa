//! Finding citation text in a page whose extracted text may differ in whitespace, hyphenation,
//! ligatures, quotes or case.
//!
//! A query that occurs verbatim in the page text matches there. Otherwise exact search over
//! normalized text runs next, and when the query is still absent the locator falls back to a
//! semi-global edit-distance alignment: the query must be matched completely while the page
//! window is free to start and end anywhere. Cost is `O(query × page)` and queries longer than
//! [`MatchSettings::max_fuzzy_query_chars`] skip the fallback.

use crate::normalize::{normalize, NormalizeOptions, NormalizedText};
use crate::settings::MatchSettings;
use doc_model::{Page, Span};
use serde::Serialize;
use tracing::debug;

/// Where a query matched on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextMatch {
    /// Span in the page's original text.
    pub span: Span,
    /// 1.0 for exact matches, otherwise 1 - edit distance / longer length.
    pub score: f32,
    pub edit_distance: usize,
    pub exact: bool,
}

impl TextMatch {
    fn exact(span: Span) -> Self {
        Self { span, score: 1.0, edit_distance: 0, exact: true }
    }
}

/// Normalized form of a page's text used by [`find_in`].
pub fn normalize_page(page: &Page, settings: &MatchSettings) -> NormalizedText {
    let options = NormalizeOptions::from(settings);
    normalize(page.text(), &page.line_end_offsets(), options)
}

/// Normalizes `page` and locates `query` in it.
pub fn find(page: &Page, query: &str, settings: &MatchSettings) -> Option<TextMatch> {
    find_in(page, &normalize_page(page, settings), query, settings)
}

/// Locates `query` in `page`, reusing its already-normalized text.
///
/// Verbatim occurrences win, so an unmodified substring of the page text always maps back to
/// its own offsets (the first such occurrence when it repeats).
pub fn find_in(
    page: &Page,
    normalized: &NormalizedText,
    query: &str,
    settings: &MatchSettings,
) -> Option<TextMatch> {
    if query.trim().is_empty() || normalized.is_empty() {
        return None;
    }

    if let Some(span) = verbatim_hit(page.text(), query) {
        return Some(TextMatch::exact(span));
    }

    let options = NormalizeOptions::from(settings);
    let trimmed = normalize(query, &[], options);
    let edged = normalize(query, &[], options.keep_edges());

    for candidate in [&edged, &trimmed] {
        let hits = exact_hits(normalized, candidate);
        let Some(&first) = hits.first() else {
            continue;
        };

        if hits.len() > 1 {
            debug!(query = candidate.as_str(), "query occurs more than once, taking the first");
        }
        return Some(TextMatch::exact(normalized.to_original(first, first + candidate.len())));
    }

    let query = trimmed;
    let query_len = query.len();
    if query_len < settings.min_query_chars || query_len > settings.max_fuzzy_query_chars {
        debug!(query_len, "query outside tolerant matching limits");
        return None;
    }

    let delta = settings.length_delta(query_len);
    if normalized.len() + delta < query_len {
        return None;
    }

    let window = best_window(normalized.chars(), query.chars(), delta)?;

    let candidate: String = normalized.chars()[window.start..window.end].iter().collect();
    let edit_distance = strsim::levenshtein(&candidate, query.as_str());
    let score = similarity(edit_distance, query_len, window.len());

    debug!(
        query_len,
        start = window.start,
        end = window.end,
        edit_distance,
        score,
        threshold = settings.similarity_threshold,
        "tolerant match candidate"
    );

    if score < settings.similarity_threshold {
        return None;
    }

    Some(TextMatch {
        span: normalized.to_original(window.start, window.end),
        score,
        edit_distance,
        exact: false,
    })
}

/// Char span of the first verbatim occurrence of `query` in `text`.
fn verbatim_hit(text: &str, query: &str) -> Option<Span> {
    let byte = text.find(query)?;
    let start = text[..byte].chars().count();
    Some(Span::new(start, start + query.chars().count()))
}

/// Start offsets (normalized chars) of the first two occurrences of `query`, overlaps included.
fn exact_hits(page: &NormalizedText, query: &NormalizedText) -> Vec<usize> {
    let haystack = page.as_str();
    let needle = query.as_str();
    let mut hits = Vec::with_capacity(2);
    let mut from = 0;

    while hits.len() < 2 {
        let Some(found) = haystack[from..].find(needle) else {
            break;
        };

        let byte = from + found;
        hits.push(page.char_at_byte(byte));

        let step = haystack[byte..].chars().next().map_or(1, char::len_utf8);
        from = byte + step;
        if from > haystack.len() {
            break;
        }
    }

    hits
}

fn similarity(edit_distance: usize, query_len: usize, window_len: usize) -> f32 {
    let longest = query_len.max(window_len).max(1);
    1.0 - edit_distance as f32 / longest as f32
}

/// Best page window for `query` whose length is within `delta` of the query length.
///
/// Ties on score go to the lowest start offset, then to the shortest window.
fn best_window(text: &[char], query: &[char], delta: usize) -> Option<Span> {
    let n = text.len();
    let m = query.len();

    // Row i holds, for every text prefix end j, the cheapest alignment of query[..i] ending at
    // j and the text offset where that alignment starts.
    let mut cost: Vec<usize> = vec![0; n + 1];
    let mut start: Vec<usize> = (0..=n).collect();
    let mut next_cost = vec![0; n + 1];
    let mut next_start = vec![0; n + 1];

    for (i, &q) in query.iter().enumerate() {
        next_cost[0] = i + 1;
        next_start[0] = 0;

        for j in 1..=n {
            let substitution = cost[j - 1] + usize::from(text[j - 1] != q);
            let skip_query = cost[j] + 1;
            let skip_text = next_cost[j - 1] + 1;

            if substitution <= skip_query && substitution <= skip_text {
                next_cost[j] = substitution;
                next_start[j] = start[j - 1];
            } else if skip_query <= skip_text {
                next_cost[j] = skip_query;
                next_start[j] = start[j];
            } else {
                next_cost[j] = skip_text;
                next_start[j] = next_start[j - 1];
            }
        }

        std::mem::swap(&mut cost, &mut next_cost);
        std::mem::swap(&mut start, &mut next_start);
    }

    let mut best: Option<(f32, Span)> = None;

    for end in 1..=n {
        let begin = start[end];
        let len = end - begin;
        if len == 0 || len.abs_diff(m) > delta {
            continue;
        }

        let score = similarity(cost[end], m, len);
        let better = match best {
            None => true,
            Some((best_score, best_span)) => {
                score > best_score + f32::EPSILON
                    || ((score - best_score).abs() <= f32::EPSILON
                        && (begin, len) < (best_span.start, best_span.len()))
            }
        };

        if better {
            best = Some((score, Span::new(begin, end)));
        }
    }

    best.map(|(_, span)| span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Run, TextPosition};

    fn page_of(words: &[&str]) -> Page {
        let mut text = String::new();
        let mut runs = Vec::new();

        for (i, word) in words.iter().enumerate() {
            if !text.is_empty() {
                text.push(' ');
            }
            let start = text.chars().count();
            text.push_str(word);
            runs.push(Run::new(*word, TextPosition::new(0.1, 0.05 * i as f32, 0.04, 0.01), start));
        }

        Page::new("p", 0, text, vec![runs])
    }

    fn settings() -> MatchSettings {
        MatchSettings::default()
    }

    #[test]
    fn exact_substring_returns_original_offsets() {
        let page = page_of(&["deep", "learning", "based", "approach"]);
        let found = find(&page, "learning based", &settings()).expect("should match");

        assert_eq!(found.span, Span::new(5, 19));
        assert!(found.exact);
        assert_eq!(found.edit_distance, 0);
        assert_eq!(found.score, 1.0);
    }

    #[test]
    fn whitespace_and_case_differences_still_match_exactly() {
        let page = page_of(&["Traffic", "Data", "Imputation"]);
        let found = find(&page, "  traffic\n DATA ", &settings()).expect("should match");

        assert_eq!(found.span, Span::new(0, 12));
        assert!(found.exact);
    }

    #[test]
    fn repeated_text_resolves_to_first_occurrence() {
        let page = page_of(&["data", "in", "data", "out"]);
        let found = find(&page, "data", &settings()).expect("should match");

        assert_eq!(found.span, Span::new(0, 4));
    }

    #[test]
    fn typos_fall_back_to_tolerant_match() {
        let page = page_of(&["we", "propose", "a", "stacked", "denoising", "autoencoder", "model"]);
        let found = find(&page, "stacked denoisng autoencodr", &settings()).expect("should match");

        assert!(!found.exact);
        assert_eq!(found.edit_distance, 2);
        assert_eq!(page.slice(found.span), "stacked denoising autoencoder");
        assert!(found.score > 0.9);
    }

    #[test]
    fn unrelated_text_is_not_found() {
        let page = page_of(&["we", "propose", "a", "stacked", "denoising", "autoencoder"]);
        assert_eq!(find(&page, "convolutional transformer", &settings()), None);
    }

    #[test]
    fn tiny_queries_never_match_tolerantly() {
        let page = page_of(&["alpha", "beta"]);
        assert_eq!(find(&page, "x", &settings()), None);
    }

    #[test]
    fn long_queries_skip_the_fallback() {
        let page = page_of(&["stacked", "denoising", "autoencoder"]);
        let capped = settings().with_max_fuzzy_query_chars(10);

        assert_eq!(find(&page, "stacked denoisng autoencoder", &capped), None);
        assert!(find(&page, "stacked denoising autoencoder", &capped).is_some());
    }

    #[test]
    fn query_longer_than_page_is_not_found() {
        let page = page_of(&["short"]);
        assert_eq!(find(&page, "a much longer citation than the page", &settings()), None);
    }

    #[test]
    fn verbatim_occurrence_beats_earlier_case_variant() {
        let page = page_of(&["Data", "driven", "data"]);
        let found = find(&page, "data", &settings()).expect("should match");

        assert_eq!(found.span, Span::new(12, 16));
        assert!(found.exact);
    }

    #[test]
    fn edge_whitespace_in_the_query_is_kept() {
        let page = page_of(&["alpha", "beta", "gamma"]);

        let trailing = find(&page, "beta ", &settings()).expect("should match");
        assert_eq!(trailing.span, Span::new(6, 11));

        let folded = find(&page, " BETA", &settings()).expect("should match");
        assert_eq!(folded.span, Span::new(5, 10));
    }

    #[test]
    fn hyphen_joining_works_when_lines_arrive_out_of_order() {
        let at = |left: f32| TextPosition::new(0.1, left, 0.1, 0.01);
        let page = Page::new(
            "p",
            0,
            "recon- struction works",
            vec![
                vec![Run::new("struction", at(0.1), 7), Run::new("works", at(0.3), 17)],
                vec![Run::new("recon-", at(0.5), 0)],
            ],
        );

        let found = find(&page, "reconstruction", &settings()).expect("should match");
        assert_eq!(found.span, Span::new(0, 16));
        assert!(found.exact);
    }

    #[test]
    fn hyphen_joining_can_be_disabled() {
        let page = Page::new(
            "p",
            0,
            "recon- struction",
            vec![
                vec![Run::new("recon-", TextPosition::new(0.1, 0.1, 0.1, 0.01), 0)],
                vec![Run::new("struction", TextPosition::new(0.12, 0.1, 0.1, 0.01), 7)],
            ],
        );

        let joined = find(&page, "reconstruction", &settings()).expect("should match");
        assert!(joined.exact);

        let literal = settings().with_hyphen_joining(false);
        let found = find(&page, "reconstruction", &literal).expect("should match tolerantly");
        assert!(!found.exact);
    }

    #[test]
    fn ligatures_only_match_exactly_when_folded() {
        let page = page_of(&["e\u{FB03}cient", "coding"]);

        assert!(find(&page, "efficient coding", &settings()).is_some_and(|found| found.exact));

        let unfolded = settings().with_compatibility_folding(false);
        let found = find(&page, "efficient coding", &unfolded).expect("should match tolerantly");
        assert!(!found.exact);
    }

    #[test]
    fn best_window_prefers_lowest_start_on_ties() {
        let text: Vec<char> = "abxd abyd".chars().collect();
        let query: Vec<char> = "abzd".chars().collect();

        assert_eq!(best_window(&text, &query, 2), Some(Span::new(0, 4)));
    }

    #[test]
    fn exact_hits_include_overlaps() {
        let options = NormalizeOptions::default();
        let page = normalize("aaa", &[], options);
        let query = normalize("aa", &[], options);

        assert_eq!(exact_hits(&page, &query), vec![0, 1]);
    }
}
