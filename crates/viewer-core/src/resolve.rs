use crate::error::HighlightError;
use crate::geometry::{merge_line, slice_rect};
use crate::offset_index::OffsetIndex;
use doc_model::{Page, Rectangle, Span};
use tracing::trace;

/// Resolves a half-open char span on `page` to one rectangle per visual line it touches.
///
/// `index` must have been built from `page`. Empty spans and spans that only cover separator
/// whitespace yield a single zero-width rectangle at the start offset.
pub fn resolve_span(
    page: &Page,
    index: &OffsetIndex,
    span: Span,
) -> Result<Vec<Rectangle>, HighlightError> {
    if span.start > span.end {
        return Err(HighlightError::InvalidSpan { start: span.start, end: span.end });
    }

    if span.end > index.len() {
        return Err(HighlightError::OutOfRange { offset: span.end, len: index.len() });
    }

    if span.is_empty() {
        return Ok(vec![caret(page, index, span.start)?]);
    }

    let first = index.locate(span.start)?;
    let last = index.locate(span.end - 1)?;

    let mut pieces: Vec<(usize, Rectangle)> = Vec::new();

    for position in first.position..=last.position {
        let Some(entry) = index.entry(position) else {
            break;
        };
        let run = page
            .run(entry.run)
            .ok_or(HighlightError::EmptySpanOnInvalidOffset { offset: span.start })?;

        if run.is_anchor() {
            continue;
        }

        let start = span.start.max(run.start_index);
        let end = span.end.min(run.end_index);
        if start >= end {
            continue;
        }

        let rect = slice_rect(page.index(), run, start - run.start_index, end - run.start_index);
        if rect.anchor {
            continue;
        }

        pieces.push((entry.line, rect));
    }

    if pieces.is_empty() {
        return Ok(vec![caret(page, index, span.start)?]);
    }

    let mut rectangles = Vec::new();
    let mut group: Vec<Rectangle> = Vec::new();
    let mut group_line = pieces[0].0;

    for (line, rect) in pieces {
        if line != group_line {
            flush(page, group_line, &mut group, &mut rectangles);
            group_line = line;
        }
        group.push(rect);
    }
    flush(page, group_line, &mut group, &mut rectangles);

    trace!(
        page = %page.id(),
        start = span.start,
        end = span.end,
        rects = rectangles.len(),
        "resolved span"
    );
    Ok(rectangles)
}

fn flush(page: &Page, line: usize, group: &mut Vec<Rectangle>, out: &mut Vec<Rectangle>) {
    let line_box = page.line(line).and_then(|line| line.bounding_box());
    if let Some(rect) = merge_line(group, line_box.as_ref()) {
        out.push(rect);
    }
    group.clear();
}

fn caret(page: &Page, index: &OffsetIndex, offset: usize) -> Result<Rectangle, HighlightError> {
    let owner = index.locate(offset)?;
    let run = page.run(owner.run).ok_or(HighlightError::EmptySpanOnInvalidOffset { offset })?;

    let local = offset.saturating_sub(run.start_index).min(run.len());
    let mut rect = slice_rect(page.index(), run, local, local);
    rect.width = 0.0;
    rect.anchor = true;

    Ok(rect)
}
