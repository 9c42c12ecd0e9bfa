//! Rectangles for whole runs, parts of runs, and merged line spans.

use doc_model::{Rectangle, Run, TextPosition};

/// Rectangle covering chars `local_start..local_end` of `run`.
///
/// Horizontal position is interpolated proportionally to char count, which assumes uniform
/// glyph width inside a run. A full-run request returns the stored box untouched and anchors
/// always return their stored zero-width box. Out-of-range local offsets are clamped.
pub fn slice_rect(page_index: u32, run: &Run, local_start: usize, local_end: usize) -> Rectangle {
    let len = run.len();

    if len == 0 {
        let mut rect = Rectangle::from_position(page_index, &run.position);
        rect.anchor = true;
        return rect;
    }

    let local_end = local_end.min(len);
    let local_start = local_start.min(local_end);

    if local_start == 0 && local_end == len {
        return Rectangle::from_position(page_index, &run.position);
    }

    let position = &run.position;
    let left = position.left + position.width * (local_start as f32 / len as f32);
    let width = position.width * ((local_end - local_start) as f32 / len as f32);

    Rectangle {
        page_index,
        top: position.top,
        left,
        width,
        height: position.height,
        anchor: width <= 0.0,
    }
}

/// Joins rectangles of one visual line into a single rectangle.
///
/// Horizontal extent comes from the pieces; vertical extent from the line box, widened to the
/// pieces so the result always covers them.
pub fn merge_line(pieces: &[Rectangle], line_box: Option<&TextPosition>) -> Option<Rectangle> {
    let (first, rest) = pieces.split_first()?;

    if rest.is_empty() {
        return Some(*first);
    }

    let mut left = first.left;
    let mut right = first.right();
    let mut top = first.top;
    let mut bottom = first.bottom();

    for piece in rest {
        left = left.min(piece.left);
        right = right.max(piece.right());
        top = top.min(piece.top);
        bottom = bottom.max(piece.bottom());
    }

    if let Some(line_box) = line_box {
        top = top.min(line_box.top);
        bottom = bottom.max(line_box.bottom());
    }

    Some(Rectangle {
        page_index: first.page_index,
        top,
        left,
        width: right - left,
        height: bottom - top,
        anchor: false,
    })
}
