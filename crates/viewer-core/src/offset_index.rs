//! Per-page map from char offset to the run that owns it.
//!
//! Built once per page and read-only afterwards. Runs are ordered by `(start, end)` so anchors
//! sort ahead of the real run that starts at the same offset.

use crate::error::HighlightError;
use doc_model::{Page, PageId};
use tracing::{debug, warn};

/// Reference to a run in the page arena together with its slot in offset order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunRef {
    pub run: usize,
    pub line: usize,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetIndex {
    page: PageId,
    len: usize,
    starts: Vec<usize>,
    ends: Vec<usize>,
    runs: Vec<usize>,
    lines: Vec<usize>,
}

impl OffsetIndex {
    /// Sorts the page's runs by offset and checks that they tile the page text.
    ///
    /// Runs must match the text they claim, must not overlap, and may only leave whitespace
    /// uncovered between them. Anything else is `CorruptLayout`.
    pub fn build(page: &Page) -> Result<Self, HighlightError> {
        let id = page.id();
        let chars: Vec<char> = page.text().chars().collect();
        let len = chars.len();

        for (run_index, run) in page.runs().iter().enumerate() {
            if run.end_index < run.start_index {
                return Err(corrupt(
                    id,
                    format!(
                        "run {run_index} ends before it starts ({}..{})",
                        run.start_index, run.end_index
                    ),
                ));
            }

            if run.end_index > len {
                return Err(corrupt(
                    id,
                    format!("run {run_index} ends at {} past page length {len}", run.end_index),
                ));
            }

            let claimed = &chars[run.start_index..run.end_index];
            let matches_page = run.text.chars().count() == claimed.len()
                && run.text.chars().eq(claimed.iter().copied());
            if !matches_page {
                return Err(corrupt(
                    id,
                    format!(
                        "run {run_index} text {:?} does not match page text at {}..{}",
                        run.text, run.start_index, run.end_index
                    ),
                ));
            }
        }

        let mut order: Vec<usize> = (0..page.runs().len()).collect();
        order.sort_by_key(|&run_index| {
            let run = &page.runs()[run_index];
            (run.start_index, run.end_index, run_index)
        });

        let mut cursor = 0;
        for &run_index in &order {
            let run = &page.runs()[run_index];

            if run.start_index < cursor {
                let what = if run.is_anchor() { "anchor" } else { "run" };
                return Err(corrupt(
                    id,
                    format!(
                        "{what} {run_index} at {} overlaps text ending at {cursor}",
                        run.start_index
                    ),
                ));
            }

            if run.is_anchor() {
                continue;
            }

            check_gap(id, &chars, cursor, run.start_index)?;
            cursor = run.end_index;
        }
        check_gap(id, &chars, cursor, len)?;

        let mut starts = Vec::with_capacity(order.len());
        let mut ends = Vec::with_capacity(order.len());
        let mut lines = Vec::with_capacity(order.len());

        for &run_index in &order {
            let run = &page.runs()[run_index];
            starts.push(run.start_index);
            ends.push(run.end_index);
            lines.push(page.line_of_run(run_index).unwrap_or_default());
        }

        let anchors = order.iter().filter(|&&run_index| page.runs()[run_index].is_anchor()).count();
        debug!(page = %id, runs = order.len(), anchors, len, "built offset index");

        Ok(Self { page: id.clone(), len, starts, ends, runs: order, lines })
    }

    pub fn page(&self) -> &PageId {
        &self.page
    }

    /// Page length in chars.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn entry(&self, position: usize) -> Option<RunRef> {
        let run = *self.runs.get(position)?;
        Some(RunRef { run, line: self.lines[position], position })
    }

    /// Finds the run owning `offset`.
    ///
    /// A non-empty run containing the offset wins. Otherwise an anchor starting exactly at the
    /// offset, otherwise the nearest following run, otherwise the last run on the page.
    pub fn locate(&self, offset: usize) -> Result<RunRef, HighlightError> {
        if offset > self.len {
            return Err(HighlightError::OutOfRange { offset, len: self.len });
        }

        if self.runs.is_empty() {
            return Err(HighlightError::EmptySpanOnInvalidOffset { offset });
        }

        let after = self.starts.partition_point(|&start| start <= offset);
        let mut anchor = None;

        for position in (0..after).rev() {
            let (start, end) = (self.starts[position], self.ends[position]);

            if start == end {
                if start == offset {
                    anchor = Some(position);
                }
                continue;
            }

            if end > offset {
                return self
                    .entry(position)
                    .ok_or(HighlightError::EmptySpanOnInvalidOffset { offset });
            }

            break;
        }

        let position = match anchor {
            Some(position) => position,
            None if after < self.runs.len() => after,
            None => self.last_text_position(),
        };

        self.entry(position).ok_or(HighlightError::EmptySpanOnInvalidOffset { offset })
    }

    fn last_text_position(&self) -> usize {
        (0..self.runs.len())
            .rev()
            .find(|&position| self.ends[position] > self.starts[position])
            .unwrap_or(self.runs.len() - 1)
    }
}

fn check_gap(id: &PageId, chars: &[char], from: usize, to: usize) -> Result<(), HighlightError> {
    if from >= to {
        return Ok(());
    }

    match chars[from..to].iter().position(|c| !c.is_whitespace()) {
        Some(offset) => Err(corrupt(
            id,
            format!("text at offset {} is not covered by any run", from + offset),
        )),
        None => Ok(()),
    }
}

fn corrupt(id: &PageId, reason: String) -> HighlightError {
    warn!(page = %id, %reason, "rejecting page layout");
    HighlightError::corrupt(id, reason)
}
