#![allow(dead_code)]

use doc_model::{Document, Page, Run, TextPosition};

pub const TITLE: &str = "A Deep Learning Based Approach for Traffic Data Imputation";
pub const TITLE_BOX: TextPosition =
    TextPosition { top: 0.1074, left: 0.1403, width: 0.7194, height: 0.026, is_title: true };
pub const FOLIO: &str = "912";
pub const FOLIO_BOX: TextPosition =
    TextPosition { top: 0.95, left: 0.49, width: 0.02, height: 0.01, is_title: false };
pub const FOLIO_START: usize = 6024;

const CHAR_WIDTH: f32 = 0.0075;
const FILLER: [&str; 16] = [
    "sensor", "volume", "loop", "detector", "speed", "highway", "series", "sample", "station",
    "hourly", "signal", "lane", "corridor", "weekday", "pattern", "flow",
];

/// Lays out runs one line at a time, joining runs with a single space like the extractor does.
pub struct PageBuilder {
    id: String,
    index: u32,
    text: String,
    len: usize,
    lines: Vec<Vec<Run>>,
}

impl PageBuilder {
    pub fn new(id: &str, index: u32) -> Self {
        Self { id: id.to_owned(), index, text: String::new(), len: 0, lines: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// One line of runs with explicit boxes, optionally preceded by an anchor at the line start.
    pub fn line(
        &mut self,
        anchor: Option<TextPosition>,
        runs: &[(&str, TextPosition)],
    ) -> &mut Self {
        let mut line = Vec::new();

        for (i, (text, position)) in runs.iter().enumerate() {
            self.separator();
            if i == 0 {
                if let Some(anchor) = anchor {
                    line.push(Run::anchor(self.len, anchor));
                }
            }
            line.push(self.push(text, *position));
        }

        self.lines.push(line);
        self
    }

    /// One line of words placed left to right with a fixed advance per char.
    pub fn flowed(&mut self, words: &[&str], top: f32, height: f32) -> &mut Self {
        let mut line = Vec::new();
        let mut column = 0;

        for word in words {
            self.separator();
            let chars = word.chars().count();
            let left = 0.1 + column as f32 * CHAR_WIDTH;
            let position = TextPosition::new(top, left, chars as f32 * CHAR_WIDTH, height);
            line.push(self.push(word, position));
            column += chars + 1;
        }

        self.lines.push(line);
        self
    }

    pub fn build(self) -> Page {
        Page::new(self.id.as_str(), self.index, self.text, self.lines)
    }

    fn separator(&mut self) {
        if self.len > 0 {
            self.text.push(' ');
            self.len += 1;
        }
    }

    fn push(&mut self, text: &str, position: TextPosition) -> Run {
        let run = Run::new(text, position, self.len);
        self.text.push_str(text);
        self.len += text.chars().count();
        run
    }
}

/// First page of the traffic-imputation paper as the extractor lays it out.
///
/// The title is one run at `0..58` behind a paragraph anchor, a few body lines carry the
/// phrases the tests look for (a line-break hyphen and an `ffi` ligature among them), filler
/// text pads the page and the folio `912` sits at `6024..6027`.
pub fn sample_page() -> Page {
    let mut page = PageBuilder::new("page_1", 0);

    page.line(Some(TextPosition::new(0.1074, 0.1403, 0.0, 0.026)), &[(TITLE, TITLE_BOX)]);
    page.flowed(&["the", "imputation", "component", "for", "missing", "data"], 0.20, 0.012);
    page.flowed(&["we", "propose", "a", "recon-"], 0.215, 0.012);
    page.flowed(
        &["struction", "method", "with", "e\u{FB03}cient", "stacked", "denoising", "autoencoders"],
        0.23,
        0.012,
    );

    let filler = filler_lines(FOLIO_START - 1 - page.len());
    let pitch = 0.64 / filler.len() as f32;
    for (i, words) in filler.iter().enumerate() {
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        page.flowed(&words, 0.26 + i as f32 * pitch, pitch * 0.8);
    }

    page.line(None, &[(FOLIO, FOLIO_BOX)]);
    page.build()
}

pub fn sample_document() -> Document {
    let mut second = PageBuilder::new("page_2", 1);
    second.flowed(&["missing", "traffic", "data", "is", "common"], 0.1, 0.012);
    second.flowed(&["the", "imputation", "component", "for", "sensors"], 0.12, 0.012);

    Document::new(vec![sample_page(), second.build()])
}

/// Words, twelve per line, whose joined text (each word preceded by a space) is exactly `budget`
/// chars long.
fn filler_lines(budget: usize) -> Vec<Vec<String>> {
    let mut words = Vec::new();
    let mut remaining = budget;
    let mut next = 0;

    while remaining > 12 {
        let word = FILLER[next % FILLER.len()];
        next += 1;
        remaining -= word.len() + 1;
        words.push(word.to_owned());
    }
    if remaining > 0 {
        words.push("x".repeat(remaining - 1));
    }

    words.chunks(12).map(<[String]>::to_vec).collect()
}
