use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use doc_model::{Document, PageId, PdfHighlight, Rectangle};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{read_settings_file, Storage, StorageError};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use viewer_core::{Citation, HighlightError, Highlighter, MatchSettings, TextMatch};

const LOG_ENV: &str = "BUTTERPAPER_LOG";
const DATA_DIR_ENV: &str = "BUTTERPAPER_DATA_DIR";

#[derive(Debug, Parser)]
#[command(name = "butterpaper-highlight")]
#[command(about = "Map citations in extracted PDF text to highlight rectangles")]
pub struct Cli {
    /// Read match settings from this file instead of the stored ones.
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,
    /// Override the similarity threshold for tolerant matching.
    #[arg(long, global = true)]
    threshold: Option<f32>,
    /// Log engine decisions to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Summarize a document and check every page layout.
    Info {
        #[arg(value_name = "DOCUMENT")]
        file: PathBuf,
    },
    /// Rectangles for a char offset range on one page.
    Resolve {
        #[arg(value_name = "DOCUMENT")]
        file: PathBuf,
        #[arg(long)]
        page: String,
        #[arg(long)]
        start: usize,
        #[arg(long)]
        end: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Locate text on one page and print where it matched.
    Locate {
        #[arg(value_name = "DOCUMENT")]
        file: PathBuf,
        #[arg(long)]
        page: String,
        text: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Highlight a citation given as JSON, or `@FILE` to read it from a file.
    Highlight {
        #[arg(value_name = "DOCUMENT")]
        file: PathBuf,
        citation: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Search every page for text, best matches first.
    Search {
        #[arg(value_name = "DOCUMENT")]
        file: PathBuf,
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, clap::Args)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = Format::Rectangles)]
    format: Format,
    /// Highlight color for `--format pdf`, as an rgba() string.
    #[arg(long)]
    color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Engine rectangles with 0-based page indexes.
    Rectangles,
    /// Viewer highlights with 1-based pages; anchors are dropped.
    Pdf,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Shapes {
    Rectangles(Vec<Rectangle>),
    Pdf(Vec<PdfHighlight>),
}

impl OutputArgs {
    fn shapes(&self, rectangles: Vec<Rectangle>) -> Shapes {
        match self.format {
            Format::Rectangles => Shapes::Rectangles(rectangles),
            Format::Pdf => Shapes::Pdf(
                rectangles
                    .iter()
                    .filter(|rect| rect.is_drawable())
                    .map(|rect| rect.to_pdf_highlight(self.color.as_deref()))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    page_count: usize,
    pages: Vec<PageInfo>,
    path: String,
    run_count: usize,
}

#[derive(Debug, Serialize)]
struct PageInfo {
    anchors: usize,
    chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    id: PageId,
    index: u32,
    lines: usize,
    runs: usize,
}

#[derive(Debug, Serialize)]
struct HighlightOutput {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    matched: Option<TextMatch>,
    highlights: Shapes,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Info { file } => run_info(file),
        Commands::Resolve { file, page, start, end, output } => {
            let highlighter = open(file, &cli)?;
            let rectangles = highlighter
                .resolve(&PageId::new(page.as_str()), *start, *end)
                .with_context(|| format!("failed to resolve {start}..{end} on page {page}"))?;
            print_json(&HighlightOutput { matched: None, highlights: output.shapes(rectangles) })
        }
        Commands::Locate { file, page, text, output } => {
            let highlighter = open(file, &cli)?;
            let page_id = PageId::new(page.as_str());
            let (matched, rectangles) = match highlighter.locate_match(&page_id, text) {
                Ok(located) => (Some(located.matched), located.rectangles),
                Err(HighlightError::NotFound) => {
                    warn!(page = page.as_str(), "text not found");
                    (None, Vec::new())
                }
                Err(error) => {
                    return Err(error)
                        .with_context(|| format!("failed to locate text on page {page}"));
                }
            };
            print_json(&HighlightOutput { matched, highlights: output.shapes(rectangles) })
        }
        Commands::Highlight { file, citation, output } => {
            let highlighter = open(file, &cli)?;
            let citation = parse_citation(citation)?;
            let rectangles = match highlighter.highlight(&citation) {
                Ok(rectangles) => rectangles,
                Err(HighlightError::NotFound) => {
                    warn!("citation text not found");
                    Vec::new()
                }
                Err(error) => return Err(error).context("failed to highlight citation"),
            };
            print_json(&HighlightOutput { matched: None, highlights: output.shapes(rectangles) })
        }
        Commands::Search { file, query, limit } => {
            let highlighter = open(file, &cli)?;
            print_json(&highlighter.search(query, *limit))
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_info(file: &Path) -> Result<()> {
    let document = load_document(file)?;
    let highlighter = Highlighter::new(document, MatchSettings::default());

    let failures = highlighter.warm();
    let pages = highlighter
        .document()
        .pages()
        .iter()
        .map(|page| PageInfo {
            anchors: page.runs().iter().filter(|run| run.is_anchor()).count(),
            chars: page.char_len(),
            error: failures
                .iter()
                .find(|(id, _)| id == page.id())
                .map(|(_, error)| error.to_string()),
            id: page.id().clone(),
            index: page.index(),
            lines: page.lines().len(),
            runs: page.runs().len(),
        })
        .collect();

    let payload = InfoOutput {
        page_count: highlighter.document().page_count(),
        pages,
        path: file.display().to_string(),
        run_count: highlighter.document().run_count(),
    };

    print_json(&payload)
}

fn open(file: &Path, cli: &Cli) -> Result<Highlighter> {
    let document = load_document(file)?;
    let settings = load_settings(cli)?;
    debug!(
        pages = document.page_count(),
        threshold = settings.similarity_threshold,
        "document loaded"
    );

    Ok(Highlighter::new(document, settings))
}

fn load_document(file: &Path) -> Result<Document> {
    ensure_file_exists(file)?;

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    Document::from_json_slice(&bytes)
        .with_context(|| format!("failed to parse document {}", file.display()))
}

/// Stored (or `--settings`) settings, then environment overrides, then `--threshold`.
fn load_settings(cli: &Cli) -> Result<MatchSettings> {
    let base = match &cli.settings {
        Some(path) => {
            ensure_file_exists(path)?;
            read_settings_file(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?
        }
        None => stored_settings()?,
    };

    let mut settings = base.apply_env().context("invalid settings in environment")?;

    if let Some(threshold) = cli.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("--threshold must be between 0 and 1");
        }
        settings = settings.with_threshold(threshold);
    }

    Ok(settings)
}

fn stored_settings() -> Result<MatchSettings> {
    let storage = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => Storage::with_root(dir),
        None => match Storage::from_default_project() {
            Ok(storage) => storage,
            Err(StorageError::NoDataDirectory) => {
                debug!("no data directory, using default settings");
                return Ok(MatchSettings::default());
            }
            Err(error) => return Err(error.into()),
        },
    };

    storage
        .load_settings()
        .with_context(|| format!("failed to load settings from {}", storage.root().display()))
}

fn parse_citation(raw: &str) -> Result<Citation> {
    let json = match raw.strip_prefix('@') {
        Some(path) => {
            let path = Path::new(path);
            ensure_file_exists(path)?;
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
        }
        None => raw.to_owned(),
    };

    serde_json::from_str(&json).context("invalid citation JSON")
}

fn print_json<T: Serialize>(payload: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(payload)?;
    println!("{json}");
    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
