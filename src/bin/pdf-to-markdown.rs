//! CLI binary for pdf-to-markdown.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_to_markdown::{
    convert, inspect, ConversionConfig, ConversionOutput, ConversionProgressCallback,
    PageSelection, ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the page total.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, block_count: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{block_count:>4} blocks")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} emitted empty)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion into ./out/report/document.md + ./out/report/images/
  pdf-to-markdown report.pdf

  # Custom output folder, keep smaller images
  pdf-to-markdown report.pdf -o build/docs --min-image-dim 24

  # OCR embedded images (needs the tesseract binary on PATH)
  pdf-to-markdown scan.pdf --ocr --ocr-lang deu

  # Specific pages
  pdf-to-markdown --pages 3-15 book.pdf

  # Inspect PDF metadata
  pdf-to-markdown --inspect-only report.pdf

  # JSON summary (paths, font statistics, per-page counts)
  pdf-to-markdown --json report.pdf > summary.json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to a libpdfium shared library
  RUST_LOG                Overrides the log filter (e.g. pdf_to_markdown=debug)
  PDF2MD_*                Fallback for every flag (see --help)
"#;

/// Convert PDF files to Markdown with extracted images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-to-markdown",
    version,
    about = "Convert PDF files to Markdown with extracted images",
    long_about = "Convert a PDF into a Markdown document plus a folder of extracted images. \
Headings are inferred from font sizes, figure captions are paired with the images they \
describe, and embedded images can optionally be annotated with OCR text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Output folder; the document is written to <OUTPUT>/<pdf stem>/.
    #[arg(short, long, env = "PDF2MD_OUTPUT", default_value = "out")]
    output: PathBuf,

    /// File name of the Markdown document inside the document folder.
    #[arg(long, env = "PDF2MD_MD_FILENAME", default_value = "document.md")]
    md_filename: String,

    /// Skip images narrower or shorter than this many pixels.
    #[arg(long, env = "PDF2MD_MIN_IMAGE_DIM", default_value_t = 40)]
    min_image_dim: u32,

    /// Run OCR on extracted images (requires tesseract).
    #[arg(long, env = "PDF2MD_OCR")]
    ocr: bool,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(long, env = "PDF2MD_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Document title (default: the PDF file stem).
    #[arg(long, env = "PDF2MD_TITLE")]
    title: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2MD_PAGES", default_value = "all")]
    pages: String,

    /// Print the ConversionOutput as JSON on stdout.
    #[arg(long, env = "PDF2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are hidden while the progress bar is drawn.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
            if let Some(ref d) = meta.creation_date {
                println!("Created:      {}", d);
            }
            if let Some(ref d) = meta.modification_date {
                println!("Modified:     {}", d);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.input, &config)
        .await
        .with_context(|| format!("Conversion of '{}' failed", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        println!("Markdown written to: {}", output.markdown_path.display());
    }

    if !cli.quiet && !cli.json {
        print_summary(&output);
    }

    Ok(())
}

fn print_summary(output: &ConversionOutput) {
    let stats = &output.stats;
    eprintln!(
        "   {} images  {}  body {:.1}pt  {}",
        stats.images,
        dim(&format!("({} with OCR text)", stats.ocr_annotated)),
        output.font_stats.body,
        dim(&format!("{}ms", stats.total_duration_ms)),
    );
    if stats.failed_pages > 0 {
        eprintln!("   {} pages could not be read", red(&stats.failed_pages.to_string()));
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages = PageSelection::parse(&cli.pages).context("Invalid --pages value")?;

    let mut builder = ConversionConfig::builder()
        .output_dir(&cli.output)
        .markdown_filename(&cli.md_filename)
        .min_image_dim(cli.min_image_dim)
        .ocr(cli.ocr)
        .ocr_language(&cli.ocr_lang)
        .pages(pages);

    if let Some(ref title) = cli.title {
        builder = builder.title(title);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
