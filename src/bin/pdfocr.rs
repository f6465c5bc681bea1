//! CLI binary for edgequake-pdfocr.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, prints each page block and writes the output PDF.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfocr::pipeline::recognize::resolve_recognizer;
use edgequake_pdfocr::{
    extract_to_dir, extract_to_pdf, inspect, Delivery, ExtractionConfig,
    ExtractionProgressCallback, FailurePolicy, OcrModelPaths, PageSelection, PipelineStage,
    ProgressCallback, RecognizerKind, TesseractOptions, DEFAULT_PAGE_LABEL,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress callback: a live progress bar plus one log line per
/// page, printed above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Start as a spinner; `on_extraction_start` turns it into a bar.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Recognising");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::FileReceived => self.bar.set_message("Reading PDF…"),
            PipelineStage::DocumentWritten => self.bar.set_message("Writing PDF…"),
            _ => {}
        }
    }

    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Recognising {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages recognised",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages recognised  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a scanned PDF; text on stdout, PDF in ./texto_extraido-XXXXXX.pdf
  pdfocr escaneo.pdf

  # Spanish language pack, explicit output file
  pdfocr --lang spa escaneo.pdf -o texto.pdf

  # Pure-Rust OCR with models from a custom directory
  pdfocr --engine ocrs --models ~/models/ocrs escaneo.pdf

  # Vision model, specific pages, abort on the first failed page
  pdfocr --engine vision --model gpt-4.1-mini --pages 1-5 --fail-fast escaneo.pdf

  # Inspect PDF metadata (no OCR)
  pdfocr --inspect-only escaneo.pdf

  # JSON output for scripting
  pdfocr --json escaneo.pdf > resultado.json

ENGINES:
  tesseract (default)  needs the `tesseract` binary and language packs
                       (apt install tesseract-ocr tesseract-ocr-spa)
  ocrs                 needs text-detection.rten and text-recognition.rten,
                       downloaded to ~/.cache/ocrs by running `ocrs-cli` once
  vision               needs an LLM API key (OPENAI_API_KEY, ANTHROPIC_API_KEY, …)

ENVIRONMENT VARIABLES:
  PDFOCR_*                Every flag, e.g. PDFOCR_ENGINE=vision PDFOCR_DPI=200
  PDFIUM_LIB_PATH         Directory (or file) holding libpdfium
  OPENAI_API_KEY          OpenAI API key (vision engine)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. edgequake_pdfocr=debug)
"#;

/// Extract text from scanned PDFs with OCR or vision models.
#[derive(Parser, Debug)]
#[command(
    name = "pdfocr",
    version,
    about = "Extract text from scanned PDFs with OCR or vision models",
    long_about = "Rasterise every page of a PDF, recognise its text with tesseract, ocrs or a \
vision LLM, print one 'Página N:' block per page and write the text to a new PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the generated PDF here instead of a unique texto_extraido-*.pdf.
    #[arg(short, long, env = "PDFOCR_OUTPUT")]
    output: Option<PathBuf>,

    /// Recognition engine.
    #[arg(long, env = "PDFOCR_ENGINE", value_enum, default_value = "tesseract")]
    engine: EngineArg,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDFOCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDFOCR_PAGES", default_value = "all")]
    pages: String,

    /// Tesseract language pack(s), e.g. spa or eng+spa.
    #[arg(long, env = "PDFOCR_LANG")]
    lang: Option<String>,

    /// Tesseract binary.
    #[arg(long, env = "PDFOCR_TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// Directory holding the ocrs .rten models (default: ~/.cache/ocrs).
    #[arg(long, env = "PDFOCR_MODELS")]
    models: Option<PathBuf>,

    /// Vision model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "PDFOCR_MODEL")]
    model: Option<String>,

    /// Vision provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PDFOCR_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a custom vision system prompt.
    #[arg(long, env = "PDFOCR_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Retries per page on vision API failure (0–10).
    #[arg(long, env = "PDFOCR_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Label placed before each page number.
    #[arg(long, env = "PDFOCR_LABEL", default_value = DEFAULT_PAGE_LABEL)]
    label: String,

    /// Abort on the first failed page instead of skipping it.
    #[arg(long, env = "PDFOCR_FAIL_FAST")]
    fail_fast: bool,

    /// Pages recognised at once (output order is unaffected).
    #[arg(short, long, env = "PDFOCR_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFOCR_PASSWORD")]
    password: Option<String>,

    /// Per-page recognition timeout in seconds (0 = none).
    #[arg(long, env = "PDFOCR_PAGE_TIMEOUT", default_value_t = 300)]
    page_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFOCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON instead of page blocks.
    #[arg(long, env = "PDFOCR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFOCR_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no OCR.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFOCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFOCR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Tesseract,
    Ocrs,
    Vision,
}

impl From<EngineArg> for RecognizerKind {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Tesseract => RecognizerKind::Tesseract,
            EngineArg::Ocrs => RecognizerKind::Ocrs,
            EngineArg::Vision => RecognizerKind::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
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
        let meta = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
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
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let mut config = build_config(&cli, progress_cb).await?;

    // Resolve the engine up front so its warnings print before the bar.
    let recognizer = resolve_recognizer(&config)
        .await
        .context("Recognition engine is not available")?;
    if !cli.quiet {
        for warning in recognizer.preflight() {
            eprintln!("{} {}", yellow("⚠"), warning);
        }
    }
    config.recognizer = Some(recognizer);

    // ── Run extraction ───────────────────────────────────────────────────
    let delivery = match cli.output {
        Some(ref output_path) => extract_to_pdf(&cli.input, output_path, &config)
            .await
            .context("Extraction failed")?,
        None => extract_to_dir(&cli.input, &config, Some(Path::new(".")))
            .await
            .context("Extraction failed")?,
    };

    // ── Display ──────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&delivery).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for block in &delivery.texts {
            writeln!(handle, "{block}").context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet && !cli.json {
        print_summary(&delivery, show_progress);
    }

    Ok(())
}

fn print_summary(delivery: &Delivery, show_progress: bool) {
    let stats = &delivery.stats;
    let selected = stats.processed_pages + stats.failed_pages + stats.skipped_pages;

    if !show_progress {
        eprintln!(
            "Recognised {}/{} pages in {}ms",
            stats.processed_pages, selected, stats.total_duration_ms
        );
        for failure in &delivery.failures {
            eprintln!("  {} {}", red("✗"), failure);
        }
    }

    eprintln!(
        "{}  {} output pages  →  {}",
        if stats.failed_pages == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        delivery.output_pages,
        bold(&delivery.pdf_path.display().to_string()),
    );
    if stats.total_input_tokens > 0 {
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let pages = parse_pages(&cli.pages)?;

    let mut builder = ExtractionConfig::builder()
        .engine(cli.engine.into())
        .dpi(cli.dpi)
        .pages(pages)
        .tesseract(TesseractOptions {
            binary: cli.tesseract_bin.clone(),
            language: cli.lang.clone(),
        })
        .page_label(cli.label.clone())
        .failure_policy(if cli.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::SkipPage
        })
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .page_timeout_secs(cli.page_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref dir) = cli.models {
        builder = builder.ocr_models(OcrModelPaths::from_dir(dir));
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
