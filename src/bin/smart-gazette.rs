//! CLI binary for smart-gazette.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ProcessingConfig` and prints the resulting records.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smart_gazette::{
    segment, GazetteProcessor, MemoryStore, NoopNotifier, Notifier, NoticeRecord,
    ProcessingConfig, ProcessingStatus, WebhookNotifier,
};
use std::io::{self, Write};
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process a gazette, print records as a table
  smart-gazette process gazette-vol-36.pdf

  # Process and emit the full records as JSON
  smart-gazette process gazette-vol-36.pdf --json > records.json

  # Process, then immediately retry anything that failed
  smart-gazette process gazette-vol-36.pdf --retry-failed

  # Use a specific provider and models
  smart-gazette process gazette.pdf --provider gemini \
      --text-model gemini-2.0-flash --vision-model gemini-2.5-pro

  # Publish high-significance articles to a webhook
  smart-gazette process gazette.pdf --webhook-url https://maker.ifttt.com/trigger/...

  # Count pages and notices without any API key
  smart-gazette inspect gazette.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Add schemas:     one JSON schema per category under schemas/field/
  3. Process:         smart-gazette process gazette.pdf
"#;

/// Process government gazette PDFs into structured articles with generative AI.
#[derive(Parser, Debug)]
#[command(
    name = "smart-gazette",
    version,
    about = "Process government gazette PDFs into structured articles using generative AI",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SMART_GAZETTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SMART_GAZETTE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a gazette PDF end to end and print the resulting records.
    Process(ProcessArgs),
    /// Print page and notice counts without calling any model.
    Inspect {
        /// Local gazette PDF path.
        input: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct ProcessArgs {
    /// Local gazette PDF path.
    input: PathBuf,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, env = "SMART_GAZETTE_PROVIDER")]
    provider: Option<String>,

    /// Model for triage/extraction/generation calls.
    #[arg(long, env = "SMART_GAZETTE_TEXT_MODEL")]
    text_model: Option<String>,

    /// Model for the page-1 vision OCR call.
    #[arg(long, env = "SMART_GAZETTE_VISION_MODEL")]
    vision_model: Option<String>,

    /// Rendering DPI for the vision pass (72–600).
    #[arg(long, env = "SMART_GAZETTE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Retries per generative call.
    #[arg(long, env = "SMART_GAZETTE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Pause between notices, in milliseconds.
    #[arg(long, env = "SMART_GAZETTE_PACING_MS", default_value_t = 500)]
    pacing_ms: u64,

    /// Directory of per-category extraction schemas.
    #[arg(long, env = "SMART_GAZETTE_SCHEMA_DIR", default_value = "schemas/field")]
    schema_dir: PathBuf,

    /// Webhook URL for auto-publishing high-significance articles.
    #[arg(long, env = "SMART_GAZETTE_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Significance (1–10) at which successful articles are auto-published.
    #[arg(long, env = "SMART_GAZETTE_SIGNIFICANCE", default_value_t = 8)]
    significance_threshold: u8,

    /// After processing, run the retry job over any failed records.
    #[arg(long)]
    retry_failed: bool,

    /// Emit the full records as pretty-printed JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Inspect { input } => inspect(&input).await,
        Command::Process(args) => process(args, cli.quiet).await,
    }
}

async fn inspect(input: &PathBuf) -> Result<()> {
    let pages = smart_gazette::ocr::page_count(input)
        .await
        .context("Failed to open PDF")?;
    let text = smart_gazette::ocr::strip_text_from(input, 0)
        .await
        .context("Failed to extract text")?;
    let notices = segment::segment_notices(&text);

    println!("File:      {}", input.display());
    println!("Pages:     {pages}");
    println!("Notices:   {} (structural text only)", notices.len());
    Ok(())
}

async fn process(args: ProcessArgs, quiet: bool) -> Result<()> {
    let config = build_config(&args).context("Invalid configuration")?;

    let store = Arc::new(MemoryStore::new());
    let notifier: Arc<dyn Notifier> = match args.webhook_url {
        Some(ref url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NoopNotifier),
    };

    let processor = GazetteProcessor::new(config, store.clone(), notifier)
        .await
        .context("Failed to initialise processor")?;

    let input = args.input.display().to_string();
    let summary = processor
        .process_document(&input)
        .await
        .context("Processing failed")?;

    if args.retry_failed && summary.failed > 0 {
        let retry = processor
            .retry_failed_notices()
            .await
            .context("Retry job failed")?;
        if !quiet {
            eprintln!(
                "{} retry: {} recovered, {} still failed",
                bold("↻"),
                retry.recovered,
                retry.still_failed
            );
        }
    }

    let records = store.all().await;
    if args.json {
        let json = serde_json::to_string_pretty(&records).context("Failed to serialise records")?;
        println!("{json}");
    } else {
        print_table(&records)?;
    }

    if !quiet {
        let failed_now = records
            .iter()
            .filter(|r| r.status == ProcessingStatus::Failed)
            .count();
        eprintln!(
            "{}  {}/{} notices processed, {} for manual review{}",
            if failed_now == 0 { green("✔") } else { red("⚠") },
            records.len() - failed_now,
            summary.total_notices,
            failed_now,
            if summary.stopped_early {
                "  (stopped early)"
            } else {
                ""
            },
        );
    }
    Ok(())
}

fn build_config(args: &ProcessArgs) -> Result<ProcessingConfig> {
    let mut builder = ProcessingConfig::builder()
        .dpi(args.dpi)
        .max_retries(args.max_retries)
        .pacing_delay(Duration::from_millis(args.pacing_ms))
        .schema_dir(args.schema_dir.clone())
        .significance_threshold(args.significance_threshold);

    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = args.text_model {
        builder = builder.text_model(model.clone());
    }
    if let Some(ref model) = args.vision_model {
        builder = builder.vision_model(model.clone());
    }

    Ok(builder.build()?)
}

fn print_table(records: &[NoticeRecord]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in records {
        let status = match record.status {
            ProcessingStatus::Success => green("ok  "),
            ProcessingStatus::Failed => red("FAIL"),
        };
        writeln!(
            out,
            "{status}  #{:<4} {:<22} {}  {}",
            record.source_order,
            record.category,
            record.title,
            dim(&format!(
                "notice {} sig {}",
                if record.notice_number.is_empty() {
                    "?"
                } else {
                    &record.notice_number
                },
                record
                    .significance
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".into())
            )),
        )?;
    }
    Ok(())
}
