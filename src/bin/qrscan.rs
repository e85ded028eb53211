//! CLI binary for edgequake-qrscan.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScanConfig` and prints decoded payloads.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_qrscan::{
    AttemptError, DiagnosticsSink, ExternalDecoderConfig, Payload, ScanConfig, Scanner,
    SharedSink,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
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

// ── CLI diagnostics sink using indicatif ─────────────────────────────────────

/// Terminal sink: a page progress bar plus one log line per new payload and
/// per absorbed failure.
struct CliSink {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliSink {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl DiagnosticsSink for CliSink {
    fn on_scan_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Scanning");
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_payload(&self, payload: &Payload) {
        let page = payload
            .page
            .map(|p| format!("page {p}, "))
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            truncate(&payload.text, 60),
            dim(&format!("({page}{} via {})", payload.technique, payload.decoder)),
        ));
    }

    fn on_attempt_failed(&self, error: &AttemptError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} {}", red("✗"), red(&truncate(&error.to_string(), 80))));
    }

    fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _new_payloads: usize) {
        self.bar.inc(1);
    }

    fn on_scan_complete(&self, _total_payloads: usize) {
        self.bar.finish_and_clear();
        let failures = self.failures.load(Ordering::SeqCst);
        if failures > 0 {
            eprintln!("  {}", dim(&format!("{failures} decoder attempt(s) failed")));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Decode every QR code in a photo (one payload per line)
  qrscan ticket.jpg

  # Scan a multi-page PDF at 200 DPI
  qrscan --dpi 200 invoices.pdf

  # Add zbarimg as a last-resort decoder
  qrscan --zbar faded-scan.png

  # Any other tool: payloads on stdout, one per line
  qrscan --external-decoder /opt/bin/mydecoder --external-arg=--plain photo.png

  # Structured output with provenance and stats
  qrscan --json document.pdf > result.json

EXIT STATUS:
  0  at least one QR code was decoded
  1  the input was processed but no QR code was found
  2  the input could not be processed

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium, needed for PDF input
  QRSCAN_DPI              Page rasterisation DPI
  QRSCAN_MAX_DIMENSION    Image width cap before downscaling
  QRSCAN_PASSWORD         Password for encrypted PDFs
  RUST_LOG                Override the log filter (e.g. edgequake_qrscan=debug)
"#;

/// Decode QR codes from images and PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "qrscan",
    version,
    about = "Decode QR codes from images and PDF documents",
    long_about = "Decode every QR code in a PNG/JPEG image or a PDF document. Each page is \
tried with five preprocessing variants (original, threshold, adaptive threshold, blur, \
histogram equalisation) and a chain of decoders; distinct payloads are printed in the \
order they were found.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image (.png, .jpg, .jpeg) or document (.pdf) to scan.
    input: PathBuf,

    /// Rendering DPI for PDF pages (72–600).
    #[arg(long, env = "QRSCAN_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Downscale images wider than this many pixels.
    #[arg(long, env = "QRSCAN_MAX_DIMENSION", default_value_t = 2000)]
    max_dimension: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "QRSCAN_PASSWORD")]
    password: Option<String>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Use `zbarimg --quiet --raw` as the last fallback decoder.
    #[arg(long, conflicts_with = "external_decoder")]
    zbar: bool,

    /// External decoder program used as the last fallback.
    #[arg(long, env = "QRSCAN_EXTERNAL_DECODER")]
    external_decoder: Option<PathBuf>,

    /// Argument passed to the external decoder before the image path (repeatable).
    #[arg(long = "external-arg", allow_hyphen_values = true)]
    external_args: Vec<String>,

    /// Kill the external decoder after this many seconds.
    #[arg(long, env = "QRSCAN_EXTERNAL_TIMEOUT", default_value_t = 10)]
    external_timeout: u64,

    /// Output structured JSON (DecodeResult) instead of plain payloads.
    #[arg(long, env = "QRSCAN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "QRSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "QRSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except payloads and errors.
    #[arg(short, long, env = "QRSCAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether anything was decoded.
async fn run() -> Result<bool> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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

    // ── Build scanner ────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let mut scanner = Scanner::new(config).context("Failed to initialise scanner")?;
    if show_progress {
        scanner = scanner.with_sink(CliSink::new() as SharedSink);
    }

    // ── Run scan ─────────────────────────────────────────────────────────
    let result = scanner
        .decode_file_async(&cli.input)
        .await
        .with_context(|| format!("Failed to scan {}", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for text in result.texts() {
            writeln!(handle, "{text}").context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet && !cli.json {
        if result.is_empty() {
            eprintln!(
                "{} No QR code found in {}",
                cyan("⚠"),
                bold(&cli.input.display().to_string())
            );
        } else {
            eprintln!(
                "{} {} QR code(s)  {} page(s)  {}ms",
                green("✔"),
                bold(&result.len().to_string()),
                result.stats.pages,
                result.stats.duration_ms,
            );
        }
        if result.stats.failed_pages > 0 {
            eprintln!("  {} page(s) failed to render", red(&result.stats.failed_pages.to_string()));
        }
    }

    Ok(!result.is_empty())
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .dpi(cli.dpi)
        .max_dimension(cli.max_dimension);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }

    let external = if cli.zbar {
        Some(ExternalDecoderConfig::zbarimg())
    } else {
        cli.external_decoder
            .as_ref()
            .map(|program| ExternalDecoderConfig::new(program).args(cli.external_args.clone()))
    };
    if let Some(ext) = external {
        builder = builder.external_decoder(ext.timeout_secs(cli.external_timeout));
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn zbar_flag_selects_preset() {
        let cli = Cli::parse_from(["qrscan", "--zbar", "--external-timeout", "3", "a.png"]);
        let config = build_config(&cli).unwrap();
        let ext = config.external_decoder.unwrap();
        assert_eq!(ext.name(), "zbarimg");
        assert_eq!(ext.timeout_secs, 3);
    }

    #[test]
    fn external_args_are_forwarded() {
        let cli = Cli::parse_from([
            "qrscan",
            "--external-decoder",
            "/opt/bin/dec",
            "--external-arg=--plain",
            "--external-arg",
            "-x",
            "a.png",
        ]);
        let ext = build_config(&cli).unwrap().external_decoder.unwrap();
        assert_eq!(ext.args, vec!["--plain", "-x"]);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 10), "héllo");
        assert_eq!(truncate("ééééé", 3), "éé\u{2026}");
    }
}
