//! Decoder strategies and the engine that orders them.
//!
//! Every strategy implements [`Decoder`]: read one [`Bitmap`], return zero or
//! more payload strings. Strategies hold no mutable state, so one engine can
//! be shared by any number of concurrent scans.
//!
//! | Priority | Strategy | Results |
//! |----------|----------|---------|
//! | 1 | [`RqrrDecoder`]: grid detector on grayscale | every symbol in frame |
//! | 2 | [`SingleSymbolDecoder`]: Otsu-binarised detector | at most one |
//! | 3 | [`ExternalDecoder`]: out-of-process tool (optional) | tool output |
//!
//! A lower-priority strategy runs only when every higher one returned nothing.
//! Failures are values ([`AttemptError`]), never aborts: a strategy that errors
//! or panics simply contributes no payloads.

use crate::config::{ExternalDecoderConfig, ScanConfig};
use crate::error::{AttemptError, ScanError};
use crate::output::Bitmap;
use crate::pipeline::postprocess::parse_decoder_output;
use image::{GrayImage, ImageFormat};
use imageproc::contrast::otsu_level;
use rqrr::PreparedImage;
use std::io::{BufWriter, Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// One decoding algorithm or tool.
pub trait Decoder: Send + Sync {
    /// Short name recorded on each [`crate::Payload`].
    fn name(&self) -> &str;

    /// Decode every symbol found in `bitmap`.
    ///
    /// Duplicates are allowed; the caller filters them.
    fn decode(&self, bitmap: &Bitmap) -> Result<Vec<String>, AttemptError>;
}

// ── Strategy 1: rqrr grid detector ───────────────────────────────────────────

/// Primary decoder: rqrr's finder-pattern detector over the grayscale
/// pixels, decoding every grid it locates.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl Decoder for RqrrDecoder {
    fn name(&self) -> &str {
        "rqrr"
    }

    fn decode(&self, bitmap: &Bitmap) -> Result<Vec<String>, AttemptError> {
        let luma = bitmap.luma();
        let mut prepared = PreparedImage::prepare_from_greyscale(
            luma.width() as usize,
            luma.height() as usize,
            |x, y| luma.get_pixel(x as u32, y as u32)[0],
        );
        let grids = prepared.detect_grids();

        let mut found = Vec::with_capacity(grids.len());
        for grid in &grids {
            match grid.decode() {
                Ok((_, content)) => found.push(content),
                Err(e) => debug!("rqrr: grid on {} did not decode: {:?}", bitmap.technique(), e),
            }
        }
        Ok(found)
    }
}

// ── Strategy 2: single-symbol detector ───────────────────────────────────────

/// Fallback decoder: binarise at the Otsu level, then return the first grid
/// that decodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleSymbolDecoder;

impl Decoder for SingleSymbolDecoder {
    fn name(&self) -> &str {
        "single-symbol"
    }

    fn decode(&self, bitmap: &Bitmap) -> Result<Vec<String>, AttemptError> {
        let luma = bitmap.luma();
        let level = otsu_level(&luma);
        let mut prepared = PreparedImage::prepare_from_bitmap(
            luma.width() as usize,
            luma.height() as usize,
            |x, y| luma.get_pixel(x as u32, y as u32)[0] <= level,
        );
        let first = prepared
            .detect_grids()
            .iter()
            .find_map(|grid| grid.decode().ok())
            .map(|(_, content)| content);
        Ok(first.into_iter().collect())
    }
}

// ── Strategy 3: external process ─────────────────────────────────────────────

/// Fallback decoder that shells out to a separate tool such as `zbarimg`.
///
/// The bitmap is written to a uniquely named temporary PNG that is removed
/// when the call returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct ExternalDecoder {
    config: ExternalDecoderConfig,
    name: String,
}

impl ExternalDecoder {
    pub fn new(config: ExternalDecoderConfig) -> Self {
        let name = config.name();
        Self { config, name }
    }

    /// Check that the program can be spawned at all.
    ///
    /// Runs `<program> --version`; only a spawn failure counts, the exit
    /// status is ignored.
    pub fn probe(&self) -> Result<(), ScanError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("--version");
        run_with_timeout(
            &mut cmd,
            Duration::from_secs(self.config.timeout_secs),
            &self.name,
        )
        .map(|_| ())
        .or_else(|e| match e {
            AttemptError::DecoderFailed { detail, .. } => Err(ScanError::BackendUnavailable {
                backend: self.name.clone(),
                detail,
            }),
            _ => Ok(()),
        })
    }

    fn is_raw(&self) -> bool {
        self.config.args.iter().any(|a| a == "--raw")
    }
}

impl Decoder for ExternalDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, bitmap: &Bitmap) -> Result<Vec<String>, AttemptError> {
        let failed = |detail: String| AttemptError::DecoderFailed {
            decoder: self.name.clone(),
            detail,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix("qrscan-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| failed(format!("tempfile: {e}")))?;
        write_png(&bitmap.luma(), tmp.as_file_mut()).map_err(|e| failed(format!("tempfile write: {e}")))?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args).arg(tmp.path());
        let output = run_with_timeout(
            &mut cmd,
            Duration::from_secs(self.config.timeout_secs),
            &self.name,
        )?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            // zbar-style tools exit non-zero when nothing was found; silence
            // is not a failure.
            if stdout.trim().is_empty() && output.stderr.iter().all(u8::is_ascii_whitespace) {
                return Ok(Vec::new());
            }
            return Err(AttemptError::NonZeroExit {
                decoder: self.name.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_decoder_output(&stdout, tmp.path(), self.is_raw()))
        // `tmp` is dropped (and the file deleted) here and on every early return
    }
}

fn write_png(image: &GrayImage, file: &mut std::fs::File) -> Result<(), String> {
    let mut writer = BufWriter::new(file);
    image
        .write_to(&mut writer, ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

struct ProcessOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Spawn `cmd`, collect its output, and kill it once `timeout` elapses.
fn run_with_timeout(
    cmd: &mut Command,
    timeout: Duration,
    decoder: &str,
) -> Result<ProcessOutput, AttemptError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AttemptError::DecoderFailed {
            decoder: decoder.to_string(),
            detail: format!("spawn failed: {e}"),
        })?;

    // Pipes are drained concurrently; a full pipe would stall the child.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AttemptError::Timeout {
                    decoder: decoder.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(e) => {
                let _ = child.kill();
                return Err(AttemptError::DecoderFailed {
                    decoder: decoder.to_string(),
                    detail: format!("wait failed: {e}"),
                });
            }
        }
    };

    let collect = |h: Option<thread::JoinHandle<Vec<u8>>>| {
        h.and_then(|h| h.join().ok()).unwrap_or_default()
    };
    Ok(ProcessOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// What one pass over a strategy chain produced.
#[derive(Debug, Default)]
pub struct ChainOutcome {
    /// Name of the strategy whose payloads are returned, if any produced some.
    pub decoder: Option<String>,
    pub payloads: Vec<String>,
    pub failures: Vec<AttemptError>,
    pub calls: usize,
}

/// The ordered set of decoder strategies.
///
/// Cheap to clone; strategies are shared behind `Arc`.
#[derive(Clone)]
pub struct DecoderEngine {
    primary: Arc<dyn Decoder>,
    fallbacks: Vec<Arc<dyn Decoder>>,
}

impl DecoderEngine {
    pub fn new(primary: Arc<dyn Decoder>, fallbacks: Vec<Arc<dyn Decoder>>) -> Self {
        Self { primary, fallbacks }
    }

    /// The standard chain: rqrr, then the single-symbol detector, then the
    /// external tool when one is configured.
    ///
    /// # Errors
    /// [`ScanError::BackendUnavailable`] when the external tool cannot be
    /// spawned.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        let mut fallbacks: Vec<Arc<dyn Decoder>> = vec![Arc::new(SingleSymbolDecoder)];
        if let Some(ref ext) = config.external_decoder {
            let external = ExternalDecoder::new(ext.clone());
            external.probe()?;
            fallbacks.push(Arc::new(external));
        }
        Ok(Self::new(Arc::new(RqrrDecoder), fallbacks))
    }

    pub fn primary(&self) -> &dyn Decoder {
        self.primary.as_ref()
    }

    pub fn fallbacks(&self) -> &[Arc<dyn Decoder>] {
        &self.fallbacks
    }

    /// Run the full chain on `bitmap`, stopping at the first strategy that
    /// returns something.
    pub fn decode(&self, bitmap: &Bitmap) -> ChainOutcome {
        run_chain(
            std::iter::once(&self.primary).chain(self.fallbacks.iter()),
            bitmap,
        )
    }

    /// Run only the fallback strategies, in order.
    pub fn decode_fallbacks(&self, bitmap: &Bitmap) -> ChainOutcome {
        run_chain(self.fallbacks.iter(), bitmap)
    }
}

impl std::fmt::Debug for DecoderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderEngine")
            .field("primary", &self.primary.name())
            .field(
                "fallbacks",
                &self.fallbacks.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn run_chain<'a>(
    decoders: impl Iterator<Item = &'a Arc<dyn Decoder>>,
    bitmap: &Bitmap,
) -> ChainOutcome {
    let mut outcome = ChainOutcome::default();
    for decoder in decoders {
        outcome.calls += 1;
        match attempt(decoder.as_ref(), bitmap) {
            Ok(payloads) if !payloads.is_empty() => {
                outcome.decoder = Some(decoder.name().to_string());
                outcome.payloads = payloads;
                break;
            }
            Ok(_) => {}
            Err(e) => outcome.failures.push(e),
        }
    }
    outcome
}

/// Call `decoder`, turning a panic into [`AttemptError::DecoderPanicked`].
pub fn attempt(decoder: &dyn Decoder, bitmap: &Bitmap) -> Result<Vec<String>, AttemptError> {
    catch_unwind(AssertUnwindSafe(|| decoder.decode(bitmap))).unwrap_or_else(|_| {
        Err(AttemptError::DecoderPanicked {
            decoder: decoder.name().to_string(),
        })
    })
}
