//! Aggregation: variants × decoders for one bitmap, then pages for a document.
//!
//! Ordering and uniqueness are owned here. Payloads are appended in the order
//! they are first seen (technique order within a page, then page order) and a
//! text already present anywhere in the invocation is never added twice.

use crate::diagnostics::DiagnosticsSink;
use crate::error::AttemptError;
use crate::output::{Bitmap, DecodeResult, Page, Payload, Technique};
use crate::pipeline::decoders::{attempt, DecoderEngine};
use crate::pipeline::variants::{self, VariantParams};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

/// A page as handed over by the rasterizer: rendered, or the reason it wasn't.
pub type PageOutcome = Result<Page, AttemptError>;

pub struct Aggregator<'a> {
    engine: &'a DecoderEngine,
    params: VariantParams,
    sink: &'a dyn DiagnosticsSink,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        engine: &'a DecoderEngine,
        params: VariantParams,
        sink: &'a dyn DiagnosticsSink,
    ) -> Self {
        Self {
            engine,
            params,
            sink,
        }
    }

    /// Scan one standalone image as a single-page document.
    pub fn decode_image(&self, gray: &Bitmap) -> DecodeResult {
        self.sink.on_scan_start(1);
        self.sink.on_page_start(1, 1);
        let mut result = self.decode_all_variants(gray, None);
        result.stats.pages = 1;
        self.sink.on_page_complete(1, 1, result.len());
        self.sink.on_scan_complete(result.len());
        result
    }

    /// Run the primary decoder over every variant of `gray`; if nothing at
    /// all was found, try the fallback chain once on the untouched input.
    ///
    /// `page` is the 1-based page number recorded on each payload.
    pub fn decode_all_variants(&self, gray: &Bitmap, page: Option<usize>) -> DecodeResult {
        let result = self.sweep(gray, page, &DecodeResult::new());
        for payload in result.payloads() {
            self.sink.on_payload(payload);
        }
        result
    }

    /// Sweep one bitmap into a fresh result, skipping texts already in
    /// `known`. Payload events are left to the caller.
    fn sweep(&self, gray: &Bitmap, page: Option<usize>, known: &DecodeResult) -> DecodeResult {
        let primary = self.engine.primary();
        let mut result = DecodeResult::new();
        let mut found_any = false;

        for variant in variants::generate(gray, &self.params) {
            result.stats.variants_tried += 1;
            result.stats.decoder_calls += 1;
            match attempt(primary, &variant) {
                Ok(texts) => {
                    found_any |= !texts.is_empty();
                    for text in texts {
                        record(&mut result, known, text, variant.technique(), primary.name(), page);
                    }
                }
                Err(e) => self.absorb_failure(&mut result, e),
            }
        }

        if found_any {
            return result;
        }

        debug!("No payload from primary decoder; trying fallbacks");
        let outcome = self.engine.decode_fallbacks(gray);
        result.stats.decoder_calls += outcome.calls;
        for e in outcome.failures {
            self.absorb_failure(&mut result, e);
        }
        if let Some(decoder) = outcome.decoder {
            for text in outcome.payloads {
                record(&mut result, known, text, Technique::Original, &decoder, page);
            }
        }
        result
    }

    /// Scan pages in order into one result with document-wide uniqueness.
    ///
    /// A page that failed to render, or whose sweep panicked, contributes
    /// nothing; the remaining pages still run.
    pub fn decode_document<I>(&self, pages: I) -> DecodeResult
    where
        I: IntoIterator<Item = PageOutcome>,
        I::IntoIter: ExactSizeIterator,
    {
        let pages = pages.into_iter();
        let total = pages.len();
        self.sink.on_scan_start(total);

        let mut doc = DecodeResult::new();
        doc.stats.pages = total;

        for (i, outcome) in pages.enumerate() {
            let page_num = i + 1;
            self.sink.on_page_start(page_num, total);

            let page = match outcome {
                Ok(page) => page,
                Err(e) => {
                    doc.stats.failed_pages += 1;
                    self.absorb_failure(&mut doc, e);
                    self.sink.on_page_complete(page_num, total, 0);
                    continue;
                }
            };

            let swept = catch_unwind(AssertUnwindSafe(|| {
                self.sweep(&page.bitmap, Some(page.number()), &doc)
            }));

            let added = match swept {
                Ok(found) => self.merge(&mut doc, found),
                Err(_) => {
                    doc.stats.failed_pages += 1;
                    self.absorb_failure(
                        &mut doc,
                        AttemptError::DecoderPanicked {
                            decoder: format!("page {page_num}"),
                        },
                    );
                    0
                }
            };
            self.sink.on_page_complete(page_num, total, added);
        }

        self.sink.on_scan_complete(doc.len());
        doc
    }

    /// Fold one page's result into the document, announcing each new payload.
    fn merge(&self, doc: &mut DecodeResult, page: DecodeResult) -> usize {
        let mut added = 0;
        for payload in page.payloads() {
            if doc.push_unique(payload.clone()) {
                self.sink.on_payload(payload);
                added += 1;
            }
        }
        doc.diagnostics.extend(page.diagnostics);
        doc.stats.variants_tried += page.stats.variants_tried;
        doc.stats.decoder_calls += page.stats.decoder_calls;
        added
    }

    fn absorb_failure(&self, result: &mut DecodeResult, error: AttemptError) {
        self.sink.on_attempt_failed(&error);
        result.diagnostics.push(error.to_string());
    }
}

fn record(
    result: &mut DecodeResult,
    known: &DecodeResult,
    text: String,
    technique: Technique,
    decoder: &str,
    page: Option<usize>,
) {
    if known.contains(&text) {
        return;
    }
    result.push_unique(Payload {
        text,
        technique,
        decoder: decoder.to_string(),
        page,
    });
}
