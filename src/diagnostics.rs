//! Diagnostics sink for per-page and per-attempt pipeline events.
//!
//! Inject an [`Arc<dyn DiagnosticsSink>`] via [`crate::Scanner::with_sink`]
//! to observe a scan as it runs: page boundaries, every newly discovered
//! payload, and every absorbed decoder or render failure.
//!
//! The sink replaces process-wide loggers: each [`crate::Scanner`] carries its
//! own, so two scanners in one process can report to different places.
//! Implementations must be `Send + Sync` because a scanner may be shared
//! across threads.
//!
//! # Example
//!
//! ```rust
//! use edgequake_qrscan::{DiagnosticsSink, Payload, Scanner, ScanConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingSink {
//!     found: AtomicUsize,
//! }
//!
//! impl DiagnosticsSink for CountingSink {
//!     fn on_payload(&self, _payload: &Payload) {
//!         self.found.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let sink = Arc::new(CountingSink { found: AtomicUsize::new(0) });
//! let scanner = Scanner::new(ScanConfig::default())
//!     .unwrap()
//!     .with_sink(sink.clone() as Arc<dyn DiagnosticsSink>);
//! # let _ = scanner;
//! ```

use crate::error::AttemptError;
use crate::output::Payload;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives events from the decode pipeline.
///
/// All methods default to no-ops so implementations override only what they
/// need. Page numbers are 1-based; single-image scans report one page.
pub trait DiagnosticsSink: Send + Sync {
    /// Called once before the first page is scanned.
    fn on_scan_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before the variant sweep of a page begins.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called for each payload the first time it is seen in the invocation.
    fn on_payload(&self, payload: &Payload) {
        let _ = payload;
    }

    /// Called when a decoder attempt or page render fails and is absorbed.
    fn on_attempt_failed(&self, error: &AttemptError) {
        let _ = error;
    }

    /// Called after a page has been swept.
    ///
    /// `new_payloads` counts payloads this page added to the result.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, new_payloads: usize) {
        let _ = (page_num, total_pages, new_payloads);
    }

    /// Called once after every page has been attempted.
    fn on_scan_complete(&self, total_payloads: usize) {
        let _ = total_payloads;
    }
}

/// Discards every event.
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {}

/// Forwards events to `tracing`. This is the default sink.
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn on_scan_start(&self, total_pages: usize) {
        debug!("Scanning {} page(s)", total_pages);
    }

    fn on_payload(&self, payload: &Payload) {
        info!(
            technique = %payload.technique,
            decoder = %payload.decoder,
            page = ?payload.page,
            "Decoded payload ({} bytes)",
            payload.text.len()
        );
    }

    fn on_attempt_failed(&self, error: &AttemptError) {
        warn!("{}", error);
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, new_payloads: usize) {
        debug!(
            "Page {}/{} done: {} new payload(s)",
            page_num, total_pages, new_payloads
        );
    }

    fn on_scan_complete(&self, total_payloads: usize) {
        debug!("Scan complete: {} payload(s)", total_payloads);
    }
}

/// Shared handle stored by [`crate::Scanner`].
pub type SharedSink = Arc<dyn DiagnosticsSink>;
