//! Pipeline stages for QR payload recovery.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! image bytes ──▶ normalize ──┐
//!                             ├──▶ variants ──▶ decoders ──▶ aggregate
//! PDF bytes ───▶ render ──────┘     (×5)       (chain)      (dedup, order)
//! ```
//!
//! 1. [`input`]     — path helper: extension whitelist and `%PDF` sniffing
//! 2. [`normalize`] — decode bytes, cap width, convert to grayscale
//! 3. [`render`]    — rasterise document pages via pdfium
//! 4. [`variants`]  — five preprocessed bitmaps per page
//! 5. [`decoders`]  — primary, single-symbol and external strategies
//! 6. [`aggregate`] — ordered, globally unique payload accumulation
//! 7. [`postprocess`] — filter an external tool's stdout down to payloads

pub mod aggregate;
pub mod decoders;
pub mod input;
pub mod normalize;
pub mod postprocess;
pub mod render;
pub mod variants;
