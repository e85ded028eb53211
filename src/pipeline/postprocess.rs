//! Post-processing: turn an external decoder's stdout into payload lines.
//!
//! Out-of-process tools mix payloads with metadata. zbar-style tools in
//! particular may echo the scanned file name, print a "scanned N barcode
//! symbols" summary, and (without `--raw`) prefix each payload with its
//! symbology (`QR-Code:`). Only the payloads survive this pass.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the path and summary comparisons see
//! clean lines; symbology prefixes are stripped last so a payload that merely
//! looks like a summary is never mistaken for one after stripping.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Extract payload lines from decoder output.
///
/// `source` is the file handed to the tool; lines echoing it are dropped.
/// When `raw` is false, a leading `SYMBOLOGY:` tag is removed from each line.
pub fn parse_decoder_output(stdout: &str, source: &Path, raw: bool) -> Vec<String> {
    stdout
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !is_source_echo(line, source))
        .filter(|line| !RE_SUMMARY.is_match(line))
        .map(|line| {
            if raw {
                line.to_string()
            } else {
                strip_symbology(line)
            }
        })
        .collect()
}

// ── Rule 1: drop echoed source path ──────────────────────────────────────────

fn is_source_echo(line: &str, source: &Path) -> bool {
    let line = line.trim();
    if line == source.to_string_lossy() {
        return true;
    }
    source
        .file_name()
        .map(|name| line == name.to_string_lossy())
        .unwrap_or(false)
}

// ── Rule 2: drop scan summaries ──────────────────────────────────────────────

static RE_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^scanned \d+ barcode symbols? from \d+ images?").unwrap()
});

// ── Rule 3: strip symbology prefix ───────────────────────────────────────────

static RE_SYMBOLOGY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:QR-Code|SQ-Code|EAN-(?:2|5|8|13)|UPC-[AE]|ISBN-1[03]|I2/5|DataBar(?:-Exp)?|Codabar|CODE-(?:39|93|128)|PDF417):",
    )
    .unwrap()
});

fn strip_symbology(line: &str) -> String {
    RE_SYMBOLOGY.replace(line, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_lines_pass_through() {
        let out = parse_decoder_output("HELLO\nWORLD\n", Path::new("/tmp/a.png"), true);
        assert_eq!(out, vec!["HELLO", "WORLD"]);
    }

    #[test]
    fn echoed_path_is_dropped() {
        let src = Path::new("/tmp/qrscan-x1.png");
        let out = parse_decoder_output("/tmp/qrscan-x1.png\nHELLO\nqrscan-x1.png\n", src, true);
        assert_eq!(out, vec!["HELLO"]);
    }

    #[test]
    fn summary_and_blank_lines_are_dropped() {
        let stdout = "QR-Code:A\n\n   \nscanned 1 barcode symbols from 1 images in 0.02 seconds\n";
        let out = parse_decoder_output(stdout, Path::new("x.png"), false);
        assert_eq!(out, vec!["A"]);
    }

    #[test]
    fn crlf_is_normalised() {
        let out = parse_decoder_output("A\r\nB\r\n", Path::new("x.png"), true);
        assert_eq!(out, vec!["A", "B"]);
    }

    #[test]
    fn symbology_prefix_is_stripped_only_when_not_raw() {
        let src = Path::new("x.png");
        assert_eq!(
            parse_decoder_output("QR-Code:https://example.com\n", src, false),
            vec!["https://example.com"]
        );
        assert_eq!(
            parse_decoder_output("QR-Code:https://example.com\n", src, true),
            vec!["QR-Code:https://example.com"]
        );
    }

    #[test]
    fn payload_schemes_are_not_mistaken_for_symbology() {
        let out = parse_decoder_output("WIFI:S:home;T:WPA;P:pw;;\n", Path::new("x.png"), false);
        assert_eq!(out, vec!["WIFI:S:home;T:WPA;P:pw;;"]);
    }

    #[test]
    fn empty_output_yields_nothing() {
        assert!(parse_decoder_output("", Path::new("x.png"), true).is_empty());
    }
}
