//! Notice segmentation: split the full gazette text into per-notice spans.
//!
//! Gazette notices open with a structural marker line ("GAZETTE NOTICE NO. n").
//! Each span runs from one marker to the next (or to the end of the text).
//! Text before the first marker is the publication masthead, not a notice,
//! and is discarded. A document with no markers at all is treated as one
//! single notice so that nothing is silently dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::model::RawNotice;

/// Marker matched case-insensitively at line starts.
static RE_NOTICE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^GAZETTE NOTICE NO\.\s*\d+").unwrap());

/// Split full text into ordered [`RawNotice`] spans.
///
/// `source_order` is assigned 1-based in document order. Returns an empty
/// vector only for blank input.
pub fn segment_notices(full_text: &str) -> Vec<RawNotice> {
    if full_text.trim().is_empty() {
        return Vec::new();
    }

    let marker_starts: Vec<usize> = RE_NOTICE_MARKER
        .find_iter(full_text)
        .map(|m| m.start())
        .collect();

    if marker_starts.is_empty() {
        info!("Segmentation found 0 markers — treating the document as a single notice");
        return vec![RawNotice {
            text: full_text.trim().to_string(),
            source_order: 1,
        }];
    }

    let mut spans: Vec<&str> = Vec::with_capacity(marker_starts.len() + 1);

    // Leading span before the first marker: masthead/header noise unless it
    // happens to contain a marker itself (it cannot, by construction).
    if marker_starts[0] > 0 {
        let leading = full_text[..marker_starts[0]].trim();
        if !leading.is_empty() {
            debug!("Discarding {} chars of pre-marker header text", leading.len());
        }
    }

    for (i, &start) in marker_starts.iter().enumerate() {
        let end = marker_starts.get(i + 1).copied().unwrap_or(full_text.len());
        let span = full_text[start..end].trim();
        if !span.is_empty() {
            spans.push(span);
        }
    }

    spans
        .into_iter()
        .enumerate()
        .map(|(i, text)| RawNotice {
            text: text.to_string(),
            source_order: (i + 1) as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_NOTICES: &str = "\
THE KENYA GAZETTE\nVol. CXXVII — No. 36\n\n\
GAZETTE NOTICE NO. 100\nFirst notice body.\n\n\
GAZETTE NOTICE NO. 101\nSecond notice body.\n";

    #[test]
    fn splits_on_markers_and_discards_masthead() {
        let notices = segment_notices(TWO_NOTICES);
        assert_eq!(notices.len(), 2);
        assert!(notices[0].text.starts_with("GAZETTE NOTICE NO. 100"));
        assert!(notices[0].text.contains("First notice body."));
        assert!(notices[1].text.starts_with("GAZETTE NOTICE NO. 101"));
        assert_eq!(notices[0].source_order, 1);
        assert_eq!(notices[1].source_order, 2);
    }

    #[test]
    fn marker_is_case_insensitive_and_line_anchored() {
        let text = "gazette notice no. 5\nBody.\nmentions GAZETTE NOTICE NO. 9 inline\n";
        let notices = segment_notices(text);
        // The inline mention is mid-line and must not split the span.
        assert_eq!(notices.len(), 1);
        assert!(notices[0].text.contains("inline"));
    }

    #[test]
    fn zero_markers_yields_single_notice() {
        let notices = segment_notices("A short circular with no marker at all.");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].source_order, 1);
        assert_eq!(
            notices[0].text,
            "A short circular with no marker at all."
        );
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(segment_notices("").is_empty());
        assert!(segment_notices("  \n\t ").is_empty());
    }

    #[test]
    fn segmentation_is_idempotent() {
        let first = segment_notices(TWO_NOTICES);
        let rejoined = first
            .iter()
            .map(|n| n.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let second = segment_notices(&rejoined);
        assert_eq!(
            first.iter().map(|n| &n.text).collect::<Vec<_>>(),
            second.iter().map(|n| &n.text).collect::<Vec<_>>()
        );
    }
}
