//! Publication header extraction (volume, issue number, date).
//!
//! One text-model call over the leading slice of the document. The header is
//! decorative metadata, so every failure mode here is non-fatal: the job
//! simply proceeds with records carrying empty publication fields.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::gateway::Gateway;
use crate::json_repair;
use crate::model::GazetteHeader;
use crate::pipeline::truncate_chars;
use crate::prompts;

/// Leading slice offered to the model. Gazette mastheads sit well inside the
/// first page of text.
const HEADER_WINDOW: usize = 2000;

/// Extract the publication header from the document's full text.
///
/// Returns `None` when the model call fails, the response is not recoverable
/// JSON, or the object carries none of the expected keys.
pub async fn extract_header(full_text: &str, gateway: &Gateway) -> Option<GazetteHeader> {
    let leading = truncate_chars(full_text, HEADER_WINDOW);
    if leading.trim().is_empty() {
        return None;
    }

    let prompt = prompts::header_prompt(leading);
    let response = gateway.generate_text(&prompt).await?;
    let object = json_repair::recover_object(&response)?;

    let header = header_from_json(&object);
    match &header {
        Some(h) => info!(
            "Gazette header: volume='{}' issue='{}' date={:?}",
            h.volume, h.issue_number, h.date
        ),
        None => warn!("Header response parsed but carried no usable fields"),
    }
    header
}

fn header_from_json(object: &Value) -> Option<GazetteHeader> {
    let volume = string_field(object, "volume");
    let issue_number = string_field(object, "issueNumber");
    let date = string_field(object, "date");

    if volume.is_empty() && issue_number.is_empty() && date.is_empty() {
        return None;
    }

    let date = match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) if date.is_empty() => None,
        Err(e) => {
            warn!("Unparseable header date '{date}': {e}");
            None
        }
    };

    Some(GazetteHeader {
        volume,
        issue_number,
        date,
    })
}

fn string_field(object: &Value, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_complete_header() {
        let obj = json!({
            "volume": "Vol. CXXVII",
            "issueNumber": "No. 36",
            "date": "2025-02-21"
        });
        let h = header_from_json(&obj).unwrap();
        assert_eq!(h.volume, "Vol. CXXVII");
        assert_eq!(h.issue_number, "No. 36");
        assert_eq!(h.date, Some(NaiveDate::from_ymd_opt(2025, 2, 21).unwrap()));
    }

    #[test]
    fn empty_strings_mean_no_header() {
        let obj = json!({"volume": "", "issueNumber": "", "date": ""});
        assert!(header_from_json(&obj).is_none());
    }

    #[test]
    fn bad_date_is_dropped_but_header_survives() {
        let obj = json!({
            "volume": "Vol. I",
            "issueNumber": "No. 1",
            "date": "21st February, 2025"
        });
        let h = header_from_json(&obj).unwrap();
        assert_eq!(h.volume, "Vol. I");
        assert_eq!(h.date, None);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(3000);
        let prefix = truncate_chars(&text, HEADER_WINDOW);
        assert_eq!(prefix.chars().count(), HEADER_WINDOW);
    }
}
