//! Core data types shared across the processing pipeline.
//!
//! The central invariant: every [`RawNotice`] produced by segmentation yields
//! exactly one persisted [`NoticeRecord`], either through the full pipeline or
//! through the fallback producer. Nothing is silently dropped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One discrete announcement span cut out of the full gazette text.
///
/// Immutable once produced; `source_order` is the 1-based position within the
/// source document and is preserved through persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotice {
    pub text: String,
    pub source_order: u32,
}

/// Publication-level metadata extracted once per document from the leading text.
///
/// All fields are best-effort: an absent header is non-fatal and every notice
/// in the document simply carries empty publication fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GazetteHeader {
    pub volume: String,
    pub issue_number: String,
    pub date: Option<NaiveDate>,
}

/// Fixed category enumeration for notice triage.
///
/// The string forms are canonical: they are what the triage prompt offers the
/// model, what schema files are named after, and what is persisted on records.
/// `Miscellaneous` is the catch-all; any unrecognised triage response coerces
/// to it rather than failing the notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeCategory {
    Appointments,
    Legislation,
    Tenders,
    LandProperty,
    CourtLegal,
    PublicServiceHr,
    Licensing,
    CompanyRegistrations,
    Miscellaneous,
}

impl NoticeCategory {
    pub const ALL: [NoticeCategory; 9] = [
        NoticeCategory::Appointments,
        NoticeCategory::Legislation,
        NoticeCategory::Tenders,
        NoticeCategory::LandProperty,
        NoticeCategory::CourtLegal,
        NoticeCategory::PublicServiceHr,
        NoticeCategory::Licensing,
        NoticeCategory::CompanyRegistrations,
        NoticeCategory::Miscellaneous,
    ];

    /// Canonical string form, as offered to the model and stored on records.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeCategory::Appointments => "Appointments",
            NoticeCategory::Legislation => "Legislation",
            NoticeCategory::Tenders => "Tenders",
            NoticeCategory::LandProperty => "Land_Property",
            NoticeCategory::CourtLegal => "Court_Legal",
            NoticeCategory::PublicServiceHr => "Public_Service_HR",
            NoticeCategory::Licensing => "Licensing",
            NoticeCategory::CompanyRegistrations => "Company_Registrations",
            NoticeCategory::Miscellaneous => "Miscellaneous",
        }
    }

    /// Parse a raw triage response.
    ///
    /// Strips everything outside `[A-Za-z_]` first — models like to append
    /// punctuation or stray whitespace — then matches against the canonical
    /// list. Anything unrecognised coerces to [`NoticeCategory::Miscellaneous`].
    pub fn from_triage_response(response: &str) -> NoticeCategory {
        let cleaned: String = response
            .chars()
            .filter(|c| c.is_ascii_alphabetic() || *c == '_')
            .collect();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == cleaned)
            .unwrap_or(NoticeCategory::Miscellaneous)
    }
}

impl fmt::Display for NoticeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the extraction stage: the contents of the `items` wrapper.
///
/// A notice either describes one fact group (`Single`) or several like-kind
/// ones (`Many`, e.g. a page of land-title notices). Consumers pattern-match
/// explicitly; there is no dynamic type inspection downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtractedPayload {
    Single(serde_json::Map<String, Value>),
    Many(Vec<Value>),
}

impl ExtractedPayload {
    /// Interpret the value found under the `items` key.
    ///
    /// `null` and `{}` are extraction failures. An empty array is accepted
    /// here — array-level emptiness is rejected later, when the record is
    /// assembled, mirroring where each check can first be made.
    pub fn from_items(items: Value) -> Result<ExtractedPayload, &'static str> {
        match items {
            Value::Null => Err("'items' was null"),
            Value::Object(map) if map.is_empty() => Err("'items' was an empty object"),
            Value::Object(map) => Ok(ExtractedPayload::Single(map)),
            Value::Array(list) => Ok(ExtractedPayload::Many(list)),
            _ => Err("'items' was not an object or array"),
        }
    }

    /// The first structured element, used to lift notice-level fields
    /// (notice number, signatory, dates) onto the record.
    pub fn first_item(&self) -> Option<&serde_json::Map<String, Value>> {
        match self {
            ExtractedPayload::Single(map) => Some(map),
            ExtractedPayload::Many(list) => list.first().and_then(Value::as_object),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ExtractedPayload::Single(map) => map.is_empty(),
            ExtractedPayload::Many(list) => list.is_empty(),
        }
    }

    /// Re-wrap as a plain JSON value (for prompts and persistence).
    pub fn to_value(&self) -> Value {
        match self {
            ExtractedPayload::Single(map) => Value::Object(map.clone()),
            ExtractedPayload::Many(list) => Value::Array(list.clone()),
        }
    }
}

/// Narrative content produced by the generation stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub article: String,
    /// Engagement-friendly summary, capped at 276 characters by the prompt.
    #[serde(default, rename = "xSummary")]
    pub social_summary: String,
    #[serde(default, rename = "actionableInfo")]
    pub actionable_info: String,
    /// Editorial significance on a 1–10 scale; drives auto-publishing.
    #[serde(default)]
    pub significance: Option<u8>,
}

/// Persisted processing outcome for one notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Success,
    Failed,
}

/// Which pipeline stage a FAILED record stopped at.
///
/// Stored explicitly so the retry job can resume at the right stage instead
/// of string-matching title prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStage {
    Triage,
    Extraction,
    Generation,
}

/// The persisted entity: one record per notice, success or fallback.
///
/// Created exactly once at the end of the per-notice pipeline (or by the
/// fallback producer); afterwards mutated only by the retry job flipping
/// FAILED → SUCCESS. Engagement counters are bumped externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeRecord {
    /// Store-assigned identity; `None` until first persisted.
    pub id: Option<u64>,
    pub status: ProcessingStatus,
    pub category: String,
    pub source_order: u32,
    pub raw_content: String,

    pub title: String,
    pub summary: String,
    pub article: String,
    pub social_summary: String,
    pub actionable_info: String,

    pub notice_number: String,
    pub signatory: String,
    pub published_date: Option<NaiveDate>,

    pub gazette_volume: String,
    pub gazette_number: String,
    pub gazette_date: Option<NaiveDate>,

    pub significance: Option<u8>,
    pub original_document_path: Option<String>,

    /// Stage the record failed at, if FAILED. Drives retry routing.
    pub failure_stage: Option<FailureStage>,
    /// Extraction output kept for generation-only retries and manual review.
    pub extracted_items: Option<Value>,

    pub views: u64,
    pub thumbs_up: u64,
    pub thumbs_down: u64,
}

impl NoticeRecord {
    /// A blank record carrying only the identity-independent defaults.
    pub fn blank(raw_content: String, source_order: u32) -> NoticeRecord {
        NoticeRecord {
            id: None,
            status: ProcessingStatus::Failed,
            category: String::new(),
            source_order,
            raw_content: raw_content.replace('\u{0}', ""),
            title: String::new(),
            summary: String::new(),
            article: String::new(),
            social_summary: String::new(),
            actionable_info: String::new(),
            notice_number: String::new(),
            signatory: String::new(),
            published_date: None,
            gazette_volume: String::new(),
            gazette_number: String::new(),
            gazette_date: None,
            significance: None,
            original_document_path: None,
            failure_stage: None,
            extracted_items: None,
            views: 0,
            thumbs_up: 0,
            thumbs_down: 0,
        }
    }

    /// Copy publication-level header fields onto the record.
    pub fn apply_header(&mut self, header: Option<&GazetteHeader>) {
        if let Some(h) = header {
            self.gazette_volume = h.volume.clone();
            self.gazette_number = h.issue_number.clone();
            self.gazette_date = h.date;
        }
    }
}
