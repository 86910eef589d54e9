//! The per-notice pipeline: Triage → Extraction → Generation → record.
//!
//! [`Pipeline::process_notice`] is total: whatever happens inside the stages,
//! it returns exactly one [`NoticeRecord`] for the notice — a SUCCESS record
//! when all three stages pass, a generation-failure record when only the last
//! stage fails (the extracted data survives for manual review and retry), or
//! a fallback record for earlier failures. No notice is ever dropped.

mod extraction;
mod generation;
mod triage;

pub use extraction::extract;
pub use generation::generate;
pub use triage::triage;

pub(crate) use triage::truncate_chars;

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ProcessingConfig;
use crate::error::StageFailure;
use crate::gateway::Gateway;
use crate::model::{
    ExtractedPayload, GazetteHeader, GeneratedContent, NoticeCategory, NoticeRecord,
    ProcessingStatus, RawNotice,
};
use crate::schema::SchemaProvider;

/// Recover the notice number from the marker line when extraction did not
/// surface one.
static RE_NOTICE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)GAZETTE NOTICE NO\.\s*(\d+)").unwrap());

/// Shared per-job pipeline state.
#[derive(Clone)]
pub struct Pipeline {
    gateway: Gateway,
    schemas: Arc<dyn SchemaProvider>,
    config: ProcessingConfig,
}

impl Pipeline {
    pub fn new(
        gateway: Gateway,
        schemas: Arc<dyn SchemaProvider>,
        config: ProcessingConfig,
    ) -> Pipeline {
        Pipeline {
            gateway,
            schemas,
            config,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Run the full three-stage pipeline for one notice.
    ///
    /// Always returns a record; see the module docs for the three shapes.
    pub async fn process_notice(
        &self,
        notice: &RawNotice,
        header: Option<&GazetteHeader>,
    ) -> NoticeRecord {
        let category = match triage(&self.gateway, &notice.text).await {
            Ok(c) => c,
            Err(failure) => return self.fallback_record(notice, header, &failure),
        };

        let payload = match extract(&self.gateway, &*self.schemas, category, &notice.text).await {
            Ok(p) => p,
            Err(failure) => return self.fallback_record(notice, header, &failure),
        };

        let digest_allowed = self.config.digest_categories.contains(&category);
        match generate(&self.gateway, &payload, category, digest_allowed).await {
            Ok(content) => self.success_record(notice, header, category, &payload, content),
            Err(_) => {
                warn!(
                    "Generation gave up for notice {} — persisting extracted data for review",
                    notice.source_order
                );
                self.generation_failed_record(notice, header, category, &payload)
            }
        }
    }

    /// Re-run generation only, against a previously extracted payload.
    ///
    /// Used by the retry job for records that failed at the generation stage:
    /// triage and extraction results are already trusted.
    pub async fn regenerate(
        &self,
        notice: &RawNotice,
        header: Option<&GazetteHeader>,
        category: NoticeCategory,
        payload: &ExtractedPayload,
    ) -> Option<NoticeRecord> {
        let digest_allowed = self.config.digest_categories.contains(&category);
        let content = generate(&self.gateway, payload, category, digest_allowed)
            .await
            .ok()?;
        Some(self.success_record(notice, header, category, payload, content))
    }

    fn success_record(
        &self,
        notice: &RawNotice,
        header: Option<&GazetteHeader>,
        category: NoticeCategory,
        payload: &ExtractedPayload,
        content: GeneratedContent,
    ) -> NoticeRecord {
        let mut record = NoticeRecord::blank(notice.text.clone(), notice.source_order);
        record.status = ProcessingStatus::Success;
        record.category = category.as_str().to_string();
        record.title = content.title;
        record.summary = content.summary;
        record.article = content.article;
        record.social_summary = content.social_summary;
        record.actionable_info = content.actionable_info;
        record.significance = content.significance;
        record.extracted_items = Some(payload.to_value());
        record.apply_header(header);
        lift_notice_fields(&mut record, payload, header);
        info!(
            "Notice {} → SUCCESS ({})",
            notice.source_order, record.category
        );
        record
    }

    /// Record for a notice whose extraction succeeded but generation gave up.
    ///
    /// The extracted payload is the valuable part; it is preserved verbatim
    /// so an editor (or the retry job) can finish the work.
    fn generation_failed_record(
        &self,
        notice: &RawNotice,
        header: Option<&GazetteHeader>,
        category: NoticeCategory,
        payload: &ExtractedPayload,
    ) -> NoticeRecord {
        let mut record = NoticeRecord::blank(notice.text.clone(), notice.source_order);
        record.status = ProcessingStatus::Failed;
        record.failure_stage = Some(StageFailure::Generation.stage());
        record.category = category.as_str().to_string();
        record.title = format!("[GENERATION FAILED] {category} Notice (Review Extracted Data)");
        record.summary =
            "Content generation failed after all retries. The extracted data below is complete and ready for manual review.".to_string();
        record.article = serde_json::to_string_pretty(&payload.to_value())
            .unwrap_or_else(|_| payload.to_value().to_string());
        record.social_summary = "Processing error. Needs manual review.".to_string();
        record.actionable_info = "Review needed".to_string();
        record.extracted_items = Some(payload.to_value());
        record.apply_header(header);
        lift_notice_fields(&mut record, payload, header);
        record
    }

    /// Record for a notice that failed before any structured data existed.
    pub fn fallback_record(
        &self,
        notice: &RawNotice,
        header: Option<&GazetteHeader>,
        failure: &StageFailure,
    ) -> NoticeRecord {
        warn!(
            "Notice {} failed at {:?}: {failure}",
            notice.source_order,
            failure.stage()
        );
        let mut record = NoticeRecord::blank(notice.text.clone(), notice.source_order);
        record.status = ProcessingStatus::Failed;
        record.failure_stage = Some(failure.stage());
        record.category = "Uncategorized".to_string();
        record.title = "[PROCESSING FAILED] Review Needed".to_string();
        record.summary = format!(
            "Automatic processing failed: {failure}. The raw notice text is attached for manual review."
        );
        record.article = notice.text.clone();
        record.social_summary = "Processing error. Needs manual review.".to_string();
        record.actionable_info = "Manual review required.".to_string();
        record.notice_number = notice_number_from_text(&notice.text).unwrap_or_default();
        record.published_date = header.and_then(|h| h.date);
        record.apply_header(header);
        record
    }
}

/// Lift notice-level fields (number, signatory, date) from the first
/// extracted item, with structural fallbacks.
fn lift_notice_fields(
    record: &mut NoticeRecord,
    payload: &ExtractedPayload,
    header: Option<&GazetteHeader>,
) {
    let first = payload.first_item();

    record.notice_number = first
        .and_then(|item| first_string(item, &["notice_id", "reference_number"]))
        .or_else(|| notice_number_from_text(&record.raw_content))
        .unwrap_or_default();

    record.signatory = first
        .and_then(|item| first_string(item, &["signatory"]))
        .unwrap_or_default();

    record.published_date = first
        .and_then(|item| first_string(item, &["publication_date", "effective_date"]))
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
        .or(header.and_then(|h| h.date))
        .or_else(|| Some(Utc::now().date_naive()));
}

fn first_string(item: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        item.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn notice_number_from_text(text: &str) -> Option<String> {
    RE_NOTICE_NUMBER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_single(value: Value) -> ExtractedPayload {
        match ExtractedPayload::from_items(value) {
            Ok(p) => p,
            Err(e) => panic!("bad test payload: {e}"),
        }
    }

    #[test]
    fn notice_number_recovered_from_marker_line() {
        let text = "GAZETTE NOTICE NO. 2471\nTHE LAND REGISTRATION ACT\n...";
        assert_eq!(notice_number_from_text(text).as_deref(), Some("2471"));
        assert_eq!(notice_number_from_text("no marker here"), None);
    }

    #[test]
    fn lift_prefers_extracted_fields_over_structural_recovery() {
        let mut record = NoticeRecord::blank("GAZETTE NOTICE NO. 99\nbody".into(), 1);
        let payload = payload_single(json!({
            "notice_id": "2471",
            "signatory": "J. OMONDI",
            "publication_date": "2025-02-21"
        }));
        lift_notice_fields(&mut record, &payload, None);
        assert_eq!(record.notice_number, "2471");
        assert_eq!(record.signatory, "J. OMONDI");
        assert_eq!(
            record.published_date,
            NaiveDate::from_ymd_opt(2025, 2, 21)
        );
    }

    #[test]
    fn lift_falls_back_to_marker_then_header_then_today() {
        let header = GazetteHeader {
            volume: "Vol. I".into(),
            issue_number: "No. 1".into(),
            date: NaiveDate::from_ymd_opt(2025, 2, 21),
        };
        let mut record = NoticeRecord::blank("GAZETTE NOTICE NO. 7\nbody".into(), 1);
        let payload = payload_single(json!({"parcel": "LR 1234/5"}));
        lift_notice_fields(&mut record, &payload, Some(&header));
        assert_eq!(record.notice_number, "7");
        assert_eq!(record.published_date, header.date);

        // No header either: today's date, never None.
        let mut record = NoticeRecord::blank("body without marker".into(), 2);
        lift_notice_fields(&mut record, &payload, None);
        assert_eq!(record.notice_number, "");
        assert!(record.published_date.is_some());
    }

    #[test]
    fn fallback_record_shape() {
        let pipeline = test_pipeline();
        let notice = RawNotice {
            text: "GAZETTE NOTICE NO. 12\nunreadable".into(),
            source_order: 3,
        };
        let record = pipeline.fallback_record(&notice, None, &StageFailure::Triage);

        assert_eq!(record.status, ProcessingStatus::Failed);
        assert_eq!(record.category, "Uncategorized");
        assert_eq!(record.title, "[PROCESSING FAILED] Review Needed");
        assert!(record.summary.contains("Triage failed"));
        assert_eq!(record.failure_stage, Some(crate::model::FailureStage::Triage));
        assert_eq!(record.source_order, 3);
        assert_eq!(record.notice_number, "12");
        assert_eq!(record.raw_content, notice.text);
    }

    #[test]
    fn generation_failure_preserves_extracted_payload() {
        let pipeline = test_pipeline();
        let notice = RawNotice {
            text: "GAZETTE NOTICE NO. 5\nbody".into(),
            source_order: 1,
        };
        let payload = payload_single(json!({"parcel": "LR 1/2", "notice_id": "5"}));
        let record = pipeline.generation_failed_record(
            &notice,
            None,
            NoticeCategory::LandProperty,
            &payload,
        );

        assert_eq!(record.status, ProcessingStatus::Failed);
        assert_eq!(
            record.failure_stage,
            Some(crate::model::FailureStage::Generation)
        );
        assert_eq!(record.category, "Land_Property");
        assert!(record.title.starts_with("[GENERATION FAILED]"));
        assert!(record.article.contains("LR 1/2"));
        assert_eq!(record.extracted_items, Some(payload.to_value()));
    }

    fn test_pipeline() -> Pipeline {
        use crate::gateway::{BackendError, GenerateRequest, GenerativeBackend};
        use crate::schema::StaticSchemaProvider;
        use async_trait::async_trait;

        struct Dead;
        #[async_trait]
        impl GenerativeBackend for Dead {
            async fn generate(&self, _: &GenerateRequest) -> Result<String, BackendError> {
                Err(BackendError::Transient("unused in these tests".into()))
            }
        }

        let backend = Arc::new(Dead);
        Pipeline::new(
            Gateway::new(backend.clone(), backend),
            Arc::new(StaticSchemaProvider::new([])),
            ProcessingConfig::default(),
        )
    }
}
