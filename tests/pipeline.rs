//! End-to-end pipeline tests over scripted backends and the in-memory store.
//!
//! No model, no network, no pdfium: the generative seam is replaced with a
//! scripted backend so every stage outcome can be forced deterministically.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smart_gazette::pipeline::Pipeline;
use smart_gazette::{
    segment, BackendError, FailureStage, GazetteProcessor, Gateway, GenerativeBackend,
    MemoryStore, NoopNotifier, NoticeCategory, NoticeRecord, NoticeStore, Notifier,
    ProcessingConfig, ProcessingStatus, RawNotice, RetryPolicy, StaticSchemaProvider,
};

/// Backend that plays back a scripted sequence of responses, with an optional
/// per-call delay for timing-sensitive tests.
struct Scripted {
    responses: Mutex<VecDeque<Result<String, BackendError>>>,
    delay: Duration,
}

impl Scripted {
    fn new(responses: Vec<Result<String, BackendError>>) -> Arc<Self> {
        Arc::new(Scripted {
            responses: Mutex::new(responses.into()),
            delay: Duration::ZERO,
        })
    }

    fn slow(responses: Vec<Result<String, BackendError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Scripted {
            responses: Mutex::new(responses.into()),
            delay,
        })
    }
}

#[async_trait]
impl GenerativeBackend for Scripted {
    async fn generate(
        &self,
        _request: &smart_gazette::gateway::GenerateRequest,
    ) -> Result<String, BackendError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        responses
            .pop_front()
            .unwrap_or(Err(BackendError::Transient("script exhausted".into())))
    }
}

/// Notifier that records every published text.
#[derive(Default)]
struct Recording {
    texts: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for Recording {
    async fn publish(&self, text: &str) {
        self.texts.lock().unwrap().push(text.to_string());
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

fn gateway(backend: Arc<Scripted>) -> Gateway {
    Gateway::new(backend.clone(), backend).with_policies(fast_policy(), fast_policy())
}

fn schemas() -> Arc<StaticSchemaProvider> {
    Arc::new(StaticSchemaProvider::new([
        (
            NoticeCategory::LandProperty,
            r#"{"type":"object","properties":{"parcel":{},"notice_id":{}}}"#.to_string(),
        ),
        (
            NoticeCategory::Appointments,
            r#"{"type":"object","properties":{"appointee":{}}}"#.to_string(),
        ),
    ]))
}

fn config() -> ProcessingConfig {
    match ProcessingConfig::builder()
        .pacing_delay(Duration::from_millis(1))
        .build()
    {
        Ok(c) => c,
        Err(e) => panic!("config: {e}"),
    }
}

fn pipeline(backend: Arc<Scripted>) -> Pipeline {
    Pipeline::new(gateway(backend), schemas(), config())
}

fn notice(text: &str, order: u32) -> RawNotice {
    RawNotice {
        text: text.to_string(),
        source_order: order,
    }
}

fn generation_json(significance: u8) -> String {
    json!({
        "title": "New Land Title Issued in Nairobi",
        "summary": "A provisional land certificate was issued.",
        "article": "The registrar has given notice of a new certificate of lease.",
        "xSummary": "New land title issued — objections within 60 days.",
        "actionableInfo": "Submit objections within sixty (60) days from the notice date.",
        "significance": significance
    })
    .to_string()
}

#[tokio::test]
async fn three_stages_produce_a_success_record() {
    let backend = Scripted::new(vec![
        Ok("Land_Property".into()),
        Ok(r#"{"items": {"parcel": "LR 2059/11", "notice_id": "2471", "signatory": "J. OMONDI"}}"#
            .into()),
        Ok(generation_json(5)),
    ]);

    let record = pipeline(backend)
        .process_notice(
            &notice("GAZETTE NOTICE NO. 2471\nTHE LAND REGISTRATION ACT\n…", 1),
            None,
        )
        .await;

    assert_eq!(record.status, ProcessingStatus::Success);
    assert_eq!(record.category, "Land_Property");
    assert_eq!(record.title, "New Land Title Issued in Nairobi");
    assert_eq!(record.notice_number, "2471");
    assert_eq!(record.signatory, "J. OMONDI");
    assert_eq!(record.significance, Some(5));
    assert!(record.extracted_items.is_some());
    assert_eq!(record.failure_stage, None);
}

#[tokio::test]
async fn every_segmented_notice_gets_exactly_one_record() {
    // Notice 1 succeeds fully; notice 2's triage exhausts all retries.
    let backend = Scripted::new(vec![
        Ok("Land_Property".into()),
        Ok(r#"{"items": {"parcel": "LR 1/1"}}"#.into()),
        Ok(generation_json(4)),
        Err(BackendError::Transient("503".into())),
        Err(BackendError::Transient("503".into())),
        Err(BackendError::Transient("503".into())),
    ]);
    let pipeline = pipeline(backend);
    let store = MemoryStore::new();

    let text = "masthead\nGAZETTE NOTICE NO. 1\nfirst\nGAZETTE NOTICE NO. 2\nsecond\n";
    let notices = segment::segment_notices(text);
    assert_eq!(notices.len(), 2);

    for n in &notices {
        let record = pipeline.process_notice(n, None).await;
        store.create(record).await.unwrap();
    }

    let records = store.all().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, ProcessingStatus::Success);
    assert_eq!(records[1].status, ProcessingStatus::Failed);
    assert_eq!(records[1].category, "Uncategorized");
    assert_eq!(records[1].failure_stage, Some(FailureStage::Triage));
    assert_eq!(records[1].title, "[PROCESSING FAILED] Review Needed");
    assert_eq!(records[1].source_order, 2);
}

#[tokio::test]
async fn document_without_markers_is_one_notice() {
    let text = "A circular that never uses the marker format.\nPage two text.\n";
    let notices = segment::segment_notices(text);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].source_order, 1);

    let backend = Scripted::new(vec![
        Ok("Miscellaneous".into()),
        // No schema for Miscellaneous: extraction fails, one fallback record.
    ]);
    let record = pipeline(backend).process_notice(&notices[0], None).await;
    assert_eq!(record.status, ProcessingStatus::Failed);
    assert_eq!(record.failure_stage, Some(FailureStage::Extraction));
    assert!(record.summary.contains("Schema file not found"));
}

#[tokio::test]
async fn empty_items_object_fails_with_named_reason() {
    let backend = Scripted::new(vec![
        Ok("Land_Property".into()),
        Ok(r#"{"items": {}}"#.into()),
    ]);
    let record = pipeline(backend)
        .process_notice(&notice("GAZETTE NOTICE NO. 3\nbody", 1), None)
        .await;

    assert_eq!(record.status, ProcessingStatus::Failed);
    assert_eq!(record.failure_stage, Some(FailureStage::Extraction));
    assert!(record.summary.contains("empty"), "summary: {}", record.summary);
}

#[tokio::test]
async fn malformed_extraction_json_is_repaired() {
    // Trailing comma and unquoted key: the repair pass must save this.
    let backend = Scripted::new(vec![
        Ok("Land_Property".into()),
        Ok("```json\n{items: [{\"parcel\": \"LR 9/9\"},]}\n```".into()),
        Ok(generation_json(3)),
    ]);
    let record = pipeline(backend)
        .process_notice(&notice("GAZETTE NOTICE NO. 9\nbody", 1), None)
        .await;

    assert_eq!(record.status, ProcessingStatus::Success);
    let items = record.extracted_items.unwrap();
    assert_eq!(items[0]["parcel"], "LR 9/9");
}

#[tokio::test]
async fn generation_failure_keeps_extracted_data_for_review() {
    let backend = Scripted::new(vec![
        Ok("Land_Property".into()),
        Ok(r#"{"items": {"parcel": "LR 7/7"}}"#.into()),
        Err(BackendError::Transient("500".into())),
        Err(BackendError::Transient("500".into())),
        Err(BackendError::Transient("500".into())),
    ]);
    let record = pipeline(backend)
        .process_notice(&notice("GAZETTE NOTICE NO. 7\nbody", 1), None)
        .await;

    assert_eq!(record.status, ProcessingStatus::Failed);
    assert_eq!(record.failure_stage, Some(FailureStage::Generation));
    assert_eq!(record.category, "Land_Property");
    assert!(record.title.starts_with("[GENERATION FAILED]"));
    assert!(record.article.contains("LR 7/7"));
    assert_eq!(record.extracted_items, Some(json!({"parcel": "LR 7/7"})));
}

fn seeded_failed_record(stage: FailureStage) -> NoticeRecord {
    let mut r = NoticeRecord::blank("GAZETTE NOTICE NO. 7\nbody".into(), 1);
    r.status = ProcessingStatus::Failed;
    r.failure_stage = Some(stage);
    match stage {
        FailureStage::Generation => {
            r.category = "Land_Property".into();
            r.extracted_items = Some(json!({"parcel": "LR 7/7", "notice_id": "7"}));
            r.summary = "Content generation failed.".into();
        }
        _ => {
            r.category = "Uncategorized".into();
            r.summary = "Automatic processing failed.".into();
        }
    }
    r
}

fn processor(
    backend: Arc<Scripted>,
    store: Arc<MemoryStore>,
    notifier: Arc<dyn Notifier>,
) -> GazetteProcessor {
    GazetteProcessor::from_parts(gateway(backend), schemas(), config(), store, notifier)
}

#[tokio::test]
async fn retry_reenters_at_generation_and_publishes_significant_articles() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(seeded_failed_record(FailureStage::Generation))
        .await
        .unwrap();

    // Only one generative call expected: generation, not triage or extraction.
    let backend = Scripted::new(vec![Ok(generation_json(9))]);
    let recording = Arc::new(Recording::default());
    let processor = processor(backend, store.clone(), recording.clone());

    let summary = processor.retry_failed_notices().await.unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.recovered, 1);
    assert_eq!(summary.still_failed, 0);

    let records = store.all().await;
    assert_eq!(records[0].status, ProcessingStatus::Success);
    assert_eq!(records[0].id, Some(1));
    assert_eq!(records[0].title, "New Land Title Issued in Nairobi");

    // significance 9 ≥ threshold 8: the social summary was published.
    let published = recording.texts.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert!(published[0].contains("New land title"));
}

#[tokio::test]
async fn triage_stage_failures_retry_through_the_full_pipeline() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(seeded_failed_record(FailureStage::Triage))
        .await
        .unwrap();

    let backend = Scripted::new(vec![
        Ok("Land_Property".into()),
        Ok(r#"{"items": {"parcel": "LR 7/7"}}"#.into()),
        Ok(generation_json(2)),
    ]);
    let processor = processor(backend, store.clone(), Arc::new(NoopNotifier));

    let summary = processor.retry_failed_notices().await.unwrap();
    assert_eq!(summary.recovered, 1);
    assert_eq!(store.all().await[0].status, ProcessingStatus::Success);
}

#[tokio::test]
async fn repeated_retry_failure_is_annotated() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(seeded_failed_record(FailureStage::Triage))
        .await
        .unwrap();

    // Everything fails again.
    let backend = Scripted::new(vec![]);
    let processor = processor(backend, store.clone(), Arc::new(NoopNotifier));

    let summary = processor.retry_failed_notices().await.unwrap();
    assert_eq!(summary.still_failed, 1);

    let record = &store.all().await[0];
    assert_eq!(record.status, ProcessingStatus::Failed);
    assert!(record.article.ends_with("--- RETRY FAILED ---"));
    // Identity survives the failed retry.
    assert_eq!(record.id, Some(1));
}

#[tokio::test]
async fn concurrent_jobs_are_single_flight() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(seeded_failed_record(FailureStage::Generation))
        .await
        .unwrap();

    let backend = Scripted::slow(
        vec![Ok(generation_json(1))],
        Duration::from_millis(100),
    );
    let processor = Arc::new(processor(backend, store, Arc::new(NoopNotifier)));

    let (first, second) = tokio::join!(
        processor.retry_failed_notices(),
        processor.retry_failed_notices()
    );

    // Exactly one job ran; the other was refused without side effects.
    let errors = [first.is_err(), second.is_err()];
    assert_eq!(errors.iter().filter(|e| **e).count(), 1);
    assert!(!processor.is_processing());
}

#[tokio::test]
async fn stop_request_halts_between_notices() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(seeded_failed_record(FailureStage::Generation))
        .await
        .unwrap();
    store
        .create(seeded_failed_record(FailureStage::Generation))
        .await
        .unwrap();

    let backend = Scripted::slow(
        vec![Ok(generation_json(1)), Ok(generation_json(1))],
        Duration::from_millis(100),
    );
    let processor = Arc::new(processor(backend, store, Arc::new(NoopNotifier)));

    assert!(!processor.request_stop(), "no job running yet");

    let job = {
        let p = Arc::clone(&processor);
        tokio::spawn(async move { p.retry_failed_notices().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(processor.request_stop());

    let summary = job.await.unwrap().unwrap();
    assert!(summary.stopped_early);
    assert_eq!(summary.attempted, 1);
    assert!(!processor.is_processing(), "lock released after the job");
}
