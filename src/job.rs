//! Job control: single-flight admission, the document job, and the retry job.
//!
//! Exactly one job (processing or retry) runs at a time. Admission is a
//! compare-and-swap on [`JobState::running`]; the guard returned by
//! [`JobState::try_begin`] releases the lock and clears any pending stop
//! request on drop, so a panicking job can never wedge the processor.
//!
//! Cooperative stop: [`GazetteProcessor::request_stop`] sets a flag that the
//! job checks between notices. The notice in flight always completes and is
//! persisted; the job then halts cleanly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

use edgequake_llm::{LLMProvider, ProviderFactory};

use crate::config::ProcessingConfig;
use crate::error::GazetteError;
use crate::gateway::{Gateway, ProviderBackend, RetryPolicy};
use crate::header;
use crate::model::{
    ExtractedPayload, FailureStage, GazetteHeader, NoticeCategory, NoticeRecord, ProcessingStatus,
    RawNotice,
};
use crate::notify::Notifier;
use crate::ocr;
use crate::pipeline::Pipeline;
use crate::schema::{DirSchemaProvider, SchemaProvider};
use crate::segment;
use crate::store::NoticeStore;

/// Shared processing lock and stop flag.
#[derive(Default)]
pub struct JobState {
    running: AtomicBool,
    stop_requested: AtomicBool,
}

impl JobState {
    pub fn new() -> Arc<JobState> {
        Arc::new(JobState::default())
    }

    /// Try to take the processing lock. The refused caller performs no side
    /// effects at all.
    pub fn try_begin(self: &Arc<Self>) -> Result<JobGuard, GazetteError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GazetteError::JobAlreadyRunning);
        }
        Ok(JobGuard {
            state: Arc::clone(self),
        })
    }

    /// Ask the running job to stop after the current notice.
    ///
    /// Returns `true` if a job was running to receive the request.
    pub fn request_stop(&self) -> bool {
        let was_running = self.running.load(Ordering::SeqCst);
        if was_running {
            self.stop_requested.store(true, Ordering::SeqCst);
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

/// RAII guard for the processing lock.
pub struct JobGuard {
    state: Arc<JobState>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        // Clear the stop flag first so a request aimed at this job cannot
        // leak into the next one.
        self.state.stop_requested.store(false, Ordering::SeqCst);
        self.state.running.store(false, Ordering::SeqCst);
    }
}

/// Outcome of one document job.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub document: String,
    pub total_notices: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub stopped_early: bool,
}

/// Outcome of one retry job.
#[derive(Debug, Clone)]
pub struct RetrySummary {
    pub attempted: usize,
    pub recovered: usize,
    pub still_failed: usize,
    pub stopped_early: bool,
}

/// The top-level processor: owns the pipeline, the store, the notifier and
/// the single-flight state.
pub struct GazetteProcessor {
    pipeline: Pipeline,
    store: Arc<dyn NoticeStore>,
    notifier: Arc<dyn Notifier>,
    state: Arc<JobState>,
}

impl GazetteProcessor {
    /// Build a processor from configuration, resolving the generative
    /// provider chain.
    pub async fn new(
        config: ProcessingConfig,
        store: Arc<dyn NoticeStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<GazetteProcessor, GazetteError> {
        let (text_provider, vision_provider) = resolve_providers(&config).await?;
        let gateway = build_gateway(&config, text_provider, vision_provider);
        let schemas: Arc<dyn SchemaProvider> =
            Arc::new(DirSchemaProvider::new(config.schema_dir.clone()));
        Ok(Self::from_parts(gateway, schemas, config, store, notifier))
    }

    /// Assemble a processor from already-built parts (tests, embedders).
    pub fn from_parts(
        gateway: Gateway,
        schemas: Arc<dyn SchemaProvider>,
        config: ProcessingConfig,
        store: Arc<dyn NoticeStore>,
        notifier: Arc<dyn Notifier>,
    ) -> GazetteProcessor {
        GazetteProcessor {
            pipeline: Pipeline::new(gateway, schemas, config),
            store,
            notifier,
            state: JobState::new(),
        }
    }

    /// Ask the running job (if any) to stop after its current notice.
    pub fn request_stop(&self) -> bool {
        self.state.request_stop()
    }

    pub fn is_processing(&self) -> bool {
        self.state.is_running()
    }

    /// Process one gazette document end to end.
    ///
    /// Persists exactly one record per segmented notice. Only an unreadable
    /// document, a refused lock, or a storage failure abort the job.
    pub async fn process_document(&self, pdf_path: &str) -> Result<JobSummary, GazetteError> {
        let _guard = self.state.try_begin()?;
        let config = self.pipeline.config().clone();
        info!("Processing document '{pdf_path}'");

        let path = std::path::Path::new(pdf_path);
        let full_text = ocr::extract_full_text(path, &config, self.pipeline.gateway()).await?;
        let header = header::extract_header(&full_text, self.pipeline.gateway()).await;
        let notices = segment::segment_notices(&full_text);
        info!("Segmented {} notices", notices.len());

        let mut summary = JobSummary {
            document: pdf_path.to_string(),
            total_notices: notices.len(),
            succeeded: 0,
            failed: 0,
            stopped_early: false,
        };

        for (i, notice) in notices.iter().enumerate() {
            if self.state.stop_requested() {
                warn!(
                    "Stop requested — halting after {} of {} notices",
                    i,
                    notices.len()
                );
                summary.stopped_early = true;
                break;
            }

            let mut record = self.pipeline.process_notice(notice, header.as_ref()).await;
            record.original_document_path = Some(pdf_path.to_string());
            let record = self.store.create(record).await?;

            match record.status {
                ProcessingStatus::Success => summary.succeeded += 1,
                ProcessingStatus::Failed => summary.failed += 1,
            }
            self.maybe_publish(&record).await;

            if i + 1 < notices.len() {
                sleep(config.pacing_delay).await;
            }
        }

        info!(
            "Document job finished: {} succeeded, {} failed{}",
            summary.succeeded,
            summary.failed,
            if summary.stopped_early { " (stopped early)" } else { "" }
        );
        Ok(summary)
    }

    /// Re-run the pipeline for every FAILED record.
    ///
    /// Records that failed at the generation stage and still carry their
    /// extracted payload re-enter at generation only; everything else goes
    /// through the full pipeline again.
    pub async fn retry_failed_notices(&self) -> Result<RetrySummary, GazetteError> {
        let _guard = self.state.try_begin()?;
        let config = self.pipeline.config().clone();

        let failed = self.store.find_failed().await?;
        info!("Retrying {} failed records", failed.len());

        let mut summary = RetrySummary {
            attempted: 0,
            recovered: 0,
            still_failed: 0,
            stopped_early: false,
        };

        for (i, old) in failed.iter().enumerate() {
            if self.state.stop_requested() {
                warn!("Stop requested — halting retry after {} records", i);
                summary.stopped_early = true;
                break;
            }
            summary.attempted += 1;

            let notice = RawNotice {
                text: old.raw_content.clone(),
                source_order: old.source_order,
            };
            let header = stored_header(old);

            let mut fresh = match generation_retry_input(old) {
                Some((category, payload)) => {
                    match self
                        .pipeline
                        .regenerate(&notice, header.as_ref(), category, &payload)
                        .await
                    {
                        Some(record) => record,
                        None => old.clone(),
                    }
                }
                None => self.pipeline.process_notice(&notice, header.as_ref()).await,
            };

            // The retried record keeps its stored identity and engagement.
            fresh.id = old.id;
            fresh.original_document_path = old.original_document_path.clone();
            fresh.views = old.views;
            fresh.thumbs_up = old.thumbs_up;
            fresh.thumbs_down = old.thumbs_down;

            if fresh.status == ProcessingStatus::Success {
                info!("Record {:?} recovered: '{}'", fresh.id, fresh.title);
                summary.recovered += 1;
            } else {
                fresh.article.push_str("\n\n--- RETRY FAILED ---");
                summary.still_failed += 1;
            }
            self.store.update(fresh.clone()).await?;
            self.maybe_publish(&fresh).await;

            if i + 1 < failed.len() {
                sleep(config.pacing_delay).await;
            }
        }

        info!(
            "Retry job finished: {} recovered, {} still failed",
            summary.recovered, summary.still_failed
        );
        Ok(summary)
    }

    /// Auto-publish successful records at or above the significance
    /// threshold.
    async fn maybe_publish(&self, record: &NoticeRecord) {
        let threshold = self.pipeline.config().significance_threshold;
        if record.status != ProcessingStatus::Success {
            return;
        }
        let Some(significance) = record.significance else {
            return;
        };
        if significance < threshold {
            return;
        }
        let text = if record.social_summary.trim().is_empty() {
            &record.title
        } else {
            &record.social_summary
        };
        info!(
            "Auto-publishing record {:?} (significance {significance} ≥ {threshold})",
            record.id
        );
        self.notifier.publish(text).await;
    }
}

/// Reconstruct the publication header persisted on a record.
fn stored_header(record: &NoticeRecord) -> Option<GazetteHeader> {
    if record.gazette_volume.is_empty()
        && record.gazette_number.is_empty()
        && record.gazette_date.is_none()
    {
        return None;
    }
    Some(GazetteHeader {
        volume: record.gazette_volume.clone(),
        issue_number: record.gazette_number.clone(),
        date: record.gazette_date,
    })
}

/// Inputs for a generation-only retry, if the record qualifies.
fn generation_retry_input(record: &NoticeRecord) -> Option<(NoticeCategory, ExtractedPayload)> {
    if record.failure_stage != Some(FailureStage::Generation) {
        return None;
    }
    let category = NoticeCategory::ALL
        .into_iter()
        .find(|c| c.as_str() == record.category)?;
    let items = record.extracted_items.clone()?;
    let payload = ExtractedPayload::from_items(items).ok()?;
    if payload.is_empty() {
        return None;
    }
    Some((category, payload))
}

/// Resolve text and vision providers, most-specific first:
/// pre-built provider, then named provider + models, then the environment.
async fn resolve_providers(
    config: &ProcessingConfig,
) -> Result<(Arc<dyn LLMProvider>, Arc<dyn LLMProvider>), GazetteError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), Arc::clone(provider)));
    }

    if let Some(ref name) = config.provider_name {
        let text = create_provider(name, config.text_model.as_deref())?;
        let vision = match config.vision_model {
            Some(ref m) => create_provider(name, Some(m))?,
            None => Arc::clone(&text),
        };
        return Ok((text, vision));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_provider(&prov, Some(&model))?;
            return Ok((Arc::clone(&provider), provider));
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| GazetteError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No generative provider could be auto-detected from the environment.\n\
                 Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider explicitly.\n\
                 Error: {e}"
            ),
        })?;
    Ok((Arc::clone(&provider), provider))
}

fn create_provider(
    name: &str,
    model: Option<&str>,
) -> Result<Arc<dyn LLMProvider>, GazetteError> {
    let model = model.unwrap_or("gemini-2.0-flash");
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        GazetteError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn build_gateway(
    config: &ProcessingConfig,
    text: Arc<dyn LLMProvider>,
    vision: Arc<dyn LLMProvider>,
) -> Gateway {
    let text_backend = Arc::new(ProviderBackend::new(
        text,
        config.text_temperature,
        config.text_max_tokens,
    ));
    let vision_backend = Arc::new(ProviderBackend::new(
        vision,
        config.vision_temperature,
        config.vision_max_tokens,
    ));
    Gateway::new(text_backend, vision_backend).with_policies(
        RetryPolicy {
            max_attempts: config.max_retries,
            base_delay: config.text_backoff,
        },
        RetryPolicy {
            max_attempts: config.max_retries,
            base_delay: config.vision_backoff,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn admission_is_single_flight() {
        let state = JobState::new();
        let first = state.try_begin().unwrap();
        assert!(matches!(
            state.try_begin(),
            Err(GazetteError::JobAlreadyRunning)
        ));
        drop(first);
        assert!(state.try_begin().is_ok());
    }

    #[test]
    fn guard_drop_clears_stop_request() {
        let state = JobState::new();
        let guard = state.try_begin().unwrap();
        assert!(state.request_stop());
        assert!(state.stop_requested());
        drop(guard);
        assert!(!state.stop_requested());
        assert!(!state.is_running());
    }

    #[test]
    fn stop_request_without_job_reports_false() {
        let state = JobState::new();
        assert!(!state.request_stop());
        assert!(!state.stop_requested());
    }

    #[test]
    fn generation_retry_requires_stage_category_and_payload() {
        let mut record = NoticeRecord::blank("text".into(), 1);
        assert!(generation_retry_input(&record).is_none());

        record.failure_stage = Some(FailureStage::Generation);
        record.category = "Land_Property".into();
        record.extracted_items = Some(json!({"parcel": "LR 1/2"}));
        let (category, payload) = generation_retry_input(&record).unwrap();
        assert_eq!(category, NoticeCategory::LandProperty);
        assert!(!payload.is_empty());

        // An extraction-stage failure never short-circuits to generation.
        record.failure_stage = Some(FailureStage::Extraction);
        assert!(generation_retry_input(&record).is_none());

        // Unknown stored category falls back to the full pipeline.
        record.failure_stage = Some(FailureStage::Generation);
        record.category = "Uncategorized".into();
        assert!(generation_retry_input(&record).is_none());
    }
}
