//! # smart-gazette
//!
//! Turn scanned government gazette PDFs into structured, readable articles
//! using generative AI.
//!
//! ## Why this crate?
//!
//! Gazette PDFs are long, dense, and scanned from print: multi-column
//! mastheads, hundreds of individually numbered legal notices, small serif
//! type. Plain text extraction garbles the front page and tells you nothing
//! about what any notice *means*. This crate reads the front page with a
//! vision model, splits the document into its individual notices, and runs
//! each notice through a three-stage AI pipeline that classifies it, extracts
//! its facts against a per-category schema, and writes a plain-language
//! article about it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Gazette PDF
//!  │
//!  ├─ 1. OCR       vision model reads page 1; pdfium strips pages 2+
//!  ├─ 2. Header    volume / issue / date lifted from the masthead
//!  ├─ 3. Segment   split on "GAZETTE NOTICE NO. n" marker lines
//!  └─ 4. Per notice (sequential, paced):
//!        ├─ Triage       classify into one of nine categories
//!        ├─ Extraction   schema-guided structured data ({"items": …})
//!        ├─ Generation   title / summary / article / social / actionable
//!        └─ Persist      exactly one record, success or fallback
//! ```
//!
//! Every generative call goes through a single retry gateway
//! ([`gateway::Gateway`]) with exponential backoff; per-notice failures
//! become reviewable FAILED records instead of aborting the document, and a
//! retry job ([`GazetteProcessor::retry_failed_notices`]) re-enters the
//! pipeline at the stage each record failed at.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smart_gazette::{GazetteProcessor, MemoryStore, NoopNotifier, ProcessingConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ProcessingConfig::default();
//!     let store = Arc::new(MemoryStore::new());
//!     let processor =
//!         GazetteProcessor::new(config, store.clone(), Arc::new(NoopNotifier)).await?;
//!
//!     let summary = processor.process_document("gazette-vol-36.pdf").await?;
//!     println!(
//!         "{} notices: {} ok, {} for review",
//!         summary.total_notices, summary.succeeded, summary.failed
//!     );
//!     for record in store.all().await {
//!         println!("[{}] {}", record.category, record.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `smart-gazette` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! smart-gazette = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod gateway;
pub mod header;
pub mod job;
pub mod json_repair;
pub mod model;
pub mod notify;
pub mod ocr;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod segment;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ProcessingConfig, ProcessingConfigBuilder};
pub use error::{GazetteError, StageFailure};
pub use gateway::{BackendError, Gateway, GenerativeBackend, RetryPolicy};
pub use job::{GazetteProcessor, JobState, JobSummary, RetrySummary};
pub use model::{
    ExtractedPayload, FailureStage, GazetteHeader, GeneratedContent, NoticeCategory, NoticeRecord,
    ProcessingStatus, RawNotice,
};
pub use notify::{Notifier, NoopNotifier, WebhookNotifier};
pub use schema::{DirSchemaProvider, SchemaProvider, StaticSchemaProvider};
pub use store::{MemoryStore, NoticeStore};
