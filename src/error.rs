//! Error types for the smart-gazette library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`GazetteError`] — **Fatal**: the document job cannot proceed at all
//!   (unreadable PDF, no provider configured, another job holds the lock,
//!   storage unavailable). Returned as `Err(GazetteError)` from the job
//!   entry points.
//!
//! * [`StageFailure`] — **Notice-fatal only**: one notice's pipeline stage
//!   gave up. It is converted into a persisted fallback record and the job
//!   moves on to the next notice. It never aborts the document.
//!
//! Transient generative-call errors never reach either type: they are
//! consumed inside the gateway's retry loop, and exhaustion surfaces as a
//! `StageFailure` at the calling stage.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::FailureStage;

/// All fatal errors returned by the smart-gazette library.
///
/// Per-notice failures use [`StageFailure`] and become fallback records
/// rather than propagating here.
#[derive(Debug, Error)]
pub enum GazetteError {
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The PDF could not be opened or parsed at all.
    #[error("Cannot open PDF '{path}': {detail}")]
    UnreadablePdf { path: PathBuf, detail: String },

    /// The configured generative provider is not initialised.
    #[error("Generative provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Single-flight admission failed: another job holds the processing lock.
    ///
    /// The refused job performs no side effects.
    #[error("Another processing job is already running")]
    JobAlreadyRunning,

    /// The record store rejected a create/update.
    ///
    /// This is the one condition that aborts a job mid-document: without
    /// storage, continuing would violate the one-record-per-notice guarantee.
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure scoped to a single notice's pipeline run.
///
/// Carries enough to build the fallback record: a human-readable reason and
/// the stage to resume from on retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageFailure {
    /// The triage call never returned a usable response.
    #[error("Triage failed")]
    Triage,

    /// No schema document exists for the triaged category.
    #[error("Schema file not found for category '{category}'")]
    SchemaMissing { category: String },

    /// The extraction response had no parseable `items` wrapper.
    #[error("Extraction failed: no 'items' wrapper")]
    ExtractionWrapperInvalid,

    /// The `items` value was null, an empty object, or an empty array.
    #[error("Extraction failed: 'items' was null or empty ({detail})")]
    ExtractionEmpty { detail: String },

    /// The generation call failed or returned unparseable content.
    ///
    /// Not pipeline-fatal by itself — the record is still persisted with the
    /// extracted payload — but recorded so retries can re-enter at generation.
    #[error("Generation failed")]
    Generation,
}

impl StageFailure {
    /// The stage a retry should resume from.
    pub fn stage(&self) -> FailureStage {
        match self {
            StageFailure::Triage => FailureStage::Triage,
            StageFailure::SchemaMissing { .. }
            | StageFailure::ExtractionWrapperInvalid
            | StageFailure::ExtractionEmpty { .. } => FailureStage::Extraction,
            StageFailure::Generation => FailureStage::Generation,
        }
    }
}
