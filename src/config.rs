//! Configuration for gazette processing.
//!
//! Every knob lives in one [`ProcessingConfig`] built through its builder, so
//! jobs can share a config, log it, and diff two runs to understand why their
//! outputs differ. Defaults reproduce the production deployment; tests and
//! the CLI override only what they need.

use crate::error::GazetteError;
use crate::model::NoticeCategory;
use edgequake_llm::LLMProvider;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one processing or retry job.
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Rendering DPI for the page-1 vision pass. Default: 300.
    ///
    /// Gazette scans carry small serif print; 300 DPI keeps it legible to the
    /// vision model. Lower values noticeably degrade OCR of notice numbers.
    pub dpi: u32,

    /// Cap on the longest rendered edge in pixels. Default: 3500.
    ///
    /// Independent safety limit: a broadsheet page at 300 DPI could exhaust
    /// memory without it.
    pub max_rendered_pixels: u32,

    /// Maximum attempts per generative call. Default: 3.
    pub max_retries: u32,

    /// Base backoff delay for text calls (doubles per retry). Default: 2 s.
    pub text_backoff: Duration,

    /// Base backoff delay for vision calls. Default: 5 s.
    ///
    /// Vision requests carry megabyte payloads and hit rate limits harder,
    /// so they start from a longer wait.
    pub vision_backoff: Duration,

    /// Pause between notices. Default: 500 ms.
    ///
    /// Sequential pacing is deliberate: it keeps the pipeline inside the
    /// provider's rate limits and preserves `source_order` persistence order.
    pub pacing_delay: Duration,

    /// Sampling temperature / token budget for text-stage calls.
    /// Defaults: 0.2 / 4096.
    pub text_temperature: f32,
    pub text_max_tokens: usize,

    /// Sampling temperature / token budget for the vision OCR call.
    /// Defaults: 0.1 / 8192 — transcription wants determinism and room.
    pub vision_temperature: f32,
    pub vision_max_tokens: usize,

    /// Categories whose multi-item notices may be merged into one digest
    /// article. Default: `Land_Property` and `Tenders`.
    pub digest_categories: HashSet<NoticeCategory>,

    /// Directory holding per-category extraction schemas. Default: `schemas/field`.
    pub schema_dir: PathBuf,

    /// Significance at or above which a successful record is auto-published
    /// through the notifier. Default: 8.
    pub significance_threshold: u8,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Named provider (e.g. "gemini", "openai"); resolved through
    /// `ProviderFactory` with the model names below.
    pub provider_name: Option<String>,

    /// Model for text stages (triage/extraction/generation). Provider default
    /// when `None`.
    pub text_model: Option<String>,

    /// Model for the vision OCR pass. Provider default when `None`.
    pub vision_model: Option<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig {
            dpi: 300,
            max_rendered_pixels: 3500,
            max_retries: 3,
            text_backoff: Duration::from_secs(2),
            vision_backoff: Duration::from_secs(5),
            pacing_delay: Duration::from_millis(500),
            text_temperature: 0.2,
            text_max_tokens: 4096,
            vision_temperature: 0.1,
            vision_max_tokens: 8192,
            digest_categories: HashSet::from([
                NoticeCategory::LandProperty,
                NoticeCategory::Tenders,
            ]),
            schema_dir: PathBuf::from("schemas/field"),
            significance_threshold: 8,
            provider: None,
            provider_name: None,
            text_model: None,
            vision_model: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_retries", &self.max_retries)
            .field("text_backoff", &self.text_backoff)
            .field("vision_backoff", &self.vision_backoff)
            .field("pacing_delay", &self.pacing_delay)
            .field("digest_categories", &self.digest_categories)
            .field("schema_dir", &self.schema_dir)
            .field("significance_threshold", &self.significance_threshold)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .finish()
    }
}

impl ProcessingConfig {
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn text_backoff(mut self, d: Duration) -> Self {
        self.config.text_backoff = d;
        self
    }

    pub fn vision_backoff(mut self, d: Duration) -> Self {
        self.config.vision_backoff = d;
        self
    }

    pub fn pacing_delay(mut self, d: Duration) -> Self {
        self.config.pacing_delay = d;
        self
    }

    pub fn digest_categories(
        mut self,
        categories: impl IntoIterator<Item = NoticeCategory>,
    ) -> Self {
        self.config.digest_categories = categories.into_iter().collect();
        self
    }

    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.schema_dir = dir.into();
        self
    }

    pub fn significance_threshold(mut self, n: u8) -> Self {
        self.config.significance_threshold = n.clamp(1, 10);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.config.text_model = Some(model.into());
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, GazetteError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(GazetteError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_retries == 0 {
            return Err(GazetteError::InvalidConfig(
                "max_retries must be ≥ 1".into(),
            ));
        }
        if c.text_max_tokens == 0 || c.vision_max_tokens == 0 {
            return Err(GazetteError::InvalidConfig(
                "token budgets must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
