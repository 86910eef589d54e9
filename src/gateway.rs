//! Generative Call Gateway: one retry/backoff wrapper for every model call.
//!
//! Every external generative call in the pipeline — vision OCR, header
//! extraction, triage, extraction, generation — goes through
//! [`Gateway`], which applies a single [`RetryPolicy`] (fixed attempt count,
//! exponential backoff) instead of each call site growing its own loop.
//!
//! ## Failure semantics
//!
//! * Transient errors (5xx, timeouts, rate limits) are retried with the
//!   backoff schedule.
//! * An authentication failure aborts the call immediately — retrying a bad
//!   credential only burns quota.
//! * An empty-text "success" on a vision call is retried: it usually means
//!   the model returned a blocked/empty candidate for a perfectly good image.
//! * Exhausting all attempts yields `None`. Callers treat `None` as "this
//!   stage failed for this notice" — it is never an exception that aborts
//!   the document job.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};

/// A request to the generative capability: a text prompt, optionally
/// accompanied by one inline image part.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub image: Option<ImagePart>,
}

/// Base64-encoded inline image with its mime type.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub base64_data: String,
    pub mime_type: String,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.into(),
            image: None,
        }
    }
}

/// Failure kinds a backend can report, tagged by retryability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Authorization/permission failure. Never retried.
    #[error("authentication failure: {0}")]
    Auth(String),

    /// The response was blocked or carried no candidates. Treated as a
    /// failure of this attempt, never parsed as content.
    #[error("response blocked or empty: {0}")]
    Blocked(String),

    /// Network/server error expected to resolve on its own.
    #[error("transient error: {0}")]
    Transient(String),
}

impl BackendError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BackendError::Auth(_))
    }
}

/// The seam to the external generative capability.
///
/// Production code wraps an [`LLMProvider`] via [`ProviderBackend`]; tests
/// substitute scripted implementations.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError>;
}

/// Retry schedule: `max_attempts` total tries, delay doubling from
/// `base_delay` before each retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Text calls: 3 attempts, 2 s → 4 s between them.
    pub const TEXT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(2),
    };

    /// Vision calls carry larger payloads and rate-limit harder: 5 s → 10 s.
    pub const VISION: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(5),
    };

    /// Delay to wait before the given 1-based attempt (attempt 1 waits nothing).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.base_delay * 2u32.saturating_pow(attempt - 2)
        }
    }
}

/// Uniform wrapper around the pipeline's two generative channels.
///
/// `text` and `vision` may be the same backend; they are split so a fast
/// model can serve triage/OCR while a stronger one serves extraction and
/// generation, as the original deployment did.
#[derive(Clone)]
pub struct Gateway {
    text: Arc<dyn GenerativeBackend>,
    vision: Arc<dyn GenerativeBackend>,
    text_policy: RetryPolicy,
    vision_policy: RetryPolicy,
}

impl Gateway {
    pub fn new(text: Arc<dyn GenerativeBackend>, vision: Arc<dyn GenerativeBackend>) -> Gateway {
        Gateway {
            text,
            vision,
            text_policy: RetryPolicy::TEXT,
            vision_policy: RetryPolicy::VISION,
        }
    }

    /// Override the retry schedules (tests shrink the delays).
    pub fn with_policies(mut self, text: RetryPolicy, vision: RetryPolicy) -> Gateway {
        self.text_policy = text;
        self.vision_policy = vision;
        self
    }

    /// Text-only call. `None` means the stage failed after all retries.
    pub async fn generate_text(&self, prompt: &str) -> Option<String> {
        let request = GenerateRequest::text(prompt);
        call_with_retry(&*self.text, &request, self.text_policy, false).await
    }

    /// Text+image call. Empty responses are retried (see module docs).
    pub async fn generate_vision(&self, prompt: &str, image: ImagePart) -> Option<String> {
        let request = GenerateRequest {
            prompt: prompt.to_string(),
            image: Some(image),
        };
        call_with_retry(&*self.vision, &request, self.vision_policy, true).await
    }
}

/// The single retry loop every call goes through.
async fn call_with_retry(
    backend: &dyn GenerativeBackend,
    request: &GenerateRequest,
    policy: RetryPolicy,
    empty_is_retryable: bool,
) -> Option<String> {
    let mut last_err: Option<BackendError> = None;

    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            warn!(
                "Waiting {}s before retry attempt {}/{}",
                delay.as_secs_f32(),
                attempt,
                policy.max_attempts
            );
            sleep(delay).await;
        }

        debug!("Generative call attempt {}/{}", attempt, policy.max_attempts);
        match backend.generate(request).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() && empty_is_retryable {
                    warn!("Response had no text content (attempt {attempt}) — retrying");
                    last_err = Some(BackendError::Blocked("empty response".into()));
                    continue;
                }
                return Some(text.to_string());
            }
            Err(e) if !e.is_retryable() => {
                error!("Authentication error — not retrying: {e}");
                return None;
            }
            Err(e) => {
                warn!(
                    "Generative call failed (attempt {}/{}): {e}",
                    attempt, policy.max_attempts
                );
                last_err = Some(e);
            }
        }
    }

    error!(
        "Max retries reached ({}). Giving up. Last error: {}",
        policy.max_attempts,
        last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "none".into())
    );
    None
}

// ── Production backend over edgequake-llm ────────────────────────────────────

/// [`GenerativeBackend`] backed by an [`LLMProvider`].
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        ProviderBackend {
            provider,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl GenerativeBackend for ProviderBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let message = match &request.image {
            Some(img) => ChatMessage::user_with_images(
                request.prompt.clone(),
                vec![ImageData::new(img.base64_data.clone(), &img.mime_type)],
            ),
            None => ChatMessage::user(request.prompt.clone()),
        };
        let messages = vec![message];

        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => Ok(response.content),
            Err(e) => Err(classify_provider_error(&e.to_string())),
        }
    }
}

/// Map a provider error message onto the retryability taxonomy.
///
/// Providers do not share an error type, so classification is by message —
/// the same approach the upstream APIs force on every client.
fn classify_provider_error(message: &str) -> BackendError {
    let lower = message.to_lowercase();
    if lower.contains("permission_denied")
        || lower.contains("unauthorized")
        || lower.contains("unauthenticated")
        || lower.contains("api key")
        || lower.contains("401")
        || lower.contains("403")
    {
        BackendError::Auth(message.to_string())
    } else if lower.contains("blocked")
        || lower.contains("content_filter")
        || lower.contains("no candidates")
    {
        BackendError::Blocked(message.to_string())
    } else {
        BackendError::Transient(message.to_string())
    }
}
