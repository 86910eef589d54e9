//! Stage 1 — triage: classify a notice into one category.

use tracing::{info, warn};

use crate::error::StageFailure;
use crate::gateway::Gateway;
use crate::model::NoticeCategory;
use crate::prompts;

/// Classification reads at most this many characters. The category is always
/// decided in the opening lines; the tail is boilerplate that only adds cost.
const TRIAGE_WINDOW: usize = 4000;

/// Classify the notice text.
///
/// A garbage response coerces to `Miscellaneous`; only a gateway give-up
/// (all retries exhausted) fails the stage.
pub async fn triage(gateway: &Gateway, notice_text: &str) -> Result<NoticeCategory, StageFailure> {
    let excerpt = truncate_chars(notice_text, TRIAGE_WINDOW);
    let prompt = prompts::triage_prompt(excerpt);

    let response = gateway
        .generate_text(&prompt)
        .await
        .ok_or(StageFailure::Triage)?;

    let category = NoticeCategory::from_triage_response(&response);
    if category == NoticeCategory::Miscellaneous && response.trim() != "Miscellaneous" {
        warn!("Unrecognised triage response '{}' — coerced to Miscellaneous", response.trim());
    } else {
        info!("Triage: {category}");
    }
    Ok(category)
}

/// Char-boundary-safe prefix of at most `max` characters.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
