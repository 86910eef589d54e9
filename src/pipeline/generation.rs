//! Stage 3 — generation: turn extracted data into narrative content.

use tracing::{info, warn};

use crate::error::StageFailure;
use crate::gateway::Gateway;
use crate::json_repair;
use crate::model::{ExtractedPayload, GeneratedContent, NoticeCategory};
use crate::prompts;

/// Generate narrative content for an extracted payload.
///
/// `digest_allowed` is the category-level grouping policy; the digest
/// invitation is only issued when the payload is actually an array.
pub async fn generate(
    gateway: &Gateway,
    payload: &ExtractedPayload,
    category: NoticeCategory,
    digest_allowed: bool,
) -> Result<GeneratedContent, StageFailure> {
    let data = payload.to_value();
    let prompt = prompts::generation_prompt(&data, category, digest_allowed);

    let response = gateway
        .generate_text(&prompt)
        .await
        .ok_or(StageFailure::Generation)?;

    let object = json_repair::recover_object(&response).ok_or(StageFailure::Generation)?;

    let content: GeneratedContent = match serde_json::from_value(object) {
        Ok(c) => c,
        Err(e) => {
            warn!("Generation JSON did not match the content shape: {e}");
            return Err(StageFailure::Generation);
        }
    };

    // All fields are defaulted; a response that filled none of them is a
    // failure, not an empty article.
    if content.title.trim().is_empty() && content.article.trim().is_empty() {
        warn!("Generation response carried neither title nor article");
        return Err(StageFailure::Generation);
    }

    info!(
        "Generation: '{}' (significance {:?})",
        content.title, content.significance
    );
    Ok(content)
}
