//! Stage 2 — extraction: pull schema-shaped structured data out of a notice.
//!
//! The model must answer with `{"items": …}`. Everything that can go wrong
//! with that contract has its own [`StageFailure`] variant so the fallback
//! record says exactly which check tripped.

use tracing::info;

use crate::error::StageFailure;
use crate::gateway::Gateway;
use crate::json_repair;
use crate::model::{ExtractedPayload, NoticeCategory};
use crate::prompts;
use crate::schema::SchemaProvider;

/// Run extraction for an already-triaged notice.
pub async fn extract(
    gateway: &Gateway,
    schemas: &dyn SchemaProvider,
    category: NoticeCategory,
    notice_text: &str,
) -> Result<ExtractedPayload, StageFailure> {
    let schema = schemas
        .schema_for(category)
        .await
        .ok_or_else(|| StageFailure::SchemaMissing {
            category: category.as_str().to_string(),
        })?;

    let prompt = prompts::extraction_prompt(&schema, notice_text);
    let response = gateway
        .generate_text(&prompt)
        .await
        .ok_or(StageFailure::ExtractionWrapperInvalid)?;

    let object =
        json_repair::recover_object(&response).ok_or(StageFailure::ExtractionWrapperInvalid)?;

    let items = object
        .get("items")
        .cloned()
        .ok_or(StageFailure::ExtractionWrapperInvalid)?;

    let payload = ExtractedPayload::from_items(items).map_err(|detail| {
        StageFailure::ExtractionEmpty {
            detail: detail.to_string(),
        }
    })?;

    // An empty array passes `from_items` but carries nothing to generate
    // from; reject it here where the whole payload is in view.
    if payload.is_empty() {
        return Err(StageFailure::ExtractionEmpty {
            detail: "'items' was an empty array".to_string(),
        });
    }

    match &payload {
        ExtractedPayload::Single(_) => info!("Extraction: 1 item"),
        ExtractedPayload::Many(list) => info!("Extraction: {} items", list.len()),
    }
    Ok(payload)
}
