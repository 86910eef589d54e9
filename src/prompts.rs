//! Prompt text for every generative call in the pipeline.
//!
//! Centralising the prompts serves two purposes:
//!
//! 1. **Single source of truth** — the contract each stage expects back
//!    (category word, `items` wrapper, narrative field set) lives next to the
//!    words that demand it.
//! 2. **Testability** — unit tests inspect prompts directly without a live
//!    model, so contract regressions (a dropped rule, a renamed key) are
//!    caught cheaply.

use crate::model::NoticeCategory;
use serde_json::Value;

/// Instruction sent with the page-1 image for the vision OCR pass.
pub const OCR_INSTRUCTION: &str = "\
You are a high-fidelity Optical Character Recognition (OCR) service.
Extract all text from the following page image, perfectly preserving all original line breaks, spacing, and formatting.
Return ONLY the extracted text, with no other commentary.";

/// Build the header-extraction prompt from the leading document text.
///
/// The contract is strict: a single JSON object with exactly three keys,
/// empty string for anything not found.
pub fn header_prompt(leading_text: &str) -> String {
    format!(
        r#"Analyze the following text from the beginning of a government gazette PDF.
Extract the Volume (e.g., "Vol. CXXVII"), the Issue Number (e.g., "No. 36"), and the Publication Date (e.g., "21st February, 2025").
Return ONLY a valid JSON object with three keys: "volume", "issueNumber", and "date" (in YYYY-MM-DD format).
If a value is not found, return an empty string "".

TEXT:
{leading_text}

OUTPUT JSON:
{{
  "volume": "...",
  "issueNumber": "...",
  "date": "YYYY-MM-DD"
}}"#
    )
}

/// Build the triage prompt: classify into exactly one category word.
pub fn triage_prompt(notice_text: &str) -> String {
    format!(
        r#"Classify the following gazette notice text into ONE of the following categories:
Appointments
Legislation
Tenders (for 'Invitation to Tender', 'procurement', 'bids', 'disposal of assets')
Land_Property (for 'Issue of Land Title', 'land acquisition', 'EIA', 'provisional certificate', 'replacement title', 'replacement of lost', 'Certificate of Lease', 'lost title deed')
Court_Legal (for 'Insolvency', 'probate', 'cause list', 'dissolution of marriage')
Public_Service_HR
Licensing
Company_Registrations (for 'incorporation', 'dissolution of company')
Miscellaneous

Your response MUST be ONLY one of the words listed above. Do not include any other text, explanation, or punctuation.

TEXT:
{notice_text}"#
    )
}

/// Build the extraction prompt for a category schema and notice text.
///
/// The model must answer with `{"items": …}` where `items` is a single object
/// for one fact group or an array for several like-kind groups.
pub fn extraction_prompt(schema: &str, notice_text: &str) -> String {
    format!(
        r#"Extract structured data from the text below according to the provided JSON schema.
CRITICAL RULES:
1. Return ONLY valid JSON with an "items" array or object as the root key.
2. Each item in the array must be a complete JSON object.
3. Ensure proper JSON syntax: use commas between items, proper brackets, and quotes.
4. If multiple items exist, each must be a separate object in the "items" array.
5. Never break JSON syntax - validate before returning.

SCHEMA:
{schema}

TEXT TO EXTRACT:
{notice_text}

Return format (if one item): {{ "items": {{ ... }} }}
Return format (if multiple items): {{ "items": [ {{ ... }}, {{ ... }} ] }}"#
    )
}

/// Generic deflection phrasing the Tier 1 rule exists to forbid.
pub const GENERIC_DEFLECTION: &str = "check the gazette";

/// Build the narrative-generation prompt.
///
/// `digest_allowed` reflects the configurable grouping policy: only when the
/// notice's category permits digests AND the payload is an array does the
/// prompt invite a combined "digest" article.
pub fn generation_prompt(
    extracted: &Value,
    category: NoticeCategory,
    digest_allowed: bool,
) -> String {
    let grouping_rule = if digest_allowed && extracted.is_array() {
        "- The input data is a JSON array of like-kind notices: create a single \"digest\" article summarising them together. Title like \"Land Transfer Notices\" or \"New Tenders\"."
    } else {
        "- Create a normal article for this single notice."
    };

    format!(
        r#"You are an expert editorial assistant for a public-notices service. Your goal is to simplify government notices for young readers.
Based ONLY on the structured JSON data provided below, generate a JSON object containing six fields: "title", "summary", "article", "xSummary", "actionableInfo", and "significance".

**Your Instructions:**
1.  **Grouping Logic:**
    {grouping_rule}

2.  **Actionable Info Logic (Tiered Approach):**
    - **Tier 1 (Action with Deadline):** If the input JSON has an "objection_period" (e.g., "sixty (60) days", "30 days") or a "deadline", you MUST use this value.
      Example: "Submit objections within sixty (60) days from the notice date."
      **CRITICAL: Do NOT say '{GENERIC_DEFLECTION}' if a specific period is provided in the JSON.**
    - **Tier 2 (Action without Deadline):** If the input has an action but NO "objection_period" or "deadline", advise checking official sources.
      Example: "Provide feedback. Check the relevant authority's website for details."
    - **Tier 3 (Informational):** For appointments etc., provide context. Ex: "Note the new board leadership."

3.  **Content Requirements:**
    - title: Clear, engaging headline.
    - summary: One-sentence key takeaway.
    - article: Detailed, human-readable article (200-400 words).
      CRITICAL: This field MUST be plain, human-readable text. Do NOT use any markdown formatting (like '*', '#', or '-' for lists). Write in full paragraphs.
    - xSummary: Engagement friendly but informative summary under 276 characters.
    - actionableInfo: Text from tiered logic above.
    - significance: Integer 1-10 rating how newsworthy this {category} notice is for the general public.

**CRITICAL: Your entire response MUST be a single, valid JSON object starting with `{{` and ending with `}}`. Do NOT include any text before or after the JSON object.**

**STRUCTURED DATA TO USE:**
{extracted}

**OUTPUT JSON FORMAT:**
{{
  "title": "...",
  "summary": "...",
  "article": "...",
  "xSummary": "...",
  "actionableInfo": "...",
  "significance": 5
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn triage_prompt_lists_every_category() {
        let p = triage_prompt("some notice");
        for cat in NoticeCategory::ALL {
            assert!(p.contains(cat.as_str()), "missing category {cat}");
        }
    }

    #[test]
    fn extraction_prompt_demands_items_wrapper() {
        let p = extraction_prompt("{\"type\":\"object\"}", "text");
        assert!(p.contains("\"items\""));
        assert!(p.contains("TEXT TO EXTRACT"));
    }

    #[test]
    fn generation_prompt_carries_deadline_through() {
        let data = json!({"objection_period": "sixty (60) days"});
        let p = generation_prompt(&data, NoticeCategory::LandProperty, false);
        // Tier 1: the concrete period must be visible to the model, together
        // with the rule forbidding the generic deflection.
        assert!(p.contains("sixty (60) days"));
        assert!(p.contains(&format!("Do NOT say '{GENERIC_DEFLECTION}'")));
    }

    #[test]
    fn digest_rule_requires_policy_and_array() {
        let arr = json!([{"a": 1}, {"a": 2}]);
        let single = json!({"a": 1});

        let digest = generation_prompt(&arr, NoticeCategory::LandProperty, true);
        assert!(digest.contains("digest"));

        let no_policy = generation_prompt(&arr, NoticeCategory::Appointments, false);
        assert!(!no_policy.contains("digest"));

        let not_array = generation_prompt(&single, NoticeCategory::LandProperty, true);
        assert!(!not_array.contains("digest"));
    }

    #[test]
    fn header_prompt_pins_the_key_names() {
        let p = header_prompt("THE KENYA GAZETTE");
        assert!(p.contains("\"volume\""));
        assert!(p.contains("\"issueNumber\""));
        assert!(p.contains("\"date\""));
    }
}
