// crates/pipeline/src/refine.rs
//! LLM refinement of items the rule categorizer could not place.
//!
//! Only items that fell through to the fallback category are sent out. The
//! coordinator may batch the requests transparently; either way each reply
//! is one JSON object carrying `normalized_name`, `category`, `confidence`
//! and `reasoning` (batched replies add an `index` field, which is ignored
//! here).

use nomenorm_core::{LlmCoordinator, LlmError};

use crate::grouping::AiRefinement;

const SYSTEM_PROMPT: &str = "\
Ты — специалист по нормализации справочника номенклатуры. Для каждой \
позиции верни каноническое наименование (нижний регистр, без артикулов и \
размеров) и товарную категорию одним словом. Отвечай строго JSON-объектом \
с полями normalized_name, category, confidence (0..1), reasoning.";

/// Build the user prompt for one item.
fn build_user_prompt(normalized_name: &str) -> String {
    format!("Позиция: \"{normalized_name}\"")
}

/// Ask the coordinator to refine one cleaned name. `Ok(None)` means the
/// reply arrived but was not usable; transport errors pass through.
pub async fn refine(
    coordinator: &LlmCoordinator,
    normalized_name: &str,
) -> Result<Option<AiRefinement>, LlmError> {
    let user = build_user_prompt(normalized_name);
    let text = coordinator.complete(SYSTEM_PROMPT, &user).await?;
    Ok(parse_refinement(&text))
}

/// Parse the refinement object out of a reply, tolerating fences and prose.
/// Missing or out-of-range fields yield `None`.
pub fn parse_refinement(text: &str) -> Option<AiRefinement> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&text[start..=end]).ok()?;

    let normalized_name = value.get("normalized_name")?.as_str()?.trim().to_lowercase();
    let category = value.get("category")?.as_str()?.trim().to_lowercase();
    let confidence = value.get("confidence")?.as_f64()?;
    if normalized_name.is_empty() || category.is_empty() || !(0.0..=1.0).contains(&confidence) {
        return None;
    }
    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Some(AiRefinement {
        normalized_name,
        category,
        confidence,
        reasoning,
    })
}
