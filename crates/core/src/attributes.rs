// crates/core/src/attributes.rs
//! Attribute extraction over the token stream.
//!
//! Consumes depth-0 tokens and recognizes the common numeric patterns of a
//! 1C-style catalog: `<number><unit>` (500гр, 50м, 2.5л), `NxN[xN]`
//! dimensions with Latin or Cyrillic separators, percent and currency forms.
//! Every recognition emits an [`AttributeTriple`] and removes the matched
//! span from the output; what remains is folded into the canonical base name.

use nomenorm_types::AttributeTriple;

use crate::tokenizer::{tokenize, Token, TokenType};

/// Result of running extraction over one raw name.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Lowercased, attribute-stripped, whitespace-collapsed base form.
    /// Falls back to the trimmed lowercased original when stripping leaves
    /// nothing.
    pub base_name: String,
    pub attributes: Vec<AttributeTriple>,
}

/// Units recognized after a number, mapped to an attribute key.
fn unit_key(unit: &str) -> Option<&'static str> {
    match unit {
        "г" | "гр" | "кг" | "мг" | "т" | "g" | "kg" => Some("weight"),
        "мл" | "л" | "ml" | "l" => Some("volume"),
        "мм" | "см" | "м" | "км" | "mm" | "cm" | "m" => Some("length"),
        "шт" | "уп" | "пач" | "рул" | "pcs" => Some("quantity"),
        _ => None,
    }
}

fn currency_key(text: &str) -> Option<&'static str> {
    match text {
        "руб" | "р" | "тг" | "$" | "€" => Some("price"),
        _ => None,
    }
}

fn is_dimension_separator(text: &str) -> bool {
    matches!(text, "x" | "X" | "х" | "Х" | "×")
}

/// Extract attributes from a raw name and produce the canonical base form.
pub fn extract(name: &str) -> ExtractionResult {
    let tokens = tokenize(name);
    let mut consumed = vec![false; tokens.len()];
    let mut attributes = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        if consumed[i] || tokens[i].depth != 0 || tokens[i].token_type != TokenType::Number {
            i += 1;
            continue;
        }

        // Dimensions first: NxN and NxNxN bind tighter than number+unit
        // ("100х100х5мм" is a dimension, not a weight).
        if let Some(end) = match_dimension(&tokens, i) {
            let value = dimension_value(&tokens[i..=end]);
            attributes.push(AttributeTriple::new("dimension", value, None));
            for slot in consumed.iter_mut().take(end + 1).skip(i) {
                *slot = true;
            }
            // A trailing unit right after the dimension belongs to it.
            if let Some((unit_idx, unit)) = peek_unit(&tokens, end + 1) {
                if unit_key(&unit).is_some() {
                    for slot in consumed.iter_mut().take(unit_idx + 1).skip(end + 1) {
                        *slot = true;
                    }
                }
            }
            i = end + 1;
            continue;
        }

        let number = tokens[i].value.replace(',', ".");

        // `<number>%`, `<number><unit>`, `<number><currency>`. Trailing
        // punctuation glued to the unit token ("мм!!!") is ignored for the
        // lookup; it gets dropped from the base name anyway.
        if let Some((next_idx, next)) = peek_text(&tokens, i + 1) {
            let word: String = next.chars().filter(|c| c.is_alphabetic()).collect();
            if next.starts_with('%') {
                attributes.push(AttributeTriple::new("percent", number, Some("%".to_string())));
                mark(&mut consumed, i, next_idx);
                i = next_idx + 1;
                continue;
            }
            if let Some(key) = unit_key(&word) {
                attributes.push(AttributeTriple::new(key, number, Some(word)));
                mark(&mut consumed, i, next_idx);
                i = next_idx + 1;
                continue;
            }
            if currency_key(&word).is_some() || currency_key(&next).is_some() {
                let unit = if word.is_empty() { next.clone() } else { word };
                attributes.push(AttributeTriple::new("price", number, Some(unit)));
                mark(&mut consumed, i, next_idx);
                i = next_idx + 1;
                continue;
            }
        }

        i += 1;
    }

    let base_name = build_base_name(&tokens, &consumed, name);
    ExtractionResult {
        base_name,
        attributes,
    }
}

/// Returns the index of the last token of a dimension starting at `start`,
/// or `None`. A dimension is Number (sep Number){1,2} with the separator as
/// its own text token, no intervening whitespace.
fn match_dimension(tokens: &[Token], start: usize) -> Option<usize> {
    let mut end = start;
    let mut components = 1;
    while components < 3 {
        let sep = tokens.get(end + 1)?;
        let num = tokens.get(end + 2);
        if sep.token_type == TokenType::Text
            && is_dimension_separator(&sep.value)
            && num.map(|t| t.token_type == TokenType::Number).unwrap_or(false)
        {
            end += 2;
            components += 1;
        } else {
            break;
        }
    }
    if components >= 2 {
        Some(end)
    } else {
        None
    }
}

/// Join dimension tokens, normalizing every separator to a Latin `x`.
fn dimension_value(span: &[Token]) -> String {
    span.iter()
        .map(|t| {
            if t.token_type == TokenType::Text {
                "x".to_string()
            } else {
                t.value.replace(',', ".")
            }
        })
        .collect()
}

/// Lowercased text token at `idx`, skipping a single whitespace token.
fn peek_text(tokens: &[Token], idx: usize) -> Option<(usize, String)> {
    let mut idx = idx;
    if tokens.get(idx).map(|t| t.token_type) == Some(TokenType::Whitespace) {
        idx += 1;
    }
    let token = tokens.get(idx)?;
    if token.token_type == TokenType::Text && token.depth == 0 {
        Some((idx, token.value.to_lowercase()))
    } else {
        None
    }
}

fn peek_unit(tokens: &[Token], idx: usize) -> Option<(usize, String)> {
    peek_text(tokens, idx)
}

/// Consume tokens `from..=to` inclusive.
fn mark(consumed: &mut [bool], from: usize, to: usize) {
    for slot in consumed.iter_mut().take(to + 1).skip(from) {
        *slot = true;
    }
}

/// Residual tokens: lowercase, drop non-letter punctuation, collapse
/// whitespace, join with single spaces. Empty result falls back to the
/// trimmed lowercased original.
fn build_base_name(tokens: &[Token], consumed: &[bool], original: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        match token.token_type {
            TokenType::Text | TokenType::Number => {
                let cleaned: String = token
                    .value
                    .to_lowercase()
                    .chars()
                    .filter(|c| c.is_alphanumeric() || c.is_whitespace())
                    .collect();
                for word in cleaned.split_whitespace() {
                    words.push(word.to_string());
                }
            }
            _ => {}
        }
    }
    let base = words.join(" ");
    if base.is_empty() {
        original.trim().to_lowercase()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_name_passes_through_lowercased() {
        let result = extract("Молоток большой");
        assert_eq!(result.base_name, "молоток большой");
        assert!(result.attributes.is_empty());
    }

    #[test]
    fn test_weight_extraction() {
        let result = extract("Сахар 500гр");
        assert_eq!(result.base_name, "сахар");
        assert_eq!(
            result.attributes,
            vec![AttributeTriple::new("weight", "500", Some("гр".to_string()))]
        );
    }

    #[test]
    fn test_volume_with_decimal_comma() {
        let result = extract("Молоко 2,5л");
        assert_eq!(result.base_name, "молоко");
        assert_eq!(
            result.attributes,
            vec![AttributeTriple::new("volume", "2.5", Some("л".to_string()))]
        );
    }

    #[test]
    fn test_length_with_space_before_unit() {
        let result = extract("Кабель 50 м");
        assert_eq!(result.base_name, "кабель");
        assert_eq!(
            result.attributes,
            vec![AttributeTriple::new("length", "50", Some("м".to_string()))]
        );
    }

    #[test]
    fn test_dimension_cyrillic_separator() {
        let result = extract("Панель металлическая 100х100");
        assert_eq!(result.base_name, "панель металлическая");
        assert_eq!(
            result.attributes,
            vec![AttributeTriple::new("dimension", "100x100", None)]
        );
    }

    #[test]
    fn test_three_component_dimension_with_unit() {
        let result = extract("Лист 100х100х5 мм");
        assert_eq!(result.base_name, "лист");
        assert_eq!(
            result.attributes,
            vec![AttributeTriple::new("dimension", "100x100x5", None)]
        );
    }

    #[test]
    fn test_percent() {
        let result = extract("Спирт 95%");
        assert_eq!(result.base_name, "спирт");
        assert_eq!(
            result.attributes,
            vec![AttributeTriple::new("percent", "95", Some("%".to_string()))]
        );
    }

    #[test]
    fn test_price() {
        let result = extract("Доставка 1500 руб");
        assert_eq!(result.base_name, "доставка");
        assert_eq!(
            result.attributes,
            vec![AttributeTriple::new("price", "1500", Some("руб".to_string()))]
        );
    }

    #[test]
    fn test_bare_number_stays_in_name() {
        let result = extract("Болт М10 сорт 2");
        assert!(result.attributes.is_empty());
        // Letter/digit boundaries split into separate tokens
        assert_eq!(result.base_name, "болт м 10 сорт 2");
    }

    #[test]
    fn test_attributes_inside_brackets_ignored() {
        // depth > 0 tokens are not attribute candidates
        let result = extract("Ведро (10л)");
        assert!(result.attributes.is_empty());
        assert_eq!(result.base_name, "ведро 10 л");
    }

    #[test]
    fn test_punctuation_dropped_from_base() {
        let result = extract("Ключ гаечный, 17мм!!!");
        assert_eq!(result.base_name, "ключ гаечный");
        assert_eq!(
            result.attributes,
            vec![AttributeTriple::new("length", "17", Some("мм".to_string()))]
        );
    }

    #[test]
    fn test_fully_stripped_falls_back_to_original() {
        let result = extract("500гр");
        assert_eq!(result.base_name, "500гр");
        assert_eq!(result.attributes.len(), 1);
    }

    #[test]
    fn test_empty_name() {
        let result = extract("   ");
        assert_eq!(result.base_name, "");
        assert!(result.attributes.is_empty());
    }

    #[test]
    fn test_multiple_attributes() {
        let result = extract("Краска белая 5л 10шт");
        assert_eq!(result.base_name, "краска белая");
        assert_eq!(
            result.attributes,
            vec![
                AttributeTriple::new("volume", "5", Some("л".to_string())),
                AttributeTriple::new("quantity", "10", Some("шт".to_string())),
            ]
        );
    }
}
