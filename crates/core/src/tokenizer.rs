// crates/core/src/tokenizer.rs
//! Single-pass tokenizer for raw catalog names.
//!
//! The tokenizer maintains three state bits while scanning: current bracket
//! depth, an inside-quoted-string flag, and a next-char-escaped flag. Tokens
//! are a total cover of the input: concatenating their values in order
//! reproduces the original string exactly. Positions and lengths are
//! character offsets, not bytes: the catalog is mostly Cyrillic and every
//! downstream consumer (attribute extraction, pattern fixes) works in
//! characters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Text,
    Number,
    BracketOpen,
    BracketClose,
    Delimiter,
    Quote,
    Whitespace,
}

/// One emitted token. `depth` is the bracket depth at the token's first
/// character; an opening bracket carries the depth outside it, a closing
/// bracket the depth it returns to (so a matched pair carries equal depth).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub depth: u32,
    pub position: usize,
    pub length: usize,
}

const OPEN_BRACKETS: [char; 4] = ['(', '[', '{', '«'];
const CLOSE_BRACKETS: [char; 4] = [')', ']', '}', '»'];
const DELIMITERS: [char; 4] = [',', ';', '/', '|'];
const QUOTES: [char; 2] = ['"', '\''];

fn is_open_bracket(c: char) -> bool {
    OPEN_BRACKETS.contains(&c)
}

fn is_close_bracket(c: char) -> bool {
    CLOSE_BRACKETS.contains(&c)
}

fn is_delimiter(c: char) -> bool {
    DELIMITERS.contains(&c)
}

fn is_quote(c: char) -> bool {
    QUOTES.contains(&c)
}

/// Tokenize `input` into a total cover of typed tokens.
pub fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut depth: u32 = 0;
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if is_quote(c) {
            let quote_char = c;
            tokens.push(single_char_token(TokenType::Quote, c, depth, pos));
            pos += 1;

            // Inside the quoted region every character is part of one text
            // token until the unescaped matching closing quote. Brackets and
            // delimiters inside do not affect depth. The escape char stays in
            // the token value so reconstruction is exact.
            let start = pos;
            let mut value = String::new();
            let mut escaped = false;
            while pos < chars.len() {
                let qc = chars[pos];
                if escaped {
                    value.push(qc);
                    escaped = false;
                    pos += 1;
                } else if qc == '\\' {
                    value.push(qc);
                    escaped = true;
                    pos += 1;
                } else if qc == quote_char {
                    break;
                } else {
                    value.push(qc);
                    pos += 1;
                }
            }
            if !value.is_empty() {
                tokens.push(Token {
                    token_type: TokenType::Text,
                    length: value.chars().count(),
                    value,
                    depth,
                    position: start,
                });
            }
            if pos < chars.len() {
                // Closing quote
                tokens.push(single_char_token(TokenType::Quote, chars[pos], depth, pos));
                pos += 1;
            }
        } else if is_open_bracket(c) {
            tokens.push(single_char_token(TokenType::BracketOpen, c, depth, pos));
            depth += 1;
            pos += 1;
        } else if is_close_bracket(c) {
            depth = depth.saturating_sub(1);
            tokens.push(single_char_token(TokenType::BracketClose, c, depth, pos));
            pos += 1;
        } else if is_delimiter(c) {
            tokens.push(single_char_token(TokenType::Delimiter, c, depth, pos));
            pos += 1;
        } else if c.is_whitespace() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_whitespace() {
                pos += 1;
            }
            tokens.push(span_token(TokenType::Whitespace, &chars[start..pos], depth, start));
        } else if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            // Decimal separator ('.' or ',') only when followed by a digit,
            // otherwise the comma stays a delimiter.
            if pos + 1 < chars.len()
                && (chars[pos] == '.' || chars[pos] == ',')
                && chars[pos + 1].is_ascii_digit()
            {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            tokens.push(span_token(TokenType::Number, &chars[start..pos], depth, start));
        } else {
            let start = pos;
            while pos < chars.len() && is_text_char(chars[pos]) {
                pos += 1;
            }
            tokens.push(span_token(TokenType::Text, &chars[start..pos], depth, start));
        }
    }

    tokens
}

fn is_text_char(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_ascii_digit()
        && !is_open_bracket(c)
        && !is_close_bracket(c)
        && !is_delimiter(c)
        && !is_quote(c)
}

fn single_char_token(token_type: TokenType, c: char, depth: u32, position: usize) -> Token {
    Token {
        token_type,
        value: c.to_string(),
        depth,
        position,
        length: 1,
    }
}

fn span_token(token_type: TokenType, span: &[char], depth: u32, position: usize) -> Token {
    Token {
        token_type,
        value: span.iter().collect(),
        depth,
        position,
        length: span.len(),
    }
}

/// Concatenate token values back into the original string.
pub fn reconstruct(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.value.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(tokens: &[Token]) -> Vec<TokenType> {
        tokens.iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_plain_words() {
        let tokens = tokenize("Молоток большой");
        assert_eq!(
            types(&tokens),
            vec![TokenType::Text, TokenType::Whitespace, TokenType::Text]
        );
        assert_eq!(tokens[0].value, "Молоток");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[0].length, 7);
        assert_eq!(tokens[2].position, 8);
    }

    #[test]
    fn test_number_splits_from_unit() {
        let tokens = tokenize("Сахар 500гр");
        assert_eq!(
            types(&tokens),
            vec![
                TokenType::Text,
                TokenType::Whitespace,
                TokenType::Number,
                TokenType::Text
            ]
        );
        assert_eq!(tokens[2].value, "500");
        assert_eq!(tokens[3].value, "гр");
    }

    #[test]
    fn test_decimal_number_dot_and_comma() {
        let tokens = tokenize("2.5л 2,5л");
        let numbers: Vec<&str> = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Number)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(numbers, vec!["2.5", "2,5"]);
    }

    #[test]
    fn test_trailing_comma_is_delimiter() {
        let tokens = tokenize("болт 10, гайка");
        assert!(tokens
            .iter()
            .any(|t| t.token_type == TokenType::Delimiter && t.value == ","));
        // The 10 must not have swallowed the comma
        assert!(tokens
            .iter()
            .any(|t| t.token_type == TokenType::Number && t.value == "10"));
    }

    #[test]
    fn test_bracket_depth() {
        let tokens = tokenize("труба (медь [мягкая]) 10мм");
        let open: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::BracketOpen)
            .collect();
        assert_eq!(open[0].depth, 0); // (
        assert_eq!(open[1].depth, 1); // [
        let close: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::BracketClose)
            .collect();
        assert_eq!(close[0].depth, 1); // ]
        assert_eq!(close[1].depth, 0); // )
        // Inner word carries inner depth
        let inner = tokens.iter().find(|t| t.value == "мягкая").unwrap();
        assert_eq!(inner.depth, 2);
        // Trailing number is back at depth 0
        let num = tokens.iter().find(|t| t.value == "10").unwrap();
        assert_eq!(num.depth, 0);
    }

    #[test]
    fn test_unbalanced_close_saturates() {
        let tokens = tokenize(") болт");
        assert_eq!(tokens[0].token_type, TokenType::BracketClose);
        assert_eq!(tokens[0].depth, 0);
    }

    #[test]
    fn test_quoted_region_is_one_text_token() {
        let tokens = tokenize(r#"шкаф "Верона (бук), 2дв" белый"#);
        let quoted = tokens
            .iter()
            .find(|t| t.value.contains("Верона"))
            .unwrap();
        assert_eq!(quoted.token_type, TokenType::Text);
        assert_eq!(quoted.value, "Верона (бук), 2дв");
        // Brackets and delimiters inside quotes do not affect depth
        let after = tokens.iter().find(|t| t.value == "белый").unwrap();
        assert_eq!(after.depth, 0);
    }

    #[test]
    fn test_escaped_quote_stays_inside() {
        let tokens = tokenize(r#"плёнка "A4 \" глянец" 10шт"#);
        let quoted = tokens
            .iter()
            .find(|t| t.value.contains("глянец"))
            .unwrap();
        assert_eq!(quoted.value, r#"A4 \" глянец"#);
        let quotes: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Quote)
            .collect();
        assert_eq!(quotes.len(), 2);
    }

    #[test]
    fn test_unterminated_quote() {
        let tokens = tokenize(r#"провод "ПВС 2х1.5"#);
        // One opening quote, the rest is a single text token, no panic
        let quotes: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Quote)
            .collect();
        assert_eq!(quotes.len(), 1);
        assert_eq!(reconstruct(&tokens), r#"провод "ПВС 2х1.5"#);
    }

    #[test]
    fn test_guillemets_are_brackets() {
        let tokens = tokenize("сыр «Российский» 200г");
        let open = tokens.iter().find(|t| t.value == "«").unwrap();
        assert_eq!(open.token_type, TokenType::BracketOpen);
        let inner = tokens.iter().find(|t| t.value == "Российский").unwrap();
        assert_eq!(inner.depth, 1);
    }

    #[test]
    fn test_reconstruct_is_exact() {
        for input in [
            "Молоток большой",
            "Панель металлическая 100х100",
            r#"шкаф "Верона (бук), 2дв" белый"#,
            "труба (медь [мягкая]) 10мм; уп/2",
            "  кривой   ввод,,,((",
            "",
        ] {
            assert_eq!(reconstruct(&tokenize(input)), input, "input: {input:?}");
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_positions_are_char_offsets() {
        let tokens = tokenize("Товар ER-00013004");
        // "Товар" is 5 chars (10 bytes); the next text token must start at
        // char 6, not byte 11.
        let er = tokens.iter().find(|t| t.value.starts_with("ER")).unwrap();
        assert_eq!(er.position, 6);
    }
}
