//! Scans raw Jack source text into a token sequence.
//!
//! This sits outside the compilation engine proper — the engine only ever
//! depends on [`crate::token::TokenCursor`] — but a concrete lexer is needed
//! to make this crate runnable end to end.

use crate::error::CompileError;
use crate::token::{Token, TokenKind, TokenStream};

const KEYWORDS: &[&str] = &[
    "class",
    "constructor",
    "function",
    "method",
    "field",
    "static",
    "var",
    "int",
    "char",
    "boolean",
    "void",
    "true",
    "false",
    "null",
    "this",
    "let",
    "do",
    "if",
    "else",
    "while",
    "return",
];

const SYMBOLS: &[char] = &[
    '{', '}', '(', ')', '[', ']', '.', ',', ';', '+', '-', '*', '/', '&', '|', '<', '>', '=', '~',
];

pub struct Lexer;

impl Lexer {
    /// Scans `source` into a flat token list, ready to be wrapped in a
    /// [`TokenStream`].
    pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
        let chars: Vec<char> = source.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c.is_whitespace() {
                i += 1;
                continue;
            }

            if c == '/' && chars.get(i + 1) == Some(&'/') {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }

            if c == '/' && chars.get(i + 1) == Some(&'*') {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
                continue;
            }

            if c == '"' {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '"' && chars[j] != '\n' {
                    j += 1;
                }
                let lexeme: String = chars[start..j].iter().collect();
                tokens.push(Token::new(TokenKind::StringConst, lexeme));
                i = j + 1;
                continue;
            }

            if c.is_ascii_digit() {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let lexeme: String = chars[start..i].iter().collect();
                tokens.push(Token::new(TokenKind::IntConst, lexeme));
                continue;
            }

            if c.is_alphabetic() || c == '_' {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let lexeme: String = chars[start..i].iter().collect();
                let kind = if KEYWORDS.contains(&lexeme.as_str()) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Identifier
                };
                tokens.push(Token::new(kind, lexeme));
                continue;
            }

            if SYMBOLS.contains(&c) {
                tokens.push(Token::new(TokenKind::Symbol, c.to_string()));
                i += 1;
                continue;
            }

            return Err(CompileError::UnexpectedToken {
                expected: "a valid token".to_string(),
                found: c.to_string(),
            });
        }

        Ok(tokens)
    }

    /// Convenience: scan and wrap directly in a cursor.
    pub fn stream(source: &str) -> Result<TokenStream, CompileError> {
        Ok(TokenStream::new(Self::tokenize(source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<String> {
        Lexer::tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.lexeme)
            .collect()
    }

    #[test]
    fn skips_whitespace_and_both_comment_styles() {
        let src = "class // trailing\nMain /* block */ { /** doc */ }";
        assert_eq!(lex(src), vec!["class", "Main", "{", "}"]);
    }

    #[test]
    fn splits_symbols_into_single_char_tokens() {
        assert_eq!(lex("a[0]=1;"), vec!["a", "[", "0", "]", "=", "1", ";"]);
    }

    #[test]
    fn string_constant_strips_quotes_and_stops_at_newline() {
        let tokens = Lexer::tokenize("\"Hi\"").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::StringConst);
        assert_eq!(tokens[0].lexeme, "Hi");
    }

    #[test]
    fn classifies_keywords_separately_from_identifiers() {
        let tokens = Lexer::tokenize("while x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }
}
