//! Literal scanning for the declaration lexer
//!
//! Literal values never matter to the generator (they only occur in array
//! sizes, enumerator values and skipped initializers), so literals keep
//! their source spelling and escapes are not decoded.

use crate::lexer::{Lexer, TokenType};
use checkgen_common::GeneratorError;

impl Lexer {
    /// Tokenize a preprocessing number (`42`, `0x1fUL`, `1.5e-3`, `.5f`)
    pub fn tokenize_number(&mut self) -> TokenType {
        let mut number = String::new();

        while let Some(ch) = self.current_char() {
            let is_exponent_sign =
                (ch == '+' || ch == '-') && matches!(number.chars().last(), Some('e' | 'E' | 'p' | 'P'));

            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || is_exponent_sign {
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        TokenType::Number(number)
    }

    /// Tokenize a character literal
    pub fn tokenize_char_literal(&mut self) -> Result<TokenType, GeneratorError> {
        let text = self.quoted('\'', "character")?;
        Ok(TokenType::CharLiteral(text))
    }

    /// Tokenize a string literal
    pub fn tokenize_string_literal(&mut self) -> Result<TokenType, GeneratorError> {
        let text = self.quoted('"', "string")?;
        Ok(TokenType::StringLiteral(text))
    }

    /// Read the body of a quoted literal, leaving escapes as written
    fn quoted(&mut self, quote: char, what: &str) -> Result<String, GeneratorError> {
        let start = self.current_location();
        self.advance(); // Skip opening quote

        let mut text = String::new();
        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(text);
                }
                '\\' => {
                    text.push(ch);
                    self.advance();
                    if let Some(escaped) = self.advance() {
                        text.push(escaped);
                    }
                }
                '\n' => break,
                _ => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        Err(GeneratorError::lexer_error(
            format!("Unterminated {} literal", what),
            start,
        ))
    }
}
