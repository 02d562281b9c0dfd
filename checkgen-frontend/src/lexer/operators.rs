//! Punctuator and comment scanning for the declaration lexer

use crate::lexer::{Lexer, TokenType};
use checkgen_common::GeneratorError;

/// Multi-character punctuators, longest first
const COMPOUND_PUNCTUATORS: &[&str] = &[
    "<<=", ">>=",
    "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "##",
];

impl Lexer {
    /// Tokenize a punctuator
    pub fn tokenize_punctuator(&mut self) -> Result<TokenType, GeneratorError> {
        if self.current_char() == Some('.') && self.peek_char(1) == Some('.') && self.peek_char(2) == Some('.') {
            self.advance();
            self.advance();
            self.advance();
            return Ok(TokenType::Ellipsis);
        }

        for punct in COMPOUND_PUNCTUATORS {
            let matches = punct
                .chars()
                .enumerate()
                .all(|(offset, expected)| self.peek_char(offset) == Some(expected));
            if matches {
                for _ in 0..punct.len() {
                    self.advance();
                }
                return Ok(TokenType::Punct(punct.to_string()));
            }
        }

        let location = self.current_location();
        let Some(ch) = self.advance() else {
            return Ok(TokenType::EndOfFile);
        };

        let token_type = match ch {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            '[' => TokenType::LeftBracket,
            ']' => TokenType::RightBracket,
            ';' => TokenType::Semicolon,
            ',' => TokenType::Comma,
            '*' => TokenType::Star,
            '=' => TokenType::Equal,
            '+' | '-' | '/' | '%' | '&' | '|' | '^' | '~' | '!' | '<' | '>' | '?' | ':' | '.' | '#' => {
                TokenType::Punct(ch.to_string())
            }
            other => {
                return Err(GeneratorError::lexer_error(
                    format!("Unexpected character: {}", other),
                    location,
                ));
            }
        };

        Ok(token_type)
    }

    /// Skip a `//` comment up to (not including) the newline
    pub fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Skip a block comment
    pub fn skip_block_comment(&mut self) -> Result<(), GeneratorError> {
        let start = self.current_location();
        self.advance(); // Skip '/'
        self.advance(); // Skip '*'

        while let Some(ch) = self.current_char() {
            if ch == '*' && self.peek_char(1) == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(GeneratorError::lexer_error(
            "Unterminated block comment".to_string(),
            start,
        ))
    }
}
