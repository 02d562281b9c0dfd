//! C declaration lexer
//!
//! Tokenizes preprocessed C source. Preprocessor line markers
//! (`# 12 "include/api.h" 2`) and `#line` directives are consumed here and
//! update the file name and line reported by every following token, so the
//! parser can tell declarations of the input header from those of the
//! headers it includes.

pub mod token;
pub mod literals;
pub mod operators;

pub use token::{Token, TokenType};

use checkgen_common::{GeneratorError, SourceLocation, SourceSpan};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// `# 12 "file.h" 1 3` as written by cpp, or `#line 12 "file.h"`
static LINE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^#\s*(?:line\s+)?(\d+)(?:\s+"((?:[^"\\]|\\.)*)")?"#).expect("line marker pattern is valid")
});

static KEYWORDS: Lazy<HashMap<&'static str, TokenType>> = Lazy::new(|| {
    HashMap::from([
        ("typedef", TokenType::Typedef),
        ("extern", TokenType::Extern),
        ("static", TokenType::Static),
        ("auto", TokenType::Auto),
        ("register", TokenType::Register),
        ("_Thread_local", TokenType::ThreadLocal),
        ("__thread", TokenType::ThreadLocal),
        ("inline", TokenType::Inline),
        ("__inline", TokenType::Inline),
        ("__inline__", TokenType::Inline),
        ("_Noreturn", TokenType::Noreturn),
        ("const", TokenType::Const),
        ("__const", TokenType::Const),
        ("volatile", TokenType::Volatile),
        ("__volatile", TokenType::Volatile),
        ("restrict", TokenType::Restrict),
        ("__restrict", TokenType::Restrict),
        ("__restrict__", TokenType::Restrict),
        ("_Atomic", TokenType::Atomic),
        ("void", TokenType::Void),
        ("char", TokenType::Char),
        ("short", TokenType::Short),
        ("int", TokenType::Int),
        ("long", TokenType::Long),
        ("float", TokenType::Float),
        ("double", TokenType::Double),
        ("signed", TokenType::Signed),
        ("__signed", TokenType::Signed),
        ("__signed__", TokenType::Signed),
        ("unsigned", TokenType::Unsigned),
        ("_Bool", TokenType::Bool),
        ("_Complex", TokenType::Complex),
        ("__complex__", TokenType::Complex),
        ("struct", TokenType::Struct),
        ("union", TokenType::Union),
        ("enum", TokenType::Enum),
    ])
});

/// C declaration lexer
pub struct Lexer {
    pub(crate) input: Vec<char>,
    pub(crate) position: usize,
    pub(crate) line: u32,
    pub(crate) column: u32,
    pub(crate) filename: String,
    /// Only whitespace has been seen since the last newline
    at_line_start: bool,
}

impl Lexer {
    /// Create a lexer; tokens are attributed to `filename` until a line
    /// marker names another file
    pub fn new(input: &str, filename: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            filename: filename.to_string(),
            at_line_start: true,
        }
    }

    /// Get current character
    pub(crate) fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    pub(crate) fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    /// Advance to next character
    pub(crate) fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Get current location
    pub(crate) fn current_location(&self) -> SourceLocation {
        SourceLocation::new(&self.filename, self.line, self.column)
    }

    /// Skip whitespace, comments and preprocessor lines
    fn skip_trivia(&mut self) -> Result<(), GeneratorError> {
        loop {
            match self.current_char() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('\\') if self.peek_char(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                Some('/') if self.peek_char(1) == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_char(1) == Some('*') => self.skip_block_comment()?,
                Some('#') if self.at_line_start => self.directive_line(),
                _ => return Ok(()),
            }
        }
    }

    /// Consume a `#` line. Line markers reposition the lexer; anything
    /// else (`#pragma`, `#ident`) is dropped.
    fn directive_line(&mut self) {
        let mut text = String::new();
        while let Some(ch) = self.current_char() {
            if ch == '\n' {
                break;
            }
            if ch == '\\' && self.peek_char(1) == Some('\n') {
                self.advance();
                self.advance();
                continue;
            }
            text.push(ch);
            self.advance();
        }

        let Some(caps) = LINE_MARKER.captures(&text) else {
            log::debug!("{}:{}: skipping directive '{}'", self.filename, self.line, text.trim());
            return;
        };
        let Ok(line) = caps[1].parse::<u32>() else {
            return;
        };
        if let Some(file) = caps.get(2) {
            self.filename = unescape_marker_name(file.as_str());
        }
        // The newline ending the marker moves us onto line `line`
        self.line = line.saturating_sub(1);
    }

    /// Tokenize an identifier or keyword
    fn tokenize_identifier(&mut self) -> Result<TokenType, GeneratorError> {
        let mut identifier = String::new();
        while let Some(ch) = self.current_char() {
            if is_ident_char(ch) {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Encoding prefixes of character and string literals
        if matches!(identifier.as_str(), "L" | "u" | "U" | "u8") {
            match self.current_char() {
                Some('\'') => return self.tokenize_char_literal(),
                Some('"') => return self.tokenize_string_literal(),
                _ => {}
            }
        }

        Ok(KEYWORDS
            .get(identifier.as_str())
            .cloned()
            .unwrap_or(TokenType::Identifier(identifier)))
    }

    /// Get next token
    pub fn next_token(&mut self) -> Result<Token, GeneratorError> {
        self.skip_trivia()?;

        let start_location = self.current_location();
        self.at_line_start = false;

        let token_type = match self.current_char() {
            None => TokenType::EndOfFile,
            Some(ch) if is_ident_start(ch) => self.tokenize_identifier()?,
            Some(ch) if ch.is_ascii_digit() => self.tokenize_number(),
            Some('.') if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => self.tokenize_number(),
            Some('\'') => self.tokenize_char_literal()?,
            Some('"') => self.tokenize_string_literal()?,
            Some(_) => self.tokenize_punctuator()?,
        };

        let end_location = self.current_location();
        Ok(Token::new(token_type, SourceSpan::new(start_location, end_location)))
    }

    /// Tokenize entire input into a vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>, GeneratorError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::EndOfFile);
            tokens.push(token);

            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }
}

fn unescape_marker_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                name.push(escaped);
            }
        } else {
            name.push(ch);
        }
    }
    name
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

pub(crate) fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token_types(input: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(input, "api.h");
        lexer.tokenize().unwrap().into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            token_types("typedef unsigned long size_t;"),
            vec![
                TokenType::Typedef,
                TokenType::Unsigned,
                TokenType::Long,
                TokenType::Identifier("size_t".to_string()),
                TokenType::Semicolon,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_gnu_spellings_map_to_keywords() {
        assert_eq!(
            token_types("__inline __restrict __const __signed__"),
            vec![
                TokenType::Inline,
                TokenType::Restrict,
                TokenType::Const,
                TokenType::Signed,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_variadic_prototype() {
        assert_eq!(
            token_types("void log_msg(const char *fmt, ...);"),
            vec![
                TokenType::Void,
                TokenType::Identifier("log_msg".to_string()),
                TokenType::LeftParen,
                TokenType::Const,
                TokenType::Char,
                TokenType::Star,
                TokenType::Identifier("fmt".to_string()),
                TokenType::Comma,
                TokenType::Ellipsis,
                TokenType::RightParen,
                TokenType::Semicolon,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_literals_keep_their_spelling() {
        assert_eq!(
            token_types("0x1fUL 1.5e-3 'a' L\"wide\""),
            vec![
                TokenType::Number("0x1fUL".to_string()),
                TokenType::Number("1.5e-3".to_string()),
                TokenType::CharLiteral("a".to_string()),
                TokenType::StringLiteral("wide".to_string()),
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            token_types("int /* c */ x; // trailing\n"),
            vec![
                TokenType::Int,
                TokenType::Identifier("x".to_string()),
                TokenType::Semicolon,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_line_markers_set_file_and_line() {
        let input = "# 1 \"api.h\"\nint a;\n# 7 \"include/types.h\" 1 3 4\ntypedef int t;\n# 3 \"api.h\" 2\nint b;\n";
        let mut lexer = Lexer::new(input, "<stdin>");
        let tokens = lexer.tokenize().unwrap();

        let a = tokens.iter().find(|t| t.token_type == TokenType::Identifier("a".into())).unwrap();
        assert_eq!(a.location(), &SourceLocation::new("api.h", 1, 5));

        let typedef = tokens.iter().find(|t| t.token_type == TokenType::Typedef).unwrap();
        assert_eq!(typedef.location(), &SourceLocation::new("include/types.h", 7, 1));

        let b = tokens.iter().find(|t| t.token_type == TokenType::Identifier("b".into())).unwrap();
        assert_eq!(b.location(), &SourceLocation::new("api.h", 3, 5));
    }

    #[test]
    fn test_line_directive_without_file_keeps_name() {
        let mut lexer = Lexer::new("#line 40\nint x;\n", "api.h");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0].location(), &SourceLocation::new("api.h", 40, 1));
    }

    #[test]
    fn test_other_directives_are_dropped() {
        assert_eq!(
            token_types("#pragma pack(push, 1)\nint x;"),
            vec![
                TokenType::Int,
                TokenType::Identifier("x".to_string()),
                TokenType::Semicolon,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_hash_inside_a_line_is_a_punctuator() {
        let types = token_types("int x # y;");
        assert!(types.contains(&TokenType::Punct("#".to_string())));
    }

    #[test]
    fn test_escaped_marker_file_name() {
        let mut lexer = Lexer::new("# 2 \"dir\\\\api \\\"v2\\\".h\"\nint x;", "x");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0].location().filename, "dir\\api \"v2\".h");
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        let mut lexer = Lexer::new("int x; /* open", "api.h");
        let err = lexer.tokenize().unwrap_err();
        assert!(matches!(err, GeneratorError::LexError { .. }));
    }
}
