//! Token definitions for the declaration lexer
//!
//! Only the keywords that can appear in declaration specifiers get their
//! own variant; statement keywords inside skipped bodies lex as identifiers.

use checkgen_common::{SourceLocation, SourceSpan};
use serde::{Deserialize, Serialize};
use std::fmt;

/// C token types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenType {
    // Literals, kept as spelled
    Number(String),
    CharLiteral(String),
    StringLiteral(String),

    Identifier(String),

    // Storage class and function specifiers
    Typedef, Extern, Static, Auto, Register, ThreadLocal,
    Inline, Noreturn,

    // Type qualifiers
    Const, Volatile, Restrict, Atomic,

    // Type specifiers
    Void, Char, Short, Int, Long, Float, Double, Signed, Unsigned,
    Bool, Complex,
    Struct, Union, Enum,

    // Delimiters
    LeftParen,      // (
    RightParen,     // )
    LeftBrace,      // {
    RightBrace,     // }
    LeftBracket,    // [
    RightBracket,   // ]
    Semicolon,      // ;
    Comma,          // ,
    Star,           // *
    Equal,          // =
    Ellipsis,       // ...

    /// Any other punctuator; only seen inside skipped initializers,
    /// bodies and array sizes
    Punct(String),

    EndOfFile,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Number(n) => write!(f, "{n}"),
            TokenType::CharLiteral(c) => write!(f, "'{c}'"),
            TokenType::StringLiteral(s) => write!(f, "\"{s}\""),
            TokenType::Identifier(s) => write!(f, "{s}"),

            TokenType::Typedef => write!(f, "typedef"),
            TokenType::Extern => write!(f, "extern"),
            TokenType::Static => write!(f, "static"),
            TokenType::Auto => write!(f, "auto"),
            TokenType::Register => write!(f, "register"),
            TokenType::ThreadLocal => write!(f, "_Thread_local"),
            TokenType::Inline => write!(f, "inline"),
            TokenType::Noreturn => write!(f, "_Noreturn"),

            TokenType::Const => write!(f, "const"),
            TokenType::Volatile => write!(f, "volatile"),
            TokenType::Restrict => write!(f, "restrict"),
            TokenType::Atomic => write!(f, "_Atomic"),

            TokenType::Void => write!(f, "void"),
            TokenType::Char => write!(f, "char"),
            TokenType::Short => write!(f, "short"),
            TokenType::Int => write!(f, "int"),
            TokenType::Long => write!(f, "long"),
            TokenType::Float => write!(f, "float"),
            TokenType::Double => write!(f, "double"),
            TokenType::Signed => write!(f, "signed"),
            TokenType::Unsigned => write!(f, "unsigned"),
            TokenType::Bool => write!(f, "_Bool"),
            TokenType::Complex => write!(f, "_Complex"),
            TokenType::Struct => write!(f, "struct"),
            TokenType::Union => write!(f, "union"),
            TokenType::Enum => write!(f, "enum"),

            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::LeftBracket => write!(f, "["),
            TokenType::RightBracket => write!(f, "]"),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Comma => write!(f, ","),
            TokenType::Star => write!(f, "*"),
            TokenType::Equal => write!(f, "="),
            TokenType::Ellipsis => write!(f, "..."),
            TokenType::Punct(p) => write!(f, "{p}"),

            TokenType::EndOfFile => write!(f, "end of file"),
        }
    }
}

/// A token with location information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token_type: TokenType,
    pub span: SourceSpan,
}

impl Token {
    pub fn new(token_type: TokenType, span: SourceSpan) -> Self {
        Self { token_type, span }
    }

    pub fn eof(location: SourceLocation) -> Self {
        Self {
            token_type: TokenType::EndOfFile,
            span: SourceSpan::from_location(location),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.span.start
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' at {}", self.token_type, self.span.start)
    }
}
