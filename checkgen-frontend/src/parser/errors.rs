//! Parse error types for the declaration parser

use crate::lexer::Token;
use checkgen_common::{GeneratorError, SourceLocation};
use thiserror::Error;

/// Parse error types specific to the parser
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("Expected {expected}, found '{}'", .found.token_type)]
    UnexpectedToken {
        expected: String,
        found: Token,
    },

    #[error("Unexpected end of file, expected {expected}")]
    UnexpectedEndOfFile {
        expected: String,
        location: SourceLocation,
    },

    #[error("{message}")]
    InvalidDeclaration {
        message: String,
        location: SourceLocation,
    },
}

impl ParseError {
    pub fn location(&self) -> &SourceLocation {
        match self {
            ParseError::UnexpectedToken { found, .. } => found.location(),
            ParseError::UnexpectedEndOfFile { location, .. } => location,
            ParseError::InvalidDeclaration { location, .. } => location,
        }
    }
}

impl From<ParseError> for GeneratorError {
    fn from(err: ParseError) -> Self {
        let location = err.location().clone();
        GeneratorError::parse_error(err.to_string(), location)
    }
}
